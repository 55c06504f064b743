use anyhow::{Context, Result};
use log::info;
use sqlx::{postgres::PgPoolOptions, types::Json, PgPool, Row};

use crate::model::{Artifact, ArtifactSummary, Id};
use crate::store::traits::{ArtifactStore, RevisionConflict};

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("Failed to create PostgreSQL connection pool")?;

        Ok(Self { pool })
    }

    /// Create the artifacts table if it does not exist yet
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS artifacts (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                version TEXT NOT NULL,
                revision TEXT,
                body JSONB NOT NULL,
                updated_by TEXT NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create artifacts table")?;

        info!("Artifact table ready");
        Ok(())
    }
}

#[async_trait::async_trait]
impl ArtifactStore for PostgresStore {
    async fn load_artifact(&self, id: &Id) -> Result<Option<Artifact>> {
        let row = sqlx::query("SELECT body FROM artifacts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch artifact")?;

        let Some(row) = row else {
            return Ok(None);
        };

        let Json(artifact): Json<Artifact> = row
            .try_get("body")
            .context("Failed to decode artifact body")?;
        Ok(Some(artifact))
    }

    async fn save_artifact(&self, artifact: &Artifact, expected_revision: Option<&str>) -> Result<()> {
        let query = match expected_revision {
            Some(_) => sqlx::query(
                r#"
                UPDATE artifacts SET
                    name = $2,
                    version = $3,
                    revision = $4,
                    body = $5,
                    updated_by = $6,
                    updated_at = $7
                WHERE id = $1 AND revision IS NOT DISTINCT FROM $8
                "#,
            ),
            None => sqlx::query(
                r#"
                INSERT INTO artifacts (id, name, version, revision, body, updated_by, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (id) DO UPDATE SET
                    name = EXCLUDED.name,
                    version = EXCLUDED.version,
                    revision = EXCLUDED.revision,
                    body = EXCLUDED.body,
                    updated_by = EXCLUDED.updated_by,
                    updated_at = EXCLUDED.updated_at
                WHERE artifacts.revision IS NOT DISTINCT FROM $8
                "#,
            ),
        };

        let result = query
            .bind(&artifact.id)
            .bind(&artifact.name)
            .bind(&artifact.version)
            .bind(&artifact.revision)
            .bind(Json(artifact))
            .bind(&artifact.updated_by)
            .bind(artifact.updated_at)
            .bind(expected_revision)
            .execute(&self.pool)
            .await
            .context("Failed to save artifact")?;

        if result.rows_affected() == 0 {
            return Err(RevisionConflict {
                artifact_id: artifact.id.clone(),
                expected: expected_revision.map(str::to_string),
            }
            .into());
        }
        Ok(())
    }

    async fn list_artifacts(&self) -> Result<Vec<ArtifactSummary>> {
        let rows = sqlx::query(
            "SELECT id, name, version, revision, updated_by, updated_at FROM artifacts ORDER BY updated_at, id",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list artifacts")?;

        let summaries = rows
            .into_iter()
            .map(|row| ArtifactSummary {
                id: row.get("id"),
                name: row.get("name"),
                version: row.get("version"),
                revision: row.get("revision"),
                updated_by: row.get("updated_by"),
                updated_at: row.get("updated_at"),
            })
            .collect();

        Ok(summaries)
    }

    async fn delete_artifact(&self, id: &Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM artifacts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete artifact")?;

        Ok(result.rows_affected() > 0)
    }
}
