use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    Json as RequestJson,
};
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::AuthoringError;
use crate::logic::{
    AuthoringSession, DivergenceWarning, InstanceView, ModifierRegistry, TemplateCatalog,
    TreeOperation,
};
use crate::model::{
    Artifact, ArtifactSummary, Id, ModifierDefinition, NewArtifact, TemplateCategory, UserContext,
};
use crate::store::ArtifactStore;

/// Shared state behind every route: the store plus the catalogs loaded at startup
pub struct ApiContext<S: ArtifactStore> {
    pub store: Arc<S>,
    pub registry: Arc<ModifierRegistry>,
    pub catalog: Arc<TemplateCatalog>,
}

impl<S: ArtifactStore> ApiContext<S> {
    pub fn new(store: Arc<S>, registry: ModifierRegistry, catalog: TemplateCatalog) -> Self {
        Self {
            store,
            registry: Arc::new(registry),
            catalog: Arc::new(catalog),
        }
    }

    async fn open(&self, id: &str, user: UserContext) -> Result<AuthoringSession<S>, AuthoringError> {
        AuthoringSession::open(
            self.store.clone(),
            self.registry.clone(),
            self.catalog.clone(),
            id,
            user,
        )
        .await
    }
}

pub type AppState<S> = Arc<ApiContext<S>>;

type ApiResult<T> = Result<T, (StatusCode, Json<ErrorResponse>)>;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    pub total: usize,
}

impl<T> ListResponse<T> {
    fn of(items: Vec<T>) -> Self {
        let total = items.len();
        Self { items, total }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: String,
}

impl ErrorResponse {
    pub fn new(message: &str) -> Self {
        Self {
            error: message.to_string(),
            kind: "internal".to_string(),
        }
    }
}

impl From<AuthoringError> for ErrorResponse {
    fn from(e: AuthoringError) -> Self {
        Self {
            error: e.to_string(),
            kind: e.kind().to_string(),
        }
    }
}

pub fn status_for(e: &AuthoringError) -> StatusCode {
    match e {
        AuthoringError::ArtifactNotFound(_) | AuthoringError::InstanceNotFound(_) => StatusCode::NOT_FOUND,
        AuthoringError::InUse { .. }
        | AuthoringError::CyclicReference { .. }
        | AuthoringError::StaleRevision(_) => StatusCode::CONFLICT,
        AuthoringError::InvalidModifierChain { .. }
        | AuthoringError::UnresolvedReference { .. }
        | AuthoringError::UnknownTemplate(_)
        | AuthoringError::UnknownModifier(_)
        | AuthoringError::UnknownField { .. }
        | AuthoringError::InvalidFieldValue { .. }
        | AuthoringError::InvalidModifierValues { .. }
        | AuthoringError::WrongTree { .. }
        | AuthoringError::InvalidOperation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        AuthoringError::Persistence(_) | AuthoringError::Catalog(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn reject(e: AuthoringError) -> (StatusCode, Json<ErrorResponse>) {
    (status_for(&e), Json(ErrorResponse::from(e)))
}

fn internal(e: anyhow::Error) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::new(&format!("{:#}", e))),
    )
}

#[derive(Debug, Deserialize)]
pub struct ModifierQuery {
    pub input_type: Option<String>,
}

pub async fn list_modifiers<S: ArtifactStore>(
    State(state): State<AppState<S>>,
    Query(query): Query<ModifierQuery>,
) -> Json<ListResponse<ModifierDefinition>> {
    let modifiers = match &query.input_type {
        Some(input_type) => state
            .registry
            .by_input_type(input_type)
            .into_iter()
            .cloned()
            .collect(),
        None => state.registry.all().to_vec(),
    };
    Json(ListResponse::of(modifiers))
}

pub async fn list_templates<S: ArtifactStore>(
    State(state): State<AppState<S>>,
) -> Json<Vec<TemplateCategory>> {
    Json(state.catalog.categories().to_vec())
}

pub async fn list_artifacts<S: ArtifactStore>(
    State(state): State<AppState<S>>,
) -> ApiResult<Json<ListResponse<ArtifactSummary>>> {
    let artifacts = state.store.list_artifacts().await.map_err(internal)?;
    Ok(Json(ListResponse::of(artifacts)))
}

pub async fn create_artifact<S: ArtifactStore>(
    State(state): State<AppState<S>>,
    user: UserContext,
    RequestJson(new_artifact): RequestJson<NewArtifact>,
) -> ApiResult<(StatusCode, Json<Artifact>)> {
    let artifact = Artifact::from_new(new_artifact, state.catalog.root_template(), &user);
    let mut session = AuthoringSession::from_artifact(
        state.store.clone(),
        state.registry.clone(),
        state.catalog.clone(),
        artifact,
        user.clone(),
    );
    session.save().await.map_err(reject)?;

    let artifact = session.into_artifact();
    info!("Created artifact '{}' ({}) for {}", artifact.name, artifact.id, user.label());
    Ok((StatusCode::CREATED, Json(artifact)))
}

pub async fn get_artifact<S: ArtifactStore>(
    State(state): State<AppState<S>>,
    Path(id): Path<Id>,
    user: UserContext,
) -> ApiResult<Json<Artifact>> {
    let session = state.open(&id, user).await.map_err(reject)?;
    Ok(Json(session.into_artifact()))
}

pub async fn delete_artifact<S: ArtifactStore>(
    State(state): State<AppState<S>>,
    Path(id): Path<Id>,
    user: UserContext,
) -> ApiResult<StatusCode> {
    match state.store.delete_artifact(&id).await {
        Ok(true) => {
            info!("Deleted artifact '{}' for {}", id, user.label());
            Ok(StatusCode::NO_CONTENT)
        }
        Ok(false) => Err(reject(AuthoringError::ArtifactNotFound(id))),
        Err(e) => Err(internal(e)),
    }
}

/// Result of an applied operation, with the artifact as saved
#[derive(Debug, Serialize, Deserialize)]
pub struct OperationResponse {
    pub artifact: Artifact,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<Id>,
    pub removed: Vec<Id>,
    pub warnings: Vec<DivergenceWarning>,
    pub cascade_candidates: Vec<Id>,
}

pub async fn apply_operation<S: ArtifactStore>(
    State(state): State<AppState<S>>,
    Path(id): Path<Id>,
    user: UserContext,
    RequestJson(operation): RequestJson<TreeOperation>,
) -> ApiResult<Json<OperationResponse>> {
    let mut session = state.open(&id, user).await.map_err(reject)?;
    let outcome = session.apply(&operation).map_err(reject)?;
    session.save().await.map_err(reject)?;

    Ok(Json(OperationResponse {
        artifact: session.into_artifact(),
        created: outcome.created,
        removed: outcome.removed,
        warnings: outcome.warnings,
        cascade_candidates: outcome.cascade_candidates,
    }))
}

pub async fn get_instance_view<S: ArtifactStore>(
    State(state): State<AppState<S>>,
    Path((id, unique_id)): Path<(Id, Id)>,
    user: UserContext,
) -> ApiResult<Json<InstanceView>> {
    let session = state.open(&id, user).await.map_err(reject)?;
    let view = InstanceView::build(session.artifact(), session.registry(), &unique_id).map_err(reject)?;
    Ok(Json(view))
}
