pub mod artifact;
pub mod common;
pub mod instance;
pub mod modifier;
pub mod template;
pub mod user_context;

pub use artifact::*;
pub use common::*;
pub use instance::*;
pub use modifier::*;
pub use template::*;
pub use user_context::*;
