pub mod base_elements;
pub mod compatibility;
pub mod mutations;
pub mod registry;
pub mod session;
pub mod type_resolution;
pub mod view;

#[cfg(test)]
pub(crate) mod fixtures;

pub use base_elements::*;
pub use compatibility::*;
pub use mutations::*;
pub use registry::*;
pub use session::*;
pub use type_resolution::*;
pub use view::*;
