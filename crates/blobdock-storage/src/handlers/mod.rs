//! HTTP handlers for the storage account API

mod cancellation;
pub mod handler;
pub mod types;

pub use cancellation::RequestCancellation;
pub use handler::{configure_routes, StorageApiDoc};
pub use types::*;
