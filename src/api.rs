//! HTTP surface: webhook ingress, health check and public proof files

mod handlers;
mod types;

pub use handlers::create_router;

use crate::runtime::UpdateHandler;
use std::path::PathBuf;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub handler: Arc<dyn UpdateHandler>,
    /// Expected `X-Telegram-Bot-Api-Secret-Token`, if one was registered
    pub webhook_secret: Option<String>,
    /// Root of the blob store, served under `/files`
    pub files_dir: PathBuf,
}
