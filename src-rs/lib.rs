pub mod config;
pub mod error;
pub mod helpers;
pub mod result;

#[path = "llm/lib.rs"]
pub mod llm;
#[path = "prompt/lib.rs"]
pub mod prompt;
#[path = "task/lib.rs"]
pub mod task;
#[path = "api/lib.rs"]
pub mod api;

pub use config::{ComposerMode, ServiceConfig};
pub use error::{ApiError, ComposeError, ConfigError, QueueError};
pub use result::TaskOutcome;
