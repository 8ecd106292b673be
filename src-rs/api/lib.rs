pub use crate::config::ServiceConfig;
pub use crate::prompt::{GenerationRequest, PromptComposer};
pub use crate::task::{MemoryBroker, RedisBroker, TaskBroker, TaskRunner, TaskState};

pub mod handlers;
pub mod server;

pub use handlers::{check_health, AppState, HealthResponse, ServiceMetadata, StatusResponse};
pub use server::{router, PromptServer};
