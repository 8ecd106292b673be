pub mod broker;
pub mod redis_broker;
pub mod runner;
pub mod store;
pub mod types;
pub mod worker;

pub(crate) use broker::within;
pub use broker::TaskBroker;
pub use redis_broker::RedisBroker;
pub use runner::TaskRunner;
pub use store::MemoryBroker;
pub use types::{Job, TaskRecord, TaskState, TaskStatus};
pub use worker::{spawn_workers, Worker};
