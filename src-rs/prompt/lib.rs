pub mod composer;
pub mod request;
pub mod template;

pub use composer::PromptComposer;
pub use request::GenerationRequest;
pub use template::{build_system_message, render_project_summary};
