use serde::{Deserialize, Serialize};

/// Body of a prompt generation request. Every field is required; content is not validated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub objective: String,
    pub tech_stack: String,
    pub git_tool: String,
    pub user_info: String,
}
