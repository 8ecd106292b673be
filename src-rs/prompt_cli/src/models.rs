use serde::{Deserialize, Serialize};

#[derive(Clone, Debug)]
pub struct CLIConfig {
    pub base_url: String,
    pub poll_attempts: usize,
    pub poll_interval_ms: u64,
}

/// Request fields collected in the REPL before submitting.
#[derive(Clone, Debug, Default, Serialize)]
pub struct GenerationRequest {
    pub objective: String,
    pub tech_stack: String,
    pub git_tool: String,
    pub user_info: String,
}

impl GenerationRequest {
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.objective.trim().is_empty() {
            missing.push("objective");
        }
        if self.tech_stack.trim().is_empty() {
            missing.push("stack");
        }
        if self.git_tool.trim().is_empty() {
            missing.push("git");
        }
        if self.user_info.trim().is_empty() {
            missing.push("user");
        }
        missing
    }
}

#[derive(Debug, Deserialize)]
pub struct SubmitResponse {
    pub task_id: String,
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    pub result: Option<String>,
    pub error: Option<String>,
}

impl StatusResponse {
    pub fn is_terminal(&self) -> bool {
        self.status == "success" || self.status == "failure"
    }
}

#[derive(Debug, Deserialize)]
pub struct Metadata {
    pub name: String,
    pub description: String,
    pub version: String,
    pub capabilities: Vec<String>,
    pub maintainer: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Health {
    pub status: String,
    pub detail: Option<String>,
}
