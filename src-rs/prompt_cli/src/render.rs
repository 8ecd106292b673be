use std::io::{self, Write};

use crate::models::{CLIConfig, GenerationRequest, Health, Metadata, StatusResponse};

pub fn banner(cfg: &CLIConfig) {
    println!("Prompt Generator CLI");
    println!("API: {}", cfg.base_url);
    println!("Type /help for commands.");
}

pub fn prompt() {
    print!("> ");
    let _ = io::stdout().flush();
}

pub fn help() {
    println!("Commands:");
    println!("  /help                  Show commands");
    println!("  /exit | /quit          Exit");
    println!("  /objective <text>      Set the project objective");
    println!("  /stack <text>          Set the tech stack");
    println!("  /git <tool>            Set the git tool (github, gitlab, ...)");
    println!("  /user <text>           Set user info");
    println!("  /show                  Show the pending request");
    println!("  /send                  Submit and wait for the prompt");
    println!("  /status <task_id>      Check a task once");
    println!("  /metadata              Show service metadata");
    println!("  /health                Show service health");
    println!("  /base <url>            Update base URL");
    println!("Plain text sets the objective.");
}

pub fn request(req: &GenerationRequest) {
    println!("request:");
    println!("  objective: {}", req.objective);
    println!("  stack: {}", req.tech_stack);
    println!("  git: {}", req.git_tool);
    println!("  user: {}", req.user_info);
}

pub fn status(task_id: &str, resp: &StatusResponse) {
    match resp.status.as_str() {
        "success" => {
            println!("[success] {}", task_id);
            println!("{}", resp.result.clone().unwrap_or_default());
        }
        "failure" => println!(
            "[failure] {}: {}",
            task_id,
            resp.error.clone().unwrap_or_else(|| "unknown error".to_string())
        ),
        other => println!("[{}] {}", other, task_id),
    }
}

pub fn metadata(meta: &Metadata) {
    println!("{} v{}", meta.name, meta.version);
    println!("  {}", meta.description);
    println!("  capabilities: {}", meta.capabilities.join(", "));
    if let Some(maintainer) = &meta.maintainer {
        println!("  maintainer: {}", maintainer);
    }
}

pub fn health(health: &Health) {
    match &health.detail {
        Some(detail) => println!("health: {} ({})", health.status, detail),
        None => println!("health: {}", health.status),
    }
}

pub fn info(msg: &str) {
    println!("{}", msg);
}

pub fn error(msg: &str) {
    eprintln!("error: {}", msg);
}
