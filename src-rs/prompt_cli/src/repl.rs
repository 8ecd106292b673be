use std::io;
use std::thread;
use std::time::Duration;

use crate::client::HTTPClient;
use crate::models::{CLIConfig, GenerationRequest};
use crate::render;

pub struct REPL {
    pub config: CLIConfig,
    pub client: HTTPClient,
    pub request: GenerationRequest,
}

impl REPL {
    pub fn new(config: CLIConfig, client: HTTPClient) -> Self {
        Self {
            config,
            client,
            request: GenerationRequest::default(),
        }
    }

    pub fn run(&mut self) {
        render::banner(&self.config);
        loop {
            render::prompt();
            let mut line = String::new();
            match io::stdin().read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
            let line = line.trim().to_string();
            if line.is_empty() {
                continue;
            }
            if line.starts_with('/') {
                if self.handle_command(&line) {
                    break;
                }
                continue;
            }
            self.request.objective = line;
            render::info("objective updated");
        }
    }

    fn handle_command(&mut self, line: &str) -> bool {
        let mut parts = line.splitn(2, ' ');
        let cmd = parts.next().unwrap_or("").trim_start_matches('/');
        let rest = parts.next().unwrap_or("").trim();
        match cmd {
            "exit" | "quit" => return true,
            "help" => render::help(),
            "objective" => set_field(&mut self.request.objective, "objective", rest),
            "stack" => set_field(&mut self.request.tech_stack, "stack", rest),
            "git" => set_field(&mut self.request.git_tool, "git", rest),
            "user" => set_field(&mut self.request.user_info, "user", rest),
            "show" => render::request(&self.request),
            "send" => self.send(),
            "status" => {
                if rest.is_empty() {
                    render::error("usage: /status <task_id>");
                } else {
                    match self.client.status(rest) {
                        Ok(resp) => render::status(rest, &resp),
                        Err(err) => render::error(&err),
                    }
                }
            }
            "metadata" => match self.client.metadata() {
                Ok(meta) => render::metadata(&meta),
                Err(err) => render::error(&err),
            },
            "health" => match self.client.health() {
                Ok(health) => render::health(&health),
                Err(err) => render::error(&err),
            },
            "base" => {
                if rest.is_empty() {
                    render::info(&format!("base: {}", self.config.base_url));
                } else {
                    match HTTPClient::new(rest) {
                        Ok(client) => {
                            self.config.base_url = rest.to_string();
                            self.client = client;
                            render::info("base url updated");
                        }
                        Err(err) => render::error(&err),
                    }
                }
            }
            _ => render::info("unknown command, type /help"),
        }
        false
    }

    fn send(&mut self) {
        let missing = self.request.missing_fields();
        if !missing.is_empty() {
            render::error(&format!("set these first: {}", missing.join(", ")));
            return;
        }

        let submitted = match self.client.submit(&self.request) {
            Ok(resp) => resp,
            Err(err) => {
                render::error(&err);
                return;
            }
        };
        render::info(&format!("task {} {}", submitted.task_id, submitted.status));

        let interval = Duration::from_millis(self.config.poll_interval_ms);
        for _ in 0..self.config.poll_attempts {
            match self.client.status(&submitted.task_id) {
                Ok(resp) if resp.is_terminal() => {
                    render::status(&submitted.task_id, &resp);
                    return;
                }
                Ok(_) => thread::sleep(interval),
                Err(err) => {
                    render::error(&err);
                    return;
                }
            }
        }
        render::info(&format!(
            "still running; check later with /status {}",
            submitted.task_id
        ));
    }
}

fn set_field(field: &mut String, name: &str, value: &str) {
    if value.is_empty() {
        render::info(&format!("{}: {}", name, field));
    } else {
        *field = value.to_string();
        render::info(&format!("{} updated", name));
    }
}
