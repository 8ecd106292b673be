use clap::Parser;

use crate::models::CLIConfig;

#[derive(Debug, Parser)]
#[command(name = "prompt-cli", version, about = "Interactive client for the prompt generator API")]
struct Args {
    /// Base URL of the API.
    #[arg(long = "base", env = "PROMPT_API_URL", default_value = "http://localhost:8080")]
    base_url: String,

    /// Status polls after a submit before giving up.
    #[arg(long, default_value_t = 30)]
    poll_attempts: usize,

    /// Delay between status polls, in milliseconds.
    #[arg(long, default_value_t = 1000)]
    poll_interval_ms: u64,
}

pub fn parse_config() -> CLIConfig {
    let args = Args::parse();
    CLIConfig {
        base_url: args.base_url,
        poll_attempts: args.poll_attempts.max(1),
        poll_interval_ms: args.poll_interval_ms,
    }
}
