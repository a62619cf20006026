use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::output::OutputFormat;

#[derive(Parser)]
#[command(name = "parley")]
#[command(version, about = "Parley - guarded LLM turn orchestration")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Settings file (defaults to ~/.config/parley/config.toml)
    #[arg(long, global = true, env = "PARLEY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one conversational turn
    Chat(ChatArgs),

    /// Evaluate a message against the guardrail policy without calling a backend
    Check(CheckArgs),

    /// Print the effective settings
    Settings,
}

#[derive(Args, Default)]
pub struct ChatArgs {
    /// User message
    pub message: String,

    /// Session ID (a random one is generated when omitted)
    #[arg(short, long)]
    pub session: Option<String>,

    /// Base system prompt
    #[arg(long)]
    pub system: Option<String>,

    /// Allowed theme, may be repeated
    #[arg(long = "theme")]
    pub themes: Vec<String>,

    /// Retrieved context appended to the system prompt
    #[arg(long)]
    pub context: Option<String>,

    /// Agent identity used for tool restrictions
    #[arg(long)]
    pub agent: Option<String>,

    /// Offer the built-in tools to the backend
    #[arg(long)]
    pub tools: bool,

    /// Override the tool iteration bound
    #[arg(long)]
    pub max_tool_iterations: Option<usize>,

    /// Mask personal data before it reaches the backend
    #[arg(long)]
    pub mask_pii: bool,

    /// JSON file with scripted backend steps
    #[arg(long)]
    pub script: Option<PathBuf>,
}

#[derive(Args, Default)]
pub struct CheckArgs {
    /// Message to evaluate
    pub message: String,

    /// Allowed theme, may be repeated
    #[arg(long = "theme")]
    pub themes: Vec<String>,
}
