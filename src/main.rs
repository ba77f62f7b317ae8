use std::path::PathBuf;

use clap::Parser;
use trigwatch_lib::RunOptions;

/// Watches on-screen text for trigger markers and carries out the goals they contain.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config.toml (defaults to next to the executable, then the working directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Command library file
    #[arg(long)]
    library: Option<PathBuf>,

    /// Focus anchor: "tab", "window:<title>" or "search:<text>"
    #[arg(long)]
    anchor: Option<String>,

    /// Seconds of inactivity before the idle routine runs (0 disables it)
    #[arg(long)]
    idle_timeout: Option<u64>,

    /// OCR helper that prints positioned text as JSON
    #[arg(long)]
    perception_command: Option<String>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let options = RunOptions {
        config_path: cli.config,
        library_path: cli.library,
        anchor: cli.anchor,
        idle_timeout_secs: cli.idle_timeout,
        perception_command: cli.perception_command,
    };

    if let Err(e) = trigwatch_lib::run(options).await {
        eprintln!("trigwatch: {e}");
        std::process::exit(1);
    }
}
