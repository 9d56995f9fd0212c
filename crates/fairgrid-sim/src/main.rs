use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "fairgrid-sim",
    about = "Replay node offers against a fair-share application attempt",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a scenario file and print what each offer produced
    Run {
        /// Path to the scenario TOML file
        #[arg(short, long)]
        scenario: String,
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    /// Validate a scheduler config and print the resolved settings
    CheckConfig {
        /// Path to a TOML file with a [scheduler] table
        #[arg(short, long)]
        config: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive("fairgrid=info".parse()?);
    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    match cli.command {
        Commands::Run { scenario, format } => commands::run::run(&scenario, &format),
        Commands::CheckConfig { config } => commands::check_config::check_config(&config),
    }
}
