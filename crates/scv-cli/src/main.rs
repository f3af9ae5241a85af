use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "scv")]
#[command(about = "Sidecar verification oracle", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode one sidecar file and print its records as JSON lines
    Decode {
        /// Path to a completed sidecar file
        file: String,
    },

    /// Watch the sidecar directory until every expectation is observed
    Verify {
        /// Layered config paths in merge order (defaults apply when omitted)
        #[arg(long = "config")]
        config_paths: Vec<String>,

        /// JSON file: [{"scenario": "...", "record": {...}}, ...]
        #[arg(long)]
        expectations: String,

        /// Refuse to run when the config carries keys nothing reads
        #[arg(long, default_value_t = false)]
        strict_config: bool,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> overrides)
        #[arg(required = true)]
        paths: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Silent when the file does not exist.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let cli = Cli::parse();
    match cli.cmd {
        Commands::Decode { file } => commands::decode::run(&file)?,

        Commands::Verify {
            config_paths,
            expectations,
            strict_config,
        } => {
            let passed = commands::verify::run(&config_paths, &expectations, strict_config).await?;
            if !passed {
                std::process::exit(1);
            }
        }

        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = scv_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }
    }

    Ok(())
}

// stdout carries command output; logs go to stderr.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}
