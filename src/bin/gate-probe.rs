use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use readiness_gate::config::loader::load_config;
use readiness_gate::health::{HttpStatusLookup, StatusLookup, READY_STATUS};

#[derive(Parser)]
#[command(name = "gate-probe")]
#[command(about = "Run one readiness pass against the configured dependencies", long_about = None)]
struct Cli {
    /// Path to the gate's TOML configuration file.
    #[arg(short, long)]
    config: PathBuf,

    /// Check only these dependencies instead of the configured list.
    #[arg(short, long)]
    dependency: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    let lookup = HttpStatusLookup::new(&config.status);

    let dependencies = if cli.dependency.is_empty() {
        config.gate.dependencies.clone()
    } else {
        cli.dependency
    };

    let mut all_ready = true;
    for dependency in &dependencies {
        match lookup.status(dependency).await {
            Ok(status) => {
                let marker = if status == READY_STATUS { "ready" } else { "NOT READY" };
                all_ready &= status == READY_STATUS;
                println!("{:<24} {:<12} {}", dependency, marker, status);
            }
            Err(e) => {
                all_ready = false;
                println!("{:<24} {:<12} {}", dependency, "ERROR", e);
            }
        }
    }

    if dependencies.is_empty() {
        println!("gate '{}' has no dependencies; requests forward immediately", config.gate.name);
    }

    Ok(if all_ready { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
