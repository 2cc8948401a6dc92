//! Film Lab CLI - Bridge interface for the service layer
//!
//! Commands: services, provision, matrix, validate, apply
//! Outputs JSON to stdout, logs and errors to stderr
//! Returns 2 when any row of a batch is rejected

use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use filmlab_core::{
    EngineConfig, FeatureToggleSet, Lab, OfferingEngine, ReferenceData, ENGINE_VERSION,
};

#[derive(Parser)]
#[command(name = "filmlab-cli")]
#[command(about = "Film Lab CLI - Service Compatibility and Pricing Engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Reference data JSON (defaults to the built-in catalog)
    #[arg(short, long, global = true)]
    reference: Option<PathBuf>,

    /// Engine configuration JSON
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// List every valid service
    Services,

    /// Create a lab seeded with every valid service
    Provision {
        #[arg(short, long)]
        name: String,

        #[arg(short, long)]
        owner: String,

        /// JSON payload (FeatureToggleSet)
        #[arg(short, long)]
        toggles: Option<String>,
    },

    /// Show the pricing matrix of a lab
    Matrix {
        /// Lab JSON file
        #[arg(short, long)]
        lab: PathBuf,
    },

    /// Validate an offering batch without applying it
    Validate {
        /// Lab JSON file
        #[arg(short, long)]
        lab: PathBuf,

        /// JSON payload (array of proposed offerings)
        #[arg(short, long)]
        payload: String,
    },

    /// Validate an offering batch and print the updated lab
    Apply {
        /// Lab JSON file
        #[arg(short, long)]
        lab: PathBuf,

        /// JSON payload (array of proposed offerings)
        #[arg(short, long)]
        payload: String,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "filmlab_core=warn",
        1 => "filmlab_core=debug",
        _ => "filmlab_core=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn fail(message: String) -> ExitCode {
    let output = serde_json::json!({ "success": false, "error": message });
    eprintln!("{}", output);
    ExitCode::FAILURE
}

fn print_json(value: &impl serde::Serialize) -> Result<(), String> {
    let text = serde_json::to_string_pretty(value).map_err(|e| e.to_string())?;
    println!("{}", text);
    Ok(())
}

fn load_lab(path: &Path) -> Result<Lab, String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read lab {}: {}", path.display(), e))?;
    serde_json::from_str(&content).map_err(|e| format!("Invalid lab: {}", e))
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let reference = match &cli.reference {
        Some(path) => match ReferenceData::load(path) {
            Ok(r) => r,
            Err(e) => return fail(e.to_string()),
        },
        None => ReferenceData::standard(),
    };
    let config = match &cli.config {
        Some(path) => match EngineConfig::load(path) {
            Ok(c) => c,
            Err(e) => return fail(e.to_string()),
        },
        None => EngineConfig::default(),
    };

    let engine = match OfferingEngine::new(reference, config) {
        Ok(engine) => engine,
        Err(e) => return fail(e.to_string()),
    };

    match run(&engine, cli.command) {
        Ok(code) => code,
        Err(message) => fail(message),
    }
}

fn run(engine: &OfferingEngine, command: Commands) -> Result<ExitCode, String> {
    match command {
        Commands::Services => {
            let output = serde_json::json!({
                "engineVersion": ENGINE_VERSION,
                "services": engine.services(),
            });
            print_json(&output)?;
            Ok(ExitCode::SUCCESS)
        }

        Commands::Provision { name, owner, toggles } => {
            let toggles: FeatureToggleSet = match toggles {
                Some(json) => serde_json::from_str(&json)
                    .map_err(|e| format!("Invalid toggles: {}", e))?,
                None => FeatureToggleSet::default(),
            };
            let lab = engine.provision_lab(&name, &owner, toggles);
            print_json(&lab)?;
            Ok(ExitCode::SUCCESS)
        }

        Commands::Matrix { lab } => {
            let lab = load_lab(&lab)?;
            let matrix = engine.pricing_matrix(&lab).map_err(|e| e.to_string())?;
            print_json(&matrix)?;
            Ok(ExitCode::SUCCESS)
        }

        Commands::Validate { lab, payload } => {
            let lab = load_lab(&lab)?;
            let outcome = engine
                .validate_update_json(&lab, &payload)
                .map_err(|e| e.to_string())?;
            print_json(&outcome)?;
            Ok(exit_for(outcome.is_clean()))
        }

        Commands::Apply { lab, payload } => {
            let mut lab = load_lab(&lab)?;
            let batch = filmlab_core::parse_batch(&payload).map_err(|e| e.to_string())?;
            let outcome = engine
                .apply_update(&mut lab, &batch)
                .map_err(|e| e.to_string())?;
            let clean = outcome.is_clean();
            print_json(&serde_json::json!({ "lab": lab, "outcome": outcome }))?;
            Ok(exit_for(clean))
        }
    }
}

fn exit_for(clean: bool) -> ExitCode {
    if clean {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2) // Rejected rows
    }
}
