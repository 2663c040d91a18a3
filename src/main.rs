use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use codescope::analysis::CapabilityRegistry;
use codescope::config::{load_config, AnalyzerConfig};
use codescope::error::Result;
use codescope::observability::init_logging;
use codescope::types::{AnalysisKind, JobMessage};

/// Python source structure analyzer with a submit/stream HTTP API.
#[derive(Parser, Debug)]
#[command(name = "codescope", version, about)]
struct Cli {
    /// Path to a YAML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP server
    Serve {
        /// Address to bind (overrides config and CODESCOPE_ADDR)
        #[arg(long)]
        addr: Option<String>,
    },

    /// Analyze one file and print the resulting message as JSON
    Analyze {
        file: PathBuf,

        /// structure, complexity, or dependencies
        #[arg(long, default_value = "structure")]
        kind: String,
    },

    /// Print the effective configuration as YAML
    Config,
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let project_root = std::env::current_dir().ok();
    let mut config = load_config(cli.config.as_deref(), project_root.as_deref())?;

    match cli.command {
        Commands::Serve { addr } => {
            if let Some(addr) = addr {
                config.server.addr = addr;
            }
            serve(config)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Analyze { file, kind } => analyze_file(&file, &kind),
        Commands::Config => {
            print!("{}", serde_yaml::to_string(&config)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn serve(config: AnalyzerConfig) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(codescope::server::run_server(config))
}

fn analyze_file(path: &Path, kind: &str) -> Result<ExitCode> {
    let Some(kind) = AnalysisKind::from_str_loose(kind) else {
        eprintln!("error: unknown analysis kind {kind:?}; expected structure, complexity, or dependencies");
        return Ok(ExitCode::from(2));
    };
    let source = std::fs::read_to_string(path)?;
    let registry = CapabilityRegistry::with_defaults();
    let message = match registry.resolve(kind).analyze(&source) {
        Ok(facts) => JobMessage::Result(facts),
        Err(e) => JobMessage::Error(e.to_string()),
    };
    println!("{}", message.to_json());
    Ok(if message.is_error() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
