//! dummytagger CLI - run the template stage over a token stream
//!
//! Reads tab-separated tokens from stdin (or a file), passes them through the
//! selected tools and writes the result to stdout (or a file). `serve` starts
//! the debug HTTP server instead.

use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use dummytagger::runtime::{build_pipeline, init_everything, ToolRegistry, ToolsConfig};
use dummytagger::server::{self, AppState};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dummytagger")]
#[command(version, about = "Template stage for tab-separated NLP pipelines", long_about = None)]
struct Cli {
    /// Tool configuration (YAML). Defaults to the built-in dummy-tagger table
    #[arg(short, long, global = true, env = "DUMMYTAGGER_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run tools over a token stream
    Run {
        /// Tools or presets, in pipeline order
        #[arg(default_value = "dummy-tagger")]
        tools: Vec<String>,

        /// Input file (default: stdin)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Start the debug HTTP server
    Serve {
        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        host: std::net::IpAddr,

        /// Port to listen on
        #[arg(short, long, env = "PORT", default_value = "5000")]
        port: u16,
    },

    /// List configured tools and presets
    Tools,
}

fn main() {
    // Load environment variables
    dotenv::dotenv().ok();

    // Logs go to stderr; stdout carries the token stream
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run { tools, input, output } => run(cli.config, tools, input, output),
        Commands::Serve { host, port } => serve(cli.config, SocketAddr::new(host, port)),
        Commands::Tools => list_tools(cli.config),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn load_config(path: Option<PathBuf>) -> Result<ToolsConfig, String> {
    match path {
        Some(path) => {
            tracing::info!("Loading tool configuration from {}", path.display());
            ToolsConfig::load_from_file(&path).map_err(|e| e.to_string())
        }
        None => Ok(ToolsConfig::builtin()),
    }
}

/// Run the pipeline between the given streams
fn run(
    config: Option<PathBuf>,
    tools: Vec<String>,
    input: Option<PathBuf>,
    output: Option<PathBuf>,
) -> Result<(), String> {
    let config = load_config(config)?;
    let inited = init_everything(&config, &ToolRegistry::with_builtins()).map_err(|e| e.to_string())?;

    let reader: Box<dyn io::BufRead> = match input {
        Some(path) => Box::new(BufReader::new(
            File::open(&path).map_err(|e| format!("Failed to open {}: {}", path.display(), e))?,
        )),
        None => Box::new(io::stdin().lock()),
    };

    let writer: Box<dyn io::Write> = match output {
        Some(path) => Box::new(BufWriter::new(
            File::create(&path).map_err(|e| format!("Failed to create {}: {}", path.display(), e))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    let stats = build_pipeline(reader, writer, &tools, &inited, &config.presets)
        .map_err(|e| e.to_string())?;

    tracing::info!(
        sentences = stats.sentences,
        tokens = stats.tokens,
        "Finished"
    );
    Ok(())
}

/// Start the debug server on a fresh runtime
fn serve(config: Option<PathBuf>, addr: SocketAddr) -> Result<(), String> {
    let config = load_config(config)?;
    let tools = init_everything(&config, &ToolRegistry::with_builtins()).map_err(|e| e.to_string())?;

    let state = Arc::new(AppState {
        name: env!("CARGO_PKG_NAME").to_string(),
        tools,
        presets: config.presets,
    });

    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| format!("Failed to start async runtime: {}", e))?;

    runtime
        .block_on(server::serve(addr, state))
        .map_err(|e| format!("Server error: {}", e))
}

fn list_tools(config: Option<PathBuf>) -> Result<(), String> {
    let config = load_config(config)?;

    for (name, entry) in &config.tools {
        let sources: Vec<&str> = entry.options.source_fields.iter().map(String::as_str).collect();
        println!(
            "{}\t{}\tsource=[{}]\ttarget=[{}]",
            name,
            entry.kind,
            sources.join(","),
            entry.options.target_fields.join(",")
        );
    }
    for (name, members) in &config.presets {
        println!("{}\tpreset\t{}", name, members.join(" "));
    }
    Ok(())
}
