//! Vizexec CLI
//!
//! Runs the visualization service, or a single script from the command line.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::{Level, debug, info};
use tracing_subscriber::EnvFilter;
use vizexec::{
    Config, EXAMPLE_CONFIG, ExecutionResult, Runner, SourceLanguage, SubmissionRequest, server,
};

#[derive(Parser)]
#[command(name = "vizexec")]
#[command(about = "A service for running visualization scripts and publishing their output")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP service
    Serve {
        /// Listen address (overrides the configured `bind`)
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Run one script and print the artifact location
    Run {
        /// Script file to run
        #[arg(value_name = "FILE")]
        source: PathBuf,

        /// Language (python or r)
        #[arg(short, long)]
        language: String,

        /// Visualization kind (static, interactive, 3d)
        #[arg(short, long, default_value = "static")]
        kind: String,

        /// Plotting library hint, recorded in logs only
        #[arg(long)]
        library: Option<String>,
    },

    /// Initialize a new configuration file
    Init {
        /// Output path (default: vizexec.toml)
        #[arg(short, long, default_value = "vizexec.toml")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Show the effective configuration
    ShowConfig,

    /// Delete artifacts older than the retention period
    Sweep {
        /// Maximum artifact age in seconds (overrides the configured `retention`)
        #[arg(short, long)]
        max_age: Option<f64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Init { output, force } => init_config(&output, force).await,
        Commands::Serve { bind } => run_server(load_config(cli.config.as_deref())?, bind).await,
        Commands::Run {
            source,
            language,
            kind,
            library,
        } => {
            let config = load_config(cli.config.as_deref())?;
            run_script(config, &source, language, kind, library).await
        }
        Commands::ShowConfig => {
            show_config(&load_config(cli.config.as_deref())?);
            Ok(())
        }
        Commands::Sweep { max_age } => run_sweep(load_config(cli.config.as_deref())?, max_age).await,
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => info!(?path, "loading configuration"),
        None => debug!("using default configuration"),
    }
    Config::load(path).context("failed to load configuration")
}

async fn run_server(config: Config, bind: Option<String>) -> Result<()> {
    let addr = bind.unwrap_or_else(|| config.bind.clone());
    let runner = Runner::from_config(config)
        .await
        .context("failed to prepare workspace")?;

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    server::serve(runner, listener)
        .await
        .context("server error")
}

async fn run_script(
    config: Config,
    source: &Path,
    language: String,
    kind: String,
    library: Option<String>,
) -> Result<()> {
    let code = tokio::fs::read_to_string(source)
        .await
        .context("failed to read script file")?;

    let runner = Runner::from_config(config)
        .await
        .context("failed to prepare workspace")?;

    let request = SubmissionRequest {
        source_language: Some(language),
        library_hint: library,
        visualization_kind: Some(kind),
        code: Some(code),
    };
    let outcome = runner.submit_request(request).await?;
    let result = &outcome.result;

    // Log execution info via tracing (stderr), keeping stdout clean for piping
    info!(
        id = %outcome.id,
        status = ?result.status,
        wall_time = format_args!("{:.3}s", result.wall_time.as_secs_f64()),
        exit_code = result.exit_code,
        "execution result"
    );

    if result.is_success() {
        match &result.artifact_url {
            Some(url) => println!("{url}"),
            None => println!("{}", outcome.artifact_path.display()),
        }
        Ok(())
    } else {
        if let Some(diagnostics) = &result.diagnostics {
            eprintln!("{diagnostics}");
        }
        std::process::exit(exit_code(result));
    }
}

/// Process exit code for a finished run: 0 on success, 1 otherwise
fn exit_code(result: &ExecutionResult) -> i32 {
    if result.is_success() { 0 } else { 1 }
}

async fn run_sweep(config: Config, max_age: Option<f64>) -> Result<()> {
    let max_age = match max_age {
        Some(secs) if secs.is_finite() && secs > 0.0 => Duration::from_secs_f64(secs),
        Some(secs) => anyhow::bail!("max age must be a positive number of seconds, got {secs}"),
        None => config
            .retention_duration()
            .context("no retention configured; set `retention` or pass --max-age")?,
    };

    let runner = Runner::from_config(config)
        .await
        .context("failed to prepare workspace")?;
    let removed = runner
        .workspace()
        .sweep_outputs(max_age)
        .await
        .context("sweep failed")?;

    println!("Removed {removed} artifact(s)");
    Ok(())
}

fn show_config(config: &Config) {
    println!("Service:");
    println!("  Bind: {}", config.bind);
    println!("  Public URL: {}", config.public_url);
    println!("  URL prefix: {}", config.url_prefix);
    println!();
    println!("Storage:");
    println!("  Scripts: {}", config.scripts_dir.display());
    println!("  Outputs: {}", config.outputs_dir.display());
    println!("  Retention: {:?} s", config.retention);
    println!();
    println!("Execution:");
    println!("  Timeout: {:?} s", config.timeout);
    println!("  Verify artifact: {}", config.verify_artifact);
    println!("  Max diagnostics: {} bytes", config.max_diagnostics);
    println!(
        "  Outputs: image={} document={}",
        config.outputs.image, config.outputs.document
    );
    println!();
    println!("Languages:");
    for language in SourceLanguage::ALL {
        let interpreter = config.interpreter(language);
        println!(
            "  {:<8} {} (.{})",
            language.id(),
            interpreter.command.join(" "),
            interpreter.extension
        );
    }
}

async fn init_config(output: &Path, force: bool) -> Result<()> {
    if output.exists() && !force {
        anyhow::bail!(
            "Configuration file already exists at '{}'. Use --force to overwrite.",
            output.display()
        );
    }

    tokio::fs::write(output, EXAMPLE_CONFIG)
        .await
        .context("failed to write configuration file")?;

    println!("Created configuration file at '{}'", output.display());
    Ok(())
}
