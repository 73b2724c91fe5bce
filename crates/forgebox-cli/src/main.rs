//! Forgebox CLI
//!
//! Builds and runs source bundles from a directory or a JSON request file and
//! prints the response as JSON.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use forgebox::{
    Config, DEFAULT_ENTRYPOINT, EXAMPLE_CONFIG, Mode, Pipeline, Response, SubmissionRequest,
};
use tracing::{Level, debug, error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "forgebox")]
#[command(about = "Compile and run source bundles in throwaway workspaces")]
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
    /// Initialize a new configuration file
    Init {
        /// Output path (default: forgebox.toml)
        #[arg(short, long, default_value = "forgebox.toml")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Build the sources in a directory without running them
    Build {
        /// Directory holding the source files
        #[arg(value_name = "DIR")]
        dir: PathBuf,

        /// File to start compiling from, relative to DIR
        #[arg(short, long, default_value = DEFAULT_ENTRYPOINT)]
        entrypoint: String,
    },

    /// Build the sources in a directory and run the result
    Run {
        /// Directory holding the source files
        #[arg(value_name = "DIR")]
        dir: PathBuf,

        /// File to start compiling from, relative to DIR
        #[arg(short, long, default_value = DEFAULT_ENTRYPOINT)]
        entrypoint: String,

        /// File whose contents are fed to the program's stdin
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Arguments passed to the program
        #[arg(last = true)]
        args: Vec<String>,
    },

    /// Process a JSON request body
    Submit {
        /// Request file (`files`, `entrypoint`, `args`, `stdin`)
        #[arg(value_name = "REQUEST")]
        request: PathBuf,

        /// Stop after building
        #[arg(long)]
        build_only: bool,
    },

    /// Show the effective configuration
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    // stdout is reserved for the JSON response
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = if let Some(ref path) = cli.config {
        info!(?path, "loading configuration");
        Config::from_file(path).context("failed to load configuration")?
    } else {
        debug!("using default configuration");
        Config::default()
    };

    match cli.command {
        Commands::Init { output, force } => init_config(&output, force).await,
        Commands::Build { dir, entrypoint } => {
            let request = SubmissionRequest::new(collect_files(&dir)?, entrypoint);
            submit(config, &request, Mode::Build).await
        }
        Commands::Run {
            dir,
            entrypoint,
            input,
            args,
        } => {
            let mut request = SubmissionRequest::new(collect_files(&dir)?, entrypoint).with_args(args);
            if let Some(path) = input {
                let stdin = tokio::fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("failed to read input file '{}'", path.display()))?;
                request = request.with_stdin(stdin);
            }
            submit(config, &request, Mode::Run).await
        }
        Commands::Submit {
            request,
            build_only,
        } => {
            let body = tokio::fs::read_to_string(&request)
                .await
                .context("failed to read request file")?;
            let request: SubmissionRequest =
                serde_json::from_str(&body).context("malformed request body")?;
            let mode = if build_only { Mode::Build } else { Mode::Run };
            submit(config, &request, mode).await
        }
        Commands::ShowConfig => {
            show_config(&config);
            Ok(())
        }
    }
}

async fn submit(config: Config, request: &SubmissionRequest, mode: Mode) -> Result<()> {
    let pipeline = Pipeline::new(config).context("failed to set up pipeline")?;

    let response = match pipeline.process(request, mode).await {
        Ok(outcome) => Response::from(outcome),
        Err(e) => {
            error!(error = %e, "internal failure");
            Response::internal_error()
        }
    };

    println!("{}", serde_json::to_string_pretty(&response)?);

    if !response.success {
        std::process::exit(1);
    }
    Ok(())
}

/// Read every regular file under `dir`, keyed by its `/`-joined relative path
fn collect_files(dir: &Path) -> Result<BTreeMap<String, String>> {
    let mut files = BTreeMap::new();
    let mut pending = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        let entries = std::fs::read_dir(&current)
            .with_context(|| format!("failed to read directory '{}'", current.display()))?;

        for entry in entries {
            let path = entry?.path();
            let file_type = std::fs::symlink_metadata(&path)?.file_type();

            if file_type.is_dir() {
                pending.push(path);
            } else if file_type.is_file() {
                let relative = path.strip_prefix(dir)?;
                let key = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                let content = std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read source file '{}'", path.display()))?;
                files.insert(key, content);
            }
        }
    }

    debug!(count = files.len(), dir = %dir.display(), "collected source files");
    Ok(files)
}

fn show_config(config: &Config) {
    println!("Workspace root: {}", config.workspace_root.display());
    println!();
    println!("Toolchain:");
    println!("  Command: {}", config.toolchain.command.join(" "));
    println!("  Build subcommand: {}", config.toolchain.build_subcommand);
    let mut env: Vec<_> = config.toolchain.env.iter().collect();
    env.sort();
    for (key, value) in env {
        println!("  Env: {key}={value}");
    }
    println!();
    println!("Limits:");
    println!("  Build timeout: {} ms", config.limits.build_timeout_ms);
    println!("  Run timeout: {} ms", config.limits.run_timeout_ms);
    println!("  Max output: {} bytes", config.limits.max_output_bytes);
    println!();
    println!("Execution:");
    println!("  Stdin mode: {:?}", config.execution.stdin_mode);
    println!("  Shell: {}", config.execution.shell.display());
    println!(
        "  Build stdout is failure: {}",
        config.execution.build_stdout_is_failure
    );
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
