use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use epigen_core::config::slashed;
use epigen_core::{Config, CoreError, Manifest, compile, dependencies, outputs};
use tracing_subscriber::EnvFilter;

/// Generates C++ reflection code from `.epi` sources.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[arg(short = 'i', long, value_name = "DIR", help = "Directory containing the .epi sources")]
    dir_input: PathBuf,

    #[arg(short, long, value_name = "FILE", help = "JSON manifest listing the module directories")]
    manifest: Option<PathBuf>,

    #[arg(short = 'o', long, value_name = "DIR", help = "Directory for .h/.cpp (defaults to the input directory)")]
    dir_output: Option<PathBuf>,

    #[arg(long, value_name = "DIR", help = "Directory for .hxx/.cxx and the cache (defaults to the output directory)")]
    dir_output_build: Option<PathBuf>,

    #[arg(long, help = "Log at debug level unless RUST_LOG says otherwise")]
    debug: bool,

    #[arg(long, help = "Regenerate everything and do not touch the cache file")]
    no_caching: bool,

    #[arg(long, value_name = "GLOB", num_args = 1.., help = "Source paths to skip, relative to the input directory")]
    ignore_list: Vec<String>,

    #[arg(long, help = "Print the .epi files the build depends on and exit")]
    print_dependencies: bool,

    #[arg(long, help = "Print the files the build produces and exit")]
    print_outputs: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.debug);
    match execute(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report(&err);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn execute(cli: Cli) -> Result<()> {
    let config = config(&cli)?;

    if cli.print_dependencies {
        println!("{}", joined(&dependencies(&config)?));
        return Ok(());
    }
    if cli.print_outputs {
        println!("{}", joined(&outputs(&config)?));
        return Ok(());
    }

    let manifest = match &cli.manifest {
        Some(path) => Manifest::load(path)
            .with_context(|| format!("failed to load manifest {}", path.display()))?,
        None => Manifest::default(),
    };

    let report = compile(&config, &manifest)?;
    tracing::info!(
        sources = report.sources,
        written = report.written.len(),
        "generation finished"
    );
    Ok(())
}

fn config(cli: &Cli) -> Result<Config> {
    let dir_input = absolute(&cli.dir_input)?;
    let mut config = Config::new(dir_input)
        .with_caching(!cli.no_caching)
        .with_ignore_patterns(cli.ignore_list.iter().cloned());
    if let Some(dir) = &cli.dir_output {
        config = config.with_output(absolute(dir)?);
    }
    if let Some(dir) = &cli.dir_output_build {
        config = config.with_output_build(absolute(dir)?);
    }
    Ok(config)
}

fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).with_context(|| format!("failed to resolve {}", path.display()))
}

fn joined(paths: &[PathBuf]) -> String {
    let parts: Vec<String> = paths.iter().map(|path| slashed(path)).collect();
    parts.join(";")
}

/// Prints diagnostics one per line, or the error chain for other failures.
fn report(err: &anyhow::Error) {
    match err.downcast_ref::<CoreError>() {
        Some(core) if !core.diagnostics().is_empty() => {
            for diagnostic in core.diagnostics() {
                eprintln!("{diagnostic}");
            }
        }
        _ => eprintln!("error: {err:#}"),
    }
}
