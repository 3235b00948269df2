//! goose CLI - static site generator with live reload.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod config;

#[derive(Parser)]
#[command(name = "goose")]
#[command(about = "Render page templates into a static site, optionally serving it with live reload")]
#[command(version)]
pub struct Cli {
    /// Source directory containing templates/, pages/ and static/
    source: PathBuf,

    /// Locally serve generated site
    #[arg(long)]
    serve: bool,

    /// Directory to generate the site in (defaults to config or "dist")
    #[arg(long)]
    destination: Option<PathBuf>,

    /// Open browser when serving
    #[arg(long)]
    open: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt().with_env_filter(filter).with_target(false).init();

    let file_config = config::load(&cli.source)?;
    let destination = cli
        .destination
        .unwrap_or_else(|| PathBuf::from(&file_config.build.destination));

    let build = commands::build::run(&cli.source, destination)?;

    if cli.serve {
        commands::serve::run(&cli.source, build, &file_config.serve, cli.open).await?;
    }

    Ok(())
}
