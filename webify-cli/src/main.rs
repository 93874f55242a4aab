//! # webify CLI
//!
//! Command-line interface for the webify static site builder.

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "webify")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(long, default_value = "webify.yml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile the index graph into the output directory
    Build {
        /// Root index document
        #[arg(long)]
        index: Option<String>,

        /// Output directory
        #[arg(long)]
        output: Option<PathBuf>,

        /// Site baseurl, e.g. the repository name for project pages
        #[arg(long, env = "WEBIFY_BASEURL")]
        baseurl: Option<String>,

        /// GitHub repository (`user/repo`) used for Colab links
        #[arg(long, env = "GITHUB_REPOSITORY")]
        repo_full_name: Option<String>,

        /// Directory holding `template` directive templates
        #[arg(long)]
        templates: Option<PathBuf>,
    },

    /// Sanity-check the index graph without writing anything
    Check {
        /// Root index document
        #[arg(long)]
        index: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(if cli.verbose {
                tracing::Level::DEBUG.into()
            } else {
                tracing::Level::INFO.into()
            }),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Build {
            index,
            output,
            baseurl,
            repo_full_name,
            templates,
        } => {
            let overrides = commands::BuildOverrides {
                index,
                output,
                baseurl,
                repo_full_name,
                templates,
            };
            commands::build_site(&cli.config, overrides)
        }
        Commands::Check { index } => commands::check_site(&cli.config, index),
    }
}
