//! weft CLI - Main entry point

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use weft_template::TrimMode;

mod commands;
mod config;
mod diagnostics;

#[derive(Parser)]
#[command(name = "weft")]
#[command(version)]
#[command(about = "weft template engine", long_about = None)]
struct Cli {
    /// Configuration file (defaults to ./weft.toml when present)
    #[arg(short = 'c', long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a template against a JSON state table
    Render {
        /// Template file
        template: PathBuf,

        /// JSON object used as the initial state table
        #[arg(short = 'd', long)]
        data: Option<PathBuf>,

        /// Write output to FILE instead of stdout
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Additional directory searched by #parse and #include
        #[arg(short = 'I', long = "template-dir")]
        template_dirs: Vec<PathBuf>,

        /// Report lookup warnings as errors
        #[arg(long)]
        strict: bool,

        /// Whitespace policy around directives (standard or greedy)
        #[arg(long)]
        trim: Option<TrimMode>,

        /// Print diagnostics as JSON
        #[arg(long)]
        json_errors: bool,
    },

    /// Parse a template and report syntax errors without evaluating it
    Check {
        /// Template files
        templates: Vec<PathBuf>,

        /// Whitespace policy around directives (standard or greedy)
        #[arg(long)]
        trim: Option<TrimMode>,
    },

    /// Print the token stream of a template
    Tokens {
        /// Template file
        template: PathBuf,

        /// Whitespace policy around directives (standard or greedy)
        #[arg(long)]
        trim: Option<TrimMode>,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "weft=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let mut config = config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Render {
            template,
            data,
            output,
            template_dirs,
            strict,
            trim,
            json_errors,
        } => {
            config.template_dirs.extend(template_dirs);
            config.strict |= strict;
            if let Some(trim) = trim {
                config.trim = trim;
            }
            commands::render::execute(commands::render::RenderArgs {
                template,
                data,
                output,
                json_errors,
                config,
            })
        }
        Commands::Check { templates, trim } => {
            if let Some(trim) = trim {
                config.trim = trim;
            }
            commands::check::execute(&templates, &config)
        }
        Commands::Tokens { template, trim } => {
            commands::tokens::execute(&template, trim.unwrap_or(config.trim))
        }
    }
}
