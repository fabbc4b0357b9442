//! Nucleon CLI - inspect resources and control selectors

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;

use nucleon::{
    BindingConfig, ControlScope, ControlSelector, FixSuggestion, HttpTransport, NucleonError,
    ResourceBinding,
};

#[derive(Parser)]
#[command(name = "nucleon")]
#[command(about = "Nucleon - remote resource bindings and control selectors")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a selector against control paths
    Check {
        /// Selector, e.g. "codes !codes:generate"
        selector: String,

        /// Control paths to test
        #[arg(required = true)]
        paths: Vec<String>,

        /// Only match the named paths, not their descendants
        #[arg(short, long)]
        exact: bool,
    },

    /// Show hidden/readonly/disabled flags for control paths
    Flags {
        #[arg(long, default_value = "")]
        hidden: String,

        #[arg(long, default_value = "")]
        readonly: String,

        #[arg(long, default_value = "")]
        disabled: String,

        /// Re-root the attributes at this control first
        #[arg(long)]
        zoom: Option<String>,

        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Load a resource through a binding and print it
    Get {
        /// Absolute URL of the resource
        href: String,

        /// YAML file with request defaults
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Check {
            selector,
            paths,
            exact,
        } => check(&selector, &paths, exact),
        Commands::Flags {
            hidden,
            readonly,
            disabled,
            zoom,
            paths,
        } => flags(&hidden, &readonly, &disabled, zoom.as_deref(), &paths),
        Commands::Get { href, config } => get(&href, config).await,
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        if let Some(suggestion) = e
            .downcast_ref::<NucleonError>()
            .and_then(|n| n.fix_suggestion())
        {
            eprintln!("  {} {}", "Fix:".yellow(), suggestion);
        }
        std::process::exit(1);
    }
}

fn mark(selected: bool) -> colored::ColoredString {
    if selected {
        "✓".green()
    } else {
        "✗".red()
    }
}

fn check(selector: &str, paths: &[String], exact: bool) -> anyhow::Result<()> {
    let selector = ControlSelector::compile(selector)?;
    println!("{} {}", "Selector:".cyan().bold(), selector);
    for path in paths {
        println!("  {} {}", mark(selector.matches(path, exact)), path);
    }
    Ok(())
}

fn flags(
    hidden: &str,
    readonly: &str,
    disabled: &str,
    zoom: Option<&str>,
    paths: &[String],
) -> anyhow::Result<()> {
    let mut scope = ControlScope::from_attributes(Some(hidden), Some(readonly), Some(disabled))?;
    if let Some(prefix) = zoom {
        scope = scope.zoom(prefix);
    }
    for path in paths {
        let flags = scope.flags(path);
        println!(
            "{} hidden={} readonly={} disabled={}",
            path.bold(),
            mark(flags.hidden),
            mark(flags.readonly),
            mark(flags.disabled)
        );
    }
    Ok(())
}

async fn get(href: &str, config: Option<PathBuf>) -> anyhow::Result<()> {
    let config = match config {
        Some(path) => BindingConfig::load(&path)?,
        None => BindingConfig::default(),
    };
    let transport = HttpTransport::from_config(&config)?;
    let binding: ResourceBinding = ResourceBinding::with_config(Arc::new(transport), config);

    println!("{} {}", "→".cyan(), href.cyan().bold());
    binding.set_href(Some(href))?.await;

    if let Some(failure) = binding.failure() {
        anyhow::bail!("request failed ({:?}): {}", failure.kind, failure);
    }

    let data = binding.data().context("binding settled without a resource")?;
    println!("{}", serde_json::to_string_pretty(&data)?);
    Ok(())
}
