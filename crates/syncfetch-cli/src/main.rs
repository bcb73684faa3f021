use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "syncfetch",
    about = "Fetch URLs through the syncfetch worker",
    version,
    propagate_version = true
)]
struct Cli {
    /// Bridge config file (syncfetch.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Worker timeout, e.g. 500ms, 30s, 2m
    #[arg(long, global = true)]
    timeout: Option<String>,
    /// Path to the syncfetch-worker executable
    #[arg(long, global = true)]
    worker: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch one URL and write its body to stdout or a file
    Get {
        url: String,
        /// Write the body here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Fetch several URLs into a directory, skipping failures
    GetAll {
        #[arg(required = true)]
        urls: Vec<String>,
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
    /// Send a full request and print status, headers, and body
    Request {
        url: String,
        #[arg(short = 'X', long, default_value = "GET")]
        method: String,
        /// Request header as 'Name: value' (repeatable)
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,
        /// Request body
        #[arg(short, long)]
        data: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("syncfetch=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config = commands::load_config(
        cli.config.as_deref(),
        cli.timeout.as_deref(),
        cli.worker.as_deref(),
    )?;
    let bridge = syncfetch::Bridge::new(config)?;

    match cli.command {
        Commands::Get { url, output } => commands::get::get(&bridge, &url, output.as_deref()),
        Commands::GetAll { urls, out_dir } => commands::get_all::get_all(&bridge, urls, &out_dir),
        Commands::Request {
            url,
            method,
            headers,
            data,
        } => commands::request::request(&bridge, &url, &method, &headers, data),
    }
}
