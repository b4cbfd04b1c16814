use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cs_cli::commands::{export, import, label, segment, status};
use cs_cli::{Cli, Commands, Config};

/// Load config and open database, ensuring the parent directory exists.
fn open_database(config_path: Option<&Path>) -> Result<(cs_db::Database, Config)> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }

    let db = cs_db::Database::open(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path.display()))?;
    Ok((db, config))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    match &cli.command {
        Some(Commands::Import { input, replace }) => {
            let (mut db, _config) = open_database(cli.config.as_deref())?;
            match input {
                Some(path) => {
                    let file = File::open(path)
                        .with_context(|| format!("failed to open {}", path.display()))?;
                    import::run(BufReader::new(file), &mut out, &mut db, *replace)?;
                }
                None => {
                    import::run(io::stdin().lock(), &mut out, &mut db, *replace)?;
                }
            }
        }
        Some(Commands::Segment { json }) => {
            let (mut db, config) = open_database(cli.config.as_deref())?;
            let pipeline = config.pipeline().context("invalid configuration")?;
            segment::run(&mut out, &mut db, &pipeline, *json)?;
        }
        Some(Commands::Label { json }) => {
            let (mut db, config) = open_database(cli.config.as_deref())?;
            let pipeline = config.pipeline().context("invalid configuration")?;
            label::run(&mut out, &mut db, &pipeline.target_domain, *json)?;
        }
        Some(Commands::Status) => {
            let (db, config) = open_database(cli.config.as_deref())?;
            status::run(&mut out, &db, &config)?;
        }
        Some(Commands::Export { table }) => {
            let (db, _config) = open_database(cli.config.as_deref())?;
            let written = export::run(&mut out, &db, *table)?;
            tracing::debug!(written, ?table, "exported table");
        }
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    match out.flush() {
        // The reader went away (e.g., piped to `head`)
        Err(err) if err.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        result => result.context("failed to write output"),
    }
}
