mod assets;
mod catalog;
mod config;
mod fragment;
mod search;
mod ui;

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use directories::BaseDirs;
use serde::Serialize;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use catalog::Catalog;
use config::Config;

const LOG_FILE_NAME: &str = "ocrcat.log";

#[derive(Parser, Debug)]
#[command(name = "ocrcat", about = "Search an OCR page catalog and view its page images")]
struct Cli {
    /// Configuration file (defaults to the user config directory)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Catalog document, overrides `catalog` from the configuration
    #[arg(long, global = true, value_name = "PATH")]
    catalog: Option<PathBuf>,

    /// Directory holding `page_{id}.{ext}` images, overrides `assets.dir`
    #[arg(long, global = true, value_name = "DIR")]
    assets: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the pages matching a query
    Query(QueryArgs),
    /// Report catalog size, malformed entries and missing page images
    Check,
}

#[derive(Args, Debug)]
struct QueryArgs {
    /// Text to look for (case and accent insensitive)
    query: String,

    /// Print results as a JSON array
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Serialize)]
struct QueryRow<'a> {
    page: u32,
    asset: &'a Path,
    asset_exists: bool,
    fragment: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.command.is_none());

    let mut config = config::load(cli.config.as_deref())?;
    if let Some(catalog) = cli.catalog {
        config.catalog = catalog;
    }
    if let Some(dir) = cli.assets {
        config.assets.dir = dir;
    }
    if let Some(path) = &config.config_path {
        tracing::info!(path = %path.display(), "loaded configuration");
    }

    let catalog = Catalog::load(&config.catalog)
        .with_context(|| format!("cannot load catalog {}", config.catalog.display()))?;

    match cli.command {
        Some(Command::Query(args)) => handle_query(&args, &catalog, &config),
        Some(Command::Check) => handle_check(&catalog, &config),
        None => {
            let mut app = ui::app::App::new(&catalog, &config);
            app.run()
        }
    }
}

/// Subcommands log to stderr; the terminal UI logs to a file under the cache
/// directory so the screen is left alone.
fn init_tracing(interactive: bool) {
    let filter = |default: &str| {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
    };

    if !interactive {
        tracing_subscriber::registry()
            .with(filter("ocrcat=warn"))
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
        return;
    }

    match open_log_file() {
        Ok(file) => tracing_subscriber::registry()
            .with(filter("ocrcat=info"))
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .init(),
        Err(err) => eprintln!("warning: logging disabled: {err:#}"),
    }
}

fn open_log_file() -> Result<fs::File> {
    let base = BaseDirs::new().context("unable to determine base directories")?;
    let dir = base.cache_dir().join("ocrcat");
    fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;
    let path = dir.join(LOG_FILE_NAME);
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("failed to open {}", path.display()))
}

fn handle_query(args: &QueryArgs, catalog: &Catalog, config: &Config) -> Result<()> {
    let results = search::search(catalog, &args.query, &config.search_settings());

    if args.json {
        let rows: Vec<QueryRow> = results
            .iter()
            .map(|r| QueryRow {
                page: r.page_id,
                asset: &r.asset.path,
                asset_exists: r.asset.exists,
                fragment: r.fragment.marked(),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    // Header line first, then page<TAB>asset<TAB>found|missing<TAB>fragment
    if results.is_empty() {
        println!("No matches for \"{}\"", args.query);
    } else {
        println!(
            "Found {} page(s) matching \"{}\"",
            results.len(),
            args.query
        );
    }

    for r in &results {
        println!(
            "{}\t{}\t{}\t{}",
            r.page_id,
            r.asset.path.display(),
            if r.asset.exists { "found" } else { "missing" },
            single_line(&r.fragment.marked())
        );
    }

    Ok(())
}

fn handle_check(catalog: &Catalog, config: &Config) -> Result<()> {
    let assets = config.asset_store();

    println!("Catalog: {}", config.catalog.display());
    println!("Pages: {}", catalog.len());

    let malformed = catalog.malformed();
    println!("Malformed entries: {}", malformed.len());
    for entry in malformed {
        println!("  {}\t{}", entry.key, entry.reason);
    }

    let missing: Vec<_> = catalog
        .pages()
        .map(|(page_id, _)| (page_id, assets.resolve(page_id)))
        .filter(|(_, asset)| !asset.exists)
        .collect();
    println!("Missing assets: {}", missing.len());
    for (page_id, asset) in missing {
        println!("  {}\t{}", page_id, asset.path.display());
    }

    Ok(())
}

/// Keep one result per output line even when text cleanup is disabled.
fn single_line(text: &str) -> String {
    text.replace(['\t', '\r', '\n'], " ")
}
