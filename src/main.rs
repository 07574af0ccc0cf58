// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;

use exam_catalog::logging::{self, LogTarget};
use exam_catalog::{money, CatalogView, Config, SelectionStore, SharedEntry};

#[derive(Parser, Debug)]
#[command(name = "exam-catalog", version, about = "Browse the lab test catalog and price a selection")]
struct Cli {
    #[arg(long, global = true, help = "Configuration file (TOML)")]
    config: Option<PathBuf>,

    #[arg(long, global = true, help = "Directory holding <name>.csv instead of the bundled catalog")]
    catalog_dir: Option<PathBuf>,

    #[arg(long, global = true, help = "Logical catalog name")]
    name: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Interactive terminal UI (default)
    Browse,
    /// Print the catalog, optionally filtered
    List {
        #[arg(short, long, help = "Case-insensitive match on name or code")]
        query: Option<String>,
        #[arg(long, help = "Output machine-readable JSON")]
        json: bool,
    },
    /// Price a selection given by codes; repeat a code to raise its quantity
    Quote {
        #[arg(required = true)]
        codes: Vec<String>,
        #[arg(long, help = "Output machine-readable JSON")]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(dir) = cli.catalog_dir {
        config.catalog.dir = Some(dir);
    }
    if let Some(name) = cli.name {
        config.catalog.name = name;
    }

    match cli.command.unwrap_or(Command::Browse) {
        Command::Browse => run_browse(&config),
        Command::List { query, json } => {
            logging::init(&config.logging, LogTarget::for_cli(&config.logging))?;
            run_list(&config, query.as_deref().unwrap_or(""), json)
        }
        Command::Quote { codes, json } => {
            logging::init(&config.logging, LogTarget::for_cli(&config.logging))?;
            run_quote(&config, &codes, json)
        }
    }
}

/// Load the configured catalog synchronously into a fresh view
fn load_view(config: &Config) -> Result<CatalogView> {
    let mut view = CatalogView::new(config.debouncer());
    let ticket = view.begin_load();
    let source = config.catalog_source();
    let result = exam_catalog::load(source.as_ref(), &config.catalog.name);
    view.finish_load(ticket, result);

    if let Some(message) = view.status().error_message() {
        bail!("{}", message);
    }
    Ok(view)
}

fn run_list(config: &Config, query: &str, json: bool) -> Result<()> {
    let mut view = load_view(config)?;
    view.set_query(query, std::time::Instant::now());
    view.flush();

    let entries: &[SharedEntry] = view.visible();
    if json {
        println!("{}", serde_json::to_string_pretty(entries)?);
        return Ok(());
    }

    for entry in entries {
        println!("{:<8} {:<48} {:>12}", entry.code, entry.name, entry.formatted_amount());
    }
    println!("\n{} of {} entries", entries.len(), view.entries().len());

    Ok(())
}

#[derive(Serialize)]
struct QuoteLine {
    code: String,
    name: String,
    quantity: u32,
    amount: Option<f64>,
    line_total: f64,
}

#[derive(Serialize)]
struct Quote {
    lines: Vec<QuoteLine>,
    unknown_codes: Vec<String>,
    total: f64,
}

fn run_quote(config: &Config, codes: &[String], json: bool) -> Result<()> {
    let view = load_view(config)?;
    let mut store = SelectionStore::new();
    let mut unknown_codes = Vec::new();

    for code in codes {
        match view.find_by_code(code.trim()) {
            Some(entry) => {
                store.add(entry.clone());
            }
            None => unknown_codes.push(code.clone()),
        }
    }

    let quote = Quote {
        lines: store
            .lines()
            .iter()
            .map(|line| QuoteLine {
                code: line.entry.code.clone(),
                name: line.entry.name.clone(),
                quantity: line.quantity,
                amount: line.entry.amount,
                line_total: line.line_total(),
            })
            .collect(),
        unknown_codes,
        total: store.total(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&quote)?);
        return Ok(());
    }

    for code in &quote.unknown_codes {
        eprintln!("⚠️  Unknown code: {}", code);
    }
    for line in store.lines() {
        println!(
            "{:<8} {:<40} x{:<3} {:>12}",
            line.entry.code,
            line.entry.name,
            line.quantity,
            line.formatted_line_total()
        );
    }
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Total ({} tests): {}", store.count(), money::format_amount(store.total()));

    Ok(())
}

#[cfg(feature = "tui")]
fn run_browse(config: &Config) -> Result<()> {
    logging::init(&config.logging, LogTarget::for_terminal_ui(&config.logging))?;

    let mut app = ui::App::new(config);
    ui::run_ui(&mut app)
}

#[cfg(not(feature = "tui"))]
fn run_browse(_config: &Config) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or list the catalog: exam-catalog list");
    std::process::exit(1);
}
