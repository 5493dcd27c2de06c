//! typdex CLI (made by FontLab https://www.fontlab.com/)

use std::env;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use tracing::info;
use uuid::Uuid;

use typdex_core::catalog::{Catalog, TargetKind};
use typdex_core::output::{write_json_pretty, write_ndjson};
use typdex_core::parse::FontationsParser;
use typdex_core::query::{font_family, search_fonts, SearchParams, SearchResults, SortKey};
use typdex_core::scanner::Scanner;
use typdex_core::watch::WatcherBridge;

/// CLI entrypoint for typdex.
#[derive(Debug, Parser)]
#[command(
    name = "typdex",
    about = "Font catalog indexing & family search (made by FontLab https://www.fontlab.com/)"
)]
pub struct Cli {
    /// Catalog snapshot path (defaults to $TYPDEX_CATALOG, then
    /// ~/.cache/typdex/catalog.json)
    #[arg(long = "catalog", global = true)]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Register a directory root and index it
    Add(AddArgs),
    /// Re-scan every registered root
    Scan,
    /// List registered roots and their status
    Roots,
    /// Search the catalog, grouped by family
    Find(FindArgs),
    /// Show one family with all of its faces
    Family(FamilyArgs),
    /// Toggle the favorite mark on a family
    Fav { family: String },
    /// Resolve a public URL key to the file path it serves
    Resolve { url_key: String },
    /// Index everything, then keep reconciling filesystem changes
    Watch,
}

#[derive(Debug, Args)]
struct AddArgs {
    /// Directory to watch
    path: PathBuf,

    /// Display name (defaults to the directory name)
    #[arg(long = "name")]
    name: Option<String>,
}

#[derive(Debug, Args)]
struct FindArgs {
    /// Free-text query over family, subfamily and filename
    #[arg(short = 'q', long = "query")]
    query: Option<String>,

    /// Restrict to one category id
    #[arg(long = "category")]
    category: Option<Uuid>,

    /// Restrict to families in this collection id
    #[arg(long = "collection")]
    collection: Option<Uuid>,

    /// Only favorited families
    #[arg(long = "favorites", action = ArgAction::SetTrue)]
    favorites: bool,

    /// Restrict to these extensions (comma separated, e.g. ttf,otf)
    #[arg(short = 'e', long = "ext", value_delimiter = ',')]
    extensions: Vec<String>,

    /// Only italic faces
    #[arg(long = "italic", action = ArgAction::SetTrue)]
    italic: bool,

    /// Only upright faces
    #[arg(long = "upright", action = ArgAction::SetTrue, conflicts_with = "italic")]
    upright: bool,

    /// Minimum weight class (100-900)
    #[arg(long = "weight-min")]
    weight_min: Option<u16>,

    /// Maximum weight class (100-900)
    #[arg(long = "weight-max")]
    weight_max: Option<u16>,

    /// Sort order
    #[arg(long = "sort", default_value_t = SortArg::Recent, value_enum)]
    sort: SortArg,

    #[arg(long = "limit", default_value_t = 50)]
    limit: usize,

    #[arg(long = "offset", default_value_t = 0)]
    offset: usize,

    /// Emit a single JSON document
    #[arg(long = "json", action = ArgAction::SetTrue, conflicts_with = "ndjson")]
    json: bool,

    /// Emit newline-delimited JSON, one family per line
    #[arg(long = "ndjson", action = ArgAction::SetTrue)]
    ndjson: bool,
}

#[derive(Debug, Args)]
struct FamilyArgs {
    name: String,

    #[arg(long = "json", action = ArgAction::SetTrue)]
    json: bool,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum SortArg {
    /// Most recently indexed families first
    Recent,
    /// Case-insensitive family name
    NameAsc,
}

/// Parse CLI args and execute the selected command.
pub fn run() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let catalog_path = resolve_catalog_path(&cli.catalog)?;

    match cli.command {
        Command::Add(args) => run_add(&catalog_path, args),
        Command::Scan => run_scan(&catalog_path),
        Command::Roots => run_roots(&catalog_path),
        Command::Find(args) => run_find(&catalog_path, args),
        Command::Family(args) => run_family(&catalog_path, args),
        Command::Fav { family } => run_fav(&catalog_path, &family),
        Command::Resolve { url_key } => run_resolve(&catalog_path, &url_key),
        Command::Watch => run_watch(&catalog_path),
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    // Logs go to stderr so JSON output stays pipeable.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn resolve_catalog_path(overridden: &Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = overridden {
        return Ok(path.clone());
    }
    if let Ok(raw) = env::var("TYPDEX_CATALOG") {
        return Ok(PathBuf::from(raw));
    }
    let home = env::var_os("HOME")
        .ok_or_else(|| anyhow!("cannot locate a home directory; pass --catalog"))?;
    Ok(PathBuf::from(home).join(".cache/typdex/catalog.json"))
}

fn open_scanner(catalog_path: &PathBuf) -> Result<Arc<Scanner>> {
    let catalog = Catalog::open(catalog_path)
        .with_context(|| format!("opening catalog {}", catalog_path.display()))?;
    Ok(Arc::new(Scanner::new(
        Arc::new(catalog),
        Arc::new(FontationsParser),
    )))
}

fn run_add(catalog_path: &PathBuf, args: AddArgs) -> Result<()> {
    let name = match &args.name {
        Some(name) => name.clone(),
        None => args
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| args.path.display().to_string()),
    };

    let scanner = open_scanner(catalog_path)?;
    let category = scanner.catalog().add_category(&name, &args.path);
    scanner.scan_category(category.id, &category.path);

    let stats = scanner.catalog().stats();
    println!(
        "{} -> {} ({} files, {} faces in catalog)",
        category.id,
        category.path.display(),
        stats.files,
        stats.faces
    );
    Ok(())
}

fn run_scan(catalog_path: &PathBuf) -> Result<()> {
    let scanner = open_scanner(catalog_path)?;
    scanner.scan_all();

    let stats = scanner.catalog().stats();
    println!(
        "{} categories, {} files, {} faces",
        stats.categories, stats.files, stats.faces
    );
    Ok(())
}

fn run_roots(catalog_path: &PathBuf) -> Result<()> {
    let scanner = open_scanner(catalog_path)?;
    for category in scanner.catalog().categories() {
        let status = format!("{:?}", category.status).to_lowercase();
        let error = category
            .last_error
            .map(|e| format!("  ({e})"))
            .unwrap_or_default();
        println!(
            "{}  {:<8}{}  {}{}",
            category.id,
            status,
            category.name,
            category.path.display(),
            error
        );
    }
    Ok(())
}

fn run_find(catalog_path: &PathBuf, args: FindArgs) -> Result<()> {
    let scanner = open_scanner(catalog_path)?;
    let params = build_params(&args);
    let results = search_fonts(scanner.catalog(), &params);

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    if args.json {
        write_json_pretty(&results, &mut handle)?;
        writeln!(handle)?;
    } else if args.ndjson {
        write_ndjson(&results.items, &mut handle)?;
    } else {
        write_plain(&results, &mut handle)?;
    }
    Ok(())
}

fn run_family(catalog_path: &PathBuf, args: FamilyArgs) -> Result<()> {
    let scanner = open_scanner(catalog_path)?;
    let record = font_family(scanner.catalog(), &args.name)
        .ok_or_else(|| anyhow!("family not found: {}", args.name))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&record)?);
        return Ok(());
    }

    println!("{}", record.family);
    for hit in &record.faces {
        println!(
            "    {:<24} w{:<4} {}  {}",
            hit.face.subfamily,
            hit.face.weight,
            if hit.face.italic { "italic " } else { "upright" },
            hit.file.full_path.display()
        );
    }
    if !record.collections.is_empty() {
        println!("in {} collection(s)", record.collections.len());
    }
    Ok(())
}

fn run_fav(catalog_path: &PathBuf, family: &str) -> Result<()> {
    let scanner = open_scanner(catalog_path)?;
    let is_favorite = scanner
        .catalog()
        .toggle_favorite(TargetKind::Family, family);
    println!(
        "{family}: {}",
        if is_favorite { "favorited" } else { "unfavorited" }
    );
    Ok(())
}

fn run_resolve(catalog_path: &PathBuf, url_key: &str) -> Result<()> {
    let scanner = open_scanner(catalog_path)?;
    let file = scanner
        .catalog()
        .font_file_by_url_key(url_key)
        .ok_or_else(|| anyhow!("unknown url key: {url_key}"))?;
    println!("{}", file.full_path.display());
    Ok(())
}

fn run_watch(catalog_path: &PathBuf) -> Result<()> {
    let scanner = open_scanner(catalog_path)?;
    scanner.scan_all();

    let _bridge = WatcherBridge::start(scanner.clone())?;
    info!(
        roots = scanner.catalog().categories().len(),
        "watching for changes (Ctrl-C to stop)"
    );

    loop {
        thread::sleep(Duration::from_secs(60));
    }
}

fn build_params(args: &FindArgs) -> SearchParams {
    let italic = if args.italic {
        Some(true)
    } else if args.upright {
        Some(false)
    } else {
        None
    };

    SearchParams {
        q: args.query.clone(),
        category_id: args.category,
        collection_id: args.collection,
        favorites: args.favorites,
        extensions: args.extensions.clone(),
        italic,
        weight_min: args.weight_min,
        weight_max: args.weight_max,
        sort: match args.sort {
            SortArg::Recent => SortKey::Recent,
            SortArg::NameAsc => SortKey::NameAsc,
        },
        limit: args.limit,
        offset: args.offset,
    }
}

fn write_plain(results: &SearchResults, mut w: impl Write) -> Result<()> {
    for group in &results.items {
        let count = group.faces.len();
        writeln!(
            w,
            "{}  ({count} face{})",
            group.family,
            if count == 1 { "" } else { "s" }
        )?;
        for hit in &group.faces {
            writeln!(
                w,
                "    {:<24} {}",
                hit.face.subfamily,
                hit.file.full_path.display()
            )?;
        }
    }
    writeln!(
        w,
        "{} of {} families",
        results.items.len(),
        results.total
    )?;
    Ok(())
}
