//! Binary entry point for the boltsalvage recovery tool.
#![forbid(unsafe_code)]

use std::error::Error;
use std::fs::OpenOptions;
use std::path::PathBuf;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use boltsalvage::{
    build::StoreBuilder,
    classify::RevisionKeyFilter,
    detect::detect_page_size,
    scan::scan,
};

#[derive(Parser, Debug)]
#[command(
    name = "boltsalvage",
    version,
    about = "Salvage key-value records from a damaged bolt-format database file"
)]
struct Cli {
    /// Path to the damaged source database file
    #[arg(value_name = "DB")]
    db_path: PathBuf,

    /// Path of the freshly built output database
    #[arg(long, default_value = "new_db")]
    output: PathBuf,

    /// Name of the bucket the salvaged records are placed in
    #[arg(long, default_value = "key")]
    bucket: String,

    /// Skip page size detection and use this size instead
    #[arg(long)]
    page_size: Option<u32>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let log_filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(log_filter).init();

    // The source stays strictly read-only; salvage never repairs in place.
    let file = OpenOptions::new().read(true).open(&cli.db_path)?;
    let page_size = match cli.page_size {
        Some(size) => size,
        None => detect_page_size(&file)?,
    };
    if page_size == 0 {
        return Err("page size must be nonzero".into());
    }
    info!(page_size, source = %cli.db_path.display(), "scanning source file");

    let file_size = file.metadata()?.len();
    if file_size % u64::from(page_size) != 0 {
        warn!(
            file_size,
            page_size, "file size is not a multiple of the page size"
        );
    }

    let mut sink = StoreBuilder::new(&cli.output, cli.bucket.as_bytes());
    let report = scan(
        &file,
        page_size,
        file_size,
        &RevisionKeyFilter::default(),
        &mut sink,
    )?;
    info!(
        pages_visited = report.pages_visited,
        unreadable_pages = report.unreadable_pages,
        unknown_type_pages = report.unknown_type_pages,
        leaf_pages = report.leaf_pages,
        records = report.records,
        bucket_entries_skipped = report.bucket_entries_skipped,
        "scan complete"
    );

    let records = sink.commit(page_size)?;
    info!(records, output = %cli.output.display(), "rebuilt database");
    Ok(())
}
