//! Walk library roots, refresh the scan cache and summarize what was found.
//! Usage: cargo run --release --bin scan-library -- <root>... [--json]

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

use album_playlist::cache::ScanCache;
use album_playlist::config::{sanitize_path_arg, DEFAULT_EXCLUDE_MARKERS};
use album_playlist::index::LibraryScanner;
use album_playlist::models::LibraryTier;
use album_playlist::progress::{format_duration, set_log_only};

#[derive(Parser)]
#[command(name = "scan-library")]
#[command(about = "Index album folders under one or more library roots")]
struct Args {
    #[arg(required = true)]
    roots: Vec<PathBuf>,

    /// Scan cache to read and refresh
    #[arg(long, default_value = "album-playlist-cache.json")]
    cache: PathBuf,

    /// Always walk the roots; the cache does not notice changes inside disc sub-folders
    #[arg(long)]
    no_cache: bool,

    /// Print every candidate as JSON instead of a summary
    #[arg(long)]
    json: bool,

    #[arg(long = "exclude")]
    exclude: Vec<String>,

    #[arg(long)]
    log_only: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    set_log_only(args.log_only);
    let start = Instant::now();

    let roots: Vec<PathBuf> = args.roots.iter().map(|r| sanitize_path_arg(r)).collect();
    let mut markers: Vec<String> = DEFAULT_EXCLUDE_MARKERS.iter().map(|m| m.to_string()).collect();
    markers.extend(args.exclude.iter().cloned());
    let scanner = LibraryScanner::new(markers);

    let mut cache = if args.no_cache {
        ScanCache::in_memory()
    } else {
        ScanCache::load(&args.cache)
    };
    let index = scanner.scan(&roots, LibraryTier::Primary, &mut cache)?;
    cache.save()?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(index.albums())?);
        return Ok(());
    }

    let with_cue = index.albums().iter().filter(|a| a.has_cue).count();
    let without_year = index.albums().iter().filter(|a| a.years.is_empty()).count();
    let tracks: usize = index.albums().iter().map(|a| a.track_paths.len()).sum();

    println!("\n{:=<60}", "");
    println!("Scan complete!");
    println!("  Roots: {}", roots.len());
    println!("  Artist folders: {}", index.artists().len());
    println!("  Album folders: {}", index.len());
    println!("  With cue sheets: {}", with_cue);
    println!("  Without year: {}", without_year);
    println!("  Track entries: {}", tracks);
    println!("  Elapsed: {}", format_duration(start.elapsed()));
    println!("{:=<60}", "");

    Ok(())
}
