use anyhow::{bail, Context, Result};
use clap::Parser;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use album_playlist::cache::ScanCache;
use album_playlist::config::{sanitize_path_arg, MatchConfig, OutputPaths, RunConfig};
use album_playlist::input::{self, ParsedList};
use album_playlist::output;
use album_playlist::progress::{format_duration, set_log_only};
use album_playlist::resolve::Resolver;
use album_playlist::safety::validate_output_path;
use album_playlist::scoring::DEFAULT_SCORE_CUTOFF;

#[derive(Parser)]
#[command(name = "album-playlist")]
#[command(about = "Build an M3U8 playlist from an 'Artist - Album (Year)' list")]
struct Args {
    /// Text file with one 'Artist - Album (Year)' per line
    #[arg(long, conflicts_with = "html_file")]
    list_file: Option<PathBuf>,

    /// HTML page saved from a forum thread
    #[arg(long)]
    html_file: Option<PathBuf>,

    /// Primary music library root
    #[arg(long)]
    primary: PathBuf,

    /// Secondary library root, searched only for entries the primary misses
    #[arg(long)]
    secondary: Option<PathBuf>,

    /// Output playlist (default: list file with .m3u8, or playlist.m3u8)
    #[arg(long)]
    out: Option<PathBuf>,

    #[arg(long, default_value_t = DEFAULT_SCORE_CUTOFF, value_parser = clap::value_parser!(i32).range(0..=100))]
    score_cutoff: i32,

    /// Report matches only; write no files
    #[arg(long)]
    dry_run: bool,

    /// Parse the list, print the entries and stop
    #[arg(long)]
    parse_only: bool,

    #[arg(long)]
    sort_entries: bool,

    /// Sort each album's tracks by file name
    #[arg(long)]
    sort_tracks: bool,

    /// Write the parsed unique entries to this file
    #[arg(long)]
    write_list: Option<PathBuf>,

    #[arg(long)]
    not_found_log: Option<PathBuf>,

    #[arg(long)]
    found_log: Option<PathBuf>,

    #[arg(long)]
    duplicates_log: Option<PathBuf>,

    /// Run log (default: <out stem>-log.txt)
    #[arg(long)]
    log: Option<PathBuf>,

    /// Exceptions file (default: <out stem>-exceptions.txt)
    #[arg(long)]
    exceptions: Option<PathBuf>,

    /// Scan cache file (default: album-playlist-cache.json next to the playlist)
    #[arg(long)]
    cache: Option<PathBuf>,

    /// Always walk the libraries; neither read nor write the cache.
    /// The cache does not notice changes inside disc sub-folders.
    #[arg(long)]
    no_cache: bool,

    /// Extra folder-name markers to skip (case-insensitive substring)
    #[arg(long = "exclude")]
    exclude: Vec<String>,

    /// Hide progress bars (for tail-friendly output)
    #[arg(long)]
    log_only: bool,
}

/// Console logging to stderr, plus a plain-text file when `log_file` is set.
/// Dry runs only show warnings unless RUST_LOG says otherwise.
fn init_logging(dry_run: bool, log_file: Option<&Path>) -> Result<()> {
    let default_level = if dry_run { "warn" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let file_layer = match log_file {
        Some(path) => {
            let file = File::create(path).with_context(|| format!("Failed to create log {}", path.display()))?;
            Some(
                fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_target(false),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(file_layer)
        .init();
    Ok(())
}

fn read_entries(args: &Args) -> Result<ParsedList> {
    let parsed = match (&args.html_file, &args.list_file) {
        (Some(path), _) => {
            if !path.exists() {
                bail!("HTML file not found: {}", path.display());
            }
            tracing::debug!("Parsing entries from HTML: {}", path.display());
            input::parse_html_list(&input::read_lossy(path)?)
        }
        (None, Some(path)) => {
            if !path.exists() {
                bail!("List file not found: {}", path.display());
            }
            tracing::debug!("Parsing entries from list: {}", path.display());
            input::parse_text_list(&input::read_lossy(path)?)
        }
        (None, None) => bail!("No input provided. Use --html-file or --list-file."),
    };

    for rejected in &parsed.rejected {
        tracing::warn!("Skipped line {} ({}): {}", rejected.line_no, rejected.reason, rejected.text);
    }
    if parsed.duplicates > 0 {
        tracing::info!("Dropped {} duplicate entries", parsed.duplicates);
    }
    Ok(parsed)
}

fn main() -> Result<()> {
    let args = Args::parse();
    set_log_only(args.log_only);
    let start = Instant::now();

    let primary = sanitize_path_arg(&args.primary);
    if primary.as_os_str().is_empty() {
        bail!("Primary library path is required and cannot be empty. Use --primary <path>.");
    }

    let out = match (&args.out, &args.list_file) {
        (Some(out), _) => out.clone(),
        (None, Some(list)) => list.with_extension("m3u8"),
        (None, None) => PathBuf::from("playlist.m3u8"),
    };
    let mut paths = OutputPaths::derive(&out);
    if let Some(p) = &args.not_found_log {
        paths.not_found = p.clone();
    }
    if let Some(p) = &args.found_log {
        paths.found = p.clone();
    }
    if let Some(p) = &args.duplicates_log {
        paths.duplicates = p.clone();
    }
    if let Some(p) = &args.log {
        paths.log = p.clone();
    }
    if let Some(p) = &args.exceptions {
        paths.exceptions = p.clone();
    }
    if let Some(p) = &args.cache {
        paths.cache = p.clone();
    }

    let inputs: Vec<&Path> = [args.list_file.as_deref(), args.html_file.as_deref(), Some(paths.exceptions.as_path())]
        .into_iter()
        .flatten()
        .collect();
    validate_output_path(&out, &inputs)?;

    if !args.dry_run {
        for stale in [&paths.not_found, &paths.found, &paths.duplicates, &paths.log] {
            output::remove_stale(stale);
        }
    }
    init_logging(args.dry_run, (!args.dry_run).then_some(paths.log.as_path()))?;

    let parsed = read_entries(&args)?;
    let mut entries = input::merge_near_duplicates(parsed.entries);
    if args.sort_entries {
        input::sort_entries(&mut entries);
    }
    for (idx, entry) in entries.iter().enumerate() {
        tracing::debug!("{}. {}", idx + 1, entry);
    }

    if let (Some(path), false) = (&args.write_list, args.dry_run) {
        output::write_entry_list(path, &entries)?;
    }

    if args.parse_only {
        for entry in &entries {
            println!("{} - {} ({})", entry.artist, entry.album, entry.year.map(|y| y.to_string()).unwrap_or_default());
        }
        println!("Total parsed entries: {}", entries.len());
        return Ok(());
    }

    let exceptions = input::load_exceptions(&paths.exceptions)?;

    let mut config = RunConfig::new(primary);
    config.matching = MatchConfig {
        score_cutoff: args.score_cutoff,
    };
    config.sort_tracks = args.sort_tracks;
    config.secondary = args.secondary.as_deref().map(sanitize_path_arg);
    config.exclude_markers.extend(args.exclude.iter().map(|m| m.to_lowercase()));

    let resolver = Resolver::new(config, exceptions);
    resolver.check_roots()?;

    let mut cache = if args.no_cache {
        ScanCache::in_memory()
    } else {
        ScanCache::load(&paths.cache)
    };
    let report = resolver.resolve(&entries, &mut cache)?;
    if !args.no_cache {
        // Saved even on dry runs so the next run starts warm
        if let Err(e) = cache.save() {
            tracing::warn!("Failed to save cache {}: {:#}", paths.cache.display(), e);
        }
    }

    let tracks = report.tracks();
    if !args.dry_run {
        if !report.not_found.is_empty() {
            output::write_not_found(&paths.not_found, &report.not_found)?;
        }
        if !report.resolved.is_empty() {
            output::write_found(&paths.found, &report.resolved)?;
        }
        if !report.duplicates.is_empty() {
            output::write_duplicates(&paths.duplicates, &report.duplicates)?;
        }
        output::write_m3u8(&out, &tracks)?;
    }

    println!("\n{:=<60}", "");
    println!("Playlist {}", if args.dry_run { "dry run complete" } else { "complete" });
    println!("  Entries: {}", entries.len());
    println!("  Matched: {}", report.matched());
    println!("  Not found: {}", report.not_found.len());
    println!("  Duplicate folders: {}", report.duplicates.len());
    println!("  Tracks: {}", tracks.len());
    println!("  Elapsed: {}", format_duration(start.elapsed()));
    println!("{:=<60}", "");

    Ok(())
}
