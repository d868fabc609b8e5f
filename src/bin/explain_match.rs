//! Show how one list line scores against every album folder of a library.
//! Usage: cargo run --release --bin explain-match -- "Artist - Album (Year)" --primary <root>

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use album_playlist::cache::ScanCache;
use album_playlist::config::{sanitize_path_arg, MatchConfig};
use album_playlist::index::LibraryScanner;
use album_playlist::input::parse_line;
use album_playlist::matcher::{Matcher, TargetKeys};
use album_playlist::models::{LibraryTier, YearBucket};
use album_playlist::scoring::DEFAULT_SCORE_CUTOFF;
use album_playlist::selector::select;

#[derive(Parser)]
#[command(name = "explain-match")]
#[command(about = "Explain how a list entry matches library album folders")]
struct Args {
    /// One 'Artist - Album (Year)' line
    line: String,

    #[arg(long)]
    primary: PathBuf,

    #[arg(long, default_value_t = DEFAULT_SCORE_CUTOFF)]
    score_cutoff: i32,

    /// Scan cache to reuse (no cache when omitted)
    #[arg(long)]
    cache: Option<PathBuf>,

    /// Also list candidates whose artist was rejected
    #[arg(long)]
    all: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let target = parse_line(&args.line).map_err(|reason| anyhow!("Cannot parse '{}': {}", args.line, reason))?;
    let keys = TargetKeys::of(&target);
    println!("Target: {}", target);
    println!("  artist tokens: {}", keys.artist);
    println!("  album tokens:  {}", keys.album);
    println!("  self-titled: {}  multi-artist: {}", keys.self_titled, keys.multi_artist);

    let mut cache = match &args.cache {
        Some(path) => ScanCache::load(path),
        None => ScanCache::in_memory(),
    };
    let primary = sanitize_path_arg(&args.primary);
    let index = LibraryScanner::default().scan(&[primary], LibraryTier::Primary, &mut cache)?;
    if args.cache.is_some() {
        cache.save()?;
    }

    let config = MatchConfig {
        score_cutoff: args.score_cutoff,
    };
    let matcher = Matcher::new(config);

    println!("\n{:-<60}", "");
    for (idx, album) in index.albums().iter().enumerate() {
        let c = index.keys(idx);
        let eval = matcher.evaluate(&keys, &c.artist, &album.artist_raw, &c.album);
        if eval.rule.is_none() && !args.all {
            continue;
        }
        let bucket = YearBucket::classify(target.year, &album.years);
        println!("{}", album.root.display());
        println!(
            "  artist set/sort {:.1}/{:.1}  album set/ns {:.1}/{:.1}  label {:.1}  {:?}",
            eval.artist_set, eval.artist_sort, eval.album_set, eval.album_ns, eval.label_score, bucket
        );
        let rule = eval.rule.map(|r| format!("{:?}", r)).unwrap_or_else(|| "-".to_string());
        println!(
            "  rule {}  album {}  -> {}",
            rule,
            if eval.album_ok { "ok" } else { "rejected" },
            if eval.accepted() { "ACCEPTED" } else { "rejected" }
        );
    }
    println!("{:-<60}", "");

    let results = matcher.match_target(&target, &index);
    let pool = results.len();
    match select(results, config.cutoff()) {
        Some(winner) => println!(
            "Winner ({} in pool): {} (score {:.1}, {}, {:?})",
            pool,
            winner.candidate.root.display(),
            winner.score,
            winner.via,
            winner.year_bucket
        ),
        None => println!("No match ({} in pool)", pool),
    }

    Ok(())
}
