use anyhow::{anyhow, Result};
use std::path::PathBuf;

use framefinder::config::Config;
use framefinder::logging::{self, LogTarget};
use framefinder::matcher::MatchMode;
use framefinder::ranges::format_timestamp;
use framefinder::search::SearchOptions;
use framefinder::Library;

enum Command {
    Ingest(PathBuf),
    Search {
        image: PathBuf,
        video_id: i64,
        options: SearchOptions,
    },
    Videos,
    Frames(i64),
    Info(PathBuf),
    History(usize),
}

struct Args {
    config_path: Option<PathBuf>,
    command: Command,
}

fn fail(message: &str) -> ! {
    eprintln!("Error: {}", message);
    std::process::exit(1);
}

fn value_of<'a>(args: &'a [String], i: &mut usize, flag: &str) -> &'a str {
    if *i + 1 < args.len() {
        *i += 1;
        &args[*i]
    } else {
        fail(&format!("{} requires a value", flag))
    }
}

fn parse_number<T: std::str::FromStr>(value: &str, flag: &str) -> T {
    value
        .parse()
        .unwrap_or_else(|_| fail(&format!("invalid value for {}: {}", flag, value)))
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    let mut config_path = None;
    let mut positional: Vec<String> = Vec::new();
    let mut video_id: Option<i64> = None;
    let mut options = SearchOptions::default();
    let mut limit = 10usize;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("framefinder {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--config" | "-c" => {
                config_path = Some(PathBuf::from(value_of(&args, &mut i, "--config")));
            }
            "--video" => {
                video_id = Some(parse_number(value_of(&args, &mut i, "--video"), "--video"));
            }
            "--fast" => options.mode = MatchMode::Fast,
            "--threshold" => {
                options.threshold =
                    Some(parse_number(value_of(&args, &mut i, "--threshold"), "--threshold"));
            }
            "--max-gap" => {
                options.max_gap =
                    Some(parse_number(value_of(&args, &mut i, "--max-gap"), "--max-gap"));
            }
            "--limit" => {
                limit = parse_number(value_of(&args, &mut i, "--limit"), "--limit");
            }
            arg if arg.starts_with('-') => {
                eprintln!("Unknown argument: {}", arg);
                print_help();
                std::process::exit(1);
            }
            arg => positional.push(arg.to_string()),
        }
        i += 1;
    }

    let mut positional = positional.into_iter();
    let command = match positional.next().as_deref() {
        Some("ingest") => match positional.next() {
            Some(path) => Command::Ingest(PathBuf::from(path)),
            None => fail("ingest requires a video path"),
        },
        Some("search") => {
            let Some(image) = positional.next() else {
                fail("search requires an image path");
            };
            let Some(video_id) = video_id else {
                fail("search requires --video ID");
            };
            Command::Search {
                image: PathBuf::from(image),
                video_id,
                options,
            }
        }
        Some("videos") => Command::Videos,
        Some("frames") => match positional.next() {
            Some(id) => Command::Frames(parse_number(&id, "frames")),
            None => fail("frames requires a video id"),
        },
        Some("info") => match positional.next() {
            Some(path) => Command::Info(PathBuf::from(path)),
            None => fail("info requires a video path"),
        },
        Some("history") => Command::History(limit),
        Some(other) => {
            eprintln!("Unknown command: {}", other);
            print_help();
            std::process::exit(1);
        }
        None => {
            print_help();
            std::process::exit(1);
        }
    };

    Args {
        config_path,
        command,
    }
}

fn print_help() {
    println!(
        r#"framefinder - find where an image appears in a video

USAGE:
    framefinder [OPTIONS] <COMMAND>

COMMANDS:
    ingest <VIDEO>              Register a video and extract its frames
    search <IMAGE> --video ID   Find the image in a video's frames
        --fast                  Approximate color-only search on sampled frames
        --threshold T           Minimum score (default 0.3, fast 0.2)
        --max-gap S             Seconds allowed between hits in one range (default 5)
    videos                      List ingested videos
    frames <VIDEO_ID>           List a video's extracted frames
    info <VIDEO>                Show frame rate, frame count and duration
    history [--limit N]         Show recent searches

OPTIONS:
    --config, -c PATH   Path to config file
    --version, -V       Show version
    --help, -h          Show this help message

ENVIRONMENT:
    FRAMEFINDER_CONFIG  Path to config file (overrides default location)
    FRAMEFINDER_LOG     Log level (trace, debug, info, warn, error)

A directory of images is read as a video, one image per frame in filename order.
Container formats need a build with the `ffmpeg` feature.

Config file location: $XDG_CONFIG_HOME/framefinder/config.toml"#
    );
}

async fn ingest(library: &Library, path: PathBuf) -> Result<()> {
    let ingested = library.ingest_video(&path)?;
    let video_id = ingested.video_id;
    println!(
        "Video {} registered ({:.2} fps, {:.1}s), extracting frames...",
        video_id,
        ingested.info.fps,
        ingested.info.duration()
    );

    match ingested.job.wait().await {
        Ok(summary) if !summary.opened => Err(anyhow!(
            "video {} could not be decoded, no frames extracted",
            video_id
        )),
        Ok(summary) if summary.cancelled => Err(anyhow!(
            "extraction of video {} cancelled after {} frames",
            video_id,
            summary.frames_extracted
        )),
        Ok(summary) => {
            println!("Extracted {} frames", summary.frames_extracted);
            Ok(())
        }
        Err(e) => Err(anyhow!(e).context(format!("extraction of video {} failed", video_id))),
    }
}

fn search(library: &Library, image: PathBuf, video_id: i64, options: SearchOptions) -> Result<()> {
    let outcome = library.search(&image, video_id, options)?;
    let results = &outcome.results;

    println!(
        "Search {}: {} matches ({} mode, threshold {:.2})",
        outcome.search_id,
        results.matches_found,
        results.mode.as_str(),
        results.threshold
    );
    if results.matches_found == 0 {
        return Ok(());
    }

    println!("\nTime ranges:");
    for range in &results.time_ranges {
        println!(
            "  {} - {}  ({:.1}s)",
            range.start_formatted, range.end_formatted, range.duration
        );
    }

    println!("\nTop matches:");
    for m in &results.detailed_matches {
        println!(
            "  {}  score {:.3}  color {:.3}  template {:.3}{}  structural {:.3}{}  {}",
            format_timestamp(m.timestamp),
            m.similarity_score,
            m.color_similarity,
            m.template_similarity,
            if m.approximate { "~" } else { "" },
            m.structural_similarity,
            if m.approximate { "~" } else { "" },
            m.frame_path.display()
        );
    }
    if results.mode == MatchMode::Fast {
        println!("\n(~ marks estimated values; fast mode measures color only)");
    }
    Ok(())
}

fn list_videos(library: &Library) -> Result<()> {
    let videos = library.videos()?;
    if videos.is_empty() {
        println!("No videos");
    }
    for v in videos {
        println!(
            "{:>4}  {}  {:.1}s  {:.2} fps  {} frames  {}",
            v.id,
            v.original_name,
            v.duration,
            v.fps,
            v.frames_extracted,
            v.created_at
        );
    }
    Ok(())
}

fn list_frames(library: &Library, video_id: i64) -> Result<()> {
    if library.video(video_id)?.is_none() {
        return Err(anyhow!("video {} not found", video_id));
    }
    for f in library.frames(video_id)? {
        println!(
            "{:>8}  {}  {}",
            f.frame_number,
            format_timestamp(f.timestamp),
            f.frame_path.display()
        );
    }
    Ok(())
}

fn show_info(library: &Library, path: PathBuf) -> Result<()> {
    let info = library.probe(&path)?;
    println!("Path:      {}", path.display());
    println!("Size:      {}x{}", info.width, info.height);
    println!("FPS:       {:.3}", info.fps);
    println!("Frames:    {}", info.frame_count);
    println!("Duration:  {} ({:.2}s)", format_timestamp(info.duration()), info.duration());
    Ok(())
}

fn show_history(library: &Library, limit: usize) -> Result<()> {
    for record in library.history(limit)? {
        let summary = serde_json::from_str::<serde_json::Value>(&record.results)
            .ok()
            .and_then(|v| v.get("matches_found").and_then(|m| m.as_u64()))
            .map(|n| format!("{} matches", n))
            .unwrap_or_else(|| "unreadable result".to_string());
        println!(
            "{:>4}  {}  {}  {}",
            record.id,
            record.created_at,
            record.query_path.display(),
            summary
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_args();

    let _ = logging::init(LogTarget::Journald);

    let config = match args.config_path {
        Some(path) => Config::load_from(&path)?,
        None => Config::load()?,
    };

    let library = Library::open(config)?;

    match args.command {
        Command::Ingest(path) => ingest(&library, path).await,
        Command::Search {
            image,
            video_id,
            options,
        } => search(&library, image, video_id, options),
        Command::Videos => list_videos(&library),
        Command::Frames(video_id) => list_frames(&library, video_id),
        Command::Info(path) => show_info(&library, path),
        Command::History(limit) => show_history(&library, limit),
    }
}
