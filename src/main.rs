//! CLI entrypoint for `shihtzu`.
//!
//! Parses command-line arguments, validates input files, runs the ingestion
//! pipeline through the library engine with optional mmap threshold
//! selection, merges documents into the vault, prints a terminal summary,
//! and optionally writes a CSV object index when an export directory is
//! provided.
use std::fs;
use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use log::{LevelFilter, error};
use shihtzu::{
    engine::{
        Config, DEFAULT_DELIMITER, DEFAULT_FILENAME_SEED, DEFAULT_LOGON_COUNT_THRESHOLD,
        DEFAULT_LOGON_DATE_THRESHOLD, DEFAULT_SEPARATOR, Engine,
    },
    export::save_object_index_csv,
    io::DEFAULT_MMAP_THRESHOLD_BYTES,
    object::ObjectKind,
    report::render_summary_with_top,
    vault::{Vault, WriteMode},
};

#[derive(Parser, Debug)]
#[command(
    name = "shihtzu-rs",
    version,
    about = "Active Directory attribute parser for Obsidian (Rust)"
)]
struct Args {
    /// Combined dump file(s) with mixed object types
    #[arg(short = 'f', long = "file")]
    file: Vec<PathBuf>,

    /// Dump file(s) containing only users
    #[arg(short = 'U', long = "users")]
    users: Vec<PathBuf>,

    /// Dump file(s) containing only groups
    #[arg(short = 'G', long = "groups")]
    groups: Vec<PathBuf>,

    /// Dump file(s) containing only computers
    #[arg(short = 'C', long = "computers")]
    computers: Vec<PathBuf>,

    /// Obsidian vault (or subfolder) to write documents into
    #[arg(short = 'D', long = "directory")]
    directory: PathBuf,

    /// Overwrite existing documents with fresh data
    #[arg(long = "overwrite", conflicts_with = "append")]
    overwrite: bool,

    /// Smart-append new facts into existing documents
    #[arg(long = "append")]
    append: bool,

    /// Logon count below which an account is tagged low-activity
    #[arg(long = "logon-count", default_value_t = DEFAULT_LOGON_COUNT_THRESHOLD)]
    logon_count: u32,

    /// Days since last logon after which an account is tagged stale
    #[arg(long = "logon-date", default_value_t = DEFAULT_LOGON_DATE_THRESHOLD)]
    logon_date: i64,

    /// Attribute used to derive document names
    #[arg(long = "filename-seed", default_value = DEFAULT_FILENAME_SEED)]
    filename_seed: String,

    /// Delimiter between attribute names and values
    #[arg(long = "delimiter", default_value = DEFAULT_DELIMITER)]
    delimiter: String,

    /// Directory to write a CSV object index into
    #[arg(long = "export")]
    export: Option<PathBuf>,

    /// Override mmap threshold in bytes. If zero, disable mmap.
    #[arg(long = "mmap-threshold", default_value_t = DEFAULT_MMAP_THRESHOLD_BYTES)]
    mmap_threshold: u64,

    /// Enable parallel classification and enrichment
    #[arg(long = "parallel")]
    parallel: bool,

    /// Limit number of entries in "Top Tags"
    #[arg(long = "top", default_value_t = 10)]
    top_limit: usize,

    /// Control color output (auto, always, never)
    #[arg(long = "color", value_enum, default_value_t = ColorChoice::Auto)]
    color: ColorChoice,

    /// Suppress summary output (documents are still written)
    #[arg(short = 'q', long = "quiet")]
    quiet: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ColorChoice {
    Auto,
    Always,
    Never,
}

const ASCII_TITLE: &str = r#"
          __
     (___()'`;   Shihtzu
     /,    /`    fetching Active Directory attributes into Obsidian
     \\"--\\
"#;

fn init_logger(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    let _ = env_logger::Builder::from_default_env()
        .filter_level(level)
        .try_init();
}

fn verify_inputs(args: &Args) -> Result<()> {
    let partitioned =
        !args.users.is_empty() || !args.groups.is_empty() || !args.computers.is_empty();
    if !args.file.is_empty() && partitioned {
        bail!("provide either a combined file (-f) or separate typed files (-U/-G/-C), not both");
    }
    if args.file.is_empty() && !partitioned {
        bail!("no input files specified, provide at least one of -f/-U/-G/-C");
    }
    for p in args
        .file
        .iter()
        .chain(&args.users)
        .chain(&args.groups)
        .chain(&args.computers)
    {
        if !p.exists() {
            bail!("input file not found: {}", p.display());
        }
    }
    Ok(())
}

fn main() {
    let args = Args::parse();
    init_logger(args.verbose);
    // Configure color policy
    match args.color {
        ColorChoice::Always => {
            colored::control::set_override(true);
        }
        ColorChoice::Never => {
            colored::control::set_override(false);
        }
        ColorChoice::Auto => {}
    }
    if let Err(e) = verify_inputs(&args) {
        error!("{}", e);
        std::process::exit(2);
    }

    let config = Config {
        delimiter: args.delimiter.clone(),
        separator: DEFAULT_SEPARATOR.to_string(),
        filename_seed: args.filename_seed.clone(),
        logon_count_threshold: args.logon_count,
        logon_date_threshold: args.logon_date,
        parallel: args.parallel,
        ..Config::default()
    };
    let mut engine = Engine::new(config);
    let threshold = if args.mmap_threshold == 0 {
        u64::MAX
    } else {
        args.mmap_threshold
    };

    let typed = [
        (&args.users, Some(ObjectKind::User)),
        (&args.groups, Some(ObjectKind::Group)),
        (&args.computers, Some(ObjectKind::Computer)),
    ];
    for p in &args.file {
        if let Err(e) = engine.ingest_path(p, None, threshold) {
            error!("failed to load {}: {}", p.display(), e);
            std::process::exit(3);
        }
    }
    for (paths, forced) in typed {
        for p in paths {
            if let Err(e) = engine.ingest_path(p, forced, threshold) {
                error!("failed to load {}: {}", p.display(), e);
                std::process::exit(3);
            }
        }
    }

    if let Err(e) = fs::create_dir_all(&args.directory) {
        error!(
            "failed to create vault directory {}: {}",
            args.directory.display(),
            e
        );
        std::process::exit(4);
    }
    let vault = Vault::new(&args.directory);
    let known = vault.known_index();
    engine.link_with_known(&known);

    let mode = if args.append {
        WriteMode::Append
    } else if args.overwrite {
        WriteMode::Overwrite
    } else {
        WriteMode::Skip
    };
    let writes = engine.write_all(&vault, mode);

    if !args.quiet {
        // Print banner and summary
        println!("{}", ASCII_TITLE.bold().green());
        let summary = render_summary_with_top(&engine, &writes, args.top_limit);
        println!("{}", summary);
    }

    if let Some(outdir) = args.export {
        if let Err(e) = fs::create_dir_all(&outdir) {
            error!(
                "failed to create export directory {}: {}",
                outdir.display(),
                e
            );
            std::process::exit(4);
        }
        let ts = chrono::Local::now().format("%Y.%m.%d_%H.%M.%S");
        let csv = outdir.join(format!("shihtzu_objects_{}.csv", ts));
        if let Err(e) = save_object_index_csv(&engine, &csv) {
            error!("failed to write {}: {}", csv.display(), e);
            std::process::exit(5);
        }
    }
}
