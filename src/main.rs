use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sinmun::config::Config;
use sinmun::crawler::{Driver, HttpTransport};
use sinmun::error::{Error, ErrorExt};
use sinmun::models::{CategoryReport, NewsCategory};
use sinmun::storage::{MemorySink, SharedArticleSink, SqliteArticleSink};

#[derive(Parser)]
#[command(
    name = "sinmun",
    version,
    about = "Naver News category listing crawler",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json)
    #[arg(long, global = true)]
    log_format: Option<String>,

    /// TOML config file (defaults to SINMUN_* environment variables)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl category listings into the database
    Crawl {
        /// News category to crawl (repeatable; name, Korean name or code)
        #[arg(short, long = "category", value_parser = parse_category)]
        categories: Vec<NewsCategory>,

        /// Pages fetched per window
        #[arg(long)]
        window_size: Option<u32>,

        /// Stop after this many pages per category (0 = unlimited)
        #[arg(long)]
        max_pages: Option<u32>,

        /// SQLite database path
        #[arg(long)]
        db: Option<PathBuf>,

        /// Crawl without writing to the database
        #[arg(long, default_value = "false")]
        dry_run: bool,
    },

    /// Show stored article counts
    Stats {
        /// SQLite database path
        #[arg(long)]
        db: Option<PathBuf>,
    },
}

fn parse_category(s: &str) -> std::result::Result<NewsCategory, String> {
    s.parse()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref()).map_err(report_error)?;

    let log_format = cli
        .log_format
        .clone()
        .unwrap_or_else(|| config.logging.format.clone());

    // Initialize tracing/logging
    setup_tracing(&log_format, &config.logging.level, cli.verbose)?;

    tracing::info!("sinmun Naver News crawler starting");

    match cli.command {
        Commands::Crawl {
            categories,
            window_size,
            max_pages,
            db,
            dry_run,
        } => {
            if !categories.is_empty() {
                config.crawler.categories = categories;
            }
            if let Some(window_size) = window_size {
                config.crawler.window_size = window_size;
            }
            if let Some(max_pages) = max_pages {
                config.crawler.max_pages = max_pages;
            }
            if let Some(db) = db {
                config.database.sqlite_path = db;
            }

            tracing::info!(
                categories = ?config.crawler.categories,
                window_size = config.crawler.window_size,
                max_pages = config.crawler.max_pages,
                dry_run = %dry_run,
                "Starting crawl command"
            );
            crawl(config, dry_run).await.map_err(report_error)?;
        }

        Commands::Stats { db } => {
            if let Some(db) = db {
                config.database.sqlite_path = db;
            }
            tracing::info!(db = %config.database.sqlite_path.display(), "Starting stats command");
            stats(&config).map_err(report_error)?;
        }
    }

    tracing::info!("sinmun completed successfully");
    Ok(())
}

fn load_config(path: Option<&std::path::Path>) -> sinmun::error::Result<Config> {
    let config = match path {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };
    Ok(config)
}

/// Log a fatal error with its category before handing it to anyhow
fn report_error(e: Error) -> anyhow::Error {
    tracing::error!(
        error = %e,
        error.category = %e.category(),
        recoverable = e.is_recoverable(),
        "{}",
        e.category().korean_desc()
    );
    e.into()
}

fn setup_tracing(format: &str, level: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("sinmun=debug,info")
    } else {
        tracing_subscriber::EnvFilter::try_new(format!("sinmun={level},warn"))
            .with_context(|| format!("Invalid log level: {level}"))?
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}

async fn crawl(config: Config, dry_run: bool) -> sinmun::error::Result<()> {
    config
        .validate()
        .map_err(|e| Error::config(format!("{e:#}")))?;

    let transport = Arc::new(HttpTransport::from_config(&config)?);

    let sink: SharedArticleSink = if dry_run {
        Arc::new(MemorySink::new())
    } else {
        Arc::new(open_database(&config)?)
    };

    let driver = Driver::new(&config, transport, sink);
    let reports = driver.run(&config.crawler.categories).await;

    print_summary(&reports, dry_run);
    Ok(())
}

fn print_summary(reports: &[CategoryReport], dry_run: bool) {
    println!();
    println!("Crawl summary{}", if dry_run { " (dry run)" } else { "" });
    println!(
        "  {:<10} {:>7} {:>7} {:>9} {:>9} {:>6} {:>6} {:>9}",
        "category", "windows", "pages", "emitted", "inserted", "dups", "new%", "ended"
    );

    let mut total_inserted = 0;
    for report in reports {
        total_inserted += report.inserted;
        println!(
            "  {:<10} {:>7} {:>7} {:>9} {:>9} {:>6} {:>5.1}% {:>9}",
            format!("{} ({})", report.category.korean_name(), report.category.code()),
            report.windows,
            report.pages_requested,
            report.records_emitted,
            report.inserted,
            report.duplicates,
            report.insert_rate() * 100.0,
            if report.exhausted { "yes" } else { "limit" },
        );
        if report.store_failures > 0 {
            println!(
                "    {} window(s) failed to store",
                report.store_failures
            );
        }
    }

    println!("  Total new articles: {total_inserted}");
}

fn open_database(config: &Config) -> sinmun::error::Result<SqliteArticleSink> {
    SqliteArticleSink::from_config(&config.database).map_err(|e| {
        Error::with_source(
            format!(
                "Failed to open database: {}",
                config.database.sqlite_path.display()
            ),
            e,
        )
    })
}

fn stats(config: &Config) -> sinmun::error::Result<()> {
    let sink = open_database(config)?;

    let total = sink.count()?;
    println!("Articles in {}: {total}", sink.table());

    for (category, count) in sink.count_by_category()? {
        let label = category
            .parse::<NewsCategory>()
            .map(|c| format!("{} ({})", c.korean_name(), c.code()))
            .unwrap_or(category);
        println!("  {label:<12} {count}");
    }

    Ok(())
}
