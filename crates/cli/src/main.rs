use anyhow::{Context as AnyhowContext, Result};
use apkbot_catalog::{
    Action, Bot, BotConfig, CatalogService, ChatId, IncomingMessage, MatchResult,
    ReplyDispatcher, Transport,
};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

mod history;
mod stdio;

use stdio::StdioTransport;

#[derive(Parser)]
#[command(name = "apkbot")]
#[command(about = "Package catalog bot: index channel uploads, answer chat requests", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (JSON or TOML)
    #[arg(short, long, global = true, env = "APKBOT_CONFIG")]
    config: Option<PathBuf>,

    /// Catalog file (overrides config and APKBOT_CATALOG_PATH)
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a JSON-lines history dump into the catalog
    Scan(ScanArgs),

    /// Show catalog entries
    List(ListArgs),

    /// Resolve a chat message against the catalog without sending anything
    Resolve(ResolveArgs),

    /// Handle JSON-lines messages from stdin, write outbound sends to stdout
    Serve(ServeArgs),
}

#[derive(Args)]
struct ScanArgs {
    /// History dump, one message object per line
    #[arg(long)]
    history: PathBuf,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct ListArgs {
    /// Maximum entries to show
    #[arg(long)]
    limit: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct ResolveArgs {
    /// Message text as a user would type it
    text: String,

    /// Chat the reply would go to
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    chat: ChatId,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct ServeArgs {
    /// History dump used for /rescan
    #[arg(long)]
    history: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    // stdout carries JSON (serve, --json); logs always go to stderr
    builder.target(env_logger::Target::Stderr).init();

    let mut config = BotConfig::load(cli.config.as_deref()).context("Invalid configuration")?;
    if let Some(path) = cli.catalog {
        config.catalog_path = path;
    }

    match cli.command {
        Commands::Scan(args) => run_scan(args, config).await?,
        Commands::List(args) => run_list(args, config).await?,
        Commands::Resolve(args) => run_resolve(args, config).await?,
        Commands::Serve(args) => run_serve(args, config).await?,
    }

    Ok(())
}

async fn open_catalog(config: &BotConfig) -> CatalogService {
    CatalogService::open(config.store()).await
}

async fn run_scan(args: ScanArgs, config: BotConfig) -> Result<()> {
    let transport = StdioTransport::stdout(Some(args.history.clone()));
    let channel = config.source_channel.as_deref().unwrap_or("history dump");
    let messages = transport
        .history(channel, config.history_limit)
        .await
        .with_context(|| format!("Cannot read history {}", args.history.display()))?;
    let service = open_catalog(&config).await;

    let report = config
        .scanner()
        .scan(messages, &service)
        .await
        .context("Scan failed")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "scanned={} added={} skipped={} total={} persisted={}",
            report.scanned, report.added, report.skipped, report.total, report.persisted
        );
    }
    if !report.persisted {
        anyhow::bail!(
            "Catalog could not be saved to {}",
            service.store().path().display()
        );
    }
    Ok(())
}

async fn run_list(args: ListArgs, config: BotConfig) -> Result<()> {
    let service = open_catalog(&config).await;
    let limit = args.limit.unwrap_or(usize::MAX);

    let entries: Vec<serde_json::Value> = service
        .read(|catalog| {
            catalog
                .iter()
                .take(limit)
                .map(|entry| {
                    serde_json::json!({
                        "key": entry.key,
                        "original_name": entry.original_name,
                        "file_ref": entry.file_ref,
                        "match_terms": entry.match_terms,
                    })
                })
                .collect()
        })
        .await;
    let total = service.len().await;

    if args.json {
        let body = serde_json::json!({ "total": total, "entries": entries });
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    for entry in &entries {
        println!(
            "{}\t{}",
            entry["key"].as_str().unwrap_or_default(),
            entry["original_name"].as_str().unwrap_or_default()
        );
    }
    if entries.len() < total {
        println!("…and {} more", total - entries.len());
    }
    Ok(())
}

async fn run_resolve(args: ResolveArgs, config: BotConfig) -> Result<()> {
    let service = open_catalog(&config).await;
    let matcher = config.matcher();
    let result = service
        .read(|catalog| matcher.resolve(&args.text, catalog))
        .await;
    let action = ReplyDispatcher.dispatch(&result, args.chat);

    if args.json {
        let key = match &result {
            MatchResult::Found(entry) => Some(entry.key.as_str()),
            _ => None,
        };
        let body = serde_json::json!({
            "result": result.kind(),
            "key": key,
            "action": action,
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    match action {
        Action::SendFile { caption, file_ref, .. } => println!("send {file_ref}: {caption}"),
        Action::SendText { text, .. } => println!("{text}"),
        Action::Nothing => println!("(no reply)"),
    }
    Ok(())
}

async fn run_serve(args: ServeArgs, config: BotConfig) -> Result<()> {
    let service = Arc::new(open_catalog(&config).await);
    let transport = Arc::new(StdioTransport::stdout(args.history));
    let bot = Bot::new(config, service, transport);
    log::info!("Serving on stdio");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<IncomingMessage>(&line) {
            Ok(message) => {
                bot.handle(&message).await;
            }
            Err(err) => log::warn!("Ignoring malformed message: {err}"),
        }
    }

    log::info!("stdin closed; stopping");
    Ok(())
}
