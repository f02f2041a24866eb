use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use plainspeak::{
    adapt_files, decode_input, AdaptationEngine, AdaptationStore, BatchConfig, HistoryFile,
};
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing::{info, Level};

#[derive(Parser, Debug)]
#[command(name = "plainspeak")]
#[command(about = "Detect idioms and conceptual metaphors and rewrite them in plain language")]
#[command(version)]
struct Args {
    /// History file used by --save, history, show and delete
    #[arg(long, global = true, default_value = plainspeak::storage::DEFAULT_HISTORY_FILE)]
    store: PathBuf,

    /// Enable debug logging
    #[arg(long, global = true)]
    verbose: bool,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Adapt text given as an argument, read from stdin, or from files
    Adapt {
        /// Text to adapt; stdin is read when neither text nor files are given
        text: Option<String>,

        /// Adapt these files concurrently
        #[arg(long = "file", conflicts_with = "text")]
        files: Vec<PathBuf>,

        /// Record results in the history file
        #[arg(long)]
        save: bool,

        /// Abort on first failing file
        #[arg(long)]
        fail_fast: bool,
    },
    /// List saved adaptations, newest first
    History {
        #[arg(long, default_value_t = 1)]
        page: usize,

        #[arg(long, default_value_t = 10)]
        page_size: usize,
    },
    /// Show one saved adaptation
    Show { id: String },
    /// Delete one saved adaptation
    Delete { id: String },
    /// List the bundled expression patterns
    Catalog,
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{rendered}");
    Ok(())
}

async fn read_stdin() -> Result<String> {
    let mut bytes = Vec::new();
    tokio::io::stdin().read_to_end(&mut bytes).await?;
    decode_input(bytes)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr so stdout stays machine-readable JSON
    tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .with_writer(std::io::stderr)
        .json()
        .init();

    info!(?args, "Parsed CLI arguments");

    match args.command {
        Command::Adapt { text, files, save, fail_fast } => {
            let engine = Arc::new(AdaptationEngine::new()?);

            let results = if files.is_empty() {
                let text = match text {
                    Some(text) => text,
                    None => read_stdin().await?,
                };
                let result = engine.process(&text);
                print_json(&result, args.pretty)?;
                vec![result]
            } else {
                let outcomes = adapt_files(engine, files.as_slice(), BatchConfig { fail_fast }).await?;
                print_json(&outcomes, args.pretty)?;
                outcomes.into_iter().filter_map(|o| o.result).collect()
            };

            if save {
                let mut history = HistoryFile::load(&args.store).await?;
                for result in results {
                    let record = history.save(result)?;
                    info!(id = %record.id, store = %history.path().display(), "Recorded adaptation");
                }
                history.persist().await?;
            }
        }
        Command::History { page, page_size } => {
            let history = HistoryFile::load(&args.store).await?;
            print_json(&history.list(page, page_size)?, args.pretty)?;
        }
        Command::Show { id } => {
            let history = HistoryFile::load(&args.store).await?;
            match history.get(&id)? {
                Some(record) => print_json(&record, args.pretty)?,
                None => bail!("Adaptation not found: {id}"),
            }
        }
        Command::Delete { id } => {
            let mut history = HistoryFile::load(&args.store).await?;
            if !history.delete(&id)? {
                bail!("Adaptation not found: {id}");
            }
            history.persist().await?;
            info!(%id, "Deleted adaptation");
        }
        Command::Catalog => {
            let engine = AdaptationEngine::new()?;
            let entries: Vec<_> = engine
                .catalog()
                .all_patterns()
                .iter()
                .map(|pattern| {
                    json!({
                        "category": pattern.category(),
                        "matcher": pattern.matcher(),
                        "metaphor": pattern.metaphor(),
                        "explanation": pattern.explanation(),
                        "simplified": pattern.simplified().to_string(),
                    })
                })
                .collect();
            print_json(&entries, args.pretty)?;
        }
    }

    Ok(())
}
