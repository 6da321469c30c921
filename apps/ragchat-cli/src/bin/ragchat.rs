//! ragchat: ingest a JSON corpus and ask questions about it from the terminal.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use ragchat_assistant::{Assistant, ChatMessage, Reply, ReplyOrigin};
use ragchat_core::cache::ResponseCache;
use ragchat_core::config::{Config, Settings};
use ragchat_vector::{IndexBackend, Manifest};

#[derive(Parser)]
#[command(name = "ragchat")]
#[command(about = "Retrieval-augmented chat over a local JSON corpus", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (default: ./config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Vector index backend: flat | lance
    #[arg(long, global = true)]
    backend: Option<String>,

    /// Chat model name sent to the completion API
    #[arg(long, global = true)]
    llm_model: Option<String>,

    /// Number of chunks retrieved per question
    #[arg(long, global = true)]
    top_k: Option<usize>,

    /// More logging (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild and persist the vector index
    Ingest {
        /// JSON file or directory of JSON files (default: data.data_dir)
        source: Option<PathBuf>,
    },

    /// Ask one question
    Ask {
        /// The question text
        query: String,
    },

    /// Interactive question loop (:history, :clear, :clear-cache, :quit)
    Chat,

    /// Remove every cached response
    ClearCache,

    /// Show the persisted index manifest and cache size
    Status,
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Command-line flags win over every configuration layer.
fn apply_overrides(mut settings: Settings, cli: &Cli) -> Result<Settings> {
    if let Some(backend) = &cli.backend {
        let parsed: IndexBackend = backend.parse()?;
        settings.index.backend = parsed.to_string();
    }
    if let Some(model) = &cli.llm_model {
        settings.llm.model = model.clone();
    }
    if let Some(top_k) = cli.top_k {
        settings.retrieval.top_k = top_k;
    }
    settings.validate()?;
    Ok(settings)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("loading configuration")?;
    let settings = apply_overrides(config.settings()?, &cli)?;
    debug!(backend = %settings.index.backend, llm = %settings.llm.model, top_k = settings.retrieval.top_k, "effective settings");

    match cli.command {
        Commands::Ingest { source } => {
            let source = source.unwrap_or_else(|| settings.data.data_dir.clone());
            let assistant = Assistant::from_settings(settings)?;
            let report = assistant.ingest(&source).await?;
            println!(
                "Indexed {} chunks from {} documents in {} source file(s)",
                report.chunks, report.documents, report.sources
            );
        }
        Commands::Ask { query } => {
            let assistant = open_assistant(settings).await?;
            let reply = assistant.ask(&query).await?;
            print_reply(&reply);
        }
        Commands::Chat => {
            let assistant = open_assistant(settings).await?;
            chat(&assistant).await?;
        }
        Commands::ClearCache => {
            let removed = ResponseCache::from_settings(&settings).clear()?;
            println!("Removed {} cached responses", removed);
        }
        Commands::Status => status(&settings)?,
    }
    Ok(())
}

async fn open_assistant(settings: Settings) -> Result<Assistant> {
    let source = settings.data.data_dir.clone();
    let assistant = Assistant::from_settings(settings)?;
    if let Some(report) = assistant.initialize(&source).await? {
        println!("Built a new index: {} chunks from {} documents", report.chunks, report.documents);
    }
    Ok(assistant)
}

fn print_reply(reply: &Reply) {
    println!("{}", reply.text);
    match reply.origin {
        ReplyOrigin::Cache => println!("(cached)"),
        ReplyOrigin::Generated if !reply.sources.is_empty() => {
            let ids: Vec<&str> = reply.sources.iter().map(|c| c.id.as_str()).collect();
            println!("(sources: {})", ids.join(", "));
        }
        ReplyOrigin::Generated => {}
        ReplyOrigin::Failed { retryable: true } => println!("(temporary failure, ask again to retry)"),
        ReplyOrigin::Failed { retryable: false } => println!("(check the llm settings and credentials)"),
    }
}

/// One line typed into the chat loop.
#[derive(Debug, PartialEq, Eq)]
enum ChatInput<'a> {
    Empty,
    Quit,
    History,
    ClearHistory,
    ClearCache,
    Question(&'a str),
}

fn parse_chat_line(line: &str) -> ChatInput<'_> {
    match line.trim() {
        "" => ChatInput::Empty,
        ":quit" | ":q" | ":exit" => ChatInput::Quit,
        ":history" => ChatInput::History,
        ":clear" => ChatInput::ClearHistory,
        ":clear-cache" => ChatInput::ClearCache,
        question => ChatInput::Question(question),
    }
}

async fn chat(assistant: &Assistant) -> Result<()> {
    println!("Chatting with {} (:history, :clear, :clear-cache, :quit)", assistant.model_name());
    let mut history: Vec<ChatMessage> = Vec::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else { break };
        let question = match parse_chat_line(&line) {
            ChatInput::Empty => continue,
            ChatInput::Quit => break,
            ChatInput::History => {
                for m in &history {
                    println!("[{}] {}", m.role, m.content);
                }
                continue;
            }
            ChatInput::ClearHistory => {
                history.clear();
                println!("History cleared");
                continue;
            }
            ChatInput::ClearCache => {
                println!("Removed {} cached responses", assistant.clear_cache()?);
                continue;
            }
            ChatInput::Question(q) => q,
        };

        history.push(ChatMessage::user(question));
        match assistant.ask(question).await {
            Ok(reply) => {
                print_reply(&reply);
                history.push(ChatMessage::assistant(reply.text));
            }
            Err(e) => eprintln!("error: {e}"),
        }
    }
    Ok(())
}

fn status(settings: &Settings) -> Result<()> {
    let path = &settings.index.path;
    if Manifest::path_in(path).is_file() {
        let m = Manifest::read(path)?;
        println!("Index:      {}", path.display());
        println!("  backend:  {}", m.backend);
        println!("  embedder: {} (dim {})", m.embedder_id, m.dim);
        println!("  chunks:   {}", m.chunk_count);
        if let Some(created) = m.created_at() {
            println!("  created:  {}", created.to_rfc3339());
        }
    } else {
        println!("Index:      none at {}", path.display());
    }
    println!("Trusted:    {}", settings.index.trust_persisted);
    let cache = ResponseCache::from_settings(settings);
    println!("Cache:      {} entries in {}", cache.len()?, cache.dir().display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_commands_are_recognised() {
        assert_eq!(parse_chat_line("  "), ChatInput::Empty);
        assert_eq!(parse_chat_line(":q"), ChatInput::Quit);
        assert_eq!(parse_chat_line(":history"), ChatInput::History);
        assert_eq!(parse_chat_line(":clear"), ChatInput::ClearHistory);
        assert_eq!(parse_chat_line(":clear-cache"), ChatInput::ClearCache);
        assert_eq!(parse_chat_line(" When do you open? \n"), ChatInput::Question("When do you open?"));
    }

    #[test]
    fn overrides_replace_settings_and_reject_unknown_backends() {
        let cli = Cli::parse_from(["ragchat", "--backend", "LANCE", "--top-k", "5", "status"]);
        let settings = apply_overrides(Settings::default(), &cli).unwrap();
        assert_eq!(settings.index.backend, "lance");
        assert_eq!(settings.retrieval.top_k, 5);

        let cli = Cli::parse_from(["ragchat", "--backend", "faiss", "status"]);
        assert!(apply_overrides(Settings::default(), &cli).is_err());
    }
}
