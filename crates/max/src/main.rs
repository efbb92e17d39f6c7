//! The `max` command: chat with Max about the project in a directory.

#[macro_use]
extern crate tracing;

use std::io::Write as _;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser;
use max::agents::root_agent;
use max::terminal::TerminalView;
use max::{
    ChatSession, ConversationMemory, DEFAULT_MEMORY_WINDOW, LexicalIndex,
    Settings, SettingsBuilder,
};
use max_model::{ErrorKind, ModelProviderError as _};
use max_ollama_model::{
    BASE_URL_ENV, DEFAULT_BASE_URL, DEFAULT_MODEL_ROUTE, OllamaProvider,
};
use owo_colors::OwoColorize;
use tokio::io::{self, AsyncBufReadExt, BufReader};

/// Local AI for your codebase. Run it in any project folder.
#[derive(Debug, Parser)]
#[command(name = "max", version)]
struct Args {
    /// Project directory to work in.
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Model to use, e.g. `ollama_chat/gpt-oss:20b`.
    #[arg(long, env = "MAX_MODEL", default_value = DEFAULT_MODEL_ROUTE)]
    model: String,

    /// Base URL of the Ollama server.
    #[arg(long, env = BASE_URL_ENV, default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Seconds a response may stay silent before it times out.
    #[arg(long, env = "MAX_REQUEST_TIMEOUT_SECS", default_value_t = 120)]
    timeout: u64,

    /// Number of past exchanges sent along with each question.
    #[arg(long, default_value_t = DEFAULT_MEMORY_WINDOW)]
    memory_window: usize,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let settings = SettingsBuilder::default()
        .with_project_dir(args.path)
        .with_model(args.model)
        .with_base_url(args.base_url)
        .with_timeout_secs(args.timeout)
        .with_memory_window(args.memory_window)
        .build();
    let settings = match settings {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("Error: {err}");
            return ExitCode::FAILURE;
        }
    };
    println!("Launching Max in: {}", settings.project_dir().display());

    match run(settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(settings: Settings) -> anyhow::Result<()> {
    println!("{}", "⚡ Waking up Max".bright_yellow());
    let provider = OllamaProvider::new(settings.ollama().clone())
        .context("failed to set up the model client")?;
    preflight(&provider).await;

    let index = LexicalIndex::new(settings.project_dir());
    let stats = index
        .refresh()
        .await
        .context("failed to index the project")?;
    println!(
        "{}",
        format!("Indexed {} files ({} chunks)", stats.files, stats.chunks)
            .dimmed()
    );

    let agent = root_agent(provider, Arc::new(index), None);
    let mut session = ChatSession::new(
        agent,
        ConversationMemory::new(settings.memory_window()),
    );
    let mut view = TerminalView::new();
    println!(
        "{} Ready. {}\n",
        "✓".bright_green(),
        "Ask about your code, /clear starts over, /quit leaves.".dimmed()
    );

    let mut lines = BufReader::new(io::stdin()).lines();
    loop {
        print!("{} ", ">".bright_cyan());
        std::io::stdout().flush()?;

        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                error!("error reading input: {err}");
                break;
            }
        };
        match line.trim() {
            "/quit" | "/exit" => break,
            "/clear" => session.clear(&mut view),
            query => {
                session.submit(query, &mut view).await;
            }
        }
    }
    Ok(())
}

/// Checks that the server is up and has the model, and tells the user what
/// to do if not. Max starts either way.
async fn preflight(provider: &OllamaProvider) {
    let config = provider.config();
    match provider.has_model().await {
        Ok(true) => debug!("model `{}` is installed", config.model()),
        Ok(false) => println!(
            "{} Model `{}` is not installed. Get it with:\n\n    ollama pull {}\n",
            "⚠️ ".bright_yellow(),
            config.model(),
            config.model()
        ),
        Err(err) if err.kind() == ErrorKind::Unreachable => println!(
            "{} Could not reach Ollama at {}. Is it running?\n\n    ollama serve\n",
            "⚠️ ".bright_yellow(),
            config.base_url()
        ),
        Err(err) => warn!("could not list installed models: {err}"),
    }
}
