//! ABOUTME: Demo entry point wiring every collaborator into one runnable Orchestrator
//! ABOUTME: No real index or model backend: EchoRetriever/EchoSynthesizer stand in for both

mod demo_collaborators;

use anyhow::Result;
use clap::{Parser, Subcommand};
use demo_collaborators::{EchoRetriever, EchoSynthesizer};
use ragent_context::{ConcatSummarizer, KeywordSalienceExtractor};
use ragent_core::types::{ChatRequest, Message, OrchestratorEvent, SessionMode};
use ragent_events::EventEmitter;
use ragent_memory::{InMemoryMemoryStore, InMemorySessionStore};
use ragent_orchestrator::{Collaborators, Orchestrator};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(name = "ragent")]
#[command(about = "Demo client for the rs-ragent session orchestrator")]
struct Cli {
    /// Path to an orchestrator config file (defaults per ragent-config's search path).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one request to completion and print the final answer.
    Ask {
        /// A conversation turn, oldest first. Repeat to provide multi-turn history.
        #[arg(long = "message", required = true)]
        messages: Vec<String>,
        #[arg(long)]
        session_id: Option<String>,
    },
    /// Run one request, printing every event as it arrives.
    Stream {
        #[arg(long = "message", required = true)]
        messages: Vec<String>,
        #[arg(long)]
        session_id: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_tracing();

    let cli = Cli::parse();
    let config = ragent_config::OrchestratorConfig::load(cli.config.as_deref())?;
    let orchestrator = build_orchestrator(config);

    match cli.command {
        Command::Ask { messages, session_id } => {
            let request = build_request(messages, session_id);
            let (emitter, mut receiver) = EventEmitter::channel(64);
            let drain = tokio::spawn(async move { while receiver.recv().await.is_some() {} });
            let response = orchestrator
                .run_session(request, SessionMode::Sync, emitter, CancellationToken::new())
                .await?;
            drop(drain);
            println!("{}", response.answer);
        }
        Command::Stream { messages, session_id } => {
            let request = build_request(messages, session_id);
            let (emitter, mut receiver) = EventEmitter::channel(64);
            let printer = tokio::spawn(async move {
                while let Some(event) = receiver.recv().await {
                    print_event(&event);
                }
            });
            orchestrator
                .run_session(request, SessionMode::Stream, emitter, CancellationToken::new())
                .await?;
            let _ = printer.await;
        }
    }

    Ok(())
}

fn build_request(messages: Vec<String>, session_id: Option<String>) -> ChatRequest {
    ChatRequest {
        messages: messages.into_iter().map(Message::user).collect(),
        session_id,
        feature_overrides: Default::default(),
    }
}

fn build_orchestrator(config: ragent_config::OrchestratorConfig) -> Orchestrator {
    let collaborators = Collaborators {
        retriever: Arc::new(EchoRetriever),
        lazy_retriever: None,
        web_searcher: None,
        synthesizer: Arc::new(EchoSynthesizer),
        critic_model: None,
        intent_classifier: None,
        plan_generator: None,
        embedder: None,
        summarizer: Arc::new(ConcatSummarizer),
        salience_extractor: Arc::new(KeywordSalienceExtractor),
        session_store: Some(InMemorySessionStore::new()),
        memory_store: Some(InMemoryMemoryStore::new()),
    };
    Orchestrator::new(collaborators, config)
}

fn print_event(event: &OrchestratorEvent) {
    match event {
        OrchestratorEvent::Tokens { content } => print!("{content}"),
        OrchestratorEvent::Complete { .. } => println!(),
        other => eprintln!("[{}] {other:?}", other.name()),
    }
}

fn setup_tracing() {
    use std::io;
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}
