use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use parley_engine::{EventSink, SessionConfig, SessionOrchestrator, TurnOutcome};
use parley_persist::{ConversationStore, FileMedium};
use parley_stream::{HttpChatClient, TransportConfig};
use parley_types::{Attachment, Feedback};

mod config;
mod lookup;
mod printer;

use config::Config;
use lookup::HttpReferenceLookup;

const HELP: &str = "\
commands:
  /new             start a new session
  /history         list stored sessions
  /load <id>       switch to a stored session
  /delete <id>     delete a stored session
  /attach <path>   attach a file to the next message
  /good [id]       rate an answer (default: the last one)
  /bad [id]
  /quit            exit
Ctrl-C cancels the answer being streamed.";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let config = Config::load()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

    init_logging(&config);

    tracing::info!("Starting parley-chat against {}", config.transport.url);

    let orchestrator = build_orchestrator(&config)?;
    run(orchestrator).await
}

fn build_orchestrator(config: &Config) -> anyhow::Result<SessionOrchestrator> {
    let mut transport_config = TransportConfig::new(&config.transport.url)
        .streaming(config.transport.streaming);
    if let Some(secs) = config.transport.timeout_secs {
        transport_config = transport_config.timeout_secs(secs);
    }
    for (name, value) in &config.transport.headers {
        transport_config = transport_config.header(name, value);
    }
    if let Some(token) = &config.api_token {
        transport_config = transport_config.header("Authorization", format!("Bearer {}", token));
    }
    let transport = Arc::new(HttpChatClient::new(transport_config)?);

    let medium = FileMedium::new(&config.store.data_dir).with_context(|| {
        format!("Failed to open store at {}", config.store.data_dir.display())
    })?;
    let store = ConversationStore::builder()
        .medium(Arc::new(medium))
        .config(config.store.store.clone())
        .build()?;
    tracing::info!("Conversation store at {}", config.store.data_dir.display());

    let (events, rx) = EventSink::channel();
    tokio::spawn(printer::print_events(rx));

    let session_config = SessionConfig::new(&config.session.user_id)
        .with_intermediate_steps(config.session.intermediate_steps);

    let mut builder = SessionOrchestrator::builder()
        .transport(transport)
        .store(store)
        .events(events)
        .config(session_config);

    if let Some(references) = &config.references {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        builder = builder.lookup(Arc::new(HttpReferenceLookup::new(http_client, &references.url)));
        tracing::info!("Reference lookup enabled: {}", references.url);
    }

    Ok(builder.build()?)
}

async fn run(mut orchestrator: SessionOrchestrator) -> anyhow::Result<()> {
    let shutdown = CancellationToken::new();

    // Ctrl-C stops the running answer, or quits when idle
    let canceller = orchestrator.canceller();
    let ctrl_c_shutdown = shutdown.clone();
    tokio::spawn(async move {
        loop {
            if tokio::signal::ctrl_c().await.is_err() {
                break;
            }
            if !canceller.cancel() {
                ctrl_c_shutdown.cancel();
                break;
            }
        }
    });

    println!("parley-chat, session {}. Type /help for commands.", orchestrator.session_id());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut attachments: Vec<Attachment> = Vec::new();

    loop {
        let line = tokio::select! {
            _ = shutdown.cancelled() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else {
            break;
        };
        let line = line.trim();

        let (command, arg) = match line.split_once(' ') {
            Some((command, arg)) => (command, arg.trim()),
            None => (line, ""),
        };

        match command {
            "/quit" | "/exit" => break,
            "/help" => println!("{}", HELP),
            "/new" => {
                orchestrator.start_new_session();
            }
            "/history" => match orchestrator.history() {
                Ok(sessions) if sessions.is_empty() => println!("no stored sessions"),
                Ok(sessions) => {
                    for session in sessions {
                        println!(
                            "{}  {}  {}",
                            session.session_id,
                            session.updated_at.format("%Y-%m-%d %H:%M"),
                            session.title
                        );
                    }
                }
                Err(e) => println!("error: {}", e),
            },
            "/load" => {
                if let Err(e) = orchestrator.load_session(arg) {
                    println!("error: {}", e);
                }
            }
            "/delete" => match orchestrator.delete_session(arg) {
                Ok(_) => println!("deleted {}", arg),
                Err(e) => println!("error: {}", e),
            },
            "/attach" => match tokio::fs::read(arg).await {
                Ok(data) => {
                    let name = std::path::Path::new(arg)
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_else(|| arg.to_string());
                    println!("attached {} ({} bytes)", name, data.len());
                    attachments.push(Attachment::new(name, "application/octet-stream", data));
                }
                Err(e) => println!("error: cannot read {}: {}", arg, e),
            },
            "/good" | "/bad" => {
                let feedback = if command == "/good" {
                    Feedback::Positive
                } else {
                    Feedback::Negative
                };
                let target = if arg.is_empty() {
                    orchestrator
                        .messages()
                        .iter()
                        .rev()
                        .find(|m| m.is_assistant())
                        .map(|m| m.id.clone())
                } else {
                    Some(arg.to_string())
                };
                match target {
                    Some(id) => {
                        if let Err(e) = orchestrator.set_feedback(&id, feedback) {
                            println!("error: {}", e);
                        }
                    }
                    None => println!("nothing to rate yet"),
                }
            }
            _ if command.starts_with('/') => println!("unknown command {}; try /help", command),
            _ => {
                let files = std::mem::take(&mut attachments);
                match orchestrator.send(line, files).await {
                    Ok(TurnOutcome::Failed { .. }) => {
                        tracing::warn!("Turn failed; error message shown");
                    }
                    Ok(_) => {}
                    Err(e) => println!("error: {}", e),
                }
            }
        }
    }

    tracing::info!("Shutting down");
    Ok(())
}

fn init_logging(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let registry = tracing_subscriber::registry().with(env_filter);

    // Logs go to stderr so they never interleave with the conversation
    match config.logging.format.as_str() {
        "json" => {
            registry
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr))
                .init();
        }
    }
}
