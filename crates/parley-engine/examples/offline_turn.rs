//! Runs one turn against a canned SSE body, no network needed.

use std::sync::Arc;

use async_trait::async_trait;
use parley_engine::{EventSink, SessionConfig, SessionOrchestrator, TurnOutcome};
use parley_stream::{ChatRequest, ChatResponse, ChatTransport};
use parley_types::RenderEvent;

const BODY: &str = concat!(
    "event: message\n",
    "data: {\"data\":{\"choices\":[{\"delta\":{\"content\":{\"thought\":\"Looking up greetings\",\"loop_num\":1}}}]}}\n\n",
    "data: {\"data\":{\"choices\":[{\"delta\":{\"content\":\"Hello\",\"step\":\"1\"}}]}}\n\n",
    "data: {\"data\":{\"choices\":[{\"delta\":{\"content\":\"Bonjour\",\"step\":\"2\"}}]}}\n\n",
);

struct CannedTransport;

#[async_trait]
impl ChatTransport for CannedTransport {
    async fn send(&self, _request: ChatRequest) -> anyhow::Result<ChatResponse> {
        // Deliberately awkward chunking
        let chunks: Vec<anyhow::Result<Vec<u8>>> = BODY
            .as_bytes()
            .chunks(17)
            .map(|chunk| Ok(chunk.to_vec()))
            .collect();
        Ok(ChatResponse::Streaming(Box::pin(futures::stream::iter(chunks))))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (events, mut rx) = EventSink::channel();
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                RenderEvent::StepAppended { step, .. } => println!("[step {}] {}", step.loop_num, step.thought),
                RenderEvent::TextUpdated { text, .. } => println!("text: {:?}", text),
                RenderEvent::TurnFinalized { message } => println!("final: {:?}", message.text),
                _ => {}
            }
        }
    });

    let mut orchestrator = SessionOrchestrator::builder()
        .transport(Arc::new(CannedTransport))
        .events(events)
        .config(SessionConfig::new("example-user"))
        .build()?;

    if let TurnOutcome::Committed(message) = orchestrator.send("Greet me", Vec::new()).await? {
        println!("\ncommitted {} with {} step(s)", message.id, message.steps.len());
    }

    drop(orchestrator);
    printer.await?;
    Ok(())
}
