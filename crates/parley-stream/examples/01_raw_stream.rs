use anyhow::Result;
use futures::StreamExt;
use parley_stream::{
    decode_sse_stream, ChatRequest, ChatResponse, ChatTransport, DeltaPayload, HttpChatClient,
    TransportConfig,
};

#[tokio::main]
async fn main() -> Result<()> {
    let url = std::env::var("PARLEY_URL")
        .unwrap_or_else(|_| "http://localhost:8000/api/chat/stream".to_string());

    println!("Streaming from {}\n", url);

    let client = HttpChatClient::new(TransportConfig::new(url))?;
    let request = ChatRequest::new("Say hello in three languages.", "example-user", "example-session");

    let ChatResponse::Streaming(body) = client.send(request).await? else {
        println!("Backend answered without streaming");
        return Ok(());
    };

    let mut batches = decode_sse_stream(body);
    while let Some(batch) = batches.next().await {
        for event in batch? {
            match DeltaPayload::parse(&event.data) {
                Ok(Some(DeltaPayload::Text { content, .. })) => {
                    print!("{}", content);
                    std::io::Write::flush(&mut std::io::stdout())?;
                }
                Ok(Some(DeltaPayload::Thought { thought, loop_num })) => {
                    println!("\n[step {}] {}", loop_num, thought);
                }
                Ok(None) => {}
                Err(e) => println!("\n[{}] skipped: {}", event.event, e),
            }
        }
    }

    println!("\n\nDone.");
    Ok(())
}
