use parley_types::RenderEvent;
use tokio::sync::mpsc;

/// Fire-and-forget channel to the rendering layer
///
/// A closed or absent receiver is not an error; the engine keeps working
/// without anyone watching.
#[derive(Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::UnboundedSender<RenderEvent>>,
}

impl EventSink {
    pub fn new(tx: mpsc::UnboundedSender<RenderEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    /// Sink plus the receiver a renderer would drain
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<RenderEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    /// Sink that drops every event
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn emit(&self, event: RenderEvent) {
        if let Some(tx) = &self.tx {
            if tx.send(event).is_err() {
                tracing::trace!("Render event dropped: receiver closed");
            }
        }
    }
}
