use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parley_types::{Message, RenderEvent};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::events::EventSink;

/// What a lookup returns: one URL, or a list aligned with the requested ids
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResolvedValue {
    One(String),
    Many(Vec<Option<String>>),
}

impl ResolvedValue {
    /// Positional view; a lone string covers the first id only
    pub fn into_list(self) -> Vec<Option<String>> {
        match self {
            Self::One(url) => vec![Some(url)],
            Self::Many(urls) => urls,
        }
    }
}

/// Host-supplied collaborator mapping opaque ids to URLs
#[async_trait]
pub trait ReferenceLookup: Send + Sync {
    async fn resolve(&self, ids: &[String]) -> anyhow::Result<ResolvedValue>;
}

/// Per-id result of one resolution round
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceOutcome {
    pub resolved: Vec<(String, String)>,
    pub failed: Vec<String>,
}

impl ReferenceOutcome {
    pub fn is_empty(&self) -> bool {
        self.resolved.is_empty() && self.failed.is_empty()
    }
}

/// Collects reference ids while a message streams and resolves them in a
/// single batched call once it finalizes
pub struct ReferenceResolver {
    lookup: Option<Arc<dyn ReferenceLookup>>,
    pending: HashMap<String, Vec<String>>,
}

impl ReferenceResolver {
    pub fn new(lookup: Option<Arc<dyn ReferenceLookup>>) -> Self {
        Self {
            lookup,
            pending: HashMap::new(),
        }
    }

    pub fn has_lookup(&self) -> bool {
        self.lookup.is_some()
    }

    /// Records ids for a message, keeping first-seen order and dropping
    /// duplicates
    pub fn collect<I, S>(&mut self, message_id: &str, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let pending = self.pending.entry(message_id.to_string()).or_default();
        for id in ids {
            let id = id.into();
            if !pending.contains(&id) {
                pending.push(id);
            }
        }
    }

    pub fn pending(&self, message_id: &str) -> &[String] {
        self.pending
            .get(message_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Drops a message's pending ids without calling the lookup
    pub fn abandon(&mut self, message_id: &str) {
        self.pending.remove(message_id);
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    /// Resolves everything pending for `message`
    ///
    /// At most one lookup call per message. Results map to ids by position;
    /// missing or empty entries, and a rejected call, mark ids failed. The
    /// pending set is cleared whatever happens.
    pub async fn resolve(&mut self, message: &mut Message, events: &EventSink) -> ReferenceOutcome {
        let mut outcome = ReferenceOutcome::default();

        let ids = self.pending.remove(&message.id).unwrap_or_default();
        if ids.is_empty() {
            return outcome;
        }

        let Some(lookup) = self.lookup.clone() else {
            debug!(
                "No reference lookup configured, leaving {} reference(s) unresolved",
                ids.len()
            );
            return outcome;
        };

        debug!(message_id = %message.id, "Resolving {} reference(s)", ids.len());

        match lookup.resolve(&ids).await {
            Ok(value) => {
                let urls = value.into_list();
                for (index, id) in ids.into_iter().enumerate() {
                    let url = urls.get(index).cloned().flatten().filter(|url| !url.is_empty());
                    match url {
                        Some(url) => {
                            message.resolved_references.insert(id.clone(), url.clone());
                            events.emit(RenderEvent::ReferenceResolved {
                                message_id: message.id.clone(),
                                reference_id: id.clone(),
                                url: url.clone(),
                            });
                            outcome.resolved.push((id, url));
                        }
                        None => {
                            events.emit(RenderEvent::ReferenceFailed {
                                message_id: message.id.clone(),
                                reference_id: id.clone(),
                            });
                            outcome.failed.push(id);
                        }
                    }
                }
                if !outcome.failed.is_empty() {
                    warn!(
                        message_id = %message.id,
                        "Lookup returned no URL for {} reference(s)",
                        outcome.failed.len()
                    );
                }
            }
            Err(e) => {
                error!(message_id = %message.id, "Reference resolution failed: {:#}", e);
                for id in ids {
                    events.emit(RenderEvent::ReferenceFailed {
                        message_id: message.id.clone(),
                        reference_id: id.clone(),
                    });
                    outcome.failed.push(id);
                }
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FixedLookup {
        result: Mutex<Option<anyhow::Result<ResolvedValue>>>,
        calls: Mutex<Vec<Vec<String>>>,
    }

    impl FixedLookup {
        fn new(result: anyhow::Result<ResolvedValue>) -> Arc<Self> {
            Arc::new(Self {
                result: Mutex::new(Some(result)),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<Vec<String>> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ReferenceLookup for FixedLookup {
        async fn resolve(&self, ids: &[String]) -> anyhow::Result<ResolvedValue> {
            self.calls.lock().unwrap().push(ids.to_vec());
            self.result
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Err(anyhow::anyhow!("called twice")))
        }
    }

    fn drain(rx: &mut tokio::sync::mpsc::UnboundedReceiver<RenderEvent>) -> Vec<RenderEvent> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            out.push(event);
        }
        out
    }

    #[tokio::test]
    async fn test_short_list_marks_remaining_failed() {
        let lookup = FixedLookup::new(Ok(ResolvedValue::Many(vec![
            Some("urlA".into()),
            Some("urlB".into()),
        ])));
        let mut resolver = ReferenceResolver::new(Some(lookup.clone()));
        let (events, mut rx) = EventSink::channel();
        let mut message = Message::assistant("x");
        resolver.collect(&message.id, ["a", "b", "c"]);

        let outcome = resolver.resolve(&mut message, &events).await;

        assert_eq!(
            outcome.resolved,
            vec![("a".to_string(), "urlA".to_string()), ("b".to_string(), "urlB".to_string())]
        );
        assert_eq!(outcome.failed, vec!["c".to_string()]);
        assert_eq!(message.resolved_references.len(), 2);
        assert_eq!(lookup.calls(), vec![vec!["a", "b", "c"]]);
        assert!(resolver.pending(&message.id).is_empty());

        let events = drain(&mut rx);
        assert_eq!(events.len(), 3);
        assert!(matches!(&events[2], RenderEvent::ReferenceFailed { reference_id, .. } if reference_id == "c"));
    }

    #[tokio::test]
    async fn test_single_value_covers_first_id() {
        let lookup = FixedLookup::new(Ok(ResolvedValue::One("urlA".into())));
        let mut resolver = ReferenceResolver::new(Some(lookup));
        let mut message = Message::assistant("x");
        resolver.collect(&message.id, ["a"]);

        let outcome = resolver.resolve(&mut message, &EventSink::disabled()).await;

        assert_eq!(outcome.resolved.len(), 1);
        assert_eq!(message.resolved_references.get("a").map(String::as_str), Some("urlA"));
    }

    #[tokio::test]
    async fn test_empty_url_counts_as_failed() {
        let lookup = FixedLookup::new(Ok(ResolvedValue::Many(vec![Some(String::new()), None])));
        let mut resolver = ReferenceResolver::new(Some(lookup));
        let mut message = Message::assistant("x");
        resolver.collect(&message.id, ["a", "b"]);

        let outcome = resolver.resolve(&mut message, &EventSink::disabled()).await;

        assert!(outcome.resolved.is_empty());
        assert_eq!(outcome.failed, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn test_rejected_lookup_fails_all() {
        let lookup = FixedLookup::new(Err(anyhow::anyhow!("boom")));
        let mut resolver = ReferenceResolver::new(Some(lookup));
        let mut message = Message::assistant("x");
        resolver.collect(&message.id, ["a", "b"]);

        let outcome = resolver.resolve(&mut message, &EventSink::disabled()).await;

        assert_eq!(outcome.failed.len(), 2);
        assert!(message.resolved_references.is_empty());
        assert!(resolver.pending(&message.id).is_empty());
    }

    #[tokio::test]
    async fn test_no_lookup_clears_pending() {
        let mut resolver = ReferenceResolver::new(None);
        let mut message = Message::assistant("x");
        resolver.collect(&message.id, ["a"]);

        let outcome = resolver.resolve(&mut message, &EventSink::disabled()).await;

        assert!(outcome.is_empty());
        assert!(resolver.pending(&message.id).is_empty());
    }

    #[tokio::test]
    async fn test_nothing_pending_skips_call() {
        let lookup = FixedLookup::new(Ok(ResolvedValue::One("u".into())));
        let mut resolver = ReferenceResolver::new(Some(lookup.clone()));
        let mut message = Message::assistant("x");

        resolver.resolve(&mut message, &EventSink::disabled()).await;

        assert!(lookup.calls().is_empty());
    }

    #[test]
    fn test_collect_dedupes_in_order() {
        let mut resolver = ReferenceResolver::new(None);
        resolver.collect("m", ["b", "a"]);
        resolver.collect("m", ["a", "b", "c"]);
        assert_eq!(resolver.pending("m"), ["b", "a", "c"]);
    }

    #[test]
    fn test_resolved_value_shapes() {
        let one: ResolvedValue = serde_json::from_str("\"u\"").unwrap();
        assert_eq!(one.into_list(), vec![Some("u".to_string())]);
        let many: ResolvedValue = serde_json::from_str("[\"u\", null]").unwrap();
        assert_eq!(many.into_list(), vec![Some("u".to_string()), None]);
    }
}
