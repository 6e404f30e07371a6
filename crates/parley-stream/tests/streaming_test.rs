use parley_stream::{DeltaPayload, SseDecoder};

fn chunk(content: serde_json::Value) -> String {
    serde_json::json!({ "data": { "choices": [ { "delta": content } ] } }).to_string()
}

#[test]
fn test_parse_text_delta() {
    let data = chunk(serde_json::json!({ "content": "Hi" }));
    let payload = DeltaPayload::parse(&data).unwrap();

    assert_eq!(payload, Some(DeltaPayload::text("Hi")));
}

#[test]
fn test_parse_text_delta_with_step() {
    let data = chunk(serde_json::json!({ "content": "Hi", "step": "answer" }));
    let payload = DeltaPayload::parse(&data).unwrap();

    assert_eq!(payload, Some(DeltaPayload::text_in_step("Hi", "answer")));
}

#[test]
fn test_numeric_step_is_stringified() {
    let data = chunk(serde_json::json!({ "content": "Hi", "step": 3 }));

    match DeltaPayload::parse(&data).unwrap() {
        Some(DeltaPayload::Text { step, .. }) => assert_eq!(step.as_deref(), Some("3")),
        other => panic!("Expected Text payload, got {:?}", other),
    }
}

#[test]
fn test_falsy_step_means_none() {
    let data = chunk(serde_json::json!({ "content": "Hi", "step": "" }));
    assert_eq!(DeltaPayload::parse(&data).unwrap(), Some(DeltaPayload::text("Hi")));

    let data = chunk(serde_json::json!({ "content": "Hi", "step": 0 }));
    assert_eq!(DeltaPayload::parse(&data).unwrap(), Some(DeltaPayload::text("Hi")));
}

#[test]
fn test_parse_thought_delta() {
    let data = chunk(serde_json::json!({ "content": { "thought": "Looking up", "loop_num": 2 } }));
    let payload = DeltaPayload::parse(&data).unwrap();

    assert_eq!(payload, Some(DeltaPayload::thought("Looking up", 2)));
}

#[test]
fn test_thought_without_loop_num_defaults_to_zero() {
    let data = chunk(serde_json::json!({ "content": { "thought": "Hmm" } }));
    assert_eq!(DeltaPayload::parse(&data).unwrap(), Some(DeltaPayload::thought("Hmm", 0)));
}

#[test]
fn test_object_without_thought_is_ignored() {
    let data = chunk(serde_json::json!({ "content": { "tool": "search" } }));
    assert_eq!(DeltaPayload::parse(&data).unwrap(), None);
}

#[test]
fn test_empty_content_is_ignored() {
    let data = chunk(serde_json::json!({ "content": "" }));
    assert_eq!(DeltaPayload::parse(&data).unwrap(), None);
}

#[test]
fn test_missing_delta_is_ignored() {
    assert_eq!(DeltaPayload::parse(r#"{"status":"ok"}"#).unwrap(), None);
}

#[test]
fn test_invalid_json_is_an_error() {
    assert!(DeltaPayload::parse("{not json").is_err());
}

#[test]
fn test_non_object_json_is_an_error() {
    assert!(DeltaPayload::parse("42").is_err());
}

#[test]
fn test_decoded_events_feed_payload_parser() {
    let body = format!(
        "event: streaming\ndata: {}\n\nevent: streaming\ndata: {}\n\n",
        chunk(serde_json::json!({ "content": "Hi" })),
        chunk(serde_json::json!({ "content": " there" })),
    );

    let mut decoder = SseDecoder::new();
    let mut text = String::new();
    // Feed one byte at a time to exercise every split point
    for byte in body.as_bytes() {
        for event in decoder.feed(std::slice::from_ref(byte)) {
            if let Some(DeltaPayload::Text { content, .. }) = DeltaPayload::parse(&event.data).unwrap() {
                text.push_str(&content);
            }
        }
    }

    assert_eq!(text, "Hi there");
}
