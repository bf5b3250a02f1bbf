use super::*;
use crate::entities::EventMessage;
use rand;
use serde_json::{json, Map, Value};

fn text_event(reply_token: &str, text: &str) -> Event {
    let raw = json!({
        "type": "message",
        "replyToken": reply_token,
        "mode": "active",
        "timestamp": 1462629479859u64,
        "webhookEventId": format!("01FZ74A0TDDPYRVKNK77XKC3ZR{}", rand::random::<u16>()),
        "deliveryContext": {"isRedelivery": false},
        "source": {"type": "user", "userId": "U4af4980629"},
        "message": {
            "type": "text",
            "id": "325708",
            "text": text,
            "quoteToken": "q3Plxr4AgKd"
        }
    });
    serde_json::from_value(raw).unwrap()
}

#[test]
fn encode_event_test_round_trip_preserves_typed_and_extra_fields() {
    let token = format!("tok{}", rand::random::<u32>());
    let event = text_event(&token, "hello");
    let data = encode_event(&event).unwrap();
    let decoded = decode_event(&data).unwrap();
    assert_eq!(decoded, event);
    assert_eq!(decoded.reply_token.as_deref(), Some(token.as_str()));
    assert_eq!(decoded.event_type, "message");
    assert_eq!(decoded.extra.get("mode"), Some(&Value::from("active")));
    let message = decoded.message.unwrap();
    assert_eq!(message.text.as_deref(), Some("hello"));
    assert_eq!(message.extra.get("quoteToken"), Some(&Value::from("q3Plxr4AgKd")));
}

#[test]
fn encode_event_test_is_base64_of_json() {
    let event = Event {
        event_type: String::from("follow"),
        reply_token: Some(String::from("tok123")),
        message: None,
        extra: Map::new(),
    };
    let data = encode_event(&event).unwrap();
    let json = STANDARD.decode(&data).unwrap();
    let value: Value = serde_json::from_slice(&json).unwrap();
    assert_eq!(value, json!({"type": "follow", "replyToken": "tok123"}));
}

#[test]
fn decode_event_test_invalid_base64() {
    match decode_event("%%% not base64 %%%") {
        Err(EventCodecError::DecodeFailure(_)) => {}
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn decode_event_test_valid_base64_invalid_json() {
    let data = STANDARD.encode(b"{\"type\": ");
    match decode_event(&data) {
        Err(EventCodecError::ParseFailure(_)) => {}
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn decode_event_test_json_without_type_is_rejected() {
    let data = STANDARD.encode(b"{\"replyToken\": \"tok123\"}");
    assert!(matches!(
        decode_event(&data),
        Err(EventCodecError::ParseFailure(_))
    ));
}

#[test]
fn build_tasks_test_preserves_order_and_targets_task_endpoint() {
    let tokens: Vec<String> = (0..3)
        .map(|_| format!("tok{}", rand::random::<u32>()))
        .collect();
    let events: Vec<Event> = tokens.iter().map(|t| text_event(t, "hi")).collect();
    let (tasks, failures) = build_tasks(&events);
    assert!(failures.is_empty());
    assert_eq!(tasks.len(), 3);
    for (i, (index, task)) in tasks.iter().enumerate() {
        assert_eq!(*index, i);
        assert_eq!(task.target, TASK_TARGET);
        assert_eq!(task.data, encode_event(&events[i]).unwrap());
        let decoded = decode_event(&task.data).unwrap();
        assert_eq!(decoded.reply_token.as_deref(), Some(tokens[i].as_str()));
    }
    assert_ne!(tasks[0].1.name, tasks[1].1.name);
}

#[test]
fn build_tasks_test_empty_list() {
    let (tasks, failures) = build_tasks(&[]);
    assert!(tasks.is_empty());
    assert!(failures.is_empty());
}

#[test]
fn decode_event_test_message_without_text() {
    let event = Event {
        event_type: String::from("message"),
        reply_token: Some(String::from("tok123")),
        message: Some(EventMessage {
            message_type: String::from("sticker"),
            id: Some(String::from("1")),
            text: None,
            extra: Map::new(),
        }),
        extra: Map::new(),
    };
    let decoded = decode_event(&encode_event(&event).unwrap()).unwrap();
    assert_eq!(decoded, event);
}
