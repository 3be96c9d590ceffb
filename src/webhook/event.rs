//! Lenient views over Cloud API webhook payloads
//!
//! The provider nests events three levels deep (`entry[].changes[].value`)
//! and individual items routinely miss fields. Extraction works directly
//! on `serde_json::Value` and is best-effort: a malformed item yields
//! `None` and the reconciler skips it, never the whole delivery.

use crate::inbox::types::now_ts;
use serde_json::Value;

/// Top-level discriminator of deliveries addressed to us
pub const WEBHOOK_OBJECT: &str = "whatsapp_business_account";

/// Error codes the provider uses when the recipient has no WhatsApp
/// account
const NO_ACCOUNT_CODES: &[i64] = &[131026, 1013];

/// Known phrasings of the same failure in error titles and details
const NO_ACCOUNT_PHRASES: &[&str] = &[
    "Message Undeliverable",
    "not a valid WhatsApp user",
    "Receiver is incapable of receiving this message",
];

/// One inbound message item, extracted from `value.messages[]`
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub from: String,
    pub provider_id: Option<String>,
    pub sender_name: Option<String>,
    pub body: String,
    pub timestamp: i64,
}

/// One delivery-status item, extracted from `value.statuses[]`
#[derive(Debug, Clone, PartialEq)]
pub struct StatusEvent {
    pub provider_id: String,
    pub status: String,
    pub recipient_id: Option<String>,
    pub timestamp: i64,
    /// Any attached error classified as "recipient has no account"
    pub no_account: bool,
}

/// Whether the payload's `object` discriminator is ours
pub fn is_whatsapp_payload(payload: &Value) -> bool {
    payload.get("object").and_then(Value::as_str) == Some(WEBHOOK_OBJECT)
}

/// The array under `key`, or empty when absent or not an array
pub fn items<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Every `value` object reachable through `entry[].changes[]`
pub fn change_values(payload: &Value) -> Vec<&Value> {
    let mut values = Vec::new();
    for entry in items(payload, "entry") {
        for change in items(entry, "changes") {
            if let Some(value) = change.get("value") {
                values.push(value);
            }
        }
    }
    values
}

/// Extract one message item. `None` when the item has no sender, the
/// only field without which the message cannot be stored.
pub fn parse_message(item: &Value, contacts: &[Value]) -> Option<InboundMessage> {
    let from = item.get("from").and_then(Value::as_str)?.to_string();
    let provider_id = item.get("id").and_then(Value::as_str).map(String::from);
    let sender_name = contact_name(contacts, &from);
    let body = message_text(item);
    let timestamp = coerce_timestamp(item.get("timestamp"));

    Some(InboundMessage {
        from,
        provider_id,
        sender_name,
        body,
        timestamp,
    })
}

/// Extract one status item. `None` without both the message id and the
/// status label.
pub fn parse_status(item: &Value) -> Option<StatusEvent> {
    let provider_id = item.get("id").and_then(Value::as_str)?.to_string();
    let status = item.get("status").and_then(Value::as_str)?.to_string();
    let recipient_id = item
        .get("recipient_id")
        .and_then(Value::as_str)
        .map(String::from);
    let timestamp = coerce_timestamp(item.get("timestamp"));
    let no_account = items(item, "errors").iter().any(is_no_account_error);

    Some(StatusEvent {
        provider_id,
        status,
        recipient_id,
        timestamp,
        no_account,
    })
}

/// Best-effort text for a message item. Plain text wins, then the title
/// of an interactive reply, then a placeholder naming the message type.
pub fn message_text(item: &Value) -> String {
    if let Some(text) = item["text"]["body"]
        .as_str()
        .or_else(|| item["interactive"]["button_reply"]["title"].as_str())
        .or_else(|| item["interactive"]["list_reply"]["title"].as_str())
    {
        return text.to_string();
    }

    let kind = item.get("type").and_then(Value::as_str).unwrap_or("unknown");
    format!("[{} message]", kind)
}

/// Provider timestamps arrive as epoch-second strings, occasionally as
/// numbers. Anything else falls back to the current time so the event
/// is kept rather than dropped.
pub fn coerce_timestamp(value: Option<&Value>) -> i64 {
    match value {
        Some(Value::String(s)) => s.parse().unwrap_or_else(|_| now_ts()),
        Some(Value::Number(n)) => n.as_i64().unwrap_or_else(now_ts),
        _ => now_ts(),
    }
}

/// Display name from the contacts array entry matching the sender
fn contact_name(contacts: &[Value], wa_id: &str) -> Option<String> {
    contacts
        .iter()
        .find(|c| c["wa_id"].as_str() == Some(wa_id))
        .and_then(|c| c["profile"]["name"].as_str())
        .filter(|name| !name.is_empty())
        .map(String::from)
}

fn is_no_account_error(error: &Value) -> bool {
    if let Some(code) = error.get("code").and_then(Value::as_i64) {
        if NO_ACCOUNT_CODES.contains(&code) {
            return true;
        }
    }

    ["title", "detail"].iter().any(|field| {
        error
            .get(*field)
            .and_then(Value::as_str)
            .map(|text| NO_ACCOUNT_PHRASES.iter().any(|phrase| text.contains(phrase)))
            .unwrap_or(false)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_object_discriminator() {
        assert!(is_whatsapp_payload(&json!({
            "object": "whatsapp_business_account"
        })));
        assert!(!is_whatsapp_payload(&json!({"object": "page"})));
        assert!(!is_whatsapp_payload(&json!({"entry": []})));
    }

    #[test]
    fn test_change_values_walks_all_entries() {
        let payload = json!({
            "object": "whatsapp_business_account",
            "entry": [
                {"changes": [{"value": {"a": 1}}, {"value": {"b": 2}}]},
                {"changes": [{"value": {"c": 3}}]},
                {"changes": "not an array"}
            ]
        });

        assert_eq!(change_values(&payload).len(), 3);
    }

    #[test]
    fn test_parse_text_message() {
        let contacts = vec![json!({
            "wa_id": "5511999999999",
            "profile": {"name": "Alice"}
        })];
        let item = json!({
            "from": "5511999999999",
            "id": "wamid.IN1",
            "timestamp": "1700000000",
            "type": "text",
            "text": {"body": "hello"}
        });

        let message = parse_message(&item, &contacts).unwrap();
        assert_eq!(message.from, "5511999999999");
        assert_eq!(message.provider_id.as_deref(), Some("wamid.IN1"));
        assert_eq!(message.sender_name.as_deref(), Some("Alice"));
        assert_eq!(message.body, "hello");
        assert_eq!(message.timestamp, 1700000000);
    }

    #[test]
    fn test_message_without_sender_is_skipped() {
        let item = json!({
            "id": "wamid.IN1",
            "type": "text",
            "text": {"body": "hello"}
        });

        assert!(parse_message(&item, &[]).is_none());
    }

    #[test]
    fn test_button_reply_title_as_body() {
        let item = json!({
            "from": "1",
            "type": "interactive",
            "interactive": {"button_reply": {"id": "b1", "title": "Yes please"}}
        });

        assert_eq!(message_text(&item), "Yes please");
    }

    #[test]
    fn test_list_reply_title_as_body() {
        let item = json!({
            "from": "1",
            "type": "interactive",
            "interactive": {"list_reply": {"id": "r2", "title": "Option two"}}
        });

        assert_eq!(message_text(&item), "Option two");
    }

    #[test]
    fn test_unsupported_type_placeholder() {
        let item = json!({"from": "1", "type": "image", "image": {"id": "media-1"}});
        assert_eq!(message_text(&item), "[image message]");

        let item = json!({"from": "1"});
        assert_eq!(message_text(&item), "[unknown message]");
    }

    #[test]
    fn test_contact_name_matched_by_wa_id() {
        let contacts = vec![
            json!({"wa_id": "111", "profile": {"name": "Someone Else"}}),
            json!({"wa_id": "222", "profile": {"name": "Alice"}}),
        ];

        assert_eq!(contact_name(&contacts, "222").as_deref(), Some("Alice"));
        assert!(contact_name(&contacts, "333").is_none());
    }

    #[test]
    fn test_empty_contact_name_ignored() {
        let contacts = vec![json!({"wa_id": "111", "profile": {"name": ""}})];
        assert!(contact_name(&contacts, "111").is_none());
    }

    #[test]
    fn test_timestamp_coercion() {
        assert_eq!(
            coerce_timestamp(Some(&json!("1700000000"))),
            1700000000
        );
        assert_eq!(coerce_timestamp(Some(&json!(1700000001))), 1700000001);

        // Non-numeric and absent timestamps fall back to now
        let before = now_ts();
        assert!(coerce_timestamp(Some(&json!("not a number"))) >= before);
        assert!(coerce_timestamp(None) >= before);
    }

    #[test]
    fn test_parse_status() {
        let item = json!({
            "id": "wamid.ABC",
            "status": "delivered",
            "timestamp": "1700000100",
            "recipient_id": "5511999999999"
        });

        let status = parse_status(&item).unwrap();
        assert_eq!(status.provider_id, "wamid.ABC");
        assert_eq!(status.status, "delivered");
        assert_eq!(status.recipient_id.as_deref(), Some("5511999999999"));
        assert_eq!(status.timestamp, 1700000100);
        assert!(!status.no_account);
    }

    #[test]
    fn test_status_without_id_or_label_is_skipped() {
        assert!(parse_status(&json!({"status": "delivered"})).is_none());
        assert!(parse_status(&json!({"id": "wamid.ABC"})).is_none());
    }

    #[test]
    fn test_no_account_by_error_code() {
        for code in [131026, 1013] {
            let item = json!({
                "id": "wamid.F",
                "status": "failed",
                "errors": [{"code": code, "title": "whatever"}]
            });
            assert!(parse_status(&item).unwrap().no_account);
        }
    }

    #[test]
    fn test_no_account_by_phrase() {
        let item = json!({
            "id": "wamid.F",
            "status": "failed",
            "errors": [{"code": 0, "title": "Message Undeliverable."}]
        });
        assert!(parse_status(&item).unwrap().no_account);

        let item = json!({
            "id": "wamid.F",
            "status": "failed",
            "errors": [{"code": 0, "title": "Bad", "detail": "131026: not a valid WhatsApp user"}]
        });
        assert!(parse_status(&item).unwrap().no_account);
    }

    #[test]
    fn test_no_account_match_is_case_sensitive() {
        let item = json!({
            "id": "wamid.F",
            "status": "failed",
            "errors": [{"code": 42, "title": "message undeliverable"}]
        });
        assert!(!parse_status(&item).unwrap().no_account);
    }

    #[test]
    fn test_other_failures_not_classified() {
        let item = json!({
            "id": "wamid.F",
            "status": "failed",
            "errors": [{"code": 131047, "title": "Re-engagement message"}]
        });
        assert!(!parse_status(&item).unwrap().no_account);
    }
}
