use serde_json::Value;
use crate::error::{HubError, Result};
use crate::protocol::message::Message;

pub fn encode(message: &Message) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(message)?)
}

/// Parses a datagram into a [`Message`].
///
/// Invalid UTF-8 is replaced rather than rejected and trailing NUL padding is
/// ignored. Anything that is not a JSON object at the top level is a
/// `MalformedResponse`.
pub fn decode(bytes: &[u8]) -> Result<Message> {
    let text = String::from_utf8_lossy(bytes);
    let text = text.trim_end_matches(|c: char| c == '\0' || c.is_whitespace());
    if text.is_empty() {
        return Err(HubError::MalformedResponse("empty datagram".to_string()));
    }

    let value: Value = serde_json::from_str(text)?;
    if !value.is_object() {
        return Err(HubError::MalformedResponse(format!(
            "expected a JSON object, got {}",
            value
        )));
    }
    Ok(serde_json::from_value(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::message::MsgType;
    use serde_json::json;

    #[test]
    fn test_decode_report() {
        let bytes = br#"{"msgType":"Report","mac":"AABB11223344","deviceType":"10000000","data":{"currentPosition":50}}"#;
        let msg = decode(bytes).unwrap();
        assert!(msg.is(&MsgType::Report));
        assert_eq!(msg.mac.as_deref(), Some("AABB11223344"));
        assert_eq!(msg.status_fields().unwrap().current_position, Some(50));
    }

    #[test]
    fn test_decode_keeps_unknown_fields() {
        let msg = decode(br#"{"msgType":"ReadDeviceAck","actionResult":"ok","data":{}}"#).unwrap();
        assert_eq!(msg.extra.get("actionResult"), Some(&json!("ok")));
        let reencoded: Value = serde_json::from_slice(&encode(&msg).unwrap()).unwrap();
        assert_eq!(reencoded["actionResult"], json!("ok"));
    }

    #[test]
    fn test_decode_tolerates_nul_padding() {
        let msg = decode(b"{\"data\":{\"currentAngle\":90}}\0\0\0").unwrap();
        assert_eq!(msg.status_fields().unwrap().current_angle, Some(90));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(decode(b"not json"), Err(HubError::MalformedResponse(_))));
        assert!(matches!(decode(b""), Err(HubError::MalformedResponse(_))));
        assert!(matches!(decode(b"[1,2,3]"), Err(HubError::MalformedResponse(_))));
        assert!(matches!(decode(b"\"Report\""), Err(HubError::MalformedResponse(_))));
    }

    #[test]
    fn test_encode_is_utf8_json() {
        let bytes = encode(&Message::get_device_list()).unwrap();
        let text = std::str::from_utf8(&bytes).unwrap();
        assert!(text.starts_with('{'));
        assert!(text.contains("\"msgType\":\"GetDeviceList\""));
    }
}
