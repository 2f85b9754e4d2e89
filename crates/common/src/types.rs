use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A deserialized notification request pulled off the queue.
///
/// Wire format is a JSON object with exactly these fields; unknown or missing
/// fields make the payload malformed and the envelope is completed without
/// dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NotificationRequest {
    /// Caller-supplied unique id deduplicating logically identical requests.
    pub idempotence_key: Uuid,
    pub phone_number: String,
    pub message: String,
    pub subject: String,
}

/// Outbound SMS handed to the notification transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmsMessage {
    pub phone_number: String,
    pub body: String,
    pub subject: String,
}

impl From<&NotificationRequest> for SmsMessage {
    fn from(request: &NotificationRequest) -> Self {
        Self {
            phone_number: request.phone_number.clone(),
            body: request.message.clone(),
            subject: request.subject.clone(),
        }
    }
}

/// Result of one handling attempt for a notification request.
///
/// The failed case is the `Err` side of the dispatch result, so callers
/// cannot complete the source envelope without inspecting it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The SMS was sent and the idempotence record written.
    Sent,
    /// An idempotence record already covered this key; nothing was sent.
    AlreadyHandled,
}

impl std::fmt::Display for DispatchOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DispatchOutcome::Sent => write!(f, "sent"),
            DispatchOutcome::AlreadyHandled => write!(f, "already_handled"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_deserializes_wire_format() {
        let json = r#"{
            "idempotenceKey": "550e8400-e29b-41d4-a716-446655440000",
            "phoneNumber": "1234567890",
            "message": "Test message",
            "subject": "Test subject"
        }"#;

        let request: NotificationRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.phone_number, "1234567890");
        assert_eq!(request.message, "Test message");
        assert_eq!(request.subject, "Test subject");
    }

    #[test]
    fn test_request_rejects_unknown_fields() {
        let json = r#"{
            "idempotenceKey": "550e8400-e29b-41d4-a716-446655440000",
            "phoneNumber": "1234567890",
            "message": "Test message",
            "subject": "Test subject",
            "extra": 1
        }"#;

        assert!(serde_json::from_str::<NotificationRequest>(json).is_err());
    }

    #[test]
    fn test_request_rejects_missing_fields() {
        let json = r#"{"phoneNumber": "1234567890"}"#;
        assert!(serde_json::from_str::<NotificationRequest>(json).is_err());
    }
}
