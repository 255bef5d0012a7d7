//! Wire envelope for socket frames

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Message type carrying heartbeats and server system actions
pub const SYSTEM_MESSAGE: &str = "system_message";

/// Every frame in either direction: `{ type, payload, timestamp, userId? }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeMessage {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub payload: Value,

    #[serde(default = "Utc::now", deserialize_with = "lenient_timestamp")]
    pub timestamp: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// Accepts RFC 3339 strings or epoch milliseconds
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let parsed = match &value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => n
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    };
    Ok(parsed.unwrap_or_else(Utc::now))
}

impl RealtimeMessage {
    pub fn new(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
            timestamp: Utc::now(),
            user_id: None,
        }
    }

    /// `{ type: "system_message", payload: { action: "ping" } }`
    pub fn heartbeat() -> Self {
        Self::new(SYSTEM_MESSAGE, serde_json::json!({ "action": "ping" }))
    }

    pub fn parse(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// The system action, when this is a system message
    pub fn system_action(&self) -> Option<SystemAction> {
        if self.kind != SYSTEM_MESSAGE {
            return None;
        }
        let action = self.payload.get("action")?.as_str()?;
        let message = self
            .payload
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string);

        Some(match action {
            "reload_page" => SystemAction::ReloadPage,
            "force_logout" => SystemAction::ForceLogout,
            "maintenance_mode" => SystemAction::MaintenanceMode { message },
            "ping" => SystemAction::Ping,
            "pong" => SystemAction::Pong,
            other => SystemAction::Unknown(other.to_string()),
        })
    }
}

/// Reserved `action` values of a system message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SystemAction {
    ReloadPage,
    ForceLogout,
    MaintenanceMode { message: Option<String> },
    Ping,
    Pong,
    Unknown(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_envelope() {
        let msg = RealtimeMessage::parse(
            r#"{"type":"tournament_update","payload":{"id":5},"timestamp":"2026-03-01T10:00:00Z","userId":"u1"}"#,
        )
        .unwrap();
        assert_eq!(msg.kind, "tournament_update");
        assert_eq!(msg.payload, json!({"id": 5}));
        assert_eq!(msg.user_id.as_deref(), Some("u1"));
        assert_eq!(msg.timestamp.to_rfc3339(), "2026-03-01T10:00:00+00:00");
    }

    #[test]
    fn test_epoch_timestamp_and_missing_fields() {
        let msg = RealtimeMessage::parse(r#"{"type":"x","timestamp":1700000000000}"#).unwrap();
        assert_eq!(msg.timestamp.timestamp_millis(), 1_700_000_000_000);
        assert_eq!(msg.payload, Value::Null);

        assert!(RealtimeMessage::parse(r#"{"payload":{}}"#).is_err());
    }

    #[test]
    fn test_heartbeat_shape() {
        let value: Value = serde_json::from_str(&RealtimeMessage::heartbeat().to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "system_message");
        assert_eq!(value["payload"]["action"], "ping");
        assert!(value.get("userId").is_none());
    }

    #[test]
    fn test_system_actions() {
        let msg = RealtimeMessage::new(
            SYSTEM_MESSAGE,
            json!({"action": "maintenance_mode", "message": "Back at 10"}),
        );
        assert_eq!(
            msg.system_action(),
            Some(SystemAction::MaintenanceMode {
                message: Some("Back at 10".into())
            })
        );

        let msg = RealtimeMessage::new(SYSTEM_MESSAGE, json!({"action": "force_logout"}));
        assert_eq!(msg.system_action(), Some(SystemAction::ForceLogout));

        let msg = RealtimeMessage::new("match_update", json!({"action": "force_logout"}));
        assert_eq!(msg.system_action(), None);
    }
}
