//! Inbound request shapes for both transports.
//!
//! Every identifier field is optional: missing or malformed values are
//! replaced by a sentinel downstream rather than rejected.

use serde::{Deserialize, Deserializer, Serialize};
use ts_rs::TS;

/// Body of `POST /api/attack` (and the `attack` `WebSocket` message).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct AttackRequest {
    /// Who is attacking.
    #[serde(default, deserialize_with = "lenient_string")]
    #[ts(optional)]
    pub attacker_id: Option<String>,
    /// Attack label.
    #[serde(default, deserialize_with = "lenient_string")]
    #[ts(optional)]
    pub attack_type: Option<String>,
}

/// Body of `POST /api/defend` (and the `defend` `WebSocket` message).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct DefendRequest {
    /// Who is defending.
    #[serde(default, deserialize_with = "lenient_string")]
    #[ts(optional)]
    pub defender_id: Option<String>,
}

/// A message sent by a client over its `WebSocket`.
///
/// Serialized as `{"action": "attack", "attackerId": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "action", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum ClientMessage {
    /// Start an attack.
    Attack(AttackRequest),
    /// Defend against the running attack.
    Defend(DefendRequest),
    /// Return the system to `Secure`.
    Reset,
    /// Ask for a fresh snapshot.
    GetState,
}

/// Accept any JSON value for an identifier field, keeping only strings.
///
/// `{"attackerId": 42}` deserializes as a missing identifier instead of
/// failing the whole request.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        _ => None,
    })
}
