use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ClientError;

/// Parameter document passed to `load_client`. Kept as JSON so a network
/// implementation can carry fields this crate does not know about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientParams(Value);

impl Default for ClientParams {
    fn default() -> Self {
        Self(Value::Object(Map::new()))
    }
}

impl ClientParams {
    pub fn from_value(value: Value) -> Result<Self, ClientError> {
        if value.is_object() {
            Ok(Self(value))
        } else {
            Err(ClientError::InvalidParams(
                "client parameters must be a JSON object".into(),
            ))
        }
    }

    pub fn from_json(raw: &str) -> Result<Self, ClientError> {
        let value: Value =
            serde_json::from_str(raw).map_err(|e| ClientError::InvalidParams(e.to_string()))?;
        Self::from_value(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn to_json(&self) -> String {
        self.0.to_string()
    }

    pub fn immediate_sending(&self) -> bool {
        self.0
            .pointer("/Network/EnableImmediateSending")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Send messages as soon as they are queued instead of batching them
    /// into the next round.
    pub fn with_immediate_sending(mut self) -> Self {
        if let Value::Object(root) = &mut self.0 {
            let network = root
                .entry("Network")
                .or_insert_with(|| Value::Object(Map::new()));
            if !network.is_object() {
                *network = Value::Object(Map::new());
            }
            if let Value::Object(network) = network {
                network.insert("EnableImmediateSending".into(), Value::Bool(true));
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn immediate_sending_keeps_other_fields() {
        let params = ClientParams::from_value(json!({
            "Network": { "MaxCheckedRounds": 500 },
            "CMix": { "RoundTries": 10 }
        }))
        .unwrap()
        .with_immediate_sending();

        assert!(params.immediate_sending());
        assert_eq!(
            params.as_value(),
            &json!({
                "Network": { "MaxCheckedRounds": 500, "EnableImmediateSending": true },
                "CMix": { "RoundTries": 10 }
            })
        );
    }

    #[test]
    fn non_object_params_are_rejected() {
        assert!(matches!(
            ClientParams::from_json("[1,2]"),
            Err(ClientError::InvalidParams(_))
        ));
        assert!(!ClientParams::default().immediate_sending());
    }
}
