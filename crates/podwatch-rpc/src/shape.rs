//! Gossip response decoding.
//!
//! Pods on different firmware return the pod list in three shapes: an
//! object with an array field `pods`, an object with an array field
//! `list`, or a bare array. Decoding is an explicit tagged step — either
//! the records come out, or the shape is unrecognized and the caller
//! treats the candidate endpoint as failed.

use serde::Deserialize;
use serde_json::Value;

use podwatch_core::error::RpcError;

/// One raw pod record as it appears in a `get-pods-with-stats` response.
///
/// Field names vary across pod firmware; aliases cover the observed
/// variants. The address may still carry a port and is NOT yet canonical.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPod {
    #[serde(alias = "address", alias = "addr")]
    pub ip: Option<String>,
    #[serde(alias = "node_pubkey")]
    pub pubkey: Option<String>,
    pub version: Option<String>,
    /// Storage in GB; reported as a string by some firmware versions.
    #[serde(default)]
    pub storage: Option<StorageField>,
    pub uptime: Option<i64>,
    pub status: Option<String>,
    #[serde(default)]
    pub is_public: Option<bool>,
}

/// Storage reported either as a number or a numeric string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StorageField {
    Num(f64),
    Str(String),
}

impl StorageField {
    /// Parse to a float GB value; unparseable strings yield `None`.
    pub fn as_gb(&self) -> Option<f64> {
        match self {
            StorageField::Num(n) => Some(*n),
            StorageField::Str(s) => s.trim().parse::<f64>().ok(),
        }
    }
}

/// Per-node live metrics from a `get-stats` response.
///
/// Every field is optional; unreliable pods omit what they don't track.
/// `file_size` is a byte count, unlike the gossip-level storage field.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PodStatsRaw {
    #[serde(default)]
    pub cpu_percent: Option<f64>,
    #[serde(default)]
    pub ram_used: Option<i64>,
    #[serde(default)]
    pub ram_total: Option<i64>,
    #[serde(default)]
    pub uptime: Option<i64>,
    #[serde(default)]
    pub file_size: Option<i64>,
    #[serde(default)]
    pub active_streams: Option<i64>,
    #[serde(default)]
    pub packets_received: Option<i64>,
    #[serde(default)]
    pub packets_sent: Option<i64>,
}

/// Decode a `get-pods-with-stats` result into pod records.
///
/// Accepts `{pods: [...]}`, `{list: [...]}`, or a bare array. Anything
/// else is [`RpcError::UnrecognizedShape`]. Individual records that fail
/// to deserialize are dropped here; identity validation happens later in
/// preprocessing.
pub fn decode_pod_list(value: &Value) -> Result<Vec<RawPod>, RpcError> {
    let items = if let Some(items) = value.as_array() {
        items
    } else if let Some(items) = value.get("pods").and_then(Value::as_array) {
        items
    } else if let Some(items) = value.get("list").and_then(Value::as_array) {
        items
    } else {
        return Err(RpcError::UnrecognizedShape(shape_of(value)));
    };

    Ok(items
        .iter()
        .filter_map(|item| serde_json::from_value(item.clone()).ok())
        .collect())
}

/// Decode a `get-stats` result.
///
/// `None` means the pod gave no usable stats (null or non-object result);
/// the stats cycle treats that the same as no response.
pub fn decode_pod_stats(value: &Value) -> Option<PodStatsRaw> {
    if !value.is_object() {
        return None;
    }
    serde_json::from_value(value.clone()).ok()
}

/// Short human description of a value's shape, for error messages.
fn shape_of(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let keys: Vec<&str> = map.keys().map(String::as_str).take(5).collect();
            format!("object with keys [{}]", keys.join(", "))
        }
        Value::Null => "null".to_string(),
        Value::Bool(_) => "bool".to_string(),
        Value::Number(_) => "number".to_string(),
        Value::String(_) => "string".to_string(),
        Value::Array(_) => "array".to_string(),
    }
}
