//! Plugin settings

use crate::Result;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use watermark_core::{WatermarkConfig, WatermarkSettings};

/// Settings record stored by the host for this plugin
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginSettings {
    /// Master switch; absent or falsy means images pass through untouched
    #[serde(default, deserialize_with = "deserialize_switch")]
    pub enabled: bool,

    /// Watermark options (`type`, `text`, `imagePath`, `position`, ...)
    #[serde(flatten)]
    pub watermark: WatermarkSettings,
}

/// Accept `true`/`false`, `"true"`/`"false"` and numbers for the switch
fn deserialize_switch<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Bool(b) => b,
        Value::String(s) => s.trim().eq_ignore_ascii_case("true"),
        Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        _ => false,
    })
}

impl PluginSettings {
    /// Parse settings from a JSON object
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parse settings from an already decoded JSON value
    pub fn from_value(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// Look up this plugin's settings under `key` in a host settings store
    ///
    /// Returns `Ok(None)` when the key is absent or null.
    pub fn from_store(store: &Value, key: &str) -> Result<Option<Self>> {
        match store.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => Self::from_value(value.clone()).map(Some),
        }
    }

    /// Normalized watermark configuration
    pub fn config(&self) -> WatermarkConfig {
        WatermarkConfig::from_settings(&self.watermark)
    }
}
