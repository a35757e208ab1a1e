//! Per-workflow settings.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Zone used when a workflow does not pick one.
pub const DEFAULT_TIMEZONE: &str = "UTC";

/// Sentinel meaning "use the default zone".
pub const TIMEZONE_DEFAULT_SENTINEL: &str = "DEFAULT";

/// Which scheduling order the downstream execution engine should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExecutionOrder {
    #[serde(rename = "v0")]
    V0,
    #[default]
    #[serde(rename = "v1")]
    V1,
}

/// Settings stored alongside a workflow definition.
///
/// Keys this crate does not know about are kept in `extra` and written back
/// untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(default)]
    pub execution_order: ExecutionOrder,
    /// Id of the workflow to run when this one fails.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_workflow: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub save_manual_executions: Option<bool>,
    /// Which workflows may call this one as a sub-workflow.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caller_policy: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl WorkflowSettings {
    /// The configured zone, or [`DEFAULT_TIMEZONE`] when unset or set to
    /// [`TIMEZONE_DEFAULT_SENTINEL`].
    pub fn effective_timezone(&self) -> &str {
        match self.timezone.as_deref() {
            None | Some(TIMEZONE_DEFAULT_SENTINEL) => DEFAULT_TIMEZONE,
            Some(zone) => zone,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn timezone_defaults_to_utc() {
        let mut settings = WorkflowSettings::default();
        assert_eq!(settings.effective_timezone(), "UTC");

        settings.timezone = Some("DEFAULT".into());
        assert_eq!(settings.effective_timezone(), "UTC");

        settings.timezone = Some("Europe/Berlin".into());
        assert_eq!(settings.effective_timezone(), "Europe/Berlin");
    }

    #[test]
    fn unknown_keys_survive_round_trip() {
        let raw = json!({
            "executionOrder": "v0",
            "timezone": "America/New_York",
            "executionTimeout": 3600,
        });
        let settings: WorkflowSettings = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(settings.execution_order, ExecutionOrder::V0);
        assert_eq!(settings.extra["executionTimeout"], json!(3600));
        assert_eq!(serde_json::to_value(&settings).unwrap(), raw);
    }
}
