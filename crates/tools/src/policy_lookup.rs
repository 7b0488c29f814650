//! Policy coverage lookup by policyholder name.

use crate::catalog::Catalog;
use async_trait::async_trait;
use roadclaim_core::error::ToolError;
use roadclaim_core::tool::{Tool, ToolResult};
use std::sync::Arc;

pub use roadclaim_core::tool::POLICY_LOOKUP_TOOL as TOOL_NAME;

pub struct PolicyLookupTool {
    catalog: Arc<Catalog>,
}

impl PolicyLookupTool {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl Tool for PolicyLookupTool {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        "Look up the roadside-assistance policy held by a policyholder. Returns the policy type, coverage rules by section, and exclusions."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "policy_holder_name": {
                    "type": "string",
                    "description": "Full name of the policyholder as given on the call"
                }
            },
            "required": ["policy_holder_name"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let name = arguments["policy_holder_name"]
            .as_str()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| {
                ToolError::InvalidArguments("Missing 'policy_holder_name' argument".into())
            })?;

        let policy = self.catalog.find_policy(name).ok_or_else(|| ToolError::NotFound {
            tool_name: TOOL_NAME.into(),
            query: format!("policyholder '{name}'"),
        })?;

        tracing::debug!(query = name, policy = %policy.policy_number, "Matched policy");

        let data = serde_json::to_value(policy).map_err(|e| ToolError::Fatal {
            tool_name: TOOL_NAME.into(),
            reason: e.to_string(),
        })?;
        Ok(ToolResult::structured(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roadclaim_core::error::ToolErrorKind;

    fn tool() -> PolicyLookupTool {
        PolicyLookupTool::new(Arc::new(Catalog::sample()))
    }

    #[tokio::test]
    async fn returns_matching_policy() {
        let result = tool()
            .execute(serde_json::json!({"policy_holder_name": "Jane Doe"}))
            .await
            .unwrap();
        let data = result.data.unwrap();
        assert_eq!(data["policy_type"], "Premium Roadside");
        assert!(data["coverage_rules"].as_array().unwrap().len() >= 2);
        assert!(result.output.contains("RA-100234"));
    }

    #[tokio::test]
    async fn unknown_holder_is_not_found() {
        let err = tool()
            .execute(serde_json::json!({"policy_holder_name": "Zebulon Quartermaine"}))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ToolErrorKind::NotFound);
        assert!(!err.is_fatal());
    }

    #[tokio::test]
    async fn missing_name_is_invalid() {
        let err = tool()
            .execute(serde_json::json!({"policy_holder_name": "  "}))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ToolErrorKind::InvalidArguments);
    }
}
