//! Garage directory lookup by city.

use crate::catalog::Catalog;
use async_trait::async_trait;
use roadclaim_core::error::ToolError;
use roadclaim_core::tool::{Tool, ToolResult};
use std::sync::Arc;

pub use roadclaim_core::tool::GARAGE_DIRECTORY_TOOL as TOOL_NAME;

pub struct GarageDirectoryTool {
    catalog: Arc<Catalog>,
}

impl GarageDirectoryTool {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl Tool for GarageDirectoryTool {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        "List partner garages in a city, with address, services offered, and phone number. Returns an empty list when the city has no partner garage."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "city": {
                    "type": "string",
                    "description": "City where the vehicle is stranded"
                }
            },
            "required": ["city"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let city = arguments["city"]
            .as_str()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'city' argument".into()))?;

        let garages = self.catalog.garages_in(city);
        tracing::debug!(city, found = garages.len(), "Garage directory lookup");

        Ok(ToolResult::structured(serde_json::json!({
            "city": city,
            "garages": garages,
        })))
    }
}
