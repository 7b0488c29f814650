//! Lookup tools for RoadClaim.
//!
//! Two capabilities are exposed to the agent runner through the
//! [`ToolGateway`]: policy coverage by policyholder name and a garage
//! directory by city. Both read from an in-memory [`Catalog`], seeded from
//! embedded sample data or a JSON file.

pub mod catalog;
pub mod garage_directory;
pub mod policy_lookup;

use roadclaim_core::tool::ToolGateway;
use std::sync::Arc;

pub use catalog::{Catalog, CatalogError, Garage, Policy};
pub use garage_directory::GarageDirectoryTool;
pub use policy_lookup::PolicyLookupTool;

/// Create a gateway with both lookup tools over the given catalog.
pub fn default_gateway(catalog: Arc<Catalog>) -> ToolGateway {
    ToolGateway::new()
        .with(Box::new(PolicyLookupTool::new(catalog.clone())))
        .with(Box::new(GarageDirectoryTool::new(catalog)))
}
