//! Reasoning model provider implementations for RoadClaim.
//!
//! All providers implement the `roadclaim_core::Provider` trait.
//! [`build_from_config`] selects the backend from configuration.

pub mod openai_compat;
pub mod router;

pub use openai_compat::OpenAiCompatProvider;
pub use router::{build_from_config, default_base_url};
