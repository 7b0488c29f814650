//! The claim agent for RoadClaim.
//!
//! A claim moves through a fixed pipeline of model stages:
//!
//! 1. **Extract** structured fields from the call transcript
//! 2. **Check coverage** against the caller's policy (policy lookup tool)
//! 3. **Look up garages** in the caller's city, when dispatch is plausible
//! 4. **Recommend** the next action
//! 5. **Compose** the message to the policyholder
//!
//! Each stage is a bounded tool-calling loop against the configured
//! provider. The [`ResolutionService`] guarantees that each conversation
//! gets exactly one claim and at most one run.

pub mod dispatch;
pub mod engine;
pub mod guard;
pub mod parse;
pub mod prompts;
pub mod resolution;
pub mod runner;

#[cfg(test)]
mod test_helpers;

pub use dispatch::{DefaultDispatchRule, DispatchRule};
pub use engine::{ClaimEngine, Intake};
pub use guard::CallGuard;
pub use resolution::{ClaimProcessor, Resolution, ResolutionService, ResolveError};
pub use runner::{AgentRunner, RunnerSettings};
