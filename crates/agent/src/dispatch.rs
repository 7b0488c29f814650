//! Whether a claim goes through garage lookup.

use roadclaim_core::{CoverageDecision, ExtractedFields};

/// Decision point between coverage check and action recommendation.
pub trait DispatchRule: Send + Sync {
    fn needs_garage_lookup(&self, fields: &ExtractedFields, coverage: &CoverageDecision) -> bool;
}

/// Look up garages for covered claims with a known city.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultDispatchRule;

impl DispatchRule for DefaultDispatchRule {
    fn needs_garage_lookup(&self, fields: &ExtractedFields, coverage: &CoverageDecision) -> bool {
        coverage.covered && fields.city().is_some()
    }
}

impl<F> DispatchRule for F
where
    F: Fn(&ExtractedFields, &CoverageDecision) -> bool + Send + Sync,
{
    fn needs_garage_lookup(&self, fields: &ExtractedFields, coverage: &CoverageDecision) -> bool {
        self(fields, coverage)
    }
}
