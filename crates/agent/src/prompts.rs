//! Stage instructions sent to the reasoning model.

use roadclaim_core::{CoverageDecision, ExtractedFields};

pub const EXTRACTION: &str = r#"You are an insurance claims intake analyst for a roadside-assistance line.
Read the call transcript and extract the caller's details.

Return a single JSON object with these keys:
- full_name: policyholder first and last name
- car_make, car_model, car_year
- location: where the vehicle is, as said on the call
- city, road_or_street, landmark_or_exit
- assistance_type: one of flat_tire, dead_battery, tow, lockout, out_of_fuel, accident, unknown
- safety_status: one of safe, unsafe, unknown

Use "unknown" for anything the caller did not say. Do not guess."#;

pub const COVERAGE: &str = r#"You are an expert insurance coverage analyst.
Review the claim against the policy and decide whether it is covered.
Consider whether the assistance type matches a coverage rule and whether any exclusion applies.

Return a single JSON object with:
- covered: boolean
- reasoning: one or two sentences explaining the decision
- policy_section: the rule section that applies, or null
- confidence: number between 0 and 1"#;

pub const ACTION: &str = r#"You are a roadside-assistance dispatcher.
Recommend the single best next action for this claim:
- "repair" for on-site fixes (flat tire, battery, lockout, fuel)
- "tow" when the vehicle must be transported
- "dispatch_taxi" when the caller needs a ride or the claim is not covered
- "rental_car" for extended repairs

Pick a garage from the list provided when one fits. You may call get_garages for a nearby city if the list is empty.

Return a single JSON object with:
- action_type
- garage_name, garage_location (null when no garage applies)
- reasoning
- estimated_time (for example "45 minutes"), or null"#;

pub const MESSAGE: &str = r#"You write short, reassuring messages to policyholders stranded at the roadside.
Explain the coverage decision in plain words and what happens next, including garage details and estimated time when known.

Return a single JSON object with:
- assessment: the coverage outcome addressed to the caller
- next_steps: what will happen next and what the caller should do"#;

fn or_unknown(value: Option<&str>) -> &str {
    value.unwrap_or("unknown")
}

/// Plain-text claim summary used as stage input.
pub fn claim_summary(fields: &ExtractedFields) -> String {
    let vehicle = fields
        .vehicle
        .as_ref()
        .map(|v| {
            [v.year.as_deref(), v.make.as_deref(), v.model.as_deref()]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|v| !v.is_empty());
    let location = fields.location.as_ref();

    format!(
        "Claim details:\n- Full name: {}\n- Vehicle: {}\n- Location: {}\n- City: {}\n- Assistance type: {}\n- Safety status: {}",
        or_unknown(fields.full_name.as_deref()),
        or_unknown(vehicle.as_deref()),
        or_unknown(location.and_then(|l| l.free_text.as_deref())),
        or_unknown(location.and_then(|l| l.city.as_deref())),
        fields.assistance_type.map_or("unknown", |t| t.as_str()),
        fields.safety_status.map_or("unknown", |s| s.as_str()),
    )
}

pub fn coverage_summary(decision: &CoverageDecision) -> String {
    format!(
        "Coverage decision: {} (confidence {:.2}, section {})\nReasoning: {}",
        if decision.covered { "covered" } else { "not covered" },
        decision.confidence,
        decision.policy_section.as_deref().unwrap_or("none"),
        decision.reasoning,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use roadclaim_core::{AssistanceType, Location, Vehicle};

    #[test]
    fn summary_lists_known_and_unknown_fields() {
        let fields = ExtractedFields {
            full_name: Some("Jane Doe".into()),
            vehicle: Some(Vehicle {
                make: Some("Toyota".into()),
                model: Some("Corolla".into()),
                year: None,
            }),
            location: Some(Location {
                city: Some("San Francisco".into()),
                ..Location::default()
            }),
            assistance_type: Some(AssistanceType::FlatTire),
            safety_status: None,
        };
        let summary = claim_summary(&fields);
        assert!(summary.contains("Full name: Jane Doe"));
        assert!(summary.contains("Vehicle: Toyota Corolla"));
        assert!(summary.contains("City: San Francisco"));
        assert!(summary.contains("Assistance type: flat_tire"));
        assert!(summary.contains("Safety status: unknown"));
    }
}
