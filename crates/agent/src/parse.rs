//! Parsing of structured stage answers.
//!
//! The model is asked for a JSON object per stage. Individual fields are
//! lenient (absent, `null`, `"unknown"` and `""` all mean "not known");
//! only a missing object or a missing required field fails the stage.

use chrono::Utc;
use roadclaim_core::{
    ActionRecommendation, ActionType, AssistanceType, CoverageDecision, Error, ExtractedFields,
    Location, PolicyholderMessage, SafetyStatus, Vehicle,
};
use serde::Deserialize;

/// Pull the JSON object out of a model answer, tolerating code fences and
/// surrounding prose.
pub fn json_object(stage: &str, content: &str) -> Result<serde_json::Value, Error> {
    let trimmed = content.trim();
    let start = trimmed.find('{');
    let end = trimmed.rfind('}');
    let body = match (start, end) {
        (Some(s), Some(e)) if e > s => &trimmed[s..=e],
        _ => {
            return Err(Error::ModelOutputParse {
                stage: stage.into(),
                reason: "answer contains no JSON object".into(),
            });
        }
    };

    serde_json::from_str(body).map_err(|e| Error::ModelOutputParse {
        stage: stage.into(),
        reason: e.to_string(),
    })
}

fn typed<T: for<'de> Deserialize<'de>>(stage: &str, content: &str) -> Result<T, Error> {
    let value = json_object(stage, content)?;
    serde_json::from_value(value).map_err(|e| Error::ModelOutputParse {
        stage: stage.into(),
        reason: e.to_string(),
    })
}

/// `None` for absent, blank, or the `unknown` sentinel.
fn known(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("unknown"))
}

/// Accept strings and numbers (years arrive as both).
fn lenient_string<'de, D>(d: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(d)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

#[derive(Debug, Default, Deserialize)]
struct RawExtraction {
    #[serde(default, alias = "name", deserialize_with = "lenient_string")]
    full_name: Option<String>,
    #[serde(default, alias = "car_make", deserialize_with = "lenient_string")]
    vehicle_make: Option<String>,
    #[serde(default, alias = "car_model", deserialize_with = "lenient_string")]
    vehicle_model: Option<String>,
    #[serde(default, alias = "car_year", deserialize_with = "lenient_string")]
    vehicle_year: Option<String>,
    #[serde(default, alias = "location", deserialize_with = "lenient_string")]
    location_text: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    city: Option<String>,
    #[serde(default, alias = "road_or_street", deserialize_with = "lenient_string")]
    road: Option<String>,
    #[serde(default, alias = "landmark_or_exit", deserialize_with = "lenient_string")]
    landmark: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    assistance_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    safety_status: Option<String>,
}

pub fn extraction(content: &str) -> Result<ExtractedFields, Error> {
    let raw: RawExtraction = typed("extraction", content)?;

    let vehicle = Vehicle {
        make: known(raw.vehicle_make),
        model: known(raw.vehicle_model),
        year: known(raw.vehicle_year),
    };
    let location = Location {
        free_text: known(raw.location_text),
        city: known(raw.city),
        road: known(raw.road),
        landmark: known(raw.landmark),
    };

    Ok(ExtractedFields {
        full_name: known(raw.full_name),
        vehicle: (vehicle != Vehicle::default()).then_some(vehicle),
        location: (location != Location::default()).then_some(location),
        assistance_type: known(raw.assistance_type).and_then(|t| AssistanceType::parse(&t)),
        safety_status: known(raw.safety_status).and_then(|s| SafetyStatus::parse(&s)),
    })
}

#[derive(Debug, Deserialize)]
struct RawCoverage {
    covered: bool,
    #[serde(default)]
    reasoning: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    policy_section: Option<String>,
    #[serde(default)]
    confidence: Option<f32>,
}

pub fn coverage(content: &str) -> Result<CoverageDecision, Error> {
    let raw: RawCoverage = typed("coverage", content)?;
    Ok(CoverageDecision {
        covered: raw.covered,
        reasoning: known(raw.reasoning).unwrap_or_else(|| "No reasoning given.".into()),
        policy_section: known(raw.policy_section),
        confidence: raw.confidence.unwrap_or(0.5).clamp(0.0, 1.0),
    })
}

#[derive(Debug, Deserialize)]
struct RawAction {
    action_type: String,
    #[serde(default, deserialize_with = "lenient_string")]
    garage_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    garage_location: Option<String>,
    #[serde(default)]
    reasoning: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    estimated_time: Option<String>,
}

pub fn action(content: &str) -> Result<ActionRecommendation, Error> {
    let raw: RawAction = typed("action", content)?;
    let action_type = ActionType::parse(&raw.action_type).ok_or_else(|| Error::ModelOutputParse {
        stage: "action".into(),
        reason: format!("unrecognised action_type '{}'", raw.action_type),
    })?;

    Ok(ActionRecommendation {
        action_type,
        garage_name: known(raw.garage_name),
        garage_location: known(raw.garage_location),
        reasoning: known(raw.reasoning).unwrap_or_default(),
        estimated_time: known(raw.estimated_time),
    })
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    assessment: String,
    #[serde(alias = "next_actions")]
    next_steps: String,
}

pub fn message(content: &str) -> Result<PolicyholderMessage, Error> {
    let raw: RawMessage = typed("message", content)?;
    if raw.assessment.trim().is_empty() {
        return Err(Error::ModelOutputParse {
            stage: "message".into(),
            reason: "empty assessment".into(),
        });
    }
    Ok(PolicyholderMessage {
        assessment: raw.assessment.trim().to_string(),
        next_steps: raw.next_steps.trim().to_string(),
        sent_at: Utc::now(),
    })
}
