//! The claim record and its lifecycle.
//!
//! A claim is created exactly once per conversation and then mutated only by
//! the agent run that owns it. Status moves forward through the pipeline
//! stages and ends in [`ClaimStatus::Completed`] or [`ClaimStatus::Failed`].

use crate::error::ErrorKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a claim, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimStatus {
    Pending,
    Extracting,
    CoverageCheck,
    GarageLookup,
    ActionRecommendation,
    MessageComposition,
    Completed,
    Failed,
}

impl ClaimStatus {
    fn rank(&self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Extracting => 1,
            Self::CoverageCheck => 2,
            Self::GarageLookup => 3,
            Self::ActionRecommendation => 4,
            Self::MessageComposition => 5,
            Self::Completed | Self::Failed => 6,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Forward-only. Stages may be skipped; `Failed` is reachable from any
    /// non-terminal status; terminal statuses go nowhere.
    pub fn can_transition_to(&self, next: ClaimStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        next == Self::Failed || next.rank() > self.rank()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Extracting => "extracting",
            Self::CoverageCheck => "coverage_check",
            Self::GarageLookup => "garage_lookup",
            Self::ActionRecommendation => "action_recommendation",
            Self::MessageComposition => "message_composition",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssistanceType {
    FlatTire,
    DeadBattery,
    Tow,
    Lockout,
    OutOfFuel,
    Accident,
}

impl AssistanceType {
    /// Parse a model label. `unknown` and unrecognised labels yield `None`.
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().replace([' ', '-'], "_").as_str() {
            "flat_tire" | "flat_tyre" => Some(Self::FlatTire),
            "dead_battery" => Some(Self::DeadBattery),
            "tow" | "towing" => Some(Self::Tow),
            "lockout" => Some(Self::Lockout),
            "out_of_fuel" => Some(Self::OutOfFuel),
            "accident" => Some(Self::Accident),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FlatTire => "flat_tire",
            Self::DeadBattery => "dead_battery",
            Self::Tow => "tow",
            Self::Lockout => "lockout",
            Self::OutOfFuel => "out_of_fuel",
            Self::Accident => "accident",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyStatus {
    Safe,
    Unsafe,
}

impl SafetyStatus {
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "safe" => Some(Self::Safe),
            "unsafe" => Some(Self::Unsafe),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Safe => "safe",
            Self::Unsafe => "unsafe",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vehicle {
    pub make: Option<String>,
    pub model: Option<String>,
    pub year: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub free_text: Option<String>,
    pub city: Option<String>,
    pub road: Option<String>,
    pub landmark: Option<String>,
}

/// Fields pulled out of the transcript. Any of them may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedFields {
    pub full_name: Option<String>,
    pub vehicle: Option<Vehicle>,
    pub location: Option<Location>,
    pub assistance_type: Option<AssistanceType>,
    pub safety_status: Option<SafetyStatus>,
}

impl ExtractedFields {
    pub fn city(&self) -> Option<&str> {
        self.location.as_ref().and_then(|l| l.city.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageDecision {
    pub covered: bool,
    pub reasoning: String,
    pub policy_section: Option<String>,
    /// 0.0 ..= 1.0
    pub confidence: f32,
}

impl CoverageDecision {
    /// Uncovered, zero-confidence decision recorded when the policy could not be consulted.
    pub fn unverified(reason: impl Into<String>) -> Self {
        Self {
            covered: false,
            reasoning: reason.into(),
            policy_section: None,
            confidence: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Repair,
    Tow,
    DispatchTaxi,
    RentalCar,
}

impl ActionType {
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().replace([' ', '-'], "_").as_str() {
            "repair" => Some(Self::Repair),
            "tow" => Some(Self::Tow),
            "dispatch_taxi" | "taxi" => Some(Self::DispatchTaxi),
            "rental_car" | "rental" => Some(Self::RentalCar),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Repair => "repair",
            Self::Tow => "tow",
            Self::DispatchTaxi => "dispatch_taxi",
            Self::RentalCar => "rental_car",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRecommendation {
    pub action_type: ActionType,
    pub garage_name: Option<String>,
    pub garage_location: Option<String>,
    pub reasoning: String,
    pub estimated_time: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyholderMessage {
    pub assessment: String,
    pub next_steps: String,
    pub sent_at: DateTime<Utc>,
}

/// Why a claim ended in `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimFailure {
    pub kind: ErrorKind,
    pub stage: ClaimStatus,
    pub detail: String,
}

/// Externally triggered decision layered on a completed claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimDecision {
    Approved,
    Rejected,
}

impl ClaimDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claim {
    pub id: String,
    pub conversation_id: String,
    pub status: ClaimStatus,
    pub extracted_fields: Option<ExtractedFields>,
    pub coverage_decision: Option<CoverageDecision>,
    pub action_recommendation: Option<ActionRecommendation>,
    pub policyholder_message: Option<PolicyholderMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<ClaimFailure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<ClaimDecision>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decided_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Claim {
    /// A fresh `Pending` claim for the given conversation.
    pub fn new(conversation_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            conversation_id: conversation_id.into(),
            status: ClaimStatus::Pending,
            extracted_fields: None,
            coverage_decision: None,
            action_recommendation: None,
            policyholder_message: None,
            failure: None,
            decision: None,
            decided_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PIPELINE: [ClaimStatus; 7] = [
        ClaimStatus::Pending,
        ClaimStatus::Extracting,
        ClaimStatus::CoverageCheck,
        ClaimStatus::GarageLookup,
        ClaimStatus::ActionRecommendation,
        ClaimStatus::MessageComposition,
        ClaimStatus::Completed,
    ];

    #[test]
    fn pipeline_moves_forward_only() {
        for pair in PIPELINE.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
            assert!(!pair[1].can_transition_to(pair[0]), "{} -> {}", pair[1], pair[0]);
        }
        // Garage lookup is optional.
        assert!(ClaimStatus::CoverageCheck.can_transition_to(ClaimStatus::ActionRecommendation));
        assert!(!ClaimStatus::Extracting.can_transition_to(ClaimStatus::Extracting));
    }

    #[test]
    fn failed_reachable_from_non_terminal_only() {
        for status in &PIPELINE[..6] {
            assert!(status.can_transition_to(ClaimStatus::Failed));
        }
        assert!(!ClaimStatus::Completed.can_transition_to(ClaimStatus::Failed));
        assert!(!ClaimStatus::Failed.can_transition_to(ClaimStatus::Completed));
    }

    #[test]
    fn labels_parse_leniently() {
        assert_eq!(AssistanceType::parse("Flat Tire"), Some(AssistanceType::FlatTire));
        assert_eq!(AssistanceType::parse("unknown"), None);
        assert_eq!(SafetyStatus::parse("SAFE"), Some(SafetyStatus::Safe));
        assert_eq!(ActionType::parse("dispatch-taxi"), Some(ActionType::DispatchTaxi));
    }

    #[test]
    fn new_claim_is_pending_and_empty() {
        let claim = Claim::new("conv_1");
        assert_eq!(claim.status, ClaimStatus::Pending);
        assert!(claim.coverage_decision.is_none());
        let json = serde_json::to_value(&claim).unwrap();
        assert_eq!(json["status"], "pending");
        assert!(json.get("decision").is_none());
    }
}
