//! Shared test helpers for runner and resolution tests.

use crate::runner::{AgentRunner, RunnerSettings};
use async_trait::async_trait;
use roadclaim_config::DuplicatePolicy;
use roadclaim_core::error::ProviderError;
use roadclaim_core::message::{Message, MessageToolCall};
use roadclaim_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use roadclaim_core::tool::{POLICY_LOOKUP_TOOL, Tool, ToolGateway, ToolResult};
use roadclaim_core::{Claim, ConversationRecord, Speaker, ToolError, TranscriptEntry};
use roadclaim_store::{ClaimStore, ConversationRegistry, LogBroadcaster};
use roadclaim_tools::{Catalog, GarageDirectoryTool};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// A provider that replays scripted responses in order.
///
/// Once the script runs out every call fails with a non-retryable API error.
pub struct ScriptedProvider {
    responses: Mutex<VecDeque<ProviderResponse>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<ProviderResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Jane Doe, flat tire in San Francisco, covered, repaired at a partner garage.
    pub fn happy_path() -> Self {
        Self::new(vec![
            text_response(&extraction_json("Jane Doe", "San Francisco")),
            text_response(
                r#"{"covered": true, "reasoning": "Flat tire assistance is included in Premium.", "policy_section": "2.1", "confidence": 0.92}"#,
            ),
            text_response(
                r#"{"action_type": "repair", "garage_name": "Bayshore Auto Care", "garage_location": "1200 Bayshore Blvd, San Francisco", "reasoning": "Nearest partner garage with tire service", "estimated_time": "35 minutes"}"#,
            ),
            text_response(
                r#"{"assessment": "Your flat tire is covered under your Premium plan.", "next_steps": "A technician from Bayshore Auto Care will arrive in about 35 minutes."}"#,
            ),
        ])
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> Option<ProviderRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        // Let concurrently running tasks observe intermediate state.
        tokio::task::yield_now().await;
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ProviderError::ApiError {
                status_code: 400,
                message: "script exhausted".into(),
            })
    }
}

pub fn text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "scripted-model".into(),
    }
}

pub fn tool_response(calls: Vec<MessageToolCall>) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant("").with_tool_calls(calls),
        usage: None,
        model: "scripted-model".into(),
    }
}

pub fn tool_call(name: &str, arguments: serde_json::Value) -> MessageToolCall {
    MessageToolCall {
        id: format!("call_{}", next_call_number()),
        name: name.into(),
        arguments: arguments.to_string(),
    }
}

fn next_call_number() -> usize {
    static NEXT: AtomicUsize = AtomicUsize::new(1);
    NEXT.fetch_add(1, Ordering::SeqCst)
}

pub fn extraction_json(name: &str, city: &str) -> String {
    serde_json::json!({
        "full_name": name,
        "car_make": "Toyota",
        "car_model": "Corolla",
        "car_year": 2019,
        "location": "Highway 101 near exit 429",
        "city": city,
        "assistance_type": "flat_tire",
        "safety_status": "safe",
    })
    .to_string()
}

pub fn sample_transcript() -> Vec<TranscriptEntry> {
    vec![
        TranscriptEntry::new(Speaker::Agent, "Roadside assistance, how can I help?"),
        TranscriptEntry::new(
            Speaker::User,
            "Hi, this is Jane Doe. I have a flat tire on my 2019 Toyota Corolla.",
        ),
        TranscriptEntry::new(Speaker::Agent, "Are you safe? Where are you?"),
        TranscriptEntry::new(
            Speaker::User,
            "I'm safe, on Highway 101 near exit 429 in San Francisco.",
        ),
    ]
}

enum PolicyBehaviour {
    Hang,
    Fail(ToolError),
}

/// Stand-in for the policy lookup that never answers or always fails.
struct BrokenPolicyTool {
    behaviour: PolicyBehaviour,
    attempts: Arc<AtomicUsize>,
}

#[async_trait]
impl Tool for BrokenPolicyTool {
    fn name(&self) -> &str {
        POLICY_LOOKUP_TOOL
    }

    fn description(&self) -> &str {
        "Broken policy lookup"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({ "type": "object" })
    }

    async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        match &self.behaviour {
            PolicyBehaviour::Hang => std::future::pending().await,
            PolicyBehaviour::Fail(e) => Err(e.clone()),
        }
    }
}

fn gateway_with_policy(tool: BrokenPolicyTool) -> ToolGateway {
    ToolGateway::new()
        .with(Box::new(tool))
        .with(Box::new(GarageDirectoryTool::new(Arc::new(Catalog::sample()))))
}

pub fn hanging_policy_gateway() -> ToolGateway {
    gateway_with_policy(BrokenPolicyTool {
        behaviour: PolicyBehaviour::Hang,
        attempts: Arc::default(),
    })
}

pub fn failing_policy_gateway(error: ToolError) -> ToolGateway {
    counting_failing_policy_gateway(error).0
}

pub fn counting_failing_policy_gateway(error: ToolError) -> (ToolGateway, Arc<AtomicUsize>) {
    let attempts = Arc::new(AtomicUsize::new(0));
    let gateway = gateway_with_policy(BrokenPolicyTool {
        behaviour: PolicyBehaviour::Fail(error),
        attempts: Arc::clone(&attempts),
    });
    (gateway, attempts)
}

/// Runner plus the stores it writes to.
pub struct Harness {
    pub provider: Arc<ScriptedProvider>,
    pub conversations: Arc<ConversationRegistry>,
    pub claims: Arc<ClaimStore>,
    pub broadcaster: LogBroadcaster,
    pub runner: AgentRunner,
}

impl Harness {
    pub fn new(provider: ScriptedProvider) -> Self {
        Self::build(provider, sample_gateway(), RunnerSettings::default())
    }

    pub fn with_settings(provider: ScriptedProvider, settings: RunnerSettings) -> Self {
        Self::build(provider, sample_gateway(), settings)
    }

    pub fn with_tools(provider: ScriptedProvider, tools: ToolGateway) -> Self {
        Self::build(provider, tools, RunnerSettings::default())
    }

    fn build(provider: ScriptedProvider, tools: ToolGateway, settings: RunnerSettings) -> Self {
        let provider = Arc::new(provider);
        let conversations = Arc::new(ConversationRegistry::new(DuplicatePolicy::Ignore));
        let claims = Arc::new(ClaimStore::new());
        let broadcaster = LogBroadcaster::new(64);
        let runner = AgentRunner::new(
            provider.clone(),
            Arc::new(tools),
            conversations.clone(),
            claims.clone(),
            broadcaster.clone(),
            settings,
        );
        Self {
            provider,
            conversations,
            claims,
            broadcaster,
            runner,
        }
    }

    /// Register a conversation and a pending claim for it.
    pub fn start(&self, conversation_id: &str, transcript: Vec<TranscriptEntry>) -> String {
        self.conversations
            .store(ConversationRecord::new(conversation_id, transcript));
        let claim = Claim::new(conversation_id);
        let id = claim.id.clone();
        self.claims.insert(claim);
        id
    }

    pub async fn run(&self, claim_id: &str) {
        let handle = self.claims.begin_run(claim_id).unwrap();
        self.runner.run(handle).await;
    }
}

pub fn sample_gateway() -> ToolGateway {
    roadclaim_tools::default_gateway(Arc::new(Catalog::sample()))
}
