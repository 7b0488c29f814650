//! The claim agent runner.
//!
//! One invocation drives one claim through
//! `Extracting → CoverageCheck → [GarageLookup] → ActionRecommendation →
//! MessageComposition → Completed`, or to `Failed` from any of them.
//!
//! Each model stage is a bounded tool-calling loop: it ends with a final
//! answer, at the step limit, or on a fatal tool error. Every transition is
//! written to the claim store before its log event is published.

use crate::dispatch::{DefaultDispatchRule, DispatchRule};
use crate::guard::CallGuard;
use crate::{parse, prompts};
use roadclaim_config::AppConfig;
use roadclaim_core::tool::{GARAGE_DIRECTORY_TOOL, POLICY_LOOKUP_TOOL};
use roadclaim_core::{
    ActionRecommendation, Claim, ClaimFailure, ClaimStatus, ConversationRecord,
    CoverageDecision, Error, ExtractedFields, LogEvent, LogLevel, Message, PolicyholderMessage,
    Provider, ProviderError, ProviderRequest, ResponseFormat, ToolDefinition, ToolError,
    ToolGateway, ToolResult,
};
use roadclaim_store::{ClaimStore, ConversationRegistry, EndReason, LogBroadcaster, RunHandle};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Model and loop settings for a runner.
#[derive(Debug, Clone)]
pub struct RunnerSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    /// Tool-loop iterations per model stage
    pub max_steps: u32,
    pub guard: CallGuard,
}

impl RunnerSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            model: config.provider.model.clone(),
            temperature: config.provider.temperature,
            max_tokens: config.provider.max_tokens,
            max_steps: config.agent.max_steps,
            guard: CallGuard::from_config(&config.agent),
        }
    }
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

pub struct AgentRunner {
    provider: Arc<dyn Provider>,
    tools: Arc<ToolGateway>,
    conversations: Arc<ConversationRegistry>,
    claims: Arc<ClaimStore>,
    broadcaster: LogBroadcaster,
    dispatch: Arc<dyn DispatchRule>,
    settings: RunnerSettings,
}

impl AgentRunner {
    pub fn new(
        provider: Arc<dyn Provider>,
        tools: Arc<ToolGateway>,
        conversations: Arc<ConversationRegistry>,
        claims: Arc<ClaimStore>,
        broadcaster: LogBroadcaster,
        settings: RunnerSettings,
    ) -> Self {
        Self {
            provider,
            tools,
            conversations,
            claims,
            broadcaster,
            dispatch: Arc::new(DefaultDispatchRule),
            settings,
        }
    }

    /// Replace the garage-lookup decision rule.
    pub fn with_dispatch_rule(mut self, rule: impl DispatchRule + 'static) -> Self {
        self.dispatch = Arc::new(rule);
        self
    }

    /// Run the pipeline for the claim owning `handle` to a terminal status.
    ///
    /// Never returns an error: failures are recorded on the claim. The run
    /// token is released before the stream's terminal marker is sent.
    ///
    /// If the run panics or is cancelled, the claim is still failed and its
    /// stream still ends.
    pub async fn run(&self, handle: RunHandle) {
        let claim_id = handle.claim_id().to_string();
        let settlement = Settlement {
            runner: self,
            handle: Some(handle),
        };
        info!(claim_id = %claim_id, "Claim run started");

        let reason = match self.drive(&claim_id).await {
            Ok(()) => {
                info!(claim_id = %claim_id, "Claim run completed");
                EndReason::Completed
            }
            Err(e) => {
                self.fail(&claim_id, e);
                EndReason::Failed
            }
        };

        settlement.settle(reason);
    }

    async fn drive(&self, claim_id: &str) -> Result<(), Error> {
        let claim = self.transition(claim_id, ClaimStatus::Extracting)?;
        self.emit(LogEvent::info(
            claim_id,
            "Processing started: extracting claim details from the transcript",
        ));

        let conversation = self
            .conversations
            .get(&claim.conversation_id)
            .ok()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| Error::TranscriptNotFound(claim.conversation_id.clone()))?;

        let fields = self.extract(claim_id, &conversation).await?;
        self.store(claim_id, |c| c.extracted_fields = Some(fields.clone()))?;
        self.emit(LogEvent::success(claim_id, describe_fields(&fields)));

        self.transition(claim_id, ClaimStatus::CoverageCheck)?;
        self.emit(LogEvent::info(claim_id, "Checking policy coverage"));
        let coverage = self.check_coverage(claim_id, &fields).await?;
        self.store(claim_id, |c| c.coverage_decision = Some(coverage.clone()))?;
        self.emit(LogEvent::new(
            claim_id,
            if coverage.covered { LogLevel::Success } else { LogLevel::Warning },
            format!(
                "Coverage decision: {} (confidence {:.2})",
                if coverage.covered { "covered" } else { "not covered" },
                coverage.confidence
            ),
        ));

        let garages = if self.dispatch.needs_garage_lookup(&fields, &coverage) {
            self.transition(claim_id, ClaimStatus::GarageLookup)?;
            let city = fields.city().unwrap_or_default();
            self.emit(LogEvent::info(claim_id, format!("Looking up garages in {city}")));
            Some(self.lookup_garages(claim_id, city).await?)
        } else {
            self.emit(LogEvent::info(claim_id, "Garage lookup not needed for this claim"));
            None
        };

        self.transition(claim_id, ClaimStatus::ActionRecommendation)?;
        self.emit(LogEvent::info(claim_id, "Recommending next action"));
        let action = self
            .recommend_action(claim_id, &fields, &coverage, garages.as_deref())
            .await?;
        self.store(claim_id, |c| c.action_recommendation = Some(action.clone()))?;
        self.emit(LogEvent::success(claim_id, describe_action(&action)));

        self.transition(claim_id, ClaimStatus::MessageComposition)?;
        self.emit(LogEvent::info(claim_id, "Composing message to the policyholder"));
        let message = self
            .compose_message(claim_id, &fields, &coverage, &action)
            .await?;
        self.store(claim_id, |c| c.policyholder_message = Some(message.clone()))?;

        self.transition(claim_id, ClaimStatus::Completed)?;
        self.emit(LogEvent::success(claim_id, "Claim processing completed"));
        Ok(())
    }

    async fn extract(
        &self,
        claim_id: &str,
        conversation: &ConversationRecord,
    ) -> Result<ExtractedFields, Error> {
        let messages = vec![
            Message::system(prompts::EXTRACTION),
            Message::user(format!("Call transcript:\n\n{}", conversation.render())),
        ];
        let answer = self.model_stage(claim_id, "extraction", messages, Vec::new()).await?;
        parse::extraction(&answer)
    }

    /// A missing policy or an unreachable lookup degrades to an unverified
    /// decision. Only a fatal tool error fails the run.
    async fn check_coverage(
        &self,
        claim_id: &str,
        fields: &ExtractedFields,
    ) -> Result<CoverageDecision, Error> {
        let Some(name) = fields.full_name.as_deref() else {
            self.emit(LogEvent::warning(
                claim_id,
                "Policyholder name not captured; coverage cannot be verified",
            ));
            return Ok(CoverageDecision::unverified(
                "The policyholder's name was not captured on the call, so no policy could be checked.",
            ));
        };

        let policy = match self
            .invoke_tool(POLICY_LOOKUP_TOOL, serde_json::json!({ "policy_holder_name": name }))
            .await
        {
            Ok(result) => result,
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => {
                self.emit(LogEvent::warning(claim_id, format!("Policy lookup failed: {e}")));
                return Ok(CoverageDecision::unverified(format!(
                    "Policy lookup failed ({e}); coverage could not be verified."
                )));
            }
        };
        self.emit(LogEvent::info(claim_id, format!("Found policy for {name}")));

        let messages = vec![
            Message::system(prompts::COVERAGE),
            Message::user(format!(
                "Policy:\n{}\n\n{}",
                policy.output,
                prompts::claim_summary(fields)
            )),
        ];
        let answer = self.model_stage(claim_id, "coverage", messages, Vec::new()).await?;
        parse::coverage(&answer)
    }

    async fn lookup_garages(
        &self,
        claim_id: &str,
        city: &str,
    ) -> Result<Vec<serde_json::Value>, Error> {
        match self
            .invoke_tool(GARAGE_DIRECTORY_TOOL, serde_json::json!({ "city": city }))
            .await
        {
            Ok(result) => {
                let garages = result
                    .data
                    .as_ref()
                    .and_then(|d| d["garages"].as_array())
                    .cloned()
                    .unwrap_or_default();
                let level = if garages.is_empty() { LogLevel::Warning } else { LogLevel::Info };
                self.emit(LogEvent::new(
                    claim_id,
                    level,
                    format!("Found {} garage(s) in {city}", garages.len()),
                ));
                Ok(garages)
            }
            Err(e) if e.is_fatal() => Err(e.into()),
            Err(e) => {
                self.emit(LogEvent::warning(claim_id, format!("Garage lookup failed: {e}")));
                Ok(Vec::new())
            }
        }
    }

    async fn recommend_action(
        &self,
        claim_id: &str,
        fields: &ExtractedFields,
        coverage: &CoverageDecision,
        garages: Option<&[serde_json::Value]>,
    ) -> Result<ActionRecommendation, Error> {
        let garage_context = match garages {
            Some(list) if !list.is_empty() => format!(
                "Partner garages:\n{}",
                serde_json::to_string_pretty(list)?
            ),
            Some(_) => "Partner garages: none found in the caller's city.".to_string(),
            None => "Partner garages: lookup not performed.".to_string(),
        };

        let messages = vec![
            Message::system(prompts::ACTION),
            Message::user(format!(
                "{}\n\n{}\n\n{}",
                prompts::claim_summary(fields),
                prompts::coverage_summary(coverage),
                garage_context
            )),
        ];
        let answer = self
            .model_stage(claim_id, "action", messages, self.tools.definitions())
            .await?;
        parse::action(&answer)
    }

    async fn compose_message(
        &self,
        claim_id: &str,
        fields: &ExtractedFields,
        coverage: &CoverageDecision,
        action: &ActionRecommendation,
    ) -> Result<PolicyholderMessage, Error> {
        let messages = vec![
            Message::system(prompts::MESSAGE),
            Message::user(format!(
                "{}\n\n{}\n\n{}",
                prompts::claim_summary(fields),
                prompts::coverage_summary(coverage),
                describe_action(action)
            )),
        ];
        let answer = self.model_stage(claim_id, "message", messages, Vec::new()).await?;
        parse::message(&answer)
    }

    /// Bounded tool-calling loop for one stage. Returns the final answer text.
    async fn model_stage(
        &self,
        claim_id: &str,
        stage: &str,
        mut messages: Vec<Message>,
        tools: Vec<ToolDefinition>,
    ) -> Result<String, Error> {
        for step in 1..=self.settings.max_steps {
            debug!(claim_id, stage, step, "Model step");

            let request = ProviderRequest {
                model: self.settings.model.clone(),
                messages: messages.clone(),
                temperature: self.settings.temperature,
                max_tokens: self.settings.max_tokens,
                tools: tools.clone(),
                response_format: ResponseFormat::JsonObject,
            };

            let response = self
                .settings
                .guard
                .run(
                    stage,
                    || self.provider.complete(request.clone()),
                    ProviderError::is_transient,
                    |secs| ProviderError::Timeout(format!("model call exceeded {secs}s")),
                )
                .await?;

            if !response.message.requests_tools() {
                return Ok(response.message.content);
            }

            let calls = response.message.tool_calls.clone();
            messages.push(response.message);

            for call in &calls {
                self.emit(LogEvent::info(claim_id, format!("Calling tool {}", call.name)));

                let arguments = match serde_json::from_str(&call.arguments) {
                    Ok(args) => args,
                    Err(e) => {
                        warn!(claim_id, tool = %call.name, error = %e, "Unparseable tool arguments");
                        messages.push(Message::tool_result(
                            &call.id,
                            format!("Error: arguments are not valid JSON: {e}"),
                        ));
                        continue;
                    }
                };

                match self.invoke_tool(&call.name, arguments).await {
                    Ok(result) => messages.push(Message::tool_result(&call.id, result.output)),
                    Err(e) if e.is_fatal() => return Err(e.into()),
                    Err(e) => {
                        self.emit(LogEvent::warning(
                            claim_id,
                            format!("Tool {} failed: {e}", call.name),
                        ));
                        // Reported back so the model can recover.
                        messages.push(Message::tool_result(&call.id, format!("Error: {e}")));
                    }
                }
            }
        }

        Err(Error::StepLimitExceeded {
            stage: stage.to_string(),
            max_steps: self.settings.max_steps,
        })
    }

    async fn invoke_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<ToolResult, ToolError> {
        self.settings
            .guard
            .run(
                name,
                || self.tools.invoke(name, arguments.clone()),
                ToolError::is_transient,
                |secs| ToolError::Timeout {
                    tool_name: name.to_string(),
                    timeout_secs: secs,
                },
            )
            .await
    }

    fn transition(&self, claim_id: &str, next: ClaimStatus) -> Result<Claim, Error> {
        self.claims
            .transition(claim_id, next, |_| {})
            .map_err(|e| Error::Internal(e.to_string()))
    }

    fn store(&self, claim_id: &str, f: impl FnOnce(&mut Claim)) -> Result<Claim, Error> {
        self.claims
            .update(claim_id, f)
            .map_err(|e| Error::Internal(e.to_string()))
    }

    fn fail(&self, claim_id: &str, cause: Error) {
        let stage = self.claims.status(claim_id).unwrap_or(ClaimStatus::Pending);
        let failure = ClaimFailure {
            kind: cause.kind(),
            stage,
            detail: cause.to_string(),
        };

        if let Err(e) = self
            .claims
            .transition(claim_id, ClaimStatus::Failed, |c| c.failure = Some(failure))
        {
            error!(claim_id, error = %e, "Could not record claim failure");
        }
        self.emit(LogEvent::error(
            claim_id,
            format!("Processing failed during {stage}: {cause}"),
        ));
    }

    /// Publish to observers and mirror to the operator log.
    fn emit(&self, event: LogEvent) {
        match event.level {
            LogLevel::Info | LogLevel::Success => {
                info!(claim_id = %event.claim_id, level = %event.level, "{}", event.message)
            }
            LogLevel::Warning => warn!(claim_id = %event.claim_id, "{}", event.message),
            LogLevel::Error => error!(claim_id = %event.claim_id, "{}", event.message),
        }
        self.broadcaster.publish(event);
    }
}

/// Releases the run token, then ends the claim's stream. Exactly once.
struct Settlement<'a> {
    runner: &'a AgentRunner,
    handle: Option<RunHandle>,
}

impl Settlement<'_> {
    fn settle(mut self, reason: EndReason) {
        self.release(reason);
    }

    fn release(&mut self, reason: EndReason) {
        if let Some(handle) = self.handle.take() {
            let claim_id = handle.claim_id().to_string();
            drop(handle);
            self.runner.broadcaster.finish(&claim_id, reason);
        }
    }
}

impl Drop for Settlement<'_> {
    fn drop(&mut self) {
        if let Some(handle) = &self.handle {
            let claim_id = handle.claim_id().to_string();
            error!(claim_id = %claim_id, "Claim run aborted before settling");
            self.runner
                .fail(&claim_id, Error::Internal("claim run aborted".into()));
        }
        self.release(EndReason::Failed);
    }
}

fn describe_fields(fields: &ExtractedFields) -> String {
    let mut parts = Vec::new();
    if let Some(name) = &fields.full_name {
        parts.push(format!("name {name}"));
    }
    if let Some(t) = fields.assistance_type {
        parts.push(format!("assistance {}", t.as_str()));
    }
    if let Some(city) = fields.city() {
        parts.push(format!("city {city}"));
    }
    if parts.is_empty() {
        "Extracted claim details (no fields identified)".to_string()
    } else {
        format!("Extracted claim details: {}", parts.join(", "))
    }
}

fn describe_action(action: &ActionRecommendation) -> String {
    let mut text = format!("Recommended action: {}", action.action_type.as_str());
    if let Some(garage) = &action.garage_name {
        text.push_str(&format!(" via {garage}"));
    }
    if let Some(eta) = &action.estimated_time {
        text.push_str(&format!(" (estimated {eta})"));
    }
    text
}
