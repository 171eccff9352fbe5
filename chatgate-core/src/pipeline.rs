use std::sync::Arc;

use chatgate_commons::{
    AuditEvent, AuditEventKind, AuditSink, CommandRequest, CommandResponse, NoopAuditSink,
};
use chatgate_config::BrokerConfig;
use chatgate_exec::Executor;
use tracing::{debug, info, warn};

use crate::delivery::Delivery;
use crate::policy::{PolicyDecision, PolicyTable};
use crate::rate_limiter::RateLimiter;
use crate::router::IntentRouter;

pub const REPLY_UNAUTHORIZED: &str = "Unauthorized user.";
pub const REPLY_RATE_LIMITED: &str = "Rate limit exceeded. Try again soon.";
pub const REPLY_EMPTY_COMMAND: &str = "Empty command.";
pub const REPLY_BLOCKED: &str = "Command blocked.";
pub const REPLY_NOT_ALLOWED: &str = "Command not allowed.";
pub const REPLY_ROUTER_MISSING: &str = "LLM error: client not configured";
pub const REPLY_EMPTY_CHAT: &str = "I didn't understand that. Try a command or ask again.";
pub const REPLY_EMPTY_INTENT: &str = "I couldn't determine a command. Try again.";
pub const REPLY_LOW_CONFIDENCE: &str =
    "I am not confident this is a command. Please rephrase or use a direct command.";

const HELP_COMMAND: &str = "help";

/// One inbound chat message as handed over by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub user_id: i64,
    pub chat_id: i64,
    pub text: String,
}

impl InboundMessage {
    pub fn new(user_id: i64, chat_id: i64, text: impl Into<String>) -> Self {
        Self {
            user_id,
            chat_id,
            text: text.into(),
        }
    }
}

/// The broker-level knobs the pipeline consults on every message.
#[derive(Debug, Clone, Default)]
pub struct BrokerSettings {
    pub allowed_user_ids: Vec<i64>,
    pub llm_enabled: bool,
    pub confidence_threshold: f64,
    pub policy: PolicyTable,
}

impl BrokerSettings {
    pub fn from_config(config: &BrokerConfig) -> Self {
        Self {
            allowed_user_ids: config.telegram.allowed_user_ids.clone(),
            llm_enabled: config.llm.enabled,
            confidence_threshold: config.llm.confidence_threshold,
            policy: PolicyTable::from_config(&config.policy),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Extract,
    Authorize,
    RateLimit,
    Route,
    Policy,
    Execute,
}

const STAGES: [Stage; 6] = [
    Stage::Extract,
    Stage::Authorize,
    Stage::RateLimit,
    Stage::Route,
    Stage::Policy,
    Stage::Execute,
];

#[derive(Debug, PartialEq, Eq)]
enum StageOutcome {
    Continue,
    /// Terminal; the text is delivered to the chat.
    Reply(String),
    /// Terminal without a reply. Only used when there is nobody to reply to.
    Discard,
}

impl StageOutcome {
    fn reply(text: impl Into<String>) -> Self {
        Self::Reply(text.into())
    }
}

/// Per-message state threaded through the stages.
#[derive(Debug, Default)]
struct RequestContext {
    inbound: Option<InboundMessage>,
    user_id: i64,
    chat_id: i64,
    text: String,
    command: String,
    args: Vec<String>,
}

/// Runs inbound messages through extract, authorize, rate limit, route,
/// policy and execute, stopping at the first stage that produces a reply.
pub struct Broker {
    settings: BrokerSettings,
    rate_limiter: RateLimiter,
    executor: Arc<dyn Executor>,
    delivery: Arc<dyn Delivery>,
    router: Option<Arc<dyn IntentRouter>>,
    audit: Arc<dyn AuditSink>,
}

impl Broker {
    pub fn new(
        settings: BrokerSettings,
        rate_limiter: RateLimiter,
        executor: Arc<dyn Executor>,
        delivery: Arc<dyn Delivery>,
    ) -> Self {
        Self {
            settings,
            rate_limiter,
            executor,
            delivery,
            router: None,
            audit: Arc::new(NoopAuditSink),
        }
    }

    pub fn with_router(mut self, router: Arc<dyn IntentRouter>) -> Self {
        self.router = Some(router);
        self
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn settings(&self) -> &BrokerSettings {
        &self.settings
    }

    /// Processes one message and returns the reply that was handed to the
    /// delivery collaborator, if any. Delivery failures are logged.
    pub async fn process(&self, inbound: Option<InboundMessage>) -> Option<String> {
        let mut ctx = RequestContext {
            inbound,
            ..RequestContext::default()
        };

        for stage in STAGES {
            match self.run_stage(stage, &mut ctx).await {
                StageOutcome::Continue => {}
                StageOutcome::Discard => {
                    debug!(?stage, "message discarded");
                    return None;
                }
                StageOutcome::Reply(text) => {
                    debug!(
                        ?stage,
                        user_id = ctx.user_id,
                        chat_id = ctx.chat_id,
                        "pipeline replied"
                    );
                    self.deliver(ctx.chat_id, &text).await;
                    return Some(text);
                }
            }
        }
        None
    }

    async fn run_stage(&self, stage: Stage, ctx: &mut RequestContext) -> StageOutcome {
        match stage {
            Stage::Extract => self.extract(ctx),
            Stage::Authorize => self.authorize(ctx),
            Stage::RateLimit => self.rate_limit(ctx),
            Stage::Route => self.route(ctx).await,
            Stage::Policy => self.policy(ctx),
            Stage::Execute => self.execute(ctx).await,
        }
    }

    fn extract(&self, ctx: &mut RequestContext) -> StageOutcome {
        let Some(inbound) = ctx.inbound.take() else {
            return StageOutcome::Discard;
        };
        ctx.user_id = inbound.user_id;
        ctx.chat_id = inbound.chat_id;
        ctx.text = inbound.text;
        StageOutcome::Continue
    }

    fn authorize(&self, ctx: &RequestContext) -> StageOutcome {
        if self.settings.allowed_user_ids.contains(&ctx.user_id) {
            return StageOutcome::Continue;
        }
        info!(user_id = ctx.user_id, chat_id = ctx.chat_id, "unauthorized user");
        self.audit(
            AuditEvent::new(AuditEventKind::AuthDenied, ctx.user_id, ctx.chat_id)
                .with_outcome("denied"),
        );
        StageOutcome::reply(REPLY_UNAUTHORIZED)
    }

    fn rate_limit(&self, ctx: &RequestContext) -> StageOutcome {
        if self.rate_limiter.allow(ctx.user_id) {
            return StageOutcome::Continue;
        }
        info!(user_id = ctx.user_id, chat_id = ctx.chat_id, "rate limited");
        self.audit(
            AuditEvent::new(AuditEventKind::RateLimited, ctx.user_id, ctx.chat_id)
                .with_outcome("denied"),
        );
        StageOutcome::reply(REPLY_RATE_LIMITED)
    }

    async fn route(&self, ctx: &mut RequestContext) -> StageOutcome {
        let (command, args) = normalize_command(&ctx.text);
        // With an intent router in play only a bare `help` bypasses it.
        if command == HELP_COMMAND && (args.is_empty() || !self.settings.llm_enabled) {
            return StageOutcome::reply(self.settings.policy.help_text());
        }

        if !self.settings.llm_enabled {
            if command.is_empty() {
                return StageOutcome::reply(REPLY_EMPTY_COMMAND);
            }
            debug!(command = %command, chat_id = ctx.chat_id, "routed directly");
            ctx.command = command;
            ctx.args = args;
            return StageOutcome::Continue;
        }

        let Some(router) = &self.router else {
            return StageOutcome::reply(REPLY_ROUTER_MISSING);
        };
        let decision = match router
            .classify(&ctx.text, self.settings.policy.allowlist())
            .await
        {
            Ok(decision) => decision,
            Err(error) => {
                warn!(
                    user_id = ctx.user_id,
                    chat_id = ctx.chat_id,
                    error = %error,
                    "intent routing failed"
                );
                self.audit(
                    AuditEvent::new(AuditEventKind::RoutingError, ctx.user_id, ctx.chat_id)
                        .with_outcome("error")
                        .with_message(error.to_string()),
                );
                return StageOutcome::reply(format!("LLM error: {error}"));
            }
        };

        if decision.is_chat() {
            let response = decision.response.trim();
            if response.is_empty() {
                return StageOutcome::reply(REPLY_EMPTY_CHAT);
            }
            return StageOutcome::reply(response);
        }

        let intent = decision.intent.trim().to_lowercase();
        if intent.is_empty() {
            return StageOutcome::reply(REPLY_EMPTY_INTENT);
        }
        if decision.confidence < self.settings.confidence_threshold {
            debug!(
                intent = %intent,
                confidence = decision.confidence,
                threshold = self.settings.confidence_threshold,
                "intent below confidence threshold"
            );
            return StageOutcome::reply(REPLY_LOW_CONFIDENCE);
        }
        if intent == HELP_COMMAND {
            return StageOutcome::reply(self.settings.policy.help_text());
        }

        debug!(command = %intent, chat_id = ctx.chat_id, "routed by intent");
        ctx.command = intent;
        ctx.args = decision.args;
        StageOutcome::Continue
    }

    fn policy(&self, ctx: &RequestContext) -> StageOutcome {
        let decision = self.settings.policy.check(&ctx.command);
        let reply = match decision {
            PolicyDecision::Allowed => return StageOutcome::Continue,
            PolicyDecision::Blocked => REPLY_BLOCKED,
            PolicyDecision::NotAllowed => REPLY_NOT_ALLOWED,
        };
        info!(
            command = %ctx.command,
            chat_id = ctx.chat_id,
            outcome = decision.as_str(),
            "policy denied command"
        );
        self.audit(
            AuditEvent::new(AuditEventKind::PolicyDenied, ctx.user_id, ctx.chat_id)
                .with_command(ctx.command.as_str())
                .with_outcome(decision.as_str()),
        );
        StageOutcome::reply(reply)
    }

    async fn execute(&self, ctx: &mut RequestContext) -> StageOutcome {
        let request = CommandRequest::new(ctx.command.as_str(), std::mem::take(&mut ctx.args))
            .with_identity(ctx.user_id, ctx.chat_id)
            .with_text(ctx.text.as_str());

        let event = AuditEvent::new(AuditEventKind::Execution, ctx.user_id, ctx.chat_id)
            .with_command(ctx.command.as_str());
        match self.executor.execute(&request).await {
            Ok(response) => {
                let outcome = if response.ok { "ok" } else { "failed" };
                info!(
                    command = %ctx.command,
                    chat_id = ctx.chat_id,
                    exit_code = response.exit_code,
                    outcome,
                    "command executed"
                );
                self.audit(
                    event
                        .with_outcome(outcome)
                        .with_message(response.error.as_str()),
                );
                StageOutcome::reply(render_response(&ctx.command, &response))
            }
            Err(error) => {
                warn!(
                    command = %ctx.command,
                    chat_id = ctx.chat_id,
                    error = %error,
                    "executor failed"
                );
                self.audit(
                    event
                        .with_outcome("error")
                        .with_message(error.to_string()),
                );
                StageOutcome::reply(format!("Agent error: {error}"))
            }
        }
    }

    async fn deliver(&self, chat_id: i64, text: &str) {
        if let Err(error) = self.delivery.deliver(chat_id, text).await {
            warn!(chat_id, error = %error, "reply delivery failed");
        }
    }

    fn audit(&self, event: AuditEvent) {
        if let Err(error) = self.audit.record(&event) {
            warn!(kind = %event.kind, error = %error, "audit write failed");
        }
    }
}

/// Splits chat text into a lower-cased command name (leading `/` removed)
/// and whitespace-separated arguments. Blank text yields an empty name.
pub fn normalize_command(text: &str) -> (String, Vec<String>) {
    let mut parts = text.split_whitespace();
    let Some(first) = parts.next() else {
        return (String::new(), Vec::new());
    };
    let command = first.strip_prefix('/').unwrap_or(first).to_lowercase();
    (command, parts.map(str::to_string).collect())
}

/// Chat rendering of a command result.
pub fn render_response(command: &str, response: &CommandResponse) -> String {
    if response.ok {
        let stdout = response.stdout.trim();
        let stdout = if stdout.is_empty() { "(no output)" } else { stdout };
        return format!("{command}:\n{stdout}");
    }

    let error = if response.error.is_empty() {
        "command failed"
    } else {
        response.error.as_str()
    };
    let detail = match response.stderr.trim() {
        "" => response.stdout.trim(),
        stderr => stderr,
    };
    if detail.is_empty() {
        format!("{command} failed (exit {}): {error}", response.exit_code)
    } else {
        format!("{command} failed (exit {}): {error}\n{detail}", response.exit_code)
    }
}
