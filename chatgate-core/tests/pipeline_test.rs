use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chatgate_commons::{
    AuditEventKind, CommandRequest, CommandResponse, IntentDecision, MemoryAuditSink,
};
use chatgate_config::LocalExecutionConfig;
use chatgate_core::{
    Broker, BrokerSettings, Delivery, Executor, InboundMessage, IntentRouter, PolicyTable,
    RateLimiter,
};
use chatgate_exec::LocalExecutor;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;

#[derive(Default)]
struct RecordingDelivery {
    sent: Mutex<Vec<(i64, String)>>,
    fail: bool,
}

impl RecordingDelivery {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    fn texts(&self) -> Vec<String> {
        self.sent.lock().iter().map(|(_, text)| text.clone()).collect()
    }
}

#[async_trait]
impl Delivery for RecordingDelivery {
    async fn deliver(&self, chat_id: i64, text: &str) -> Result<()> {
        self.sent.lock().push((chat_id, text.to_string()));
        if self.fail {
            return Err(anyhow!("telegram status 502: bad gateway"));
        }
        Ok(())
    }
}

#[derive(Default)]
struct StubExecutor {
    calls: Mutex<Vec<CommandRequest>>,
    fail: bool,
}

impl StubExecutor {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl Executor for StubExecutor {
    async fn execute(&self, request: &CommandRequest) -> Result<CommandResponse> {
        self.calls.lock().push(request.clone());
        if self.fail {
            return Err(anyhow!("agent status 500"));
        }
        Ok(CommandResponse::success(format!("ran {}\n", request.command)))
    }
}

struct StubRouter {
    decision: Option<IntentDecision>,
    calls: AtomicUsize,
}

impl StubRouter {
    fn returning(decision: IntentDecision) -> Self {
        Self {
            decision: Some(decision),
            calls: AtomicUsize::new(0),
        }
    }

    fn failing() -> Self {
        Self {
            decision: None,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl IntentRouter for StubRouter {
    async fn classify(&self, _text: &str, _allowlist: &[String]) -> Result<IntentDecision> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.decision
            .clone()
            .ok_or_else(|| anyhow!("llm status 429: slow down"))
    }
}

fn settings() -> BrokerSettings {
    BrokerSettings {
        allowed_user_ids: vec![1],
        llm_enabled: false,
        confidence_threshold: 0.7,
        policy: PolicyTable::new(["status", "disk", "reboot"], ["reboot"]),
    }
}

struct Harness {
    broker: Broker,
    executor: Arc<StubExecutor>,
    delivery: Arc<RecordingDelivery>,
    audit: MemoryAuditSink,
}

fn harness(settings: BrokerSettings, limiter: RateLimiter) -> Harness {
    harness_with(settings, limiter, StubExecutor::default(), RecordingDelivery::default())
}

fn harness_with(
    settings: BrokerSettings,
    limiter: RateLimiter,
    executor: StubExecutor,
    delivery: RecordingDelivery,
) -> Harness {
    let executor = Arc::new(executor);
    let delivery = Arc::new(delivery);
    let audit = MemoryAuditSink::new();
    let broker = Broker::new(settings, limiter, executor.clone(), delivery.clone())
        .with_audit(Arc::new(audit.clone()));
    Harness {
        broker,
        executor,
        delivery,
        audit,
    }
}

fn message(user_id: i64, text: &str) -> Option<InboundMessage> {
    Some(InboundMessage::new(user_id, 99, text))
}

#[tokio::test]
async fn unauthorized_user_gets_one_reply_and_no_execution() {
    let h = harness(settings(), RateLimiter::per_minute(0));

    let reply = h.broker.process(message(2, "status")).await;

    assert_eq!(reply.as_deref(), Some("Unauthorized user."));
    assert_eq!(h.delivery.texts(), vec!["Unauthorized user."]);
    assert_eq!(h.executor.call_count(), 0);
    assert_eq!(h.audit.kinds(), vec![AuditEventKind::AuthDenied]);
}

#[tokio::test]
async fn empty_allow_set_denies_everyone() {
    let mut settings = settings();
    settings.allowed_user_ids.clear();
    let h = harness(settings, RateLimiter::per_minute(0));

    h.broker.process(message(1, "status")).await;
    assert_eq!(h.delivery.texts(), vec!["Unauthorized user."]);
}

#[tokio::test]
async fn missing_message_is_dropped_silently() {
    let h = harness(settings(), RateLimiter::per_minute(0));

    assert_eq!(h.broker.process(None).await, None);
    assert!(h.delivery.texts().is_empty());
    assert!(h.audit.events().is_empty());
}

#[tokio::test]
async fn rate_limit_rejects_after_max() {
    let h = harness(settings(), RateLimiter::per_minute(2));

    for _ in 0..3 {
        h.broker.process(message(1, "status")).await;
    }

    assert_eq!(
        h.delivery.texts(),
        vec![
            "status:\nran status",
            "status:\nran status",
            "Rate limit exceeded. Try again soon."
        ]
    );
    assert_eq!(h.executor.call_count(), 2);
    assert_eq!(
        h.audit.kinds(),
        vec![
            AuditEventKind::Execution,
            AuditEventKind::Execution,
            AuditEventKind::RateLimited
        ]
    );
}

#[tokio::test]
async fn help_lists_allowlist_without_execution() {
    let h = harness(settings(), RateLimiter::per_minute(0));

    h.broker.process(message(1, "/HELP")).await;

    assert_eq!(h.delivery.texts(), vec!["Allowed commands: status, disk, reboot"]);
    assert_eq!(h.executor.call_count(), 0);
}

#[tokio::test]
async fn blank_text_is_an_empty_command() {
    let h = harness(settings(), RateLimiter::per_minute(0));

    h.broker.process(message(1, "   ")).await;
    assert_eq!(h.delivery.texts(), vec!["Empty command."]);
}

#[tokio::test]
async fn blocklist_wins_over_allowlist() {
    let h = harness(settings(), RateLimiter::per_minute(0));

    h.broker.process(message(1, "/reboot now")).await;

    assert_eq!(h.delivery.texts(), vec!["Command blocked."]);
    assert_eq!(h.executor.call_count(), 0);
    let events = h.audit.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, AuditEventKind::PolicyDenied);
    assert_eq!(events[0].command, "reboot");
    assert_eq!(events[0].outcome, "blocked");
}

#[tokio::test]
async fn unknown_command_is_not_allowed() {
    let h = harness(settings(), RateLimiter::per_minute(0));

    h.broker.process(message(1, "rm -rf /")).await;

    assert_eq!(h.delivery.texts(), vec!["Command not allowed."]);
    assert_eq!(h.audit.events()[0].outcome, "not_allowed");
}

#[tokio::test]
async fn direct_command_carries_identity_text_and_args() {
    let h = harness(settings(), RateLimiter::per_minute(0));

    h.broker.process(message(1, "/Disk  /var  -h")).await;

    let calls = h.executor.calls.lock().clone();
    assert_eq!(
        calls,
        vec![CommandRequest {
            command: "disk".into(),
            user_id: 1,
            chat_id: 99,
            text: "/Disk  /var  -h".into(),
            args: vec!["/var".into(), "-h".into()],
        }]
    );
    assert_eq!(h.delivery.texts(), vec!["disk:\nran disk"]);
}

#[tokio::test]
async fn executor_failure_is_reported_as_agent_error() {
    let h = harness_with(
        settings(),
        RateLimiter::per_minute(0),
        StubExecutor::failing(),
        RecordingDelivery::default(),
    );

    h.broker.process(message(1, "status")).await;

    assert_eq!(h.delivery.texts(), vec!["Agent error: agent status 500"]);
    let events = h.audit.events();
    assert_eq!(events[0].kind, AuditEventKind::Execution);
    assert_eq!(events[0].outcome, "error");
}

#[tokio::test]
async fn delivery_failure_does_not_abort_processing() {
    let h = harness_with(
        settings(),
        RateLimiter::per_minute(0),
        StubExecutor::default(),
        RecordingDelivery::failing(),
    );

    let reply = h.broker.process(message(1, "status")).await;

    assert_eq!(reply.as_deref(), Some("status:\nran status"));
    assert_eq!(h.executor.call_count(), 1);
    assert_eq!(h.delivery.texts().len(), 1);
}

fn llm_settings() -> BrokerSettings {
    BrokerSettings {
        llm_enabled: true,
        ..settings()
    }
}

fn llm_harness(router: Arc<StubRouter>) -> Harness {
    let mut h = harness(llm_settings(), RateLimiter::per_minute(0));
    h.broker = h.broker.with_router(router);
    h
}

#[tokio::test]
async fn llm_chat_reply_skips_execution() {
    let router = Arc::new(StubRouter::returning(IntentDecision::chat("hello")));
    let h = llm_harness(router.clone());

    h.broker.process(message(1, "hi")).await;

    assert_eq!(h.delivery.texts(), vec!["hello"]);
    assert_eq!(router.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.executor.call_count(), 0);
}

#[tokio::test]
async fn llm_blank_chat_reply_asks_again() {
    let router = Arc::new(StubRouter::returning(IntentDecision::chat("  ")));
    let h = llm_harness(router);

    h.broker.process(message(1, "hmm")).await;
    assert_eq!(
        h.delivery.texts(),
        vec!["I didn't understand that. Try a command or ask again."]
    );
}

#[tokio::test]
async fn llm_low_confidence_is_terminal() {
    let router = Arc::new(StubRouter::returning(IntentDecision::command(
        "status",
        Vec::<String>::new(),
        0.3,
    )));
    let h = llm_harness(router);

    h.broker.process(message(1, "how are things")).await;

    assert_eq!(
        h.delivery.texts(),
        vec!["I am not confident this is a command. Please rephrase or use a direct command."]
    );
    assert_eq!(h.executor.call_count(), 0);
}

#[tokio::test]
async fn llm_empty_intent_is_terminal() {
    let router = Arc::new(StubRouter::returning(IntentDecision::command(
        " ",
        Vec::<String>::new(),
        0.99,
    )));
    let h = llm_harness(router);

    h.broker.process(message(1, "do it")).await;
    assert_eq!(
        h.delivery.texts(),
        vec!["I couldn't determine a command. Try again."]
    );
}

#[tokio::test]
async fn llm_command_passes_through_policy() {
    let router = Arc::new(StubRouter::returning(IntentDecision::command(
        " Disk ",
        ["/home"],
        0.9,
    )));
    let h = llm_harness(router);

    h.broker.process(message(1, "how full is home")).await;

    let calls = h.executor.calls.lock().clone();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].command, "disk");
    assert_eq!(calls[0].args, vec!["/home".to_string()]);
    assert_eq!(calls[0].text, "how full is home");
}

#[tokio::test]
async fn llm_blocked_intent_is_never_executed() {
    let router = Arc::new(StubRouter::returning(IntentDecision::command(
        "reboot",
        Vec::<String>::new(),
        1.0,
    )));
    let h = llm_harness(router);

    h.broker.process(message(1, "restart the box")).await;

    assert_eq!(h.delivery.texts(), vec!["Command blocked."]);
    assert_eq!(h.executor.call_count(), 0);
}

#[tokio::test]
async fn llm_help_intent_lists_allowlist() {
    let router = Arc::new(StubRouter::returning(IntentDecision::command(
        "HELP",
        Vec::<String>::new(),
        0.8,
    )));
    let h = llm_harness(router);

    h.broker.process(message(1, "what can you do")).await;
    assert_eq!(h.delivery.texts(), vec!["Allowed commands: status, disk, reboot"]);
}

#[tokio::test]
async fn bare_help_bypasses_the_router() {
    let router = Arc::new(StubRouter::returning(IntentDecision::chat("unused")));
    let h = llm_harness(router.clone());

    h.broker.process(message(1, "/help")).await;

    assert_eq!(h.delivery.texts(), vec!["Allowed commands: status, disk, reboot"]);
    assert_eq!(router.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn router_error_is_reported_and_audited() {
    let h = llm_harness(Arc::new(StubRouter::failing()));

    h.broker.process(message(1, "status please")).await;

    assert_eq!(h.delivery.texts(), vec!["LLM error: llm status 429: slow down"]);
    let events = h.audit.events();
    assert_eq!(events[0].kind, AuditEventKind::RoutingError);
    assert_eq!(events[0].message, "llm status 429: slow down");
}

#[tokio::test]
async fn llm_enabled_without_router_is_an_error() {
    let h = harness(llm_settings(), RateLimiter::per_minute(0));

    h.broker.process(message(1, "status")).await;
    assert_eq!(h.delivery.texts(), vec!["LLM error: client not configured"]);
}

#[tokio::test]
async fn local_mode_counts_files_end_to_end() {
    let dir = tempfile::TempDir::new().unwrap();
    let config = LocalExecutionConfig {
        base_dir: dir.path().display().to_string(),
        dynamic_allowlist: vec!["mkdir".into(), "touch".into(), "count".into(), "ping".into()],
        ..LocalExecutionConfig::default()
    };
    let executor = Arc::new(LocalExecutor::from_config(&config).unwrap());
    let delivery = Arc::new(RecordingDelivery::default());
    let settings = BrokerSettings {
        policy: PolicyTable::new(config.dynamic_allowlist.clone(), Vec::<String>::new()),
        ..settings()
    };
    let broker = Broker::new(settings, RateLimiter::per_minute(0), executor, delivery.clone());

    for text in [
        "mkdir Movies",
        "touch Movies/a.mp4",
        "touch Movies/b.mp4",
        "count Movies",
        "ping bad;host",
    ] {
        broker.process(message(1, text)).await;
    }

    let texts = delivery.texts();
    assert_eq!(texts[3], "count:\n2");
    assert_eq!(texts[4], "ping failed (exit 1): ping host not allowed");
}
