//! The chatgate command-mediation engine.
//!
//! [`Broker`] runs each inbound chat message through a fixed sequence of
//! stages (extract, authorize, rate limit, route, policy, execute) and
//! delivers exactly one reply whenever a stage terminates the run. The
//! collaborators it talks to sit behind traits: [`Executor`] for running
//! commands, [`IntentRouter`] for natural-language classification,
//! [`Delivery`] for outbound chat text and
//! [`chatgate_commons::AuditSink`] for audit events.

pub mod agent_server;
pub mod audit;
pub mod delivery;
pub mod error;
mod http;
pub mod pipeline;
pub mod policy;
pub mod rate_limiter;
pub mod remote;
pub mod router;
pub mod telegram;

pub use agent_server::{AgentState, agent_router, status_for};
pub use audit::{FileAuditSink, audit_sink_from_config};
pub use chatgate_exec::Executor;
pub use delivery::Delivery;
pub use error::TransportError;
pub use pipeline::{Broker, BrokerSettings, InboundMessage, normalize_command, render_response};
pub use policy::{PolicyDecision, PolicyTable};
pub use rate_limiter::RateLimiter;
pub use remote::RemoteExecutor;
pub use router::{IntentRouter, OpenAiRouter};
pub use telegram::{Poller, TelegramClient, webhook_router};
