use serde::{Deserialize, Serialize};

/// Exit code reported for every rejection that never reached a process.
pub const REJECTED_EXIT_CODE: i32 = 1;

/// A pre-registered executable with a fixed argument list.
///
/// Request arguments are never appended to `args`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowedCommand {
    pub exec: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl AllowedCommand {
    pub fn new(exec: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            exec: exec.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

/// A routed command, immutable once the routing stage has produced it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRequest {
    pub command: String,
    #[serde(default)]
    pub user_id: i64,
    #[serde(default)]
    pub chat_id: i64,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandRequest {
    pub fn new(command: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            command: command.into(),
            args: args.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_identity(mut self, user_id: i64, chat_id: i64) -> Self {
        self.user_id = user_id;
        self.chat_id = chat_id;
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }
}

/// Uniform outcome of any executor.
///
/// Either `ok` is true with exit code 0, or `ok` is false with a non-zero
/// exit code and/or a populated `error`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResponse {
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub exit_code: i32,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    #[serde(default)]
    pub error: String,
}

impl CommandResponse {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            ok: true,
            exit_code: 0,
            stdout: stdout.into(),
            ..Self::default()
        }
    }

    /// Input or policy rejection. No process was spawned.
    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            exit_code: REJECTED_EXIT_CODE,
            error: error.into(),
            ..Self::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.ok && self.exit_code == 0
    }
}

/// Result of delegated intent classification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntentDecision {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub intent: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub confidence: f64,
}

impl IntentDecision {
    pub fn chat(response: impl Into<String>) -> Self {
        Self {
            kind: "chat".to_string(),
            response: response.into(),
            ..Self::default()
        }
    }

    pub fn command(
        intent: impl Into<String>,
        args: impl IntoIterator<Item = impl Into<String>>,
        confidence: f64,
    ) -> Self {
        Self {
            kind: "command".to_string(),
            intent: intent.into(),
            args: args.into_iter().map(Into::into).collect(),
            confidence,
            ..Self::default()
        }
    }

    pub fn is_chat(&self) -> bool {
        self.kind.trim().eq_ignore_ascii_case("chat")
    }
}
