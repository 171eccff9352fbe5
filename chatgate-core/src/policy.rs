use chatgate_config::PolicyConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyDecision {
    Allowed,
    Blocked,
    NotAllowed,
}

impl PolicyDecision {
    /// Outcome label written to the audit log.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Allowed => "allowed",
            Self::Blocked => "blocked",
            Self::NotAllowed => "not_allowed",
        }
    }
}

/// Command-name allow and block sets. Names compare case-insensitively and
/// the blocklist always wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyTable {
    allowlist: Vec<String>,
    blocklist: Vec<String>,
}

impl PolicyTable {
    pub fn new(
        allowlist: impl IntoIterator<Item = impl Into<String>>,
        blocklist: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            allowlist: allowlist.into_iter().map(Into::into).collect(),
            blocklist: blocklist.into_iter().map(Into::into).collect(),
        }
    }

    pub fn from_config(config: &PolicyConfig) -> Self {
        Self::new(
            config.command_allowlist.iter().cloned(),
            config.command_blocklist.iter().cloned(),
        )
    }

    pub fn allowlist(&self) -> &[String] {
        &self.allowlist
    }

    pub fn is_blocked(&self, command: &str) -> bool {
        contains_ignore_case(&self.blocklist, command)
    }

    pub fn is_allowed(&self, command: &str) -> bool {
        contains_ignore_case(&self.allowlist, command)
    }

    pub fn check(&self, command: &str) -> PolicyDecision {
        if self.is_blocked(command) {
            PolicyDecision::Blocked
        } else if self.is_allowed(command) {
            PolicyDecision::Allowed
        } else {
            PolicyDecision::NotAllowed
        }
    }

    /// Reply text for the `help` command.
    pub fn help_text(&self) -> String {
        format!("Allowed commands: {}", self.allowlist.join(", "))
    }
}

fn contains_ignore_case(names: &[String], command: &str) -> bool {
    names.iter().any(|name| name.eq_ignore_ascii_case(command))
}
