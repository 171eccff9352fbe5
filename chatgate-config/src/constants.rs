pub mod defaults {
    pub const BROKER_LISTEN_ADDR: &str = "127.0.0.1:8081";
    pub const AGENT_LISTEN_ADDR: &str = "127.0.0.1:8080";

    pub const TELEGRAM_MODE: &str = "polling";
    pub const TELEGRAM_WEBHOOK_PATH: &str = "/telegram/webhook";
    pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";
    pub const TELEGRAM_POLL_INTERVAL_SEC: i64 = 3;

    pub const RATE_LIMIT_PER_MINUTE: i64 = 20;

    pub const LLM_MODEL: &str = "gpt-5.2";
    pub const LLM_BASE_URL: &str = "https://api.openai.com/v1/responses";
    pub const LLM_TIMEOUT_SEC: i64 = 15;
    pub const LLM_CONFIDENCE_THRESHOLD: f64 = 0.7;

    pub const EXEC_TIMEOUT_SEC: i64 = 10;
    pub const EXEC_MAX_OUTPUT_KB: i64 = 8;
}

pub mod env {
    pub const TELEGRAM_BOT_TOKEN: &str = "CHATGATE_TELEGRAM_BOT_TOKEN";
    pub const LLM_API_KEY: &str = "CHATGATE_LLM_API_KEY";
    pub const FORWARD_AUTH_TOKEN: &str = "CHATGATE_FORWARD_AUTH_TOKEN";
    pub const AGENT_AUTH_TOKEN: &str = "CHATGATE_AGENT_AUTH_TOKEN";
}

pub mod paths {
    pub const BROKER_CONFIG: &str = "configs/broker.json";
    pub const AGENT_CONFIG: &str = "configs/agent.json";
}
