use std::env;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    /// Base of the spa backend REST API, including the `/api` prefix.
    pub api_base_url: String,
    pub api_token: Option<String>,
    /// Origin the customer's browser sees; the gateway return URL hangs off it.
    pub public_origin: String,
    pub availability_debounce: Duration,
    pub resend_cooldown: Duration,
    pub confirmation_delay: Duration,
    pub default_bank_code: String,
    /// Wizard sessions and cached appointments untouched this long are dropped.
    pub session_idle_timeout: Duration,
    pub sweep_interval: Duration,
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "petspa.db".to_string()),
            api_base_url: env::var("API_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:5000/api".to_string()),
            api_token: env::var("API_TOKEN").ok().filter(|t| !t.is_empty()),
            public_origin: env::var("PUBLIC_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            availability_debounce: Duration::from_millis(env_u64("AVAILABILITY_DEBOUNCE_MS", 800)),
            resend_cooldown: Duration::from_secs(env_u64("RESEND_COOLDOWN_SECS", 60)),
            confirmation_delay: Duration::from_secs(env_u64("CONFIRMATION_DELAY_SECS", 3)),
            default_bank_code: env::var("DEFAULT_BANK_CODE").unwrap_or_default(),
            session_idle_timeout: Duration::from_secs(env_u64("SESSION_IDLE_SECS", 7200)),
            sweep_interval: Duration::from_secs(env_u64("SWEEP_INTERVAL_SECS", 300)),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            database_url: ":memory:".to_string(),
            api_base_url: "http://localhost:5000/api".to_string(),
            api_token: None,
            public_origin: "http://localhost:3000".to_string(),
            availability_debounce: Duration::from_millis(800),
            resend_cooldown: Duration::from_secs(60),
            confirmation_delay: Duration::from_secs(3),
            default_bank_code: String::new(),
            session_idle_timeout: Duration::from_secs(7200),
            sweep_interval: Duration::from_secs(300),
        }
    }
}
