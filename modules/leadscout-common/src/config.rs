use std::env;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Postgres
    pub database_url: String,

    // External services
    pub apify_api_key: String,
    pub openai_api_key: String,
    pub verifier_api_key: String,

    // LLM models
    pub openai_model_heavy: String,
    pub openai_model_light: String,

    // Concurrency bounds
    pub max_parallel_icebreaker_workers: usize,
    pub max_parallel_professional_batches: usize,
    pub professional_batch_size: usize,

    // Website scraping
    pub website_timeout_s: u64,
    pub domain_request_delay_s: u64,
    pub website_failure_threshold: u32,

    // Liveness
    pub heartbeat_interval_s: u64,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            database_url: required_env("DATABASE_URL"),
            apify_api_key: env::var("APIFY_API_KEY").unwrap_or_default(),
            openai_api_key: env::var("OPENAI_API_KEY").unwrap_or_default(),
            verifier_api_key: env::var("VERIFIER_API_KEY").unwrap_or_default(),
            openai_model_heavy: env::var("OPENAI_MODEL_HEAVY")
                .unwrap_or_else(|_| "gpt-4o".to_string()),
            openai_model_light: env::var("OPENAI_MODEL_LIGHT")
                .unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            max_parallel_icebreaker_workers: parsed_env("MAX_PARALLEL_ICEBREAKER_WORKERS", 5),
            max_parallel_professional_batches: parsed_env("MAX_PARALLEL_PROFESSIONAL_BATCHES", 3),
            professional_batch_size: parsed_env("PROFESSIONAL_BATCH_SIZE", 15),
            website_timeout_s: parsed_env("WEBSITE_TIMEOUT_S", 30),
            domain_request_delay_s: parsed_env("DOMAIN_REQUEST_DELAY_S", 2),
            website_failure_threshold: parsed_env("WEBSITE_FAILURE_THRESHOLD", 3),
            heartbeat_interval_s: parsed_env("HEARTBEAT_INTERVAL_S", 60),
        }
    }

    /// Log the presence (never the value) of each sensitive env var.
    pub fn log_redacted(&self) {
        let vars = [
            ("DATABASE_URL", &self.database_url),
            ("APIFY_API_KEY", &self.apify_api_key),
            ("OPENAI_API_KEY", &self.openai_api_key),
            ("VERIFIER_API_KEY", &self.verifier_api_key),
        ];
        for (name, value) in vars {
            if value.is_empty() {
                tracing::info!("{name} = (empty)");
            } else {
                tracing::info!("{name} = ({} chars)", value.len());
            }
        }
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}

fn parsed_env<T: std::str::FromStr + Copy>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
