//! Simulator configuration.

/// Upper bound on distinct tokens per generated unit of work.
const MAX_TOKEN_POOL: usize = 64;

/// Simulation configuration.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Number of randomized units of work to run.
    pub runs: usize,
    /// Random seed for reproducibility.
    pub seed: Option<u64>,
    /// Distinct tokens a generated unit of work may touch.
    pub max_tokens: usize,
    /// Operations per generated unit of work.
    pub max_steps: usize,
    /// Worker tasks running units of work side by side.
    pub concurrency: usize,
    /// Log level used when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            runs: 100,
            seed: None,
            max_tokens: 5,
            max_steps: 20,
            concurrency: 4,
            log_level: "info".to_string(),
        }
    }
}

impl SimulationConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(runs) = env_parse("VAULT_SIM_RUNS") {
            config.runs = runs;
        }

        if let Some(seed) = env_parse("VAULT_SIM_SEED") {
            config.seed = Some(seed);
        }

        if let Some(max_tokens) = env_parse("VAULT_SIM_MAX_TOKENS") {
            config.max_tokens = max_tokens;
        }

        if let Some(max_steps) = env_parse("VAULT_SIM_MAX_STEPS") {
            config.max_steps = max_steps;
        }

        if let Some(concurrency) = env_parse("VAULT_SIM_CONCURRENCY") {
            config.concurrency = concurrency;
        }

        if let Ok(level) = std::env::var("LOG_LEVEL") {
            config.log_level = level;
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_tokens == 0 {
            return Err("max_tokens must be at least 1".to_string());
        }

        if self.max_tokens > MAX_TOKEN_POOL {
            return Err(format!("max_tokens cannot exceed {MAX_TOKEN_POOL}"));
        }

        if self.concurrency == 0 {
            return Err("concurrency must be at least 1".to_string());
        }

        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
