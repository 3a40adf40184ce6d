use clap::Parser;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub logging: LoggingConfig,
    pub pipeline: PipelineConfig,
    pub relevance: RelevanceConfig,
    pub providers: ProvidersConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Local bookkeeping store: session-cache TTL metadata and per-request
/// execution summaries. Distinct from the target workspace database and
/// the vector store, which arrive per-request via WorkspaceLoader.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

/// Pipeline-wide timing and policy knobs (spec §6 "Optional" configuration keys).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    #[serde(deserialize_with = "deserialize_duration_ms")]
    pub deadline_ms: u64,
    #[serde(deserialize_with = "deserialize_duration_ms")]
    pub agent_timeout_ms: u64,
    #[serde(deserialize_with = "deserialize_duration_ms")]
    pub db_timeout_ms: u64,
    pub eval_threshold: f64,
    pub max_escalation_attempts: u32,
    /// SessionCache TTL (default 30 minutes).
    #[serde(deserialize_with = "deserialize_duration_ms")]
    pub session_cache_ttl_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RelevanceConfig {
    pub w_bm25: f64,
    pub w_struct: f64,
}

/// Required process-wide provider configuration (spec §6 "Required" keys).
/// Per-workspace model/agent configuration itself is loaded via
/// WorkspaceLoader; these are the bootstrap values needed before any
/// workspace is known (default embedding provider, default workspace DB).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub embedding_provider: String,
    pub embedding_model: String,
    #[serde(skip_serializing)]
    pub embedding_api_key: String,
    pub vdb_url: String,
    pub default_workspace_db_url: String,
}

/// Command line argument overrides.
#[derive(Parser, Debug, Clone)]
#[command(name = "sqlgen-core")]
#[command(version, about = "SQL Generation Core - natural language to validated SQL")]
pub struct CommandLineArgs {
    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// Server host (overrides config file)
    #[arg(long, value_name = "HOST")]
    pub server_host: Option<String>,

    /// Server port (overrides config file)
    #[arg(long, value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Local bookkeeping store URL (overrides config file)
    #[arg(long, value_name = "URL")]
    pub store_url: Option<String>,

    /// Logging level (overrides config file, e.g., "info,sqlgen_core=debug")
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Per-request deadline (overrides config file, e.g., "120s", "2m")
    #[arg(long, value_name = "DURATION")]
    pub deadline_ms: Option<String>,

    /// Max escalation attempts (overrides config file)
    #[arg(long, value_name = "N")]
    pub max_escalation_attempts: Option<u32>,

    /// Evaluation threshold in [0,1] (overrides config file)
    #[arg(long, value_name = "FLOAT")]
    pub eval_threshold: Option<f64>,
}

impl Config {
    /// Load configuration with command line, environment variable, and file support.
    ///
    /// Loading order (priority from highest to lowest):
    /// 1. Command line arguments
    /// 2. Environment variables (prefixed with SQLGEN_)
    /// 3. Configuration file (config.toml)
    /// 4. Default values
    pub fn load() -> Result<Self, anyhow::Error> {
        Self::load_with_source().map(|(config, _)| config)
    }

    /// Same as `load`, but also returns the config file path actually used
    /// (if any), so the caller can re-read the same file on SIGHUP.
    pub fn load_with_source() -> Result<(Self, Option<String>), anyhow::Error> {
        let cli_args = CommandLineArgs::parse();

        let config_path = cli_args.config.clone().or_else(Self::find_config_file);
        let mut config = if let Some(config_path) = &config_path {
            Self::from_toml(config_path)?
        } else {
            tracing::warn!("Configuration file not found, using defaults");
            Config::default()
        };

        config.apply_env_overrides();
        config.apply_cli_overrides(&cli_args);
        config.validate()?;

        Ok((config, config_path))
    }

    /// Reload from the same file this process originally loaded, preserving
    /// any env/CLI overrides already applied. Used on SIGHUP (see
    /// `pipeline::controller` callers in `main.rs`).
    pub fn reload(&self, source_path: &str) -> Result<Self, anyhow::Error> {
        let mut reloaded = Self::from_toml(source_path)?;
        reloaded.apply_env_overrides();
        reloaded.validate()?;
        Ok(reloaded)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("SQLGEN_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("SQLGEN_SERVER_PORT")
            && let Ok(port) = port.parse()
        {
            self.server.port = port;
        }
        if let Ok(url) = std::env::var("SQLGEN_STORE_URL") {
            self.store.url = url;
        }
        if let Ok(level) = std::env::var("SQLGEN_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(deadline) = std::env::var("DEADLINE_MS")
            && let Ok(val) = parse_duration_to_ms(&deadline)
        {
            self.pipeline.deadline_ms = val;
        }
        if let Ok(timeout) = std::env::var("AGENT_TIMEOUT_MS")
            && let Ok(val) = parse_duration_to_ms(&timeout)
        {
            self.pipeline.agent_timeout_ms = val;
        }
        if let Ok(timeout) = std::env::var("DB_TIMEOUT_MS")
            && let Ok(val) = parse_duration_to_ms(&timeout)
        {
            self.pipeline.db_timeout_ms = val;
        }
        if let Ok(threshold) = std::env::var("EVAL_THRESHOLD")
            && let Ok(val) = threshold.parse()
        {
            self.pipeline.eval_threshold = val;
        }
        if let Ok(attempts) = std::env::var("MAX_ESCALATION_ATTEMPTS")
            && let Ok(val) = attempts.parse()
        {
            self.pipeline.max_escalation_attempts = val;
        }
        if let Ok(w) = std::env::var("RELEVANCE_W_BM25")
            && let Ok(val) = w.parse()
        {
            self.relevance.w_bm25 = val;
        }
        if let Ok(w) = std::env::var("RELEVANCE_W_STRUCT")
            && let Ok(val) = w.parse()
        {
            self.relevance.w_struct = val;
        }
        if let Ok(key) = std::env::var("EMBEDDING_API_KEY") {
            self.providers.embedding_api_key = key;
        }
        if let Ok(url) = std::env::var("VDB_URL") {
            self.providers.vdb_url = url;
        }
        if let Ok(url) = std::env::var("DEFAULT_WORKSPACE_DB_URL") {
            self.providers.default_workspace_db_url = url;
        }
    }

    fn apply_cli_overrides(&mut self, args: &CommandLineArgs) {
        if let Some(host) = &args.server_host {
            self.server.host = host.clone();
        }
        if let Some(port) = args.server_port {
            self.server.port = port;
        }
        if let Some(url) = &args.store_url {
            self.store.url = url.clone();
        }
        if let Some(level) = &args.log_level {
            self.logging.level = level.clone();
        }
        if let Some(deadline) = &args.deadline_ms {
            match parse_duration_to_ms(deadline) {
                Ok(val) => self.pipeline.deadline_ms = val,
                Err(e) => tracing::warn!("invalid --deadline-ms '{}': {}", deadline, e),
            }
        }
        if let Some(attempts) = args.max_escalation_attempts {
            self.pipeline.max_escalation_attempts = attempts;
        }
        if let Some(threshold) = args.eval_threshold {
            self.pipeline.eval_threshold = threshold;
        }
    }

    fn validate(&self) -> Result<(), anyhow::Error> {
        if self.server.port == 0 {
            anyhow::bail!("server.port cannot be 0");
        }
        if self.store.url.is_empty() {
            anyhow::bail!("store.url cannot be empty");
        }
        if !(0.0..=1.0).contains(&self.pipeline.eval_threshold) {
            anyhow::bail!("pipeline.eval_threshold must be in [0, 1]");
        }
        if (self.relevance.w_bm25 + self.relevance.w_struct - 1.0).abs() > 1e-6 {
            anyhow::bail!("relevance.w_bm25 + relevance.w_struct must sum to 1.0");
        }
        Ok(())
    }

    /// Exposed so `main.rs` can remember which file to re-read on SIGHUP.
    pub fn find_config_file() -> Option<String> {
        let possible_paths = ["conf/config.toml", "config.toml", "./conf/config.toml", "./config.toml"];
        possible_paths.iter().find(|p| Path::new(p).exists()).map(|p| p.to_string())
    }

    fn from_toml(path: &str) -> Result<Self, anyhow::Error> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "0.0.0.0".to_string(), port: 8080 }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { url: "sqlite://data/sqlgen-core.db".to_string() }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info,sqlgen_core=debug".to_string(), file: Some("logs/sqlgen-core.log".to_string()) }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            deadline_ms: 120_000,
            agent_timeout_ms: 30_000,
            db_timeout_ms: 10_000,
            eval_threshold: 0.90,
            max_escalation_attempts: 2,
            session_cache_ttl_ms: 30 * 60 * 1000,
        }
    }
}

impl Default for RelevanceConfig {
    fn default() -> Self {
        Self { w_bm25: 0.6, w_struct: 0.4 }
    }
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            embedding_provider: "openai".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            embedding_api_key: String::new(),
            vdb_url: String::new(),
            default_workspace_db_url: String::new(),
        }
    }
}

fn parse_duration_to_ms(input: &str) -> Result<u64, String> {
    if let Ok(val) = input.parse::<u64>() {
        return Ok(val);
    }
    let s = input.trim().to_lowercase();
    let (num_str, unit) = s.split_at(s.chars().take_while(|c| c.is_ascii_digit()).count());
    if num_str.is_empty() || unit.is_empty() {
        return Err("missing number or unit".into());
    }
    let n: u64 = num_str.parse().map_err(|_| "invalid number".to_string())?;
    match unit {
        "ms" => Ok(n),
        "s" | "sec" | "secs" | "second" | "seconds" => Ok(n * 1000),
        "m" | "min" | "mins" | "minute" | "minutes" => Ok(n * 60 * 1000),
        _ => Err(format!("unsupported unit: {}", unit)),
    }
}

fn deserialize_duration_ms<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    struct Visitor;
    impl<'de> serde::de::Visitor<'de> for Visitor {
        type Value = u64;
        fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
            write!(f, "a number of milliseconds or a string like '30s', '2m'")
        }
        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E> {
            Ok(v)
        }
        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            if v >= 0 { Ok(v as u64) } else { Err(E::custom("negative not allowed")) }
        }
        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            parse_duration_to_ms(v).map_err(E::custom)
        }
        fn visit_string<E>(self, v: String) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            parse_duration_to_ms(&v).map_err(E::custom)
        }
    }
    deserializer.deserialize_any(Visitor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn relevance_weights_must_sum_to_one() {
        let mut config = Config::default();
        config.relevance.w_bm25 = 0.9;
        config.relevance.w_struct = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn parses_duration_suffixes() {
        assert_eq!(parse_duration_to_ms("500").unwrap(), 500);
        assert_eq!(parse_duration_to_ms("30s").unwrap(), 30_000);
        assert_eq!(parse_duration_to_ms("2m").unwrap(), 120_000);
    }
}
