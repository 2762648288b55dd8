use clap::Parser;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub detector: DetectorConfig,
    pub rca: RcaConfig,
    pub recommend: RecommendConfig,
    pub llm: LlmConfig,
    pub execution: ExecutionConfig,
    pub audit: AuditConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

/// Anomaly detection thresholds. Severity cut points must stay ordered
/// mild < significant < extreme.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub threshold_sigma: f64,
    pub min_spend: f64,
    pub min_sample_size: usize,
    pub severity_mild: f64,
    pub severity_significant: f64,
    pub severity_extreme: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RcaConfig {
    /// Records younger than this are treated as still in the learning phase.
    pub learning_phase_days: i64,
    /// How many anomalies per detection pass get a full root-cause report.
    pub top_anomalies: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RecommendConfig {
    /// ROAS below this pauses the ad outright (absolute cut, see DESIGN.md).
    pub pause_max_roas: f64,
    /// ROAS below this (but above the pause cut) halves the budget.
    pub reduce_max_roas: f64,
    pub scale_min_roas: f64,
    pub scale_max_cpa_z: f64,
    pub scale_min_spend: f64,
    pub refresh_min_days_active: i64,
    /// Cap per opportunity scan (scaling, creative refresh).
    pub top_opportunities: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub enabled: bool,
    /// OpenAI-compatible endpoint base, e.g. "https://api.openai.com/v1".
    pub api_base: String,
    pub model: String,
    /// Read from APP_LLM_API_KEY, never from the config file.
    #[serde(skip)]
    pub api_key: Option<String>,
    #[serde(deserialize_with = "deserialize_duration_secs")]
    pub timeout_secs: u64,
    /// Budget for a whole enrichment fan-out; stragglers keep template text.
    #[serde(deserialize_with = "deserialize_duration_secs")]
    pub batch_timeout_secs: u64,
    pub max_tokens: u32,
    pub temperature: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    pub dry_run: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Root directory of the append-only execution log
    /// (`<dir>/<tenant>/<date>.json`).
    pub dir: String,
}

/// Command line arguments for configuration overrides and run inputs
#[derive(Parser, Debug, Clone)]
#[command(name = "meridian")]
#[command(version, about = "Meridian - Ad Spend Anomaly Analyzer")]
pub struct CommandLineArgs {
    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// Path to a JSON array of metric records to analyze
    #[arg(long, value_name = "PATH")]
    pub input: Option<String>,

    /// Tenant identifier for audit logging
    #[arg(long, value_name = "TENANT", default_value = "default")]
    pub tenant: String,

    /// Execute the emitted recommendations after analysis
    #[arg(long)]
    pub execute: bool,

    /// Dry-run execution (overrides config file)
    #[arg(long, value_name = "BOOL")]
    pub dry_run: Option<bool>,

    /// Logging level (overrides config file, e.g. "info,adspend_analyzer=debug")
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Detection threshold in sigmas (overrides config file)
    #[arg(long, value_name = "SIGMA")]
    pub threshold_sigma: Option<f64>,

    /// Minimum spend for detection eligibility (overrides config file)
    #[arg(long, value_name = "DOLLARS")]
    pub min_spend: Option<f64>,

    /// Enable/disable LLM reasoning enrichment (overrides config file)
    #[arg(long, value_name = "BOOL")]
    pub llm_enabled: Option<bool>,

    /// Audit log directory (overrides config file)
    #[arg(long, value_name = "DIR")]
    pub audit_dir: Option<String>,
}

impl Config {
    /// Load configuration with command line, environment variable, and file support
    ///
    /// Loading order (priority from highest to lowest):
    /// 1. Command line arguments
    /// 2. Environment variables (prefixed with APP_)
    /// 3. Configuration file (config.toml)
    /// 4. Default values
    pub fn load() -> Result<(Self, CommandLineArgs), anyhow::Error> {
        let cli_args = CommandLineArgs::parse();

        // 1. Load from config file (use CLI --config if provided, otherwise find default)
        let config_path = cli_args.config.clone().or_else(Self::find_config_file);
        let mut config = if let Some(config_path) = config_path {
            Self::from_toml(&config_path)?
        } else {
            tracing::warn!("Configuration file not found, using defaults");
            Config::default()
        };

        // 2. Override with environment variables
        config.apply_env_overrides();

        // 3. Override with command line arguments (highest priority)
        config.apply_cli_overrides(&cli_args);

        // 4. Validate configuration
        config.validate()?;

        Ok((config, cli_args))
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - APP_LOG_LEVEL: Logging level (e.g., "info,adspend_analyzer=debug")
    /// - APP_THRESHOLD_SIGMA: Detection threshold in sigmas
    /// - APP_MIN_SPEND: Minimum spend filter for detection eligibility
    /// - APP_LLM_ENABLED: Enable/disable enrichment (true/false)
    /// - APP_LLM_API_BASE: OpenAI-compatible endpoint base URL
    /// - APP_LLM_API_KEY: API key for the LLM provider
    /// - APP_LLM_MODEL: Model name
    /// - APP_DRY_RUN: Execute in simulation mode (true/false)
    /// - APP_AUDIT_DIR: Audit log root directory
    fn apply_env_overrides(&mut self) {
        if let Ok(level) = std::env::var("APP_LOG_LEVEL") {
            self.logging.level = level;
            tracing::info!("Override logging.level from env: {}", self.logging.level);
        }

        if let Ok(sigma) = std::env::var("APP_THRESHOLD_SIGMA")
            && let Ok(sigma) = sigma.parse()
        {
            self.detector.threshold_sigma = sigma;
            tracing::info!(
                "Override detector.threshold_sigma from env: {}",
                self.detector.threshold_sigma
            );
        }

        if let Ok(min_spend) = std::env::var("APP_MIN_SPEND")
            && let Ok(min_spend) = min_spend.parse()
        {
            self.detector.min_spend = min_spend;
            tracing::info!("Override detector.min_spend from env: {}", self.detector.min_spend);
        }

        if let Ok(enabled) = std::env::var("APP_LLM_ENABLED")
            && let Ok(val) = enabled.parse()
        {
            self.llm.enabled = val;
            tracing::info!("Override llm.enabled from env: {}", self.llm.enabled);
        }

        if let Ok(base) = std::env::var("APP_LLM_API_BASE") {
            self.llm.api_base = base;
            tracing::info!("Override llm.api_base from env: {}", self.llm.api_base);
        }

        if let Ok(key) = std::env::var("APP_LLM_API_KEY") {
            self.llm.api_key = Some(key);
            tracing::info!("Override llm.api_key from env");
        }

        if let Ok(model) = std::env::var("APP_LLM_MODEL") {
            self.llm.model = model;
            tracing::info!("Override llm.model from env: {}", self.llm.model);
        }

        if let Ok(dry_run) = std::env::var("APP_DRY_RUN")
            && let Ok(val) = dry_run.parse()
        {
            self.execution.dry_run = val;
            tracing::info!("Override execution.dry_run from env: {}", self.execution.dry_run);
        }

        if let Ok(dir) = std::env::var("APP_AUDIT_DIR") {
            self.audit.dir = dir;
            tracing::info!("Override audit.dir from env: {}", self.audit.dir);
        }
    }

    /// Apply command line argument overrides (highest priority)
    fn apply_cli_overrides(&mut self, args: &CommandLineArgs) {
        if let Some(level) = &args.log_level {
            self.logging.level = level.clone();
            tracing::info!("Override logging.level from CLI: {}", self.logging.level);
        }

        if let Some(sigma) = args.threshold_sigma {
            self.detector.threshold_sigma = sigma;
            tracing::info!(
                "Override detector.threshold_sigma from CLI: {}",
                self.detector.threshold_sigma
            );
        }

        if let Some(min_spend) = args.min_spend {
            self.detector.min_spend = min_spend;
            tracing::info!("Override detector.min_spend from CLI: {}", self.detector.min_spend);
        }

        if let Some(enabled) = args.llm_enabled {
            self.llm.enabled = enabled;
            tracing::info!("Override llm.enabled from CLI: {}", self.llm.enabled);
        }

        if let Some(dry_run) = args.dry_run {
            self.execution.dry_run = dry_run;
            tracing::info!("Override execution.dry_run from CLI: {}", self.execution.dry_run);
        }

        if let Some(dir) = &args.audit_dir {
            self.audit.dir = dir.clone();
            tracing::info!("Override audit.dir from CLI: {}", self.audit.dir);
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.detector.threshold_sigma <= 0.0 {
            anyhow::bail!("detector.threshold_sigma must be > 0");
        }
        if self.detector.min_sample_size < 2 {
            anyhow::bail!("detector.min_sample_size must be >= 2");
        }
        if !(self.detector.severity_mild < self.detector.severity_significant
            && self.detector.severity_significant < self.detector.severity_extreme)
        {
            anyhow::bail!("severity cut points must be ordered mild < significant < extreme");
        }
        if self.recommend.pause_max_roas >= self.recommend.reduce_max_roas {
            anyhow::bail!("recommend.pause_max_roas must be below recommend.reduce_max_roas");
        }
        if self.llm.enabled {
            if self.llm.api_base.is_empty() {
                anyhow::bail!("llm.api_base cannot be empty when llm.enabled");
            }
            if self.llm.timeout_secs == 0 || self.llm.batch_timeout_secs == 0 {
                anyhow::bail!("llm timeouts must be > 0");
            }
        }
        if self.audit.dir.is_empty() {
            anyhow::bail!("audit.dir cannot be empty");
        }
        Ok(())
    }

    fn find_config_file() -> Option<String> {
        let possible_paths =
            ["conf/config.toml", "config.toml", "./conf/config.toml", "./config.toml"];

        for path in &possible_paths {
            if Path::new(path).exists() {
                return Some(path.to_string());
            }
        }
        None
    }

    fn from_toml(path: &str) -> Result<Self, anyhow::Error> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info,adspend_analyzer=debug".to_string(),
            file: Some("logs/meridian.log".to_string()),
        }
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            threshold_sigma: 2.0,
            min_spend: 100.0,
            min_sample_size: 10,
            severity_mild: 1.5,
            severity_significant: 2.0,
            severity_extreme: 3.0,
        }
    }
}

impl Default for RcaConfig {
    fn default() -> Self {
        Self { learning_phase_days: 7, top_anomalies: 3 }
    }
}

impl Default for RecommendConfig {
    fn default() -> Self {
        Self {
            pause_max_roas: 0.5,
            reduce_max_roas: 1.5,
            scale_min_roas: 3.0,
            scale_max_cpa_z: 0.5,
            scale_min_spend: 100.0,
            refresh_min_days_active: 14,
            top_opportunities: 5,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_base: "http://localhost:11434/v1".to_string(),
            model: "qwen2.5:14b".to_string(),
            api_key: None,
            timeout_secs: 30,
            batch_timeout_secs: 60,
            max_tokens: 512,
            temperature: 0.3,
        }
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self { dry_run: true }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self { dir: "logs/executions".to_string() }
    }
}

// =========================
// Helpers for parsing values
// =========================

fn parse_duration_to_secs(input: &str) -> Result<u64, String> {
    // Accept plain numbers (treated as seconds)
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
        "s" | "sec" | "secs" | "second" | "seconds" => Ok(n),
        "m" | "min" | "mins" | "minute" | "minutes" => Ok(n * 60),
        "h" | "hr" | "hour" | "hours" => Ok(n * 60 * 60),
        _ => Err(format!("unsupported unit: {}", unit)),
    }
}

// Custom serde deserializer to support numeric or human-friendly string values
fn deserialize_duration_secs<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    struct Visitor;
    impl<'de> serde::de::Visitor<'de> for Visitor {
        type Value = u64;
        fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
            write!(f, "a number of seconds or a string like '30s', '5m', '1h'")
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
            parse_duration_to_secs(v).map_err(E::custom)
        }
        fn visit_string<E>(self, v: String) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            parse_duration_to_secs(&v).map_err(E::custom)
        }
    }
    deserializer.deserialize_any(Visitor)
}
