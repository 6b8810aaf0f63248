use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub server: ServerConfig,
    pub conversation: ConversationConfig,
    pub knowledge: KnowledgeConfig,
    pub orchestration: OrchestrationConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub model: String,
    pub router_model: Option<String>,
    pub timeout_secs: u64,
    pub route_timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ConversationConfig {
    /// Messages kept per conversation; zero keeps everything.
    pub history_depth: usize,
}

#[derive(Clone, Debug)]
pub struct KnowledgeConfig {
    pub path: PathBuf,
    pub top_k: usize,
    pub citation_limit: usize,
}

#[derive(Clone, Debug)]
pub struct OrchestrationConfig {
    pub max_iterations: usize,
    pub routing: RoutingMode,
    pub transfer_policy: TransferMode,
    pub default_agent: String,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    Gemini,
    Disabled,
}

/// How a conversation without a sticky specialist gets its first one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingMode {
    Intake,
    Keyword,
    Model,
}

/// What happens when a specialist names a transfer target it should not.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferMode {
    Permissive,
    FallbackToDefault,
    Strict,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    pub llm_api_key: Option<String>,
    pub server_port: Option<u16>,
    pub knowledge_path: Option<PathBuf>,
    pub routing: Option<RoutingMode>,
    pub transfer_policy: Option<TransferMode>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

pub const DEFAULT_AGENT: &str = "atendimento_geral";

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig {
                provider: LlmProvider::Gemini,
                api_key: None,
                base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
                model: "gemini-2.0-flash-lite".to_string(),
                router_model: None,
                timeout_secs: 30,
                route_timeout_secs: 20,
            },
            server: ServerConfig {
                bind_address: "0.0.0.0".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            conversation: ConversationConfig { history_depth: 20 },
            knowledge: KnowledgeConfig {
                path: PathBuf::from("kb/knowledge.md"),
                top_k: 3,
                citation_limit: 2,
            },
            orchestration: OrchestrationConfig {
                max_iterations: 3,
                routing: RoutingMode::Intake,
                transfer_policy: TransferMode::FallbackToDefault,
                default_agent: DEFAULT_AGENT.to_string(),
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "disabled" | "none" => Ok(Self::Disabled),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected gemini|disabled)"
            ))),
        }
    }
}

impl std::str::FromStr for RoutingMode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "intake" => Ok(Self::Intake),
            "keyword" => Ok(Self::Keyword),
            "model" => Ok(Self::Model),
            other => Err(ConfigError::Validation(format!(
                "unsupported routing mode `{other}` (expected intake|keyword|model)"
            ))),
        }
    }
}

impl std::str::FromStr for TransferMode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "permissive" => Ok(Self::Permissive),
            "fallback_to_default" => Ok(Self::FallbackToDefault),
            "strict" => Ok(Self::Strict),
            other => Err(ConfigError::Validation(format!(
                "unsupported transfer policy `{other}` (expected permissive|fallback_to_default|strict)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl LlmConfig {
    /// Whether a model client can be built from this section at all.
    pub fn is_usable(&self) -> bool {
        self.provider != LlmProvider::Disabled
            && self
                .api_key
                .as_ref()
                .map(|key| !key.expose_secret().trim().is_empty())
                .unwrap_or(false)
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from("switchboard.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(llm) = patch.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(llm_api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(llm_api_key_value));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = base_url;
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(router_model) = llm.router_model {
                self.llm.router_model = Some(router_model);
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(route_timeout_secs) = llm.route_timeout_secs {
                self.llm.route_timeout_secs = route_timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(conversation) = patch.conversation {
            if let Some(history_depth) = conversation.history_depth {
                self.conversation.history_depth = history_depth;
            }
        }

        if let Some(knowledge) = patch.knowledge {
            if let Some(path) = knowledge.path {
                self.knowledge.path = path;
            }
            if let Some(top_k) = knowledge.top_k {
                self.knowledge.top_k = top_k;
            }
            if let Some(citation_limit) = knowledge.citation_limit {
                self.knowledge.citation_limit = citation_limit;
            }
        }

        if let Some(orchestration) = patch.orchestration {
            if let Some(max_iterations) = orchestration.max_iterations {
                self.orchestration.max_iterations = max_iterations;
            }
            if let Some(routing) = orchestration.routing {
                self.orchestration.routing = routing;
            }
            if let Some(transfer_policy) = orchestration.transfer_policy {
                self.orchestration.transfer_policy = transfer_policy;
            }
            if let Some(default_agent) = orchestration.default_agent {
                self.orchestration.default_agent = default_agent;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("SWITCHBOARD_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        let api_key = read_env("SWITCHBOARD_LLM_API_KEY").or_else(|| read_env("GEMINI_API_KEY"));
        if let Some(value) = api_key {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("SWITCHBOARD_LLM_BASE_URL") {
            self.llm.base_url = value;
        }
        if let Some(value) = read_env("SWITCHBOARD_LLM_MODEL") {
            self.llm.model = value;
        }
        let router_model =
            read_env("SWITCHBOARD_LLM_ROUTER_MODEL").or_else(|| read_env("GEMINI_MODEL_ROUTER"));
        if let Some(value) = router_model {
            self.llm.router_model = Some(value);
        }
        if let Some(value) = read_env("SWITCHBOARD_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("SWITCHBOARD_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("SWITCHBOARD_LLM_ROUTE_TIMEOUT_SECS") {
            self.llm.route_timeout_secs =
                parse_u64("SWITCHBOARD_LLM_ROUTE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("SWITCHBOARD_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        let port = read_env("SWITCHBOARD_SERVER_PORT").or_else(|| read_env("PORT"));
        if let Some(value) = port {
            self.server.port = parse_u16("SWITCHBOARD_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("SWITCHBOARD_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("SWITCHBOARD_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("SWITCHBOARD_CONVERSATION_HISTORY_DEPTH") {
            self.conversation.history_depth =
                parse_usize("SWITCHBOARD_CONVERSATION_HISTORY_DEPTH", &value)?;
        }

        if let Some(value) = read_env("SWITCHBOARD_KNOWLEDGE_PATH") {
            self.knowledge.path = PathBuf::from(value);
        }
        if let Some(value) = read_env("SWITCHBOARD_KNOWLEDGE_TOP_K") {
            self.knowledge.top_k = parse_usize("SWITCHBOARD_KNOWLEDGE_TOP_K", &value)?;
        }

        if let Some(value) = read_env("SWITCHBOARD_ORCHESTRATION_MAX_ITERATIONS") {
            self.orchestration.max_iterations =
                parse_usize("SWITCHBOARD_ORCHESTRATION_MAX_ITERATIONS", &value)?;
        }
        if let Some(value) = read_env("SWITCHBOARD_ORCHESTRATION_ROUTING") {
            self.orchestration.routing = value.parse()?;
        }
        if let Some(value) = read_env("SWITCHBOARD_ORCHESTRATION_TRANSFER_POLICY") {
            self.orchestration.transfer_policy = value.parse()?;
        }

        let log_level =
            read_env("SWITCHBOARD_LOGGING_LEVEL").or_else(|| read_env("SWITCHBOARD_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("SWITCHBOARD_LOGGING_FORMAT").or_else(|| read_env("SWITCHBOARD_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(llm_provider) = overrides.llm_provider {
            self.llm.provider = llm_provider;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(llm_api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(secret_value(llm_api_key));
        }
        if let Some(server_port) = overrides.server_port {
            self.server.port = server_port;
        }
        if let Some(knowledge_path) = overrides.knowledge_path {
            self.knowledge.path = knowledge_path;
        }
        if let Some(routing) = overrides.routing {
            self.orchestration.routing = routing;
        }
        if let Some(transfer_policy) = overrides.transfer_policy {
            self.orchestration.transfer_policy = transfer_policy;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_llm(&self.llm)?;
        validate_server(&self.server)?;
        validate_knowledge(&self.knowledge)?;
        validate_orchestration(&self.orchestration)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("switchboard.toml"), PathBuf::from("config/switchboard.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }
    if llm.route_timeout_secs == 0 || llm.route_timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.route_timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if llm.provider == LlmProvider::Gemini {
        let base_url = llm.base_url.trim();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::Validation(
                "llm.base_url must start with http:// or https://".to_string(),
            ));
        }
        if llm.model.trim().is_empty() {
            return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
        }
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_knowledge(knowledge: &KnowledgeConfig) -> Result<(), ConfigError> {
    if knowledge.top_k == 0 {
        return Err(ConfigError::Validation(
            "knowledge.top_k must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn validate_orchestration(orchestration: &OrchestrationConfig) -> Result<(), ConfigError> {
    if orchestration.max_iterations == 0 || orchestration.max_iterations > 10 {
        return Err(ConfigError::Validation(
            "orchestration.max_iterations must be in range 1..=10".to_string(),
        ));
    }
    if orchestration.default_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "orchestration.default_agent must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    llm: Option<LlmPatch>,
    server: Option<ServerPatch>,
    conversation: Option<ConversationPatch>,
    knowledge: Option<KnowledgePatch>,
    orchestration: Option<OrchestrationPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    router_model: Option<String>,
    timeout_secs: Option<u64>,
    route_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ConversationPatch {
    history_depth: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct KnowledgePatch {
    path: Option<PathBuf>,
    top_k: Option<usize>,
    citation_limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct OrchestrationPatch {
    max_iterations: Option<usize>,
    routing: Option<RoutingMode>,
    transfer_policy: Option<TransferMode>,
    default_agent: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::path::PathBuf;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{
        AppConfig, ConfigError, ConfigOverrides, LlmProvider, LoadOptions, LogFormat, RoutingMode,
        TransferMode,
    };

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    const TOUCHED_VARS: &[&str] = &[
        "SWITCHBOARD_LLM_API_KEY",
        "GEMINI_API_KEY",
        "SWITCHBOARD_LOG_LEVEL",
        "SWITCHBOARD_LOG_FORMAT",
        "SWITCHBOARD_SERVER_PORT",
        "SWITCHBOARD_ORCHESTRATION_ROUTING",
        "SWITCHBOARD_ORCHESTRATION_MAX_ITERATIONS",
        "TEST_SWITCHBOARD_KEY",
    ];

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_match_documented_behaviour() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(TOUCHED_VARS);

        let config = AppConfig::load(LoadOptions {
            config_path: Some(PathBuf::from("does-not-exist.toml")),
            ..LoadOptions::default()
        })
        .map_err(|err| format!("config load failed: {err}"))?;

        ensure(config.conversation.history_depth == 20, "default depth should be 20")?;
        ensure(config.orchestration.max_iterations == 3, "default loop cap should be 3")?;
        ensure(config.orchestration.default_agent == "atendimento_geral", "default agent")?;
        ensure(config.orchestration.routing == RoutingMode::Intake, "default routing")?;
        ensure(
            config.orchestration.transfer_policy == TransferMode::FallbackToDefault,
            "default transfer policy",
        )?;
        ensure(!config.llm.is_usable(), "model should be unusable without an api key")?;
        Ok(())
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(TOUCHED_VARS);

        env::set_var("TEST_SWITCHBOARD_KEY", "key-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("switchboard.toml");
            fs::write(
                &path,
                r#"
[llm]
api_key = "${TEST_SWITCHBOARD_KEY}"
model = "gemini-test"

[orchestration]
routing = "keyword"
transfer_policy = "strict"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.llm.api_key.as_ref().map(|key| key.expose_secret() == "key-from-env")
                    == Some(true),
                "api key should be interpolated from environment",
            )?;
            ensure(config.llm.model == "gemini-test", "model should come from file")?;
            ensure(config.orchestration.routing == RoutingMode::Keyword, "routing from file")?;
            ensure(
                config.orchestration.transfer_policy == TransferMode::Strict,
                "transfer policy from file",
            )?;
            ensure(config.llm.is_usable(), "model should be usable with an api key")?;
            Ok(())
        })();

        clear_vars(TOUCHED_VARS);
        result
    }

    #[test]
    fn gemini_key_alias_is_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(TOUCHED_VARS);

        env::set_var("GEMINI_API_KEY", "alias-key");
        env::set_var("SWITCHBOARD_LOG_LEVEL", "warn");
        env::set_var("SWITCHBOARD_LOG_FORMAT", "json");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.llm.api_key.as_ref().map(|key| key.expose_secret() == "alias-key")
                    == Some(true),
                "GEMINI_API_KEY should populate llm.api_key",
            )?;
            ensure(config.logging.level == "warn", "log level alias should apply")?;
            ensure(matches!(config.logging.format, LogFormat::Json), "log format alias")?;
            Ok(())
        })();

        clear_vars(TOUCHED_VARS);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(TOUCHED_VARS);

        env::set_var("SWITCHBOARD_SERVER_PORT", "9090");
        env::set_var("SWITCHBOARD_ORCHESTRATION_ROUTING", "model");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("switchboard.toml");
            fs::write(
                &path,
                r#"
[server]
port = 7070

[orchestration]
routing = "keyword"

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    log_level: Some("debug".to_string()),
                    llm_provider: Some(LlmProvider::Disabled),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.server.port == 9090, "env port should win over file")?;
            ensure(config.orchestration.routing == RoutingMode::Model, "env routing should win")?;
            ensure(config.logging.level == "debug", "override log level should win")?;
            ensure(config.llm.provider == LlmProvider::Disabled, "override provider should win")?;
            Ok(())
        })();

        clear_vars(TOUCHED_VARS);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(TOUCHED_VARS);

        env::set_var("SWITCHBOARD_ORCHESTRATION_MAX_ITERATIONS", "0");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("max_iterations")
            );
            ensure(has_message, "validation failure should mention max_iterations")
        })();

        clear_vars(TOUCHED_VARS);
        result
    }

    #[test]
    fn api_key_is_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(TOUCHED_VARS);

        env::set_var("SWITCHBOARD_LLM_API_KEY", "super-secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(!debug.contains("super-secret-value"), "debug output should hide api key")
        })();

        clear_vars(TOUCHED_VARS);
        result
    }

    #[test]
    fn unknown_enum_values_are_rejected() {
        assert!("openai".parse::<LlmProvider>().is_err());
        assert!("roundrobin".parse::<RoutingMode>().is_err());
        assert_eq!("STRICT".parse::<TransferMode>().ok(), Some(TransferMode::Strict));
    }
}
