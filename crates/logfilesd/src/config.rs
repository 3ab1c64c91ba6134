use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use logfiles_core::{
    QueryDefaults, QueryParams, RawQuery, DEFAULT_CACHE_CAPACITY, DEFAULT_HOSTS,
    MAX_LINE_CHUNK_BYTES, UNSPECIFIED,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_LOG_DIRECTORY: &str = "logs";
pub const DEFAULT_LISTEN: &str = "127.0.0.1:8080";
pub const DEFAULT_REMOTE_SCHEME: &str = "http";
pub const DEFAULT_REMOTE_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_REMOTE_CONNECT_TIMEOUT_MS: u64 = 2_000;

/// The on-disk shape. Every key is optional; unknown keys are kept so a
/// newer file does not fail to load.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LogFilesConfig {
    #[serde(rename = "$schema")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_directory: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listen: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_hosts: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_start_pos: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_n_lines: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_order_by: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advertised_address: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_capacity: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_threads: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_line_chunk_bytes: Option<usize>,

    #[serde(default)]
    pub remote: RemoteConfig,

    #[serde(default, flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RemoteConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peer_port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: LogFilesConfig,
    pub sources: Vec<ConfigSourceReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigSourceReport {
    pub path: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Command-line values; these win over files and environment.
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub listen: Option<String>,
    pub log_directory: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct RemoteSettings {
    pub scheme: String,
    pub peer_port: Option<u16>,
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            scheme: DEFAULT_REMOTE_SCHEME.to_string(),
            peer_port: None,
            timeout: Duration::from_millis(DEFAULT_REMOTE_TIMEOUT_MS),
            connect_timeout: Duration::from_millis(DEFAULT_REMOTE_CONNECT_TIMEOUT_MS),
        }
    }
}

/// Fully resolved daemon settings.
#[derive(Debug, Clone)]
pub struct DaemonSettings {
    pub log_directory: PathBuf,
    pub listen: String,
    pub query_defaults: QueryDefaults,
    pub advertised_address: Option<String>,
    pub cache_capacity: usize,
    pub worker_threads: Option<usize>,
    pub max_line_chunk_bytes: usize,
    pub remote: RemoteSettings,
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            log_directory: PathBuf::from(DEFAULT_LOG_DIRECTORY),
            listen: DEFAULT_LISTEN.to_string(),
            query_defaults: QueryDefaults::default(),
            advertised_address: None,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            worker_threads: None,
            max_line_chunk_bytes: MAX_LINE_CHUNK_BYTES,
            remote: RemoteSettings::default(),
        }
    }
}

pub fn load_effective_config(working_dir: &Path) -> LoadedConfig {
    let mut sources: Vec<(PathBuf, String)> = Vec::new();

    #[cfg(not(test))]
    {
        if let Some(global_dir) = global_config_dir() {
            sources.push((global_dir.join("config.jsonc"), "global".to_string()));
            sources.push((global_dir.join("config.json"), "global".to_string()));
        }

        if let Ok(custom) = std::env::var("LOGFILES_CONFIG") {
            if !custom.trim().is_empty() {
                sources.push((PathBuf::from(custom), "custom".to_string()));
            }
        }
    }

    for name in ["logfiles.jsonc", "logfiles.json"] {
        sources.push((working_dir.join(name), "project".to_string()));
    }

    let mut merged = Value::Object(serde_json::Map::new());
    let mut reports = Vec::new();
    for (path, kind) in sources {
        if !path.exists() {
            reports.push(ConfigSourceReport {
                path: path.display().to_string(),
                status: "missing".to_string(),
                error: None,
            });
            continue;
        }

        match std::fs::read_to_string(&path) {
            Ok(contents) => match parse_jsonc(&contents) {
                Ok(value) => {
                    merge_json_value(&mut merged, &value);
                    reports.push(ConfigSourceReport {
                        path: path.display().to_string(),
                        status: format!("loaded:{kind}"),
                        error: None,
                    });
                }
                Err(err) => {
                    reports.push(ConfigSourceReport {
                        path: path.display().to_string(),
                        status: format!("invalid:{kind}"),
                        error: Some(err),
                    });
                }
            },
            Err(err) => {
                reports.push(ConfigSourceReport {
                    path: path.display().to_string(),
                    status: format!("unreadable:{kind}"),
                    error: Some(err.to_string()),
                });
            }
        }
    }

    let config = match serde_json::from_value::<LogFilesConfig>(merged) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(error = %err, "merged config has the wrong shape, using defaults");
            LogFilesConfig::default()
        }
    };
    LoadedConfig {
        config,
        sources: reports,
    }
}

/// Files, then environment, then `overrides`. Relative log directories are
/// taken against `working_dir`.
pub fn resolve_settings(
    working_dir: &Path,
    overrides: SettingsOverrides,
) -> (DaemonSettings, LoadedConfig) {
    let loaded = load_effective_config(working_dir);
    let settings = settings_from_config(working_dir, &loaded.config, overrides);
    (settings, loaded)
}

fn settings_from_config(
    working_dir: &Path,
    config: &LogFilesConfig,
    overrides: SettingsOverrides,
) -> DaemonSettings {
    let mut settings = DaemonSettings::default();

    let log_directory = overrides
        .log_directory
        .or_else(|| env_nonempty("LOGFILES_LOG_DIR").map(PathBuf::from))
        .or_else(|| config.log_directory.as_deref().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_DIRECTORY));
    settings.log_directory = if log_directory.is_absolute() {
        log_directory
    } else {
        working_dir.join(log_directory)
    };

    if let Some(listen) = overrides
        .listen
        .or_else(|| env_nonempty("LOGFILES_LISTEN"))
        .or_else(|| config.listen.clone())
    {
        settings.listen = listen;
    }

    settings.advertised_address = env_nonempty("LOGFILES_ADVERTISED_ADDRESS").or_else(|| {
        config
            .advertised_address
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    });

    settings.query_defaults = query_defaults(config);

    if let Some(capacity) = config.cache_capacity {
        settings.cache_capacity = capacity.max(1);
    }
    settings.worker_threads = config.worker_threads.filter(|count| *count > 0);
    if let Some(bytes) = config.max_line_chunk_bytes.filter(|bytes| *bytes > 0) {
        settings.max_line_chunk_bytes = bytes;
    }

    if let Some(scheme) = config
        .remote
        .scheme
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        settings.remote.scheme = scheme.to_string();
    }
    settings.remote.peer_port = config.remote.peer_port;
    if let Some(ms) = parse_env_u64("LOGFILES_REMOTE_TIMEOUT_MS").or(config.remote.timeout_ms) {
        settings.remote.timeout = Duration::from_millis(ms);
    }
    if let Some(ms) = config.remote.connect_timeout_ms {
        settings.remote.connect_timeout = Duration::from_millis(ms);
    }

    settings
}

/// Configured defaults go through the same checks as request values; a bad
/// set is replaced as a whole so requests never inherit an invalid value.
fn query_defaults(config: &LogFilesConfig) -> QueryDefaults {
    let configured = QueryDefaults {
        start_pos: config.default_start_pos.unwrap_or(UNSPECIFIED),
        n_lines: config.default_n_lines.unwrap_or(UNSPECIFIED),
        order_by: config
            .default_order_by
            .unwrap_or(QueryDefaults::default().order_by),
        hosts: config
            .default_hosts
            .clone()
            .unwrap_or_else(|| DEFAULT_HOSTS.to_string()),
    };
    match QueryParams::validate(&RawQuery::default(), &configured) {
        Ok(_) => configured,
        Err(err) => {
            tracing::warn!(error = %err, "ignoring invalid configured query defaults");
            QueryDefaults::default()
        }
    }
}

#[cfg(not(test))]
fn global_config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("LOGFILES_CONFIG_HOME") {
        if !dir.trim().is_empty() {
            return Some(PathBuf::from(dir));
        }
    }
    let home = std::env::var("HOME").ok()?;
    Some(PathBuf::from(home).join(".logfiles"))
}

fn parse_env_u64(key: &str) -> Option<u64> {
    let value = env_nonempty(key)?;
    match value.parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            tracing::warn!(key, value = %value, "ignoring non-numeric environment override");
            None
        }
    }
}

fn env_nonempty(key: &str) -> Option<String> {
    env_var(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_var(key: &str) -> Option<String> {
    #[cfg(test)]
    {
        let _ = key;
        None
    }

    #[cfg(not(test))]
    {
        std::env::var(key).ok()
    }
}

fn parse_jsonc(raw: &str) -> Result<Value, String> {
    let stripped = strip_jsonc_comments(raw);
    let normalized = strip_trailing_commas(&stripped);
    serde_json::from_str(&normalized).map_err(|err| err.to_string())
}

fn strip_jsonc_comments(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();

    let mut in_string = false;
    let mut escaped = false;
    let mut line_comment = false;
    let mut block_comment = false;

    while let Some(ch) = chars.next() {
        if line_comment {
            if ch == '\n' {
                line_comment = false;
                out.push(ch);
            }
            continue;
        }
        if block_comment {
            if ch == '*' && chars.peek() == Some(&'/') {
                let _ = chars.next();
                block_comment = false;
            }
            continue;
        }

        if in_string {
            out.push(ch);
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match (ch, chars.peek().copied()) {
            ('"', _) => {
                in_string = true;
                out.push(ch);
            }
            ('/', Some('/')) => {
                let _ = chars.next();
                line_comment = true;
            }
            ('/', Some('*')) => {
                let _ = chars.next();
                block_comment = true;
            }
            _ => out.push(ch),
        }
    }

    out
}

fn strip_trailing_commas(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();

    let mut in_string = false;
    let mut escaped = false;

    while let Some(ch) = chars.next() {
        if in_string {
            out.push(ch);
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        if ch == '"' {
            in_string = true;
        } else if ch == ',' {
            let mut lookahead = chars.clone();
            while matches!(lookahead.peek(), Some(next) if next.is_whitespace()) {
                let _ = lookahead.next();
            }
            if matches!(lookahead.peek(), Some(']') | Some('}')) {
                continue;
            }
        }

        out.push(ch);
    }

    out
}

fn merge_json_value(target: &mut Value, overlay: &Value) {
    match (target, overlay) {
        (Value::Object(target_obj), Value::Object(overlay_obj)) => {
            for (key, value) in overlay_obj {
                match target_obj.get_mut(key) {
                    Some(existing) => merge_json_value(existing, value),
                    None => {
                        target_obj.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (target_slot, overlay_value) => {
            *target_slot = overlay_value.clone();
        }
    }
}
