use crate::error::{BenchError, Result};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

// ---------------------------------------------------------------------------
// SyncConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_remote")]
    pub remote: String,
    /// Branch on `remote` to track. Unset means the current branch's upstream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

fn default_remote() -> String {
    "origin".to_string()
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            remote: default_remote(),
            branch: None,
        }
    }
}

// ---------------------------------------------------------------------------
// DrainConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrainConfig {
    #[serde(default = "default_data_sender_pattern")]
    pub data_sender_pattern: String,
    #[serde(default = "default_load_generator_pattern")]
    pub load_generator_pattern: String,
    #[serde(default = "default_grace_period")]
    pub grace_period_secs: u64,
    #[serde(default = "default_stop_network")]
    pub stop_network: Vec<String>,
}

fn default_data_sender_pattern() -> String {
    "send_data".to_string()
}

fn default_load_generator_pattern() -> String {
    "locust".to_string()
}

fn default_grace_period() -> u64 {
    10
}

fn default_stop_network() -> Vec<String> {
    argv(&["nearup", "stop"])
}

impl Default for DrainConfig {
    fn default() -> Self {
        Self {
            data_sender_pattern: default_data_sender_pattern(),
            load_generator_pattern: default_load_generator_pattern(),
            grace_period_secs: default_grace_period(),
            stop_network: default_stop_network(),
        }
    }
}

// ---------------------------------------------------------------------------
// BuildConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildConfig {
    #[serde(default = "default_build_command")]
    pub command: Vec<String>,
}

fn default_build_command() -> Vec<String> {
    argv(&["cargo", "build", "-p", "neard", "--release"])
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            command: default_build_command(),
        }
    }
}

// ---------------------------------------------------------------------------
// NodeConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(default = "default_start_command")]
    pub start_command: Vec<String>,
    #[serde(default = "default_binary_path")]
    pub binary_path: PathBuf,
    #[serde(default = "default_home")]
    pub home: PathBuf,
    #[serde(default = "default_one")]
    pub num_nodes: u32,
    #[serde(default = "default_one")]
    pub num_shards: u32,
    /// Discard and reinitialize any prior local chain state.
    #[serde(default = "default_true")]
    pub override_state: bool,
}

fn default_start_command() -> Vec<String> {
    argv(&["nearup", "run", "localnet"])
}

fn default_binary_path() -> PathBuf {
    PathBuf::from("target/release")
}

fn default_home() -> PathBuf {
    PathBuf::from(paths::DEFAULT_NODE_HOME)
}

fn default_one() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            start_command: default_start_command(),
            binary_path: default_binary_path(),
            home: default_home(),
            num_nodes: 1,
            num_shards: 1,
            override_state: true,
        }
    }
}

// ---------------------------------------------------------------------------
// WarmupConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarmupConfig {
    #[serde(default = "default_data_sender")]
    pub data_sender: Vec<String>,
    /// Where the data sender's stdout/stderr are appended.
    #[serde(default = "default_data_sender_log")]
    pub data_sender_log: Option<PathBuf>,
    #[serde(default = "default_python")]
    pub python: String,
    #[serde(default = "default_venv_dir")]
    pub venv_dir: PathBuf,
    #[serde(default = "default_requirements")]
    pub requirements: Vec<PathBuf>,
    #[serde(default = "default_packages")]
    pub packages: Vec<String>,
}

fn default_data_sender() -> Vec<String> {
    argv(&["python3", "send_data.py"])
}

fn default_data_sender_log() -> Option<PathBuf> {
    Some(PathBuf::from("send_data.log"))
}

fn default_python() -> String {
    "python3".to_string()
}

fn default_venv_dir() -> PathBuf {
    PathBuf::from(".venv")
}

fn default_requirements() -> Vec<PathBuf> {
    vec![PathBuf::from("pytest/requirements.txt")]
}

fn default_packages() -> Vec<String> {
    vec!["locust".to_string()]
}

impl Default for WarmupConfig {
    fn default() -> Self {
        Self {
            data_sender: default_data_sender(),
            data_sender_log: default_data_sender_log(),
            python: default_python(),
            venv_dir: default_venv_dir(),
            requirements: default_requirements(),
            packages: default_packages(),
        }
    }
}

// ---------------------------------------------------------------------------
// BenchmarkConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkConfig {
    #[serde(default = "default_program")]
    pub program: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_locustfile")]
    pub locustfile: PathBuf,
    /// Defaults to the node home's validator key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_path: Option<PathBuf>,
    #[serde(default = "default_credential_env")]
    pub credential_env: String,
    #[serde(default = "default_users")]
    pub users: u32,
    #[serde(default = "default_spawn_rate")]
    pub spawn_rate: u32,
    #[serde(default = "default_processes")]
    pub processes: u32,
    #[serde(default = "default_true")]
    pub headless: bool,
}

fn default_program() -> String {
    "locust".to_string()
}

fn default_endpoint() -> String {
    "127.0.0.1:3030".to_string()
}

fn default_locustfile() -> PathBuf {
    PathBuf::from("pytest/tests/loadtest/locust/locustfiles/ft.py")
}

fn default_credential_env() -> String {
    "KEY".to_string()
}

fn default_users() -> u32 {
    1000
}

fn default_spawn_rate() -> u32 {
    10
}

fn default_processes() -> u32 {
    8
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            endpoint: default_endpoint(),
            locustfile: default_locustfile(),
            credential_path: None,
            credential_env: default_credential_env(),
            users: default_users(),
            spawn_rate: default_spawn_rate(),
            processes: default_processes(),
            headless: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub drain: DrainConfig,
    #[serde(default)]
    pub build: BuildConfig,
    #[serde(default)]
    pub node: NodeConfig,
    #[serde(default)]
    pub warmup: WarmupConfig,
    #[serde(default)]
    pub benchmark: BenchmarkConfig,
}

fn default_version() -> u32 {
    1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            sync: SyncConfig::default(),
            drain: DrainConfig::default(),
            build: BuildConfig::default(),
            node: NodeConfig::default(),
            warmup: WarmupConfig::default(),
            benchmark: BenchmarkConfig::default(),
        }
    }
}

impl Config {
    /// Load `loadbench.yaml` from `root`, or the defaults if it is absent.
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    /// Credential file handed to the load generator.
    pub fn credential_path(&self) -> PathBuf {
        self.benchmark
            .credential_path
            .clone()
            .unwrap_or_else(|| self.node.home.join(paths::VALIDATOR_KEY_FILE))
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let mut error = |message: String| {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message,
            })
        };

        for (name, cmd) in [
            ("drain.stop_network", &self.drain.stop_network),
            ("build.command", &self.build.command),
            ("node.start_command", &self.node.start_command),
            ("warmup.data_sender", &self.warmup.data_sender),
        ] {
            if cmd.first().map_or(true, |p| p.trim().is_empty()) {
                error(format!("{name} is empty"));
            }
        }

        if self.drain.data_sender_pattern.trim().is_empty() {
            error("drain.data_sender_pattern is empty".to_string());
        }
        if self.drain.load_generator_pattern.trim().is_empty() {
            error("drain.load_generator_pattern is empty".to_string());
        }
        if self.warmup.python.trim().is_empty() {
            error("warmup.python is empty".to_string());
        }
        if self.benchmark.program.trim().is_empty() {
            error("benchmark.program is empty".to_string());
        }
        if self.benchmark.endpoint.trim().is_empty() {
            error("benchmark.endpoint is empty".to_string());
        }
        if self.benchmark.users == 0 {
            error("benchmark.users must be at least 1".to_string());
        }
        if self.benchmark.spawn_rate == 0 {
            error("benchmark.spawn_rate must be at least 1".to_string());
        }
        if self.benchmark.processes == 0 {
            error("benchmark.processes must be at least 1".to_string());
        }
        if self.node.num_nodes == 0 || self.node.num_shards == 0 {
            error("node.num_nodes and node.num_shards must be at least 1".to_string());
        }

        if self.drain.grace_period_secs == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "drain.grace_period_secs is 0; data senders get no time to flush"
                    .to_string(),
            });
        }
        if self.benchmark.spawn_rate > self.benchmark.users {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "benchmark.spawn_rate ({}) exceeds benchmark.users ({})",
                    self.benchmark.spawn_rate, self.benchmark.users
                ),
            });
        }
        if self.node.num_nodes != 1 || self.node.num_shards != 1 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "node topology is {} node(s) / {} shard(s); the benchmark is calibrated for 1 / 1",
                    self.node.num_nodes, self.node.num_shards
                ),
            });
        }

        warnings
    }

    /// Fail on any `WarnLevel::Error` from [`Config::validate`].
    pub fn ensure_valid(&self) -> Result<()> {
        let errors: Vec<String> = self
            .validate()
            .into_iter()
            .filter(|w| w.level == WarnLevel::Error)
            .map(|w| w.message)
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(BenchError::InvalidConfig(errors.join("; ")))
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
