use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level application configuration, loaded from `config.yaml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub r2: R2Config,
    pub sync: SyncConfig,
    pub encryption: EncryptionConfig,
    pub fuse: FuseConfig,
    pub app: ShellConfig,
}

/// R2 (S3-compatible) bucket credentials and endpoint.
///
/// All four credential fields are required; `Config::load` rejects a config
/// missing any of them before any network activity begins.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct R2Config {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub endpoint_url: String,
    pub bucket_name: String,
    #[serde(default = "default_region")]
    pub region: String,
}

fn default_region() -> String {
    "auto".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub local_cache_dir: PathBuf,
    pub mount_point: PathBuf,
    pub sync_interval: u64,
    pub max_file_size: u64,
    pub excluded_patterns: Vec<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            local_cache_dir: PathBuf::from("~/.cache/sharebox"),
            mount_point: PathBuf::from("~/ShareBox"),
            sync_interval: 30,
            max_file_size: 1_073_741_824,
            excluded_patterns: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncryptionConfig {
    pub enabled: bool,
    pub algorithm: String,
    /// Passphrase. If empty, the CLI prompts interactively rather than
    /// storing a plaintext secret in the config file.
    pub password: String,
}

impl Default for EncryptionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            algorithm: "AES-256-GCM".into(),
            password: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FuseConfig {
    pub foreground: bool,
    pub allow_other: bool,
    pub allow_root: bool,
    pub default_permissions: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    /// Defaults to the host name at load time if left unset in the file.
    pub device_name: String,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
    pub pid_file: PathBuf,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            device_name: String::new(),
            log_level: "info".into(),
            log_file: None,
            pid_file: PathBuf::from("~/.local/share/sharebox/sharebox.pid"),
        }
    }
}

impl AppConfig {
    /// Load and validate a config file, applying tilde expansion to every
    /// path-valued field and defaulting `app.device_name` to the host name.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("reading config {}: {e}", path.display()))?;
        let mut config: AppConfig =
            serde_yml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing config: {e}"))?;

        config.expand_paths();
        if config.app.device_name.is_empty() {
            config.app.device_name = hostname();
        }
        config.validate()?;
        Ok(config)
    }

    /// Required-credential check. Mirrors the original implementation's
    /// `get_r2_config` contract: any missing key is a single fatal error.
    pub fn validate(&self) -> anyhow::Result<()> {
        let missing: Vec<&str> = [
            ("access_key_id", self.r2.access_key_id.is_empty()),
            ("secret_access_key", self.r2.secret_access_key.is_empty()),
            ("endpoint_url", self.r2.endpoint_url.is_empty()),
            ("bucket_name", self.r2.bucket_name.is_empty()),
        ]
        .into_iter()
        .filter_map(|(name, missing)| missing.then_some(name))
        .collect();

        if !missing.is_empty() {
            anyhow::bail!("missing required r2 config keys: {}", missing.join(", "));
        }
        Ok(())
    }

    fn expand_paths(&mut self) {
        self.sync.local_cache_dir = expand_tilde(&self.sync.local_cache_dir);
        self.sync.mount_point = expand_tilde(&self.sync.mount_point);
        self.app.pid_file = expand_tilde(&self.app.pid_file);
        if let Some(log_file) = self.app.log_file.take() {
            self.app.log_file = Some(expand_tilde(&log_file));
        }
    }
}

fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    if let Some(rest) = s.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    path.to_path_buf()
}

fn hostname() -> String {
    hostname_inner().unwrap_or_else(|| "unknown-device".to_string())
}

#[cfg(unix)]
fn hostname_inner() -> Option<String> {
    std::process::Command::new("hostname")
        .output()
        .ok()
        .filter(|o| o.status.success())
        .and_then(|o| String::from_utf8(o.stdout).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(not(unix))]
fn hostname_inner() -> Option<String> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_config() {
        let yaml = r#"
r2:
  access_key_id: AKIA123
  secret_access_key: secret123
  endpoint_url: https://example.r2.cloudflarestorage.com
  bucket_name: my-bucket
  region: auto

sync:
  local_cache_dir: /var/cache/sharebox
  mount_point: /mnt/sharebox
  sync_interval: 15
  max_file_size: 2097152
  excluded_patterns:
    - "*.tmp"
    - ".DS_Store"

encryption:
  enabled: true
  algorithm: AES-256-GCM
  password: hunter2

fuse:
  foreground: true
  allow_other: false
  allow_root: false
  default_permissions: true

app:
  device_name: laptop-1
  log_level: debug
  pid_file: /run/sharebox.pid
"#;
        let config: AppConfig = serde_yml::from_str(yaml).unwrap();
        assert_eq!(config.r2.access_key_id, "AKIA123");
        assert_eq!(config.sync.sync_interval, 15);
        assert_eq!(config.sync.excluded_patterns, vec!["*.tmp", ".DS_Store"]);
        assert!(config.encryption.enabled);
        assert!(config.fuse.foreground);
        assert_eq!(config.app.device_name, "laptop-1");
        config.validate().unwrap();
    }

    #[test]
    fn defaults_fill_missing_sections() {
        let config: AppConfig = serde_yml::from_str("r2:\n  access_key_id: a\n").unwrap();
        assert_eq!(config.sync.sync_interval, 30);
        assert_eq!(config.sync.max_file_size, 1_073_741_824);
        assert_eq!(config.app.log_level, "info");
        assert_eq!(config.r2.region, "auto");
    }

    #[test]
    fn validate_rejects_missing_credentials() {
        let config = AppConfig::default();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("access_key_id"));
    }

    #[test]
    fn expand_tilde_rewrites_home_relative_paths() {
        std::env::set_var("HOME", "/home/tester");
        let expanded = expand_tilde(Path::new("~/ShareBox"));
        assert_eq!(expanded, PathBuf::from("/home/tester/ShareBox"));

        let absolute = expand_tilde(Path::new("/already/absolute"));
        assert_eq!(absolute, PathBuf::from("/already/absolute"));
    }

    #[test]
    fn serialize_roundtrip() {
        let config = AppConfig {
            r2: R2Config {
                access_key_id: "a".into(),
                secret_access_key: "b".into(),
                endpoint_url: "https://x".into(),
                bucket_name: "bkt".into(),
                region: "auto".into(),
            },
            ..Default::default()
        };
        let yaml = serde_yml::to_string(&config).unwrap();
        let parsed: AppConfig = serde_yml::from_str(&yaml).unwrap();
        assert_eq!(parsed.r2.bucket_name, "bkt");
    }
}
