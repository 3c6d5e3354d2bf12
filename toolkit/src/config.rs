//! Configuration for the toolkit and the demo server.
//!
//! [`ToolkitConfig`] is the plain record every toolkit operation reads from. Callers embedding
//! the library build one directly (or via `Default`); the bundled binary loads it as the
//! `toolkit` section of its [`Config`].
//!
//! ## Loading Priority
//!
//! The binary merges configuration sources in the following order (later sources override
//! earlier ones):
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Environment variables** - Variables prefixed with `TOOLKIT_` override YAML values
//!
//! For nested config values, use double underscores in environment variables. For example,
//! `TOOLKIT_TOOLKIT__MAX_JSON_SIZE=2048` sets the `toolkit.max_json_size` field.
//!
//! ## Example
//!
//! ```yaml
//! host: 0.0.0.0
//! port: 3000
//! upload_dir: ./uploads
//! download_dir: ./static
//! push_url: https://hooks.example.com/ingest
//! toolkit:
//!   max_file_size: 10485760
//!   allowed_types: ["image/png", "image/jpeg"]
//!   max_json_size: 1048576
//!   allow_unknown_fields: false
//! ```

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;

/// 1 GiB
pub const DEFAULT_MAX_FILE_SIZE: u64 = 1024 * 1024 * 1024;
/// 1 MiB
pub const DEFAULT_MAX_JSON_SIZE: usize = 1024 * 1024;

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "TOOLKIT_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    #[arg(long)]
    pub validate: bool,
}

/// Limits and policies shared by every toolkit operation.
///
/// Fields are read during an operation and never mutated by the toolkit. A zero size means
/// "use the default", so a zeroed record behaves like `ToolkitConfig::default()`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolkitConfig {
    /// Maximum total bytes accepted across the file parts of one multipart upload
    pub max_file_size: u64,
    /// Sniffed MIME types accepted for uploads, compared case-insensitively. Empty allows all.
    pub allowed_types: Vec<String>,
    /// Maximum JSON request body size in bytes
    pub max_json_size: usize,
    /// Accept JSON object keys the target type does not declare
    pub allow_unknown_fields: bool,
}

impl Default for ToolkitConfig {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            allowed_types: Vec::new(),
            max_json_size: DEFAULT_MAX_JSON_SIZE,
            allow_unknown_fields: false,
        }
    }
}

impl ToolkitConfig {
    pub fn max_file_size(&self) -> u64 {
        if self.max_file_size == 0 {
            DEFAULT_MAX_FILE_SIZE
        } else {
            self.max_file_size
        }
    }

    pub fn max_json_size(&self) -> usize {
        if self.max_json_size == 0 {
            DEFAULT_MAX_JSON_SIZE
        } else {
            self.max_json_size
        }
    }

    /// Whether a sniffed content type passes the allow-list.
    pub fn is_allowed_type(&self, content_type: &str) -> bool {
        self.allowed_types.is_empty() || self.allowed_types.iter().any(|t| t.eq_ignore_ascii_case(content_type))
    }
}

/// Demo server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Directory uploaded files are written to (created on demand)
    pub upload_dir: PathBuf,
    /// Directory files are served from by the download route
    pub download_dir: PathBuf,
    /// Endpoint the push route forwards JSON payloads to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub push_url: Option<Url>,
    pub toolkit: ToolkitConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            upload_dir: PathBuf::from("uploads"),
            download_dir: PathBuf::from("static"),
            push_url: None,
            toolkit: ToolkitConfig::default(),
        }
    }
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(args).extract()?;
        config.validate().map_err(figment::Error::from)?;
        Ok(config)
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> Result<(), String> {
        if self.upload_dir.as_os_str().is_empty() {
            return Err("Config validation: upload_dir must not be empty".to_string());
        }

        if let Some(blank) = self.toolkit.allowed_types.iter().position(|t| t.trim().is_empty()) {
            return Err(format!("Config validation: toolkit.allowed_types[{blank}] is blank"));
        }

        Ok(())
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            .merge(Yaml::file(&args.config))
            .merge(Env::prefixed("TOOLKIT_").ignore(&["config"]).split("__"))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_defaults() {
        let config = ToolkitConfig::default();
        assert_eq!(config.max_file_size(), 1024 * 1024 * 1024);
        assert_eq!(config.max_json_size(), 1024 * 1024);
        assert!(config.allowed_types.is_empty());
        assert!(!config.allow_unknown_fields);
    }

    #[test]
    fn test_zero_sizes_fall_back_to_defaults() {
        let config = ToolkitConfig {
            max_file_size: 0,
            max_json_size: 0,
            ..Default::default()
        };
        assert_eq!(config.max_file_size(), DEFAULT_MAX_FILE_SIZE);
        assert_eq!(config.max_json_size(), DEFAULT_MAX_JSON_SIZE);
    }

    #[test]
    fn test_allowed_type_matching() {
        let mut config = ToolkitConfig::default();
        assert!(config.is_allowed_type("application/x-anything"));

        config.allowed_types = vec!["image/jpeg".to_string(), "IMAGE/PNG".to_string()];
        assert!(config.is_allowed_type("image/png"));
        assert!(config.is_allowed_type("image/jpeg"));
        assert!(!config.is_allowed_type("image/gif"));
    }

    #[test]
    fn test_yaml_with_env_override() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "test.yaml",
                r#"
port: 8080
upload_dir: /tmp/uploads
toolkit:
  allowed_types: ["image/png"]
  max_json_size: 2048
"#,
            )?;

            jail.set_env("TOOLKIT_HOST", "127.0.0.1");
            jail.set_env("TOOLKIT_TOOLKIT__ALLOW_UNKNOWN_FIELDS", "true");

            let args = Args {
                config: "test.yaml".to_string(),
                validate: false,
            };

            let config = Config::load(&args)?;

            assert_eq!(config.host, "127.0.0.1");
            assert_eq!(config.port, 8080);
            assert_eq!(config.upload_dir, PathBuf::from("/tmp/uploads"));
            assert_eq!(config.toolkit.allowed_types, vec!["image/png".to_string()]);
            assert_eq!(config.toolkit.max_json_size, 2048);
            assert!(config.toolkit.allow_unknown_fields);
            // still default
            assert_eq!(config.toolkit.max_file_size, DEFAULT_MAX_FILE_SIZE);

            Ok(())
        });
    }

    #[test]
    fn test_push_url_parsed() {
        Jail::expect_with(|jail| {
            jail.create_file("test.yaml", "push_url: http://remote:9000/hook\n")?;

            let args = Args {
                config: "test.yaml".to_string(),
                validate: false,
            };
            let config = Config::load(&args)?;

            assert_eq!(config.push_url.map(|u| u.to_string()), Some("http://remote:9000/hook".to_string()));
            Ok(())
        });
    }

    #[test]
    fn test_unknown_keys_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("test.yaml", "toolkit:\n  max_upload: 5\n")?;

            let args = Args {
                config: "test.yaml".to_string(),
                validate: false,
            };
            assert!(Config::load(&args).is_err());
            Ok(())
        });
    }

    #[test]
    fn test_blank_allowed_type_rejected() {
        let mut config = Config::default();
        config.toolkit.allowed_types = vec!["image/png".to_string(), "  ".to_string()];

        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("allowed_types[1]"));
    }
}
