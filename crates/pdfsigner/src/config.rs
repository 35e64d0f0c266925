//! Settings loaded from `config.ini` and `PDFSIGNER_*` environment variables.

use std::net::{SocketAddr, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use ::config::Map;
use anyhow::{Context, Result, bail};
use serde::Deserialize;

use crate::keystore::KeyMaterial;
use crate::params::{Rectangle, SignatureFont};
use crate::resolver::SignatureDefaults;
use crate::server::DEFAULT_MAX_BODY_BYTES;
use crate::storage::S3Settings;

pub const ENV_PREFIX: &str = "PDFSIGNER";

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    8090
}

fn default_workers() -> usize {
    64
}

fn default_keep_alive() -> u64 {
    10
}

fn default_max_body_bytes() -> usize {
    DEFAULT_MAX_BODY_BYTES
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Run the HTTP server instead of a batch.
    #[serde(default)]
    pub server: bool,
    #[serde(default = "default_host")]
    pub server_host: String,
    #[serde(default = "default_port")]
    pub server_port: u16,

    pub reason: Option<String>,
    pub contact: Option<String>,
    pub location: Option<String>,
    pub x1: Option<f32>,
    pub y1: Option<f32>,
    pub x2: Option<f32>,
    pub y2: Option<f32>,
    pub page: Option<i32>,

    /// PKCS#12 keystore and its password.
    pub keyfile: Option<PathBuf>,
    pub password: Option<String>,

    #[serde(default)]
    pub s3_enabled: bool,
    pub s3_region: Option<String>,
    pub s3_endpoint_url: Option<String>,
    #[serde(default)]
    pub s3_force_path_style: bool,

    /// External signing program and its arguments (whitespace separated).
    pub engine_command: Option<String>,
    #[serde(default)]
    pub engine_args: String,

    /// Upper bound of the blocking worker pool.
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_keep_alive")]
    pub worker_keep_alive_secs: u64,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Config {
    /// Loads `path` (required) with `PDFSIGNER_*` variables layered on top.
    pub fn load(path: &Path) -> Result<Self> {
        Self::load_with_env(path, None)
    }

    /// Like [`Config::load`], reading variables from `env` instead of the
    /// process environment when given.
    ///
    /// Variables stay strings until deserialized, so a numeric-looking
    /// password or reason is kept verbatim.
    pub fn load_with_env(path: &Path, env: Option<Map<String, String>>) -> Result<Self> {
        let var = |name: &str| match &env {
            Some(env) => env.get(name).cloned(),
            None => std::env::var(name).ok(),
        };
        let aws_endpoint = var("AWS_ENDPOINT_URL");
        let aws_path_style = var("AWS_FORCE_PATH_STYLE").is_some();

        let settings = ::config::Config::builder()
            .add_source(::config::File::from(path).required(true))
            .add_source(::config::Environment::with_prefix(ENV_PREFIX).source(env))
            .build()
            .with_context(|| format!("reading {}", path.display()))?;

        let mut config: Config = settings
            .try_deserialize()
            .with_context(|| format!("parsing {}", path.display()))?;

        // Same variables the AWS tooling understands.
        if let Some(endpoint) = aws_endpoint {
            config.s3_endpoint_url = Some(endpoint);
        }
        if aws_path_style {
            config.s3_force_path_style = true;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            bail!("workers must be greater than 0");
        }
        if self.s3_enabled && self.s3_region.as_deref().is_none_or(|r| r.trim().is_empty()) {
            bail!("s3_region is required when s3_enabled is true");
        }
        Ok(())
    }

    pub fn server_addr(&self) -> Result<SocketAddr> {
        (self.server_host.as_str(), self.server_port)
            .to_socket_addrs()
            .with_context(|| format!("resolving {}:{}", self.server_host, self.server_port))?
            .next()
            .with_context(|| format!("no address for {}", self.server_host))
    }

    pub fn worker_keep_alive(&self) -> Duration {
        Duration::from_secs(self.worker_keep_alive_secs)
    }

    pub fn rectangle(&self) -> Option<Rectangle> {
        Rectangle::from_parts(self.x1, self.y1, self.x2, self.y2)
    }

    pub fn s3_settings(&self) -> Option<S3Settings> {
        if !self.s3_enabled {
            return None;
        }
        Some(S3Settings {
            region: self.s3_region.clone().unwrap_or_default(),
            endpoint_url: self.s3_endpoint_url.clone(),
            force_path_style: self.s3_force_path_style,
        })
    }

    pub fn engine_argv(&self) -> Vec<String> {
        self.engine_args
            .split_whitespace()
            .map(str::to_string)
            .collect()
    }

    /// Loads the keystore. Both `keyfile` and `password` must be set.
    pub fn load_key_material(&self) -> Result<KeyMaterial> {
        let keyfile = self.keyfile.as_deref().context("keyfile is not configured")?;
        let password = self.password.as_deref().context("password is not configured")?;
        KeyMaterial::load(keyfile, password)
    }

    pub fn signature_defaults(&self, key_material: Option<Arc<KeyMaterial>>) -> SignatureDefaults {
        SignatureDefaults {
            reason: self.reason.clone(),
            contact: self.contact.clone(),
            location: self.location.clone(),
            rectangle: self.rectangle(),
            page: self.page,
            font: Arc::new(SignatureFont::default()),
            key_material,
        }
    }
}
