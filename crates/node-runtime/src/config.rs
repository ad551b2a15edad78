//! # Node Configuration
//!
//! `AdapterConfig` from an optional JSON file (`FL_CONFIG`) with
//! environment overrides applied on top:
//!
//! | Variable | Effect |
//! |----------|--------|
//! | `FL_NODE_ID` | `node.id` |
//! | `FL_WS_PORT` | `websocket.port` |
//! | `FL_HMAC_SECRET` | adds HMAC key [`ENV_HMAC_KEY_ID`] (hex, at least 32 bytes) |
//!
//! ## Security Requirements
//!
//! - An environment HMAC secret shorter than 32 bytes is ignored
//! - With an environment secret and no explicit rules, every message is
//!   signed and verified

use anyhow::{Context, Result};
use fl_01_envelope::SignatureAlgorithm;
use fl_02_signature_policy::{KeyConfig, SignatureRequirement};
use fl_06_adapter::AdapterConfig;
use shared_types::NodeId;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Key id under which `FL_HMAC_SECRET` is installed.
pub const ENV_HMAC_KEY_ID: &str = "env-hmac";

/// Minimum accepted length of `FL_HMAC_SECRET`, in bytes.
pub const MIN_HMAC_SECRET_LEN: usize = 32;

/// Load configuration from the process environment.
pub fn load_config() -> Result<AdapterConfig> {
    let path = std::env::var_os("FL_CONFIG").map(PathBuf::from);
    load_config_from(path.as_deref(), |name| std::env::var(name).ok())
}

/// Load configuration from `path` (if any) and the variables `env` returns.
pub fn load_config_from(
    path: Option<&Path>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<AdapterConfig> {
    let mut config = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            let config: AdapterConfig = serde_json::from_str(&text)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?;
            info!(path = %path.display(), "Loaded configuration file");
            config
        }
        None => AdapterConfig::default(),
    };

    // Override node id from environment
    if let Some(id) = env("FL_NODE_ID") {
        config.node.id = Some(NodeId::new(id).context("FL_NODE_ID is not a valid node id")?);
    }

    // Override port from environment
    if let Some(port) = env("FL_WS_PORT") {
        match port.parse() {
            Ok(p) => config.websocket.port = p,
            Err(_) => warn!(value = %port, "FL_WS_PORT is not a valid port, ignoring"),
        }
    }

    // HMAC secret from environment
    if let Some(secret_hex) = env("FL_HMAC_SECRET") {
        apply_hmac_secret(&mut config, secret_hex);
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn apply_hmac_secret(config: &mut AdapterConfig, secret_hex: String) {
    match hex::decode(&secret_hex) {
        Ok(secret) if secret.len() >= MIN_HMAC_SECRET_LEN => {}
        Ok(_) => {
            warn!("FL_HMAC_SECRET must be at least {MIN_HMAC_SECRET_LEN} bytes, ignoring");
            return;
        }
        Err(_) => {
            warn!("FL_HMAC_SECRET is not valid hex, ignoring");
            return;
        }
    }

    let signatures = &mut config.signatures;
    signatures.keys.retain(|key| key.id != ENV_HMAC_KEY_ID);
    signatures.keys.push(KeyConfig {
        id: ENV_HMAC_KEY_ID.to_string(),
        algorithm: SignatureAlgorithm::HmacSha256,
        secret_hex: Some(secret_hex),
        public_hex: None,
    });
    if signatures.rules.is_empty() && signatures.default_requirement == SignatureRequirement::None {
        signatures.default_requirement = SignatureRequirement::SignAndVerify;
    }
    info!(key_id = ENV_HMAC_KEY_ID, "Loaded HMAC secret from environment");
}
