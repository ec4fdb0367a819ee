use alloy::primitives::Address;
use anyhow::{Result, anyhow};
use once_cell::sync::OnceCell;
use serde::Deserialize;
use std::{env, fs, path::PathBuf};
use tracing::{info, warn};
use utils::errors::{CONFIG_ALREADY_SET, CONFIG_PARSE_FAILED, CONFIG_READ_FAILED, TERMINAL_DAOS_INVALID};

pub static CONFIG: OnceCell<TerminalConfig> = OnceCell::new();

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TerminalConfig {
    pub subgraph_url: String,
    pub daos: Vec<DaoConfig>,
    pub page_size: usize,
    pub poll_interval_secs: u64,
    pub cache_dir: PathBuf,
    /// Wallet whose vote state is reported next to each proposal.
    pub viewer: Option<Address>,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            subgraph_url: String::new(),
            daos: Vec::new(),
            page_size: proposalsapp_governance::source::DEFAULT_PAGE_SIZE,
            poll_interval_secs: 60,
            cache_dir: PathBuf::from(".terminal-cache"),
            viewer: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DaoConfig {
    pub name: String,
    pub address: Address,
    pub plugin: Address,
}

pub fn load() -> Result<()> {
    let config = load_config();
    CONFIG.set(config).map_err(|_| anyhow!(CONFIG_ALREADY_SET))?;
    Ok(())
}

pub fn get_config() -> Result<&'static TerminalConfig> {
    CONFIG.get().ok_or_else(|| anyhow!("Terminal config not initialized"))
}

fn load_config() -> TerminalConfig {
    let path = env::var("TERMINAL_CONFIG_PATH").unwrap_or_else(|_| "terminal.yaml".to_string());
    let mut config = match fs::read_to_string(&path) {
        Ok(contents) => match serde_yaml::from_str::<TerminalConfig>(&contents) {
            Ok(config) => config,
            Err(err) => {
                warn!(error = %err, path = %path, "{}, using defaults", CONFIG_PARSE_FAILED);
                TerminalConfig::default()
            }
        },
        Err(err) => {
            warn!(error = %err, path = %path, "{}, using defaults", CONFIG_READ_FAILED);
            TerminalConfig::default()
        }
    };

    apply_env_overrides(&mut config);

    info!(
        daos = config.daos.len(),
        page_size = config.page_size,
        poll_interval_secs = config.poll_interval_secs,
        cache_dir = %config.cache_dir.display(),
        "Terminal config loaded"
    );

    config
}

fn apply_env_overrides(config: &mut TerminalConfig) {
    if let Ok(value) = env::var("SUBGRAPH_URL") {
        config.subgraph_url = value;
    }

    if let Ok(value) = env::var("TERMINAL_DAOS") {
        match serde_json::from_str::<Vec<DaoConfig>>(&value) {
            Ok(daos) => config.daos = daos,
            Err(err) => warn!(error = %err, "{}", TERMINAL_DAOS_INVALID),
        }
    }

    if let Ok(value) = env::var("TERMINAL_PAGE_SIZE") {
        match value.parse::<usize>() {
            Ok(page_size) if page_size > 0 => config.page_size = page_size,
            Ok(_) => warn!("Ignoring TERMINAL_PAGE_SIZE override of zero"),
            Err(err) => warn!(error = %err, "Failed to parse TERMINAL_PAGE_SIZE override"),
        }
    }

    if let Ok(value) = env::var("TERMINAL_POLL_INTERVAL_SECS") {
        match value.parse::<u64>() {
            Ok(interval) => config.poll_interval_secs = interval,
            Err(err) => warn!(error = %err, "Failed to parse TERMINAL_POLL_INTERVAL_SECS override"),
        }
    }

    if let Ok(value) = env::var("TERMINAL_CACHE_DIR") {
        config.cache_dir = PathBuf::from(value);
    }
}
