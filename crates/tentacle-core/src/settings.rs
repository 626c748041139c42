//! Local settings: credential paths, SSH login and droplet sizing.
//!
//! Defaults match a stock single-user setup (`~/.digitalOceanToken`,
//! `~/.ssh/id_rsa`, root on port 22). Every field can be overridden from the
//! environment; the CLI applies its flags on top.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{FleetError, FleetResult};
use crate::provider::MachineSpec;

pub const DEFAULT_API_URL: &str = "https://api.digitalocean.com/v2";
pub const DEFAULT_TOKEN_FILE: &str = "~/.digitalOceanToken";
pub const DEFAULT_SSH_KEY: &str = "~/.ssh/id_rsa";
pub const DEFAULT_SSH_USER: &str = "root";
pub const DEFAULT_SSH_PORT: u16 = 22;

#[derive(Debug, Clone)]
pub struct Settings {
    pub api_url: String,
    pub token_file: PathBuf,
    pub ssh_key: PathBuf,
    pub ssh_user: String,
    pub ssh_port: u16,
    pub machine: MachineSpec,
    pub run_deadline: Option<Duration>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            api_url: DEFAULT_API_URL.to_string(),
            token_file: expand_home(DEFAULT_TOKEN_FILE),
            ssh_key: expand_home(DEFAULT_SSH_KEY),
            ssh_user: DEFAULT_SSH_USER.to_string(),
            ssh_port: DEFAULT_SSH_PORT,
            machine: MachineSpec::default(),
            run_deadline: None,
        }
    }
}

impl Settings {
    /// Defaults overridden by `TENTACLE_*` environment variables.
    pub fn from_env() -> FleetResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Settings::from_env`] but reading from an arbitrary source.
    pub fn from_lookup<F>(lookup: F) -> FleetResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Settings::default();
        if let Some(url) = lookup("TENTACLE_API_URL") {
            settings.api_url = url.trim_end_matches('/').to_string();
        }
        if let Some(path) = lookup("TENTACLE_TOKEN_FILE") {
            settings.token_file = expand_home(&path);
        }
        if let Some(path) = lookup("TENTACLE_SSH_KEY") {
            settings.ssh_key = expand_home(&path);
        }
        if let Some(user) = lookup("TENTACLE_SSH_USER") {
            settings.ssh_user = user;
        }
        if let Some(port) = lookup("TENTACLE_SSH_PORT") {
            settings.ssh_port = port
                .parse()
                .map_err(|_| FleetError::Config(format!("invalid TENTACLE_SSH_PORT: {port}")))?;
        }
        if let Some(region) = lookup("TENTACLE_REGION") {
            settings.machine.region = region;
        }
        if let Some(size) = lookup("TENTACLE_SIZE") {
            settings.machine.size = size;
        }
        if let Some(image) = lookup("TENTACLE_IMAGE") {
            settings.machine.image = image;
        }
        if let Some(fingerprints) = lookup("TENTACLE_SSH_FINGERPRINTS") {
            settings.machine.ssh_key_fingerprints = fingerprints
                .split(',')
                .map(str::trim)
                .filter(|f| !f.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(secs) = lookup("TENTACLE_RUN_DEADLINE_SECS") {
            let secs: u64 = secs.parse().map_err(|_| {
                FleetError::Config(format!("invalid TENTACLE_RUN_DEADLINE_SECS: {secs}"))
            })?;
            settings.run_deadline = Some(Duration::from_secs(secs));
        }
        Ok(settings)
    }
}

/// Expand a leading `~/` using `$HOME`. Other paths are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), std::env::var_os("HOME")) {
        (Some(rest), Some(home)) => Path::new(&home).join(rest),
        _ => PathBuf::from(path),
    }
}

/// Read the API token, trimming surrounding whitespace.
pub fn read_token(path: &Path) -> FleetResult<String> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        FleetError::Config(format!("cannot read token file {}: {e}", path.display()))
    })?;
    let token = raw.trim();
    if token.is_empty() {
        return Err(FleetError::Config(format!(
            "token file {} is empty",
            path.display()
        )));
    }
    Ok(token.to_string())
}
