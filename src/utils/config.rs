use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Args;
use serde::Deserialize;
use tracing::info;

use crate::utils::constants::{
    DEFAULT_BIND, DEFAULT_IDLE_TIMEOUT, DEFAULT_MAILBOX_CAPACITY, DEFAULT_MAX_BODY_LEN,
    DEFAULT_MAX_NAME_LEN, DEFAULT_MAX_USERS, DEFAULT_PORT, MAX_FRAME_LEN, MAX_TIMESTAMP_LEN,
    MESSAGE_LINE_OVERHEAD,
};
use crate::utils::errors::{RelayError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    pub max_users: usize,
    pub mailbox_capacity: usize,
    pub max_name_len: usize,
    pub max_body_len: usize,
    //0 disables the timeout
    pub idle_timeout_secs: u64,
    pub log_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            port: DEFAULT_PORT,
            max_users: DEFAULT_MAX_USERS,
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
            max_name_len: DEFAULT_MAX_NAME_LEN,
            max_body_len: DEFAULT_MAX_BODY_LEN,
            idle_timeout_secs: DEFAULT_IDLE_TIMEOUT,
            log_dir: None,
        }
    }
}

/// Flags accepted by `pigeonhole serve`. Anything given here wins over the config file.
#[derive(Args, Debug, Default, Clone)]
pub struct ServeArgs {
    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to bind, e.g. 127.0.0.1
    #[arg(short, long)]
    pub bind: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Directory for a daily rolling log file
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Seconds a connection may stay silent before it is dropped
    #[arg(long)]
    pub idle_timeout: Option<u64>,
}

impl Config {
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(text).map_err(|e| RelayError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        info!("Loading config from {}", path.display());
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn from_args(args: &ServeArgs) -> Result<Self> {
        let mut config = match &args.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        if let Some(bind) = &args.bind {
            config.bind = bind.clone();
        }
        if let Some(port) = args.port {
            config.port = port;
        }
        if let Some(dir) = &args.log_dir {
            config.log_dir = Some(dir.clone());
        }
        if let Some(secs) = args.idle_timeout {
            config.idle_timeout_secs = secs;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_users == 0 {
            return Err(RelayError::InvalidConfig("max_users must be at least 1".into()));
        }
        if self.mailbox_capacity == 0 {
            return Err(RelayError::InvalidConfig(
                "mailbox_capacity must be at least 1".into(),
            ));
        }
        for (field, len) in [
            ("max_name_len", self.max_name_len),
            ("max_body_len", self.max_body_len),
        ] {
            if len == 0 || len > MAX_FRAME_LEN {
                return Err(RelayError::InvalidConfig(format!(
                    "{} must be between 1 and {}",
                    field, MAX_FRAME_LEN
                )));
            }
        }
        //A drained message line must fit one frame or it blocks its mailbox for good
        let line =
            self.max_name_len + self.max_body_len + MAX_TIMESTAMP_LEN + MESSAGE_LINE_OVERHEAD;
        if line > MAX_FRAME_LEN {
            return Err(RelayError::InvalidConfig(format!(
                "max_name_len + max_body_len allows {} byte message lines, limit is {}",
                line, MAX_FRAME_LEN
            )));
        }
        self.listen_addr()?;
        Ok(())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.bind, self.port)
            .parse()
            .map_err(|_| RelayError::InvalidConfig(format!("bad bind address {:?}", self.bind)))
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
    }
}
