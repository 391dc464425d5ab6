//! Server settings read from the environment.

use std::{
    net::{Ipv4Addr, SocketAddr},
    time::Duration,
};

use pledge_api::{DEFAULT_STORE_URL, STORE_URL_ENV};
use pledge_util::{ConfigError, env_var_trimmed, parse_env_opt, parse_env_or};

pub const BIND_ENV: &str = "PLEDGE_BIND";
pub const STORE_MODE_ENV: &str = "PLEDGE_STORE_MODE";
pub const POLL_INTERVAL_ENV: &str = "PLEDGE_POLL_INTERVAL_MS";
pub const JOB_ID_ENV: &str = "JOB_ID";

const DEFAULT_BIND: SocketAddr = SocketAddr::new(std::net::IpAddr::V4(Ipv4Addr::LOCALHOST), 8000);
const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Where durable promises live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreMode {
    /// The external promise store at this base URL.
    Remote(String),
    /// In-process store; invocations do not survive a restart.
    Local,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    pub bind_address: SocketAddr,
    pub store: StoreMode,
    pub poll_interval: Duration,
    /// Databricks job triggered by each invocation.
    pub job_id: i64,
}

impl ServerSettings {
    /// Read settings from `PLEDGE_BIND`, `PLEDGE_STORE_MODE`, `PLEDGE_STORE_URL`,
    /// `PLEDGE_POLL_INTERVAL_MS` and `JOB_ID`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let bind_address = parse_env_or(BIND_ENV, DEFAULT_BIND)?;
        let store = match env_var_trimmed(STORE_MODE_ENV).map(|mode| mode.to_ascii_lowercase()).as_deref() {
            None | Some("remote") => StoreMode::Remote(env_var_trimmed(STORE_URL_ENV).unwrap_or_else(|| DEFAULT_STORE_URL.to_string())),
            Some("local") => StoreMode::Local,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: STORE_MODE_ENV.to_string(),
                    value: other.to_string(),
                    reason: "expected 'remote' or 'local'".to_string(),
                });
            }
        };
        let poll_interval = Duration::from_millis(parse_env_or(POLL_INTERVAL_ENV, DEFAULT_POLL_INTERVAL_MS)?);
        let job_id = parse_required_job_id()?;

        Ok(Self {
            bind_address,
            store,
            poll_interval,
            job_id,
        })
    }
}

fn parse_required_job_id() -> Result<i64, ConfigError> {
    parse_env_opt(JOB_ID_ENV)?.ok_or_else(|| ConfigError::Missing(JOB_ID_ENV.to_string()))
}
