use crate::services::SessionService;
use crate::session::{MatchPolicy, MatchmakerOptions};
use crate::ws::connections::ConnectionManager;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bind_address: String,
    pub stun_servers: Vec<String>,
    pub turn_url: Option<String>,
    pub turn_username: Option<String>,
    pub turn_credential: Option<String>,
    pub match_policy: MatchPolicy,
    /// Seconds a waiter must wait before relaxed pairing applies to it
    pub relax_after_secs: u64,
    /// Unset means no queue timeout
    pub queue_timeout_secs: Option<u64>,
    pub requeue_partner: bool,
    pub sweep_interval_ms: u64,
}

#[derive(Clone, Debug)]
pub struct TurnServer {
    pub url: String,
    pub username: String,
    pub credential: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            stun_servers: vec![
                "stun:stun.l.google.com:19302".to_string(),
                "stun:stun1.l.google.com:19302".to_string(),
            ],
            turn_url: None,
            turn_username: None,
            turn_credential: None,
            match_policy: MatchPolicy::Strict,
            relax_after_secs: 30,
            queue_timeout_secs: None,
            requeue_partner: false,
            sweep_interval_ms: 1000,
        }
    }
}

impl Config {
    /// Load from `TANDEM_*` environment variables, after reading `.env` if present
    pub fn load() -> anyhow::Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("Loaded environment from {}", path.display());
        }

        let settings = ::config::Config::builder()
            .add_source(
                ::config::Environment::with_prefix("TANDEM")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("stun_servers"),
            )
            .build()?;

        let config: Config = settings.try_deserialize()?;

        if config.turn_url.is_some()
            && (config.turn_username.is_none() || config.turn_credential.is_none())
        {
            tracing::warn!("TANDEM_TURN_URL is set without username/credential, ignoring it");
        }

        Ok(config)
    }

    pub fn turn_servers(&self) -> Vec<TurnServer> {
        match (&self.turn_url, &self.turn_username, &self.turn_credential) {
            (Some(url), Some(username), Some(credential)) => vec![TurnServer {
                url: url.clone(),
                username: username.clone(),
                credential: credential.clone(),
            }],
            _ => vec![],
        }
    }

    pub fn matchmaker_options(&self) -> MatchmakerOptions {
        MatchmakerOptions {
            policy: self.match_policy,
            relax_after: secs(self.relax_after_secs),
            queue_timeout: self.queue_timeout_secs.map(secs),
            requeue_partner: self.requeue_partner,
        }
    }
}

fn secs(value: u64) -> chrono::Duration {
    // chrono panics past i64::MAX milliseconds
    let value = value.min(i64::MAX as u64 / 1000) as i64;
    chrono::Duration::seconds(value)
}

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub sessions: SessionService,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let connections = Arc::new(ConnectionManager::new());
        let sessions = SessionService::new(config.matchmaker_options(), connections);

        Self { config, sessions }
    }
}
