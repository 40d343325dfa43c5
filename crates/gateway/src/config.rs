//! Environment-driven configuration.

use std::env;
use std::time::Duration;

use crate::error::{GatewayError, Result};
use crate::tweets::TweetFilter;

const DEFAULT_LISTEN: &str = "0.0.0.0:8080";
const DEFAULT_METRICS_PORT: u16 = 9090;
const DEFAULT_TICK_SECS: u64 = 5;
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_TWEET_EXPIRE_SECS: u64 = 45;

/// Runtime configuration, read from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the scorebot API.
    pub scorebot: String,
    /// Secondary assets URL prefix for relative team logos. Defaults to
    /// the scorebot URL.
    pub assets: String,
    /// Address and port for the client-facing listener.
    pub listen: String,
    /// Port for the Prometheus exporter.
    pub metrics_port: u16,
    /// Poll interval against the scorebot API.
    pub tick: Duration,
    /// Request timeout; also bounds one full tick.
    pub timeout: Duration,
    /// How long a pushed tweet stays on the board.
    pub tweet_expire: Duration,
    /// Tweet filter lists, comma-separated in the environment.
    pub tweet_filter: TweetFilter,
}

// An empty entry must never survive: an empty blocked word would match
// every tweet.
fn split(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
        .collect()
}

fn secs(key: &str, default: u64) -> Result<Duration> {
    let v = match env::var(key) {
        Ok(v) => v
            .parse::<u64>()
            .map_err(|_| GatewayError::Config(format!("{key} must be a number")))?,
        Err(_) => default,
    };
    if v == 0 {
        return Err(GatewayError::Config(format!(
            "{key} cannot be less than or equal to zero"
        )));
    }
    Ok(Duration::from_secs(v))
}

impl Config {
    /// Read configuration from the environment, applying defaults and
    /// validating the numeric knobs.
    pub fn from_env() -> Result<Self> {
        let scorebot =
            env::var("SCOREBOT_URL").map_err(|_| GatewayError::Config("SCOREBOT_URL is required".into()))?;
        let assets = env::var("ASSETS_URL").unwrap_or_else(|_| scorebot.clone());
        let listen = env::var("LISTEN").unwrap_or_else(|_| DEFAULT_LISTEN.to_owned());
        let metrics_port = match env::var("METRICS_PORT") {
            Ok(v) => v
                .parse()
                .map_err(|_| GatewayError::Config("METRICS_PORT must be a number".into()))?,
            Err(_) => DEFAULT_METRICS_PORT,
        };
        let filter = TweetFilter {
            languages: split(&env::var("TWEET_LANGUAGES").unwrap_or_default()),
            blocked_users: split(&env::var("TWEET_BLOCKED_USERS").unwrap_or_default()),
            blocked_words: split(&env::var("TWEET_BLOCKED_WORDS").unwrap_or_default()),
            only_users: split(&env::var("TWEET_ONLY_USERS").unwrap_or_default()),
        };
        Ok(Config {
            scorebot,
            assets,
            listen,
            metrics_port,
            tick: secs("TICK", DEFAULT_TICK_SECS)?,
            timeout: secs("TIMEOUT", DEFAULT_TIMEOUT_SECS)?,
            tweet_expire: secs("TWEET_EXPIRE", DEFAULT_TWEET_EXPIRE_SECS)?,
            tweet_filter: filter,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_trims_and_drops_empty() {
        assert!(split("").is_empty());
        assert_eq!(split("a, b ,c"), vec!["a", "b", "c"]);
        assert_eq!(split("a,,b,"), vec!["a", "b"]);
    }
}
