use std::path::PathBuf;

use thiserror::Error;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("AMORA_JWT_SECRET is unset or still a placeholder")]
    MissingSecret,

    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub token_days: i64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let jwt_secret = lookup("AMORA_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            return Err(ConfigError::MissingSecret);
        }

        Ok(Self {
            jwt_secret,
            db_path: lookup("AMORA_DB_PATH").unwrap_or_else(|| "amora.db".into()).into(),
            host: lookup("AMORA_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_var(&lookup, "AMORA_PORT", 5000)?,
            token_days: parse_var(&lookup, "AMORA_TOKEN_DAYS", 7)?,
        })
    }

    /// Bind target for `TcpListener::bind`. The host may be a name such as
    /// `localhost`; it is resolved at bind time.
    pub fn bind_target(&self) -> (&str, u16) {
        (self.host.as_str(), self.port)
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(name) {
        Some(value) => value.parse().map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_only_secret_is_set() {
        let cfg = config(&[("AMORA_JWT_SECRET", "s3cret")]).unwrap();
        assert_eq!(cfg.port, 5000);
        assert_eq!(cfg.token_days, 7);
        assert_eq!(cfg.db_path, PathBuf::from("amora.db"));
        assert_eq!(cfg.bind_target(), ("0.0.0.0", 5000));
    }

    #[tokio::test]
    async fn hostname_binds() {
        let cfg = config(&[
            ("AMORA_JWT_SECRET", "s3cret"),
            ("AMORA_HOST", "localhost"),
            ("AMORA_PORT", "0"),
        ])
        .unwrap();

        let listener = tokio::net::TcpListener::bind(cfg.bind_target()).await.unwrap();
        assert!(listener.local_addr().unwrap().ip().is_loopback());
    }

    #[test]
    fn placeholder_secret_is_rejected() {
        assert!(matches!(config(&[]), Err(ConfigError::MissingSecret)));
        assert!(matches!(
            config(&[("AMORA_JWT_SECRET", "dev-secret-change-me")]),
            Err(ConfigError::MissingSecret)
        ));
    }

    #[test]
    fn bad_port_is_reported() {
        let err = config(&[("AMORA_JWT_SECRET", "s3cret"), ("AMORA_PORT", "http")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "AMORA_PORT", .. }));
    }
}
