//! Server configuration, populated from environment variables.

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::ConfigError;

const DEFAULT_BIND: &str = "0.0.0.0:3000";

/// Which revision of the user API to serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApiVersion {
    /// `/users/{id}`, top-level delete, camelCase `createdAt`.
    V1,
    /// YAML document, `/user/{id}` without the creation date.
    V2,
    /// `/user?id=`, `created_at`, delete offered as an embedded relation.
    #[default]
    V3,
}

impl ApiVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiVersion::V1 => "v1",
            ApiVersion::V2 => "v2",
            ApiVersion::V3 => "v3",
        }
    }

    /// Route serving the resource document.
    pub fn document_route(&self) -> &'static str {
        match self {
            ApiVersion::V2 => "/openapi.yml",
            ApiVersion::V1 | ApiVersion::V3 => "/openapi.json",
        }
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApiVersion {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_start_matches(['v', 'V']) {
            "1" => Ok(ApiVersion::V1),
            "2" => Ok(ApiVersion::V2),
            "3" => Ok(ApiVersion::V3),
            _ => Err(ConfigError::UnknownVersion {
                value: s.to_string(),
            }),
        }
    }
}

/// Runtime configuration for the reference backend.
///
/// | Variable | Default | Description |
/// |----------|---------|-------------|
/// | `EVOLVABLE_BIND` | `0.0.0.0:3000` | TCP socket address to listen on |
/// | `EVOLVABLE_DATA` | (bundled seed) | JSON file holding the users |
/// | `EVOLVABLE_API_VERSION` | `v3` | API revision to serve |
/// | `EVOLVABLE_PUBLIC_URL` | derived | Server URL advertised in the document |
/// | `CODESPACE_NAME` | (absent) | Advertise the forwarded workspace URL instead |
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    /// `None` serves the bundled seed users from memory.
    pub data: Option<PathBuf>,
    pub version: ApiVersion,
    /// `None` derives the URL from the bound address.
    pub public_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 3000)),
            data: None,
            version: ApiVersion::default(),
            public_url: None,
        }
    }
}

impl ServerConfig {
    /// Populate config from environment variables, applying defaults where absent.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let raw_bind = lookup("EVOLVABLE_BIND").unwrap_or_else(|| DEFAULT_BIND.into());
        let bind: SocketAddr = raw_bind.parse().map_err(|_| ConfigError::InvalidBind {
            var: "EVOLVABLE_BIND",
            value: raw_bind.clone(),
        })?;

        let version = match lookup("EVOLVABLE_API_VERSION") {
            Some(v) => v.parse()?,
            None => ApiVersion::default(),
        };

        let public_url = lookup("EVOLVABLE_PUBLIC_URL").or_else(|| {
            lookup("CODESPACE_NAME")
                .map(|name| format!("https://{}-{}.app.github.dev", name, bind.port()))
        });

        Ok(Self {
            bind,
            data: lookup("EVOLVABLE_DATA").map(PathBuf::from),
            version,
            public_url,
        })
    }

    /// The server URL to advertise once listening on `local`.
    pub fn public_url_for(&self, local: SocketAddr) -> String {
        if let Some(url) = &self.public_url {
            return url.trim_end_matches('/').to_string();
        }
        if local.ip().is_unspecified() {
            format!("http://localhost:{}", local.port())
        } else {
            format!("http://{}", local)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.bind.port(), 3000);
        assert_eq!(config.version, ApiVersion::V3);
        assert!(config.data.is_none());
        assert!(config.public_url.is_none());
    }

    #[test]
    fn codespace_url() {
        let config = config(&[("CODESPACE_NAME", "fuzzy-space"), ("EVOLVABLE_BIND", "0.0.0.0:8080")]).unwrap();
        assert_eq!(
            config.public_url.as_deref(),
            Some("https://fuzzy-space-8080.app.github.dev")
        );
    }

    #[test]
    fn explicit_public_url_wins() {
        let config = config(&[
            ("CODESPACE_NAME", "fuzzy-space"),
            ("EVOLVABLE_PUBLIC_URL", "https://users.example.org/"),
        ])
        .unwrap();
        let local = SocketAddr::from(([127, 0, 0, 1], 4000));
        assert_eq!(config.public_url_for(local), "https://users.example.org");
    }

    #[test]
    fn derived_public_url() {
        let config = ServerConfig::default();
        assert_eq!(
            config.public_url_for(SocketAddr::from(([0, 0, 0, 0], 3000))),
            "http://localhost:3000"
        );
        assert_eq!(
            config.public_url_for(SocketAddr::from(([127, 0, 0, 1], 4123))),
            "http://127.0.0.1:4123"
        );
    }

    #[test]
    fn invalid_values() {
        assert!(matches!(
            config(&[("EVOLVABLE_BIND", "localhost")]),
            Err(ConfigError::InvalidBind { .. })
        ));
        assert!(matches!(
            config(&[("EVOLVABLE_API_VERSION", "v9")]),
            Err(ConfigError::UnknownVersion { .. })
        ));
    }

    #[test]
    fn version_parsing() {
        assert_eq!("v1".parse::<ApiVersion>().unwrap(), ApiVersion::V1);
        assert_eq!("2".parse::<ApiVersion>().unwrap(), ApiVersion::V2);
        assert_eq!("V3".parse::<ApiVersion>().unwrap(), ApiVersion::V3);
        assert_eq!(ApiVersion::V2.document_route(), "/openapi.yml");
    }
}
