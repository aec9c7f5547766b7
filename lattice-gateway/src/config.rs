//! Gateway configuration.
//!
//! Loaded from a YAML file. Outside debug mode the gateway refuses to start
//! without a certificate and key; debug mode serves plain HTTP for local
//! development.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Sessions idle out after ten minutes unless configured otherwise.
pub const DEFAULT_SESSION_TIMEOUT_SECS: u64 = 60 * 10;

/// Errors loading or validating the configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yml::Error,
    },
    #[error("invalid bind address {0}")]
    BindAddress(String),
    #[error(
        "could not find a certificate: {0}\n\
         Provide ssl_crt and ssl_key paths, or set debug: true to serve plain HTTP"
    )]
    MissingCert(PathBuf),
    #[error("ssl_crt and ssl_key are required unless debug is enabled")]
    CertsNotConfigured,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Port to listen on.
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Serve plain HTTP and echo failure details to clients.
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub ssl_crt: Option<PathBuf>,
    #[serde(default)]
    pub ssl_key: Option<PathBuf>,
    /// Session idle timeout in seconds.
    #[serde(default = "default_session_timeout")]
    pub session_timeout: u64,
    /// Unix socket the control plane listens on.
    #[serde(default = "default_control_socket")]
    pub control_socket: PathBuf,
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_session_timeout() -> u64 {
    DEFAULT_SESSION_TIMEOUT_SECS
}

fn default_control_socket() -> PathBuf {
    PathBuf::from("/run/lattice/control.sock")
}

impl GatewayConfig {
    /// Load and parse the configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// The socket address to bind.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.bind, self.port)
            .parse()
            .map_err(|_| ConfigError::BindAddress(format!("{}:{}", self.bind, self.port)))
    }

    /// Sanity-check the certificate paths for a non-debug start.
    ///
    /// Returns the verified pair so the caller cannot forget to configure
    /// them before building the TLS acceptor.
    pub fn verify_certs(&self) -> Result<(&Path, &Path), ConfigError> {
        let (crt, key) = match (&self.ssl_crt, &self.ssl_key) {
            (Some(crt), Some(key)) => (crt.as_path(), key.as_path()),
            _ => return Err(ConfigError::CertsNotConfigured),
        };
        for path in [crt, key] {
            if !path.exists() {
                return Err(ConfigError::MissingCert(path.to_path_buf()));
            }
        }
        Ok((crt, key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gateway.yaml");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        (dir, path)
    }

    #[test]
    fn minimal_config_gets_defaults() {
        let (_dir, path) = write_config("port: 8000\n");
        let config = GatewayConfig::load(&path).unwrap();
        assert_eq!(config.port, 8000);
        assert_eq!(config.bind, "0.0.0.0");
        assert!(!config.debug);
        assert_eq!(config.session_timeout, 600);
        assert_eq!(config.control_socket, PathBuf::from("/run/lattice/control.sock"));
    }

    #[test]
    fn full_config_parses() {
        let (_dir, path) = write_config(
            "port: 8000\n\
             bind: 127.0.0.1\n\
             debug: true\n\
             ssl_crt: /etc/pki/tls/certs/localhost.crt\n\
             ssl_key: /etc/pki/tls/private/localhost.key\n\
             session_timeout: 3600\n\
             control_socket: /tmp/control.sock\n",
        );
        let config = GatewayConfig::load(&path).unwrap();
        assert!(config.debug);
        assert_eq!(config.session_timeout, 3600);
        assert_eq!(config.socket_addr().unwrap().to_string(), "127.0.0.1:8000");
    }

    #[test]
    fn missing_port_is_a_parse_error() {
        let (_dir, path) = write_config("debug: true\n");
        assert!(matches!(
            GatewayConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn verify_certs_requires_both_paths() {
        let (_dir, path) = write_config("port: 8000\n");
        let config = GatewayConfig::load(&path).unwrap();
        assert!(matches!(
            config.verify_certs(),
            Err(ConfigError::CertsNotConfigured)
        ));
    }

    #[test]
    fn verify_certs_reports_the_missing_file() {
        let (_dir, path) = write_config(
            "port: 8000\n\
             ssl_crt: /nonexistent/server.crt\n\
             ssl_key: /nonexistent/server.key\n",
        );
        let config = GatewayConfig::load(&path).unwrap();
        match config.verify_certs() {
            Err(ConfigError::MissingCert(missing)) => {
                assert_eq!(missing, PathBuf::from("/nonexistent/server.crt"));
            }
            other => panic!("expected MissingCert, got {other:?}"),
        }
    }

    #[test]
    fn verify_certs_accepts_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        let crt = dir.path().join("server.crt");
        let key = dir.path().join("server.key");
        std::fs::write(&crt, "cert").unwrap();
        std::fs::write(&key, "key").unwrap();

        let (_cfg_dir, path) = write_config(&format!(
            "port: 8000\nssl_crt: {}\nssl_key: {}\n",
            crt.display(),
            key.display()
        ));
        let config = GatewayConfig::load(&path).unwrap();
        assert!(config.verify_certs().is_ok());
    }
}
