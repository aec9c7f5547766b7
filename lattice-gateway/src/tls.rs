//! TLS serving.
//!
//! Loads the operator-provided PEM certificate and key, then runs a manual
//! accept loop: TCP accept, TLS handshake under a timeout, and a spawned
//! HTTP connection per client. Shutdown stops the accept loop and drains
//! in-flight connections.

use std::path::Path;
use std::sync::Arc;

use axum::Router;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use hyper_util::service::TowerToHyperService;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::ServerConfig;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tokio_rustls::TlsAcceptor;

/// Connections that don't complete the TLS handshake within this time are
/// dropped.
const TLS_HANDSHAKE_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

/// Errors building the TLS configuration.
#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("could not read {path}: {source}")]
    Read {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
    #[error("no certificates found in {0}")]
    EmptyCertChain(std::path::PathBuf),
    #[error("no private key found in {0}")]
    NoPrivateKey(std::path::PathBuf),
    #[error("tls config rejected: {0}")]
    Config(#[from] rustls::Error),
}

/// Build a rustls server config from PEM files on disk.
pub fn server_config(crt_path: &Path, key_path: &Path) -> Result<Arc<ServerConfig>, TlsError> {
    let certs = read_certs(crt_path)?;
    let key = read_private_key(key_path)?;

    let config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)?;

    Ok(Arc::new(config))
}

fn read_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let pem = std::fs::read(path).map_err(|source| TlsError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let certs: Vec<_> = rustls_pemfile::certs(&mut pem.as_slice())
        .collect::<Result<_, _>>()
        .map_err(|source| TlsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    if certs.is_empty() {
        return Err(TlsError::EmptyCertChain(path.to_path_buf()));
    }
    Ok(certs)
}

fn read_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, TlsError> {
    let pem = std::fs::read(path).map_err(|source| TlsError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    rustls_pemfile::private_key(&mut pem.as_slice())
        .map_err(|source| TlsError::Read {
            path: path.to_path_buf(),
            source,
        })?
        .ok_or_else(|| TlsError::NoPrivateKey(path.to_path_buf()))
}

/// Serve the router over TLS until `shutdown` resolves.
///
/// New connections stop being accepted on shutdown; connections already
/// handed to a worker run to completion before this returns.
pub async fn serve(
    listener: TcpListener,
    config: Arc<ServerConfig>,
    app: Router,
    shutdown: impl Future<Output = ()>,
) -> std::io::Result<()> {
    let acceptor = TlsAcceptor::from(config);
    let mut connections = JoinSet::new();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("shutdown signal received, stopping accept loop");
                break;
            }
            result = listener.accept() => {
                let (tcp_stream, peer_addr) = match result {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        tracing::warn!(error = %e, "TCP accept failed");
                        continue;
                    }
                };

                let acceptor = acceptor.clone();
                let service = TowerToHyperService::new(app.clone());
                connections.spawn(async move {
                    match tokio::time::timeout(TLS_HANDSHAKE_TIMEOUT, acceptor.accept(tcp_stream)).await {
                        Ok(Ok(tls_stream)) => {
                            tracing::debug!(peer = %peer_addr, "TLS handshake successful");
                            let result = auto::Builder::new(TokioExecutor::new())
                                .serve_connection_with_upgrades(TokioIo::new(tls_stream), service)
                                .await;
                            if let Err(e) = result {
                                tracing::debug!(peer = %peer_addr, error = %e, "connection closed with error");
                            }
                        }
                        Ok(Err(e)) => {
                            tracing::warn!(peer = %peer_addr, error = %e, "TLS handshake failed");
                        }
                        Err(_) => {
                            tracing::warn!(peer = %peer_addr, timeout = ?TLS_HANDSHAKE_TIMEOUT, "TLS handshake timed out");
                        }
                    }
                });
            }
        }
    }

    // Drain in-flight connections before returning.
    while connections.join_next().await.is_some() {}
    tracing::info!("all connections drained, server stopped");
    Ok(())
}
