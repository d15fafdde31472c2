//! TLS configuration and certificate loading.
//!
//! Certificate validation is mandatory on both sides: the listener presents
//! the configured chain, and backend TLS connections verify against the
//! pinned CA bundle. There is no plaintext downgrade after a failed
//! handshake and no verification-off mode.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::rustls::{ClientConfig, RootCertStore, ServerConfig};
use tokio_rustls::{TlsAcceptor, TlsConnector};

use crate::config::TlsConfig;
use crate::error::StartupError;

/// Build the acceptor for the client-facing listener.
///
/// Invalid certificate material is fatal at startup.
pub fn build_acceptor(config: &TlsConfig) -> Result<TlsAcceptor, StartupError> {
    let certs = load_certs(Path::new(&config.tls_cert_path))?;
    let key = load_key(Path::new(&config.tls_key_path))?;

    let server_config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| StartupError::Tls(format!("certificate/key rejected: {e}")))?;

    Ok(TlsAcceptor::from(Arc::new(server_config)))
}

/// Build the connector used for TLS backend targets, trusting exactly the
/// pinned CA bundle.
pub fn build_connector(ca_bundle: &Path) -> Result<TlsConnector, StartupError> {
    let mut roots = RootCertStore::empty();
    for cert in load_certs(ca_bundle)? {
        roots
            .add(cert)
            .map_err(|e| StartupError::Tls(format!("trusted_ca_bundle rejected: {e}")))?;
    }
    if roots.is_empty() {
        return Err(StartupError::Tls(format!(
            "trusted_ca_bundle {} contains no certificates",
            ca_bundle.display()
        )));
    }

    let client_config = ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();

    Ok(TlsConnector::from(Arc::new(client_config)))
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, StartupError> {
    let file = File::open(path)
        .map_err(|e| StartupError::Tls(format!("cannot read {}: {e}", path.display())))?;
    let certs: Vec<_> = rustls_pemfile::certs(&mut BufReader::new(file))
        .collect::<Result<_, _>>()
        .map_err(|e| StartupError::Tls(format!("bad PEM in {}: {e}", path.display())))?;
    if certs.is_empty() {
        return Err(StartupError::Tls(format!(
            "{} contains no certificates",
            path.display()
        )));
    }
    Ok(certs)
}

fn load_key(path: &Path) -> Result<PrivateKeyDer<'static>, StartupError> {
    let file = File::open(path)
        .map_err(|e| StartupError::Tls(format!("cannot read {}: {e}", path.display())))?;
    rustls_pemfile::private_key(&mut BufReader::new(file))
        .map_err(|e| StartupError::Tls(format!("bad PEM in {}: {e}", path.display())))?
        .ok_or_else(|| {
            StartupError::Tls(format!("{} contains no private key", path.display()))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_cert_file_is_fatal() {
        let config = TlsConfig {
            tls_cert_path: "/nonexistent/cert.pem".into(),
            tls_key_path: "/nonexistent/key.pem".into(),
            trusted_ca_bundle: None,
        };
        assert!(matches!(build_acceptor(&config), Err(StartupError::Tls(_))));
    }

    #[test]
    fn garbage_pem_is_fatal() {
        let mut cert = tempfile::NamedTempFile::new().unwrap();
        write!(cert, "this is not pem").unwrap();
        let mut key = tempfile::NamedTempFile::new().unwrap();
        write!(key, "neither is this").unwrap();

        let config = TlsConfig {
            tls_cert_path: cert.path().display().to_string(),
            tls_key_path: key.path().display().to_string(),
            trusted_ca_bundle: None,
        };
        assert!(matches!(build_acceptor(&config), Err(StartupError::Tls(_))));
    }

    #[test]
    fn empty_ca_bundle_is_fatal() {
        let bundle = tempfile::NamedTempFile::new().unwrap();
        assert!(matches!(
            build_connector(bundle.path()),
            Err(StartupError::Tls(_))
        ));
    }
}
