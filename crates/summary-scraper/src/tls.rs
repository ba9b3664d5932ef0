//! TLS client configuration for talking to the kubelet.
//!
//! The configuration is built once at startup and handed to every
//! [`HttpsClient`](crate::client::HttpsClient) that needs it. Nothing here
//! touches process-wide state.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustls::crypto::CryptoProvider;
use rustls::{ClientConfig, RootCertStore};
use thiserror::Error;
use tracing::{info, warn};

/// Errors building the TLS client configuration.
#[derive(Debug, Error)]
pub enum TlsError {
    #[error("failed to read CA bundle {path}: {source}")]
    ReadCa {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no certificates found in CA bundle {0}")]
    NoCertificates(PathBuf),

    #[error("invalid CA certificate: {0}")]
    InvalidCertificate(String),

    #[error("tls protocol version error: {0}")]
    Protocol(String),
}

/// Operator-facing TLS settings.
#[derive(Debug, Clone, Default)]
pub struct TlsOptions {
    /// PEM bundle used as the trust root. Falls back to the Mozilla roots.
    pub ca_file: Option<PathBuf>,
    /// Skip server certificate verification entirely.
    pub insecure: bool,
}

/// Build an immutable `rustls` client configuration from `options`.
///
/// A CA bundle is loaded whenever one is given, including in insecure
/// mode, so a bad path is reported at startup.
pub fn client_config(options: &TlsOptions) -> Result<Arc<ClientConfig>, TlsError> {
    let roots = match &options.ca_file {
        Some(path) => load_ca_bundle(path)?,
        None => {
            let mut roots = RootCertStore::empty();
            roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
            roots
        }
    };

    let builder = ClientConfig::builder_with_provider(provider())
        .with_safe_default_protocol_versions()
        .map_err(|e| TlsError::Protocol(e.to_string()))?;

    let config = if options.insecure {
        warn!("using insecure tls, server certificates are not verified");
        builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(danger::NoVerifier::new(provider())))
            .with_no_client_auth()
    } else {
        builder.with_root_certificates(roots).with_no_client_auth()
    };

    Ok(Arc::new(config))
}

/// Load every certificate from a PEM bundle into a root store.
pub fn load_ca_bundle(path: &Path) -> Result<RootCertStore, TlsError> {
    let read_err = |source| TlsError::ReadCa {
        path: path.to_path_buf(),
        source,
    };

    let pem = std::fs::read(path).map_err(read_err)?;
    let mut roots = RootCertStore::empty();
    for cert in rustls_pemfile::certs(&mut pem.as_slice()) {
        let cert = cert.map_err(read_err)?;
        roots
            .add(cert)
            .map_err(|e| TlsError::InvalidCertificate(e.to_string()))?;
    }

    if roots.is_empty() {
        return Err(TlsError::NoCertificates(path.to_path_buf()));
    }

    info!(path = %path.display(), certificates = roots.len(), "loaded CA bundle");
    Ok(roots)
}

fn provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

// ── Certificate verification bypass (--insecure) ───────────────────

mod danger {
    use std::sync::Arc;

    use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
    use rustls::crypto::CryptoProvider;
    use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
    use rustls::{DigitallySignedStruct, Error, SignatureScheme};

    #[derive(Debug)]
    pub struct NoVerifier {
        provider: Arc<CryptoProvider>,
    }

    impl NoVerifier {
        pub fn new(provider: Arc<CryptoProvider>) -> Self {
            Self { provider }
        }
    }

    impl ServerCertVerifier for NoVerifier {
        fn verify_server_cert(
            &self,
            _end_entity: &CertificateDer<'_>,
            _intermediates: &[CertificateDer<'_>],
            _server_name: &ServerName<'_>,
            _ocsp_response: &[u8],
            _now: UnixTime,
        ) -> Result<ServerCertVerified, Error> {
            Ok(ServerCertVerified::assertion())
        }

        fn verify_tls12_signature(
            &self,
            _message: &[u8],
            _cert: &CertificateDer<'_>,
            _dss: &DigitallySignedStruct,
        ) -> Result<HandshakeSignatureValid, Error> {
            Ok(HandshakeSignatureValid::assertion())
        }

        fn verify_tls13_signature(
            &self,
            _message: &[u8],
            _cert: &CertificateDer<'_>,
            _dss: &DigitallySignedStruct,
        ) -> Result<HandshakeSignatureValid, Error> {
            Ok(HandshakeSignatureValid::assertion())
        }

        fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
            self.provider
                .signature_verification_algorithms
                .supported_schemes()
        }
    }
}
