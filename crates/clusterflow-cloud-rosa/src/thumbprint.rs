//! OIDC issuer thumbprint resolution
//!
//! The thumbprint is the SHA-1 of the trust anchor presented by the issuer's
//! TLS endpoint. It is what IAM expects when registering the issuer as an
//! OpenID Connect provider.

use crate::error::{ClusterError, Result};
use async_trait::async_trait;
use rustls::pki_types::{CertificateDer, ServerName};
use rustls::{ClientConfig, ClientConnection, RootCertStore};
use sha1::{Digest, Sha1};
use std::net::{IpAddr, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;
use url::{Host, Url};

const TLS_PORT: u16 = 443;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[async_trait]
pub trait ThumbprintResolver: Send + Sync {
    /// Returns the hex-encoded SHA-1 of the issuer's trust anchor
    async fn resolve(&self, issuer_url: &str) -> Result<String>;
}

/// Resolves thumbprints with a TLS handshake against the issuer host
#[derive(Debug, Clone)]
pub struct TlsThumbprintResolver {
    timeout: Duration,
}

impl Default for TlsThumbprintResolver {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl TlsThumbprintResolver {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ThumbprintResolver for TlsThumbprintResolver {
    async fn resolve(&self, issuer_url: &str) -> Result<String> {
        let fail = |reason: String| ClusterError::TrustResolution {
            url: issuer_url.to_string(),
            reason,
        };

        let host = issuer_host(issuer_url).map_err(fail)?;
        let timeout = self.timeout;

        tracing::debug!("Fetching certificate chain from {}:{}", host, TLS_PORT);
        let task = tokio::task::spawn_blocking(move || {
            let chain = fetch_chain(&host, timeout)?;
            let anchor = select_trust_anchor(&chain)?;
            Ok::<_, String>(thumbprint(anchor))
        });

        match task.await {
            Ok(result) => result.map_err(fail),
            Err(join) => Err(fail(format!("resolver task failed: {join}"))),
        }
    }
}

fn issuer_host(issuer_url: &str) -> std::result::Result<Host<String>, String> {
    let parsed = Url::parse(issuer_url).map_err(|e| e.to_string())?;
    parsed
        .host()
        .map(|host| host.to_owned())
        .ok_or_else(|| "issuer URL has no host".to_string())
}

/// Name checked against the certificate; IP literals are not DNS names
fn server_name(host: &Host<String>) -> std::result::Result<ServerName<'static>, String> {
    match host {
        Host::Domain(domain) => ServerName::try_from(domain.clone()).map_err(|e| e.to_string()),
        Host::Ipv4(ip) => Ok(ServerName::from(IpAddr::V4(*ip))),
        Host::Ipv6(ip) => Ok(ServerName::from(IpAddr::V6(*ip))),
    }
}

fn socket_addr(host: &Host<String>) -> std::result::Result<SocketAddr, String> {
    match host {
        Host::Domain(domain) => (domain.as_str(), TLS_PORT)
            .to_socket_addrs()
            .map_err(|e| e.to_string())?
            .next()
            .ok_or_else(|| format!("no address found for {domain}")),
        Host::Ipv4(ip) => Ok(SocketAddr::from((*ip, TLS_PORT))),
        Host::Ipv6(ip) => Ok(SocketAddr::from((*ip, TLS_PORT))),
    }
}

fn client_config() -> std::result::Result<ClientConfig, String> {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| e.to_string())?
        .with_root_certificates(roots)
        .with_no_client_auth();
    Ok(config)
}

/// Completes a TLS handshake and returns the peer chain, leaf first
fn fetch_chain(
    host: &Host<String>,
    timeout: Duration,
) -> std::result::Result<Vec<CertificateDer<'static>>, String> {
    let mut conn = ClientConnection::new(Arc::new(client_config()?), server_name(host)?)
        .map_err(|e| e.to_string())?;

    let addr = socket_addr(host)?;
    let mut sock = TcpStream::connect_timeout(&addr, timeout).map_err(|e| e.to_string())?;
    sock.set_read_timeout(Some(timeout))
        .map_err(|e| e.to_string())?;
    sock.set_write_timeout(Some(timeout))
        .map_err(|e| e.to_string())?;

    while conn.is_handshaking() {
        conn.complete_io(&mut sock).map_err(|e| e.to_string())?;
    }

    conn.peer_certificates()
        .map(<[CertificateDer<'static>]>::to_vec)
        .ok_or_else(|| "peer presented no certificates".to_string())
}

/// Picks the first self-signed CA in the chain, or the last certificate
pub fn select_trust_anchor<'a>(
    chain: &'a [CertificateDer<'static>],
) -> std::result::Result<&'a CertificateDer<'static>, String> {
    let self_signed_ca = chain.iter().find(|der| {
        match x509_parser::parse_x509_certificate(der) {
            Ok((_, cert)) => cert.is_ca() && cert.issuer().as_raw() == cert.subject().as_raw(),
            Err(e) => {
                tracing::debug!("Skipping unparseable certificate: {}", e);
                false
            }
        }
    });

    self_signed_ca
        .or_else(|| chain.last())
        .ok_or_else(|| "empty certificate chain".to_string())
}

/// Hex-encoded SHA-1 of a DER certificate
pub fn thumbprint(der: &CertificateDer<'_>) -> String {
    hex::encode(Sha1::digest(der))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcgen::{
        BasicConstraints, Certificate, CertificateParams, DistinguishedName, DnType, IsCa,
        Issuer, KeyPair,
    };

    fn distinguished_name(common_name: &str) -> DistinguishedName {
        let mut name = DistinguishedName::new();
        name.push(DnType::CommonName, common_name);
        name
    }

    fn ca_params(common_name: &str) -> CertificateParams {
        let mut params = CertificateParams::default();
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.distinguished_name = distinguished_name(common_name);
        params
    }

    fn root_ca() -> (Certificate, Issuer<'static, KeyPair>) {
        let key = KeyPair::generate().unwrap();
        let params = ca_params("Clusterflow Test Root");
        let cert = params.self_signed(&key).unwrap();
        (cert, Issuer::new(params, key))
    }

    fn intermediate_ca(parent: &Issuer<'_, KeyPair>) -> (Certificate, Issuer<'static, KeyPair>) {
        let key = KeyPair::generate().unwrap();
        let params = ca_params("Clusterflow Test Intermediate");
        let cert = params.signed_by(&key, parent).unwrap();
        (cert, Issuer::new(params, key))
    }

    fn leaf_cert(parent: &Issuer<'_, KeyPair>) -> Certificate {
        let key = KeyPair::generate().unwrap();
        let mut params = CertificateParams::new(vec!["oidc.example.com".to_string()]).unwrap();
        params.distinguished_name = distinguished_name("oidc.example.com");
        params.is_ca = IsCa::NoCa;
        params.signed_by(&key, parent).unwrap()
    }

    #[test]
    fn test_selects_self_signed_ca() {
        let (root, root_issuer) = root_ca();
        let leaf = leaf_cert(&root_issuer);
        let chain = vec![leaf.der().clone(), root.der().clone()];

        let anchor = select_trust_anchor(&chain).unwrap();
        assert_eq!(anchor, root.der());
        assert_eq!(thumbprint(anchor), thumbprint(root.der()));
        assert_ne!(thumbprint(anchor), thumbprint(leaf.der()));
    }

    #[test]
    fn test_falls_back_to_last_certificate() {
        let (_root, root_issuer) = root_ca();
        let (intermediate, intermediate_issuer) = intermediate_ca(&root_issuer);
        let leaf = leaf_cert(&intermediate_issuer);
        let chain = vec![leaf.der().clone(), intermediate.der().clone()];

        let anchor = select_trust_anchor(&chain).unwrap();
        assert_eq!(anchor, intermediate.der());
    }

    #[test]
    fn test_empty_chain() {
        assert!(select_trust_anchor(&[]).is_err());
    }

    #[test]
    fn test_thumbprint_format() {
        let (root, _) = root_ca();
        let hash = thumbprint(root.der());
        assert_eq!(hash.len(), 40);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_ipv6_issuer_host() {
        let host = issuer_host("https://[::1]/oidc").unwrap();
        assert_eq!(host, Host::<String>::Ipv6(std::net::Ipv6Addr::LOCALHOST));
        assert!(matches!(server_name(&host).unwrap(), ServerName::IpAddress(_)));
        assert_eq!(socket_addr(&host).unwrap().to_string(), "[::1]:443");
    }

    #[test]
    fn test_ipv4_and_domain_issuer_hosts() {
        let host = issuer_host("https://127.0.0.1/oidc").unwrap();
        assert!(matches!(server_name(&host).unwrap(), ServerName::IpAddress(_)));
        assert_eq!(socket_addr(&host).unwrap().to_string(), "127.0.0.1:443");

        let host = issuer_host("https://rh-oidc.s3.us-east-1.amazonaws.com/abc").unwrap();
        assert_eq!(
            host,
            Host::Domain("rh-oidc.s3.us-east-1.amazonaws.com".to_string())
        );
        assert!(matches!(server_name(&host).unwrap(), ServerName::DnsName(_)));
    }

    #[tokio::test]
    async fn test_invalid_issuer_url_is_an_error() {
        let resolver = TlsThumbprintResolver::new();
        let err = resolver.resolve("not a url").await.unwrap_err();
        assert!(matches!(err, ClusterError::TrustResolution { .. }));
        assert_eq!(err.headline(), "Can't get thumbprint");
    }
}
