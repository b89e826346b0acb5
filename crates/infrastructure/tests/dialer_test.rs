use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use fronting_domain::Masquerade;
use fronting_infrastructure::dialer::{DialFault, Dialer};
use fronting_infrastructure::TlsConfigCache;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

fn self_signed_acceptor() -> TlsAcceptor {
    let rcgen::CertifiedKey { cert, signing_key } =
        rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).expect("self-signed cert");
    let cert_der = cert.der().clone();
    let key_der = rustls::pki_types::PrivateKeyDer::Pkcs8(signing_key.serialize_der().into());

    let config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(vec![cert_der], key_der)
        .expect("server config");

    TlsAcceptor::from(Arc::new(config))
}

/// Dialing a masquerade whose certificate isn't signed by a public CA must
/// classify as a permanent fault — the pool should never retry it.
#[tokio::test]
async fn dial_against_self_signed_listener_is_a_permanent_fault() {
    let listener = TcpListener::bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0))
        .await
        .expect("bind listener");
    let local_addr = listener.local_addr().unwrap();
    let acceptor = self_signed_acceptor();

    tokio::spawn(async move {
        if let Ok((stream, _)) = listener.accept().await {
            let _ = acceptor.accept(stream).await;
        }
    });

    let tls_cache = Arc::new(TlsConfigCache::new());
    let dialer = Dialer::new(tls_cache, Duration::from_secs(2), Duration::from_secs(30))
        .with_port(local_addr.port());

    let masquerade = Masquerade::new("localhost", local_addr.ip());

    let result = dialer.dial(&masquerade).await;
    match result {
        Err(DialFault::Permanent(_)) => {}
        other => panic!("expected a permanent fault, got {other:?}"),
    }
}

/// A connection nobody answers (closed listening socket) must classify as
/// transient, so the masquerade gets another chance later.
#[tokio::test]
async fn dial_against_closed_port_is_transient() {
    let listener = TcpListener::bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0))
        .await
        .expect("bind listener");
    let local_addr = listener.local_addr().unwrap();
    drop(listener);

    let tls_cache = Arc::new(TlsConfigCache::new());
    let dialer = Dialer::new(tls_cache, Duration::from_secs(2), Duration::from_secs(30))
        .with_port(local_addr.port());

    let masquerade = Masquerade::new("localhost", local_addr.ip());

    let result = dialer.dial(&masquerade).await;
    match result {
        Err(DialFault::Transient(_)) => {}
        other => panic!("expected a transient fault, got {other:?}"),
    }
}
