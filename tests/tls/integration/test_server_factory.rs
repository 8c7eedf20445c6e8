use std::fs;

use rustls::ProtocolVersion;
use zts_identity::config::{PasswordSetting, TlsSettings};
use zts_identity::errors::TlsError;
use zts_identity::secrets::FileSecretResolver;
use zts_identity::tls::build_server_context_factory;

use crate::tls::support::{handshake, keystore_settings, peer_subject, TestPki};

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

struct Stores {
    pki: TestPki,
    settings: TlsSettings,
}

fn stores() -> Stores {
    let pki = TestPki::new().expect("pki");
    let leaf = pki.issue("zts.athenz").expect("leaf");
    let key_store = pki.write_pkcs12_keystore(&leaf, "keystore.p12", "changeit").expect("keystore");
    let trust_store = pki.write_pkcs12_truststore("truststore.p12", "trustit").expect("truststore");
    let settings = keystore_settings(&key_store, "changeit", &trust_store, "trustit");
    Stores { pki, settings }
}

#[tokio::test]
async fn server_without_client_auth_accepts_anonymous_clients() {
    let Stores { pki, settings } = stores();
    let factory = build_server_context_factory(&settings, None, None);
    assert!(!factory.want_client_auth());

    let config = factory.build_server_config().expect("server config");
    let (server, client) = handshake(config, pki.anonymous_client().expect("client")).await;
    let server = server.expect("server side");
    assert!(server.peer_certificates.is_empty());
    assert!(peer_subject(&client.expect("client side")).expect("server cert").contains("zts.athenz"));
}

#[tokio::test]
async fn want_client_auth_makes_certificates_optional() {
    let Stores { pki, mut settings } = stores();
    settings.want_client_auth = true;
    let factory = build_server_context_factory(&settings, None, None);
    let config = factory.build_server_config().expect("server config");

    let (server, client) = handshake(config.clone(), pki.anonymous_client().expect("client")).await;
    assert!(server.expect("anonymous client allowed").peer_certificates.is_empty());
    assert!(client.is_ok());

    let presented = pki.issue("client.sports").expect("client leaf");
    let (server, client) = handshake(config, pki.authenticated_client(&presented).expect("client")).await;
    let server = server.expect("authenticated client allowed");
    assert!(peer_subject(&server).expect("client cert").contains("client.sports"));
    assert!(client.is_ok());
}

#[tokio::test]
async fn excluded_protocol_is_not_negotiated() {
    let Stores { pki, mut settings } = stores();
    settings.excluded_protocols = strings(&["SSLv3", "TLSv1.3"]);
    let factory = build_server_context_factory(&settings, None, None);

    let (server, _) =
        handshake(factory.build_server_config().expect("config"), pki.anonymous_client().expect("client")).await;
    assert_eq!(server.expect("server side").protocol, Some(ProtocolVersion::TLSv1_2));
}

#[tokio::test]
async fn client_protocol_allow_list_restricts_versions() {
    let Stores { pki, settings } = stores();
    let allow = strings(&["TLSv1.3"]);
    let factory = build_server_context_factory(&settings, Some(allow.as_slice()), None);
    assert_eq!(factory.included_protocols(), Some(allow.as_slice()));

    let (server, _) =
        handshake(factory.build_server_config().expect("config"), pki.anonymous_client().expect("client")).await;
    assert_eq!(server.expect("server side").protocol, Some(ProtocolVersion::TLSv1_3));
}

#[test]
fn allow_list_fully_excluded_fails_to_build() {
    let Stores { pki: _pki, mut settings } = stores();
    settings.excluded_protocols = strings(&["TLSv1.3"]);
    let allow = strings(&["TLSv1.3"]);
    let factory = build_server_context_factory(&settings, Some(allow.as_slice()), None);

    let err = factory.build_server_config().expect_err("nothing left to negotiate");
    assert!(matches!(err, TlsError::NoUsableProtocols));
}

#[test]
fn excluding_every_cipher_suite_fails_to_build() {
    let Stores { pki: _pki, mut settings } = stores();
    settings.excluded_cipher_suites = rustls::crypto::ring::default_provider()
        .cipher_suites
        .iter()
        .map(|suite| format!("{:?}", suite.suite()))
        .collect();
    let factory = build_server_context_factory(&settings, None, None);

    let err = factory.build_server_config().expect_err("no cipher suites");
    assert!(matches!(err, TlsError::NoUsableCipherSuites));
}

#[test]
fn keystore_password_resolved_through_secret_backend() {
    let Stores { pki, mut settings } = stores();
    let secret_dir = pki.path("secrets");
    fs::create_dir(&secret_dir).expect("secret dir");
    fs::write(secret_dir.join("zts_keystore"), "changeit\n").expect("write secret");

    settings.key_store.password = PasswordSetting::new("placeholder", Some("zts_keystore"));
    let without_backend = build_server_context_factory(&settings, None, None);
    assert!(matches!(without_backend.build_server_config(), Err(TlsError::StoreLoadError { .. })));

    let resolver = FileSecretResolver::new(&secret_dir);
    let factory = build_server_context_factory(&settings, None, Some(&resolver));
    assert_eq!(factory.key_store_password().expect("password").expose_secret(), "changeit");
    assert!(factory.build_server_config().is_ok());
}
