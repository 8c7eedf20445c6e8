use std::{fs, sync::Arc, time::Duration};

use zts_identity::config::StoreLocation;
use zts_identity::tls::{
    build_client_or_server_context, ContextMode, CredentialRefresher, FileCredentialSource,
};

use crate::tls::support::{file_settings, handshake, peer_subject, TestPki};

fn source_for(pki: &TestPki, stem: &str) -> FileCredentialSource {
    FileCredentialSource {
        cert_path: pki.path(&format!("{stem}.cert.pem")),
        key_path: pki.path(&format!("{stem}.key.pem")),
        trust_store: StoreLocation {
            path: pki.path("ca.pem"),
            store_type: zts_identity::config::StoreType::Pem,
            password: Default::default(),
        },
        trust_store_password: None,
    }
}

#[tokio::test]
async fn file_pair_context_starts_refresher() {
    let pki = TestPki::new().expect("pki");
    let leaf = pki.issue("zts.athenz").expect("leaf");
    let (cert, key) = pki.write_pem_pair(&leaf, "zts").expect("write pair");
    let trust_store = pki.write_pem_truststore("ca.pem").expect("truststore");

    let mut context = build_client_or_server_context(&file_settings(&cert, &key, &trust_store, 3600), None)
        .expect("context builds");
    assert_eq!(context.mode(), ContextMode::FileCertKeyPair);
    assert_eq!(context.generation(), 1);
    assert!(context.is_refreshing());

    let (server, client) = handshake(context.server_config(), context.client_config()).await;
    assert!(peer_subject(&server.expect("server")).expect("client cert").contains("zts.athenz"));
    assert!(client.is_ok());

    context.shutdown().await;
    assert!(!context.is_refreshing());
    assert_eq!(context.generation(), 1);
}

#[tokio::test]
async fn rotation_installs_new_generation() {
    let pki = TestPki::new().expect("pki");
    let first = pki.issue("first.athenz").expect("leaf");
    let (cert, key) = pki.write_pem_pair(&first, "zts").expect("write pair");
    let trust_store = pki.write_pem_truststore("ca.pem").expect("truststore");

    let context = build_client_or_server_context(&file_settings(&cert, &key, &trust_store, 3600), None)
        .expect("context builds");
    let before = context.credentials().snapshot();

    let refresher = CredentialRefresher::new(
        source_for(&pki, "zts"),
        Arc::clone(context.credentials()),
        Duration::from_secs(3600),
    );
    // Same bytes on disk: nothing to install.
    assert_eq!(refresher.refresh_once().await.expect("refresh"), None);

    let second = pki.issue("second.athenz").expect("leaf");
    pki.write_pem_pair(&second, "zts").expect("rewrite pair");
    assert_eq!(refresher.refresh_once().await.expect("refresh"), Some(2));
    assert_eq!(context.generation(), 2);

    // The old snapshot is untouched and still consistent.
    assert_eq!(before.generation(), 1);
    assert!(before.certificate_info().subject.contains("first.athenz"));

    let (server, client) = handshake(context.server_config(), context.client_config()).await;
    let server = server.expect("server");
    assert!(peer_subject(&server).expect("client cert").contains("second.athenz"));
    assert!(peer_subject(&client.expect("client")).expect("server cert").contains("second.athenz"));

    // Handshakes on the old generation still work end to end.
    let (server, client) = handshake(before.server_config(), before.client_config()).await;
    assert!(peer_subject(&server.expect("server")).expect("client cert").contains("first.athenz"));
    assert!(client.is_ok());
}

#[tokio::test]
async fn failed_reload_keeps_current_generation() {
    let pki = TestPki::new().expect("pki");
    let leaf = pki.issue("zts.athenz").expect("leaf");
    let (cert, key) = pki.write_pem_pair(&leaf, "zts").expect("write pair");
    let trust_store = pki.write_pem_truststore("ca.pem").expect("truststore");

    let context = build_client_or_server_context(&file_settings(&cert, &key, &trust_store, 3600), None)
        .expect("context builds");
    let refresher = CredentialRefresher::new(
        source_for(&pki, "zts"),
        Arc::clone(context.credentials()),
        Duration::from_secs(3600),
    );

    // A certificate that no longer matches the key on disk.
    let other = pki.issue("other.athenz").expect("leaf");
    fs::write(&cert, &other.cert_pem).expect("overwrite cert");
    assert!(refresher.refresh_once().await.is_err());
    assert_eq!(context.generation(), 1);

    fs::remove_file(&key).expect("remove key");
    assert!(refresher.refresh_once().await.is_err());
    assert_eq!(context.generation(), 1);

    let (server, client) = handshake(context.server_config(), context.client_config()).await;
    assert!(server.is_ok());
    assert!(client.is_ok());
}

#[tokio::test]
async fn background_refresher_picks_up_new_files() {
    let pki = TestPki::new().expect("pki");
    let first = pki.issue("first.athenz").expect("leaf");
    let (cert, key) = pki.write_pem_pair(&first, "zts").expect("write pair");
    let trust_store = pki.write_pem_truststore("ca.pem").expect("truststore");

    let mut context = build_client_or_server_context(&file_settings(&cert, &key, &trust_store, 1), None)
        .expect("context builds");

    let second = pki.issue("second.athenz").expect("leaf");
    pki.write_pem_pair(&second, "zts").expect("rewrite pair");

    let mut rotated = false;
    for _ in 0..50 {
        if context.generation() >= 2 {
            rotated = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert!(rotated, "refresher did not install new credentials");
    assert!(context.credentials().snapshot().certificate_info().subject.contains("second.athenz"));

    context.shutdown().await;
    let generation = context.generation();

    let third = pki.issue("third.athenz").expect("leaf");
    pki.write_pem_pair(&third, "zts").expect("rewrite pair");
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(context.generation(), generation, "stopped refresher must not rotate");
}

#[tokio::test]
async fn missing_certificate_file_yields_none() {
    let pki = TestPki::new().expect("pki");
    let leaf = pki.issue("zts.athenz").expect("leaf");
    let (_, key) = pki.write_pem_pair(&leaf, "zts").expect("write pair");
    let trust_store = pki.write_pem_truststore("ca.pem").expect("truststore");

    let settings = file_settings(&pki.path("absent.cert.pem"), &key, &trust_store, 3600);
    assert!(build_client_or_server_context(&settings, None).is_none());
}

#[tokio::test]
async fn missing_key_file_yields_none() {
    let pki = TestPki::new().expect("pki");
    let leaf = pki.issue("zts.athenz").expect("leaf");
    let (cert, _) = pki.write_pem_pair(&leaf, "zts").expect("write pair");
    let trust_store = pki.write_pem_truststore("ca.pem").expect("truststore");

    let settings = file_settings(&cert, &pki.path("absent.key.pem"), &trust_store, 3600);
    assert!(build_client_or_server_context(&settings, None).is_none());
}

#[test]
fn file_pair_without_runtime_yields_none() {
    let pki = TestPki::new().expect("pki");
    let leaf = pki.issue("zts.athenz").expect("leaf");
    let (cert, key) = pki.write_pem_pair(&leaf, "zts").expect("write pair");
    let trust_store = pki.write_pem_truststore("ca.pem").expect("truststore");

    assert!(build_client_or_server_context(&file_settings(&cert, &key, &trust_store, 3600), None).is_none());
}
