//! WKD serving, avatar serving and HKP submission over the live router.

mod common;

use common::TestServer;
use keyproofs_core::hash;
use std::time::Duration;

const JOE_HASH: &str = "iy9q119eutrkn8s1mk4r39qejnbu3n5q";

#[tokio::test]
async fn wkd_serves_linked_key_by_hash() {
    let server = TestServer::start().await;

    let farm = &server.state.wkd_links;
    std::fs::write(farm.file_path("keys", "joe@example.org"), b"binary key").unwrap();
    farm.link("keys", "joe@example.org").unwrap();

    // Direct method under the configured domain.
    let (status, body) = server
        .get(&format!("/.well-known/openpgpkey/hu/{JOE_HASH}"))
        .await;
    assert_eq!(status, 200);
    assert_eq!(body, "binary key");

    // Advanced method names the domain explicitly.
    let (status, _) = server
        .get(&format!("/.well-known/openpgpkey/hu/example.org/{JOE_HASH}"))
        .await;
    assert_eq!(status, 200);

    // Human-form lookup hashes the address first.
    let (status, _) = server
        .get("/.well-known/openpgpkey/hu/joe@example.org")
        .await;
    assert_eq!(status, 200);
}

#[tokio::test]
async fn wkd_missing_key_is_not_found() {
    let server = TestServer::start().await;
    let (status, _) = server
        .get(&format!("/.well-known/openpgpkey/hu/{JOE_HASH}"))
        .await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn avatar_serves_linked_file() {
    let server = TestServer::start().await;

    let farm = &server.state.avatar_links;
    std::fs::write(farm.file_path("avatar", "Me@Example.org"), b"avatar png").unwrap();
    farm.link("avatar", "Me@Example.org").unwrap();

    let md5 = hash::md5_hex(b"me@example.org");
    let (status, body) = server.get(&format!("/avatar/{md5}")).await;
    assert_eq!(status, 200);
    assert_eq!(body, "avatar png");

    let sha = hash::sha256_hex(b"me@example.org");
    let (status, _) = server.get(&format!("/avatar/{sha}")).await;
    assert_eq!(status, 200);
}

#[tokio::test]
async fn avatar_missing_file_serves_pixel() {
    let server = TestServer::start().await;
    let resp = server
        .http
        .get(format!("{}/bg/0123456789abcdef", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["content-type"], "image/png");
    let bytes = resp.bytes().await.unwrap();
    assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
}

#[tokio::test]
async fn avatar_email_redirects_to_avatar_host() {
    let server = TestServer::start().await;

    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();
    let resp = client
        .get(format!("{}/avatar/Me@Example.org?s=128", server.base_url))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 301);
    let location = resp.headers()["location"].to_str().unwrap();
    let sha = hash::sha256_hex(b"me@example.org");
    // No SRV override in the stub, so the default host applies.
    assert_eq!(
        location,
        format!("https://www.libravatar.org/avatar/{sha}?s=128")
    );
}

#[tokio::test]
async fn unknown_image_kind_is_not_found() {
    let server = TestServer::start().await;
    let (status, _) = server.get("/weird/abcdef").await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn hkp_rejects_unreadable_keytext() {
    let server = TestServer::start().await;

    let resp = server
        .http
        .post(format!("{}/pks/add", server.base_url))
        .form(&[("keytext", "this is not an armored key")])
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 400);
    assert_eq!(resp.text().await.unwrap(), "ERR READ KEY");

    // Nothing was written.
    let keys_dir = server.state.wkd_links.root().join("keys");
    assert_eq!(std::fs::read_dir(keys_dir).unwrap().count(), 0);
}

#[tokio::test]
async fn hkp_rejects_empty_form() {
    let server = TestServer::start().await;

    let resp = server
        .http
        .post(format!("{}/pks/add", server.base_url))
        .form(&[("other", "field")])
        .send()
        .await
        .unwrap();

    assert!(resp.status().is_client_error());
}

#[tokio::test]
async fn requests_respect_http_timeout_layer() {
    // Sanity check that the timeout layer is wired: a normal request is
    // well under the limit and succeeds.
    let server = TestServer::start().await;
    let started = std::time::Instant::now();
    let (status, _) = server.get("/favicon.ico").await;
    assert_eq!(status, 200);
    assert!(started.elapsed() < Duration::from_secs(15));
}
