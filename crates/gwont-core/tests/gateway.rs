mod common;

use common::*;
use gwont_core::store::{ACCESS_TOKEN_KEY, API_KEY_KEY, AVATAR_HOST_KEY, AVATAR_NAME_KEY};
use gwont_core::{
    AdminApi, AuthError, ExportError, ExportOutcome, MissingCredential, PageCapture, PageExporter,
    PublicApi, SkipReason, UserApi,
};
use serde_json::json;
use wiremock::matchers::{body_json, body_string, header, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

const PAGE_URL: &str = "https://ts2.x1.europe.travian.com/dorf1?a=1&b=2";

fn exporter(h: &Harness) -> PageExporter {
    let admin = AdminApi::new(h.client.clone(), h.session.clone(), true);
    PageExporter::new(admin, h.session.clone(), "travian")
}

fn capture(url: &str) -> PageCapture {
    PageCapture {
        html: "<html><body>village</body></html>".to_string(),
        url: url.to_string(),
    }
}

// ============================================================================
// Facades
// ============================================================================

#[tokio::test]
async fn test_public_api_sends_json_without_bearer() {
    let h = harness(Vec::<(String, String)>::new()).await;
    Mock::given(method("PUT"))
        .and(path("/things/1"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({ "name": "x" })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&h.server)
        .await;

    let api = PublicApi::new(h.client.clone());
    let response = api.put("/things/1", Some(&json!({ "name": "x" }))).await.unwrap();
    assert_eq!(response.status().as_u16(), 204);

    let requests = h.server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn test_admin_api_attaches_admin_bearer() {
    let access = access_token("a1", in_an_hour());
    let h = harness([entry(ACCESS_TOKEN_KEY, access.clone())]).await;
    Mock::given(method("DELETE"))
        .and(path("/villages/7"))
        .and(header("authorization", format!("Bearer {}", access).as_str()))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&h.server)
        .await;

    let admin = AdminApi::new(h.client.clone(), h.session.clone(), true);
    let response = admin.delete::<()>("/villages/7", None).await.unwrap();
    assert!(response.status().is_success());
}

#[tokio::test]
async fn test_user_api_attaches_delegated_bearer() {
    let access = access_token("a1", in_an_hour());
    let user = user_token("Marcus", "ts2.x1.europe", in_an_hour());
    let h = harness([
        entry(ACCESS_TOKEN_KEY, access.clone()),
        entry(AVATAR_NAME_KEY, "Marcus"),
        entry(AVATAR_HOST_KEY, "ts2.x1.europe"),
    ])
    .await;
    Mock::given(method("GET"))
        .and(path("/user/avatar-token-by-name"))
        .respond_with(ResponseTemplate::new(200).set_body_string(user.clone()))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/me"))
        .and(header("authorization", format!("Bearer {}", user).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "name": "Marcus" })))
        .expect(2)
        .mount(&h.server)
        .await;

    let api = UserApi::new(h.client.clone(), h.session.clone(), false);
    for _ in 0..2 {
        let response = api.get("/me").await.unwrap();
        assert_eq!(response.status().as_u16(), 200);
    }
}

#[tokio::test]
async fn test_error_status_is_returned_not_retried() {
    let access = access_token("a1", in_an_hour());
    let h = harness([entry(ACCESS_TOKEN_KEY, access)]).await;
    Mock::given(method("POST"))
        .and(path("/reports"))
        .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
        .expect(1)
        .mount(&h.server)
        .await;

    let admin = AdminApi::new(h.client.clone(), h.session.clone(), true);
    let response = admin
        .post("/reports", Some(&json!({ "kind": "battle" })))
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 503);
    assert_eq!(response.text().await.unwrap(), "busy");
}

#[tokio::test]
async fn test_no_token_sends_unauthenticated_when_allowed() {
    let h = harness(Vec::<(String, String)>::new()).await;
    Mock::given(method("GET"))
        .and(path("/villages"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&h.server)
        .await;

    let admin = AdminApi::new(h.client.clone(), h.session.clone(), true);
    let response = admin.get("/villages").await.unwrap();
    assert_eq!(response.status().as_u16(), 401);

    let requests = h.server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn test_no_token_fails_when_unauthenticated_not_allowed() {
    let h = harness(Vec::<(String, String)>::new()).await;

    let admin = AdminApi::new(h.client.clone(), h.session.clone(), false);
    let err = admin.get("/villages").await.unwrap_err();
    assert!(matches!(
        err,
        AuthError::NoTokenAvailable(MissingCredential::AdminSecret)
    ));

    let user = UserApi::new(h.client.clone(), h.session.clone(), false);
    let err = user.get("/me").await.unwrap_err();
    assert!(matches!(
        err,
        AuthError::NoTokenAvailable(MissingCredential::IdentitySelection)
    ));
    assert!(h.server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_issue_delegated_token_for_sitter() {
    let access = access_token("a1", in_an_hour());
    let h = harness([entry(ACCESS_TOKEN_KEY, access.clone())]).await;
    let sitter_token = user_token("Marcus", "ts2.x1.europe", in_an_hour());
    Mock::given(method("GET"))
        .and(path("/user/avatar-token-by-name"))
        .and(query_param("avatar_name", "Marcus"))
        .and(query_param("host", "ts2.x1.europe"))
        .and(query_param("sitter_avatar_name", "Julia"))
        .and(header("authorization", format!("Bearer {}", access).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_string(sitter_token.clone()))
        .expect(1)
        .mount(&h.server)
        .await;

    let admin = AdminApi::new(h.client.clone(), h.session.clone(), true);
    let token = admin
        .issue_delegated_token("Marcus", "ts2.x1.europe", Some("Julia"))
        .await
        .unwrap();
    assert_eq!(token, sitter_token);
    // Issuing directly leaves the session's identity alone
    assert_eq!(h.session.current_identity().await, None);
}

// ============================================================================
// Page export
// ============================================================================

#[tokio::test]
async fn test_export_escapes_page_url() {
    let access = access_token("a1", in_an_hour());
    let h = harness([entry(ACCESS_TOKEN_KEY, access.clone())]).await;
    Mock::given(method("POST"))
        .and(path("/export-page"))
        .and(query_param("avatar_name", "Marcus"))
        .and(query_param("url", PAGE_URL))
        .and(header("authorization", format!("Bearer {}", access).as_str()))
        .and(body_string("<html><body>village</body></html>"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&h.server)
        .await;

    let outcome = exporter(&h)
        .export(capture(PAGE_URL), Some("Marcus"))
        .await
        .unwrap();
    assert_eq!(outcome, ExportOutcome::Submitted { status: 202 });

    let requests = h.server.received_requests().await.unwrap();
    let query = requests[0].url.query().unwrap_or_default().to_string();
    assert!(query.contains("%26b%3D2"), "query was {}", query);
    assert!(!query.contains("&b="));

    let pairs: Vec<_> = requests[0].url.query_pairs().collect();
    assert_eq!(pairs.len(), 2);
}

#[tokio::test]
async fn test_export_selects_identity_from_url() {
    let access = access_token("a1", in_an_hour());
    let h = harness([entry(ACCESS_TOKEN_KEY, access)]).await;
    Mock::given(method("POST"))
        .and(path("/export-page"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&h.server)
        .await;

    exporter(&h)
        .export(capture(PAGE_URL), Some("  Marcus "))
        .await
        .unwrap();

    let identity = h.session.current_identity().await.unwrap();
    assert_eq!(identity.name, "Marcus");
    assert_eq!(identity.host, "ts2.x1.europe");
}

#[tokio::test]
async fn test_export_skips_foreign_and_empty_pages() {
    let h = harness([entry(API_KEY_KEY, API_KEY)]).await;
    let exporter = exporter(&h);

    let outcome = exporter
        .export(capture("https://example.com/page"), Some("Marcus"))
        .await
        .unwrap();
    assert_eq!(outcome, ExportOutcome::Skipped(SkipReason::ForeignSite));

    let empty = PageCapture {
        html: "   ".to_string(),
        url: PAGE_URL.to_string(),
    };
    let outcome = exporter.export(empty, Some("Marcus")).await.unwrap();
    assert_eq!(outcome, ExportOutcome::Skipped(SkipReason::EmptyPage));

    assert!(h.server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_export_without_credentials_needs_configuration() {
    let h = harness(Vec::<(String, String)>::new()).await;

    let outcome = exporter(&h)
        .export(capture(PAGE_URL), Some("Marcus"))
        .await
        .unwrap();
    assert_eq!(outcome, ExportOutcome::NeedsConfiguration);
    assert!(h.server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_export_requires_name() {
    let access = access_token("a1", in_an_hour());
    let h = harness([entry(ACCESS_TOKEN_KEY, access)]).await;

    let err = exporter(&h).export(capture(PAGE_URL), None).await.unwrap_err();
    assert!(matches!(err, ExportError::NameNotFound));

    let err = exporter(&h)
        .export(capture(PAGE_URL), Some("  "))
        .await
        .unwrap_err();
    assert!(matches!(err, ExportError::NameNotFound));
}

#[tokio::test]
async fn test_export_checks_name_before_any_exchange() {
    let h = harness([entry(API_KEY_KEY, API_KEY)]).await;

    let err = exporter(&h).export(capture(PAGE_URL), None).await.unwrap_err();
    assert!(matches!(err, ExportError::NameNotFound));
    assert!(h.server.received_requests().await.unwrap().is_empty());
    assert_eq!(h.store.write_count(), 0);
}

#[tokio::test]
async fn test_export_with_only_api_key_logs_in_on_submit() {
    let access = access_token("a1", in_an_hour());
    let h = harness([entry(API_KEY_KEY, API_KEY)]).await;
    Mock::given(method("POST"))
        .and(path("/login/api-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": access,
            "refresh_token": refresh_token("r1", in_an_hour()),
        })))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/export-page"))
        .and(header("authorization", format!("Bearer {}", access).as_str()))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&h.server)
        .await;

    let outcome = exporter(&h)
        .export(capture(PAGE_URL), Some("Marcus"))
        .await
        .unwrap();
    assert_eq!(outcome, ExportOutcome::Submitted { status: 200 });
}
