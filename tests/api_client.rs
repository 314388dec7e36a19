use seafile_tools::api::EntryType;
use seafile_tools::cleanup::{run_cleanup_at, CleanupPolicy};
use seafile_tools::{share, ApiClient, ApiError};
use std::io::Write;
use std::sync::Arc;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const REPO: &str = "3f1c2b6e-0000-4000-8000-000000000001";
const TOKEN: &str = "24fd3c026886e3121b2ca630805ed425c272cb96";

async fn mount_auth(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api2/auth-token/"))
        .and(body_string_contains("username=me%40example.org"))
        .and(body_string_contains("password=right"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "token": TOKEN })))
        .mount(server)
        .await;
}

async fn authed_client(server: &MockServer) -> ApiClient {
    mount_auth(server).await;
    let mut client = ApiClient::new(&server.uri(), REPO).unwrap();
    client.authenticate("me@example.org", "right").await.unwrap();
    client
}

fn repo_path(suffix: &str) -> String {
    format!("/api2/repos/{REPO}/{suffix}")
}

#[tokio::test]
async fn authenticate_stores_token() {
    let server = MockServer::start().await;
    let client = authed_client(&server).await;
    assert!(client.has_token());
}

#[tokio::test]
async fn rejected_credentials_leave_client_unauthenticated() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api2/auth-token/"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "non_field_errors": ["Unable to login with provided credentials."]
        })))
        .mount(&server)
        .await;

    let mut client = ApiClient::new(&server.uri(), REPO).unwrap();
    let err = client.authenticate("me@example.org", "wrong").await.unwrap_err();
    assert!(err.is_auth(), "{err}");
    assert!(!client.has_token());
}

#[tokio::test]
async fn malformed_token_response_is_an_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api2/auth-token/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let mut client = ApiClient::new(&server.uri(), REPO).unwrap();
    assert!(client.authenticate("a", "b").await.unwrap_err().is_auth());
    assert!(!client.has_token());
}

#[tokio::test]
async fn calls_without_token_fail_before_reaching_the_server() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let client = ApiClient::new(&server.uri(), REPO).unwrap();
    assert!(client.list_directory().await.unwrap_err().is_auth());
    assert!(client.delete_file("a.txt").await.unwrap_err().is_auth());
}

#[tokio::test]
async fn unreachable_auth_server_is_an_auth_error() {
    // Nothing listens on a port we bound and released.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let uri = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let mut client = ApiClient::new(&uri, REPO).unwrap();
    let err = client.authenticate("a", "b").await.unwrap_err();
    assert!(err.is_auth(), "{err}");
    assert!(!client.has_token());
}

#[tokio::test]
async fn list_directory_requests_files_only() {
    let server = MockServer::start().await;
    let client = authed_client(&server).await;
    Mock::given(method("GET"))
        .and(path(repo_path("dir/")))
        .and(query_param("t", "f"))
        .and(header("Authorization", format!("Token {TOKEN}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            { "id": "0000000000000000000000000000000000000001", "type": "file", "name": "a.png", "size": 10, "mtime": 1 },
            { "id": "0000000000000000000000000000000000000002", "type": "file", "name": "b.png", "size": 20, "mtime": 2 }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let entries = client.list_directory().await.unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1].name, "b.png");
    assert_eq!(entries[1].size, 20);
    assert_eq!(entries[0].entry_type, EntryType::File);
}

#[tokio::test]
async fn empty_directory_lists_nothing() {
    let server = MockServer::start().await;
    let client = authed_client(&server).await;
    Mock::given(method("GET"))
        .and(path(repo_path("dir/")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(&server)
        .await;

    assert!(client.list_directory().await.unwrap().is_empty());
}

#[tokio::test]
async fn unexpected_listing_shape_is_a_decode_error() {
    let server = MockServer::start().await;
    let client = authed_client(&server).await;
    Mock::given(method("GET"))
        .and(path(repo_path("dir/")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "error_msg": "oops" })))
        .mount(&server)
        .await;

    let err = client.list_directory().await.unwrap_err();
    assert!(matches!(err, ApiError::Decode { .. }), "{err}");
}

#[tokio::test]
async fn file_detail_by_root_path() {
    let server = MockServer::start().await;
    let client = authed_client(&server).await;
    Mock::given(method("GET"))
        .and(path(repo_path("file/detail/")))
        .and(query_param("p", "/report 1.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "abc", "mtime": 1_700_000_000u64, "type": "file", "name": "report 1.pdf", "size": 42
        })))
        .mount(&server)
        .await;

    let detail = client.file_detail("report 1.pdf").await.unwrap();
    assert_eq!(detail.modified_at.timestamp(), 1_700_000_000);
    assert_eq!(detail.size, 42);
}

#[tokio::test]
async fn missing_file_detail_is_not_found() {
    let server = MockServer::start().await;
    let client = authed_client(&server).await;
    Mock::given(method("GET"))
        .and(path(repo_path("file/detail/")))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({ "error_msg": "File not found" })))
        .mount(&server)
        .await;

    let err = client.file_detail("gone.txt").await.unwrap_err();
    assert!(matches!(err, ApiError::NotFound { ref path } if path == "/gone.txt"), "{err}");
}

#[tokio::test]
async fn delete_succeeds_only_on_200() {
    let server = MockServer::start().await;
    let client = authed_client(&server).await;
    Mock::given(method("DELETE"))
        .and(path(repo_path("file/")))
        .and(query_param("p", "/old.png"))
        .respond_with(ResponseTemplate::new(200).set_body_string("\"success\""))
        .expect(1)
        .mount(&server)
        .await;

    client.delete_file("old.png").await.unwrap();
}

#[tokio::test]
async fn delete_rejects_every_other_status() {
    for code in [202u16, 204, 404, 500] {
        let server = MockServer::start().await;
        let client = authed_client(&server).await;
        Mock::given(method("DELETE"))
            .and(path(repo_path("file/")))
            .respond_with(ResponseTemplate::new(code))
            .mount(&server)
            .await;

        let err = client.delete_file("old.png").await.unwrap_err();
        match err {
            ApiError::UnexpectedStatus { path, status, .. } => {
                assert_eq!(path, "/old.png");
                assert_eq!(status.as_u16(), code);
            }
            other => panic!("status {code}: expected UnexpectedStatus, got {other}"),
        }
    }
}

async fn mount_upload(server: &MockServer, results: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(repo_path("upload-link/")))
        .and(query_param("p", "/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(format!("{}/seafhttp/upload-api/7a1b", server.uri())))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/seafhttp/upload-api/7a1b"))
        .and(query_param("ret-json", "1"))
        .and(header("Authorization", format!("Token {TOKEN}").as_str()))
        .and(body_string_contains("name=\"file\"; filename=\"shot.png\""))
        .and(body_string_contains("name=\"parent_dir\"\r\n\r\n/\r\n"))
        .and(body_string_contains("pixels"))
        .respond_with(ResponseTemplate::new(200).set_body_json(results))
        .expect(1)
        .mount(server)
        .await;
}

fn local_file(dir: &tempfile::TempDir) -> std::path::PathBuf {
    let path = dir.path().join("shot.png");
    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(b"pixels").unwrap();
    path
}

#[tokio::test]
async fn upload_then_share_targets_the_uploaded_path() {
    let server = MockServer::start().await;
    let client = authed_client(&server).await;
    mount_upload(
        &server,
        serde_json::json!([{ "name": "shot.png", "id": "f00d", "size": 6 }]),
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/api/v2.1/share-links/"))
        .and(body_string_contains(format!("repo_id={REPO}").as_str()))
        .and(body_string_contains("path=%2Fshot.png"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "username": "me@example.org",
            "view_cnt": 0,
            "ctime": "2026-10-19T10:00:00+00:00",
            "token": "0a1b2c3d4e",
            "repo_id": REPO,
            "link": "https://seafile.example.org/f/0a1b2c3d4e/",
            "expire_date": null,
            "path": "/shot.png",
            "is_expired": false
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let link = share::upload_and_share(&client, &local_file(&dir)).await.unwrap();
    assert_eq!(link.path, "/shot.png");
    assert_eq!(link.link, "https://seafile.example.org/f/0a1b2c3d4e/");
    assert!(!link.is_expired);
}

#[tokio::test]
async fn upload_with_no_results_is_a_cardinality_error() {
    let server = MockServer::start().await;
    let client = authed_client(&server).await;
    mount_upload(&server, serde_json::json!([])).await;

    let dir = tempfile::tempdir().unwrap();
    let err = share::upload_and_share(&client, &local_file(&dir)).await.unwrap_err();
    assert!(matches!(err, ApiError::Cardinality { count: 0 }), "{err}");
}

#[tokio::test]
async fn upload_with_two_results_is_a_cardinality_error() {
    let server = MockServer::start().await;
    let client = authed_client(&server).await;
    mount_upload(
        &server,
        serde_json::json!([
            { "name": "shot.png", "id": "1", "size": 6 },
            { "name": "shot (1).png", "id": "2", "size": 6 }
        ]),
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    let err = share::upload_and_share(&client, &local_file(&dir)).await.unwrap_err();
    assert!(matches!(err, ApiError::Cardinality { count: 2 }), "{err}");
}

#[tokio::test]
async fn upload_of_missing_local_file_is_an_io_error() {
    let server = MockServer::start().await;
    let client = authed_client(&server).await;
    let dir = tempfile::tempdir().unwrap();

    let err = client.upload_file(dir.path().join("nope.png")).await.unwrap_err();
    assert!(matches!(err, ApiError::Io { .. }), "{err}");
}

#[tokio::test]
async fn cleanup_against_the_http_api() {
    let server = MockServer::start().await;
    let client = authed_client(&server).await;
    let now = chrono::DateTime::from_timestamp(1_700_000_000, 0).unwrap();
    let day = 86_400i64;

    Mock::given(method("GET"))
        .and(path(repo_path("dir/")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            { "id": "1", "type": "file", "name": "old.png", "size": 1 },
            { "id": "2", "type": "file", "name": "new.png", "size": 1 },
            { "id": "3", "type": "file", "name": "broken.png", "size": 1 }
        ])))
        .mount(&server)
        .await;
    for (name, age_days) in [("old.png", 20), ("new.png", 3)] {
        Mock::given(method("GET"))
            .and(path(repo_path("file/detail/")))
            .and(query_param("p", format!("/{name}").as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": name, "mtime": now.timestamp() - age_days * day, "type": "file", "name": name, "size": 1
            })))
            .mount(&server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path(repo_path("file/detail/")))
        .and(query_param("p", "/broken.png"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(repo_path("file/")))
        .and(query_param("p", "/old.png"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let report = run_cleanup_at(Arc::new(client), &CleanupPolicy::default(), now)
        .await
        .unwrap();
    assert_eq!(report.deleted, 1);
    assert_eq!(report.kept, 1);
    assert_eq!(report.detail_failures, 1);
}
