//! Integration tests for the member registry backend.

use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tempfile::TempDir;

use crate::config::Config;
use crate::db::{init_database, Repository};
use crate::{create_router, AppState};

const ADMIN_KEY: &str = "test-admin-key";
const PHOTO_BYTES: &[u8] = b"\xff\xd8\xff fake jpeg";

/// Multipart member form, with a photo part when `photo_name` is set.
fn member_form(fields: &[(&str, &str)], photo_name: Option<&str>) -> Form {
    let mut form = Form::new();
    for (name, value) in fields {
        form = form.text(name.to_string(), value.to_string());
    }
    if let Some(file_name) = photo_name {
        form = form.part(
            "photo",
            Part::bytes(PHOTO_BYTES.to_vec())
                .file_name(file_name.to_string())
                .mime_str("image/jpeg")
                .unwrap(),
        );
    }
    form
}

/// Test fixture for integration tests.
struct TestFixture {
    client: Client,
    base_url: String,
    temp_dir: TempDir,
}

impl TestFixture {
    async fn new() -> Self {
        Self::with_admin_key(Some(ADMIN_KEY.to_string())).await
    }

    async fn with_admin_key(admin_key: Option<String>) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.sqlite");
        let upload_dir = temp_dir.path().join("uploads");

        // Initialize database
        let pool = init_database(&db_path).await.expect("Failed to init DB");

        // Create config
        let config = Config {
            admin_key,
            jwt_secret: Some("integration-test-secret".to_string()),
            jwt_ttl_minutes: 5,
            db_path,
            upload_dir,
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            log_level: "warn".to_string(),
        };

        let state = AppState::new(
            Repository::new(pool),
            config,
            b"integration-test-secret",
        );
        let app = create_router(state);

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get addr");
        let base_url = format!("http://{}", addr);

        // Spawn server
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait for server to start
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        TestFixture {
            client: Client::new(),
            base_url,
            temp_dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Register a member through the admin API and return the response data.
    async fn register(&self, nra: &str, name: &str, role: &str) -> Value {
        let form = member_form(
            &[
                ("nra", nra),
                ("name", name),
                ("cohort", "015"),
                ("membershipStatus", "active"),
                ("department", "Informatics"),
                ("role", role),
                ("inauguratedOn", "12-03-2021"),
            ],
            Some("portrait.jpg"),
        );
        let (status, body) = self.admin_send(self.client.post(self.url("/api/member")), form).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["success"], true);
        body["data"].clone()
    }

    async fn admin_send(
        &self,
        request: reqwest::RequestBuilder,
        form: Form,
    ) -> (StatusCode, Value) {
        let resp = request
            .header("x-api-key", ADMIN_KEY)
            .multipart(form)
            .send()
            .await
            .unwrap();
        (resp.status(), resp.json().await.unwrap())
    }

    async fn admin_update(&self, id: &str, fields: &[(&str, &str)]) -> (StatusCode, Value) {
        let request = self.client.put(self.url(&format!("/api/member/{}", id)));
        self.admin_send(request, member_form(fields, None)).await
    }

    fn upload_exists(&self, file_name: &str) -> bool {
        self.temp_dir.path().join("uploads").join(file_name).exists()
    }

    /// Register a member and redeem the login token. Returns (member id, bearer token).
    async fn session(&self, nra: &str, name: &str, role: &str) -> (String, String) {
        let member = self.register(nra, name, role).await;
        let token = self
            .redeem(member["loginToken"].as_str().unwrap())
            .await
            .unwrap();
        (member["id"].as_str().unwrap().to_string(), token)
    }

    async fn redeem(&self, login_token: &str) -> Result<String, Value> {
        let resp = self
            .client
            .post(self.url("/api/auth/token"))
            .json(&json!({ "token": login_token }))
            .send()
            .await
            .unwrap();
        let ok = resp.status().is_success();
        let body: Value = resp.json().await.unwrap();
        if ok {
            Ok(body["data"]["token"].as_str().unwrap().to_string())
        } else {
            Err(body)
        }
    }

    async fn get_as(&self, token: &str, path: &str) -> (StatusCode, Value) {
        let resp = self
            .client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .unwrap();
        (resp.status(), resp.json().await.unwrap())
    }

    async fn put_as(&self, token: &str, path: &str) -> (StatusCode, Value) {
        let resp = self
            .client
            .put(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .unwrap();
        (resp.status(), resp.json().await.unwrap())
    }

    async fn propose(
        &self,
        token: &str,
        target_id: &str,
        from: &str,
        to: &str,
    ) -> (StatusCode, Value) {
        let resp = self
            .client
            .post(self.url("/api/status-change"))
            .bearer_auth(token)
            .json(&json!({ "targetMemberId": target_id, "fromRole": from, "toRole": to }))
            .send()
            .await
            .unwrap();
        (resp.status(), resp.json().await.unwrap())
    }

    async fn admin_get_member(&self, id: &str) -> (StatusCode, Value) {
        let resp = self
            .client
            .get(self.url(&format!("/api/member/{}", id)))
            .header("x-api-key", ADMIN_KEY)
            .send()
            .await
            .unwrap();
        (resp.status(), resp.json().await.unwrap())
    }
}

#[tokio::test]
async fn test_health_check() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_admin_routes_require_key() {
    let fixture = TestFixture::new().await;

    // Request without API key
    let resp = fixture
        .client
        .get(fixture.url("/api/member"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    // Request with wrong API key
    let resp = fixture
        .client
        .get(fixture.url("/api/member"))
        .header("x-api-key", "wrong-key")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    // Key passed as a bearer credential
    let resp = fixture
        .client
        .get(fixture.url("/api/member"))
        .bearer_auth(ADMIN_KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_admin_routes_open_without_configured_key() {
    let fixture = TestFixture::with_admin_key(None).await;

    let resp = fixture
        .client
        .get(fixture.url("/api/member"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_register_and_manage_members() {
    let fixture = TestFixture::new().await;

    let member = fixture.register("13.24.001", "Ayu Lestari", "board").await;
    assert_eq!(member["nra"], "13.24.001");
    assert_eq!(member["cohort"], "Cohort 015");
    assert_eq!(member["department"], "Informatics");
    assert_eq!(member["membershipStatus"], "active");
    assert_eq!(member["role"], "board");
    assert_eq!(member["inauguratedOn"], "12-03-2021");
    assert_eq!(member["photo"], "13.24.001_Ayu_Lestari.jpg");
    assert_eq!(member["loginToken"].as_str().unwrap().len(), 64);
    assert!(fixture.upload_exists("13.24.001_Ayu_Lestari.jpg"));
    let id = member["id"].as_str().unwrap().to_string();

    // Role defaults to member
    let form = member_form(
        &[
            ("nra", "13.24.002"),
            ("name", "Budi"),
            ("cohort", "016"),
            ("membershipStatus", "active"),
            ("department", "Informatics"),
        ],
        Some("budi.png"),
    );
    let (status, body) = fixture
        .admin_send(fixture.client.post(fixture.url("/api/member")), form)
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["role"], "member");
    assert_eq!(body["data"]["cohort"], "Cohort 016");

    // List does not expose login tokens
    let resp = fixture
        .client
        .get(fixture.url("/api/member"))
        .header("x-api-key", ADMIN_KEY)
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    let list = body["data"].as_array().unwrap();
    assert_eq!(list.len(), 2);
    assert!(list.iter().all(|m| m.get("loginToken").is_none()));

    // Partial update keeps absent and blank fields
    let (status, body) = fixture
        .admin_update(&id, &[("name", "Ayu L."), ("department", "Physics"), ("nra", "")])
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["notificationSent"], false);
    assert_eq!(body["data"]["member"]["name"], "Ayu L.");
    assert_eq!(body["data"]["member"]["department"], "Physics");
    assert_eq!(body["data"]["member"]["nra"], "13.24.001");
    assert_eq!(body["data"]["member"]["role"], "board");

    // Direct administrative role change
    let (_, body) = fixture.admin_update(&id, &[("role", "alumni")]).await;
    assert_eq!(body["data"]["member"]["role"], "alumni");

    // Unknown enumeration values are refused
    let (status, body) = fixture.admin_update(&id, &[("membershipStatus", "dormant")]).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    // Delete, then it is gone
    let resp = fixture
        .client
        .delete(fixture.url(&format!("/api/member/{}", id)))
        .header("x-api-key", ADMIN_KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let (status, body) = fixture.admin_get_member(&id).await;
    assert_eq!(status, 404);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_member_photo_follows_updates() {
    let fixture = TestFixture::new().await;
    let member = fixture.register("13.24.001", "Ayu", "member").await;
    let id = member["id"].as_str().unwrap().to_string();
    assert!(fixture.upload_exists("13.24.001_Ayu.jpg"));

    // New NRA and name without an upload: the stored file is renamed
    let (status, body) = fixture
        .admin_update(&id, &[("nra", "13.24.050"), ("name", "Ayu Lestari")])
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["member"]["photo"], "13.24.050_Ayu_Lestari.jpg");
    assert!(!fixture.upload_exists("13.24.001_Ayu.jpg"));
    assert!(fixture.upload_exists("13.24.050_Ayu_Lestari.jpg"));

    let resp = fixture
        .client
        .get(fixture.url("/uploads/13.24.050_Ayu_Lestari.jpg"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.bytes().await.unwrap().to_vec(), PHOTO_BYTES);

    // A replacement upload takes its own extension and drops the old file
    let form = member_form(&[("membershipStatus", "inactive")], Some("new.PNG"));
    let (status, body) = fixture
        .admin_send(
            fixture.client.put(fixture.url(&format!("/api/member/{}", id))),
            form,
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["member"]["photo"], "13.24.050_Ayu_Lestari.png");
    assert_eq!(body["data"]["member"]["membershipStatus"], "inactive");
    assert!(!fixture.upload_exists("13.24.050_Ayu_Lestari.jpg"));
    assert!(fixture.upload_exists("13.24.050_Ayu_Lestari.png"));

    // A rejected update leaves the file where it was
    fixture.register("13.24.002", "Budi", "member").await;
    let (status, _) = fixture
        .admin_update(&id, &[("nra", "13.24.002"), ("name", "Someone Else")])
        .await;
    assert_eq!(status, 409);
    assert!(fixture.upload_exists("13.24.050_Ayu_Lestari.png"));
    let (_, body) = fixture.admin_get_member(&id).await;
    assert_eq!(body["data"]["photo"], "13.24.050_Ayu_Lestari.png");
}

#[tokio::test]
async fn test_register_validation() {
    let fixture = TestFixture::new().await;
    fixture.register("13.24.001", "Ayu", "member").await;

    let complete = [
        ("nra", "13.24.009"),
        ("name", "X"),
        ("cohort", "015"),
        ("membershipStatus", "active"),
        ("department", "D"),
    ];
    let with = |name: &'static str, value: &'static str| {
        let mut fields: Vec<(&str, &str)> =
            complete.iter().copied().filter(|(n, _)| *n != name).collect();
        if !value.is_empty() {
            fields.push((name, value));
        }
        fields
    };

    let attempts = [
        (with("nra", "13-24-001"), true, StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
        (with("name", ""), true, StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
        (with("membershipStatus", ""), true, StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
        (with("inauguratedOn", "2021-03-12"), true, StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
        (with("role", "king"), true, StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
        (complete.to_vec(), false, StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
        (with("nra", "13.24.001"), true, StatusCode::CONFLICT, "CONFLICT"),
    ];

    for (fields, photo, status, code) in attempts {
        let form = member_form(&fields, photo.then_some("x.jpg"));
        let (got, err) = fixture
            .admin_send(fixture.client.post(fixture.url("/api/member")), form)
            .await;
        assert_eq!(got, status, "{fields:?}");
        assert_eq!(err["success"], false);
        assert_eq!(err["error"]["code"], code, "{fields:?}");
    }

    // Nothing was written for the refused registrations
    assert!(!fixture.upload_exists("13.24.009_X.jpg"));
    assert!(fixture.upload_exists("13.24.001_Ayu.jpg"));
}

#[tokio::test]
async fn test_login_flows() {
    let fixture = TestFixture::new().await;
    let member = fixture.register("13.24.001", "Ayu", "member").await;
    let login_token = member["loginToken"].as_str().unwrap();

    // Single-use token
    let jwt = fixture.redeem(login_token).await.unwrap();
    let reused = fixture.redeem(login_token).await.unwrap_err();
    assert_eq!(reused["error"]["code"], "UNAUTHORIZED");

    let (status, body) = fixture.get_as(&jwt, "/api/profile").await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["nra"], "13.24.001");
    assert_eq!(body["data"]["hasPassword"], false);

    // No password yet
    let resp = fixture
        .client
        .post(fixture.url("/api/auth/login"))
        .json(&json!({ "nra": "13.24.001", "password": "hunter22" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = fixture
        .client
        .put(fixture.url("/api/profile/password"))
        .bearer_auth(&jwt)
        .json(&json!({ "password": "hunter22" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = fixture
        .client
        .post(fixture.url("/api/auth/login"))
        .json(&json!({ "nra": "13.24.001", "password": "hunter22" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let token = body["data"]["token"].as_str().unwrap().to_string();

    let (_, body) = fixture.get_as(&token, "/api/profile").await;
    assert_eq!(body["data"]["hasPassword"], true);

    // Wrong password and unknown NRA are indistinguishable
    let mut messages = Vec::new();
    for creds in [
        json!({ "nra": "13.24.001", "password": "wrong" }),
        json!({ "nra": "99.99.999", "password": "hunter22" }),
    ] {
        let resp = fixture
            .client
            .post(fixture.url("/api/auth/login"))
            .json(&creds)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 401);
        let body: Value = resp.json().await.unwrap();
        messages.push(body["error"]["message"].clone());
    }
    assert_eq!(messages[0], messages[1]);
}

#[tokio::test]
async fn test_bearer_routes_require_token() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/api/notifications"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["message"], "Authorization header is required");

    let (status, body) = fixture.get_as("not-a-jwt", "/api/profile").await;
    assert_eq!(status, 401);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_complete_profile_with_photo() {
    let fixture = TestFixture::new().await;
    let (_, jwt) = fixture.session("13.24.001", "Ayu", "member").await;

    let photo_bytes = b"\x89PNG fake image".to_vec();
    let form = reqwest::multipart::Form::new()
        .text("email", "ayu@example.org")
        .text("phone", "081234567890")
        .text("name", "Ayu Lestari")
        .text("inauguratedOn", "01-09-2022")
        .part(
            "photo",
            reqwest::multipart::Part::bytes(photo_bytes.clone())
                .file_name("portrait.png")
                .mime_str("image/png")
                .unwrap(),
        );

    let resp = fixture
        .client
        .put(fixture.url("/api/profile/complete"))
        .bearer_auth(&jwt)
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["name"], "Ayu Lestari");
    assert_eq!(body["data"]["email"], "ayu@example.org");
    assert_eq!(body["data"]["inauguratedOn"], "01-09-2022");
    assert_eq!(body["data"]["photo"], "13.24.001_Ayu_Lestari.png");

    assert!(fixture.upload_exists("13.24.001_Ayu_Lestari.png"));
    // The registration photo is replaced
    assert!(!fixture.upload_exists("13.24.001_Ayu.jpg"));

    // Served back under /uploads
    let resp = fixture
        .client
        .get(fixture.url("/uploads/13.24.001_Ayu_Lestari.png"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.bytes().await.unwrap().to_vec(), photo_bytes);

    // Invalid email is refused
    let form = reqwest::multipart::Form::new()
        .text("email", "not-an-email")
        .text("phone", "081234567890")
        .text("name", "Ayu Lestari")
        .text("inauguratedOn", "01-09-2022");
    let resp = fixture
        .client
        .put(fixture.url("/api/profile/complete"))
        .bearer_auth(&jwt)
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_role_change_accepted_end_to_end() {
    let fixture = TestFixture::new().await;
    let (a_id, a_jwt) = fixture.session("13.24.001", "Ayu", "board").await;
    let (b_id, b_jwt) = fixture.session("13.24.002", "Budi", "board").await;

    let (status, body) = fixture.propose(&a_jwt, &b_id, "board", "alumni").await;
    assert_eq!(status, 200);
    assert_eq!(body["message"], "Role change request sent successfully");
    let request_id = body["data"]["requestId"].as_str().unwrap().to_string();
    let notification_id = body["data"]["notificationId"].as_str().unwrap().to_string();

    // B sees one pending, unread notification from A
    let (_, body) = fixture.get_as(&b_jwt, "/api/notifications").await;
    let list = body["data"].as_array().unwrap();
    assert_eq!(list.len(), 1);
    let n = &list[0];
    assert_eq!(n["id"], notification_id.as_str());
    assert_eq!(n["type"], "status_change_request");
    assert_eq!(n["title"], "Status Change Request");
    assert_eq!(n["message"], "Ayu requests to change your role from board to alumni");
    assert_eq!(n["pending"], true);
    assert!(n["accepted"].is_null());
    assert!(n["readAt"].is_null());
    assert_eq!(n["fromMember"]["id"], a_id.as_str());
    assert_eq!(n["fromMember"]["name"], "Ayu");
    assert_eq!(n["fromMember"]["nra"], "13.24.001");
    assert_eq!(n["fromMember"]["role"], "board");
    assert_eq!(
        n["metadata"],
        json!({ "requestId": request_id, "fromRole": "board", "toRole": "alumni" })
    );

    let (_, body) = fixture.get_as(&b_jwt, "/api/notifications/unread-count").await;
    assert_eq!(body["data"]["count"], 1);

    let (status, body) = fixture
        .put_as(&b_jwt, &format!("/api/status-change/{}/accept", request_id))
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["message"], "Role change accepted");
    assert_eq!(body["data"]["newRole"], "alumni");

    let (_, body) = fixture.admin_get_member(&b_id).await;
    assert_eq!(body["data"]["role"], "alumni");

    let (_, body) = fixture.get_as(&b_jwt, "/api/notifications/unread-count").await;
    assert_eq!(body["data"]["count"], 0);

    let (_, body) = fixture.get_as(&b_jwt, "/api/notifications").await;
    assert_eq!(body["data"][0]["pending"], false);
    assert_eq!(body["data"][0]["accepted"], true);

    // A replayed accept is refused
    let (status, body) = fixture
        .put_as(&b_jwt, &format!("/api/status-change/{}/accept", request_id))
        .await;
    assert_eq!(status, 409);
    assert_eq!(body["error"]["code"], "ALREADY_PROCESSED");
}

#[tokio::test]
async fn test_role_change_rejected_end_to_end() {
    let fixture = TestFixture::new().await;
    let (_, a_jwt) = fixture.session("13.24.001", "Ayu", "board").await;
    let (b_id, b_jwt) = fixture.session("13.24.002", "Budi", "board").await;

    let (_, body) = fixture.propose(&a_jwt, &b_id, "board", "alumni").await;
    let request_id = body["data"]["requestId"].as_str().unwrap().to_string();

    let (status, body) = fixture
        .put_as(&b_jwt, &format!("/api/status-change/{}/reject", request_id))
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["message"], "Role change rejected");

    let (_, body) = fixture.admin_get_member(&b_id).await;
    assert_eq!(body["data"]["role"], "board");

    let (_, body) = fixture.get_as(&b_jwt, "/api/notifications").await;
    assert_eq!(body["data"][0]["pending"], false);
    assert_eq!(body["data"][0]["accepted"], false);

    let (status, body) = fixture
        .put_as(&b_jwt, &format!("/api/status-change/{}/reject", request_id))
        .await;
    assert_eq!(status, 409);
    assert_eq!(body["error"]["code"], "ALREADY_PROCESSED");
}

#[tokio::test]
async fn test_role_change_authorization() {
    let fixture = TestFixture::new().await;
    let (_, a_jwt) = fixture.session("13.24.001", "Ayu", "board").await;
    let (b_id, _) = fixture.session("13.24.002", "Budi", "board").await;
    let (c_id, c_jwt) = fixture.session("13.24.003", "Citra", "member").await;

    // Requester is not on the board
    let (status, body) = fixture.propose(&c_jwt, &b_id, "board", "alumni").await;
    assert_eq!(status, 403);
    assert_eq!(body["error"]["code"], "PERMISSION_DENIED");

    // Target is not on the board
    let (status, body) = fixture.propose(&a_jwt, &c_id, "board", "alumni").await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "INVALID_TRANSITION");

    // fromRole is not board
    let (status, body) = fixture.propose(&a_jwt, &b_id, "member", "alumni").await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "INVALID_TRANSITION");

    // Unknown role strings do not get past the permission and transition checks
    let (status, body) = fixture.propose(&c_jwt, &b_id, "board", "chairman").await;
    assert_eq!(status, 403);
    assert_eq!(body["error"]["code"], "PERMISSION_DENIED");
    let (status, body) = fixture.propose(&a_jwt, &b_id, "bph", "alumni").await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "INVALID_TRANSITION");

    // Missing fields
    let (status, body) = fixture.propose(&a_jwt, "", "board", "alumni").await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    // Only the addressee may resolve
    let (_, body) = fixture.propose(&a_jwt, &b_id, "board", "alumni").await;
    let request_id = body["data"]["requestId"].as_str().unwrap().to_string();
    for jwt in [&a_jwt, &c_jwt] {
        let (status, body) = fixture
            .put_as(jwt, &format!("/api/status-change/{}/accept", request_id))
            .await;
        assert_eq!(status, 403);
        assert_eq!(body["error"]["code"], "PERMISSION_DENIED");
    }

    let (status, body) = fixture
        .put_as(&a_jwt, "/api/status-change/no-such-request/reject")
        .await;
    assert_eq!(status, 404);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_mark_as_read() {
    let fixture = TestFixture::new().await;
    let (_, a_jwt) = fixture.session("13.24.001", "Ayu", "board").await;
    let (b_id, b_jwt) = fixture.session("13.24.002", "Budi", "board").await;

    let (_, body) = fixture.propose(&a_jwt, &b_id, "board", "alumni").await;
    let notification_id = body["data"]["notificationId"].as_str().unwrap().to_string();

    // Not the owner, and not existing, both read as not found
    for (jwt, id) in [(&a_jwt, notification_id.as_str()), (&b_jwt, "missing")] {
        let (status, body) = fixture
            .put_as(jwt, &format!("/api/notifications/{}/read", id))
            .await;
        assert_eq!(status, 404);
        assert_eq!(
            body["error"]["message"],
            "Notification not found or not owned by member"
        );
    }

    let (status, _) = fixture
        .put_as(&b_jwt, &format!("/api/notifications/{}/read", notification_id))
        .await;
    assert_eq!(status, 200);

    let (_, body) = fixture.get_as(&b_jwt, "/api/notifications").await;
    assert!(body["data"][0]["readAt"].is_string());
    assert_eq!(body["data"][0]["pending"], true);

    let (_, body) = fixture.get_as(&b_jwt, "/api/notifications/unread-count").await;
    assert_eq!(body["data"]["count"], 0);
}

#[tokio::test]
async fn test_admin_role_update_sends_request() {
    let fixture = TestFixture::new().await;
    let (a_id, _) = fixture.session("13.24.001", "Ayu", "board").await;
    let (b_id, b_jwt) = fixture.session("13.24.002", "Budi", "board").await;

    let (status, body) = fixture
        .admin_update(&b_id, &[("role", "supervisory_board"), ("requestedBy", a_id.as_str())])
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["notificationSent"], true);
    assert_eq!(body["data"]["member"]["role"], "board");
    let notification_id = body["data"]["notificationId"].as_str().unwrap().to_string();

    let (_, body) = fixture.get_as(&b_jwt, "/api/notifications").await;
    assert_eq!(body["data"][0]["id"], notification_id.as_str());
    let request_id = body["data"][0]["metadata"]["requestId"]
        .as_str()
        .unwrap()
        .to_string();

    let (_, body) = fixture
        .put_as(&b_jwt, &format!("/api/status-change/{}/accept", request_id))
        .await;
    assert_eq!(body["data"]["newRole"], "supervisory_board");

    // Referenced members cannot be deleted
    let resp = fixture
        .client
        .delete(fixture.url(&format!("/api/member/{}", a_id)))
        .header("x-api-key", ADMIN_KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "CONFLICT");

    // Unknown requester rolls the whole update back
    let (status, _) = fixture
        .admin_update(
            &b_id,
            &[("name", "Budi S."), ("role", "alumni"), ("requestedBy", "ghost")],
        )
        .await;
    assert_eq!(status, 404);
    let (_, body) = fixture.admin_get_member(&b_id).await;
    assert_eq!(body["data"]["name"], "Budi");
    assert_eq!(body["data"]["photo"], "13.24.002_Budi.jpg");
    assert!(fixture.upload_exists("13.24.002_Budi.jpg"));
    assert!(!fixture.upload_exists("13.24.002_Budi_S..jpg"));
}

#[tokio::test]
async fn test_malformed_json_uses_error_envelope() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .post(fixture.url("/api/auth/login"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}
