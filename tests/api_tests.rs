use bridgepoint_api::{
    AppConfig, AppState, InMemoryRepository, MockStorageService, bootstrap,
    config::parse_origins, create_router, repository::RepositoryState, storage::StorageState,
};
use reqwest::StatusCode;
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::net::TcpListener;

#[derive(Debug)]
pub struct TestApp {
    pub address: String,
    pub client: reqwest::Client,
}

impl TestApp {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    async fn login(&self, username: &str, password: &str) -> String {
        let response = self
            .client
            .post(self.url("/api/auth/login"))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await
            .expect("login request failed");
        assert_eq!(response.status(), StatusCode::OK);

        let body: Value = response.json().await.unwrap();
        body["token"].as_str().unwrap().to_string()
    }

    async fn admin_token(&self) -> String {
        self.login("admin", "admin123").await
    }

    /// Registers an extra account through the admin endpoint and returns its token.
    async fn register(&self, admin_token: &str, username: &str, role: &str) -> Value {
        let response = self
            .client
            .post(self.url("/api/auth/register"))
            .bearer_auth(admin_token)
            .json(&json!({ "username": username, "password": "pw-123", "role": role }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        response.json().await.unwrap()
    }
}

/// Starts the full router on a random port with an in-memory store and the default
/// `admin`/`admin123` account.
async fn spawn_app() -> TestApp {
    spawn_app_with(AppConfig::default()).await
}

async fn spawn_app_with(config: AppConfig) -> TestApp {
    let repo = Arc::new(InMemoryRepository::new()) as RepositoryState;
    let storage = Arc::new(MockStorageService::new()) as StorageState;
    let config = AppConfig {
        admin_username: Some("admin".to_string()),
        admin_password: Some("admin123".to_string()),
        ..config
    };

    bootstrap::ensure_admin(&repo, &config)
        .await
        .expect("bootstrap failed");

    let router = create_router(AppState {
        repo,
        storage,
        config,
    });

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestApp {
        address,
        client: reqwest::Client::new(),
    }
}

#[tokio::test]
async fn test_health_check() {
    let app = spawn_app().await;
    let response = app.client.get(app.url("/health")).send().await.expect("req fail");
    assert!(response.status().is_success());
    assert_eq!(response.text().await.unwrap(), "ok");
}

#[tokio::test]
async fn test_wrong_password_is_invalid_credentials() {
    let app = spawn_app().await;
    let response = app
        .client
        .post(app.url("/api/auth/login"))
        .json(&json!({ "username": "admin", "password": "wrongpass" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "success": false, "message": "Invalid credentials" }));
}

#[tokio::test]
async fn test_malformed_json_is_a_validation_error() {
    let app = spawn_app().await;
    let response = app
        .client
        .post(app.url("/api/auth/login"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_contact_form_submission() {
    let app = spawn_app().await;
    let response = app
        .client
        .post(app.url("/api/messages"))
        .json(&json!({ "name": "A", "email": "a@b.com", "message": "hi" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "new");
    assert_eq!(body["data"]["email"], "a@b.com");
}

#[tokio::test]
async fn test_empty_event_listing() {
    let app = spawn_app().await;
    let response = app
        .client
        .get(app.url("/api/events?page=1&limit=10"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"], json!([]));
    assert_eq!(body["total"], 0);
    assert_eq!(body["pages"], 0);
    assert_eq!(body["count"], 0);
    assert_eq!(body["page"], 1);
}

#[tokio::test]
async fn test_event_lifecycle() {
    let app = spawn_app().await;
    let token = app.admin_token().await;

    // Anonymous writes are rejected before the handler runs.
    let anonymous = app
        .client
        .post(app.url("/api/events"))
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    // Create
    let response = app
        .client
        .post(app.url("/api/events"))
        .bearer_auth(&token)
        .json(&json!({
            "title": "Leadership Forum",
            "description": "Annual forum",
            "date": "2030-05-01T15:00:00Z",
            "location": "Washington D.C.",
            "registrationRequired": true
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created: Value = response.json().await.unwrap();
    let id = created["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(
        created["data"]["imageUrl"],
        "https://placehold.co/600x400?text=Event+Image"
    );

    // Public read
    let fetched: Value = app
        .client
        .get(app.url(&format!("/api/events/{id}")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched["data"]["title"], "Leadership Forum");
    assert_eq!(fetched["data"]["registrationRequired"], true);

    // Update
    let response = app
        .client
        .put(app.url(&format!("/api/events/{id}")))
        .bearer_auth(&token)
        .json(&json!({ "status": "cancelled" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let updated: Value = response.json().await.unwrap();
    assert_eq!(updated["data"]["status"], "cancelled");
    assert_eq!(updated["data"]["location"], "Washington D.C.");

    // Delete
    let response = app
        .client
        .delete(app.url(&format!("/api/events/{id}")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let gone = app
        .client
        .get(app.url(&format!("/api/events/{id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_event_id_is_bad_request() {
    let app = spawn_app().await;
    let response = app
        .client
        .get(app.url("/api/events/12345"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Invalid event ID format");
}

#[tokio::test]
async fn test_staff_can_triage_but_not_delete_messages() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let staff = app.register(&admin, "sam", "staff").await;
    let staff_token = staff["token"].as_str().unwrap();

    let submitted: Value = app
        .client
        .post(app.url("/api/messages"))
        .json(&json!({ "name": "A", "email": "a@b.com", "message": "hi" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let id = submitted["data"]["id"].as_str().unwrap().to_string();

    let listing = app
        .client
        .get(app.url("/api/messages?status=new"))
        .bearer_auth(staff_token)
        .send()
        .await
        .unwrap();
    assert_eq!(listing.status(), StatusCode::OK);
    let listing: Value = listing.json().await.unwrap();
    assert_eq!(listing["total"], 1);

    let status = app
        .client
        .put(app.url(&format!("/api/messages/{id}/status")))
        .bearer_auth(staff_token)
        .json(&json!({ "status": "read" }))
        .send()
        .await
        .unwrap();
    assert_eq!(status.status(), StatusCode::OK);

    let bad_status = app
        .client
        .put(app.url(&format!("/api/messages/{id}/status")))
        .bearer_auth(staff_token)
        .json(&json!({ "status": "spam" }))
        .send()
        .await
        .unwrap();
    assert_eq!(bad_status.status(), StatusCode::BAD_REQUEST);

    let stats: Value = app
        .client
        .get(app.url("/api/messages/stats"))
        .bearer_auth(staff_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["data"], json!({"total": 1, "new": 0, "read": 1, "replied": 0, "archived": 0}));

    let forbidden = app
        .client
        .delete(app.url(&format!("/api/messages/{id}")))
        .bearer_auth(staff_token)
        .send()
        .await
        .unwrap();
    assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

    let deleted = app
        .client
        .delete(app.url(&format!("/api/messages/{id}")))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(deleted.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_anonymous_inbox_access_is_unauthorized() {
    let app = spawn_app().await;
    let response = app.client.get(app.url("/api/messages")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Access denied. No token provided.");
}

#[tokio::test]
async fn test_last_admin_is_protected_over_http() {
    let app = spawn_app().await;
    let token = app.admin_token().await;

    let me: Value = app
        .client
        .get(app.url("/api/auth/me"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let admin_id = me["data"]["id"].as_str().unwrap().to_string();

    let response = app
        .client
        .delete(app.url(&format!("/api/users/{admin_id}")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Cannot delete the last admin user");

    let stats: Value = app
        .client
        .get(app.url("/api/users/stats"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["data"]["admins"], 1);
}

#[tokio::test]
async fn test_settings_access_rules() {
    let app = spawn_app().await;
    let token = app.admin_token().await;

    let public: Value = app
        .client
        .get(app.url("/api/settings"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(public["data"]["general"].is_object());
    assert!(public["data"]["security"].is_null());

    let anonymous_write = app
        .client
        .put(app.url("/api/settings/general"))
        .json(&json!({ "data": { "siteName": "Hijacked" } }))
        .send()
        .await
        .unwrap();
    assert_eq!(anonymous_write.status(), StatusCode::UNAUTHORIZED);

    let write = app
        .client
        .put(app.url("/api/settings/general"))
        .bearer_auth(&token)
        .json(&json!({ "data": { "contactPhone": "(555) 010-0000" } }))
        .send()
        .await
        .unwrap();
    assert_eq!(write.status(), StatusCode::OK);

    let general: Value = app
        .client
        .get(app.url("/api/settings/general"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(general["data"]["contactPhone"], "(555) 010-0000");
    assert_eq!(general["data"]["siteName"], "BridgePoint Strategies");

    let security = app
        .client
        .get(app.url("/api/settings/security"))
        .send()
        .await
        .unwrap();
    assert_eq!(security.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_change_password_then_login() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let staff = app.register(&admin, "writer", "staff").await;
    let staff_token = staff["token"].as_str().unwrap();

    let response = app
        .client
        .post(app.url("/api/users/change-password"))
        .bearer_auth(staff_token)
        .json(&json!({ "currentPassword": "pw-123", "newPassword": "pw-456" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    app.login("writer", "pw-456").await;
}

#[tokio::test]
async fn test_request_id_is_propagated() {
    let app = spawn_app().await;
    let response = app.client.get(app.url("/health")).send().await.unwrap();
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let app = spawn_app().await;
    let doc: Value = app
        .client
        .get(app.url("/api-docs/openapi.json"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(doc["paths"]["/api/events"].is_object());
    assert!(doc["components"]["securitySchemes"]["bearer"].is_object());
}

#[tokio::test]
async fn test_admin_form_payload_creates_event() {
    let app = spawn_app().await;
    let token = app.admin_token().await;

    let image = reqwest::multipart::Part::bytes(b"\x89PNG\r\n\x1a\nfake".to_vec())
        .file_name("flyer.png")
        .mime_str("image/png")
        .unwrap();
    let uploaded: Value = app
        .client
        .post(app.url("/api/events/upload"))
        .bearer_auth(&token)
        .multipart(reqwest::multipart::Form::new().part("image", image))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let file_path = uploaded["data"]["filePath"].as_str().unwrap().to_string();

    // Shape sent by the admin event form: date input value plus the uploaded path.
    let form = json!({
        "title": "Diaspora Investment Forum",
        "description": "Connecting investors with regional projects",
        "date": "2025-06-01",
        "location": "Washington D.C.",
        "imageUrl": file_path,
        "featured": true,
        "registrationLink": "",
        "registrationRequired": false,
        "status": "upcoming"
    });
    let response = app
        .client
        .post(app.url("/api/events"))
        .bearer_auth(&token)
        .json(&form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let created: Value = response.json().await.unwrap();
    let id = created["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(created["data"]["date"], "2025-06-01T00:00:00Z");
    assert_eq!(created["data"]["imageUrl"], file_path);

    let mut edited = form.clone();
    edited["date"] = json!("2025-06-02");
    let response = app
        .client
        .put(app.url(&format!("/api/events/{id}")))
        .bearer_auth(&token)
        .json(&edited)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let updated: Value = response.json().await.unwrap();
    assert_eq!(updated["data"]["date"], "2025-06-02T00:00:00Z");
}

#[tokio::test]
async fn test_wildcard_cors_origin_echoes_caller() {
    let app = spawn_app_with(AppConfig {
        cors_origins: parse_origins("*"),
        ..AppConfig::default()
    })
    .await;

    let response = app
        .client
        .get(app.url("/health"))
        .header("Origin", "https://partner.example")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "https://partner.example"
    );
    assert_eq!(response.headers()["access-control-allow-credentials"], "true");
}

#[tokio::test]
async fn test_unlisted_cors_origin_is_not_allowed() {
    let app = spawn_app().await;

    let response = app
        .client
        .get(app.url("/health"))
        .header("Origin", "https://unknown.example")
        .send()
        .await
        .unwrap();
    assert!(!response.headers().contains_key("access-control-allow-origin"));

    let response = app
        .client
        .get(app.url("/health"))
        .header("Origin", "http://localhost:8080")
        .send()
        .await
        .unwrap();
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "http://localhost:8080"
    );
}
