use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use reqwest::Client;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use serde_json::{json, Value};
use tempfile::TempDir;

use excel_insight::config::{Config, StorageConfig, SummaryConfig, DEFAULT_MAX_UPLOAD_BYTES};
use excel_insight::services::accounts;
use migration::{Migrator, MigratorTrait};

pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const ADMIN_PASSWORD: &str = "admin-password";

pub mod routes {
    pub const REGISTER: &str = "/api/auth/register";
    pub const LOGIN: &str = "/api/auth/login";
    pub const ME: &str = "/api/auth/me";
    pub const UPLOADS: &str = "/api/uploads";
    pub const ADMIN_STATS: &str = "/api/admin/stats";
    pub const ADMIN_USERS: &str = "/api/admin/users";

    pub fn upload(id: &str) -> String {
        format!("/api/uploads/{id}")
    }

    pub fn upload_config(id: &str) -> String {
        format!("/api/uploads/{id}/config")
    }

    pub fn upload_pdf(id: &str) -> String {
        format!("/api/uploads/{id}/download/pdf")
    }

    pub fn admin_user(id: &str) -> String {
        format!("/api/admin/users/{id}")
    }

    pub fn admin_block(id: &str) -> String {
        format!("/api/admin/users/{id}/block")
    }

    pub fn admin_unblock(id: &str) -> String {
        format!("/api/admin/users/{id}/unblock")
    }
}

/// A running test server backed by a throwaway SQLite file and uploads directory.
pub struct TestApp {
    pub addr: SocketAddr,
    pub client: Client,
    /// The served router, for requests that should not go over a socket.
    pub router: axum::Router,
    pub db: DatabaseConnection,
    pub uploads_dir: PathBuf,
    _dir: TempDir,
}

/// Parsed HTTP response for test assertions.
pub struct TestResponse {
    pub status: u16,
    pub text: String,
    /// Parsed JSON body, or `Null` if the response is not valid JSON.
    pub body: Value,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with_upload_limit(DEFAULT_MAX_UPLOAD_BYTES).await
    }

    pub async fn spawn_with_upload_limit(max_upload_bytes: usize) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let db_url = format!("sqlite://{}?mode=rwc", dir.path().join("app.db").display());
        let uploads_dir = dir.path().join("uploads");

        let mut opts = ConnectOptions::new(db_url.clone());
        opts.max_connections(1).sqlx_logging(false);
        let db = Database::connect(opts)
            .await
            .expect("Failed to connect to test database");
        Migrator::up(&db, None)
            .await
            .expect("Failed to run migrations");

        accounts::seed_admin(&db, ADMIN_EMAIL, ADMIN_PASSWORD)
            .await
            .expect("Failed to seed admin");

        let config = Config {
            database_url: db_url,
            jwt_secret: "test-secret-for-integration-tests".to_string(),
            jwt_expiration_hours: 1,
            host: "127.0.0.1".to_string(),
            port: 0,
            cors_origins: vec!["*".to_string()],
            max_upload_bytes,
            storage: StorageConfig::Local {
                root: uploads_dir.clone(),
            },
            summary: SummaryConfig {
                api_key: None,
                base_url: "http://127.0.0.1:9".to_string(),
                model: "gpt-4o-mini".to_string(),
                timeout: Duration::from_secs(1),
            },
            admin_seed: None,
        };

        let state = excel_insight::build_state(db.clone(), config)
            .await
            .expect("Failed to build app state");
        let router = excel_insight::build_router(state);
        let app = router.clone();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            client: Client::new(),
            router,
            db,
            uploads_dir,
            _dir: dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn post_without_token(&self, path: &str, body: &Value) -> TestResponse {
        let res = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("Failed to send POST request");

        TestResponse::from_response(res).await
    }

    pub async fn post_with_token(&self, path: &str, body: &Value, token: &str) -> TestResponse {
        let res = self
            .client
            .post(self.url(path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .expect("Failed to send POST request");

        TestResponse::from_response(res).await
    }

    pub async fn get_without_token(&self, path: &str) -> TestResponse {
        let res = self
            .client
            .get(self.url(path))
            .send()
            .await
            .expect("Failed to send GET request");

        TestResponse::from_response(res).await
    }

    pub async fn get_with_token(&self, path: &str, token: &str) -> TestResponse {
        let res = self
            .client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("Failed to send GET request");

        TestResponse::from_response(res).await
    }

    pub async fn patch_with_token(&self, path: &str, token: &str) -> TestResponse {
        let res = self
            .client
            .patch(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("Failed to send PATCH request");

        TestResponse::from_response(res).await
    }

    pub async fn delete_with_token(&self, path: &str, token: &str) -> TestResponse {
        let res = self
            .client
            .delete(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("Failed to send DELETE request");

        TestResponse::from_response(res).await
    }

    pub async fn upload_with_token(&self, file_name: &str, file_bytes: Vec<u8>, token: &str) -> TestResponse {
        let part = reqwest::multipart::Part::bytes(file_bytes)
            .file_name(file_name.to_string())
            .mime_str("application/vnd.openxmlformats-officedocument.spreadsheetml.sheet")
            .expect("Failed to set MIME type");
        let form = reqwest::multipart::Form::new().part("file", part);

        let res = self
            .client
            .post(self.url(routes::UPLOADS))
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await
            .expect("Failed to send multipart upload request");

        TestResponse::from_response(res).await
    }

    /// Register a user and return `(token, user id)`.
    pub async fn register(&self, name: &str, email: &str, password: &str) -> (String, String) {
        let res = self
            .post_without_token(
                routes::REGISTER,
                &json!({"name": name, "email": email, "password": password}),
            )
            .await;
        assert_eq!(res.status, 201, "Registration failed: {}", res.text);
        (res.token(), res.body["user"]["id"].as_str().unwrap().to_string())
    }

    pub async fn login(&self, email: &str, password: &str) -> TestResponse {
        self.post_without_token(routes::LOGIN, &json!({"email": email, "password": password}))
            .await
    }

    pub async fn admin_token(&self) -> String {
        let res = self.login(ADMIN_EMAIL, ADMIN_PASSWORD).await;
        assert_eq!(res.status, 200, "Admin login failed: {}", res.text);
        res.token()
    }

    /// Upload the Month/Sales workbook and return the new upload's id.
    pub async fn upload_sales(&self, token: &str) -> String {
        let res = self.upload_with_token("sales.xlsx", sales_workbook(), token).await;
        assert_eq!(res.status, 201, "Upload failed: {}", res.text);
        res.id()
    }

    pub fn stored_files(&self) -> usize {
        std::fs::read_dir(&self.uploads_dir)
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}

impl TestResponse {
    pub async fn from_response(res: reqwest::Response) -> Self {
        let status = res.status().as_u16();
        let text = res.text().await.unwrap_or_default();
        let body = serde_json::from_str(&text).unwrap_or(Value::Null);
        Self { status, text, body }
    }

    pub fn id(&self) -> String {
        self.body["id"]
            .as_str()
            .expect("response body should contain 'id'")
            .to_string()
    }

    pub fn token(&self) -> String {
        self.body["token"]
            .as_str()
            .expect("response body should contain 'token'")
            .to_string()
    }
}

/// Three data rows under `Month` and `Sales`.
pub fn sales_workbook() -> Vec<u8> {
    let mut workbook = rust_xlsxwriter::Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.write_string(0, 0, "Month").unwrap();
    sheet.write_string(0, 1, "Sales").unwrap();
    for (i, (month, sales)) in [("Jan", 100.0), ("Feb", 150.5), ("Mar", 120.0)].iter().enumerate() {
        sheet.write_string(i as u32 + 1, 0, *month).unwrap();
        sheet.write_number(i as u32 + 1, 1, *sales).unwrap();
    }
    workbook.save_to_buffer().unwrap()
}

/// A `multipart/form-data` body holding one `file` field, and its content type.
pub fn multipart_body(file_name: &str, file_bytes: &[u8]) -> (String, Vec<u8>) {
    const BOUNDARY: &str = "excel-insight-test-boundary";
    let mut body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(file_bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    (format!("multipart/form-data; boundary={BOUNDARY}"), body)
}

pub const ONE_PIXEL_PNG: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";
