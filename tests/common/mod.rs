//! Shared harness for integration tests: a server on a throwaway SQLite file,
//! an HTTP client, and shortcuts for the setup most scenarios need.

#![allow(dead_code)]

use once_cell::sync::Lazy;
use reqwest::Client;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::net::TcpListener;
use uuid::Uuid;

use diesel::prelude::*;
use projecthub::{
    auth::TokenIssuer, create_db_pool_with_url, create_router, run_migrations, AppState, Config,
    DbPool,
};

/// Ed25519 key shared by every test server in this binary.
pub static TEST_JWT_PRIVATE_KEY: Lazy<String> = Lazy::new(TokenIssuer::generate_private_key);

pub const PASSWORD: &str = "password123";

pub struct TestApp {
    pub client: Client,
    pub base_url: String,
    pub db_pool: DbPool,
    _dir: TempDir,
}

#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: i64,
    pub email: String,
    pub access_token: String,
}

impl TestApp {
    pub async fn spawn() -> Self {
        std::env::set_var("JWT_PRIVATE_KEY", TEST_JWT_PRIVATE_KEY.as_str());

        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let db_path = dir.path().join("projecthub.db");
        let db_url = db_path.to_str().expect("utf-8 temp path").to_string();

        let db_pool = create_db_pool_with_url(&db_url);
        run_migrations(&db_pool).expect("Failed to run migrations");

        let config = Config::default_for_testing();
        let state = AppState::new(db_pool.clone(), &config);
        let app = create_router(state, &config);

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test server");
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
            )
            .await
            .unwrap();
        });

        Self {
            client: Client::new(),
            base_url: format!("http://127.0.0.1:{}", port),
            db_pool,
            _dir: dir,
        }
    }

    pub fn ws_url(&self, token: &str) -> String {
        format!(
            "{}/notifhub?access_token={}",
            self.base_url.replacen("http://", "ws://", 1),
            token
        )
    }

    pub fn unique_email(prefix: &str) -> String {
        format!("{}_{}@example.com", prefix, Uuid::new_v4().simple())
    }

    pub async fn register(&self, first_name: &str) -> TestUser {
        let email = Self::unique_email(&first_name.to_lowercase());
        let response = self
            .post_public(
                "/auth/register",
                json!({
                    "email": email,
                    "password": PASSWORD,
                    "first_name": first_name,
                    "last_name": "Tester"
                }),
            )
            .await;
        assert_eq!(response.status().as_u16(), 201, "registration failed");

        let body: Value = response.json().await.expect("Failed to parse registration");
        TestUser {
            id: body["data"]["user"]["id"].as_i64().expect("user id"),
            email: body["data"]["user"]["email"].as_str().expect("email").to_string(),
            access_token: body["data"]["access_token"]
                .as_str()
                .expect("access token")
                .to_string(),
        }
    }

    /// Creates a project owned by `owner` and returns its `data.project` object.
    pub async fn create_project(&self, owner: &TestUser, title: &str) -> Value {
        let response = self
            .post(
                "/projects",
                &owner.access_token,
                json!({ "title": title, "category": "Testing" }),
            )
            .await;
        assert_eq!(response.status().as_u16(), 201, "project creation failed");
        let body: Value = response.json().await.expect("Failed to parse project");
        body["data"]["project"].clone()
    }

    /// Adds `user` to the project directly and returns the new member id.
    pub async fn add_member(
        &self,
        admin: &TestUser,
        project_id: i64,
        user: &TestUser,
        role: &str,
    ) -> i64 {
        let response = self
            .post(
                &format!("/projects/{}/members", project_id),
                &admin.access_token,
                json!({ "email": user.email, "role": role }),
            )
            .await;
        assert_eq!(response.status().as_u16(), 201, "adding member failed");
        let body: Value = response.json().await.expect("Failed to parse member");
        body["data"]["member_id"].as_i64().expect("member id")
    }

    /// Creates a task with the given assignee member ids and returns its id.
    pub async fn create_task(
        &self,
        actor: &TestUser,
        project_id: i64,
        name: &str,
        assignees: &[i64],
    ) -> i64 {
        let response = self
            .post(
                &format!("/projects/{}/tasks", project_id),
                &actor.access_token,
                json!({ "name": name, "assignees": assignees }),
            )
            .await;
        assert_eq!(response.status().as_u16(), 201, "task creation failed");
        let body: Value = response.json().await.expect("Failed to parse task");
        body["data"]["id"].as_i64().expect("task id")
    }

    pub async fn get(&self, path: &str, token: &str) -> reqwest::Response {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(token)
            .send()
            .await
            .expect("Failed to send GET request")
    }

    pub async fn post(&self, path: &str, token: &str, body: Value) -> reqwest::Response {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .expect("Failed to send POST request")
    }

    pub async fn put(&self, path: &str, token: &str, body: Value) -> reqwest::Response {
        self.client
            .put(format!("{}{}", self.base_url, path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .expect("Failed to send PUT request")
    }

    pub async fn delete(&self, path: &str, token: &str) -> reqwest::Response {
        self.client
            .delete(format!("{}{}", self.base_url, path))
            .bearer_auth(token)
            .send()
            .await
            .expect("Failed to send DELETE request")
    }

    pub async fn get_public(&self, path: &str) -> reqwest::Response {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
            .expect("Failed to send GET request")
    }

    pub async fn post_public(&self, path: &str, body: Value) -> reqwest::Response {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .json(&body)
            .send()
            .await
            .expect("Failed to send POST request")
    }

    /// Notification types stored for `user_id`, oldest first.
    pub fn notification_types(&self, user_id: i64) -> Vec<String> {
        use projecthub::schema::notifications;

        let mut conn = self.db_pool.get().expect("Failed to get connection");
        notifications::table
            .filter(notifications::user_id.eq(user_id as i32))
            .order(notifications::id.asc())
            .select(notifications::notification_type)
            .load::<projecthub::models::NotificationType>(&mut conn)
            .expect("Failed to load notifications")
            .into_iter()
            .map(|kind| kind.to_string())
            .collect()
    }
}

pub async fn json_body(response: reqwest::Response) -> Value {
    response.json().await.expect("Failed to parse response body")
}

#[macro_export]
macro_rules! assert_status {
    ($response:expr, $expected:expr) => {
        assert_eq!(
            $response.status().as_u16(),
            $expected,
            "Expected status {}, got {}",
            $expected,
            $response.status()
        );
    };
}
