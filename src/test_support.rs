//! Runs the real router on an ephemeral port over in-memory repositories.

use std::sync::Arc;

use reqwest::{multipart, Client, Method};
use serde_json::{json, Value};

use crate::{
    app::build_app,
    state::AppState,
    storage::{fake::FakeStorage, StorageClient},
    users::model::User,
};

pub const TEST_PASSWORD: &str = "password123";

pub struct TestResponse {
    pub status: u16,
    pub body: Value,
    pub text: String,
}

pub struct TestApp {
    pub base_url: String,
    pub state: AppState,
    pub storage: Arc<FakeStorage>,
    client: Client,
}

impl TestApp {
    pub async fn spawn() -> Self {
        let storage = Arc::new(FakeStorage::default());
        let state = AppState::fake(storage.clone() as Arc<dyn StorageClient>);
        let app = build_app(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind ephemeral port");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("server runs");
        });

        Self {
            base_url: format!("http://{addr}"),
            state,
            storage,
            client: Client::new(),
        }
    }

    async fn send(&self, req: reqwest::RequestBuilder, token: Option<&str>) -> TestResponse {
        let req = match token {
            Some(t) => req.bearer_auth(t),
            None => req,
        };
        let res = req.send().await.expect("request sent");
        let status = res.status().as_u16();
        let text = res.text().await.expect("response body");
        let body = serde_json::from_str(&text).unwrap_or(Value::Null);
        TestResponse { status, body, text }
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        self.client.request(method, format!("{}{}", self.base_url, path))
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> TestResponse {
        self.send(self.request(Method::GET, path), token).await
    }

    pub async fn post(&self, path: &str, token: Option<&str>, body: &Value) -> TestResponse {
        self.send(self.request(Method::POST, path).json(body), token)
            .await
    }

    pub async fn put(&self, path: &str, token: Option<&str>, body: &Value) -> TestResponse {
        self.send(self.request(Method::PUT, path).json(body), token)
            .await
    }

    pub async fn patch(&self, path: &str, token: Option<&str>, body: &Value) -> TestResponse {
        self.send(self.request(Method::PATCH, path).json(body), token)
            .await
    }

    pub async fn post_raw(&self, path: &str, body: &'static str) -> TestResponse {
        let req = self
            .request(Method::POST, path)
            .header("content-type", "application/json")
            .body(body);
        self.send(req, None).await
    }

    pub async fn upload(
        &self,
        path: &str,
        token: Option<&str>,
        field: &str,
        filename: &str,
        bytes: Vec<u8>,
    ) -> TestResponse {
        let part = multipart::Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str("image/jpeg")
            .expect("valid mime");
        let form = multipart::Form::new().part(field.to_string(), part);
        self.send(self.request(Method::POST, path).multipart(form), token)
            .await
    }

    pub async fn create_user(&self, email: &str, password: &str) {
        let res = self
            .post("/user/", None, &json!({"email": email, "password": password}))
            .await;
        assert_eq!(res.status, 201, "create user failed: {}", res.text);
    }

    /// Registers `email` with [`TEST_PASSWORD`] and returns a bearer token for it.
    pub async fn login_as(&self, email: &str) -> String {
        self.create_user(email, TEST_PASSWORD).await;
        let res = self
            .post(
                "/user/auth/",
                None,
                &json!({"email": email, "password": TEST_PASSWORD}),
            )
            .await;
        assert_eq!(res.status, 200, "token request failed: {}", res.text);
        res.body["token"].as_str().expect("token").to_string()
    }

    pub async fn user(&self, email: &str) -> Option<User> {
        self.state
            .users
            .find_by_email(email)
            .await
            .expect("user lookup")
    }
}
