#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use mentorlink::{
    app,
    auth::{ApprovalStatus, Gate, Role, SqliteIdentityGate},
    config::{Config, DatabaseConfig},
    db, AppState,
};
use reqwest::{Client, Response};
use serde_json::Value;
use sqlx::SqlitePool;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

pub type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct TestApp {
    pub addr: SocketAddr,
    pub db_pool: SqlitePool,
    pub client: Client,
}

#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: i64,
    pub token: String,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(Config::default()).await
    }

    pub async fn spawn_with(mut config: Config) -> Self {
        config.database = DatabaseConfig::in_memory();
        let db_pool = db::connect(&config.database).await.expect("database");
        let gate = Gate::new(SqliteIdentityGate::new(db_pool.clone()));
        let state = AppState::new(db_pool.clone(), gate, config);

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, app(state)).await.expect("server");
        });

        Self { addr, db_pool, client: Client::new() }
    }

    pub async fn user(&self, name: &str, role: Role, approval_status: ApprovalStatus) -> TestUser {
        let (id,): (i64,) =
            sqlx::query_as("INSERT INTO users (name,role,approval_status) VALUES (?,?,?) RETURNING id")
                .bind(name)
                .bind(role)
                .bind(approval_status)
                .fetch_one(&self.db_pool)
                .await
                .expect("insert user");

        let token = format!("test-token-{id}");
        sqlx::query("INSERT INTO auth_tokens (token,user_id) VALUES (?,?)")
            .bind(&token)
            .bind(id)
            .execute(&self.db_pool)
            .await
            .expect("insert token");

        TestUser { id, token }
    }

    pub async fn approved(&self, name: &str, role: Role) -> TestUser {
        self.user(name, role, ApprovalStatus::Approved).await
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    pub async fn get(&self, user: &TestUser, path: &str) -> Response {
        self.client
            .get(self.url(path))
            .bearer_auth(&user.token)
            .send()
            .await
            .expect("GET")
    }

    pub async fn post(&self, user: &TestUser, path: &str, body: Value) -> Response {
        self.client
            .post(self.url(path))
            .bearer_auth(&user.token)
            .json(&body)
            .send()
            .await
            .expect("POST")
    }

    pub async fn connect(&self, user: &TestUser) -> Socket {
        let url = format!("ws://{}/ws?token={}", self.addr, user.token);
        let (socket, _) = connect_async(url).await.expect("websocket handshake");
        socket
    }

    /// Create a request from `student` and have `alumni` approve it.
    pub async fn activate(&self, student: &TestUser, alumni: &TestUser) -> Value {
        let request: Value = self
            .post(
                student,
                "/match/request",
                serde_json::json!({ "alumniId": alumni.id, "coverLetter": cover_letter(120) }),
            )
            .await
            .json()
            .await
            .expect("request body");
        let outcome: Value = self
            .post(alumni, &format!("/match/{}/approve", request["id"]), Value::Null)
            .await
            .json()
            .await
            .expect("approval body");
        outcome["match"].clone()
    }
}

pub fn cover_letter(len: usize) -> String {
    "I am keen to learn how production services are run. "
        .chars()
        .cycle()
        .take(len - 1)
        .chain(std::iter::once('.'))
        .collect()
}

pub async fn send_event(socket: &mut Socket, event: Value) {
    socket
        .send(Message::text(event.to_string()))
        .await
        .expect("send frame");
}

/// Next JSON event, failing the test after a few seconds of silence.
pub async fn next_event(socket: &mut Socket) -> Value {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("timed out waiting for an event")
            .expect("socket closed")
            .expect("socket error");
        if let Message::Text(text) = frame {
            return serde_json::from_str(text.as_str()).expect("json event");
        }
    }
}
