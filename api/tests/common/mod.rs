#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use blog_api::{
    AppState, build_router,
    db::{MemoryStore, Store},
    notify::{MailTransport, NotificationError, NotificationGateway, OutgoingEmail, QueueTransport},
    queue::QueueRegistry,
};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

pub const QUEUE_URL: &str = "https://sqs.local/000000000000/hono-lambda";

/// Mail and queue transport that records what it was asked to send.
#[derive(Default)]
pub struct RecordingTransport {
    pub fail: bool,
    pub mails: Mutex<Vec<OutgoingEmail>>,
    pub messages: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl MailTransport for RecordingTransport {
    async fn send(&self, email: &OutgoingEmail) -> Result<String, NotificationError> {
        if self.fail {
            return Err(NotificationError::Provider("mail provider down".into()));
        }
        let mut mails = self.mails.lock().unwrap();
        mails.push(email.clone());
        Ok(format!("mail-{}", mails.len()))
    }
}

#[async_trait]
impl QueueTransport for RecordingTransport {
    async fn send(&self, queue_url: &str, body: &str) -> Result<String, NotificationError> {
        if self.fail {
            return Err(NotificationError::Provider("queue provider down".into()));
        }
        let mut messages = self.messages.lock().unwrap();
        messages.push((queue_url.to_string(), body.to_string()));
        Ok(format!("msg-{}", messages.len()))
    }
}

pub struct TestApp {
    pub router: Router,
    pub transport: Arc<RecordingTransport>,
    pub queues: Arc<QueueRegistry>,
}

pub fn test_app() -> TestApp {
    app_with(RecordingTransport::default(), QueueRegistry::with_default_queue(Some(QUEUE_URL.into())))
}

pub fn app_with(transport: RecordingTransport, queues: QueueRegistry) -> TestApp {
    app_with_store(Arc::new(MemoryStore::new()), transport, queues)
}

pub fn app_with_store(
    store: Arc<dyn Store>,
    transport: RecordingTransport,
    queues: QueueRegistry,
) -> TestApp {
    let transport = Arc::new(transport);
    let queues = Arc::new(queues);
    let notifications =
        NotificationGateway::new(transport.clone(), transport.clone(), queues.clone());
    let state = AppState::new(store, notifications);

    TestApp {
        router: build_router(state, &[]),
        transport,
        queues,
    }
}

impl TestApp {
    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        send(&self.router, method, uri, body).await
    }

    pub async fn create_user(&self, email: &str, name: &str) -> Value {
        let (status, body) = self
            .request(
                Method::POST,
                "/api/users",
                Some(serde_json::json!({ "email": email, "name": name })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["data"].clone()
    }

    pub async fn create_post(&self, author_id: i64, title: &str) -> Value {
        let (status, body) = self
            .request(
                Method::POST,
                "/api/posts",
                Some(serde_json::json!({ "title": title, "authorId": author_id })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["data"].clone()
    }
}

pub async fn send(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = router
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}
