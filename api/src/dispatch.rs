//! Single entry point for function invocations.
//!
//! A raw invocation payload is classified by shape alone into an
//! [`InboundEvent`], then routed: queue deliveries go to the consumer
//! registered for the source queue, HTTP events run through the same axum
//! [`Router`] the standalone server uses.
//!
//! Scheduled triggers have no handler yet. They get an explicit branch that
//! answers like the HTTP route table would for an unknown route (404).

use crate::{
    errors,
    queue::{QueueRegistry, SQS_EVENT_SOURCE, SqsEvent},
};
use axum::{
    Router,
    body::Body,
    http::{HeaderName, HeaderValue, Method, Request, StatusCode, header},
    response::Response,
};
use base64::{Engine, engine::general_purpose::STANDARD};
use lambda_runtime::{LambdaEvent, service_fn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceExt;
use tracing::{debug, error, info, warn};

pub const QUEUE_ACK_MESSAGE: &str = "Event processed successfully";

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("unrecognized queue: {0}")]
    UnknownQueue(String),
    #[error("malformed queue event: {0}")]
    MalformedQueueEvent(String),
    #[error("malformed HTTP event: {0}")]
    MalformedHttpEvent(String),
    #[error("failed to read response body: {0}")]
    ResponseBody(#[from] axum::Error),
}

/// API Gateway REST (v1) and HTTP API / Function URL (v2) request events.
///
/// Only the fields needed to rebuild the request are modeled.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpEvent {
    pub http_method: Option<String>,
    pub path: Option<String>,
    pub query_string_parameters: Option<HashMap<String, String>>,
    pub multi_value_query_string_parameters: Option<HashMap<String, Vec<String>>>,
    pub raw_path: Option<String>,
    pub raw_query_string: Option<String>,
    pub cookies: Option<Vec<String>>,
    pub request_context: Option<RequestContext>,
    pub headers: Option<HashMap<String, String>>,
    pub body: Option<String>,
    pub is_base64_encoded: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RequestContext {
    pub http: Option<HttpContext>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HttpContext {
    pub method: String,
    pub path: Option<String>,
}

/// EventBridge scheduled event.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScheduledEvent {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "detail-type", default)]
    pub detail_type: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub resources: Vec<String>,
    #[serde(default)]
    pub detail: Value,
}

#[derive(Debug)]
pub enum InboundEvent {
    QueueBatch(SqsEvent),
    /// Records claim to come from the queue but do not parse as a batch.
    MalformedQueueBatch(String),
    HttpRequest(Box<HttpEvent>),
    ScheduledTrigger(ScheduledEvent),
    Unrecognized(Value),
}

impl InboundEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            InboundEvent::QueueBatch(_) => "queue",
            InboundEvent::MalformedQueueBatch(_) => "malformed_queue",
            InboundEvent::HttpRequest(_) => "http",
            InboundEvent::ScheduledTrigger(_) => "scheduled",
            InboundEvent::Unrecognized(_) => "unrecognized",
        }
    }
}

/// Classifies a payload by shape. Queue deliveries win over everything else;
/// the first record's event source decides, even when the batch itself is
/// malformed.
pub fn classify(payload: Value) -> InboundEvent {
    let first_source = payload
        .get("Records")
        .and_then(Value::as_array)
        .and_then(|records| records.first())
        .and_then(|record| record.get("eventSource"))
        .and_then(Value::as_str);

    if first_source == Some(SQS_EVENT_SOURCE) {
        return match SqsEvent::deserialize(&payload) {
            Ok(event) => InboundEvent::QueueBatch(event),
            Err(e) => InboundEvent::MalformedQueueBatch(e.to_string()),
        };
    } else if payload.get("detail-type").is_some() && payload.get("source").is_some() {
        if let Ok(event) = ScheduledEvent::deserialize(&payload) {
            return InboundEvent::ScheduledTrigger(event);
        }
    } else if payload.get("httpMethod").is_some()
        || payload.pointer("/requestContext/http/method").is_some()
    {
        if let Ok(event) = HttpEvent::deserialize(&payload) {
            return InboundEvent::HttpRequest(Box::new(event));
        }
    }

    InboundEvent::Unrecognized(payload)
}

impl HttpEvent {
    fn method(&self) -> Option<&str> {
        self.http_method.as_deref().or_else(|| {
            self.request_context
                .as_ref()
                .and_then(|ctx| ctx.http.as_ref())
                .map(|http| http.method.as_str())
        })
    }

    fn path(&self) -> &str {
        self.path
            .as_deref()
            .or(self.raw_path.as_deref())
            .or_else(|| {
                self.request_context
                    .as_ref()
                    .and_then(|ctx| ctx.http.as_ref())
                    .and_then(|http| http.path.as_deref())
            })
            .unwrap_or("/")
    }

    fn query(&self) -> Result<String, DispatchError> {
        if let Some(raw) = self.raw_query_string.as_deref().filter(|q| !q.is_empty()) {
            return Ok(raw.to_string());
        }

        let pairs: Vec<(&str, &str)> = match (
            &self.multi_value_query_string_parameters,
            &self.query_string_parameters,
        ) {
            (Some(multi), _) => multi
                .iter()
                .flat_map(|(k, values)| values.iter().map(move |v| (k.as_str(), v.as_str())))
                .collect(),
            (None, Some(single)) => single
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str()))
                .collect(),
            (None, None) => Vec::new(),
        };

        serde_urlencoded::to_string(pairs)
            .map_err(|e| DispatchError::MalformedHttpEvent(e.to_string()))
    }

    pub fn into_request(self) -> Result<Request<Body>, DispatchError> {
        let method = self
            .method()
            .ok_or_else(|| DispatchError::MalformedHttpEvent("missing method".into()))?;
        let method = Method::from_bytes(method.as_bytes())
            .map_err(|e| DispatchError::MalformedHttpEvent(e.to_string()))?;

        let mut uri = self.path().to_string();
        let query = self.query()?;
        if !query.is_empty() {
            uri.push('?');
            uri.push_str(&query);
        }

        let body = match self.body {
            Some(body) if self.is_base64_encoded.unwrap_or(false) => STANDARD
                .decode(body)
                .map_err(|e| DispatchError::MalformedHttpEvent(e.to_string()))?,
            Some(body) => body.into_bytes(),
            None => Vec::new(),
        };

        let mut request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::from(body))
            .map_err(|e| DispatchError::MalformedHttpEvent(e.to_string()))?;

        let headers = request.headers_mut();
        for (name, value) in self.headers.unwrap_or_default() {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(&value),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.append(name, value);
                }
                _ => debug!("Skipping invalid header {}", name),
            }
        }

        if let Some(cookies) = self.cookies.filter(|c| !c.is_empty()) {
            if !headers.contains_key(header::COOKIE) {
                if let Ok(value) = HeaderValue::from_str(&cookies.join("; ")) {
                    headers.insert(header::COOKIE, value);
                }
            }
        }

        Ok(request)
    }
}

/// API Gateway proxy result.
///
/// `headers` comma-joins repeated values; `multi_value_headers` keeps each
/// one, which is what REST APIs need for `Set-Cookie`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyResponse {
    pub status_code: u16,
    pub headers: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub multi_value_headers: HashMap<String, Vec<String>>,
    pub body: String,
    pub is_base64_encoded: bool,
}

impl ProxyResponse {
    pub fn json(status: StatusCode, body: &Value) -> Self {
        Self {
            status_code: status.as_u16(),
            headers: HashMap::from([(
                header::CONTENT_TYPE.to_string(),
                "application/json".to_string(),
            )]),
            multi_value_headers: HashMap::new(),
            body: body.to_string(),
            is_base64_encoded: false,
        }
    }

    pub async fn from_response(response: Response) -> Result<Self, DispatchError> {
        let (parts, body) = response.into_parts();
        let bytes = axum::body::to_bytes(body, usize::MAX).await?;

        let mut multi_value_headers: HashMap<String, Vec<String>> = HashMap::new();
        for (name, value) in &parts.headers {
            match value.to_str() {
                Ok(value) => multi_value_headers
                    .entry(name.as_str().to_string())
                    .or_default()
                    .push(value.to_string()),
                Err(_) => debug!("Dropping non-text response header {}", name),
            }
        }
        let headers = multi_value_headers
            .iter()
            .map(|(name, values)| (name.clone(), values.join(", ")))
            .collect();

        let (body, is_base64_encoded) = match std::str::from_utf8(&bytes) {
            Ok(text) => (text.to_string(), false),
            Err(_) => (STANDARD.encode(&bytes), true),
        };

        Ok(Self {
            status_code: parts.status.as_u16(),
            headers,
            multi_value_headers,
            body,
            is_base64_encoded,
        })
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    router: Router,
    queues: Arc<QueueRegistry>,
}

impl Dispatcher {
    pub fn new(router: Router, queues: Arc<QueueRegistry>) -> Self {
        Self { router, queues }
    }

    pub async fn dispatch(&self, payload: Value) -> Result<ProxyResponse, DispatchError> {
        debug!(event = %payload, "Invocation received");

        let event = classify(payload);
        debug!(kind = event.kind(), "Invocation classified");

        match event {
            InboundEvent::QueueBatch(event) => self.handle_queue(event).await,
            InboundEvent::MalformedQueueBatch(reason) => {
                error!("Malformed queue delivery: {}", reason);
                Err(DispatchError::MalformedQueueEvent(reason))
            }
            InboundEvent::HttpRequest(event) => self.handle_http(*event).await,
            InboundEvent::ScheduledTrigger(event) => {
                warn!(
                    id = %event.id,
                    detail_type = %event.detail_type,
                    "No handler for scheduled events"
                );
                self.unrouted().await
            }
            InboundEvent::Unrecognized(_) => {
                warn!("Unrecognized invocation payload");
                self.unrouted().await
            }
        }
    }

    /// Every classified queue delivery is acknowledged, whatever the
    /// consumer reports.
    async fn handle_queue(&self, event: SqsEvent) -> Result<ProxyResponse, DispatchError> {
        let name = event.queue_name().unwrap_or_default().to_string();
        info!(queue = %name, records = event.records.len(), "Queue delivery");

        let queue = self
            .queues
            .get(&name)
            .ok_or_else(|| DispatchError::UnknownQueue(name.clone()))?;

        if let Err(e) = (queue.consumer)(event).await {
            error!(queue = %name, "Queue consumer failed: {}", e);
        }

        Ok(ProxyResponse::json(
            StatusCode::OK,
            &serde_json::json!({ "message": QUEUE_ACK_MESSAGE }),
        ))
    }

    async fn handle_http(&self, event: HttpEvent) -> Result<ProxyResponse, DispatchError> {
        let request = event.into_request()?;
        info!(method = %request.method(), uri = %request.uri(), "HTTP invocation");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .unwrap_or_else(|never| match never {});

        ProxyResponse::from_response(response).await
    }

    async fn unrouted(&self) -> Result<ProxyResponse, DispatchError> {
        ProxyResponse::from_response(errors::not_found().await).await
    }
}

/// Runs the function runtime loop until the process is torn down.
pub async fn run(dispatcher: Dispatcher) -> Result<(), lambda_runtime::Error> {
    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| {
        let dispatcher = dispatcher.clone();
        async move {
            dispatcher
                .dispatch(event.payload)
                .await
                .map_err(lambda_runtime::Error::from)
        }
    }))
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sqs_records_classify_as_queue_batch() {
        let payload = json!({
            "Records": [{
                "messageId": "m-1",
                "body": "hi",
                "eventSource": "aws:sqs",
                "eventSourceARN": "arn:aws:sqs:ap-south-1:1:hono-lambda"
            }]
        });
        match classify(payload) {
            InboundEvent::QueueBatch(event) => {
                assert_eq!(event.queue_name(), Some("hono-lambda"));
            }
            other => panic!("expected queue batch, got {}", other.kind()),
        }
    }

    #[test]
    fn sqs_records_that_fail_to_parse_stay_on_the_queue_branch() {
        let payload = json!({
            "Records": [
                { "messageId": "m-1", "body": "ok", "eventSource": "aws:sqs",
                  "eventSourceARN": "arn:aws:sqs:ap-south-1:1:hono-lambda" },
                { "messageId": "m-2", "body": null, "eventSource": "aws:sqs",
                  "eventSourceARN": "arn:aws:sqs:ap-south-1:1:hono-lambda" }
            ]
        });
        assert_eq!(classify(payload).kind(), "malformed_queue");
    }

    #[test]
    fn non_sqs_records_are_not_queue_batches() {
        let payload = json!({ "Records": [{ "eventSource": "aws:s3" }] });
        assert_eq!(classify(payload).kind(), "unrecognized");

        let payload = json!({ "Records": [] });
        assert_eq!(classify(payload).kind(), "unrecognized");
    }

    #[test]
    fn rest_and_http_api_events_classify_as_http() {
        let v1 = json!({ "httpMethod": "GET", "path": "/api/users", "headers": null });
        assert_eq!(classify(v1).kind(), "http");

        let v2 = json!({
            "version": "2.0",
            "rawPath": "/api/users",
            "rawQueryString": "",
            "requestContext": { "http": { "method": "GET", "path": "/api/users" } }
        });
        assert_eq!(classify(v2).kind(), "http");
    }

    #[test]
    fn eventbridge_events_classify_as_scheduled() {
        let payload = json!({
            "version": "0",
            "id": "abc",
            "detail-type": "Scheduled Event",
            "source": "aws.events",
            "time": "2024-01-01T00:00:00Z",
            "resources": ["arn:aws:events:r:1:rule/nightly"],
            "detail": {}
        });
        match classify(payload) {
            InboundEvent::ScheduledTrigger(event) => {
                assert_eq!(event.detail_type, "Scheduled Event");
                assert_eq!(event.resources.len(), 1);
            }
            other => panic!("expected scheduled trigger, got {}", other.kind()),
        }
    }

    #[test]
    fn v1_event_rebuilds_query_and_decodes_base64_body() {
        let event: HttpEvent = serde_json::from_value(json!({
            "httpMethod": "POST",
            "path": "/api/users",
            "queryStringParameters": { "q": "a b" },
            "headers": { "content-type": "application/json" },
            "body": STANDARD.encode(r#"{"email":"a@x.com"}"#),
            "isBase64Encoded": true
        }))
        .unwrap();

        let request = event.into_request().unwrap();
        assert_eq!(request.method(), Method::POST);
        assert_eq!(request.uri().path(), "/api/users");
        assert_eq!(request.uri().query(), Some("q=a+b"));
        assert_eq!(request.headers()[header::CONTENT_TYPE], "application/json");
    }

    #[test]
    fn v2_event_folds_cookies_into_header() {
        let event: HttpEvent = serde_json::from_value(json!({
            "rawPath": "/",
            "rawQueryString": "x=1",
            "cookies": ["a=1", "b=2"],
            "requestContext": { "http": { "method": "GET" } }
        }))
        .unwrap();

        let request = event.into_request().unwrap();
        assert_eq!(request.uri().to_string(), "/?x=1");
        assert_eq!(request.headers()[header::COOKIE], "a=1; b=2");
    }

    #[tokio::test]
    async fn repeated_response_headers_keep_every_value() {
        let response = Response::builder()
            .header(header::VARY, "origin")
            .header(header::VARY, "access-control-request-method")
            .header(header::SET_COOKIE, "a=1")
            .header(header::SET_COOKIE, "b=2")
            .body(Body::empty())
            .unwrap();

        let proxy = ProxyResponse::from_response(response).await.unwrap();
        assert_eq!(proxy.headers["vary"], "origin, access-control-request-method");
        assert_eq!(proxy.multi_value_headers["set-cookie"], vec!["a=1", "b=2"]);

        let wire = serde_json::to_value(&proxy).unwrap();
        assert_eq!(wire["multiValueHeaders"]["vary"], json!(["origin", "access-control-request-method"]));
    }

    #[tokio::test]
    async fn non_utf8_bodies_are_base64_encoded() {
        let response = Response::new(Body::from(vec![0xff, 0xfe]));
        let proxy = ProxyResponse::from_response(response).await.unwrap();
        assert!(proxy.is_base64_encoded);
        assert_eq!(STANDARD.decode(proxy.body).unwrap(), vec![0xff, 0xfe]);
    }
}
