//! Scripted executor for sans-IO unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::http::{HttpExecutor, HttpRequest, HttpResponse, RequestBody};

/// Replays queued responses in order and records every request it sees.
#[derive(Debug, Default)]
pub struct ScriptedExecutor {
    responses: Mutex<VecDeque<Result<HttpResponse, String>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, status: u16, body: &str) {
        self.responses.lock().unwrap().push_back(Ok(HttpResponse {
            status,
            headers: Vec::new(),
            body: body.to_string(),
        }));
    }

    pub fn push_json(&self, status: u16, body: serde_json::Value) {
        self.push(status, &body.to_string());
    }

    pub fn push_failure(&self, cause: &str) {
        self.responses.lock().unwrap().push_back(Err(cause.to_string()));
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// `METHOD url` for each recorded request.
    pub fn calls(&self) -> Vec<String> {
        self.requests()
            .iter()
            .map(|r| format!("{} {}", r.method, r.url))
            .collect()
    }

    pub fn json_body(request: &HttpRequest) -> serde_json::Value {
        match &request.body {
            Some(RequestBody::Json(text)) => serde_json::from_str(text).unwrap(),
            other => panic!("expected JSON body, got {other:?}"),
        }
    }
}

#[async_trait]
impl HttpExecutor for ScriptedExecutor {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, String> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err("no scripted response left".to_string()))
    }
}

/// Parks every request until [`GatedExecutor::release`] is called, then
/// answers from its inner [`ScriptedExecutor`].
#[derive(Debug)]
pub struct GatedExecutor {
    scripted: ScriptedExecutor,
    gate: tokio::sync::Semaphore,
    entered: tokio::sync::Notify,
}

impl GatedExecutor {
    pub fn new() -> Self {
        Self {
            scripted: ScriptedExecutor::new(),
            gate: tokio::sync::Semaphore::new(0),
            entered: tokio::sync::Notify::new(),
        }
    }

    pub fn scripted(&self) -> &ScriptedExecutor {
        &self.scripted
    }

    /// Resolves once a request is waiting at the gate.
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    /// Lets one parked request through.
    pub fn release(&self) {
        self.gate.add_permits(1);
    }
}

#[async_trait]
impl HttpExecutor for GatedExecutor {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, String> {
        self.entered.notify_one();
        self.gate.acquire().await.unwrap().forget();
        self.scripted.execute(request).await
    }
}
