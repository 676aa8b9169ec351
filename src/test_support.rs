use async_trait::async_trait;
use hyper::{Request, StatusCode};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::context::{MemorySession, RequestContext};
use crate::error::Error;
use crate::middleware::AuthenticateOptions;
use crate::strategy::{Actions, Strategy};

pub fn request() -> RequestContext {
    let (parts, ()) = Request::builder()
        .uri("/login")
        .body(())
        .unwrap()
        .into_parts();
    RequestContext::new(parts)
}

pub fn request_with_headers(headers: &[(&str, &str)]) -> RequestContext {
    let mut builder = Request::builder().uri("/login");
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let (parts, ()) = builder.body(()).unwrap().into_parts();
    RequestContext::new(parts)
}

pub fn session_request() -> RequestContext {
    request().with_session(MemorySession::new())
}

#[derive(Clone, Debug)]
pub enum Script {
    Success(Value, Option<Value>),
    Fail(Option<Value>, Option<StatusCode>),
    Redirect(String, Option<StatusCode>),
    Pass,
    Error(String),
    Silent,
}

/// Strategy answering every attempt with the same outcome and counting calls.
pub struct ScriptedStrategy {
    name: Option<String>,
    script: Script,
    calls: Arc<AtomicUsize>,
}

impl ScriptedStrategy {
    pub fn new(script: Script) -> Self {
        Self {
            name: None,
            script,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn success(user: Value) -> Self {
        Self::new(Script::Success(user, None))
    }

    pub fn fail(challenge: Option<Value>, status: Option<StatusCode>) -> Self {
        Self::new(Script::Fail(challenge, status))
    }

    pub fn pass() -> Self {
        Self::new(Script::Pass)
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

#[async_trait]
impl Strategy for ScriptedStrategy {
    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    async fn authenticate(
        &self,
        _request: &mut RequestContext,
        _options: &AuthenticateOptions,
        actions: Actions,
    ) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.script.clone() {
            Script::Success(user, info) => actions.success(user, info),
            Script::Fail(challenge, status) => actions.fail(challenge, status),
            Script::Redirect(url, status) => actions.redirect(url, status),
            Script::Pass => actions.pass(),
            Script::Error(message) => actions.error(Error::Strategy(message)),
            Script::Silent => drop(actions),
        }
    }
}

/// Authenticates the user named in `x-user`, after waiting `x-delay-ms`.
pub struct HeaderStrategy;

#[async_trait]
impl Strategy for HeaderStrategy {
    fn name(&self) -> Option<&str> {
        Some("header")
    }

    async fn authenticate(
        &self,
        request: &mut RequestContext,
        _options: &AuthenticateOptions,
        actions: Actions,
    ) {
        let headers = &request.parts().headers;
        let delay = headers
            .get("x-delay-ms")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<u64>().ok())
            .unwrap_or(0);
        let user = headers
            .get("x-user")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        tokio::time::sleep(Duration::from_millis(delay)).await;

        match user {
            Some(user) => actions.success(serde_json::json!({ "name": user }), None),
            None => actions.fail(Some(Value::from("Header")), None),
        }
    }
}
