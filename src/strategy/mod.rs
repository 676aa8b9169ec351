//! Authentication strategies and the handle they report outcomes through.
//!
//! A strategy inspects the request and answers with exactly one of five
//! outcomes: success, fail, redirect, pass or error. The [`Actions`] handle
//! it receives is consumed by whichever method it calls, so a second report
//! for the same attempt cannot be expressed. Each attempt gets its own
//! handle; strategies are shared across concurrent requests and must not
//! keep per-request state.

use async_trait::async_trait;
use hyper::StatusCode;
use serde_json::Value;
use std::fmt;
use tokio::sync::oneshot;
use tracing::debug;

use crate::context::RequestContext;
use crate::error::Error;
use crate::identity::Identity;
use crate::middleware::AuthenticateOptions;

mod registry;
mod session;

pub use registry::StrategyRegistry;
pub use session::{SessionState, SessionStrategy, SESSION_STRATEGY};

#[async_trait]
pub trait Strategy: Send + Sync {
    /// Name used when the strategy is registered without an explicit one.
    fn name(&self) -> Option<&str> {
        None
    }

    async fn authenticate(
        &self,
        request: &mut RequestContext,
        options: &AuthenticateOptions,
        actions: Actions,
    );
}

#[derive(Debug)]
pub enum Outcome {
    Success {
        user: Identity,
        info: Option<Value>,
    },
    Fail {
        challenge: Option<Value>,
        status: Option<StatusCode>,
    },
    Redirect {
        url: String,
        status: StatusCode,
    },
    Pass,
    Error(Error),
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Success { .. } => "success",
            Outcome::Fail { .. } => "fail",
            Outcome::Redirect { .. } => "redirect",
            Outcome::Pass => "pass",
            Outcome::Error(_) => "error",
        }
    }
}

/// Single-use reporting handle for one strategy attempt.
pub struct Actions {
    sender: oneshot::Sender<Outcome>,
}

impl fmt::Debug for Actions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Actions")
            .field("closed", &self.sender.is_closed())
            .finish()
    }
}

impl Actions {
    pub(crate) fn channel() -> (Self, oneshot::Receiver<Outcome>) {
        let (sender, receiver) = oneshot::channel();
        (Self { sender }, receiver)
    }

    pub fn success(self, user: impl Into<Identity>, info: Option<Value>) {
        self.report(Outcome::Success {
            user: user.into(),
            info,
        });
    }

    pub fn fail(self, challenge: Option<Value>, status: Option<StatusCode>) {
        self.report(Outcome::Fail { challenge, status });
    }

    /// Redirects the client, `302 Found` unless another status is given.
    pub fn redirect(self, url: impl Into<String>, status: Option<StatusCode>) {
        self.report(Outcome::Redirect {
            url: url.into(),
            status: status.unwrap_or(StatusCode::FOUND),
        });
    }

    pub fn pass(self) {
        self.report(Outcome::Pass);
    }

    pub fn error(self, cause: Error) {
        self.report(Outcome::Error(cause));
    }

    fn report(self, outcome: Outcome) {
        if let Err(outcome) = self.sender.send(outcome) {
            debug!(
                "Dropping '{}' outcome, dispatch is no longer waiting",
                outcome.label()
            );
        }
    }
}
