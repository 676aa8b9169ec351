use async_trait::async_trait;
use hyper::{Response, StatusCode};
use serde_json::Value;
use std::future::Future;

use crate::context::RequestContext;
use crate::error::Error;
use crate::http::response::ResponseBody;
use crate::identity::Identity;

pub(crate) mod authenticate;
mod options;

pub use options::{AuthenticateOptions, FlashOption, MessageOption};

/// What the surrounding pipeline should do after a middleware phase.
///
/// Errors travel separately, as the `Err` side of the phase's result.
#[derive(Debug)]
pub enum Flow {
    Continue,
    Respond(Response<ResponseBody>),
}

impl Flow {
    pub fn is_continue(&self) -> bool {
        matches!(self, Flow::Continue)
    }

    pub fn into_response(self) -> Option<Response<ResponseBody>> {
        match self {
            Flow::Continue => None,
            Flow::Respond(response) => Some(response),
        }
    }
}

/// A `fail` report collected while walking the strategy chain.
#[derive(Clone, Debug, PartialEq)]
pub struct Failure {
    pub challenge: Option<Value>,
    pub status: Option<StatusCode>,
}

/// Terminal dispatch result handed to a [`CompletionHandler`].
///
/// Redirects and passes are always handled by the dispatcher itself.
#[derive(Debug)]
pub enum Completion {
    Success { user: Identity, info: Value },
    Failure { failures: Vec<Failure> },
    Error(Error),
}

/// Replaces the default outcome handling of a dispatch.
///
/// When supplied, every option except those consumed by the strategies
/// themselves is ignored: no login, no redirects, no flash or messages.
#[async_trait]
pub trait CompletionHandler: Send + Sync {
    async fn complete(
        &self,
        completion: Completion,
        request: &mut RequestContext,
    ) -> Result<Flow, Error>;
}

pub struct CompletionFn<F>(F);

/// Adapts an async closure into a [`CompletionHandler`].
///
/// The closure only sees the completion; implement the trait directly when
/// the handler needs the request, for example to log in manually.
pub fn completion_fn<F, Fut>(f: F) -> CompletionFn<F>
where
    F: Fn(Completion) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Flow, Error>> + Send + 'static,
{
    CompletionFn(f)
}

#[async_trait]
impl<F, Fut> CompletionHandler for CompletionFn<F>
where
    F: Fn(Completion) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Flow, Error>> + Send + 'static,
{
    async fn complete(
        &self,
        completion: Completion,
        _request: &mut RequestContext,
    ) -> Result<Flow, Error> {
        (self.0)(completion).await
    }
}

/// Ordered strategy names for one dispatch; a single name or a list.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StrategyNames(Vec<String>);

impl StrategyNames {
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for StrategyNames {
    fn from(name: &str) -> Self {
        Self(vec![name.to_string()])
    }
}

impl From<String> for StrategyNames {
    fn from(name: String) -> Self {
        Self(vec![name])
    }
}

impl From<Vec<String>> for StrategyNames {
    fn from(names: Vec<String>) -> Self {
        Self(names)
    }
}

impl From<Vec<&str>> for StrategyNames {
    fn from(names: Vec<&str>) -> Self {
        Self(names.into_iter().map(str::to_string).collect())
    }
}

impl From<&[&str]> for StrategyNames {
    fn from(names: &[&str]) -> Self {
        Self(names.iter().map(|name| name.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for StrategyNames {
    fn from(names: [&str; N]) -> Self {
        Self(names.iter().map(|name| name.to_string()).collect())
    }
}
