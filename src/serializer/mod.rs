use arc_swap::ArcSwap;
use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::context::RequestContext;
use crate::error::Error;
use crate::identity::Identity;


/// Result of a single link in a chain: either a final answer or a hand-off
/// to the next registered link.
#[derive(Clone, Debug, PartialEq)]
pub enum Step<T> {
    Done(T),
    Pass,
}

/// Turns an identity into the token stored in the session.
#[async_trait]
pub trait UserSerializer: Send + Sync {
    async fn serialize(&self, user: &Identity, request: &RequestContext)
        -> Result<Step<Value>, Error>;
}

/// Restores an identity from a session token.
///
/// `Done(None)` invalidates the stored token and ends the chain.
#[async_trait]
pub trait UserDeserializer: Send + Sync {
    async fn deserialize(
        &self,
        token: &Value,
        request: &RequestContext,
    ) -> Result<Step<Option<Identity>>, Error>;
}

#[async_trait]
pub trait AuthInfoTransformer: Send + Sync {
    async fn transform(&self, info: &Value, request: &RequestContext) -> Result<Step<Value>, Error>;
}

/// Ordered list of links, appended at runtime and walked per request.
///
/// Walks operate on a snapshot, so registrations racing with an in-flight
/// walk only affect later requests.
pub struct Chain<T: ?Sized> {
    links: ArcSwap<Vec<Arc<T>>>,
}

impl<T: ?Sized> Default for Chain<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> Chain<T> {
    pub fn new() -> Self {
        Self {
            links: ArcSwap::from_pointee(Vec::new()),
        }
    }

    pub fn push(&self, link: Arc<T>) {
        self.links.rcu(|links| {
            let mut links = Vec::clone(links);
            links.push(link.clone());
            links
        });
    }

    pub fn len(&self) -> usize {
        self.links.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.load().is_empty()
    }

    fn snapshot(&self) -> Arc<Vec<Arc<T>>> {
        self.links.load_full()
    }
}

/// Tokens that count as "no answer": `null`, `false` and the empty string.
/// Zero is a valid token.
pub(crate) fn is_definite(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

impl Chain<dyn UserSerializer> {
    pub async fn serialize(&self, user: &Identity, request: &RequestContext) -> Result<Value, Error> {
        for (index, link) in self.snapshot().iter().enumerate() {
            match link.serialize(user, request).await {
                Ok(Step::Done(token)) if is_definite(&token) => return Ok(token),
                Ok(_) => debug!("Serializer #{index} passed"),
                Err(error) => {
                    warn!("Serializer #{index} failed: {error}");
                    return Err(error);
                }
            }
        }

        Err(Error::Serialization(
            "Failed to serialize user into session".to_string(),
        ))
    }
}

impl Chain<dyn UserDeserializer> {
    pub async fn deserialize(
        &self,
        token: &Value,
        request: &RequestContext,
    ) -> Result<Option<Identity>, Error> {
        for (index, link) in self.snapshot().iter().enumerate() {
            match link.deserialize(token, request).await {
                Ok(Step::Done(Some(user))) if is_definite(user.as_value()) => return Ok(Some(user)),
                Ok(Step::Done(_)) => {
                    debug!("Deserializer #{index} invalidated the session token");
                    return Ok(None);
                }
                Ok(Step::Pass) => debug!("Deserializer #{index} passed"),
                Err(error) => {
                    warn!("Deserializer #{index} failed: {error}");
                    return Err(error);
                }
            }
        }

        Err(Error::Deserialization(
            "Failed to deserialize user out of session".to_string(),
        ))
    }
}

impl Chain<dyn AuthInfoTransformer> {
    /// Falls back to the untouched `info` when every link passes.
    pub async fn transform(&self, info: Value, request: &RequestContext) -> Result<Value, Error> {
        for (index, link) in self.snapshot().iter().enumerate() {
            match link.transform(&info, request).await {
                Ok(Step::Done(transformed)) if is_definite(&transformed) => return Ok(transformed),
                Ok(_) => debug!("Auth info transformer #{index} passed"),
                Err(error) => {
                    warn!("Auth info transformer #{index} failed: {error}");
                    return Err(error);
                }
            }
        }

        Ok(info)
    }
}

pub struct SerializerFn<F>(F);

/// Adapts an async closure into a [`UserSerializer`].
pub fn serializer_fn<F, Fut>(f: F) -> SerializerFn<F>
where
    F: Fn(Identity) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Step<Value>, Error>> + Send + 'static,
{
    SerializerFn(f)
}

#[async_trait]
impl<F, Fut> UserSerializer for SerializerFn<F>
where
    F: Fn(Identity) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Step<Value>, Error>> + Send + 'static,
{
    async fn serialize(&self, user: &Identity, _request: &RequestContext) -> Result<Step<Value>, Error> {
        (self.0)(user.clone()).await
    }
}

pub struct DeserializerFn<F>(F);

/// Adapts an async closure into a [`UserDeserializer`].
pub fn deserializer_fn<F, Fut>(f: F) -> DeserializerFn<F>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Step<Option<Identity>>, Error>> + Send + 'static,
{
    DeserializerFn(f)
}

#[async_trait]
impl<F, Fut> UserDeserializer for DeserializerFn<F>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Step<Option<Identity>>, Error>> + Send + 'static,
{
    async fn deserialize(
        &self,
        token: &Value,
        _request: &RequestContext,
    ) -> Result<Step<Option<Identity>>, Error> {
        (self.0)(token.clone()).await
    }
}

pub struct TransformerFn<F>(F);

/// Adapts an async closure into an [`AuthInfoTransformer`].
pub fn transformer_fn<F, Fut>(f: F) -> TransformerFn<F>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Step<Value>, Error>> + Send + 'static,
{
    TransformerFn(f)
}

#[async_trait]
impl<F, Fut> AuthInfoTransformer for TransformerFn<F>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Step<Value>, Error>> + Send + 'static,
{
    async fn transform(&self, info: &Value, _request: &RequestContext) -> Result<Step<Value>, Error> {
        (self.0)(info.clone()).await
    }
}
