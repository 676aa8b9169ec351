//! Strategy-based request authentication for hyper services.
//!
//! An [`Authenticator`] holds named [`Strategy`] implementations and walks
//! them in order for each request until one succeeds, redirects, passes or
//! errors. Strategies that fail are remembered so that the final response can
//! carry every challenge. Successful identities are persisted in the request
//! session through a chain of [`UserSerializer`]s and restored on later
//! requests through a chain of [`UserDeserializer`]s.
//!
//! ```no_run
//! use async_trait::async_trait;
//! use serde_json::{json, Value};
//! use simple_auth::serializer::{deserializer_fn, serializer_fn, Step};
//! use simple_auth::{Actions, AuthenticateOptions, Authenticator, Identity, RequestContext, Strategy};
//!
//! struct ApiKey;
//!
//! #[async_trait]
//! impl Strategy for ApiKey {
//!     fn name(&self) -> Option<&str> {
//!         Some("api-key")
//!     }
//!
//!     async fn authenticate(
//!         &self,
//!         request: &mut RequestContext,
//!         _options: &AuthenticateOptions,
//!         actions: Actions,
//!     ) {
//!         match request.parts().headers.get("x-api-key") {
//!             Some(key) if key == "secret" => actions.success(json!({"id": 1}), None),
//!             Some(_) => actions.fail(Some(json!("ApiKey")), None),
//!             None => actions.pass(),
//!         }
//!     }
//! }
//!
//! # async fn run(mut request: RequestContext) -> Result<(), simple_auth::Error> {
//! let authenticator = Authenticator::default();
//! authenticator.use_strategy(ApiKey)?;
//! authenticator.serialize_user(serializer_fn(|user: Identity| async move {
//!     Ok(user.get("id").cloned().map_or(Step::Pass, Step::Done))
//! }));
//! authenticator.deserialize_user(deserializer_fn(|id: Value| async move {
//!     Ok(Step::Done(Some(Identity::new(json!({ "id": id })))))
//! }));
//!
//! authenticator.initialize(&mut request);
//! authenticator.session(&mut request).await?;
//! let flow = authenticator
//!     .authenticate("api-key", &AuthenticateOptions::default(), &mut request)
//!     .await?;
//! # let _ = flow;
//! # Ok(())
//! # }
//! ```

pub mod authenticator;
pub mod configuration;
pub mod context;
pub mod error;
pub mod http;
pub mod identity;
pub mod metrics;
pub mod middleware;
pub mod serializer;
pub mod session_manager;
pub mod strategy;

#[cfg(test)]
mod test_support;

pub use authenticator::Authenticator;
pub use configuration::Configuration;
pub use context::{Flash, FlashMessages, MemorySession, RequestContext, Session};
pub use error::Error;
pub use identity::Identity;
pub use middleware::{
    completion_fn, AuthenticateOptions, Completion, CompletionHandler, Failure, FlashOption, Flow,
    MessageOption, StrategyNames,
};
pub use serializer::{AuthInfoTransformer, Step, UserDeserializer, UserSerializer};
pub use strategy::{Actions, Outcome, Strategy};
