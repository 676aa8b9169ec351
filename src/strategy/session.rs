use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::context::RequestContext;
use crate::middleware::AuthenticateOptions;
use crate::serializer::{is_definite, Chain, UserDeserializer};
use crate::session_manager;
use crate::strategy::{Actions, Strategy};

pub const SESSION_STRATEGY: &str = "session";

/// What the session strategy finds when it inspects a request.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionState {
    NoSession,
    Anonymous,
    Stored(Value),
}

impl SessionState {
    pub fn inspect(request: &RequestContext, key: &str) -> Self {
        let Some(session) = request.session() else {
            return SessionState::NoSession;
        };

        match session_manager::stored_token(session, key) {
            Some(token) if is_definite(&token) => SessionState::Stored(token),
            _ => SessionState::Anonymous,
        }
    }
}

/// Restores the identity persisted by a previous login.
///
/// Never fails a request: a missing session or token passes, a token the
/// deserializers reject is dropped from the session and then passes.
/// Only deserializer errors surface, as the strategy's error outcome.
pub struct SessionStrategy {
    key: String,
    deserializers: Arc<Chain<dyn UserDeserializer>>,
}

impl SessionStrategy {
    pub fn new(key: impl Into<String>, deserializers: Arc<Chain<dyn UserDeserializer>>) -> Self {
        Self {
            key: key.into(),
            deserializers,
        }
    }
}

#[async_trait]
impl Strategy for SessionStrategy {
    fn name(&self) -> Option<&str> {
        Some(SESSION_STRATEGY)
    }

    #[instrument(skip_all, fields(session_key = %self.key))]
    async fn authenticate(
        &self,
        request: &mut RequestContext,
        _options: &AuthenticateOptions,
        actions: Actions,
    ) {
        let token = match SessionState::inspect(request, &self.key) {
            SessionState::Stored(token) => token,
            state => {
                debug!("Nothing to restore ({state:?})");
                return actions.pass();
            }
        };

        match self.deserializers.deserialize(&token, request).await {
            Ok(Some(user)) => {
                debug!("Restored identity from session");
                request.set_user(user);
                actions.pass();
            }
            Ok(None) => {
                debug!("Session token invalidated, removing it");
                if let Some(session) = request.session_mut() {
                    session_manager::clear_token(session, &self.key);
                }
                actions.pass();
            }
            Err(error) => {
                warn!("Failed to restore identity from session: {error}");
                actions.error(error);
            }
        }
    }
}
