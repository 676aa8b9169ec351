use hyper::http::request::Parts;
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::debug;

use crate::identity::Identity;

mod flash;
mod session;

pub use flash::{Flash, FlashMessages};
#[cfg(test)]
pub use session::MockSession;
pub use session::{MemorySession, Session};

const MESSAGES_KEY: &str = "messages";
const RETURN_TO_KEY: &str = "returnTo";
const DEFAULT_USER_PROPERTY: &str = "user";

/// Per-request authentication state.
///
/// Wraps the request head together with the collaborators a strategy or the
/// session manager may need: an optional session, an optional flash store,
/// and the identities assigned during dispatch. Nothing in here is shared
/// between requests.
pub struct RequestContext {
    parts: Parts,
    session: Option<Box<dyn Session>>,
    flash: Option<Box<dyn Flash>>,
    user_property: String,
    properties: HashMap<String, Identity>,
    auth_info: Option<Value>,
}

impl RequestContext {
    pub fn new(parts: Parts) -> Self {
        Self {
            parts,
            session: None,
            flash: None,
            user_property: DEFAULT_USER_PROPERTY.to_string(),
            properties: HashMap::new(),
            auth_info: None,
        }
    }

    pub fn with_session(mut self, session: impl Session + 'static) -> Self {
        self.session = Some(Box::new(session));
        self
    }

    pub fn with_flash(mut self, flash: impl Flash + 'static) -> Self {
        self.flash = Some(Box::new(flash));
        self
    }

    pub fn parts(&self) -> &Parts {
        &self.parts
    }

    pub fn into_parts(self) -> Parts {
        self.parts
    }

    pub fn session(&self) -> Option<&(dyn Session + 'static)> {
        self.session.as_deref()
    }

    pub fn session_mut(&mut self) -> Option<&mut (dyn Session + 'static)> {
        self.session.as_deref_mut()
    }

    pub fn flash_mut(&mut self) -> Option<&mut (dyn Flash + 'static)> {
        self.flash.as_deref_mut()
    }

    pub fn user_property(&self) -> &str {
        &self.user_property
    }

    pub(crate) fn set_user_property(&mut self, name: &str) {
        self.user_property = name.to_string();
    }

    pub fn user(&self) -> Option<&Identity> {
        self.properties.get(&self.user_property)
    }

    pub(crate) fn set_user(&mut self, identity: Identity) {
        let property = self.user_property.clone();
        self.properties.insert(property, identity);
    }

    pub(crate) fn clear_user(&mut self) -> Option<Identity> {
        self.properties.remove(&self.user_property)
    }

    pub fn property(&self, name: &str) -> Option<&Identity> {
        self.properties.get(name)
    }

    pub fn set_property(&mut self, name: &str, identity: Identity) {
        self.properties.insert(name.to_string(), identity);
    }

    pub fn take_property(&mut self, name: &str) -> Option<Identity> {
        self.properties.remove(name)
    }

    pub fn is_authenticated(&self) -> bool {
        self.user().is_some()
    }

    pub fn is_unauthenticated(&self) -> bool {
        !self.is_authenticated()
    }

    pub fn auth_info(&self) -> Option<&Value> {
        self.auth_info.as_ref()
    }

    pub(crate) fn set_auth_info(&mut self, info: Value) {
        self.auth_info = Some(info);
    }

    /// Messages accumulated in the session by `success_message`/`failure_message`.
    pub fn messages(&self) -> Vec<String> {
        self.session()
            .and_then(|session| session.get(MESSAGES_KEY))
            .and_then(|messages| match messages {
                Value::Array(items) => Some(
                    items
                        .into_iter()
                        .filter_map(|item| item.as_str().map(str::to_string))
                        .collect(),
                ),
                _ => None,
            })
            .unwrap_or_default()
    }

    pub(crate) fn push_message(&mut self, message: &str) -> bool {
        let Some(session) = self.session_mut() else {
            debug!("No session on request, dropping message: {message}");
            return false;
        };

        let mut messages = match session.get(MESSAGES_KEY) {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        };
        messages.push(json!(message));
        session.insert(MESSAGES_KEY, Value::Array(messages));
        true
    }

    /// Remembers where to send the client after a later successful login.
    pub fn set_return_to(&mut self, url: &str) -> bool {
        match self.session_mut() {
            Some(session) => {
                session.insert(RETURN_TO_KEY, json!(url));
                true
            }
            None => false,
        }
    }

    pub(crate) fn take_return_to(&mut self) -> Option<String> {
        let session = self.session_mut()?;
        match session.remove(RETURN_TO_KEY) {
            Some(Value::String(url)) if !url.is_empty() => Some(url),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::Request;

    fn context() -> RequestContext {
        let (parts, ()) = Request::builder()
            .uri("/profile")
            .body(())
            .unwrap()
            .into_parts();
        RequestContext::new(parts)
    }

    #[test]
    fn test_user_follows_user_property() {
        let mut request = context();
        assert!(request.is_unauthenticated());

        request.set_user(Identity::new(json!({"id": 1})));
        assert!(request.is_authenticated());
        assert_eq!(request.property("user"), Some(&Identity::new(json!({"id": 1}))));

        request.set_user_property("member");
        assert!(request.is_unauthenticated());
        request.set_property("member", Identity::new(json!({"id": 2})));
        assert_eq!(request.user(), Some(&Identity::new(json!({"id": 2}))));

        assert_eq!(request.clear_user(), Some(Identity::new(json!({"id": 2}))));
        assert!(request.is_unauthenticated());
    }

    #[test]
    fn test_messages_require_session() {
        let mut request = context();
        assert!(!request.push_message("Welcome"));
        assert!(request.messages().is_empty());

        let mut request = context().with_session(MemorySession::new());
        assert!(request.push_message("Welcome"));
        assert!(request.push_message("Again"));
        assert_eq!(request.messages(), vec!["Welcome", "Again"]);
    }

    #[test]
    fn test_return_to_is_consumed() {
        let mut request = context().with_session(MemorySession::new());
        assert!(request.take_return_to().is_none());

        assert!(request.set_return_to("/admin"));
        assert_eq!(request.take_return_to().as_deref(), Some("/admin"));
        assert!(request.take_return_to().is_none());
    }

    #[test]
    fn test_flash_is_optional() {
        let mut request = context();
        assert!(request.flash_mut().is_none());

        let mut request = context().with_flash(FlashMessages::new());
        let flash = request.flash_mut().unwrap();
        flash.push("info", "hello");
        assert_eq!(flash.take("info"), vec!["hello"]);
    }
}
