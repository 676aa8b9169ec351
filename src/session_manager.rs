use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::context::{RequestContext, Session};
use crate::error::Error;
use crate::identity::Identity;
use crate::serializer::{Chain, UserSerializer};

const USER_FIELD: &str = "user";

pub(crate) fn stored_token(session: &dyn Session, key: &str) -> Option<Value> {
    session
        .get(key)
        .and_then(|envelope| envelope.get(USER_FIELD).cloned())
}

pub(crate) fn clear_token(session: &mut dyn Session, key: &str) {
    let Some(mut envelope) = session.get(key) else {
        return;
    };
    if let Some(fields) = envelope.as_object_mut() {
        fields.remove(USER_FIELD);
    }
    session.insert(key, envelope);
}

fn restore(session: &mut dyn Session, previous: Map<String, Value>) {
    for (key, value) in previous {
        session.insert(&key, value);
    }
}

/// Persists and forgets the logged-in identity in the request session.
///
/// The session is regenerated on both login and logout to rule out session
/// fixation. With `keep_session_info` the previous session data survives the
/// regeneration.
pub struct SessionManager {
    key: String,
    keep_session_info: bool,
    serializers: Arc<Chain<dyn UserSerializer>>,
}

impl SessionManager {
    pub fn new(
        key: impl Into<String>,
        keep_session_info: bool,
        serializers: Arc<Chain<dyn UserSerializer>>,
    ) -> Self {
        Self {
            key: key.into(),
            keep_session_info,
            serializers,
        }
    }

    #[instrument(skip_all, fields(session_key = %self.key))]
    pub async fn login(&self, request: &mut RequestContext, user: &Identity) -> Result<(), Error> {
        let session = request.session_mut().ok_or(Error::SessionUnavailable)?;
        let previous = session.entries();
        session.regenerate().await?;

        let token = self.serializers.serialize(user, request).await?;

        let session = request.session_mut().ok_or(Error::SessionUnavailable)?;
        if self.keep_session_info {
            restore(session, previous);
        }

        let mut envelope = match session.get(&self.key) {
            Some(envelope @ Value::Object(_)) => envelope,
            _ => json!({}),
        };
        envelope[USER_FIELD] = token;
        session.insert(&self.key, envelope);
        session.save().await?;

        debug!("Identity stored in session");
        Ok(())
    }

    #[instrument(skip_all, fields(session_key = %self.key))]
    pub async fn logout(&self, request: &mut RequestContext) -> Result<(), Error> {
        let session = request.session_mut().ok_or(Error::SessionUnavailable)?;
        clear_token(session, &self.key);

        let previous = session.entries();
        session.save().await?;
        session.regenerate().await?;
        if self.keep_session_info {
            restore(session, previous);
        }

        debug!("Identity removed from session");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{MemorySession, MockSession};
    use crate::serializer::{serializer_fn, Step};
    use crate::test_support::request;

    fn id_serializer() -> Arc<Chain<dyn UserSerializer>> {
        let chain: Arc<Chain<dyn UserSerializer>> = Arc::new(Chain::new());
        chain.push(Arc::new(serializer_fn(|user: Identity| async move {
            match user.get("id") {
                Some(id) => Ok(Step::Done(id.clone())),
                None => Ok(Step::Pass),
            }
        })));
        chain
    }

    fn session_with_cart() -> MemorySession {
        let mut session = MemorySession::new();
        session.insert("cart", json!(["apple"]));
        session
    }

    #[tokio::test]
    async fn test_login_stores_token_in_fresh_session() {
        let manager = SessionManager::new("passport", false, id_serializer());
        let mut request = request().with_session(session_with_cart());

        manager
            .login(&mut request, &Identity::new(json!({"id": 42})))
            .await
            .unwrap();

        let session = request.session().unwrap();
        assert_eq!(session.get("passport"), Some(json!({"user": 42})));
        assert!(session.get("cart").is_none());
    }

    #[tokio::test]
    async fn test_login_keeps_session_info() {
        let manager = SessionManager::new("passport", true, id_serializer());
        let mut request = request().with_session(session_with_cart());

        manager
            .login(&mut request, &Identity::new(json!({"id": 42})))
            .await
            .unwrap();

        let session = request.session().unwrap();
        assert_eq!(session.get("passport"), Some(json!({"user": 42})));
        assert_eq!(session.get("cart"), Some(json!(["apple"])));
    }

    #[tokio::test]
    async fn test_login_without_session() {
        let manager = SessionManager::new("passport", false, id_serializer());
        let mut request = request();

        let result = manager
            .login(&mut request, &Identity::new(json!({"id": 42})))
            .await;
        assert_eq!(result, Err(Error::SessionUnavailable));
    }

    #[tokio::test]
    async fn test_login_serializer_exhausted() {
        let manager = SessionManager::new("passport", false, id_serializer());
        let mut request = request().with_session(MemorySession::new());

        let result = manager
            .login(&mut request, &Identity::new(json!({"name": "anonymous"})))
            .await;
        assert!(matches!(result, Err(Error::Serialization(_))));
        assert!(request.session().unwrap().get("passport").is_none());
    }

    #[tokio::test]
    async fn test_login_regenerate_failure() {
        let mut session = MockSession::new();
        session.expect_entries().returning(Map::new);
        session
            .expect_regenerate()
            .returning(|| Err(Error::Session("store unavailable".to_string())));
        session.expect_save().never();
        session.expect_insert().never();

        let manager = SessionManager::new("passport", false, id_serializer());
        let mut request = request().with_session(session);

        let result = manager
            .login(&mut request, &Identity::new(json!({"id": 42})))
            .await;
        assert_eq!(
            result,
            Err(Error::Session("store unavailable".to_string()))
        );
    }

    #[tokio::test]
    async fn test_login_save_failure() {
        let mut session = MockSession::new();
        session.expect_entries().returning(Map::new);
        session.expect_regenerate().times(1).returning(|| Ok(()));
        session.expect_get().returning(|_| None);
        session
            .expect_insert()
            .withf(|key, value| key == "passport" && *value == json!({"user": 42}))
            .times(1)
            .return_const(());
        session
            .expect_save()
            .times(1)
            .returning(|| Err(Error::Session("write failed".to_string())));

        let manager = SessionManager::new("passport", false, id_serializer());
        let mut request = request().with_session(session);

        let result = manager
            .login(&mut request, &Identity::new(json!({"id": 42})))
            .await;
        assert_eq!(result, Err(Error::Session("write failed".to_string())));
    }

    #[tokio::test]
    async fn test_logout_clears_token_and_regenerates() {
        let manager = SessionManager::new("passport", false, id_serializer());
        let mut session = session_with_cart();
        session.insert("passport", json!({"user": 42}));
        let mut request = request().with_session(session);

        manager.logout(&mut request).await.unwrap();

        let session = request.session().unwrap();
        assert!(stored_token(session, "passport").is_none());
        assert!(session.entries().is_empty());
    }

    #[tokio::test]
    async fn test_logout_keeps_session_info() {
        let manager = SessionManager::new("passport", true, id_serializer());
        let mut session = session_with_cart();
        session.insert("passport", json!({"user": 42}));
        let mut request = request().with_session(session);

        manager.logout(&mut request).await.unwrap();

        let session = request.session().unwrap();
        assert_eq!(session.get("passport"), Some(json!({})));
        assert_eq!(session.get("cart"), Some(json!(["apple"])));
    }

    #[tokio::test]
    async fn test_logout_without_session() {
        let manager = SessionManager::new("passport", false, id_serializer());
        let mut request = request();

        assert_eq!(
            manager.logout(&mut request).await,
            Err(Error::SessionUnavailable)
        );
    }
}
