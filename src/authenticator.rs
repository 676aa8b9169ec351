use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::configuration::Configuration;
use crate::context::RequestContext;
use crate::error::Error;
use crate::identity::Identity;
use crate::metrics::SESSION_LOGINS;
use crate::middleware::{authenticate, AuthenticateOptions, CompletionHandler, Flow, StrategyNames};
use crate::serializer::{AuthInfoTransformer, Chain, UserDeserializer, UserSerializer};
use crate::session_manager::SessionManager;
use crate::strategy::{SessionStrategy, Strategy, StrategyRegistry, SESSION_STRATEGY};

const AUTHORIZE_PROPERTY: &str = "account";

/// Entry point of the framework: owns the strategy registry and the
/// serializer, deserializer and auth info transformer chains.
///
/// All methods take `&self`; share one instance behind an `Arc` across
/// connection tasks. The `session` strategy is registered on construction.
pub struct Authenticator {
    configuration: Configuration,
    strategies: StrategyRegistry,
    serializers: Arc<Chain<dyn UserSerializer>>,
    deserializers: Arc<Chain<dyn UserDeserializer>>,
    transformers: Chain<dyn AuthInfoTransformer>,
    session_manager: SessionManager,
}

impl Default for Authenticator {
    fn default() -> Self {
        Self::new(Configuration::default())
    }
}

impl Authenticator {
    pub fn new(configuration: Configuration) -> Self {
        let serializers: Arc<Chain<dyn UserSerializer>> = Arc::new(Chain::new());
        let deserializers: Arc<Chain<dyn UserDeserializer>> = Arc::new(Chain::new());

        let strategies = StrategyRegistry::new();
        let session_strategy = Arc::new(SessionStrategy::new(
            configuration.session_key.clone(),
            deserializers.clone(),
        ));
        strategies.insert(SESSION_STRATEGY.to_string(), session_strategy);

        let session_manager = SessionManager::new(
            configuration.session_key.clone(),
            configuration.keep_session_info,
            serializers.clone(),
        );

        Self {
            configuration,
            strategies,
            serializers,
            deserializers,
            transformers: Chain::new(),
            session_manager,
        }
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    pub(crate) fn strategies(&self) -> &StrategyRegistry {
        &self.strategies
    }

    /// Registers a strategy under its own name.
    pub fn use_strategy<S: Strategy + 'static>(&self, strategy: S) -> Result<(), Error> {
        self.strategies.register(None, Arc::new(strategy))
    }

    pub fn use_strategy_as<S: Strategy + 'static>(&self, name: &str, strategy: S) -> Result<(), Error> {
        self.strategies.register(Some(name), Arc::new(strategy))
    }

    pub fn unuse(&self, name: &str) {
        self.strategies.unregister(name);
    }

    pub fn strategy(&self, name: &str) -> Option<Arc<dyn Strategy>> {
        self.strategies.resolve(name)
    }

    pub fn serialize_user<S: UserSerializer + 'static>(&self, serializer: S) {
        self.serializers.push(Arc::new(serializer));
    }

    pub fn deserialize_user<D: UserDeserializer + 'static>(&self, deserializer: D) {
        self.deserializers.push(Arc::new(deserializer));
    }

    pub fn transform_auth_info<T: AuthInfoTransformer + 'static>(&self, transformer: T) {
        self.transformers.push(Arc::new(transformer));
    }

    pub async fn serialize(&self, user: &Identity, request: &RequestContext) -> Result<Value, Error> {
        self.serializers.serialize(user, request).await
    }

    pub async fn deserialize(
        &self,
        token: &Value,
        request: &RequestContext,
    ) -> Result<Option<Identity>, Error> {
        self.deserializers.deserialize(token, request).await
    }

    pub async fn transform(&self, info: Value, request: &RequestContext) -> Result<Value, Error> {
        self.transformers.transform(info, request).await
    }

    /// Prepares the request for the other phases. Always continues.
    pub fn initialize(&self, request: &mut RequestContext) -> Flow {
        request.set_user_property(&self.configuration.user_property);
        Flow::Continue
    }

    /// Restores the identity persisted in the session, if any.
    pub async fn session(&self, request: &mut RequestContext) -> Result<Flow, Error> {
        self.authenticate(SESSION_STRATEGY, &AuthenticateOptions::default(), request)
            .await
    }

    #[instrument(skip_all)]
    pub async fn authenticate(
        &self,
        names: impl Into<StrategyNames>,
        options: &AuthenticateOptions,
        request: &mut RequestContext,
    ) -> Result<Flow, Error> {
        let names = names.into();
        authenticate::run(self, names.as_slice(), options, None, request).await
    }

    /// Like [`Authenticator::authenticate`], with `handler` deciding what
    /// success, failure and errors mean for the pipeline.
    #[instrument(skip_all)]
    pub async fn authenticate_with(
        &self,
        names: impl Into<StrategyNames>,
        options: &AuthenticateOptions,
        handler: &dyn CompletionHandler,
        request: &mut RequestContext,
    ) -> Result<Flow, Error> {
        let names = names.into();
        authenticate::run(self, names.as_slice(), options, Some(handler), request).await
    }

    /// Authenticates a third-party account without touching the logged-in user.
    ///
    /// The identity is assigned to `assign_property`, `account` by default.
    #[instrument(skip_all)]
    pub async fn authorize(
        &self,
        names: impl Into<StrategyNames>,
        options: &AuthenticateOptions,
        request: &mut RequestContext,
    ) -> Result<Flow, Error> {
        let names = names.into();
        let mut options = options.clone();
        options
            .assign_property
            .get_or_insert_with(|| AUTHORIZE_PROPERTY.to_string());
        authenticate::run(self, names.as_slice(), &options, None, request).await
    }

    /// Assigns `user` to the request and, unless `options.session` is off,
    /// persists it in the session. The assignment is undone if persisting fails.
    pub async fn login(
        &self,
        request: &mut RequestContext,
        user: Identity,
        options: &AuthenticateOptions,
    ) -> Result<(), Error> {
        request.set_user(user.clone());
        if !options.session {
            debug!("Session persistence disabled, identity kept on request only");
            return Ok(());
        }

        match self.session_manager.login(request, &user).await {
            Ok(()) => {
                SESSION_LOGINS.with_label_values(&["login", "success"]).inc();
                Ok(())
            }
            Err(error) => {
                warn!("Failed to persist identity in session: {error}");
                SESSION_LOGINS.with_label_values(&["login", "failed"]).inc();
                request.clear_user();
                Err(error)
            }
        }
    }

    pub async fn logout(&self, request: &mut RequestContext) -> Result<(), Error> {
        request.clear_user();
        let result = self.session_manager.logout(request).await;

        let label = if result.is_ok() { "success" } else { "failed" };
        SESSION_LOGINS.with_label_values(&["logout", label]).inc();
        result
    }
}
