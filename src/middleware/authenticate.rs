use hyper::StatusCode;
use serde_json::{json, Value};
use tracing::{debug, instrument, warn};

use crate::authenticator::Authenticator;
use crate::context::RequestContext;
use crate::error::Error;
use crate::http::response;
use crate::identity::Identity;
use crate::metrics::AUTH_ATTEMPTS;
use crate::middleware::{
    AuthenticateOptions, Completion, CompletionHandler, Failure, FlashOption, Flow, MessageOption,
};
use crate::strategy::{Actions, Outcome, StrategyRegistry};


/// How a walk over the strategy chain ended.
#[derive(Debug)]
pub(crate) enum Decision {
    Success { user: Identity, info: Option<Value> },
    Failed(Vec<Failure>),
    Redirect { url: String, status: StatusCode },
    Pass,
    Error(Error),
}

/// Tries each named strategy in order until one reports something other than `fail`.
///
/// Every attempt gets a fresh [`Actions`] handle. Unknown names abort the walk
/// with an error that bypasses any completion handler.
#[instrument(skip(registry, request, options), fields(strategy = tracing::field::Empty))]
pub(crate) async fn attempt(
    registry: &StrategyRegistry,
    names: &[String],
    request: &mut RequestContext,
    options: &AuthenticateOptions,
) -> Result<Decision, Error> {
    let mut failures = Vec::with_capacity(names.len());

    for name in names {
        let Some(strategy) = registry.resolve(name) else {
            warn!("Unknown authentication strategy '{name}'");
            return Err(Error::UnknownStrategy(name.clone()));
        };

        let (actions, receiver) = Actions::channel();
        strategy.authenticate(request, options, actions).await;

        let outcome = receiver.await.unwrap_or_else(|_| {
            warn!("Strategy '{name}' completed without reporting an outcome");
            Outcome::Error(Error::Strategy(format!(
                "strategy \"{name}\" completed without reporting an outcome"
            )))
        });

        AUTH_ATTEMPTS
            .with_label_values(&[name.as_str(), outcome.label()])
            .inc();
        debug!("Strategy '{name}' reported {}", outcome.label());

        let decision = match outcome {
            Outcome::Fail { challenge, status } => {
                failures.push(Failure { challenge, status });
                continue;
            }
            Outcome::Success { user, info } => Decision::Success { user, info },
            Outcome::Redirect { url, status } => Decision::Redirect { url, status },
            Outcome::Pass => Decision::Pass,
            Outcome::Error(error) => Decision::Error(error),
        };

        tracing::Span::current().record("strategy", name.as_str());
        return Ok(decision);
    }

    Ok(Decision::Failed(failures))
}

/// Runs a dispatch and applies either the handler or the default outcome handling.
pub(crate) async fn run(
    authenticator: &Authenticator,
    names: &[String],
    options: &AuthenticateOptions,
    handler: Option<&dyn CompletionHandler>,
    request: &mut RequestContext,
) -> Result<Flow, Error> {
    if options.pause_stream {
        debug!("pause_stream has no effect, request bodies are not read during dispatch");
    }

    let decision = attempt(authenticator.strategies(), names, request, options).await?;

    match decision {
        Decision::Redirect { url, status } => Ok(Flow::Respond(response::redirect(&url, status)?)),
        Decision::Pass => Ok(Flow::Continue),
        Decision::Success { user, info } => {
            let info = info.unwrap_or_else(|| json!({}));
            match handler {
                Some(handler) => {
                    handler
                        .complete(Completion::Success { user, info }, request)
                        .await
                }
                None => complete_success(authenticator, user, info, options, request).await,
            }
        }
        Decision::Failed(failures) => match handler {
            Some(handler) => {
                handler
                    .complete(Completion::Failure { failures }, request)
                    .await
            }
            None => complete_failure(failures, options, request),
        },
        Decision::Error(error) => match handler {
            Some(handler) => handler.complete(Completion::Error(error), request).await,
            None => {
                warn!("Authentication error: {error}");
                Err(error)
            }
        },
    }
}

async fn complete_success(
    authenticator: &Authenticator,
    user: Identity,
    info: Value,
    options: &AuthenticateOptions,
    request: &mut RequestContext,
) -> Result<Flow, Error> {
    record_flash(request, options.success_flash.as_ref(), "success", Some(&info));

    if let Some(property) = &options.assign_property {
        request.set_property(property, user);
        record_message(request, options.success_message.as_ref(), Some(&info));
        if options.auth_info {
            let info = authenticator.transform(info, request).await?;
            request.set_auth_info(info);
        }
        return Ok(Flow::Continue);
    }

    // read before login, which regenerates the session
    let stored_return_to = if options.success_return_to_or_redirect.is_some() {
        request.take_return_to()
    } else {
        None
    };

    if let Err(error) = authenticator.login(request, user, options).await {
        if let Some(url) = &stored_return_to {
            request.set_return_to(url);
        }
        return Err(error);
    }

    record_message(request, options.success_message.as_ref(), Some(&info));

    if options.auth_info {
        let info = authenticator.transform(info, request).await?;
        request.set_auth_info(info);
    }

    let return_to = stored_return_to.or_else(|| options.success_return_to_or_redirect.clone());
    if let Some(url) = return_to {
        return Ok(Flow::Respond(response::redirect(&url, StatusCode::FOUND)?));
    }

    if let Some(url) = &options.success_redirect {
        return Ok(Flow::Respond(response::redirect(url, StatusCode::FOUND)?));
    }

    Ok(Flow::Continue)
}

fn complete_failure(
    failures: Vec<Failure>,
    options: &AuthenticateOptions,
    request: &mut RequestContext,
) -> Result<Flow, Error> {
    let primary = failures
        .first()
        .and_then(|failure| failure.challenge.as_ref());
    record_flash(request, options.failure_flash.as_ref(), "error", primary);
    record_message(request, options.failure_message.as_ref(), primary);

    if let Some(url) = &options.failure_redirect {
        return Ok(Flow::Respond(response::redirect(url, StatusCode::FOUND)?));
    }

    let status = failures
        .iter()
        .find_map(|failure| failure.status)
        .unwrap_or(StatusCode::UNAUTHORIZED);
    let challenges: Vec<String> = failures
        .iter()
        .filter_map(|failure| failure.challenge.as_ref().and_then(Value::as_str))
        .map(str::to_string)
        .collect();

    debug!(
        "Authentication failed after {} attempt(s) with status {status}",
        failures.len()
    );

    if options.fail_with_error {
        return Err(Error::authentication(status, challenges));
    }

    Ok(Flow::Respond(response::unauthorized(status, &challenges)))
}

fn record_flash(
    request: &mut RequestContext,
    option: Option<&FlashOption>,
    default_kind: &str,
    detail: Option<&Value>,
) {
    let Some((kind, message)) = option.and_then(|option| option.resolve(default_kind, detail))
    else {
        return;
    };

    match request.flash_mut() {
        Some(flash) => flash.push(&kind, &message),
        None => warn!("Flash requested but no flash store is attached to the request"),
    }
}

fn record_message(request: &mut RequestContext, option: Option<&MessageOption>, detail: Option<&Value>) {
    if let Some(message) = option.and_then(|option| option.resolve(detail)) {
        request.push_message(&message);
    }
}
