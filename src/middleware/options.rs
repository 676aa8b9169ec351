use serde::Deserialize;
use serde_json::Value;

/// Per-invocation dispatch options.
///
/// Also deserializable from the `profiles` section of the configuration file.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct AuthenticateOptions {
    /// Persist the identity in the session on success.
    pub session: bool,
    pub success_redirect: Option<String>,
    pub failure_redirect: Option<String>,
    /// Redirect to the `returnTo` URL remembered in the session, falling back to this one.
    pub success_return_to_or_redirect: Option<String>,
    /// Assign the identity to this request property instead of logging in.
    pub assign_property: Option<String>,
    pub success_flash: Option<FlashOption>,
    pub failure_flash: Option<FlashOption>,
    pub success_message: Option<MessageOption>,
    pub failure_message: Option<MessageOption>,
    /// Surface an exhausted chain as [`crate::Error::Authentication`] instead of a response.
    pub fail_with_error: bool,
    /// Run the auth info transformer chain on success.
    pub auth_info: bool,
    /// Accepted for compatibility; request bodies are never consumed during dispatch.
    pub pause_stream: bool,
}

impl Default for AuthenticateOptions {
    fn default() -> Self {
        AuthenticateOptions {
            session: true,
            success_redirect: None,
            failure_redirect: None,
            success_return_to_or_redirect: None,
            assign_property: None,
            success_flash: None,
            failure_flash: None,
            success_message: None,
            failure_message: None,
            fail_with_error: false,
            auth_info: true,
            pause_stream: false,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum FlashOption {
    /// `true` takes kind and message from the strategy's challenge or info.
    Enabled(bool),
    Message(String),
    Custom {
        #[serde(default, rename = "type")]
        kind: Option<String>,
        #[serde(default)]
        message: Option<String>,
    },
}

impl FlashOption {
    pub(crate) fn resolve(&self, default_kind: &str, detail: Option<&Value>) -> Option<(String, String)> {
        let (kind, message) = match self {
            FlashOption::Enabled(false) => return None,
            FlashOption::Enabled(true) => (None, None),
            FlashOption::Message(message) => (Some(default_kind.to_string()), Some(message.clone())),
            FlashOption::Custom { kind, message } => (kind.clone(), message.clone()),
        };

        let kind = kind
            .or_else(|| detail_kind(detail))
            .unwrap_or_else(|| default_kind.to_string());
        let message = message.or_else(|| detail_message(detail))?;

        Some((kind, message))
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MessageOption {
    /// `true` takes the message from the strategy's challenge or info.
    Enabled(bool),
    Text(String),
}

impl MessageOption {
    pub(crate) fn resolve(&self, detail: Option<&Value>) -> Option<String> {
        match self {
            MessageOption::Enabled(false) => None,
            MessageOption::Enabled(true) => detail_message(detail),
            MessageOption::Text(text) => Some(text.clone()),
        }
    }
}

// a challenge or info is either a bare message or an object with `type`/`message`
fn detail_kind(detail: Option<&Value>) -> Option<String> {
    detail?.get("type")?.as_str().map(str::to_string)
}

fn detail_message(detail: Option<&Value>) -> Option<String> {
    let detail = detail?;
    detail
        .as_str()
        .or_else(|| detail.get("message").and_then(Value::as_str))
        .map(str::to_string)
}
