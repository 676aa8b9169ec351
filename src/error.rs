use std::fmt;

use hyper::StatusCode;
use serde_json::json;

#[derive(Debug, PartialEq)]
pub enum Error {
    Initialization(String),
    UnknownStrategy(String),
    SessionUnavailable,
    Session(String),
    Serialization(String),
    Deserialization(String),
    Strategy(String),
    // terminal outcome of a dispatch when failures are surfaced as errors
    Authentication {
        status: StatusCode,
        message: String,
        challenges: Vec<String>,
    },
    Internal(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Initialization(err) | Error::Strategy(err) => write!(f, "{err}"),
            Error::UnknownStrategy(name) => write!(f, "Unknown authentication strategy \"{name}\""),
            Error::SessionUnavailable => {
                write!(f, "Login sessions require session support on the request")
            }
            Error::Session(err) => write!(f, "Session error: {err}"),
            Error::Serialization(err) | Error::Deserialization(err) => write!(f, "{err}"),
            Error::Authentication { message, .. } => write!(f, "{message}"),
            Error::Internal(err) => write!(f, "Internal Server Error: {err}"),
        }
    }
}

impl std::error::Error for Error {}

impl Error {
    pub fn authentication(status: StatusCode, challenges: Vec<String>) -> Self {
        let message = status
            .canonical_reason()
            .unwrap_or("Unauthorized")
            .to_string();

        Error::Authentication {
            status,
            message,
            challenges,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Authentication { status, .. } => *status,
            Error::Initialization(_)
            | Error::UnknownStrategy(_)
            | Error::SessionUnavailable
            | Error::Session(_)
            | Error::Serialization(_)
            | Error::Deserialization(_)
            | Error::Strategy(_)
            | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn as_json(&self, request_id: Option<&String>) -> serde_json::Value {
        let code = match self {
            Error::Authentication { status, .. } if *status == StatusCode::UNAUTHORIZED => {
                "UNAUTHORIZED"
            }
            Error::Authentication { .. } => "AUTHENTICATION_FAILED",
            Error::UnknownStrategy(_) => "UNKNOWN_STRATEGY",
            _ => "INTERNAL_SERVER_ERROR",
        };
        let message = self.to_string();

        if let Some(request_id) = request_id {
            json!({
                "errors": [{
                    "code": code,
                    "message": message,
                    "detail": { "request_id": request_id }
                }]
            })
        } else {
            json!({
                "errors": [{
                    "code": code,
                    "message": message,
                    "detail": null
                }]
            })
        }
    }
}
