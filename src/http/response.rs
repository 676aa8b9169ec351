use bytes::Bytes;
use http_body_util::Full;
use hyper::body::{Body, Frame, SizeHint};
use hyper::header::{HeaderValue, CONTENT_LENGTH, CONTENT_TYPE, LOCATION, WWW_AUTHENTICATE};
use hyper::{Response, StatusCode};
use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};
use tracing::warn;

use crate::error::Error;

#[derive(Debug)]
pub enum ResponseBody {
    Empty,
    Fixed(Full<Bytes>),
}

impl ResponseBody {
    pub fn empty() -> Self {
        ResponseBody::Empty
    }

    pub fn fixed(data: impl Into<Bytes>) -> Self {
        ResponseBody::Fixed(Full::new(data.into()))
    }
}

impl Body for ResponseBody {
    type Data = Bytes;
    type Error = Infallible;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        match self.get_mut() {
            ResponseBody::Empty => Poll::Ready(None),
            ResponseBody::Fixed(body) => Pin::new(body).poll_frame(cx),
        }
    }

    fn is_end_stream(&self) -> bool {
        match self {
            ResponseBody::Empty => true,
            ResponseBody::Fixed(body) => body.is_end_stream(),
        }
    }

    fn size_hint(&self) -> SizeHint {
        match self {
            ResponseBody::Empty => SizeHint::with_exact(0),
            ResponseBody::Fixed(body) => body.size_hint(),
        }
    }
}

pub fn redirect(url: &str, status: StatusCode) -> Result<Response<ResponseBody>, Error> {
    let location = HeaderValue::from_str(url).map_err(|error| {
        warn!("Invalid redirect location '{url}': {error}");
        Error::Internal(format!("Invalid redirect location: {url}"))
    })?;

    let mut response = Response::new(ResponseBody::empty());
    *response.status_mut() = status;
    response.headers_mut().insert(LOCATION, location);
    response
        .headers_mut()
        .insert(CONTENT_LENGTH, HeaderValue::from_static("0"));

    Ok(response)
}

/// Builds the response for an exhausted strategy chain.
///
/// Challenges are only advertised when the status is `401 Unauthorized`.
/// Challenges that are not valid header values are dropped.
pub fn unauthorized(status: StatusCode, challenges: &[String]) -> Response<ResponseBody> {
    let body = status.canonical_reason().unwrap_or("Unauthorized");

    let mut response = Response::new(ResponseBody::fixed(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
    append_challenges(&mut response, status, challenges);

    response
}

pub fn error_to_response(error: &Error, request_id: Option<&String>) -> Response<ResponseBody> {
    let status = error.status_code();
    let body = error.as_json(request_id).to_string();

    let mut response = Response::new(ResponseBody::fixed(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    if let Error::Authentication { challenges, .. } = error {
        append_challenges(&mut response, status, challenges);
    }

    response
}

fn append_challenges(
    response: &mut Response<ResponseBody>,
    status: StatusCode,
    challenges: &[String],
) {
    if status != StatusCode::UNAUTHORIZED {
        return;
    }

    for challenge in challenges {
        match HeaderValue::from_str(challenge) {
            Ok(value) => {
                response.headers_mut().append(WWW_AUTHENTICATE, value);
            }
            Err(error) => warn!("Dropping invalid authentication challenge {challenge:?}: {error}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_string(response: Response<ResponseBody>) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_redirect() {
        let response = redirect("/login", StatusCode::FOUND).unwrap();

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers().get(LOCATION).unwrap(), "/login");
        assert_eq!(response.headers().get(CONTENT_LENGTH).unwrap(), "0");
        assert!(body_string(response).await.is_empty());
    }

    #[test]
    fn test_redirect_rejects_invalid_location() {
        let result = redirect("/login\nX-Injected: 1", StatusCode::FOUND);
        assert!(matches!(result, Err(Error::Internal(_))));
    }

    #[tokio::test]
    async fn test_unauthorized_with_challenges() {
        let challenges = vec![
            r#"Basic realm="Users""#.to_string(),
            "Bearer".to_string(),
        ];
        let response = unauthorized(StatusCode::UNAUTHORIZED, &challenges);

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let values: Vec<_> = response
            .headers()
            .get_all(WWW_AUTHENTICATE)
            .iter()
            .map(|value| value.to_str().unwrap().to_string())
            .collect();
        assert_eq!(values, challenges);
        assert_eq!(body_string(response).await, "Unauthorized");
    }

    #[tokio::test]
    async fn test_unauthorized_drops_invalid_challenges() {
        let challenges = vec!["Bearer".to_string(), "bad\nline".to_string()];
        let response = unauthorized(StatusCode::UNAUTHORIZED, &challenges);

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let values: Vec<_> = response.headers().get_all(WWW_AUTHENTICATE).iter().collect();
        assert_eq!(values, vec!["Bearer"]);
        assert_eq!(body_string(response).await, "Unauthorized");
    }

    #[tokio::test]
    async fn test_unauthorized_other_status_has_no_challenges() {
        let challenges = vec!["Bearer".to_string()];
        let response = unauthorized(StatusCode::FORBIDDEN, &challenges);

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(response.headers().get(WWW_AUTHENTICATE).is_none());
        assert_eq!(body_string(response).await, "Forbidden");
    }

    #[tokio::test]
    async fn test_error_to_response() {
        let error = Error::authentication(StatusCode::UNAUTHORIZED, vec!["Bearer".to_string()]);
        let response = error_to_response(&error, None);

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers().get(WWW_AUTHENTICATE).unwrap(), "Bearer");
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "application/json"
        );

        let body: serde_json::Value =
            serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["errors"][0]["code"], "UNAUTHORIZED");
    }
}
