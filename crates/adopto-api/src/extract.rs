use axum::{
    Form, Json,
    extract::{FromRequest, Request},
    http::header::CONTENT_TYPE,
    response::{IntoResponse, Response},
};
use serde::de::DeserializeOwned;

/// A form body, urlencoded (plain HTML forms) or JSON.
///
/// Dispatches on `Content-Type`. JSON types go to [`Json`], everything else
/// to [`Form`], so a missing header is treated as a browser form post.
pub struct FormOrJson<T>(pub T);

impl<T, S> FromRequest<S> for FormOrJson<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if is_json(&req) {
            let Json(value) = Json::<T>::from_request(req, state)
                .await
                .map_err(IntoResponse::into_response)?;
            Ok(Self(value))
        } else {
            let Form(value) = Form::<T>::from_request(req, state)
                .await
                .map_err(IntoResponse::into_response)?;
            Ok(Self(value))
        }
    }
}

fn is_json(req: &Request) -> bool {
    req.headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|mime| {
            let mime = mime.trim();
            mime.eq_ignore_ascii_case("application/json") || mime.ends_with("+json")
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http;

    fn with_type(content_type: Option<&str>) -> Request {
        let mut builder = http::Request::post("/");
        if let Some(ct) = content_type {
            builder = builder.header(CONTENT_TYPE, ct);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_json_detection() {
        assert!(is_json(&with_type(Some("application/json"))));
        assert!(is_json(&with_type(Some("application/json; charset=utf-8"))));
        assert!(is_json(&with_type(Some("application/vnd.api+json"))));
        assert!(!is_json(&with_type(Some("application/x-www-form-urlencoded"))));
        assert!(!is_json(&with_type(None)));
    }
}
