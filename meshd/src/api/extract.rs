//! Request extractors that fail in the API's error format.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use serde::de::DeserializeOwned;

use crate::errors::Error;

/// Like [`axum::extract::Query`], but a malformed query string produces the
/// same JSON `{error, type}` body as every other client error instead of
/// axum's plain-text rejection.
pub struct Query<T>(pub T);

impl<S, T> FromRequestParts<S> for Query<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let axum::extract::Query(value) = axum::extract::Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|e| Error::BadRequest {
                message: format!("Invalid query parameters: {}", e.body_text()),
            })?;
        Ok(Self(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::MeshQuery;

    async fn extract(uri: &str) -> Result<Query<MeshQuery>, Error> {
        let request = axum::http::Request::builder().uri(uri).body(()).unwrap();
        let (mut parts, ()) = request.into_parts();
        Query::<MeshQuery>::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn valid_query_parses() {
        let Query(query) = extract("/mesh?num_radii=3&format=stl").await.unwrap();
        assert_eq!(query.num_radii, 3);
        assert_eq!(query.format, "stl");
    }

    #[tokio::test]
    async fn malformed_value_is_a_bad_request() {
        let result = extract("/mesh?num_radii=abc").await;
        assert!(matches!(result, Err(Error::BadRequest { .. })));
    }
}
