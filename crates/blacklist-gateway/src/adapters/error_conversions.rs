//! Error conversions into HTTP responses.
//!
//! These involve axum types and belong in the adapters layer.

use crate::domain::error::{ApiError, ErrorBody};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::BAD_REQUEST);
        (status, Json(ErrorBody::from(&self))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn response_body(resp: Response) -> serde_json::Value {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn access_denied_produces_403_json() {
        let resp = ApiError::access_denied().into_response();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        let body = response_body(resp).await;
        assert_eq!(body["error"], "Access denied: IP blocked");
    }

    #[tokio::test]
    async fn not_found_produces_404_json() {
        let resp = ApiError::record_not_found(7).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body = response_body(resp).await;
        assert_eq!(body["error"], "No attack found at index 7");
    }
}
