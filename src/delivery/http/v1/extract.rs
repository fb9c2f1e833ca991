use std::convert::Infallible;

use axum::{
    extract::{rejection::JsonRejection, FromRequest, FromRequestParts, Request},
    http::request::Parts,
    Json,
};
use uuid::Uuid;

use crate::delivery::http::v1::middleware::AuthenticatedUser;
use crate::usecase::error::UsecaseError;

/// `Json` whose rejections go through the central error responder.
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = UsecaseError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| UsecaseError::BadRequest(rejection.body_text()))?;
        Ok(Self(value))
    }
}

/// The authenticated user id when the request carried a valid token.
#[derive(Debug, Clone, Copy)]
pub struct Actor(pub Option<Uuid>);

impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(
            parts
                .extensions
                .get::<AuthenticatedUser>()
                .map(|user| user.user_id),
        ))
    }
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = UsecaseError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| {
                UsecaseError::Unauthorized("You are not logged in! Please log in to get access.".to_string())
            })
    }
}

pub fn parse_id(raw: &str) -> Result<Uuid, UsecaseError> {
    Uuid::parse_str(raw).map_err(|_| UsecaseError::BadRequest(format!("Invalid id: {raw}")))
}

#[cfg(test)]
mod tests {
    use axum::{body::Body, http::StatusCode, routing::post, Router};
    use http_body_util::BodyExt;
    use serde::Deserialize;
    use tower::ServiceExt;

    use super::*;

    #[derive(Deserialize)]
    struct Payload {
        name: String,
    }

    async fn echo(ApiJson(payload): ApiJson<Payload>) -> String {
        payload.name
    }

    async fn whoami(Actor(actor): Actor) -> String {
        actor.map(|id| id.to_string()).unwrap_or_default()
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let app = Router::new().route("/", post(echo));

        let response = app
            .oneshot(
                Request::post("/")
                    .header("content-type", "application/json")
                    .body(Body::from("{\"name\":"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "fail");
    }

    #[tokio::test]
    async fn test_well_formed_json_reaches_handler() {
        let app = Router::new().route("/", post(echo));

        let response = app
            .oneshot(
                Request::post("/")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"name":"The Sea Explorer"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"The Sea Explorer");
    }

    #[tokio::test]
    async fn test_actor_is_empty_without_authentication() {
        let app = Router::new().route("/", post(whoami));

        let response = app
            .oneshot(Request::post("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert!(bytes.is_empty());
    }

    #[test]
    fn test_parse_id() {
        let id = Uuid::new_v4();

        assert_eq!(parse_id(&id.to_string()).unwrap(), id);
        match parse_id("5c88fa8cf4afda39709c2955") {
            Err(UsecaseError::BadRequest(msg)) => assert_eq!(msg, "Invalid id: 5c88fa8cf4afda39709c2955"),
            other => panic!("expected bad request, got {other:?}"),
        }
    }
}
