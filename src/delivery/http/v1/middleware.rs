use axum::{
    extract::{Request, State},
    http::Method,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use uuid::Uuid;

use crate::usecase::error::{envelope_status, ErrorReport, UsecaseError};
use crate::usecase::jwt::{JwtService, TokenType};

pub const SIGNUP_PATH: &str = "/api/v1/users";

const NOT_LOGGED_IN: &str = "You are not logged in! Please log in to get access.";

#[derive(Clone, Debug)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub email: String,
}

fn authenticate(jwt_service: &JwtService, request: &mut Request) -> Result<(), UsecaseError> {
    let token = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            tracing::warn!("missing or invalid authorization header");
            UsecaseError::Unauthorized(NOT_LOGGED_IN.to_string())
        })?;

    let claims = jwt_service.validate_token(token).map_err(|e| {
        tracing::warn!(error = %e, "invalid token");
        UsecaseError::Unauthorized(e.to_string())
    })?;

    if claims.token_type != TokenType::Access {
        tracing::warn!("attempted to use non-access token for authentication");
        return Err(UsecaseError::Unauthorized("Invalid token type".to_string()));
    }

    let user_id = Uuid::parse_str(&claims.sub).map_err(|e| {
        tracing::warn!(error = %e, "token subject is not a user id");
        UsecaseError::Unauthorized("Invalid token subject".to_string())
    })?;

    let authenticated_user = AuthenticatedUser {
        user_id,
        email: claims.email,
    };

    tracing::debug!(?authenticated_user, "user authenticated successfully");
    request.extensions_mut().insert(authenticated_user);
    Ok(())
}

fn is_read(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

/// Every request needs a valid access token.
pub async fn auth_middleware(
    State(jwt_service): State<JwtService>,
    mut request: Request,
    next: Next,
) -> Result<Response, UsecaseError> {
    authenticate(&jwt_service, &mut request)?;
    Ok(next.run(request).await)
}

/// Reads are public, anything else needs a valid access token.
pub async fn protect_writes(
    State(jwt_service): State<JwtService>,
    mut request: Request,
    next: Next,
) -> Result<Response, UsecaseError> {
    if !is_read(request.method()) {
        authenticate(&jwt_service, &mut request)?;
    }
    Ok(next.run(request).await)
}

/// Signing up is the only anonymous user operation.
pub async fn protect_except_signup(
    State(jwt_service): State<JwtService>,
    mut request: Request,
    next: Next,
) -> Result<Response, UsecaseError> {
    let signup = request.method() == Method::POST && request.uri().path() == SIGNUP_PATH;
    if !signup {
        authenticate(&jwt_service, &mut request)?;
    }
    Ok(next.run(request).await)
}

/// Outside production, error bodies also carry the underlying detail.
pub async fn error_details(State(expose): State<bool>, request: Request, next: Next) -> Response {
    let response = next.run(request).await;
    if !expose {
        return response;
    }
    let Some(report) = response.extensions().get::<ErrorReport>().cloned() else {
        return response;
    };

    let body = json!({
        "status": envelope_status(report.status),
        "message": report.message,
        "error": report.detail,
    });
    let mut detailed = (report.status, Json(body)).into_response();
    detailed.extensions_mut().insert(report);
    detailed
}
