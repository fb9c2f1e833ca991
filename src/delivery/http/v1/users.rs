use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use uuid::Uuid;

use crate::delivery::contracts::{ResourceUseCase, Users};
use crate::delivery::http::v1::factory::document_envelope;
use crate::delivery::http::v1::middleware::AuthenticatedUser;
use crate::domain::user::{NewUser, UserPatch, UserView};
use crate::usecase::api_features::{Listing, QueryParams};
use crate::usecase::error::UsecaseError;
use crate::AppState;

impl ResourceUseCase for Users {
    type Document = UserView;
    type Create = NewUser;
    type Update = UserPatch;

    const SINGULAR: &'static str = "user";
    const PLURAL: &'static str = "users";

    async fn list(&self, params: QueryParams) -> Result<Listing<UserView>, UsecaseError> {
        self.list_users(params).await
    }

    async fn get(&self, id: Uuid) -> Result<UserView, UsecaseError> {
        self.get_user(id).await
    }

    async fn create(&self, input: NewUser, _actor: Option<Uuid>) -> Result<UserView, UsecaseError> {
        self.create_user(input).await
    }

    async fn update(&self, id: Uuid, input: UserPatch) -> Result<UserView, UsecaseError> {
        self.update_user(id, input).await
    }

    async fn delete(&self, id: Uuid) -> Result<(), UsecaseError> {
        self.delete_user(id).await
    }
}

#[tracing::instrument(skip(state), fields(user_id = %user.user_id))]
pub async fn me(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, UsecaseError> {
    let view = state.users.get_user(user.user_id).await?;

    Ok((StatusCode::OK, document_envelope(Users::SINGULAR, view)?))
}
