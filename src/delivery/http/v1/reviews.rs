use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use crate::delivery::contracts::{ResourceUseCase, Reviews};
use crate::delivery::http::v1::extract::{parse_id, Actor, ApiJson};
use crate::delivery::http::v1::factory::{document_envelope, list_envelope};
use crate::domain::review::{NewReview, ReviewPatch, ReviewView};
use crate::usecase::api_features::{Listing, QueryParams};
use crate::usecase::error::UsecaseError;
use crate::AppState;

impl ResourceUseCase for Reviews {
    type Document = ReviewView;
    type Create = NewReview;
    type Update = ReviewPatch;

    const SINGULAR: &'static str = "review";
    const PLURAL: &'static str = "reviews";

    async fn list(&self, params: QueryParams) -> Result<Listing<ReviewView>, UsecaseError> {
        self.list_reviews(params, None).await
    }

    async fn get(&self, id: Uuid) -> Result<ReviewView, UsecaseError> {
        self.get_review(id).await
    }

    async fn create(&self, input: NewReview, actor: Option<Uuid>) -> Result<ReviewView, UsecaseError> {
        self.create_review(input, None, actor).await
    }

    async fn update(&self, id: Uuid, input: ReviewPatch) -> Result<ReviewView, UsecaseError> {
        self.update_review(id, input).await
    }

    async fn delete(&self, id: Uuid) -> Result<(), UsecaseError> {
        self.delete_review(id).await
    }
}

/// `GET /tours/{id}/reviews`
#[tracing::instrument(skip(state, params))]
pub async fn list_tour_reviews(
    State(state): State<Arc<AppState>>,
    Path(tour_id): Path<String>,
    Query(params): Query<QueryParams>,
) -> Result<impl IntoResponse, UsecaseError> {
    let tour_id = parse_id(&tour_id)?;
    tracing::debug!(%tour_id, "handling tour reviews request");

    let listing = state.reviews.list_reviews(params, Some(tour_id)).await?;
    Ok((StatusCode::OK, list_envelope(Reviews::PLURAL, listing)?))
}

/// `POST /tours/{id}/reviews`
#[tracing::instrument(skip(state, input))]
pub async fn create_tour_review(
    State(state): State<Arc<AppState>>,
    Path(tour_id): Path<String>,
    Actor(actor): Actor,
    ApiJson(input): ApiJson<NewReview>,
) -> Result<impl IntoResponse, UsecaseError> {
    let tour_id = parse_id(&tour_id)?;

    let review = state.reviews.create_review(input, Some(tour_id), actor).await?;

    tracing::debug!(review_id = %review.id, "review created for tour");
    Ok((StatusCode::CREATED, document_envelope(Reviews::SINGULAR, review)?))
}
