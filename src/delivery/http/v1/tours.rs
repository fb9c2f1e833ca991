use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::delivery::contracts::{ResourceUseCase, Tours};
use crate::delivery::http::v1::factory::{counted_envelope, envelope, list_envelope};
use crate::domain::tour::{NewTour, TourPatch, TourView};
use crate::usecase::api_features::{Listing, QueryParams};
use crate::usecase::error::UsecaseError;
use crate::usecase::tours::top_cheap_params;
use crate::AppState;

impl ResourceUseCase for Tours {
    type Document = TourView;
    type Create = NewTour;
    type Update = TourPatch;

    const SINGULAR: &'static str = "tour";
    const PLURAL: &'static str = "tours";

    async fn list(&self, params: QueryParams) -> Result<Listing<TourView>, UsecaseError> {
        self.list_tours(params).await
    }

    async fn get(&self, id: Uuid) -> Result<TourView, UsecaseError> {
        self.get_tour(id).await
    }

    async fn create(&self, input: NewTour, _actor: Option<Uuid>) -> Result<TourView, UsecaseError> {
        self.create_tour(input).await
    }

    async fn update(&self, id: Uuid, input: TourPatch) -> Result<TourView, UsecaseError> {
        self.update_tour(id, input).await
    }

    async fn delete(&self, id: Uuid) -> Result<(), UsecaseError> {
        self.delete_tour(id).await
    }
}

#[tracing::instrument(skip(state))]
pub async fn top_five_cheap(
    State(state): State<Arc<AppState>>,
    Query(params): Query<QueryParams>,
) -> Result<impl IntoResponse, UsecaseError> {
    tracing::debug!("handling top-5-cheap request");

    let listing = state.tours.list_tours(top_cheap_params(params)).await?;
    Ok((StatusCode::OK, list_envelope(Tours::PLURAL, listing)?))
}

#[tracing::instrument(skip(state))]
pub async fn tour_stats(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, UsecaseError> {
    let stats = state.reports.tour_stats().await?;

    Ok((StatusCode::OK, Json(envelope("stats", serde_json::to_value(stats)?))))
}

#[tracing::instrument(skip(state))]
pub async fn monthly_plan(
    State(state): State<Arc<AppState>>,
    Path(year): Path<String>,
) -> Result<impl IntoResponse, UsecaseError> {
    let plan = state.reports.monthly_plan(&year).await?;

    Ok((StatusCode::OK, counted_envelope("plan", plan)?))
}

#[tracing::instrument(skip(state))]
pub async fn tours_within(
    State(state): State<Arc<AppState>>,
    Path((distance, latlng, unit)): Path<(String, String, String)>,
) -> Result<impl IntoResponse, UsecaseError> {
    let tours = state.reports.tours_within(&distance, &latlng, &unit).await?;

    Ok((StatusCode::OK, counted_envelope("data", tours)?))
}

#[tracing::instrument(skip(state))]
pub async fn distances(
    State(state): State<Arc<AppState>>,
    Path((latlng, unit)): Path<(String, String)>,
) -> Result<impl IntoResponse, UsecaseError> {
    let distances = state.reports.distances(&latlng, &unit).await?;

    Ok((StatusCode::OK, Json(envelope("data", serde_json::to_value(distances)?))))
}
