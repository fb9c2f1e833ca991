mod config;
mod delivery;
mod domain;
mod repository;
mod telemetry;
mod usecase;

use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::State,
    http::Uri,
    middleware,
    routing::get,
    Router,
};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tower_http::trace::TraceLayer;

use crate::delivery::contracts::{Bookings, Reports, Reviews, Tours, Users};
use crate::delivery::http::v1::factory::resource_router;
use crate::delivery::http::v1::middleware::{auth_middleware, error_details, protect_except_signup, protect_writes};
use crate::delivery::http::v1::{reviews, tours, users};
use crate::repository::postgres::{
    create_pool, PostgresBookingRepository, PostgresReviewRepository, PostgresTourRepository, PostgresUserRepository,
};
use crate::usecase::error::UsecaseError;
use crate::usecase::jwt::JwtService;

pub struct AppState {
    pub tours: Arc<Tours>,
    pub users: Arc<Users>,
    pub reviews: Arc<Reviews>,
    pub bookings: Arc<Bookings>,
    pub reports: Reports,
    pub jwt_service: JwtService,
    pub metrics_handle: PrometheusHandle,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = config::AppConfig::from_env().context("failed to load configuration")?;

    let env_filter = telemetry::env_filter();
    let tracer_provider = if config.telemetry_enabled {
        let provider = telemetry::init_telemetry_with_subscriber(&config.telemetry(), env_filter)
            .map_err(|e| anyhow::anyhow!("failed to initialize telemetry: {e}"))?;
        Some(provider)
    } else {
        telemetry::init_subscriber_without_telemetry(env_filter);
        None
    };

    tracing::info!(app_env = %config.app_env, "starting the tours service");

    let metrics_handle = PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install Prometheus recorder")?;
    metrics_process::Collector::default().describe();
    tracing::info!("prometheus metrics initialized");

    let pool = create_pool(&config.database_url, config.database_max_connections)
        .await
        .context("failed to create database pool")?;
    tracing::info!("database pool created");

    sqlx::migrate!().run(&pool).await?;
    tracing::info!("database migrations applied");

    let shared_state = Arc::new(AppState {
        tours: Arc::new(Tours::new(
            PostgresTourRepository::new(pool.clone()),
            PostgresUserRepository::new(pool.clone()),
            PostgresReviewRepository::new(pool.clone()),
        )),
        users: Arc::new(Users::new(
            PostgresUserRepository::new(pool.clone()),
            PostgresReviewRepository::new(pool.clone()),
            PostgresTourRepository::new(pool.clone()),
        )),
        reviews: Arc::new(Reviews::new(
            PostgresReviewRepository::new(pool.clone()),
            PostgresTourRepository::new(pool.clone()),
        )),
        bookings: Arc::new(Bookings::new(
            PostgresBookingRepository::new(pool.clone()),
            PostgresTourRepository::new(pool.clone()),
        )),
        reports: Reports::new(
            PostgresTourRepository::new(pool.clone()),
            PostgresUserRepository::new(pool),
        ),
        jwt_service: JwtService::new(config.jwt_secret.clone()),
        metrics_handle,
    });

    let router = build_router(shared_state, !config.is_production());

    let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
    tracing::info!(addr = %config.http_addr, "tours service running");
    axum::serve(listener, router).await?;

    if let Some(provider) = tracer_provider {
        telemetry::shutdown_telemetry(provider);
    }

    Ok(())
}

fn build_router(state: Arc<AppState>, expose_error_details: bool) -> Router {
    let jwt = state.jwt_service.clone();

    // Reads are public, writes need a token.
    let tours_api: Router<Arc<AppState>> = resource_router("/api/v1/tours", state.tours.clone())
        .route("/api/v1/tours/top-5-cheap", get(tours::top_five_cheap))
        .route("/api/v1/tours/tour-stats", get(tours::tour_stats))
        .route("/api/v1/tours/monthly-plan/{year}", get(tours::monthly_plan))
        .route(
            "/api/v1/tours/tours-within/{distance}/center/{latlng}/unit/{unit}",
            get(tours::tours_within),
        )
        .route("/api/v1/tours/distances/{latlng}/unit/{unit}", get(tours::distances))
        .route(
            "/api/v1/tours/{id}/reviews",
            get(reviews::list_tour_reviews).post(reviews::create_tour_review),
        )
        .merge(resource_router::<_, Arc<AppState>>("/api/v1/reviews", state.reviews.clone()))
        .layer(middleware::from_fn_with_state(jwt.clone(), protect_writes));

    let users_api: Router<Arc<AppState>> = resource_router("/api/v1/users", state.users.clone())
        .route("/api/v1/users/me", get(users::me))
        .layer(middleware::from_fn_with_state(jwt.clone(), protect_except_signup));

    let bookings_api: Router<Arc<AppState>> = resource_router("/api/v1/bookings", state.bookings.clone())
        .layer(middleware::from_fn_with_state(jwt, auth_middleware));

    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .merge(tours_api)
        .merge(users_api)
        .merge(bookings_api)
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(expose_error_details, error_details))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn metrics(State(state): State<Arc<AppState>>) -> String {
    metrics_process::Collector::default().collect();
    state.metrics_handle.render()
}

#[tracing::instrument]
async fn healthz() -> &'static str {
    "OK"
}

async fn not_found(uri: Uri) -> UsecaseError {
    UsecaseError::NotFound(format!("Can't find {uri} on this server!"))
}
