use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    domain::booking::Booking,
    domain::geo::LatLng,
    domain::report::{DifficultyStats, MonthlyPlan, TourDistance},
    domain::review::{RatingStats, Review, ReviewRecord},
    domain::tour::{Tour, Visibility},
    domain::user::User,
    repository::errors::RepositoryError,
    usecase::api_features::ApiFeatures,
};

#[cfg_attr(test, mockall::automock)]
pub trait TourRepository: Send + Sync {
    async fn find(&self, features: &ApiFeatures, visibility: Visibility) -> Result<Vec<Tour>, RepositoryError>;
    async fn find_by_id(&self, id: Uuid, visibility: Visibility) -> Result<Option<Tour>, RepositoryError>;
    async fn create(&self, tour: &Tour) -> Result<(), RepositoryError>;
    async fn update(&self, tour: &Tour) -> Result<(), RepositoryError>;
    async fn delete(&self, id: Uuid, visibility: Visibility) -> Result<(), RepositoryError>;
    /// Writes the review aggregates regardless of visibility.
    async fn update_ratings(&self, id: Uuid, quantity: i32, average: f64) -> Result<(), RepositoryError>;
    async fn stats_by_difficulty(&self, visibility: Visibility, min_rating: f64) -> Result<Vec<DifficultyStats>, RepositoryError>;
    async fn monthly_plan(
        &self,
        visibility: Visibility,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<MonthlyPlan>, RepositoryError>;
    async fn find_within(&self, visibility: Visibility, center: LatLng, radius: f64) -> Result<Vec<Tour>, RepositoryError>;
    async fn distances_from(
        &self,
        visibility: Visibility,
        origin: LatLng,
        multiplier: f64,
    ) -> Result<Vec<TourDistance>, RepositoryError>;
}

#[cfg_attr(test, mockall::automock)]
pub trait UserRepository: Send + Sync {
    async fn find(&self, features: &ApiFeatures) -> Result<Vec<User>, RepositoryError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepositoryError>;
    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<User>, RepositoryError>;
    async fn create(&self, user: &User) -> Result<(), RepositoryError>;
    async fn update(&self, user: &User) -> Result<(), RepositoryError>;
    async fn delete(&self, id: Uuid) -> Result<(), RepositoryError>;
}

#[cfg_attr(test, mockall::automock)]
pub trait ReviewRepository: Send + Sync {
    async fn find(&self, features: &ApiFeatures) -> Result<Vec<ReviewRecord>, RepositoryError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<ReviewRecord>, RepositoryError>;
    async fn find_by_tour(&self, tour_id: Uuid) -> Result<Vec<ReviewRecord>, RepositoryError>;
    async fn create(&self, review: &Review) -> Result<(), RepositoryError>;
    async fn update(&self, review: &Review) -> Result<(), RepositoryError>;
    async fn delete(&self, id: Uuid) -> Result<(), RepositoryError>;
    async fn rating_stats(&self, tour_id: Uuid) -> Result<Option<RatingStats>, RepositoryError>;
    /// Distinct tours the user has reviewed.
    async fn tours_reviewed_by(&self, user_id: Uuid) -> Result<Vec<Uuid>, RepositoryError>;
}

#[cfg_attr(test, mockall::automock)]
pub trait BookingRepository: Send + Sync {
    async fn find(&self, features: &ApiFeatures) -> Result<Vec<Booking>, RepositoryError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Booking>, RepositoryError>;
    async fn create(&self, booking: &Booking) -> Result<(), RepositoryError>;
    async fn update(&self, booking: &Booking) -> Result<(), RepositoryError>;
    async fn delete(&self, id: Uuid) -> Result<(), RepositoryError>;
}
