use chrono::{DateTime, TimeZone, Utc};

use crate::domain::geo::{parse_distance, DistanceUnit, LatLng, EARTH_RADIUS_M};
use crate::domain::report::{DifficultyStats, MonthlyPlan, TourDistance};
use crate::domain::tour::{TourView, Visibility};
use crate::usecase::contracts::{TourRepository, UserRepository};
use crate::usecase::error::UsecaseError;
use crate::usecase::tours::populate_guides;

/// Tours rated below this are left out of the difficulty statistics.
pub const STATS_MIN_RATING: f64 = 4.5;

const MIN_YEAR: i32 = 1;
const MAX_YEAR: i32 = 9998;

/// `[Y-01-01, Y+1-01-01)` in UTC.
pub fn year_bounds(raw: &str) -> Result<(DateTime<Utc>, DateTime<Utc>), UsecaseError> {
    let invalid = || UsecaseError::BadRequest(format!("Invalid year: {raw}"));

    let year = raw
        .trim()
        .parse::<i32>()
        .ok()
        .filter(|y| (MIN_YEAR..=MAX_YEAR).contains(y))
        .ok_or_else(invalid)?;

    let from = Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).single().ok_or_else(invalid)?;
    let to = Utc.with_ymd_and_hms(year + 1, 1, 1, 0, 0, 0).single().ok_or_else(invalid)?;
    Ok((from, to))
}

pub struct ReportsUseCase<T, U>
where
    T: TourRepository,
    U: UserRepository,
{
    tour_repository: T,
    user_repository: U,
}

impl<T, U> ReportsUseCase<T, U>
where
    T: TourRepository,
    U: UserRepository,
{
    pub fn new(tour_repository: T, user_repository: U) -> Self {
        Self {
            tour_repository,
            user_repository,
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn tour_stats(&self) -> Result<Vec<DifficultyStats>, UsecaseError> {
        tracing::debug!("computing tour stats");

        let stats = self
            .tour_repository
            .stats_by_difficulty(Visibility::PublicOnly, STATS_MIN_RATING)
            .await?;

        tracing::debug!(groups = stats.len(), "tour stats computed");
        Ok(stats)
    }

    #[tracing::instrument(skip(self))]
    pub async fn monthly_plan(&self, year: &str) -> Result<Vec<MonthlyPlan>, UsecaseError> {
        tracing::debug!("computing monthly plan");

        let (from, to) = year_bounds(year)?;
        let plan = self
            .tour_repository
            .monthly_plan(Visibility::PublicOnly, from, to)
            .await?;

        tracing::debug!(months = plan.len(), "monthly plan computed");
        Ok(plan)
    }

    #[tracing::instrument(skip(self))]
    pub async fn tours_within(
        &self,
        distance: &str,
        latlng: &str,
        unit: &str,
    ) -> Result<Vec<TourView>, UsecaseError> {
        let distance = parse_distance(distance)?;
        let center: LatLng = latlng.parse()?;
        let unit: DistanceUnit = unit.parse()?;
        let radius = unit.radius_in_radians(distance);

        tracing::debug!(radius, "finding tours within radius");

        let tours = self
            .tour_repository
            .find_within(Visibility::PublicOnly, center, radius)
            .await?;
        populate_guides(&self.user_repository, tours).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn distances(&self, latlng: &str, unit: &str) -> Result<Vec<TourDistance>, UsecaseError> {
        let origin: LatLng = latlng.parse()?;
        let unit: DistanceUnit = unit.parse()?;

        tracing::debug!("computing distances");

        // The repository yields angles; scale to metres, then to the unit.
        let multiplier = EARTH_RADIUS_M * unit.meters_multiplier();
        let distances = self
            .tour_repository
            .distances_from(Visibility::PublicOnly, origin, multiplier)
            .await?;

        Ok(distances)
    }
}
