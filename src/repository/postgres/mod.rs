use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, types::Json, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    domain::booking::Booking,
    domain::geo::LatLng,
    domain::report::{DifficultyStats, MonthlyPlan, TourDistance},
    domain::review::{RatingStats, Review, ReviewRecord},
    domain::tour::{Tour, Visibility},
    domain::user::User,
    repository::errors::{map_db_error, RepositoryError},
    usecase::api_features::ApiFeatures,
    usecase::contracts::{BookingRepository, ReviewRepository, TourRepository, UserRepository},
};

const TOUR_COLUMNS: &str = "id, name, slug, duration, max_group_size, difficulty, ratings_average, \
    ratings_quantity, price, price_discount, summary, description, image_cover, images, created_at, \
    start_dates, secret_tour, start_location, locations, guides";

const USER_COLUMNS: &str = "id, name, email, photo, password_hash, password_changed_at, created_at";

const BOOKING_COLUMNS: &str = "id, tour_id, user_id, price, paid, created_at";

// Ends inside the WHERE clause so feature conditions can be appended.
const REVIEW_SELECT: &str = "SELECT r.id, r.review, r.rating, r.created_at, r.tour_id, r.user_id, \
    u.name AS author_name, u.photo AS author_photo \
    FROM reviews r JOIN users u ON u.id = r.user_id WHERE TRUE";

// GeoJSON stores [lng, lat].
const START_LAT: &str = "(start_location->'coordinates'->>1)::float8";
const START_LNG: &str = "(start_location->'coordinates'->>0)::float8";

fn visibility_clause(visibility: Visibility) -> &'static str {
    match visibility {
        Visibility::PublicOnly => "secret_tour = FALSE",
        Visibility::All => "TRUE",
    }
}

// $1, $2: center lat/lng in degrees. $3: radius in radians.
fn within_query(visibility: Visibility) -> String {
    format!(
        "SELECT {TOUR_COLUMNS} FROM tours \
         WHERE {} AND start_location IS NOT NULL \
         AND angular_distance($1, $2, {START_LAT}, {START_LNG}) <= $3 \
         ORDER BY created_at DESC, id ASC",
        visibility_clause(visibility)
    )
}

// $1, $2: origin lat/lng in degrees. $3: radians to output unit.
fn distances_query(visibility: Visibility) -> String {
    format!(
        "SELECT id, name, angular_distance($1, $2, {START_LAT}, {START_LNG}) * $3 AS distance \
         FROM tours \
         WHERE {} AND start_location IS NOT NULL \
         ORDER BY distance ASC, id ASC",
        visibility_clause(visibility)
    )
}

pub struct PostgresTourRepository {
    pool: PgPool,
}

impl PostgresTourRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl TourRepository for PostgresTourRepository {
    #[tracing::instrument(skip(self, features))]
    async fn find(&self, features: &ApiFeatures, visibility: Visibility) -> Result<Vec<Tour>, RepositoryError> {
        tracing::debug!("finding tours");

        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {TOUR_COLUMNS} FROM tours WHERE {}",
            visibility_clause(visibility)
        ));
        features.push_onto(&mut qb);

        let tours = qb
            .build_query_as::<Tour>()
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)?;

        tracing::debug!(count = tours.len(), "found tours");
        Ok(tours)
    }

    #[tracing::instrument(skip(self), fields(tour_id = %id))]
    async fn find_by_id(&self, id: Uuid, visibility: Visibility) -> Result<Option<Tour>, RepositoryError> {
        tracing::debug!("finding tour by id");

        let query = format!(
            "SELECT {TOUR_COLUMNS} FROM tours WHERE id = $1 AND {}",
            visibility_clause(visibility)
        );
        let tour = sqlx::query_as::<_, Tour>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)?;

        Ok(tour)
    }

    #[tracing::instrument(skip(self, tour), fields(tour_id = %tour.id, name = %tour.name))]
    async fn create(&self, tour: &Tour) -> Result<(), RepositoryError> {
        tracing::debug!("creating tour");

        sqlx::query(
            r#"
            INSERT INTO tours (
                id, name, slug, duration, max_group_size, difficulty, ratings_average,
                ratings_quantity, price, price_discount, summary, description, image_cover,
                images, created_at, start_dates, secret_tour, start_location, locations, guides
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)
            "#,
        )
        .bind(tour.id)
        .bind(&tour.name)
        .bind(&tour.slug)
        .bind(tour.duration)
        .bind(tour.max_group_size)
        .bind(tour.difficulty)
        .bind(tour.ratings_average)
        .bind(tour.ratings_quantity)
        .bind(tour.price)
        .bind(tour.price_discount)
        .bind(&tour.summary)
        .bind(&tour.description)
        .bind(&tour.image_cover)
        .bind(&tour.images)
        .bind(tour.created_at)
        .bind(&tour.start_dates)
        .bind(tour.secret_tour)
        .bind(&tour.start_location)
        .bind(Json(&tour.locations))
        .bind(&tour.guides)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        tracing::debug!(tour_id = %tour.id, "tour created successfully");
        Ok(())
    }

    #[tracing::instrument(skip(self, tour), fields(tour_id = %tour.id))]
    async fn update(&self, tour: &Tour) -> Result<(), RepositoryError> {
        tracing::debug!("updating tour");

        let result = sqlx::query(
            r#"
            UPDATE tours
            SET name = $2, slug = $3, duration = $4, max_group_size = $5, difficulty = $6,
                ratings_average = $7, ratings_quantity = $8, price = $9, price_discount = $10,
                summary = $11, description = $12, image_cover = $13, images = $14,
                start_dates = $15, secret_tour = $16, start_location = $17, locations = $18,
                guides = $19
            WHERE id = $1
            "#,
        )
        .bind(tour.id)
        .bind(&tour.name)
        .bind(&tour.slug)
        .bind(tour.duration)
        .bind(tour.max_group_size)
        .bind(tour.difficulty)
        .bind(tour.ratings_average)
        .bind(tour.ratings_quantity)
        .bind(tour.price)
        .bind(tour.price_discount)
        .bind(&tour.summary)
        .bind(&tour.description)
        .bind(&tour.image_cover)
        .bind(&tour.images)
        .bind(&tour.start_dates)
        .bind(tour.secret_tour)
        .bind(&tour.start_location)
        .bind(Json(&tour.locations))
        .bind(&tour.guides)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        tracing::debug!(tour_id = %tour.id, "tour updated successfully");
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(tour_id = %id))]
    async fn delete(&self, id: Uuid, visibility: Visibility) -> Result<(), RepositoryError> {
        tracing::debug!("deleting tour");

        let query = format!("DELETE FROM tours WHERE id = $1 AND {}", visibility_clause(visibility));
        let result = sqlx::query(&query)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        tracing::debug!(tour_id = %id, "tour deleted successfully");
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(tour_id = %id))]
    async fn update_ratings(&self, id: Uuid, quantity: i32, average: f64) -> Result<(), RepositoryError> {
        tracing::debug!(quantity, average, "updating tour ratings");

        let result = sqlx::query(
            r#"
            UPDATE tours
            SET ratings_quantity = $2, ratings_average = $3
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(quantity)
        .bind(average)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn stats_by_difficulty(
        &self,
        visibility: Visibility,
        min_rating: f64,
    ) -> Result<Vec<DifficultyStats>, RepositoryError> {
        tracing::debug!("aggregating tour stats");

        let query = format!(
            r#"
            SELECT UPPER(difficulty) AS difficulty,
                   COUNT(*) AS num_tours,
                   COALESCE(SUM(ratings_quantity), 0)::int8 AS num_ratings,
                   AVG(ratings_average) AS avg_rating,
                   AVG(price) AS avg_price,
                   MIN(price) AS min_price,
                   MAX(price) AS max_price
            FROM tours
            WHERE {} AND ratings_average >= $1
            GROUP BY UPPER(difficulty)
            ORDER BY avg_price ASC
            "#,
            visibility_clause(visibility)
        );

        let stats = sqlx::query_as::<_, DifficultyStats>(&query)
            .bind(min_rating)
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)?;

        tracing::debug!(groups = stats.len(), "tour stats aggregated");
        Ok(stats)
    }

    #[tracing::instrument(skip(self), fields(%from, %to))]
    async fn monthly_plan(
        &self,
        visibility: Visibility,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<MonthlyPlan>, RepositoryError> {
        tracing::debug!("aggregating monthly plan");

        let query = format!(
            r#"
            SELECT EXTRACT(MONTH FROM s.start_date AT TIME ZONE 'UTC')::int4 AS month,
                   COUNT(*) AS num_tour_starts,
                   ARRAY_AGG(t.name ORDER BY t.name) AS tours
            FROM tours t
            CROSS JOIN LATERAL UNNEST(t.start_dates) AS s(start_date)
            WHERE {} AND s.start_date >= $1 AND s.start_date < $2
            GROUP BY month
            ORDER BY num_tour_starts DESC, month ASC
            LIMIT 12
            "#,
            visibility_clause(visibility)
        );

        let plan = sqlx::query_as::<_, MonthlyPlan>(&query)
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)?;

        tracing::debug!(months = plan.len(), "monthly plan aggregated");
        Ok(plan)
    }

    #[tracing::instrument(skip(self), fields(lat = center.lat, lng = center.lng, radius))]
    async fn find_within(&self, visibility: Visibility, center: LatLng, radius: f64) -> Result<Vec<Tour>, RepositoryError> {
        tracing::debug!("finding tours within radius");

        let query = within_query(visibility);
        let tours = sqlx::query_as::<_, Tour>(&query)
            .bind(center.lat)
            .bind(center.lng)
            .bind(radius)
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)?;

        tracing::debug!(count = tours.len(), "found tours within radius");
        Ok(tours)
    }

    #[tracing::instrument(skip(self), fields(lat = origin.lat, lng = origin.lng, multiplier))]
    async fn distances_from(
        &self,
        visibility: Visibility,
        origin: LatLng,
        multiplier: f64,
    ) -> Result<Vec<TourDistance>, RepositoryError> {
        tracing::debug!("computing tour distances");

        let query = distances_query(visibility);
        let distances = sqlx::query_as::<_, TourDistance>(&query)
            .bind(origin.lat)
            .bind(origin.lng)
            .bind(multiplier)
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)?;

        Ok(distances)
    }
}

pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl UserRepository for PostgresUserRepository {
    #[tracing::instrument(skip(self, features))]
    async fn find(&self, features: &ApiFeatures) -> Result<Vec<User>, RepositoryError> {
        tracing::debug!("finding users");

        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {USER_COLUMNS} FROM users WHERE TRUE"));
        features.push_onto(&mut qb);

        let users = qb
            .build_query_as::<User>()
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)?;

        tracing::debug!(count = users.len(), "found users");
        Ok(users)
    }

    #[tracing::instrument(skip(self), fields(user_id = %id))]
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepositoryError> {
        tracing::debug!("finding user by id");

        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)?;

        Ok(user)
    }

    #[tracing::instrument(skip(self, ids), fields(count = ids.len()))]
    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<User>, RepositoryError> {
        tracing::debug!("finding users by ids");

        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ANY($1)");
        let users = sqlx::query_as::<_, User>(&query)
            .bind(ids)
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)?;

        Ok(users)
    }

    #[tracing::instrument(skip(self, user), fields(user_id = %user.id))]
    async fn create(&self, user: &User) -> Result<(), RepositoryError> {
        tracing::debug!("creating user");

        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, photo, password_hash, password_changed_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.photo)
        .bind(&user.password_hash)
        .bind(user.password_changed_at)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        tracing::debug!(user_id = %user.id, "user created successfully");
        Ok(())
    }

    #[tracing::instrument(skip(self, user), fields(user_id = %user.id))]
    async fn update(&self, user: &User) -> Result<(), RepositoryError> {
        tracing::debug!("updating user");

        let result = sqlx::query(
            r#"
            UPDATE users
            SET name = $2, email = $3, photo = $4
            WHERE id = $1
            "#,
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.photo)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(user_id = %id))]
    async fn delete(&self, id: Uuid) -> Result<(), RepositoryError> {
        tracing::debug!("deleting user");

        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

pub struct PostgresReviewRepository {
    pool: PgPool,
}

impl PostgresReviewRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl ReviewRepository for PostgresReviewRepository {
    #[tracing::instrument(skip(self, features))]
    async fn find(&self, features: &ApiFeatures) -> Result<Vec<ReviewRecord>, RepositoryError> {
        tracing::debug!("finding reviews");

        let mut qb = QueryBuilder::<Postgres>::new(REVIEW_SELECT);
        features.push_onto(&mut qb);

        let reviews = qb
            .build_query_as::<ReviewRecord>()
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)?;

        tracing::debug!(count = reviews.len(), "found reviews");
        Ok(reviews)
    }

    #[tracing::instrument(skip(self), fields(review_id = %id))]
    async fn find_by_id(&self, id: Uuid) -> Result<Option<ReviewRecord>, RepositoryError> {
        tracing::debug!("finding review by id");

        let query = format!("{REVIEW_SELECT} AND r.id = $1");
        let review = sqlx::query_as::<_, ReviewRecord>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)?;

        Ok(review)
    }

    #[tracing::instrument(skip(self), fields(tour_id = %tour_id))]
    async fn find_by_tour(&self, tour_id: Uuid) -> Result<Vec<ReviewRecord>, RepositoryError> {
        tracing::debug!("finding reviews by tour");

        let query = format!("{REVIEW_SELECT} AND r.tour_id = $1 ORDER BY r.created_at DESC, r.id ASC");
        let reviews = sqlx::query_as::<_, ReviewRecord>(&query)
            .bind(tour_id)
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)?;

        tracing::debug!(%tour_id, count = reviews.len(), "found reviews");
        Ok(reviews)
    }

    #[tracing::instrument(skip(self, review), fields(review_id = %review.id, tour_id = %review.tour_id))]
    async fn create(&self, review: &Review) -> Result<(), RepositoryError> {
        tracing::debug!("creating review");

        sqlx::query(
            r#"
            INSERT INTO reviews (id, review, rating, created_at, tour_id, user_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(review.id)
        .bind(&review.review)
        .bind(review.rating)
        .bind(review.created_at)
        .bind(review.tour_id)
        .bind(review.user_id)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        tracing::debug!(review_id = %review.id, "review created successfully");
        Ok(())
    }

    #[tracing::instrument(skip(self, review), fields(review_id = %review.id))]
    async fn update(&self, review: &Review) -> Result<(), RepositoryError> {
        tracing::debug!("updating review");

        let result = sqlx::query(
            r#"
            UPDATE reviews
            SET review = $2, rating = $3
            WHERE id = $1
            "#,
        )
        .bind(review.id)
        .bind(&review.review)
        .bind(review.rating)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(review_id = %id))]
    async fn delete(&self, id: Uuid) -> Result<(), RepositoryError> {
        tracing::debug!("deleting review");

        let result = sqlx::query("DELETE FROM reviews WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(tour_id = %tour_id))]
    async fn rating_stats(&self, tour_id: Uuid) -> Result<Option<RatingStats>, RepositoryError> {
        let (quantity, average): (i64, Option<f64>) = sqlx::query_as(
            r#"
            SELECT COUNT(*), AVG(rating)
            FROM reviews
            WHERE tour_id = $1
            "#,
        )
        .bind(tour_id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(match average {
            Some(average) if quantity > 0 => Some(RatingStats { quantity, average }),
            _ => None,
        })
    }

    #[tracing::instrument(skip(self), fields(user_id = %user_id))]
    async fn tours_reviewed_by(&self, user_id: Uuid) -> Result<Vec<Uuid>, RepositoryError> {
        let tour_ids: Vec<Uuid> = sqlx::query_scalar("SELECT DISTINCT tour_id FROM reviews WHERE user_id = $1")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)?;

        tracing::debug!(%user_id, count = tour_ids.len(), "found reviewed tours");
        Ok(tour_ids)
    }
}

pub struct PostgresBookingRepository {
    pool: PgPool,
}

impl PostgresBookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl BookingRepository for PostgresBookingRepository {
    #[tracing::instrument(skip(self, features))]
    async fn find(&self, features: &ApiFeatures) -> Result<Vec<Booking>, RepositoryError> {
        tracing::debug!("finding bookings");

        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE TRUE"));
        features.push_onto(&mut qb);

        let bookings = qb
            .build_query_as::<Booking>()
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)?;

        Ok(bookings)
    }

    #[tracing::instrument(skip(self), fields(booking_id = %id))]
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Booking>, RepositoryError> {
        let query = format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1");
        let booking = sqlx::query_as::<_, Booking>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)?;

        Ok(booking)
    }

    #[tracing::instrument(skip(self, booking), fields(booking_id = %booking.id))]
    async fn create(&self, booking: &Booking) -> Result<(), RepositoryError> {
        tracing::debug!("creating booking");

        sqlx::query(
            r#"
            INSERT INTO bookings (id, tour_id, user_id, price, paid, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(booking.id)
        .bind(booking.tour_id)
        .bind(booking.user_id)
        .bind(booking.price)
        .bind(booking.paid)
        .bind(booking.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(())
    }

    #[tracing::instrument(skip(self, booking), fields(booking_id = %booking.id))]
    async fn update(&self, booking: &Booking) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET price = $2, paid = $3
            WHERE id = $1
            "#,
        )
        .bind(booking.id)
        .bind(booking.price)
        .bind(booking.paid)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(booking_id = %id))]
    async fn delete(&self, id: Uuid) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM bookings WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}
