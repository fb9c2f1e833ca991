use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::encode::IsNull;
use sqlx::error::BoxDynError;
use sqlx::postgres::{PgArgumentBuffer, PgTypeInfo, PgValueRef};
use sqlx::types::Json;
use sqlx::Postgres;
use thiserror::Error;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::domain::geo::GeoPoint;
use crate::domain::review::ReviewView;
use crate::domain::schema::{Collection, Field, FieldKind};
use crate::domain::user::GuideView;

pub const DEFAULT_RATINGS_AVERAGE: f64 = 4.5;

pub static TOUR_COLLECTION: Collection = Collection {
    name: "tours",
    id_column: "id",
    default_sort: "createdAt",
    fields: &[
        Field::new("id", "id", FieldKind::Uuid),
        Field::new("name", "name", FieldKind::Text),
        Field::new("slug", "slug", FieldKind::Text),
        Field::new("duration", "duration", FieldKind::Integer),
        Field::new("maxGroupSize", "max_group_size", FieldKind::Integer),
        Field::new("difficulty", "difficulty", FieldKind::Text),
        Field::new("ratingsAverage", "ratings_average", FieldKind::Float),
        Field::new("ratingsQuantity", "ratings_quantity", FieldKind::Integer),
        Field::new("price", "price", FieldKind::Float),
        Field::new("priceDiscount", "price_discount", FieldKind::Float),
        Field::new("summary", "summary", FieldKind::Text),
        Field::new("createdAt", "created_at", FieldKind::Timestamp),
        Field::new("secretTour", "secret_tour", FieldKind::Boolean),
    ],
};

/// Whether hidden (`secretTour`) tours take part in a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    PublicOnly,
    All,
}

#[derive(Debug, Error)]
#[error("Difficulty is either: easy, medium or difficult")]
pub struct UnknownDifficulty;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Difficult,
}

impl Difficulty {
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Difficult => "difficult",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = UnknownDifficulty;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "difficult" => Ok(Difficulty::Difficult),
            _ => Err(UnknownDifficulty),
        }
    }
}

// Stored as plain TEXT guarded by a CHECK constraint.
impl sqlx::Type<Postgres> for Difficulty {
    fn type_info() -> PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        <String as sqlx::Type<Postgres>>::compatible(ty)
    }
}

impl<'r> sqlx::Decode<'r, Postgres> for Difficulty {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        let raw = <&str as sqlx::Decode<Postgres>>::decode(value)?;
        Ok(raw.parse()?)
    }
}

impl sqlx::Encode<'_, Postgres> for Difficulty {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> Result<IsNull, BoxDynError> {
        <&str as sqlx::Encode<Postgres>>::encode(self.as_str(), buf)
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Tour {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub duration: i32,
    pub max_group_size: i32,
    pub difficulty: Difficulty,
    pub ratings_average: f64,
    pub ratings_quantity: i32,
    pub price: f64,
    pub price_discount: Option<f64>,
    pub summary: String,
    pub description: Option<String>,
    pub image_cover: String,
    pub images: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub start_dates: Vec<DateTime<Utc>>,
    pub secret_tour: bool,
    pub start_location: Option<Json<GeoPoint>>,
    #[sqlx(json)]
    pub locations: Vec<GeoPoint>,
    pub guides: Vec<Uuid>,
}

impl Tour {
    /// Builds a tour from validated input. Derives the slug and applies the
    /// rating defaults.
    pub fn new(input: NewTour) -> Result<Self, UnknownDifficulty> {
        let difficulty = input.difficulty.parse()?;
        Ok(Self {
            id: Uuid::new_v4(),
            slug: slugify(&input.name),
            name: input.name,
            duration: input.duration,
            max_group_size: input.max_group_size,
            difficulty,
            ratings_average: input.ratings_average.unwrap_or(DEFAULT_RATINGS_AVERAGE),
            ratings_quantity: input.ratings_quantity.unwrap_or(0),
            price: input.price,
            price_discount: input.price_discount,
            summary: input.summary,
            description: input.description,
            image_cover: input.image_cover,
            images: input.images,
            created_at: Utc::now(),
            start_dates: input.start_dates,
            secret_tour: input.secret_tour.unwrap_or(false),
            start_location: input.start_location.map(Json),
            locations: input.locations,
            guides: input.guides,
        })
    }

    /// Merges a partial update. The slug follows the name.
    pub fn apply(&mut self, patch: TourPatch) -> Result<(), UnknownDifficulty> {
        if let Some(d) = patch.difficulty {
            self.difficulty = d.parse()?;
        }
        if let Some(n) = patch.name {
            self.slug = slugify(&n);
            self.name = n;
        }
        if let Some(v) = patch.duration {
            self.duration = v;
        }
        if let Some(v) = patch.max_group_size {
            self.max_group_size = v;
        }
        if let Some(v) = patch.ratings_average {
            self.ratings_average = v;
        }
        if let Some(v) = patch.ratings_quantity {
            self.ratings_quantity = v;
        }
        if let Some(v) = patch.price {
            self.price = v;
        }
        if let Some(v) = patch.price_discount {
            self.price_discount = v;
        }
        if let Some(v) = patch.summary {
            self.summary = v;
        }
        if let Some(v) = patch.description {
            self.description = Some(v);
        }
        if let Some(v) = patch.image_cover {
            self.image_cover = v;
        }
        if let Some(v) = patch.images {
            self.images = v;
        }
        if let Some(v) = patch.start_dates {
            self.start_dates = v;
        }
        if let Some(v) = patch.secret_tour {
            self.secret_tour = v;
        }
        if let Some(v) = patch.start_location {
            self.start_location = Some(Json(v));
        }
        if let Some(v) = patch.locations {
            self.locations = v;
        }
        if let Some(v) = patch.guides {
            self.guides = v;
        }
        Ok(())
    }

    pub fn duration_weeks(&self) -> f64 {
        f64::from(self.duration) / 7.0
    }

    /// Cross-field rules that must hold for the whole document.
    pub fn check_consistency(&self) -> Result<(), String> {
        if let Some(discount) = self.price_discount {
            if discount >= self.price {
                return Err(format!(
                    "Discount price ({discount}) should be below regular price"
                ));
            }
        }
        if let Some(location) = &self.start_location {
            location
                .lat_lng()
                .map_err(|_| "Start location has invalid coordinates".to_string())?;
        }
        if self.locations.iter().any(|l| l.lat_lng().is_err()) {
            return Err("Tour locations have invalid coordinates".to_string());
        }
        Ok(())
    }
}

/// Lowercase, hyphen-separated form of a tour name for URLs.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_hyphen = false;
    for c in text.trim().to_lowercase().chars() {
        if c.is_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c);
        } else {
            pending_hyphen = true;
        }
    }
    slug
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TourView {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub duration: i32,
    pub duration_weeks: f64,
    pub max_group_size: i32,
    pub difficulty: Difficulty,
    pub ratings_average: f64,
    pub ratings_quantity: i32,
    pub price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_discount: Option<f64>,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub image_cover: String,
    pub images: Vec<String>,
    pub start_dates: Vec<DateTime<Utc>>,
    pub secret_tour: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_location: Option<GeoPoint>,
    pub locations: Vec<GeoPoint>,
    pub guides: Vec<GuideView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviews: Option<Vec<ReviewView>>,
}

impl TourView {
    pub fn new(tour: Tour, guides: Vec<GuideView>) -> Self {
        Self {
            duration_weeks: tour.duration_weeks(),
            id: tour.id,
            name: tour.name,
            slug: tour.slug,
            duration: tour.duration,
            max_group_size: tour.max_group_size,
            difficulty: tour.difficulty,
            ratings_average: tour.ratings_average,
            ratings_quantity: tour.ratings_quantity,
            price: tour.price,
            price_discount: tour.price_discount,
            summary: tour.summary,
            description: tour.description,
            image_cover: tour.image_cover,
            images: tour.images,
            start_dates: tour.start_dates,
            secret_tour: tour.secret_tour,
            start_location: tour.start_location.map(|j| j.0),
            locations: tour.locations,
            guides,
            reviews: None,
        }
    }

    pub fn with_reviews(mut self, reviews: Vec<ReviewView>) -> Self {
        self.reviews = Some(reviews);
        self
    }
}

fn validate_difficulty(value: &str) -> Result<(), ValidationError> {
    value
        .parse::<Difficulty>()
        .map(|_| ())
        .map_err(|e| ValidationError::new("difficulty").with_message(e.to_string().into()))
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewTour {
    #[validate(length(min = 10, max = 40, message = "A tour name must have between 10 and 40 characters"))]
    pub name: String,
    #[validate(range(min = 1, message = "A tour must have a duration"))]
    pub duration: i32,
    #[validate(range(min = 1, message = "A tour must have a maxGroupSize"))]
    pub max_group_size: i32,
    #[validate(custom(function = "validate_difficulty"))]
    pub difficulty: String,
    #[validate(range(min = 1.0, max = 5.0, message = "Rating must be between 1.0 and 5.0"))]
    pub ratings_average: Option<f64>,
    #[validate(range(min = 0, message = "Ratings quantity cannot be negative"))]
    pub ratings_quantity: Option<i32>,
    #[validate(range(min = 0.0, message = "A tour price cannot be negative"))]
    pub price: f64,
    pub price_discount: Option<f64>,
    #[validate(length(min = 1, message = "A tour must have a summary"))]
    pub summary: String,
    pub description: Option<String>,
    #[validate(length(min = 1, message = "A tour must have a imageCover"))]
    pub image_cover: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub start_dates: Vec<DateTime<Utc>>,
    pub secret_tour: Option<bool>,
    pub start_location: Option<GeoPoint>,
    #[serde(default)]
    pub locations: Vec<GeoPoint>,
    #[serde(default)]
    pub guides: Vec<Uuid>,
}

impl NewTour {
    pub fn normalized(mut self) -> Self {
        self.name = self.name.trim().to_string();
        self.summary = self.summary.trim().to_string();
        self.description = self.description.map(|d| d.trim().to_string());
        self
    }
}

/// `Some(None)` for an explicit `null`, `None` when the field is absent.
fn nullable<'de, D>(deserializer: D) -> Result<Option<Option<f64>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<f64>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TourPatch {
    #[validate(length(min = 10, max = 40, message = "A tour name must have between 10 and 40 characters"))]
    pub name: Option<String>,
    #[validate(range(min = 1, message = "A tour must have a duration"))]
    pub duration: Option<i32>,
    #[validate(range(min = 1, message = "A tour must have a maxGroupSize"))]
    pub max_group_size: Option<i32>,
    #[validate(custom(function = "validate_difficulty"))]
    pub difficulty: Option<String>,
    #[validate(range(min = 1.0, max = 5.0, message = "Rating must be between 1.0 and 5.0"))]
    pub ratings_average: Option<f64>,
    #[validate(range(min = 0, message = "Ratings quantity cannot be negative"))]
    pub ratings_quantity: Option<i32>,
    #[validate(range(min = 0.0, message = "A tour price cannot be negative"))]
    pub price: Option<f64>,
    #[serde(default, deserialize_with = "nullable")]
    pub price_discount: Option<Option<f64>>,
    #[validate(length(min = 1, message = "A tour must have a summary"))]
    pub summary: Option<String>,
    pub description: Option<String>,
    #[validate(length(min = 1, message = "A tour must have a imageCover"))]
    pub image_cover: Option<String>,
    pub images: Option<Vec<String>>,
    pub start_dates: Option<Vec<DateTime<Utc>>>,
    pub secret_tour: Option<bool>,
    pub start_location: Option<GeoPoint>,
    pub locations: Option<Vec<GeoPoint>>,
    pub guides: Option<Vec<Uuid>>,
}

impl TourPatch {
    pub fn normalized(mut self) -> Self {
        self.name = self.name.map(|n| n.trim().to_string());
        self.summary = self.summary.map(|s| s.trim().to_string());
        self.description = self.description.map(|d| d.trim().to_string());
        self
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_input(name: &str) -> NewTour {
        NewTour {
            name: name.to_string(),
            duration: 5,
            max_group_size: 25,
            difficulty: "easy".to_string(),
            ratings_average: None,
            ratings_quantity: None,
            price: 397.0,
            price_discount: None,
            summary: "Breathtaking hike through the Canadian Banff National Park".to_string(),
            description: None,
            image_cover: "tour-1-cover.jpg".to_string(),
            images: vec![],
            start_dates: vec![],
            secret_tour: None,
            start_location: None,
            locations: vec![],
            guides: vec![],
        }
    }

    pub(crate) fn sample_tour(name: &str) -> Tour {
        Tour::new(sample_input(name)).unwrap()
    }

    #[test]
    fn test_tour_creation_defaults() {
        let tour = sample_tour("The Forest Hiker");

        assert_eq!(tour.slug, "the-forest-hiker");
        assert_eq!(tour.ratings_average, DEFAULT_RATINGS_AVERAGE);
        assert_eq!(tour.ratings_quantity, 0);
        assert!(!tour.secret_tour);
        assert_eq!(tour.difficulty, Difficulty::Easy);
    }

    #[test]
    fn test_duration_weeks() {
        let mut tour = sample_tour("The Forest Hiker");
        tour.duration = 14;
        assert_eq!(tour.duration_weeks(), 2.0);

        tour.duration = 5;
        assert!((tour.duration_weeks() - 0.714285).abs() < 1e-5);
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("The Sea Explorer"), "the-sea-explorer");
        assert_eq!(slugify("  The   Snow Adventurer! "), "the-snow-adventurer");
        assert_eq!(slugify("Über Alpen-Tour 2"), "über-alpen-tour-2");
        assert_eq!(slugify("---"), "");
    }

    #[test]
    fn test_name_length_validation() {
        let too_short = sample_input("Short").normalized();
        assert!(too_short.validate().is_err());

        let too_long = sample_input(&"x".repeat(41)).normalized();
        assert!(too_long.validate().is_err());

        let padded = sample_input("   The Park Camper   ").normalized();
        assert_eq!(padded.name, "The Park Camper");
        assert!(padded.validate().is_ok());
    }

    #[test]
    fn test_difficulty_validation() {
        let mut input = sample_input("The Forest Hiker");
        input.difficulty = "extreme".to_string();

        let errors = input.validate().unwrap_err();
        let message = errors
            .field_errors()
            .values()
            .flat_map(|errs| errs.iter())
            .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
            .collect::<Vec<_>>()
            .join(". ");
        assert_eq!(message, "Difficulty is either: easy, medium or difficult");
    }

    #[test]
    fn test_price_discount_must_be_below_price() {
        let mut tour = sample_tour("The Forest Hiker");
        tour.price_discount = Some(400.0);
        assert!(tour.check_consistency().is_err());

        tour.price_discount = Some(100.0);
        assert!(tour.check_consistency().is_ok());
    }

    #[test]
    fn test_patch_checks_discount_against_merged_price() {
        let mut tour = sample_tour("The Forest Hiker");
        tour.price_discount = Some(300.0);

        tour.apply(TourPatch {
            price: Some(250.0),
            ..Default::default()
        })
        .unwrap();

        assert!(tour.check_consistency().is_err());
    }

    #[test]
    fn test_patch_rederives_slug() {
        let mut tour = sample_tour("The Forest Hiker");
        tour.apply(TourPatch {
            name: Some("The City Wanderer".to_string()),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(tour.name, "The City Wanderer");
        assert_eq!(tour.slug, "the-city-wanderer");
    }

    #[test]
    fn test_view_serializes_computed_fields() {
        let tour = sample_tour("The Forest Hiker");
        let json = serde_json::to_value(TourView::new(tour, vec![])).unwrap();

        assert_eq!(json["durationWeeks"], serde_json::json!(5.0 / 7.0));
        assert_eq!(json["difficulty"], "easy");
        assert_eq!(json["ratingsAverage"], 4.5);
        assert!(json.get("priceDiscount").is_none());
        assert!(json.get("reviews").is_none());
        assert!(json.get("createdAt").is_none());
    }

    #[test]
    fn test_patch_null_clears_discount() {
        let mut tour = sample_tour("The Forest Hiker");
        tour.price_discount = Some(300.0);

        let untouched: TourPatch = serde_json::from_str(r#"{"price": 450}"#).unwrap();
        assert_eq!(untouched.price_discount, None);
        tour.apply(untouched).unwrap();
        assert_eq!(tour.price_discount, Some(300.0));

        let cleared: TourPatch = serde_json::from_str(r#"{"priceDiscount": null}"#).unwrap();
        assert_eq!(cleared.price_discount, Some(None));
        tour.apply(cleared).unwrap();
        assert_eq!(tour.price_discount, None);

        let set: TourPatch = serde_json::from_str(r#"{"priceDiscount": 99.5}"#).unwrap();
        tour.apply(set).unwrap();
        assert_eq!(tour.price_discount, Some(99.5));
    }

    #[test]
    fn test_difficulty_round_trip_strings() {
        for d in [Difficulty::Easy, Difficulty::Medium, Difficulty::Difficult] {
            assert_eq!(d.as_str().parse::<Difficulty>().unwrap(), d);
        }
        assert!("EASY".parse::<Difficulty>().is_err());
    }
}
