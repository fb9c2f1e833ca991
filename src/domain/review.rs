use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::domain::schema::{Collection, Field, FieldKind};
use crate::domain::tour::DEFAULT_RATINGS_AVERAGE;

// Review queries join the author, so columns are qualified.
pub static REVIEW_COLLECTION: Collection = Collection {
    name: "reviews",
    id_column: "r.id",
    default_sort: "createdAt",
    fields: &[
        Field::new("id", "r.id", FieldKind::Uuid),
        Field::new("review", "r.review", FieldKind::Text),
        Field::new("rating", "r.rating", FieldKind::Float),
        Field::new("createdAt", "r.created_at", FieldKind::Timestamp),
        Field::new("tour", "r.tour_id", FieldKind::Uuid),
        Field::new("user", "r.user_id", FieldKind::Uuid),
    ],
};

/// Ratings are kept to one decimal place.
pub fn round_rating(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Review {
    pub id: Uuid,
    pub review: String,
    pub rating: f64,
    pub created_at: DateTime<Utc>,
    pub tour_id: Uuid,
    pub user_id: Uuid,
}

impl Review {
    pub fn new(tour_id: Uuid, user_id: Uuid, review: String, rating: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            review,
            rating: round_rating(rating),
            created_at: Utc::now(),
            tour_id,
            user_id,
        }
    }

    pub fn update(&mut self, review: Option<String>, rating: Option<f64>) {
        if let Some(r) = review {
            self.review = r;
        }
        if let Some(r) = rating {
            self.rating = round_rating(r);
        }
    }
}

/// A review joined with the public fields of its author.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct ReviewRecord {
    #[sqlx(flatten)]
    pub review: Review,
    pub author_name: String,
    pub author_photo: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewAuthor {
    pub id: Uuid,
    pub name: String,
    pub photo: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewView {
    pub id: Uuid,
    pub review: String,
    pub rating: f64,
    pub created_at: DateTime<Utc>,
    pub tour: Uuid,
    pub user: ReviewAuthor,
}

impl From<ReviewRecord> for ReviewView {
    fn from(r: ReviewRecord) -> Self {
        Self {
            id: r.review.id,
            review: r.review.review,
            rating: r.review.rating,
            created_at: r.review.created_at,
            tour: r.review.tour_id,
            user: ReviewAuthor {
                id: r.review.user_id,
                name: r.author_name,
                photo: r.author_photo,
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewReview {
    #[validate(length(min = 1, message = "Review can not be empty!"))]
    pub review: String,
    #[validate(range(min = 1.0, max = 5.0, message = "A review must have a rating between 1.0 and 5.0"))]
    pub rating: f64,
    pub tour: Option<Uuid>,
    pub user: Option<Uuid>,
}

impl NewReview {
    /// Trims the text and rounds the rating. Runs before validation.
    pub fn normalized(mut self) -> Self {
        self.review = self.review.trim().to_string();
        self.rating = round_rating(self.rating);
        self
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReviewPatch {
    #[validate(length(min = 1, message = "Review can not be empty!"))]
    pub review: Option<String>,
    #[validate(range(min = 1.0, max = 5.0, message = "A review must have a rating between 1.0 and 5.0"))]
    pub rating: Option<f64>,
}

impl ReviewPatch {
    pub fn normalized(mut self) -> Self {
        self.review = self.review.map(|r| r.trim().to_string());
        self.rating = self.rating.map(round_rating);
        self
    }
}

/// Raw count and mean of a tour's review ratings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingStats {
    pub quantity: i64,
    pub average: f64,
}

/// Values persisted on the tour after its reviews change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingSummary {
    pub quantity: i32,
    pub average: f64,
}

impl RatingSummary {
    pub fn from_stats(stats: Option<RatingStats>) -> Self {
        match stats {
            Some(s) if s.quantity > 0 => Self {
                quantity: i32::try_from(s.quantity).unwrap_or(i32::MAX),
                average: (s.average * 100.0).round() / 100.0,
            },
            _ => Self {
                quantity: 0,
                average: DEFAULT_RATINGS_AVERAGE,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_is_rounded_to_one_decimal() {
        assert_eq!(round_rating(4.666666), 4.7);
        assert_eq!(round_rating(4.0), 4.0);
        assert_eq!(round_rating(3.25), 3.3);

        let review = Review::new(Uuid::new_v4(), Uuid::new_v4(), "Great".to_string(), 4.666);
        assert_eq!(review.rating, 4.7);
    }

    #[test]
    fn test_update_rounds_rating() {
        let mut review = Review::new(Uuid::new_v4(), Uuid::new_v4(), "Great".to_string(), 4.0);
        review.update(None, Some(2.04));

        assert_eq!(review.rating, 2.0);
        assert_eq!(review.review, "Great");
    }

    #[test]
    fn test_rating_summary_rounds_to_two_decimals() {
        let summary = RatingSummary::from_stats(Some(RatingStats {
            quantity: 3,
            average: 4.666666,
        }));

        assert_eq!(summary, RatingSummary { quantity: 3, average: 4.67 });
    }

    #[test]
    fn test_rating_summary_defaults_without_reviews() {
        let expected = RatingSummary { quantity: 0, average: 4.5 };

        assert_eq!(RatingSummary::from_stats(None), expected);
        assert_eq!(
            RatingSummary::from_stats(Some(RatingStats { quantity: 0, average: 0.0 })),
            expected
        );
    }

    #[test]
    fn test_new_review_validation() {
        let input = NewReview {
            review: "   ".to_string(),
            rating: 4.0,
            tour: None,
            user: None,
        }
        .normalized();
        assert!(input.validate().is_err());

        let input = NewReview {
            review: "Loved it".to_string(),
            rating: 5.5,
            tour: None,
            user: None,
        };
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_rating_is_rounded_before_range_check() {
        let input = NewReview {
            review: "Loved it".to_string(),
            rating: 5.04,
            tour: None,
            user: None,
        }
        .normalized();
        assert_eq!(input.rating, 5.0);
        assert!(input.validate().is_ok());

        let patch = ReviewPatch {
            rating: Some(0.96),
            ..Default::default()
        }
        .normalized();
        assert_eq!(patch.rating, Some(1.0));
        assert!(patch.validate().is_ok());

        let patch = ReviewPatch {
            rating: Some(5.06),
            ..Default::default()
        }
        .normalized();
        assert!(patch.validate().is_err());
    }

    #[test]
    fn test_view_nests_author() {
        let review = Review::new(Uuid::new_v4(), Uuid::new_v4(), "Great".to_string(), 5.0);
        let user_id = review.user_id;
        let view = ReviewView::from(ReviewRecord {
            review,
            author_name: "Lourdes Browning".to_string(),
            author_photo: "user-2.jpg".to_string(),
        });

        let json = serde_json::to_value(view).unwrap();
        assert_eq!(json["user"]["id"], serde_json::json!(user_id));
        assert_eq!(json["user"]["name"], "Lourdes Browning");
        assert!(json.get("createdAt").is_some());
    }
}
