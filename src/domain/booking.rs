use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::domain::schema::{Collection, Field, FieldKind};

pub static BOOKING_COLLECTION: Collection = Collection {
    name: "bookings",
    id_column: "id",
    default_sort: "createdAt",
    fields: &[
        Field::new("id", "id", FieldKind::Uuid),
        Field::new("tour", "tour_id", FieldKind::Uuid),
        Field::new("user", "user_id", FieldKind::Uuid),
        Field::new("price", "price", FieldKind::Float),
        Field::new("paid", "paid", FieldKind::Boolean),
        Field::new("createdAt", "created_at", FieldKind::Timestamp),
    ],
};

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Booking {
    pub id: Uuid,
    pub tour_id: Uuid,
    pub user_id: Uuid,
    pub price: f64,
    pub paid: bool,
    pub created_at: DateTime<Utc>,
}

impl Booking {
    pub fn new(tour_id: Uuid, user_id: Uuid, price: f64, paid: Option<bool>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tour_id,
            user_id,
            price,
            paid: paid.unwrap_or(true),
            created_at: Utc::now(),
        }
    }

    pub fn apply(&mut self, patch: BookingPatch) {
        if let Some(v) = patch.price {
            self.price = v;
        }
        if let Some(v) = patch.paid {
            self.paid = v;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingView {
    pub id: Uuid,
    pub tour: Uuid,
    pub user: Uuid,
    pub price: f64,
    pub paid: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Booking> for BookingView {
    fn from(b: Booking) -> Self {
        Self {
            id: b.id,
            tour: b.tour_id,
            user: b.user_id,
            price: b.price,
            paid: b.paid,
            created_at: b.created_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewBooking {
    pub tour: Uuid,
    /// Falls back to the authenticated user.
    pub user: Option<Uuid>,
    #[validate(range(min = 0.0, message = "Booking must have a price"))]
    pub price: f64,
    pub paid: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BookingPatch {
    #[validate(range(min = 0.0, message = "Booking must have a price"))]
    pub price: Option<f64>,
    pub paid: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_booking_is_paid_by_default() {
        let booking = Booking::new(Uuid::new_v4(), Uuid::new_v4(), 497.0, None);
        assert!(booking.paid);

        let unpaid = Booking::new(Uuid::new_v4(), Uuid::new_v4(), 497.0, Some(false));
        assert!(!unpaid.paid);
    }

    #[test]
    fn test_negative_price_is_rejected() {
        let input = NewBooking {
            tour: Uuid::new_v4(),
            user: None,
            price: -1.0,
            paid: None,
        };
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_patch_keeps_references() {
        let mut booking = Booking::new(Uuid::new_v4(), Uuid::new_v4(), 497.0, None);
        let tour_id = booking.tour_id;

        booking.apply(BookingPatch {
            paid: Some(false),
            ..Default::default()
        });

        assert!(!booking.paid);
        assert_eq!(booking.price, 497.0);
        assert_eq!(booking.tour_id, tour_id);
    }

    #[test]
    fn test_view_uses_reference_names() {
        let booking = Booking::new(Uuid::new_v4(), Uuid::new_v4(), 497.0, None);
        let json = serde_json::to_value(BookingView::from(booking.clone())).unwrap();

        assert_eq!(json["tour"], serde_json::json!(booking.tour_id));
        assert_eq!(json["user"], serde_json::json!(booking.user_id));
        assert!(json.get("createdAt").is_some());
    }
}
