use uuid::Uuid;

use crate::delivery::contracts::{Bookings, ResourceUseCase};
use crate::domain::booking::{BookingPatch, BookingView, NewBooking};
use crate::usecase::api_features::{Listing, QueryParams};
use crate::usecase::error::UsecaseError;

impl ResourceUseCase for Bookings {
    type Document = BookingView;
    type Create = NewBooking;
    type Update = BookingPatch;

    const SINGULAR: &'static str = "booking";
    const PLURAL: &'static str = "bookings";

    async fn list(&self, params: QueryParams) -> Result<Listing<BookingView>, UsecaseError> {
        self.list_bookings(params).await
    }

    async fn get(&self, id: Uuid) -> Result<BookingView, UsecaseError> {
        self.get_booking(id).await
    }

    async fn create(&self, input: NewBooking, actor: Option<Uuid>) -> Result<BookingView, UsecaseError> {
        self.create_booking(input, actor).await
    }

    async fn update(&self, id: Uuid, input: BookingPatch) -> Result<BookingView, UsecaseError> {
        self.update_booking(id, input).await
    }

    async fn delete(&self, id: Uuid) -> Result<(), UsecaseError> {
        self.delete_booking(id).await
    }
}
