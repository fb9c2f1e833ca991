use uuid::Uuid;
use validator::Validate;

use crate::domain::booking::{Booking, BookingPatch, BookingView, NewBooking, BOOKING_COLLECTION};
use crate::domain::tour::Visibility;
use crate::usecase::api_features::{ApiFeatures, Listing, QueryParams};
use crate::usecase::contracts::{BookingRepository, TourRepository};
use crate::usecase::error::{document_error, UsecaseError};

pub struct BookingsUseCase<B, T>
where
    B: BookingRepository,
    T: TourRepository,
{
    booking_repository: B,
    tour_repository: T,
}

impl<B, T> BookingsUseCase<B, T>
where
    B: BookingRepository,
    T: TourRepository,
{
    pub fn new(booking_repository: B, tour_repository: T) -> Self {
        Self {
            booking_repository,
            tour_repository,
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_bookings(&self, params: QueryParams) -> Result<Listing<BookingView>, UsecaseError> {
        tracing::debug!("listing bookings");

        let features = ApiFeatures::from_params(&BOOKING_COLLECTION, params)?;
        let bookings = self.booking_repository.find(&features).await?;

        Ok(Listing::new(bookings, features.projection().clone()).map(BookingView::from))
    }

    #[tracing::instrument(skip(self), fields(booking_id = %id))]
    pub async fn get_booking(&self, id: Uuid) -> Result<BookingView, UsecaseError> {
        let booking = self
            .booking_repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| UsecaseError::no_document(id))?;

        Ok(booking.into())
    }

    #[tracing::instrument(skip(self, input), fields(tour_id = %input.tour))]
    pub async fn create_booking(
        &self,
        input: NewBooking,
        actor: Option<Uuid>,
    ) -> Result<BookingView, UsecaseError> {
        tracing::debug!("creating booking");

        input.validate()?;
        let user_id = input
            .user
            .or(actor)
            .ok_or_else(|| UsecaseError::BadRequest("Booking must belong to a user!".to_string()))?;

        self.tour_repository
            .find_by_id(input.tour, Visibility::PublicOnly)
            .await?
            .ok_or_else(|| UsecaseError::no_document(input.tour))?;

        let booking = Booking::new(input.tour, user_id, input.price, input.paid);
        self.booking_repository.create(&booking).await?;

        metrics::counter!("documents_created_total", "collection" => "bookings").increment(1);
        tracing::info!(booking_id = %booking.id, %user_id, "booking created");
        Ok(booking.into())
    }

    #[tracing::instrument(skip(self, patch), fields(booking_id = %id))]
    pub async fn update_booking(&self, id: Uuid, patch: BookingPatch) -> Result<BookingView, UsecaseError> {
        patch.validate()?;

        let mut booking = self
            .booking_repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| UsecaseError::no_document(id))?;

        booking.apply(patch);
        self.booking_repository.update(&booking).await.map_err(document_error(id))?;

        tracing::debug!(booking_id = %id, "booking updated");
        Ok(booking.into())
    }

    #[tracing::instrument(skip(self), fields(booking_id = %id))]
    pub async fn delete_booking(&self, id: Uuid) -> Result<(), UsecaseError> {
        self.booking_repository.delete(id).await.map_err(document_error(id))?;

        tracing::info!(booking_id = %id, "booking deleted");
        Ok(())
    }
}
