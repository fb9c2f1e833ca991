use std::future::Future;

use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

use crate::repository::postgres::{
    PostgresBookingRepository, PostgresReviewRepository, PostgresTourRepository, PostgresUserRepository,
};
use crate::usecase::api_features::{Listing, QueryParams};
use crate::usecase::bookings::BookingsUseCase;
use crate::usecase::error::UsecaseError;
use crate::usecase::reports::ReportsUseCase;
use crate::usecase::reviews::ReviewsUseCase;
use crate::usecase::tours::ToursUseCase;
use crate::usecase::users::UsersUseCase;

pub type Tours = ToursUseCase<PostgresTourRepository, PostgresUserRepository, PostgresReviewRepository>;
pub type Users = UsersUseCase<PostgresUserRepository, PostgresReviewRepository, PostgresTourRepository>;
pub type Reviews = ReviewsUseCase<PostgresReviewRepository, PostgresTourRepository>;
pub type Bookings = BookingsUseCase<PostgresBookingRepository, PostgresTourRepository>;
pub type Reports = ReportsUseCase<PostgresTourRepository, PostgresUserRepository>;

/// A collection served by the generic CRUD router. `SINGULAR` and `PLURAL`
/// are the keys used inside the response `data` object.
pub trait ResourceUseCase: Send + Sync + 'static {
    type Document: Serialize + Send;
    type Create: DeserializeOwned + Send;
    type Update: DeserializeOwned + Send;

    const SINGULAR: &'static str;
    const PLURAL: &'static str;

    fn list(
        &self,
        params: QueryParams,
    ) -> impl Future<Output = Result<Listing<Self::Document>, UsecaseError>> + Send;

    fn get(&self, id: Uuid) -> impl Future<Output = Result<Self::Document, UsecaseError>> + Send;

    /// `actor` is the authenticated user, if any.
    fn create(
        &self,
        input: Self::Create,
        actor: Option<Uuid>,
    ) -> impl Future<Output = Result<Self::Document, UsecaseError>> + Send;

    fn update(
        &self,
        id: Uuid,
        input: Self::Update,
    ) -> impl Future<Output = Result<Self::Document, UsecaseError>> + Send;

    fn delete(&self, id: Uuid) -> impl Future<Output = Result<(), UsecaseError>> + Send;
}
