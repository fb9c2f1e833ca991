use uuid::Uuid;
use validator::Validate;

use crate::domain::review::{NewReview, RatingSummary, Review, ReviewPatch, ReviewView, REVIEW_COLLECTION};
use crate::domain::tour::Visibility;
use crate::repository::errors::RepositoryError;
use crate::usecase::api_features::{ApiFeatures, Listing, QueryParams};
use crate::usecase::contracts::{ReviewRepository, TourRepository};
use crate::usecase::error::{document_error, UsecaseError};

pub struct ReviewsUseCase<R, T>
where
    R: ReviewRepository,
    T: TourRepository,
{
    review_repository: R,
    tour_repository: T,
}

impl<R, T> ReviewsUseCase<R, T>
where
    R: ReviewRepository,
    T: TourRepository,
{
    pub fn new(review_repository: R, tour_repository: T) -> Self {
        Self {
            review_repository,
            tour_repository,
        }
    }

    /// Lists reviews, restricted to one tour when `tour_id` is given.
    #[tracing::instrument(skip(self))]
    pub async fn list_reviews(
        &self,
        mut params: QueryParams,
        tour_id: Option<Uuid>,
    ) -> Result<Listing<ReviewView>, UsecaseError> {
        tracing::debug!("listing reviews");

        if let Some(tour_id) = tour_id {
            params.insert("tour".to_string(), tour_id.to_string());
        }
        let features = ApiFeatures::from_params(&REVIEW_COLLECTION, params)?;
        let reviews = self.review_repository.find(&features).await?;

        tracing::debug!(count = reviews.len(), "reviews listed");
        Ok(Listing::new(reviews, features.projection().clone()).map(ReviewView::from))
    }

    #[tracing::instrument(skip(self), fields(review_id = %id))]
    pub async fn get_review(&self, id: Uuid) -> Result<ReviewView, UsecaseError> {
        tracing::debug!("getting review");

        let review = self
            .review_repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| UsecaseError::no_document(id))?;

        Ok(review.into())
    }

    /// The tour comes from the path when nested under a tour, otherwise from
    /// the body. The author defaults to the authenticated user.
    #[tracing::instrument(skip(self, input))]
    pub async fn create_review(
        &self,
        input: NewReview,
        path_tour: Option<Uuid>,
        actor: Option<Uuid>,
    ) -> Result<ReviewView, UsecaseError> {
        tracing::debug!("creating review");

        let input = input.normalized();
        input.validate()?;

        let tour_id = path_tour
            .or(input.tour)
            .ok_or_else(|| UsecaseError::BadRequest("Review must belong to a tour.".to_string()))?;
        let user_id = input
            .user
            .or(actor)
            .ok_or_else(|| UsecaseError::BadRequest("Review must belong to a user.".to_string()))?;

        self.tour_repository
            .find_by_id(tour_id, Visibility::PublicOnly)
            .await?
            .ok_or_else(|| UsecaseError::no_document(tour_id))?;

        let review = Review::new(tour_id, user_id, input.review, input.rating);
        self.review_repository.create(&review).await?;
        metrics::counter!("documents_created_total", "collection" => "reviews").increment(1);
        tracing::info!(review_id = %review.id, %tour_id, %user_id, "review created");

        self.refresh_tour_ratings(tour_id).await?;
        self.get_review(review.id).await
    }

    #[tracing::instrument(skip(self, patch), fields(review_id = %id))]
    pub async fn update_review(&self, id: Uuid, patch: ReviewPatch) -> Result<ReviewView, UsecaseError> {
        tracing::debug!("updating review");

        let patch = patch.normalized();
        patch.validate()?;

        let mut review = self
            .review_repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| UsecaseError::no_document(id))?
            .review;

        review.update(patch.review, patch.rating);
        self.review_repository.update(&review).await.map_err(document_error(id))?;

        self.refresh_tour_ratings(review.tour_id).await?;
        self.get_review(id).await
    }

    #[tracing::instrument(skip(self), fields(review_id = %id))]
    pub async fn delete_review(&self, id: Uuid) -> Result<(), UsecaseError> {
        tracing::debug!("deleting review");

        let review = self
            .review_repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| UsecaseError::no_document(id))?
            .review;

        self.review_repository.delete(id).await.map_err(document_error(id))?;
        self.refresh_tour_ratings(review.tour_id).await?;

        tracing::info!(review_id = %id, "review deleted");
        Ok(())
    }

    /// Recomputes the tour's review count and average after a review write.
    pub async fn refresh_tour_ratings(&self, tour_id: Uuid) -> Result<RatingSummary, UsecaseError> {
        recalculate_ratings(&self.review_repository, &self.tour_repository, tour_id).await
    }
}

/// Writes the current review count and mean onto the tour. Runs outside the
/// review write's transaction, so a crash in between leaves a stale aggregate
/// until the next review write on that tour.
#[tracing::instrument(skip(review_repository, tour_repository))]
pub async fn recalculate_ratings<R, T>(
    review_repository: &R,
    tour_repository: &T,
    tour_id: Uuid,
) -> Result<RatingSummary, UsecaseError>
where
    R: ReviewRepository,
    T: TourRepository,
{
    let stats = review_repository.rating_stats(tour_id).await?;
    let summary = RatingSummary::from_stats(stats);

    match tour_repository
        .update_ratings(tour_id, summary.quantity, summary.average)
        .await
    {
        Ok(()) => {}
        Err(RepositoryError::NotFound) => {
            tracing::warn!(%tour_id, "tour vanished before its ratings were refreshed");
        }
        Err(e) => return Err(e.into()),
    }

    metrics::counter!("tour_rating_recalculations_total").increment(1);
    tracing::debug!(
        %tour_id,
        quantity = summary.quantity,
        average = summary.average,
        "tour ratings refreshed"
    );
    Ok(summary)
}
