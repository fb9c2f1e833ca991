use std::collections::HashMap;

use uuid::Uuid;
use validator::Validate;

use crate::domain::review::ReviewView;
use crate::domain::tour::{NewTour, Tour, TourPatch, TourView, Visibility, TOUR_COLLECTION};
use crate::domain::user::GuideView;
use crate::usecase::api_features::{ApiFeatures, Listing, QueryParams};
use crate::usecase::contracts::{ReviewRepository, TourRepository, UserRepository};
use crate::usecase::error::{document_error, UsecaseError};

const TOP_CHEAP_PRESET: [(&str, &str); 3] = [
    ("limit", "5"),
    ("sort", "-ratingsAverage,price"),
    ("fields", "name,price,ratingsAverage,summary,difficulty"),
];

/// Query preset behind `/tours/top-5-cheap`.
pub fn top_cheap_params(mut params: QueryParams) -> QueryParams {
    for (key, value) in TOP_CHEAP_PRESET {
        params.insert(key.to_string(), value.to_string());
    }
    params
}

/// Replaces guide ids with the guides' public fields. All tours share a
/// single user lookup.
pub async fn populate_guides<U: UserRepository>(
    users: &U,
    tours: Vec<Tour>,
) -> Result<Vec<TourView>, UsecaseError> {
    let mut ids: Vec<Uuid> = tours.iter().flat_map(|t| t.guides.iter().copied()).collect();
    ids.sort();
    ids.dedup();

    let guides: HashMap<Uuid, GuideView> = if ids.is_empty() {
        HashMap::new()
    } else {
        users
            .find_by_ids(&ids)
            .await?
            .iter()
            .map(|u| (u.id, GuideView::from(u)))
            .collect()
    };

    Ok(tours
        .into_iter()
        .map(|tour| {
            let tour_guides = tour
                .guides
                .iter()
                .filter_map(|id| guides.get(id).cloned())
                .collect();
            TourView::new(tour, tour_guides)
        })
        .collect())
}

fn consistency_error(message: String) -> UsecaseError {
    UsecaseError::Validation(format!("Invalid input data. {message}"))
}

pub struct ToursUseCase<T, U, R>
where
    T: TourRepository,
    U: UserRepository,
    R: ReviewRepository,
{
    tour_repository: T,
    user_repository: U,
    review_repository: R,
}

impl<T, U, R> ToursUseCase<T, U, R>
where
    T: TourRepository,
    U: UserRepository,
    R: ReviewRepository,
{
    pub fn new(tour_repository: T, user_repository: U, review_repository: R) -> Self {
        Self {
            tour_repository,
            user_repository,
            review_repository,
        }
    }

    async fn single_view(&self, tour: Tour) -> Result<TourView, UsecaseError> {
        populate_guides(&self.user_repository, vec![tour])
            .await?
            .pop()
            .ok_or_else(|| UsecaseError::Internal("tour lost while populating guides".to_string()))
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_tours(&self, params: QueryParams) -> Result<Listing<TourView>, UsecaseError> {
        tracing::debug!("listing tours");

        let features = ApiFeatures::from_params(&TOUR_COLLECTION, params)?;
        let tours = self.tour_repository.find(&features, Visibility::PublicOnly).await?;
        let views = populate_guides(&self.user_repository, tours).await?;

        tracing::debug!(count = views.len(), "tours listed");
        Ok(Listing::new(views, features.projection().clone()))
    }

    #[tracing::instrument(skip(self), fields(tour_id = %id))]
    pub async fn get_tour(&self, id: Uuid) -> Result<TourView, UsecaseError> {
        tracing::debug!("getting tour");

        let tour = self
            .tour_repository
            .find_by_id(id, Visibility::PublicOnly)
            .await?
            .ok_or_else(|| UsecaseError::no_document(id))?;

        let reviews: Vec<ReviewView> = self
            .review_repository
            .find_by_tour(id)
            .await?
            .into_iter()
            .map(ReviewView::from)
            .collect();

        Ok(self.single_view(tour).await?.with_reviews(reviews))
    }

    #[tracing::instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_tour(&self, input: NewTour) -> Result<TourView, UsecaseError> {
        tracing::debug!("creating tour");

        let input = input.normalized();
        input.validate()?;

        let tour = Tour::new(input)?;
        tour.check_consistency().map_err(consistency_error)?;
        self.tour_repository.create(&tour).await?;

        metrics::counter!("documents_created_total", "collection" => "tours").increment(1);
        tracing::info!(tour_id = %tour.id, slug = %tour.slug, "tour created");
        self.single_view(tour).await
    }

    #[tracing::instrument(skip(self, patch), fields(tour_id = %id))]
    pub async fn update_tour(&self, id: Uuid, patch: TourPatch) -> Result<TourView, UsecaseError> {
        tracing::debug!("updating tour");

        let patch = patch.normalized();
        patch.validate()?;

        let mut tour = self
            .tour_repository
            .find_by_id(id, Visibility::PublicOnly)
            .await?
            .ok_or_else(|| UsecaseError::no_document(id))?;

        tour.apply(patch)?;
        tour.check_consistency().map_err(consistency_error)?;
        self.tour_repository.update(&tour).await.map_err(document_error(id))?;

        tracing::debug!(tour_id = %id, "tour updated");
        self.single_view(tour).await
    }

    #[tracing::instrument(skip(self), fields(tour_id = %id))]
    pub async fn delete_tour(&self, id: Uuid) -> Result<(), UsecaseError> {
        tracing::debug!("deleting tour");

        self.tour_repository
            .delete(id, Visibility::PublicOnly)
            .await
            .map_err(document_error(id))?;

        tracing::info!(tour_id = %id, "tour deleted");
        Ok(())
    }
}
