use uuid::Uuid;
use validator::Validate;

use crate::domain::user::{NewUser, User, UserPatch, UserView, USER_COLLECTION};
use crate::usecase::api_features::{ApiFeatures, Listing, QueryParams};
use crate::usecase::contracts::{ReviewRepository, TourRepository, UserRepository};
use crate::usecase::error::{document_error, UsecaseError};
use crate::usecase::password::hash_password;
use crate::usecase::reviews::recalculate_ratings;

pub const PASSWORD_ROUTE_MESSAGE: &str = "This route is not for password updates.";

pub struct UsersUseCase<U, R, T>
where
    U: UserRepository,
    R: ReviewRepository,
    T: TourRepository,
{
    user_repository: U,
    review_repository: R,
    tour_repository: T,
}

impl<U, R, T> UsersUseCase<U, R, T>
where
    U: UserRepository,
    R: ReviewRepository,
    T: TourRepository,
{
    pub fn new(user_repository: U, review_repository: R, tour_repository: T) -> Self {
        Self {
            user_repository,
            review_repository,
            tour_repository,
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_users(&self, params: QueryParams) -> Result<Listing<UserView>, UsecaseError> {
        tracing::debug!("listing users");

        let features = ApiFeatures::from_params(&USER_COLLECTION, params)?;
        let users = self.user_repository.find(&features).await?;

        Ok(Listing::new(users, features.projection().clone()).map(UserView::from))
    }

    #[tracing::instrument(skip(self), fields(user_id = %id))]
    pub async fn get_user(&self, id: Uuid) -> Result<UserView, UsecaseError> {
        tracing::debug!("getting user");

        let user = self
            .user_repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| UsecaseError::no_document(id))?;

        Ok(user.into())
    }

    #[tracing::instrument(skip(self, input), fields(email = %input.email))]
    pub async fn create_user(&self, input: NewUser) -> Result<UserView, UsecaseError> {
        tracing::debug!("creating user");

        let input = input.normalized();
        input.validate()?;

        let password_hash =
            hash_password(&input.password).map_err(|e| UsecaseError::Internal(e.to_string()))?;
        let user = User::new(input.name, input.email, password_hash, input.photo);
        self.user_repository.create(&user).await?;

        metrics::counter!("documents_created_total", "collection" => "users").increment(1);
        tracing::info!(user_id = %user.id, "user created");
        Ok(user.into())
    }

    /// Profile fields only. Password changes belong to the auth service.
    #[tracing::instrument(skip(self, patch), fields(user_id = %id))]
    pub async fn update_user(&self, id: Uuid, patch: UserPatch) -> Result<UserView, UsecaseError> {
        tracing::debug!("updating user");

        if patch.touches_password() {
            return Err(UsecaseError::BadRequest(PASSWORD_ROUTE_MESSAGE.to_string()));
        }
        let patch = patch.normalized();
        patch.validate()?;

        let mut user = self
            .user_repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| UsecaseError::no_document(id))?;

        user.update_profile(patch.name, patch.email, patch.photo);
        self.user_repository.update(&user).await.map_err(document_error(id))?;

        tracing::debug!(user_id = %id, "user updated");
        Ok(user.into())
    }

    /// The user's reviews go with them, so every tour they reviewed gets its
    /// ratings recomputed afterwards.
    #[tracing::instrument(skip(self), fields(user_id = %id))]
    pub async fn delete_user(&self, id: Uuid) -> Result<(), UsecaseError> {
        tracing::debug!("deleting user");

        let reviewed = self.review_repository.tours_reviewed_by(id).await?;
        self.user_repository.delete(id).await.map_err(document_error(id))?;

        for tour_id in reviewed {
            recalculate_ratings(&self.review_repository, &self.tour_repository, tour_id).await?;
        }

        tracing::info!(user_id = %id, "user deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::review::RatingStats;
    use crate::repository::errors::RepositoryError;
    use crate::usecase::contracts::{MockReviewRepository, MockTourRepository, MockUserRepository};

    fn users_usecase(
        users: MockUserRepository,
    ) -> UsersUseCase<MockUserRepository, MockReviewRepository, MockTourRepository> {
        UsersUseCase::new(users, MockReviewRepository::new(), MockTourRepository::new())
    }

    fn signup(email: &str) -> NewUser {
        NewUser {
            name: "Jonas Schmedtmann".to_string(),
            email: email.to_string(),
            photo: None,
            password: "pass1234".to_string(),
            password_confirm: "pass1234".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_user_hashes_password() {
        let mut mock_repo = MockUserRepository::new();
        mock_repo
            .expect_create()
            .withf(|user| {
                user.email == "jonas@example.com"
                    && user.password_hash.starts_with("$argon2")
                    && user.photo == "default.jpg"
            })
            .times(1)
            .returning(|_| Ok(()));

        let usecase = users_usecase(mock_repo);
        let view = usecase.create_user(signup(" Jonas@Example.com ")).await.unwrap();

        assert_eq!(view.email, "jonas@example.com");
    }

    #[tokio::test]
    async fn test_create_user_with_mismatched_confirmation() {
        let mut mock_repo = MockUserRepository::new();
        mock_repo.expect_create().times(0);

        let mut input = signup("jonas@example.com");
        input.password_confirm = "pass12345".to_string();

        let usecase = users_usecase(mock_repo);
        let result = usecase.create_user(input).await;

        match result {
            Err(UsecaseError::Validation(msg)) => {
                assert_eq!(msg, "Invalid input data. Passwords are not the same!");
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_create_user_with_taken_email() {
        let mut mock_repo = MockUserRepository::new();
        mock_repo
            .expect_create()
            .returning(|_| Err(RepositoryError::Duplicate("email".to_string())));

        let usecase = users_usecase(mock_repo);
        let result = usecase.create_user(signup("jonas@example.com")).await;

        assert!(matches!(result, Err(UsecaseError::Duplicate(field)) if field == "email"));
    }

    #[tokio::test]
    async fn test_update_user_refuses_password_fields() {
        let mut mock_repo = MockUserRepository::new();
        mock_repo.expect_find_by_id().times(0);

        let usecase = users_usecase(mock_repo);
        let result = usecase
            .update_user(
                Uuid::new_v4(),
                UserPatch {
                    password: Some("newpass123".to_string()),
                    ..Default::default()
                },
            )
            .await;

        match result {
            Err(UsecaseError::BadRequest(msg)) => assert_eq!(msg, PASSWORD_ROUTE_MESSAGE),
            other => panic!("expected bad request, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_update_user_changes_profile() {
        let user = User::new(
            "Jonas".to_string(),
            "jonas@example.com".to_string(),
            "hash".to_string(),
            None,
        );
        let id = user.id;

        let mut mock_repo = MockUserRepository::new();
        mock_repo
            .expect_find_by_id()
            .returning(move |_| Ok(Some(user.clone())));
        mock_repo
            .expect_update()
            .withf(|user| user.name == "Jonas S." && user.password_hash == "hash")
            .times(1)
            .returning(|_| Ok(()));

        let usecase = users_usecase(mock_repo);
        let view = usecase
            .update_user(
                id,
                UserPatch {
                    name: Some(" Jonas S. ".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(view.name, "Jonas S.");
    }

    #[tokio::test]
    async fn test_delete_missing_user_is_not_found() {
        let mut mock_repo = MockUserRepository::new();
        mock_repo
            .expect_delete()
            .returning(|_| Err(RepositoryError::NotFound));

        let mut reviews = MockReviewRepository::new();
        reviews.expect_tours_reviewed_by().returning(|_| Ok(vec![]));

        let mut tours = MockTourRepository::new();
        tours.expect_update_ratings().times(0);

        let usecase = UsersUseCase::new(mock_repo, reviews, tours);
        let result = usecase.delete_user(Uuid::new_v4()).await;

        assert!(matches!(result, Err(UsecaseError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_user_recalculates_reviewed_tours() {
        let user_id = Uuid::new_v4();
        let emptied = Uuid::new_v4();
        let still_reviewed = Uuid::new_v4();

        let mut users = MockUserRepository::new();
        users
            .expect_delete()
            .withf(move |id| *id == user_id)
            .times(1)
            .returning(|_| Ok(()));

        let mut reviews = MockReviewRepository::new();
        reviews
            .expect_tours_reviewed_by()
            .withf(move |id| *id == user_id)
            .times(1)
            .returning(move |_| Ok(vec![emptied, still_reviewed]));
        reviews.expect_rating_stats().returning(move |tour_id| {
            if tour_id == still_reviewed {
                Ok(Some(RatingStats { quantity: 2, average: 3.75 }))
            } else {
                Ok(None)
            }
        });

        let mut tours = MockTourRepository::new();
        tours
            .expect_update_ratings()
            .withf(move |id, quantity, average| *id == emptied && *quantity == 0 && *average == 4.5)
            .times(1)
            .returning(|_, _, _| Ok(()));
        tours
            .expect_update_ratings()
            .withf(move |id, quantity, average| *id == still_reviewed && *quantity == 2 && *average == 3.75)
            .times(1)
            .returning(|_, _, _| Ok(()));

        let usecase = UsersUseCase::new(users, reviews, tours);
        usecase.delete_user(user_id).await.unwrap();
    }
}
