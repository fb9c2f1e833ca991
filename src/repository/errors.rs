use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Not found")]
    NotFound,
    #[error("Duplicate value for {0}")]
    Duplicate(String),
    #[error("Referenced row does not exist: {0}")]
    InvalidReference(String),
    #[error("Check constraint violated: {0}")]
    CheckViolation(String),
}

/// Field names reported for the unique constraints created by the migrations.
fn constraint_field(constraint: &str) -> String {
    match constraint {
        "tours_name_key" => "name",
        "users_email_key" => "email",
        "reviews_tour_user_key" => "tour, user",
        other => other,
    }
    .to_string()
}

pub fn map_db_error(e: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::RowNotFound = e {
        return RepositoryError::NotFound;
    }

    if let Some(db) = e.as_database_error() {
        let constraint = db.constraint().unwrap_or_default();
        if db.is_unique_violation() {
            return RepositoryError::Duplicate(constraint_field(constraint));
        }
        if db.is_foreign_key_violation() {
            return RepositoryError::InvalidReference(constraint.to_string());
        }
        if db.is_check_violation() {
            return RepositoryError::CheckViolation(constraint.to_string());
        }
    }

    RepositoryError::DatabaseError(e.to_string())
}
