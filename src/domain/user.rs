use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::domain::schema::{Collection, Field, FieldKind};

pub const DEFAULT_PHOTO: &str = "default.jpg";

pub static USER_COLLECTION: Collection = Collection {
    name: "users",
    id_column: "id",
    default_sort: "createdAt",
    fields: &[
        Field::new("id", "id", FieldKind::Uuid),
        Field::new("name", "name", FieldKind::Text),
        Field::new("email", "email", FieldKind::Text),
        Field::new("photo", "photo", FieldKind::Text),
        Field::new("createdAt", "created_at", FieldKind::Timestamp),
    ],
};

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub photo: String,
    pub password_hash: String,
    pub password_changed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(name: String, email: String, password_hash: String, photo: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            email,
            photo: photo.unwrap_or_else(|| DEFAULT_PHOTO.to_string()),
            password_hash,
            password_changed_at: None,
            created_at: Utc::now(),
        }
    }

    pub fn update_profile(&mut self, name: Option<String>, email: Option<String>, photo: Option<String>) {
        if let Some(n) = name {
            self.name = n;
        }
        if let Some(e) = email {
            self.email = e;
        }
        if let Some(p) = photo {
            self.photo = p;
        }
    }
}

/// Public representation of a user. Never carries password material.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub photo: String,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserView {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            name: u.name,
            email: u.email,
            photo: u.photo,
            created_at: u.created_at,
        }
    }
}

/// What a tour shows about each of its guides.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GuideView {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub photo: String,
}

impl From<&User> for GuideView {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            name: u.name.clone(),
            email: u.email.clone(),
            photo: u.photo.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    #[validate(length(min = 1, message = "A user must have a name"))]
    pub name: String,
    #[validate(email(message = "Please provide a valid email"))]
    pub email: String,
    pub photo: Option<String>,
    #[validate(length(min = 8, message = "A password must have at least 8 characters"))]
    pub password: String,
    #[validate(must_match(other = "password", message = "Passwords are not the same!"))]
    pub password_confirm: String,
}

impl NewUser {
    pub fn normalized(mut self) -> Self {
        self.name = self.name.trim().to_string();
        self.email = self.email.trim().to_lowercase();
        self
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    #[validate(length(min = 1, message = "A user must have a name"))]
    pub name: Option<String>,
    #[validate(email(message = "Please provide a valid email"))]
    pub email: Option<String>,
    pub photo: Option<String>,
    pub password: Option<String>,
    pub password_confirm: Option<String>,
}

impl UserPatch {
    pub fn normalized(mut self) -> Self {
        self.name = self.name.map(|n| n.trim().to_string());
        self.email = self.email.map(|e| e.trim().to_lowercase());
        self
    }

    pub fn touches_password(&self) -> bool {
        self.password.is_some() || self.password_confirm.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(password: &str, confirm: &str) -> NewUser {
        NewUser {
            name: "  Laura Wilson ".to_string(),
            email: " Laura@Example.COM ".to_string(),
            photo: None,
            password: password.to_string(),
            password_confirm: confirm.to_string(),
        }
    }

    #[test]
    fn test_user_creation_defaults_photo() {
        let user = User::new("Laura".to_string(), "laura@example.com".to_string(), "hash".to_string(), None);

        assert_eq!(user.photo, DEFAULT_PHOTO);
        assert!(user.password_changed_at.is_none());
    }

    #[test]
    fn test_new_user_normalization() {
        let input = new_user("pass1234", "pass1234").normalized();

        assert_eq!(input.name, "Laura Wilson");
        assert_eq!(input.email, "laura@example.com");
        assert!(input.validate().is_ok());
    }

    #[test]
    fn test_new_user_password_mismatch() {
        let input = new_user("pass1234", "pass12345").normalized();
        let errors = input.validate().unwrap_err();

        assert_eq!(errors.field_errors().len(), 1);
    }

    #[test]
    fn test_new_user_short_password() {
        let input = new_user("short", "short").normalized();
        let errors = input.validate().unwrap_err();

        assert_eq!(errors.field_errors().len(), 1);
    }

    #[test]
    fn test_new_user_invalid_email() {
        let mut input = new_user("pass1234", "pass1234");
        input.email = "not-an-email".to_string();

        assert!(input.normalized().validate().is_err());
    }

    #[test]
    fn test_user_view_hides_password_hash() {
        let user = User::new("Laura".to_string(), "laura@example.com".to_string(), "secret-hash".to_string(), None);
        let json = serde_json::to_value(UserView::from(user)).unwrap();

        assert!(json.get("passwordHash").is_none());
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["email"], "laura@example.com");
    }

    #[test]
    fn test_patch_detects_password_fields() {
        let patch = UserPatch {
            password_confirm: Some("x".to_string()),
            ..Default::default()
        };
        assert!(patch.touches_password());
        assert!(!UserPatch::default().touches_password());
    }

    #[test]
    fn test_update_profile() {
        let mut user = User::new("Laura".to_string(), "laura@example.com".to_string(), "hash".to_string(), None);
        user.update_profile(Some("Lou".to_string()), None, Some("user-1.jpg".to_string()));

        assert_eq!(user.name, "Lou");
        assert_eq!(user.email, "laura@example.com");
        assert_eq!(user.photo, "user-1.jpg");
    }
}
