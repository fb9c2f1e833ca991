pub mod api_features;
pub mod bookings;
pub mod contracts;
pub mod error;
pub mod jwt;
pub mod password;
pub mod reports;
pub mod reviews;
pub mod tours;
pub mod users;
