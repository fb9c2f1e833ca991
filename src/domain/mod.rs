pub mod booking;
pub mod geo;
pub mod report;
pub mod review;
pub mod schema;
pub mod tour;
pub mod user;
