pub mod bookings;
pub mod extract;
pub mod factory;
pub mod middleware;
pub mod reviews;
pub mod tours;
pub mod users;
