pub mod appointments;
pub mod auth;
pub mod clinics;
pub mod health;
pub mod packages;
pub mod records;
pub mod subscriptions;
