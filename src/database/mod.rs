pub mod catalog;
pub mod manager;
pub mod models;
pub mod repository;
pub mod scoped;

pub use manager::{DatabaseError, DatabaseManager};
pub use repository::ScopedRepository;
pub use scoped::{ClinicScoped, IsolationPredicate, SYSTEM_FIELDS};
