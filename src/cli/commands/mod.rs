pub mod migrate;
pub mod packages;
pub mod token;
pub mod usage;
