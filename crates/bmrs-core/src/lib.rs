pub mod calendar;
pub mod error;
pub mod record;
pub mod schema;
pub mod settlement_period;
pub mod store;
pub mod summary;
