//! Postgres adapters (feature `postgres`).

pub mod executor;
pub mod schema;

pub use executor::PgExecutor;
pub use schema::load_schema;
