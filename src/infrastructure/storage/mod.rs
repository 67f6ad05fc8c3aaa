//! Storage infrastructure - PostgreSQL pool, schema migrations and backend selection

mod factory;
pub mod migrations;
mod postgres;

pub use factory::{create_relational_backends, RelationalBackends, StorageType};
pub use migrations::{run_migrations, Migration, PostgresMigrator};
pub(crate) use postgres::map_write_error;
pub use postgres::{connect_pool, PostgresConfig};
