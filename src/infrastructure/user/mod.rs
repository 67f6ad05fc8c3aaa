//! User infrastructure - repository implementations

mod in_memory;
mod postgres_repository;

pub use in_memory::InMemoryUserRepository;
pub use postgres_repository::PostgresUserRepository;
