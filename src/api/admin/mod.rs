//! Admin API endpoints

pub mod users;

pub const USERS_PATH: &str = "/api/v1/admin/users";
