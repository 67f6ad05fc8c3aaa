//! Version 1 account API

pub mod auth;
pub mod users;
pub mod verify;

pub const REGISTER_PATH: &str = "/api/v1/register";
pub const LOGIN_PATH: &str = "/api/v1/login";
pub const REFRESH_PATH: &str = "/api/v1/refresh";
pub const VERIFY_PATH: &str = "/api/v1/verify";
pub const LOGOUT_PATH: &str = "/api/v1/logout";
pub const ME_PATH: &str = "/api/v1/me";
