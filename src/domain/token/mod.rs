//! Token domain - access token claims and the refresh token capability

mod access;
mod refresh;

pub use access::{AccessTokenClaims, AccessTokenCodec, TokenPair};
pub use refresh::RefreshTokenStore;

#[cfg(test)]
pub use refresh::MockRefreshTokenStore;
