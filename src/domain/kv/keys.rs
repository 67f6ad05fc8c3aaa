//! Key namespaces inside the shared expiring store

/// Prefix for refresh token entries
pub const REFRESH_TOKEN_PREFIX: &str = "refresh";

/// Prefix for rate limit counters
pub const RATE_LIMIT_PREFIX: &str = "rate";

/// Key holding the principal for a refresh token
pub fn refresh_token_key(token: &str) -> String {
    format!("{}:{}", REFRESH_TOKEN_PREFIX, token)
}

/// Key holding the fixed-window counter for a route and principal
pub fn rate_limit_key(route: &str, principal: &str) -> String {
    format!("{}:{}:{}", RATE_LIMIT_PREFIX, route, principal)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespaces_do_not_collide() {
        let token_key = refresh_token_key("rate:/api/v1/login:1.2.3.4");
        let counter_key = rate_limit_key("/api/v1/login", "1.2.3.4");

        assert_ne!(token_key, counter_key);
        assert!(token_key.starts_with("refresh:"));
        assert!(counter_key.starts_with("rate:"));
    }

    #[test]
    fn test_rate_limit_key_format() {
        assert_eq!(
            rate_limit_key("/api/v1/login", "user-1"),
            "rate:/api/v1/login:user-1"
        );
    }
}
