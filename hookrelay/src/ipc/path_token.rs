//! Ephemeral subscription paths.
//!
//! A generated path doubles as the bearer credential for its deliveries, so it is
//! drawn from the thread-local CSPRNG rather than a counter.

/// Every generated path starts with this prefix.
pub const SUBSCRIPTION_PATH_PREFIX: &str = "/tmp-";

/// Random bytes per path; rendered as twice as many hex characters.
pub const SUBSCRIPTION_TOKEN_BYTES: usize = 8;

/// Returns `/tmp-` followed by 16 lowercase hex characters.
pub fn generate_subscription_path() -> String {
    let token: [u8; SUBSCRIPTION_TOKEN_BYTES] = rand::random();
    format!("{SUBSCRIPTION_PATH_PREFIX}{}", hex::encode(token))
}

/// Checks the shape of a generated path.
pub fn is_subscription_path(path: &str) -> bool {
    path.strip_prefix(SUBSCRIPTION_PATH_PREFIX)
        .is_some_and(|token| {
            token.len() == SUBSCRIPTION_TOKEN_BYTES * 2
                && token
                    .bytes()
                    .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
        })
}
