/// Flawk API configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection string. When unset, users and notifications
    /// live in memory for the lifetime of the process.
    pub database_url: Option<String>,
    /// Shared secret used to sign and verify HS256 access tokens.
    pub jwt_secret: String,
    /// Lifetime of a freshly minted access token, in seconds.
    pub access_token_ttl_secs: u64,
    /// Build identifier returned in the socket `init` acknowledgement.
    pub build_number: String,
    /// When set, admin sockets are told about every client connect/disconnect.
    pub socket_debug: bool,
    /// Port the HTTP server binds to.
    pub port: u16,
}

/// Default access-token lifetime (24 hours).
pub const DEFAULT_ACCESS_TOKEN_TTL_SECS: u64 = 24 * 3600;

/// Longest lifetime `ACCESS_TOKEN_TTL_SECS` may request (one year).
pub const MAX_ACCESS_TOKEN_TTL_SECS: u64 = 365 * 24 * 3600;

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Panics with a descriptive message if a required variable is missing.
    pub fn from_env() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL").ok().filter(|s| !s.is_empty()),
            jwt_secret: required_var("JWT_SECRET"),
            access_token_ttl_secs: token_ttl(std::env::var("ACCESS_TOKEN_TTL_SECS").ok().as_deref()),
            build_number: std::env::var("BUILD_NUMBER")
                .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string()),
            socket_debug: std::env::var("SOCKET_DEBUG")
                .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
            port: std::env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(4000),
        }
    }
}

/// Parse a token lifetime, falling back to the default when unset or
/// unparsable and clamping to [`MAX_ACCESS_TOKEN_TTL_SECS`].
fn token_ttl(raw: Option<&str>) -> u64 {
    raw.and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(DEFAULT_ACCESS_TOKEN_TTL_SECS)
        .min(MAX_ACCESS_TOKEN_TTL_SECS)
}

fn required_var(name: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| panic!("{name} env var is required"))
}
