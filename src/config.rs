use std::env;

/// Default separator between segment names in a category path.
pub const DEFAULT_DELIMITER: char = '>';

/// Default bound on how many ancestors a parent walk may visit.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// AppConfig
///
/// Holds the application's entire configuration state. This struct is immutable once loaded
/// and is pulled into the handlers and the auth extractor through `FromRef`.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Database connection string (Postgres). `None` selects the in-memory repository (local only).
    pub db_url: Option<String>,
    // Runtime environment marker. Controls the dev bypass and the log format.
    pub env: Env,
    // Secret key used to decode and validate incoming JWTs.
    pub jwt_secret: String,
    // Character joining segment names into a category path.
    pub category_delimiter: char,
    // Guard against corrupt or pathologically deep trees during parent walks and cascades.
    pub category_max_depth: usize,
    // Address the HTTP listener binds to.
    pub bind_addr: String,
}

/// Env
///
/// Defines the runtime context, used to switch between development conveniences
/// (in-memory store, `x-user-id` bypass) and the hardened production setup.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

impl Default for AppConfig {
    /// Safe, non-panicking values used by test setup.
    fn default() -> Self {
        Self {
            db_url: None,
            env: Env::Local,
            jwt_secret: "super-secure-test-secret-value-local".to_string(),
            category_delimiter: DEFAULT_DELIMITER,
            category_max_depth: DEFAULT_MAX_DEPTH,
            bind_addr: "0.0.0.0:3000".to_string(),
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Initializes the configuration from environment variables at startup.
    ///
    /// # Panics
    /// Panics if a variable required in production is missing, or if `CATEGORY_DELIMITER`
    /// / `CATEGORY_MAX_DEPTH` hold unusable values. The process must not start half-configured.
    pub fn load() -> Self {
        let env = match env::var("APP_ENV").unwrap_or_else(|_| "local".to_string()).as_str() {
            "production" => Env::Production,
            _ => Env::Local,
        };

        let jwt_secret = match env {
            Env::Production => env::var("SUPABASE_JWT_SECRET")
                .expect("FATAL: SUPABASE_JWT_SECRET must be set in production."),
            Env::Local => env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| "super-secure-test-secret-value-local".to_string()),
        };

        let db_url = match env {
            Env::Production => Some(
                env::var("DATABASE_URL").expect("FATAL: DATABASE_URL required in prod"),
            ),
            // Without a database the local server runs on the in-memory repository.
            Env::Local => env::var("DATABASE_URL").ok(),
        };

        let category_delimiter = match env::var("CATEGORY_DELIMITER") {
            Ok(raw) => parse_delimiter(&raw)
                .expect("FATAL: CATEGORY_DELIMITER must be exactly one non-whitespace character"),
            Err(_) => DEFAULT_DELIMITER,
        };

        let category_max_depth = match env::var("CATEGORY_MAX_DEPTH") {
            Ok(raw) => raw
                .parse::<usize>()
                .ok()
                .filter(|depth| *depth > 0)
                .expect("FATAL: CATEGORY_MAX_DEPTH must be a positive integer"),
            Err(_) => DEFAULT_MAX_DEPTH,
        };

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        Self {
            db_url,
            env,
            jwt_secret,
            category_delimiter,
            category_max_depth,
            bind_addr,
        }
    }
}

fn parse_delimiter(raw: &str) -> Option<char> {
    let mut chars = raw.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if !c.is_whitespace() => Some(c),
        _ => None,
    }
}
