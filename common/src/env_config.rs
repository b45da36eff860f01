use std::{env, sync::Arc, time::Duration};

#[derive(Clone, Debug)]
/// Configuration struct for the server.
///
/// This struct holds all the necessary configuration parameters
/// required to initialize and run the server.
/// It includes database connection details, JWT configuration,
/// server host and port, number of worker threads, CORS settings,
/// logging preferences and the settings of every third-party
/// collaborator (entitlement provider, object storage, translation).
///
/// Only `main` reads the environment; services receive the sub-config they need.
pub struct Config {
    // environment
    pub environment: String, // development or production
    /// The URL of the database to connect to.
    pub database_url: String,
    /// Configuration for JWT (JSON Web Token) authentication.
    pub jwt_config: JwtConfig,
    /// The hostname or IP address the server will bind to.
    pub server_host: String,
    /// The port number the server will listen on.
    pub server_port: u16,
    /// The number of worker threads to spawn for handling requests.
    pub num_workers: usize,
    /// The allowed origin for CORS (Cross-Origin Resource Sharing).
    pub cors_allowed_origin: String,
    /// A boolean indicating whether console logging is enabled.
    pub console_logging_enabled: bool,
    /// Log level name (`error`, `warn`, `info`, `debug`, `trace`).
    pub log_level: String,
    /// File the logger appends to.
    pub log_file: String,
    /// Stripe webhook secret
    pub stripe_webhook_secret: String,
    /// Third-party entitlement provider.
    pub entitlements: EntitlementConfig,
    /// Object storage used by voice messages.
    pub storage: StorageConfig,
    /// Translation provider behind the proxy routes.
    pub translation: TranslationConfig,
    /// Free tier limits rendered by the usage presenter.
    pub usage_limits: UsageLimits,
    /// Optional path to a language catalog JSON file, embedded catalog otherwise.
    pub language_catalog_path: Option<String>,
    /// Realtime topic of the community chat.
    pub chat_topic: String,
}

#[derive(Clone, Debug)]
/// Configuration for JSON Web Token (JWT) authentication.
///
/// Tokens are issued by the auth backend and only verified here.
pub struct JwtConfig {
    /// The secret key used to verify JWTs.
    pub secret: String,
    /// Expected `aud` claim.
    pub audience: String,
}

#[derive(Clone, Debug)]
/// Settings of the third-party subscriber management API.
pub struct EntitlementConfig {
    /// Secret API key. `None` disables the integration.
    pub api_key: Option<String>,
    /// Base URL of the REST API, without trailing slash.
    pub base_url: String,
    /// Entitlement that grants premium access.
    pub entitlement_id: String,
    /// Upper bound for a single upstream call.
    pub timeout: Duration,
}

#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub base_url: String,
    pub service_key: String,
    pub voice_bucket: String,
    /// Bound on a whole upload, audio included.
    pub timeout: Duration,
}

#[derive(Clone, Debug)]
pub struct TranslationConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

#[derive(Clone, Debug, PartialEq)]
/// Daily allowances of the free plan. Premium access is unlimited.
pub struct UsageLimits {
    pub free_daily_messages: u32,
    pub free_daily_voice_messages: u32,
}

impl Default for UsageLimits {
    fn default() -> Self {
        UsageLimits {
            free_daily_messages: 20,
            free_daily_voice_messages: 3,
        }
    }
}

impl JwtConfig {
    /// Creates a new `JwtConfig` instance from environment variables.
    ///
    /// Reads the JWT configuration from environment variables:
    /// - `JWT_SECRET`: Required. The secret key for JWT verification.
    /// - `JWT_AUDIENCE`: Optional. Defaults to `authenticated`.
    ///
    /// # Panics
    ///
    /// This function will panic if `JWT_SECRET` environment variable is not set
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        JwtConfig {
            secret: env::var("JWT_SECRET").expect("JWT_SECRET must be set"),
            audience: env::var("JWT_AUDIENCE").unwrap_or_else(|_| "authenticated".to_string()),
        }
    }
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Creates a new `Config` instance from environment variables.
    ///
    /// Loads all configuration values from environment variables with sensible defaults
    /// for most optional settings.
    ///
    /// # Environment Variables
    ///
    /// Required:
    /// - `ENVIRONMENT`: `development` or `production`
    /// - `DATABASE_URL`: Connection string for the database
    /// - `JWT_SECRET`: Secret key for JWT verification (via `JwtConfig::from_env()`)
    ///
    /// Optional (with defaults):
    /// - `IP`: Server host (default: "127.0.0.1")
    /// - `PORT`: Server port (default: 8080)
    /// - `WORKERS`: Number of worker threads (default: 4)
    /// - `CORS_ALLOWED_ORIGIN`: Allowed CORS origin (default: "http://localhost:3000")
    /// - `ENABLE_CONSOLE_LOGGING`: Whether to enable console logging (default: true)
    /// - `LOG_LEVEL` / `LOG_FILE`: logger settings (default: "info" / "lingua.log")
    /// - `ENTITLEMENTS_API_KEY`: entitlement provider secret (default: unset, integration disabled)
    /// - `ENTITLEMENTS_BASE_URL`, `ENTITLEMENT_ID`, `UPSTREAM_TIMEOUT_MS`
    /// - `STORAGE_URL`, `STORAGE_SERVICE_KEY`, `VOICE_BUCKET`, `STORAGE_TIMEOUT_MS`
    /// - `TRANSLATION_BASE_URL`, `TRANSLATION_API_KEY`
    /// - `FREE_DAILY_MESSAGES`, `FREE_DAILY_VOICE_MESSAGES`
    /// - `LANGUAGE_CATALOG_PATH`, `CHAT_TOPIC`
    ///
    /// # Panics
    ///
    /// This function will panic if required environment variables are missing.
    pub fn from_env() -> Arc<Self> {
        dotenvy::dotenv().ok();

        let timeout = Duration::from_millis(parse_var("UPSTREAM_TIMEOUT_MS", 3000));
        let defaults = UsageLimits::default();

        Arc::new(Config {
            environment: env::var("ENVIRONMENT").expect("ENVIRONMENT must be set"),
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            jwt_config: JwtConfig::from_env(),
            server_host: env::var("IP").unwrap_or_else(|_| "127.0.0.1".to_string()),
            server_port: parse_var("PORT", 8080),
            num_workers: parse_var("WORKERS", 4),
            cors_allowed_origin: env::var("CORS_ALLOWED_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            console_logging_enabled: env::var("ENABLE_CONSOLE_LOGGING")
                .unwrap_or_else(|_| "true".to_string())
                .to_lowercase()
                == "true",
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_file: env::var("LOG_FILE").unwrap_or_else(|_| "lingua.log".to_string()),
            stripe_webhook_secret: env::var("STRIPE_WEBHOOK_SECRET").unwrap_or_default(),
            entitlements: EntitlementConfig {
                api_key: optional_var("ENTITLEMENTS_API_KEY"),
                base_url: env::var("ENTITLEMENTS_BASE_URL")
                    .unwrap_or_else(|_| "https://api.revenuecat.com/v1".to_string()),
                entitlement_id: env::var("ENTITLEMENT_ID")
                    .unwrap_or_else(|_| "premium".to_string()),
                timeout,
            },
            storage: StorageConfig {
                base_url: env::var("STORAGE_URL")
                    .unwrap_or_else(|_| "http://localhost:54321".to_string()),
                service_key: env::var("STORAGE_SERVICE_KEY").unwrap_or_default(),
                voice_bucket: env::var("VOICE_BUCKET")
                    .unwrap_or_else(|_| "voice-messages".to_string()),
                timeout: Duration::from_millis(parse_var("STORAGE_TIMEOUT_MS", 15000)),
            },
            translation: TranslationConfig {
                base_url: env::var("TRANSLATION_BASE_URL")
                    .unwrap_or_else(|_| "http://localhost:8787".to_string()),
                api_key: optional_var("TRANSLATION_API_KEY"),
                timeout,
            },
            usage_limits: UsageLimits {
                free_daily_messages: parse_var(
                    "FREE_DAILY_MESSAGES",
                    defaults.free_daily_messages,
                ),
                free_daily_voice_messages: parse_var(
                    "FREE_DAILY_VOICE_MESSAGES",
                    defaults.free_daily_voice_messages,
                ),
            },
            language_catalog_path: optional_var("LANGUAGE_CATALOG_PATH"),
            chat_topic: env::var("CHAT_TOPIC").unwrap_or_else(|_| "community".to_string()),
        })
    }
}
