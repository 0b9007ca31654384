use std::{env, path::PathBuf};

/// Origins allowed by CORS when `CORS_ORIGINS` is not set.
pub const DEFAULT_CORS_ORIGINS: [&str; 3] = [
    "http://localhost:8080",
    "http://localhost:8081",
    "https://aquabconsult.netlify.app",
];

const LOCAL_JWT_SECRET: &str = "bridgepoint-local-development-secret";

/// AppConfig
///
/// Holds the application's entire configuration state. Loaded once at startup and
/// shared immutably with every request through `AppState`.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Controls log format, fallbacks and error detail.
    pub env: Env,
    // Postgres connection string. `None` (local only) runs on the in-memory store.
    pub db_url: Option<String>,
    // HMAC secret used to sign and verify session tokens.
    pub jwt_secret: String,
    // Lifetime of an issued token.
    pub jwt_expiry_hours: i64,
    // Exact origins accepted by the CORS layer.
    pub cors_origins: Vec<String>,
    pub port: u16,
    // Root directory for uploaded files, served back under `/uploads`.
    pub upload_dir: PathBuf,
    // Credentials for the first admin account, created when no admin exists.
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
}

/// Env
///
/// Defines the runtime context: developer conveniences locally, fail-fast secrets in production.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

impl Default for AppConfig {
    /// default
    ///
    /// Provides a safe, non-panicking AppConfig instance primarily used for test setup.
    fn default() -> Self {
        Self {
            env: Env::Local,
            db_url: None,
            jwt_secret: "super-secure-test-secret-value-local".to_string(),
            jwt_expiry_hours: 24,
            cors_origins: DEFAULT_CORS_ORIGINS.iter().map(|o| o.to_string()).collect(),
            port: 3000,
            upload_dir: PathBuf::from("public/uploads"),
            admin_username: None,
            admin_password: None,
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads every parameter from environment variables.
    ///
    /// # Panics
    /// Panics in production when `DATABASE_URL` or `JWT_SECRET` is missing, so the
    /// server never starts with an incomplete or insecure configuration.
    pub fn load() -> Self {
        let env = match env::var("APP_ENV").unwrap_or_default().as_str() {
            "production" => Env::Production,
            _ => Env::Local,
        };

        let (db_url, jwt_secret) = match env {
            Env::Production => (
                Some(env::var("DATABASE_URL").expect("FATAL: DATABASE_URL required in prod")),
                env::var("JWT_SECRET").expect("FATAL: JWT_SECRET must be set in production."),
            ),
            Env::Local => (
                env::var("DATABASE_URL").ok(),
                env::var("JWT_SECRET").unwrap_or_else(|_| LOCAL_JWT_SECRET.to_string()),
            ),
        };

        // Local runs always get a usable first admin; production only when asked to.
        let (admin_username, admin_password) = match env {
            Env::Production => (
                env::var("ADMIN_USERNAME").ok(),
                env::var("ADMIN_PASSWORD").ok(),
            ),
            Env::Local => (
                Some(env::var("ADMIN_USERNAME").unwrap_or_else(|_| "admin".to_string())),
                Some(env::var("ADMIN_PASSWORD").unwrap_or_else(|_| "admin123".to_string())),
            ),
        };

        Self {
            env,
            db_url,
            jwt_secret,
            jwt_expiry_hours: parse_var("JWT_EXPIRY_HOURS").unwrap_or(24),
            cors_origins: env::var("CORS_ORIGINS")
                .map(|raw| parse_origins(&raw))
                .unwrap_or_else(|_| DEFAULT_CORS_ORIGINS.iter().map(|o| o.to_string()).collect()),
            port: parse_var("PORT").unwrap_or(3000),
            upload_dir: env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("public/uploads")),
            admin_username,
            admin_password,
        }
    }

    pub fn is_production(&self) -> bool {
        self.env == Env::Production
    }
}

fn parse_var<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|raw| raw.trim().parse().ok())
}

/// Splits a comma-separated origin list, dropping blanks and trailing slashes.
pub fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|origin| origin.trim().trim_end_matches('/'))
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_origins_trims_and_skips_blanks() {
        let origins = parse_origins(" http://a.test/ ,, https://b.test ");
        assert_eq!(origins, vec!["http://a.test", "https://b.test"]);
    }
}
