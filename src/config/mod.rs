use std::env;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    /// Root of the public asset disk (weekday images, photos, templates).
    pub storage_root: String,
    /// Base URL used to build absolute image URLs in rendered templates.
    pub public_base_url: String,
    pub frontend_url: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, env::VarError> {
        Ok(Self {
            database_url: env::var("DATABASE_URL")?,
            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),
            host: env::var("BACKEND_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("BACKEND_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .unwrap_or(3000),
            jwt_secret: env::var("JWT_SECRET")?,
            storage_root: env::var("STORAGE_ROOT")
                .unwrap_or_else(|_| "storage/app/public".to_string()),
            public_base_url: env::var("PUBLIC_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Single test so env mutation does not race with parallel tests.
    #[test]
    fn from_env_defaults_and_required_vars() {
        for key in [
            "DATABASE_MAX_CONNECTIONS",
            "BACKEND_HOST",
            "BACKEND_PORT",
            "STORAGE_ROOT",
            "PUBLIC_BASE_URL",
            "FRONTEND_URL",
        ] {
            env::remove_var(key);
        }
        env::remove_var("DATABASE_URL");
        env::set_var("JWT_SECRET", "secret");
        assert!(AppConfig::from_env().is_err());

        env::set_var("DATABASE_URL", "postgres://localhost/guardian");
        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.database_max_connections, 10);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.storage_root, "storage/app/public");
        assert_eq!(config.public_base_url, "http://localhost:3000");

        env::set_var("BACKEND_PORT", "not-a-port");
        env::set_var("PUBLIC_BASE_URL", "https://guardian.example/");
        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.public_base_url, "https://guardian.example");
    }
}
