//! Configuration management.

use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub security: SecurityConfig,
    pub cors: CorsConfig,
    pub logging: LoggingConfig,
    pub telemetry: TelemetryConfig,
    pub pages: PageSizeConfig,
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub otlp_endpoint: Option<String>,
    pub service_name: String,
    pub metrics_enabled: bool,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub environment: Environment,
    pub request_timeout_secs: u64,
    pub max_body_size: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }

    pub fn is_development(&self) -> bool {
        matches!(self, Environment::Development)
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub connection_timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub access_token_expiry_secs: i64,
    pub issuer: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SecurityConfig {
    pub min_password_length: usize,
    pub require_password_complexity: bool,
    pub password_hash_cost: u32,
}

#[derive(Debug, Clone)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<String>,
    pub allowed_headers: Vec<String>,
    pub allow_credentials: bool,
    pub max_age_secs: u64,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Json,
    Pretty,
}

/// Default page sizes for the paginated listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSizeConfig {
    pub history: i64,
    pub notifications: i64,
    pub requests: i64,
    pub tasks: i64,
    pub members: i64,
}

impl Default for PageSizeConfig {
    fn default() -> Self {
        Self {
            history: 5,
            notifications: 10,
            requests: 10,
            tasks: 20,
            members: 30,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let environment = Self::parse_environment();

        Self {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("PORT")
                    .unwrap_or_else(|_| "8080".to_string())
                    .parse()
                    .expect("PORT must be a valid number"),
                environment: environment.clone(),
                request_timeout_secs: env::var("REQUEST_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()
                    .expect("REQUEST_TIMEOUT_SECS must be a valid number"),
                max_body_size: env::var("MAX_BODY_SIZE")
                    .unwrap_or_else(|_| "10485760".to_string())
                    .parse()
                    .expect("MAX_BODY_SIZE must be a valid number"),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").unwrap_or_else(|_| "projecthub.db".to_string()),
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "8".to_string())
                    .parse()
                    .expect("DATABASE_MAX_CONNECTIONS must be a valid number"),
                connection_timeout_secs: env::var("DATABASE_CONNECTION_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()
                    .expect("DATABASE_CONNECTION_TIMEOUT_SECS must be a valid number"),
            },
            jwt: Self::parse_jwt_config(),
            security: Self::parse_security_config(&environment),
            cors: Self::parse_cors_config(&environment),
            logging: Self::parse_logging_config(&environment),
            telemetry: Self::parse_telemetry_config(),
            pages: Self::parse_page_sizes(),
        }
    }

    fn parse_telemetry_config() -> TelemetryConfig {
        TelemetryConfig {
            otlp_endpoint: env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok(),
            service_name: env::var("OTEL_SERVICE_NAME")
                .unwrap_or_else(|_| "projecthub".to_string()),
            metrics_enabled: env::var("METRICS_ENABLED")
                .map(|v| v.parse().unwrap_or(true))
                .unwrap_or(true),
        }
    }

    fn parse_page_sizes() -> PageSizeConfig {
        let defaults = PageSizeConfig::default();
        let read = |key: &str, fallback: i64| -> i64 {
            env::var(key)
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v: &i64| *v > 0)
                .unwrap_or(fallback)
        };

        PageSizeConfig {
            history: read("PAGE_SIZE_HISTORY", defaults.history),
            notifications: read("PAGE_SIZE_NOTIFICATIONS", defaults.notifications),
            requests: read("PAGE_SIZE_REQUESTS", defaults.requests),
            tasks: read("PAGE_SIZE_TASKS", defaults.tasks),
            members: read("PAGE_SIZE_MEMBERS", defaults.members),
        }
    }

    fn parse_environment() -> Environment {
        match env::var("ENVIRONMENT")
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
            .as_str()
        {
            "production" | "prod" => Environment::Production,
            "staging" | "stage" => Environment::Staging,
            _ => Environment::Development,
        }
    }

    fn parse_jwt_config() -> JwtConfig {
        JwtConfig {
            access_token_expiry_secs: env::var("JWT_ACCESS_TOKEN_EXPIRY_SECS")
                .unwrap_or_else(|_| "86400".to_string())
                .parse()
                .expect("JWT_ACCESS_TOKEN_EXPIRY_SECS must be a valid number"),
            issuer: env::var("JWT_ISSUER").ok(),
        }
    }

    fn parse_security_config(environment: &Environment) -> SecurityConfig {
        let is_prod = environment.is_production();

        SecurityConfig {
            min_password_length: env::var("MIN_PASSWORD_LENGTH")
                .unwrap_or_else(|_| "8".to_string())
                .parse()
                .expect("MIN_PASSWORD_LENGTH must be a valid number"),
            require_password_complexity: env::var("REQUIRE_PASSWORD_COMPLEXITY")
                .map(|v| v.parse().unwrap_or(is_prod))
                .unwrap_or(is_prod),
            password_hash_cost: env::var("PASSWORD_HASH_COST")
                .unwrap_or_else(|_| "12".to_string())
                .parse()
                .expect("PASSWORD_HASH_COST must be a valid number"),
        }
    }

    fn parse_cors_config(environment: &Environment) -> CorsConfig {
        let default_origins = if environment.is_development() {
            vec!["*".to_string()]
        } else {
            vec![]
        };

        let allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
            .unwrap_or(default_origins);

        CorsConfig {
            allowed_origins,
            allowed_methods: env::var("CORS_ALLOWED_METHODS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_else(|_| {
                    vec![
                        "GET".to_string(),
                        "POST".to_string(),
                        "PUT".to_string(),
                        "DELETE".to_string(),
                        "OPTIONS".to_string(),
                    ]
                }),
            allowed_headers: env::var("CORS_ALLOWED_HEADERS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_else(|_| {
                    vec![
                        "Content-Type".to_string(),
                        "Authorization".to_string(),
                        "X-Request-ID".to_string(),
                    ]
                }),
            allow_credentials: env::var("CORS_ALLOW_CREDENTIALS")
                .map(|v| v.parse().unwrap_or(true))
                .unwrap_or(true),
            max_age_secs: env::var("CORS_MAX_AGE_SECS")
                .unwrap_or_else(|_| "3600".to_string())
                .parse()
                .expect("CORS_MAX_AGE_SECS must be a valid number"),
        }
    }

    fn parse_logging_config(environment: &Environment) -> LoggingConfig {
        let is_dev = environment.is_development();

        LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| {
                if is_dev {
                    "debug".to_string()
                } else {
                    "info".to_string()
                }
            }),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| {
                    if is_dev {
                        "pretty".to_string()
                    } else {
                        "json".to_string()
                    }
                })
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        }
    }

    pub fn validate_for_production(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if self.server.environment.is_production() {
            if self.jwt.access_token_expiry_secs > 86400 {
                issues.push("Access token expiry should not exceed 1 day in production".to_string());
            }

            if self.cors.allowed_origins.contains(&"*".to_string()) {
                issues.push("CORS should not allow all origins (*) in production".to_string());
            }

            if self.security.min_password_length < 8 {
                issues.push("Minimum password length should be at least 8".to_string());
            }

            if self.database.url.contains(":memory:") {
                issues.push("In-memory database loses all data on restart".to_string());
            }
        }

        issues
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

impl Config {
    pub fn default_for_testing() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                environment: Environment::Development,
                request_timeout_secs: 30,
                max_body_size: 10485760,
            },
            database: DatabaseConfig {
                url: "projecthub-test.db".to_string(),
                max_connections: 4,
                connection_timeout_secs: 10,
            },
            jwt: JwtConfig {
                access_token_expiry_secs: 3600,
                issuer: Some("projecthub-test".to_string()),
            },
            security: SecurityConfig {
                min_password_length: 8,
                require_password_complexity: false,
                password_hash_cost: 4,
            },
            cors: CorsConfig {
                allowed_origins: vec!["*".to_string()],
                allowed_methods: vec![
                    "GET".to_string(),
                    "POST".to_string(),
                    "PUT".to_string(),
                    "DELETE".to_string(),
                ],
                allowed_headers: vec!["Content-Type".to_string(), "Authorization".to_string()],
                allow_credentials: false,
                max_age_secs: 3600,
            },
            logging: LoggingConfig {
                level: "debug".to_string(),
                format: LogFormat::Pretty,
            },
            telemetry: TelemetryConfig {
                otlp_endpoint: None,
                service_name: "projecthub-test".to_string(),
                metrics_enabled: false,
            },
            pages: PageSizeConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_parsing() {
        assert!(Environment::Production.is_production());
        assert!(!Environment::Production.is_development());
        assert!(Environment::Development.is_development());
        assert!(!Environment::Development.is_production());
    }

    #[test]
    fn test_production_validation() {
        let mut config = Config::default_for_testing();
        config.server.environment = Environment::Production;
        config.database.url = ":memory:".to_string();
        config.security.min_password_length = 6;
        config.jwt.access_token_expiry_secs = 7 * 86400;

        let issues = config.validate_for_production();
        assert_eq!(issues.len(), 4);
        assert!(issues.iter().any(|i| i.contains("CORS")));
        assert!(issues.iter().any(|i| i.contains("In-memory")));
    }

    #[test]
    fn test_development_skips_validation() {
        let config = Config::default_for_testing();
        assert!(config.validate_for_production().is_empty());
    }

    #[test]
    fn test_page_size_defaults() {
        let pages = Config::default_for_testing().pages;
        assert_eq!(pages.history, 5);
        assert_eq!(pages.notifications, 10);
        assert_eq!(pages.requests, 10);
        assert_eq!(pages.tasks, 20);
        assert_eq!(pages.members, 30);
    }

    #[test]
    fn test_telemetry_config_defaults() {
        let config = Config::default_for_testing();
        assert!(config.telemetry.otlp_endpoint.is_none());
        assert_eq!(config.telemetry.service_name, "projecthub-test");
        assert!(!config.telemetry.metrics_enabled);
    }
}
