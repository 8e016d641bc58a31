//! Configuration management.

use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub jwt: JwtConfig,
    pub grpc: GrpcConfig,
    pub people: PeopleConfig,
    pub access: AccessConfig,
    pub cors: CorsConfig,
    pub logging: LoggingConfig,
    pub redis: RedisConfig,
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone)]
pub struct GrpcConfig {
    pub enabled: bool,
    pub port: u16,
    pub tls_cert_path: Option<String>,
    pub tls_key_path: Option<String>,
}

impl GrpcConfig {
    pub fn tls_enabled(&self) -> bool {
        self.tls_cert_path.is_some() && self.tls_key_path.is_some()
    }
}

/// Downstream People service used for account lookups and profile ownership.
#[derive(Debug, Clone)]
pub struct PeopleConfig {
    pub url: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct AccessConfig {
    pub hierarchy_max_depth: usize,
    pub cache_max_retries: u32,
    /// JSON array of board documents loaded into the board store at startup.
    pub boards_seed_path: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: Option<String>,
    pub pool_size: usize,
    pub connection_timeout_secs: u64,
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
pub struct JwtConfig {
    pub key: String,
    pub token_expiration_hours: u64,
    pub cookie_name: String,
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

pub const DEFAULT_AUTH_COOKIE: &str = "rs-sidkiq-auth-token";

fn parse_var<T: std::str::FromStr>(name: &str, default: &str) -> T {
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .unwrap_or_else(|_| panic!("{name} must be a valid value"))
}

fn parse_flag(name: &str, default: bool) -> bool {
    env::var(name)
        .map(|v| v.parse().unwrap_or(default))
        .unwrap_or(default)
}

fn parse_list(name: &str, default: &[&str]) -> Vec<String> {
    env::var(name)
        .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
        .unwrap_or_else(|_| default.iter().map(|s| s.to_string()).collect())
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let environment = Self::parse_environment();

        Self {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_var("PORT", "8080"),
                environment: environment.clone(),
                request_timeout_secs: parse_var("REQUEST_TIMEOUT_SECS", "30"),
                max_body_size: parse_var("MAX_BODY_SIZE", "1048576"),
            },
            jwt: JwtConfig {
                key: env::var("JWT_KEY").expect("JWT_KEY must be set"),
                token_expiration_hours: parse_var("TOKEN_EXPIRATION_HOURS", "24"),
                cookie_name: env::var("AUTH_COOKIE_NAME")
                    .unwrap_or_else(|_| DEFAULT_AUTH_COOKIE.to_string()),
            },
            grpc: GrpcConfig {
                enabled: parse_flag("GRPC_ENABLED", true),
                port: parse_var("GRPC_PORT", "50051"),
                tls_cert_path: env::var("GRPC_TLS_CERT_PATH").ok(),
                tls_key_path: env::var("GRPC_TLS_KEY_PATH").ok(),
            },
            people: PeopleConfig {
                url: env::var("PEOPLE_GRPC_URL")
                    .unwrap_or_else(|_| "http://127.0.0.1:50052".to_string()),
                request_timeout_secs: parse_var("PEOPLE_REQUEST_TIMEOUT_SECS", "5"),
            },
            access: AccessConfig {
                hierarchy_max_depth: parse_var("BOARD_HIERARCHY_MAX_DEPTH", "32"),
                cache_max_retries: parse_var("PERMISSION_CACHE_MAX_RETRIES", "16"),
                boards_seed_path: env::var("BOARDS_SEED_PATH").ok(),
            },
            cors: Self::parse_cors_config(&environment),
            logging: Self::parse_logging_config(&environment),
            redis: RedisConfig {
                url: env::var("REDIS_URL").ok(),
                pool_size: parse_var("REDIS_POOL_SIZE", "10"),
                connection_timeout_secs: parse_var("REDIS_CONNECTION_TIMEOUT_SECS", "5"),
            },
            telemetry: TelemetryConfig {
                otlp_endpoint: env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok(),
                service_name: env::var("OTEL_SERVICE_NAME")
                    .unwrap_or_else(|_| "sidekiq-auth".to_string()),
                metrics_enabled: parse_flag("METRICS_ENABLED", true),
            },
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

    fn parse_cors_config(environment: &Environment) -> CorsConfig {
        let default_origins: &[&str] = if environment.is_development() {
            &["*"]
        } else {
            &[]
        };

        CorsConfig {
            allowed_origins: parse_list("CORS_ALLOWED_ORIGINS", default_origins),
            allowed_methods: parse_list(
                "CORS_ALLOWED_METHODS",
                &["GET", "POST", "PUT", "DELETE", "OPTIONS"],
            ),
            allowed_headers: parse_list(
                "CORS_ALLOWED_HEADERS",
                &[
                    "Content-Type",
                    "Authorization",
                    "Cookie",
                    "Profile",
                    "BoardID",
                    DEFAULT_AUTH_COOKIE,
                    "X-Request-ID",
                ],
            ),
            allow_credentials: parse_flag("CORS_ALLOW_CREDENTIALS", true),
            max_age_secs: parse_var("CORS_MAX_AGE_SECS", "3600"),
        }
    }

    fn parse_logging_config(environment: &Environment) -> LoggingConfig {
        let is_dev = environment.is_development();

        LoggingConfig {
            level: env::var("LOG_LEVEL")
                .unwrap_or_else(|_| if is_dev { "debug" } else { "info" }.to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| if is_dev { "pretty" } else { "json" }.to_string())
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

        if self.jwt.key.len() < 32 {
            issues.push("JWT_KEY should be at least 32 bytes".to_string());
        }

        if self.server.environment.is_production() {
            if self.jwt.token_expiration_hours > 24 * 7 {
                issues.push("Token expiration should not exceed 7 days in production".to_string());
            }

            if self.cors.allowed_origins.contains(&"*".to_string()) {
                issues.push("CORS should not allow all origins (*) in production".to_string());
            }

            if self.redis.url.is_none() {
                issues.push(
                    "REDIS_URL is not set; permission cache is process-local in production"
                        .to_string(),
                );
            }
        }

        issues
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn grpc_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.grpc.port)
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
                max_body_size: 1048576,
            },
            jwt: JwtConfig {
                key: "sidekiq-test-signing-key-0123456789abcdef".to_string(),
                token_expiration_hours: 24,
                cookie_name: DEFAULT_AUTH_COOKIE.to_string(),
            },
            grpc: GrpcConfig {
                enabled: false,
                port: 50051,
                tls_cert_path: None,
                tls_key_path: None,
            },
            people: PeopleConfig {
                url: "http://127.0.0.1:50052".to_string(),
                request_timeout_secs: 5,
            },
            access: AccessConfig {
                hierarchy_max_depth: 32,
                cache_max_retries: 16,
                boards_seed_path: None,
            },
            cors: CorsConfig {
                allowed_origins: vec!["*".to_string()],
                allowed_methods: vec!["GET".to_string(), "POST".to_string()],
                allowed_headers: vec!["Content-Type".to_string(), "Profile".to_string()],
                allow_credentials: false,
                max_age_secs: 3600,
            },
            logging: LoggingConfig {
                level: "debug".to_string(),
                format: LogFormat::Pretty,
            },
            redis: RedisConfig {
                url: None,
                pool_size: 5,
                connection_timeout_secs: 5,
            },
            telemetry: TelemetryConfig {
                otlp_endpoint: None,
                service_name: "sidekiq-auth-test".to_string(),
                metrics_enabled: false,
            },
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
        config.jwt.key = "short".to_string();
        config.jwt.token_expiration_hours = 24 * 30;

        let issues = config.validate_for_production();
        assert!(issues.iter().any(|i| i.contains("JWT_KEY")));
        assert!(issues.iter().any(|i| i.contains("CORS")));
        assert!(issues.iter().any(|i| i.contains("expiration")));
        assert!(issues.iter().any(|i| i.contains("REDIS_URL")));
    }

    #[test]
    fn test_testing_defaults() {
        let config = Config::default_for_testing();
        assert!(!config.grpc.enabled);
        assert!(!config.grpc.tls_enabled());
        assert_eq!(config.people.request_timeout_secs, 5);
        assert_eq!(config.jwt.cookie_name, "rs-sidkiq-auth-token");
        assert!(config.validate_for_production().is_empty());
    }

    #[test]
    fn test_grpc_tls_enabled() {
        let config = GrpcConfig {
            enabled: true,
            port: 50051,
            tls_cert_path: Some("/path/to/cert.pem".to_string()),
            tls_key_path: Some("/path/to/key.pem".to_string()),
        };
        assert!(config.tls_enabled());
    }
}
