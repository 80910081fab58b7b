use std::path::PathBuf;
use std::str::FromStr;

use rust_decimal::Decimal;

use crate::auth::JwtConfig;
use crate::auth::jwt::generate_printable_secret;
use crate::core::ServerError;
use crate::orders::money::PricingConfig;

/// Payment gateway settings
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Base URL of the gateway API; `None` disables the gateway method
    pub base_url: Option<String>,
    pub access_token: String,
    /// Per-request timeout (milliseconds)
    pub timeout_ms: u64,
    /// HMAC secret for webhook signatures; `None` skips verification (development only)
    pub webhook_secret: Option<String>,
}

/// Server configuration
///
/// # Environment variables
///
/// Every field can be overridden from the environment:
///
/// | Variable | Default | Meaning |
/// |----------|---------|---------|
/// | WORK_DIR | ./data | Working directory (database, payment proofs) |
/// | HTTP_PORT | 3000 | HTTP port |
/// | ENVIRONMENT | development | development / staging / production |
/// | FREE_SHIPPING_THRESHOLD | 100 | Subtotal from which shipping is free |
/// | FLAT_SHIPPING_FEE | 10 | Shipping fee below the threshold |
/// | TAX_RATE | 0 | Tax rate (0.18 = 18%) |
/// | GATEWAY_URL | - | Payment gateway API (unset disables gateway payments) |
/// | GATEWAY_ACCESS_TOKEN | - | Gateway bearer token |
/// | GATEWAY_TIMEOUT_MS | 10000 | Gateway request timeout |
/// | GATEWAY_WEBHOOK_SECRET | - | Webhook HMAC secret (required in production when the gateway is on) |
/// | PUBLIC_BASE_URL | http://localhost:3000 | Public address for gateway return / notification URLs |
/// | RESTOCK_ON_CANCEL | true | Put stock back when an order is cancelled |
/// | JWT_SECRET | - | JWT key (required in production, >= 32 chars) |
/// | JWT_ISSUER | storefront | JWT issuer |
/// | JWT_AUDIENCE | storefront-clients | JWT audience |
/// | LOG_LEVEL | info | Log level |
/// | LOG_DIR | - | Log directory (daily rolling files when set) |
/// | REQUEST_TIMEOUT_MS | 30000 | Per-request timeout |
///
/// # Example
///
/// ```ignore
/// WORK_DIR=/data/shop HTTP_PORT=8080 TAX_RATE=0.18 cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    pub work_dir: String,
    pub http_port: u16,
    /// development | staging | production
    pub environment: String,
    pub pricing: PricingConfig,
    pub gateway: GatewayConfig,
    /// Base for gateway return and notification URLs
    pub public_base_url: String,
    pub restock_on_cancel: bool,
    pub jwt: JwtConfig,
    pub log_level: String,
    pub log_dir: Option<String>,
    /// Milliseconds
    pub request_timeout_ms: u64,
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: FromStr>(key: &str, default: T) -> Result<T, ServerError> {
    match env_string(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ServerError::Config(format!("{} has an invalid value: {}", key, raw))),
        None => Ok(default),
    }
}

impl Config {
    /// Load from the environment
    ///
    /// Unset keys take their default; malformed values and missing
    /// production secrets return [`ServerError::Config`].
    pub fn from_env() -> Result<Self, ServerError> {
        let environment = env_string("ENVIRONMENT").unwrap_or_else(|| "development".into());
        let production = environment == "production";
        let http_port = env_parse("HTTP_PORT", 3000u16)?;

        let pricing = PricingConfig {
            free_shipping_threshold: env_parse("FREE_SHIPPING_THRESHOLD", Decimal::new(100, 0))?,
            flat_shipping_fee: env_parse("FLAT_SHIPPING_FEE", Decimal::new(10, 0))?,
            tax_rate: env_parse("TAX_RATE", Decimal::ZERO)?,
        };
        if pricing.tax_rate.is_sign_negative() || pricing.flat_shipping_fee.is_sign_negative() {
            return Err(ServerError::Config(
                "TAX_RATE and FLAT_SHIPPING_FEE must not be negative".into(),
            ));
        }

        let base_url = env_string("GATEWAY_URL").map(|u| u.trim_end_matches('/').to_string());
        let webhook_secret = check_webhook_secret(
            env_string("GATEWAY_WEBHOOK_SECRET"),
            base_url.is_some(),
            production,
        )?;
        let gateway = GatewayConfig {
            base_url,
            access_token: env_string("GATEWAY_ACCESS_TOKEN").unwrap_or_default(),
            timeout_ms: env_parse("GATEWAY_TIMEOUT_MS", 10_000u64)?,
            webhook_secret,
        };

        let jwt = JwtConfig {
            secret: load_jwt_secret(production)?,
            expiration_minutes: env_parse("JWT_EXPIRATION_MINUTES", 1440i64)?,
            issuer: env_string("JWT_ISSUER").unwrap_or_else(|| "storefront".into()),
            audience: env_string("JWT_AUDIENCE").unwrap_or_else(|| "storefront-clients".into()),
        };

        Ok(Self {
            work_dir: env_string("WORK_DIR").unwrap_or_else(|| "./data".into()),
            http_port,
            public_base_url: env_string("PUBLIC_BASE_URL")
                .unwrap_or_else(|| format!("http://localhost:{}", http_port)),
            environment,
            pricing,
            gateway,
            restock_on_cancel: env_parse("RESTOCK_ON_CANCEL", true)?,
            jwt,
            log_level: env_string("LOG_LEVEL").unwrap_or_else(|| "info".into()),
            log_dir: env_string("LOG_DIR"),
            request_timeout_ms: env_parse("REQUEST_TIMEOUT_MS", 30_000u64)?,
        })
    }

    /// redb file under the working directory
    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("database").join("storefront.redb")
    }

    /// Uploaded payment proofs
    pub fn proofs_dir(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("payment_proofs")
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

/// Load the JWT key
///
/// `JWT_SECRET` is mandatory in production; development falls back to a
/// temporary random key.
fn load_jwt_secret(production: bool) -> Result<String, ServerError> {
    match env_string("JWT_SECRET") {
        Some(secret) if secret.len() < 32 => Err(ServerError::Config(
            "JWT_SECRET must be at least 32 characters long".into(),
        )),
        Some(secret) => Ok(secret),
        None if production => Err(ServerError::Config(
            "JWT_SECRET environment variable must be set in production".into(),
        )),
        None => {
            tracing::warn!("JWT_SECRET not set, generating a temporary key for development");
            generate_printable_secret().map_err(|e| ServerError::Config(e.to_string()))
        }
    }
}

/// Webhook HMAC secret
///
/// In production an enabled gateway without a secret would accept unsigned
/// notifications, so startup fails instead.
fn check_webhook_secret(
    secret: Option<String>,
    gateway_enabled: bool,
    production: bool,
) -> Result<Option<String>, ServerError> {
    match secret {
        Some(secret) => Ok(Some(secret)),
        None if gateway_enabled && production => Err(ServerError::Config(
            "GATEWAY_WEBHOOK_SECRET must be set in production when GATEWAY_URL is set".into(),
        )),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_webhook_secret_required_in_production_with_gateway() {
        let err = check_webhook_secret(None, true, true).unwrap_err();
        assert!(matches!(err, ServerError::Config(ref msg) if msg.contains("GATEWAY_WEBHOOK_SECRET")));
    }

    #[test]
    fn test_webhook_secret_optional_elsewhere() {
        assert_eq!(check_webhook_secret(None, false, true).unwrap(), None);
        assert_eq!(check_webhook_secret(None, true, false).unwrap(), None);
        assert_eq!(
            check_webhook_secret(Some("s3cret".into()), true, true).unwrap(),
            Some("s3cret".to_string())
        );
    }
}
