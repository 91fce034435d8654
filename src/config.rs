use std::{env, str::FromStr, time::Duration};

use anyhow::{Context, bail};
use strum::{AsRefStr, EnumString};

use crate::domain::order::StatusPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, AsRefStr)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum GatewayKind {
    Stub,
    Stripe,
}

#[derive(Debug, Clone)]
pub struct PaymentConfig {
    pub gateway: GatewayKind,
    pub stripe_secret_key: Option<String>,
    pub stripe_api_base: String,
    pub currency: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub jwt_ttl_hours: i64,
    pub status_policy: StatusPolicy,
    pub payment: PaymentConfig,
    pub audit_relay_interval: Duration,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET is not set")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = parsed_or("APP_PORT", 3000u16);
        let jwt_ttl_hours = parsed_or("JWT_TTL_HOURS", 24i64);

        let status_policy = match env::var("ORDER_STATUS_POLICY") {
            Ok(raw) => raw
                .parse::<StatusPolicy>()
                .map_err(|_| anyhow::anyhow!("ORDER_STATUS_POLICY must be strict or legacy"))?,
            Err(_) => StatusPolicy::Strict,
        };

        let gateway = match env::var("PAYMENT_GATEWAY") {
            Ok(raw) => raw.trim().parse::<GatewayKind>().map_err(|_| {
                anyhow::anyhow!("unknown PAYMENT_GATEWAY '{raw}', expected stub or stripe")
            })?,
            Err(_) => GatewayKind::Stub,
        };
        let stripe_secret_key = env::var("STRIPE_SECRET_KEY").ok().filter(|k| !k.is_empty());
        if gateway == GatewayKind::Stripe && stripe_secret_key.is_none() {
            bail!("STRIPE_SECRET_KEY is required when PAYMENT_GATEWAY=stripe");
        }

        let payment = PaymentConfig {
            gateway,
            stripe_secret_key,
            stripe_api_base: env::var("STRIPE_API_BASE")
                .unwrap_or_else(|_| "https://api.stripe.com".to_string()),
            currency: env::var("PAYMENT_CURRENCY").unwrap_or_else(|_| "usd".to_string()),
            timeout: Duration::from_secs(parsed_or("PAYMENT_GATEWAY_TIMEOUT_SECS", 15u64)),
        };

        Ok(Self {
            database_url,
            host,
            port,
            jwt_secret,
            jwt_ttl_hours,
            status_policy,
            payment,
            audit_relay_interval: relay_interval(parsed_or("AUDIT_RELAY_INTERVAL_SECS", 5u64))?,
        })
    }

    /// Configuration used by tests and local tooling: stub gateway, strict statuses.
    pub fn for_database(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            host: "127.0.0.1".to_string(),
            port: 3000,
            jwt_secret: "local-dev-secret".to_string(),
            jwt_ttl_hours: 24,
            status_policy: StatusPolicy::Strict,
            payment: PaymentConfig {
                gateway: GatewayKind::Stub,
                stripe_secret_key: None,
                stripe_api_base: "https://api.stripe.com".to_string(),
                currency: "usd".to_string(),
                timeout: Duration::from_secs(15),
            },
            audit_relay_interval: Duration::from_secs(5),
        }
    }
}

/// The relay ticks on a `tokio::time::interval`, which rejects a zero period.
fn relay_interval(secs: u64) -> anyhow::Result<Duration> {
    if secs == 0 {
        bail!("AUDIT_RELAY_INTERVAL_SECS must be at least 1");
    }
    Ok(Duration::from_secs(secs))
}

fn parsed_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_kind_parses_case_insensitively() {
        assert_eq!("Stripe".parse::<GatewayKind>().unwrap(), GatewayKind::Stripe);
        assert_eq!("STUB".parse::<GatewayKind>().unwrap(), GatewayKind::Stub);
        assert_eq!(GatewayKind::Stripe.as_ref(), "stripe");
        assert!("paypal".parse::<GatewayKind>().is_err());
    }

    #[test]
    fn zero_relay_interval_is_rejected() {
        assert!(relay_interval(0).is_err());
        assert_eq!(relay_interval(5).unwrap(), Duration::from_secs(5));
    }
}
