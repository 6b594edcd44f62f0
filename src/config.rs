use std::env;

/// Per-provider credentials, sourced from the environment at startup and
/// read-only afterwards. Every field is optional: absence selects the
/// sandbox / no-verification fallback paths instead of failing startup.
#[derive(Debug, Clone, Default)]
pub struct JazzCashCredentials {
    pub merchant_id: Option<String>,
    pub password: Option<String>,
    pub integrity_salt: Option<String>,
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct EasyPaisaCredentials {
    pub store_id: Option<String>,
    pub hash_key: Option<String>,
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PaddleCredentials {
    pub vendor_id: Option<String>,
    pub vendor_auth_code: Option<String>,
    /// PEM-encoded RSA public key used to verify webhook signatures.
    pub public_key_pem: Option<String>,
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct StripeCredentials {
    pub secret_key: Option<String>,
    pub webhook_secret: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// SQLite file path; when unset the ledger runs in-memory (non-durable).
    pub database_path: Option<String>,
    /// Shared-secret bearer token for admin endpoints. When unset, admin
    /// endpoints are open (development mode).
    pub admin_api_key: Option<String>,
    /// Timeout for outbound provider API calls, in seconds.
    pub http_timeout_secs: u64,
    /// Requests per minute on the checkout-creation endpoint.
    pub checkout_rate_limit_rpm: u32,
    pub dev_mode: bool,

    pub jazzcash: JazzCashCredentials,
    pub easypaisa: EasyPaisaCredentials,
    pub paddle: PaddleCredentials,
    pub stripe: StripeCredentials,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let dev_mode = env::var("TALLY_ENV")
            .map(|v| v == "dev" || v == "development")
            .unwrap_or(false);

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        Self {
            host,
            port,
            database_path: env::var("DATABASE_PATH").ok(),
            admin_api_key: env::var("TALLY_ADMIN_API_KEY").ok().filter(|k| !k.is_empty()),
            http_timeout_secs: env::var("HTTP_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
            checkout_rate_limit_rpm: env::var("RATE_LIMIT_CHECKOUT_RPM")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
            dev_mode,
            jazzcash: JazzCashCredentials {
                merchant_id: env::var("JAZZCASH_MERCHANT_ID").ok(),
                password: env::var("JAZZCASH_PASSWORD").ok(),
                integrity_salt: env::var("JAZZCASH_INTEGRITY_SALT").ok(),
                endpoint: env::var("JAZZCASH_ENDPOINT").ok(),
            },
            easypaisa: EasyPaisaCredentials {
                store_id: env::var("EASYPAISA_STORE_ID").ok(),
                hash_key: env::var("EASYPAISA_HASH_KEY").ok(),
                endpoint: env::var("EASYPAISA_ENDPOINT").ok(),
            },
            paddle: PaddleCredentials {
                vendor_id: env::var("PADDLE_VENDOR_ID").ok(),
                vendor_auth_code: env::var("PADDLE_VENDOR_AUTH_CODE").ok(),
                public_key_pem: env::var("PADDLE_PUBLIC_KEY").ok(),
                endpoint: env::var("PADDLE_ENDPOINT").ok(),
            },
            stripe: StripeCredentials {
                secret_key: env::var("STRIPE_SECRET_KEY").ok(),
                webhook_secret: env::var("STRIPE_WEBHOOK_SECRET").ok(),
            },
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
