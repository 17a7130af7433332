use std::env;

const PAYPAL_LIVE_API: &str = "https://api-m.paypal.com";
const PAYPAL_SANDBOX_API: &str = "https://api-m.sandbox.paypal.com";

/// PayPal REST credentials and webhook registration.
#[derive(Debug, Clone, Default)]
pub struct PayPalConfig {
    pub api_base: String,
    pub client_id: Option<String>,
    pub secret: Option<String>,
    /// Webhook id registered with PayPal. Without it no delivery can be verified.
    pub webhook_id: Option<String>,
}

impl PayPalConfig {
    pub fn sandbox() -> Self {
        Self {
            api_base: PAYPAL_SANDBOX_API.to_string(),
            ..Default::default()
        }
    }

    pub fn has_credentials(&self) -> bool {
        self.client_id.is_some() && self.secret.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    /// Public origin of the fund site, used for PayPal return URLs and redirects.
    pub site_url: String,
    pub auth_login_url: String,
    pub session_secret: Option<String>,
    pub default_campaign_slug: String,
    pub paypal: PayPalConfig,
    pub dev_mode: bool,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let dev_mode = env::var("FUND_ENV")
            .map(|v| v == "dev" || v == "development")
            .unwrap_or(false);

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        let site_url = env::var("SITE_URL")
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or_else(|_| format!("http://{}:{}", host, port));

        let paypal_env = env::var("PAYPAL_ENV")
            .unwrap_or_else(|_| "sandbox".to_string())
            .to_lowercase();
        let api_base = env::var("PAYPAL_API_BASE").unwrap_or_else(|_| {
            if paypal_env == "live" {
                PAYPAL_LIVE_API.to_string()
            } else {
                PAYPAL_SANDBOX_API.to_string()
            }
        });

        Self {
            host,
            port,
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "hempin_fund.db".to_string()),
            site_url,
            auth_login_url: env::var("AUTH_LOGIN_URL")
                .unwrap_or_else(|_| "https://auth.hempin.org/login".to_string()),
            session_secret: env::var("SESSION_JWT_SECRET").ok().filter(|s| !s.is_empty()),
            default_campaign_slug: env::var("DEFAULT_CAMPAIGN_SLUG")
                .unwrap_or_else(|_| "hempin-launch".to_string()),
            paypal: PayPalConfig {
                api_base: api_base.trim_end_matches('/').to_string(),
                client_id: env::var("PAYPAL_CLIENT_ID").ok().filter(|s| !s.is_empty()),
                secret: env::var("PAYPAL_SECRET").ok().filter(|s| !s.is_empty()),
                webhook_id: env::var("PAYPAL_WEBHOOK_ID").ok().filter(|s| !s.is_empty()),
            },
            dev_mode,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
