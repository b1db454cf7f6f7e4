use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub app: AppSettings,
    pub database: DatabaseSettings,
    pub dashboard: DashboardSettings,
    pub health: HealthSettings,
    pub session: SessionSettings,
    pub twilio: TwilioSettings,
    pub redis: RedisSettings,
    pub checkins: CheckInSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppSettings {
    pub host: String,
    pub port: u16,
    pub upload_dir: String,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseSettings {
    /// Unset means the service runs without a datastore and reports
    /// "not configured" from every route that needs one.
    pub url: Option<String>,
    pub name: String,
    pub max_pool_size: Option<u32>,
    pub min_pool_size: Option<u32>,
    pub server_selection_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DashboardSettings {
    /// IANA zone used to decide which calendar day "today" is.
    pub timezone: String,
    pub query_timeout_ms: u64,
    pub stat_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HealthSettings {
    pub overall_budget_ms: u64,
    pub ping_timeout_ms: u64,
    pub stale_after_days: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionSettings {
    pub secret: String,
    pub cookie_name: String,
    pub ttl_secs: u64,
    pub issuer: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TwilioSettings {
    pub auth_token: String,
    pub from_number: String,
    /// Externally visible origin the provider signs webhook URLs against.
    pub public_base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisSettings {
    pub url: Option<String>,
    pub outbound_queue: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CheckInSettings {
    pub sweep_enabled: bool,
    pub sweep_cron: String,
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::default()
                    .separator("__")
                    .prefix("BAILBOOK"),
            )
            .set_default("app.host", "0.0.0.0")?
            .set_default("app.port", 5000)?
            .set_default("app.upload_dir", "server/uploads")?
            .set_default("app.cors_origins", Vec::<String>::new())?
            .set_default("database.url", None::<String>)?
            .set_default("database.name", "warrantdb")?
            .set_default("database.server_selection_timeout_ms", 5000)?
            .set_default("dashboard.timezone", "America/Chicago")?
            .set_default("dashboard.query_timeout_ms", 3000)?
            .set_default("dashboard.stat_timeout_ms", 1500)?
            .set_default("health.overall_budget_ms", 4000)?
            .set_default("health.ping_timeout_ms", 1500)?
            .set_default("health.stale_after_days", 3)?
            .set_default("session.secret", "change-me-in-production")?
            .set_default("session.cookie_name", "__asap_session")?
            .set_default("session.ttl_secs", 60 * 60 * 24 * 14)?
            .set_default("session.issuer", "bailbook")?
            .set_default("twilio.auth_token", "")?
            .set_default("twilio.from_number", "")?
            .set_default("twilio.public_base_url", "")?
            .set_default("redis.url", None::<String>)?
            .set_default("redis.outbound_queue", "bailbook:sms:outbound")?
            .set_default("checkins.sweep_enabled", true)?
            .set_default("checkins.sweep_cron", "0 * * * * *")?
            // Flat variable names still used by existing deployments.
            .set_override_option("database.url", legacy_env("MONGO_URI"))?
            .set_override_option("database.name", legacy_env("MONGO_DB"))?
            .set_override_option("dashboard.timezone", legacy_env("DASHBOARD_TZ"))?
            .set_override_option(
                "health.overall_budget_ms",
                legacy_env("HEALTH_OVERALL_BUDGET_MS"),
            )?
            .set_override_option("app.upload_dir", legacy_env("UPLOAD_DIR"))?
            .set_override_option("session.secret", legacy_env("SESSION_SECRET"))?
            .set_override_option("twilio.auth_token", legacy_env("TWILIO_AUTH_TOKEN"))?
            .set_override_option("twilio.from_number", legacy_env("TWILIO_FROM_NUMBER"))?
            .set_override_option("twilio.public_base_url", legacy_env("PUBLIC_BASE_URL"))?
            .set_override_option("redis.url", legacy_env("REDIS_URL"))?
            .build()?;

        config.try_deserialize()
    }
}

fn legacy_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
