use std::env;

use duka_common::{helpers::parse_boolean_flag, Secret};
use log::*;
#[cfg(feature = "pesapal")]
use pesapal_tools::PesapalConfig;

const DEFAULT_DUKA_HOST: &str = "127.0.0.1";
const DEFAULT_DUKA_PORT: u16 = 8360;
const DEFAULT_MAX_CONNECTIONS: u32 = 25;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// The SQLite URL for the order database. When empty, orders are kept in memory and are lost on restart.
    pub database_url: String,
    pub max_connections: u32,
    /// If true, pending database migrations are applied at startup.
    pub auto_migrate: bool,
    /// The shared secret that admin requests must carry in the `x-admin-secret` header. When empty, every admin
    /// request is rejected.
    pub admin_secret: Secret<String>,
    /// Where customers are sent after returning from the payment gateway, e.g. "https://duka.co.tz"
    pub storefront_url: String,
    /// Path to the JSON product catalog
    pub catalog_path: Option<String>,
    #[cfg(feature = "pesapal")]
    pub pesapal_config: PesapalConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_DUKA_HOST.to_string(),
            port: DEFAULT_DUKA_PORT,
            database_url: String::default(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            auto_migrate: false,
            admin_secret: Secret::default(),
            storefront_url: String::default(),
            catalog_path: None,
            #[cfg(feature = "pesapal")]
            pesapal_config: PesapalConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("DUKA_HOST").ok().unwrap_or_else(|| DEFAULT_DUKA_HOST.into());
        let port = env::var("DUKA_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for DUKA_PORT. {e} Using the default, {DEFAULT_DUKA_PORT}, instead."
                    );
                    DEFAULT_DUKA_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_DUKA_PORT);
        let database_url = env::var("DUKA_DATABASE_URL").ok().unwrap_or_else(|| {
            warn!(
                "🪛️ DUKA_DATABASE_URL is not set. Orders will be kept in memory and WILL BE LOST when the server \
                 stops. Do not run a live shop like this."
            );
            String::default()
        });
        let max_connections = env::var("DUKA_DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| {
                s.parse::<u32>()
                    .map_err(|e| warn!("🪛️ Invalid configuration value for DUKA_DATABASE_MAX_CONNECTIONS. {e}"))
                    .ok()
            })
            .unwrap_or(DEFAULT_MAX_CONNECTIONS);
        let auto_migrate = parse_boolean_flag(env::var("DUKA_AUTO_MIGRATE").ok(), false);
        let admin_secret = env::var("DUKA_ADMIN_SECRET").ok().unwrap_or_else(|| {
            warn!("🪛️ DUKA_ADMIN_SECRET is not set. All admin requests will be rejected.");
            String::default()
        });
        let storefront_url = env::var("DUKA_STOREFRONT_URL").ok().unwrap_or_else(|| {
            info!(
                "🪛️ DUKA_STOREFRONT_URL is not set. Customers returning from the payment gateway will see a JSON \
                 summary instead of being redirected to the shop."
            );
            String::default()
        });
        let catalog_path = env::var("DUKA_CATALOG_PATH").ok().filter(|s| !s.trim().is_empty());
        if catalog_path.is_none() {
            warn!("🪛️ DUKA_CATALOG_PATH is not set. The product catalog is empty and every checkout will be rejected.");
        }
        Self {
            host,
            port,
            database_url,
            max_connections,
            auto_migrate,
            admin_secret: Secret::new(admin_secret),
            storefront_url: storefront_url.trim_end_matches('/').to_string(),
            catalog_path,
            #[cfg(feature = "pesapal")]
            pesapal_config: pesapal_config_from_env(),
        }
    }
}

#[cfg(feature = "pesapal")]
fn pesapal_config_from_env() -> PesapalConfig {
    let config = PesapalConfig::new_from_env_or_default();
    if config.is_configured() {
        info!("🪛️ Pesapal payments are enabled against {}", config.base_url);
    }
    config
}

//-------------------------------------------------  ServerOptions  ----------------------------------------------------
/// A subset of the server configuration that route handlers need. Secrets are deliberately excluded.
#[derive(Clone, Debug, Default)]
pub struct ServerOptions {
    pub storefront_url: String,
}

impl ServerOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self { storefront_url: config.storefront_url.clone() }
    }
}
