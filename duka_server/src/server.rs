use std::{sync::Arc, time::Duration};

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use duka_engine::{
    events::EventProducers,
    traits::{OrderStore, PaymentGateway, ProductCatalog},
    AccountApi,
    MemoryStore,
    OrderFlowApi,
    PaymentFlowApi,
    ReviewApi,
    SqliteDatabase,
    StaticCatalog,
};
use log::*;

#[cfg(not(feature = "pesapal"))]
use crate::integrations::DisabledGateway;
#[cfg(feature = "pesapal")]
use crate::integrations::pesapal::PesapalGateway;
use crate::{
    config::{ServerConfig, ServerOptions},
    errors::ServerError,
    integrations::notifications::create_order_event_handlers,
    middleware::AdminSecret,
    routes::{
        health,
        AccountOrdersRoute,
        AdminOrderRoute,
        AdminOrdersRoute,
        BalancePaymentRoute,
        ConfirmPaymentRoute,
        GatewayCallbackRoute,
        ModifyOrderRoute,
        PlaceOrderRoute,
        ProductReviewsRoute,
        SubmitReviewRoute,
    },
};
#[cfg(feature = "pesapal")]
use crate::routes::{GatewayIpnGetRoute, GatewayIpnPostRoute};

/// The engine APIs that the route handlers use. They are built once and shared by every worker, so that all workers
/// serialize payments through the same per-order locks.
pub struct ServerApis<B, G, C> {
    pub orders: OrderFlowApi<B, G, C>,
    pub payments: PaymentFlowApi<B, G>,
    pub accounts: AccountApi<B, G>,
    pub reviews: ReviewApi<B>,
}

impl<B: Clone, G, C> Clone for ServerApis<B, G, C> {
    fn clone(&self) -> Self {
        Self {
            orders: self.orders.clone(),
            payments: self.payments.clone(),
            accounts: self.accounts.clone(),
            reviews: self.reviews.clone(),
        }
    }
}

impl<B: OrderStore, G, C> ServerApis<B, G, C> {
    pub fn new(db: B, gateway: G, catalog: C, producers: EventProducers, callback_url: Option<String>) -> Self {
        let mut payments = PaymentFlowApi::new(db.clone(), Arc::new(gateway), producers);
        if let Some(url) = callback_url {
            payments = payments.with_callback_url(url);
        }
        let orders = OrderFlowApi::new(payments.clone(), Arc::new(catalog));
        let accounts = AccountApi::new(payments.clone());
        let reviews = ReviewApi::new(db);
        Self { orders, payments, accounts, reviews }
    }
}

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let catalog = load_catalog(&config)?;
    let gateway = create_gateway(&config)?;
    #[cfg(feature = "pesapal")]
    gateway.check_ipn_registration().await;
    let handlers = create_order_event_handlers();
    let producers = handlers.producers();
    handlers.start_handlers();
    let callback_url = gateway_callback_url(&config);
    let srv = if config.database_url.trim().is_empty() {
        warn!("🚀️ Using the in-memory order store. Orders will be lost when the server stops.");
        let apis = ServerApis::new(MemoryStore::new(), gateway, catalog, producers, callback_url);
        create_server_instance(config, apis)?
    } else {
        let db = SqliteDatabase::new_with_url(&config.database_url, config.max_connections)
            .await
            .map_err(|e| ServerError::InitializeError(e.to_string()))?;
        if config.auto_migrate {
            db.run_migrations().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
            info!("🚀️ Database migrations are up to date");
        }
        info!("🚀️ Using the SQLite order store at {}", db.url());
        let apis = ServerApis::new(db, gateway, catalog, producers, callback_url);
        create_server_instance(config, apis)?
    };
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance<B, G, C>(config: ServerConfig, apis: ServerApis<B, G, C>) -> Result<Server, ServerError>
where
    B: OrderStore + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
    C: ProductCatalog + Send + Sync + 'static,
{
    info!("🚀️ Orders are kept in the {} store", apis.payments.db().backend_name());
    let options = ServerOptions::from_config(&config);
    let admin_secret = AdminSecret(config.admin_secret.clone());
    let srv = HttpServer::new(move || {
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("duka::access_log"))
            .app_data(web::Data::new(apis.orders.clone()))
            .app_data(web::Data::new(apis.payments.clone()))
            .app_data(web::Data::new(apis.accounts.clone()))
            .app_data(web::Data::new(apis.reviews.clone()))
            .app_data(web::Data::new(options.clone()))
            .app_data(web::Data::new(admin_secret.clone()));
        let app = app
            .service(health)
            .service(PlaceOrderRoute::<B, G, C>::new())
            .service(AccountOrdersRoute::<B, G>::new())
            .service(BalancePaymentRoute::<B, G>::new())
            .service(GatewayCallbackRoute::<B, G>::new())
            .service(SubmitReviewRoute::<B>::new())
            .service(ProductReviewsRoute::<B>::new())
            .service(ModifyOrderRoute::<B, G, C>::new())
            .service(ConfirmPaymentRoute::<B, G>::new())
            .service(AdminOrdersRoute::<B, G, C>::new())
            .service(AdminOrderRoute::<B, G, C>::new());
        #[cfg(feature = "pesapal")]
        let app = app.service(GatewayIpnGetRoute::<B, G>::new()).service(GatewayIpnPostRoute::<B, G>::new());
        app
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}

fn load_catalog(config: &ServerConfig) -> Result<StaticCatalog, ServerError> {
    match &config.catalog_path {
        Some(path) => StaticCatalog::from_json_file(path)
            .map_err(|e| ServerError::ConfigurationError(format!("Could not load the catalog from {path}. {e}"))),
        None => Ok(StaticCatalog::default()),
    }
}

#[cfg(feature = "pesapal")]
fn create_gateway(config: &ServerConfig) -> Result<PesapalGateway, ServerError> {
    PesapalGateway::new(config.pesapal_config.clone()).map_err(|e| ServerError::InitializeError(e.to_string()))
}

#[cfg(not(feature = "pesapal"))]
fn create_gateway(_config: &ServerConfig) -> Result<DisabledGateway, ServerError> {
    warn!("🚀️ This server was built without payment gateway support. Gateway payments will be refused.");
    Ok(DisabledGateway)
}

#[cfg(feature = "pesapal")]
fn gateway_callback_url(config: &ServerConfig) -> Option<String> {
    config.pesapal_config.callback_url.clone()
}

#[cfg(not(feature = "pesapal"))]
fn gateway_callback_url(_config: &ServerConfig) -> Option<String> {
    None
}
