use actix_web::{body, http::StatusCode, test, test::TestRequest, web, App};
use duka_common::Money;
use duka_engine::{
    events::EventProducers,
    traits::{
        GatewayOrder,
        GatewaySettlement,
        GatewayTransactionStatus,
        OrderStore,
        PaymentGateway,
    },
    MemoryStore,
    StaticCatalog,
};
use log::debug;
use serde_json::Value;

use super::mocks::MockGateway;
use crate::{
    config::ServerOptions,
    middleware::{AdminSecret, ADMIN_SECRET_HEADER},
    routes::{
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
    server::ServerApis,
};
#[cfg(feature = "pesapal")]
use crate::routes::{GatewayIpnGetRoute, GatewayIpnPostRoute};

pub const PHONE: &str = "+255 653 670 590";
pub const ADMIN_SECRET: &str = "ndizi-na-nazi";
pub const STOREFRONT: &str = "https://duka.example.com";

const CATALOG_JSON: &str = r#"{
  "products": [
    { "id": "dress-01", "name": "Kitenge Dress", "price": 50000, "original_price": 60000 },
    { "id": "kanga-01", "name": "Kanga ya Pwani", "price": 25000, "promo": { "buy": 2, "free": 1 } },
    { "id": "shuka-01", "name": "Maasai Shuka", "price": 70000 },
    { "id": "bag-01", "name": "Ukili Bag", "price": 40000, "in_stock": false }
  ],
  "shipping": { "default": 10000, "regions": { "Dar es Salaam": 5000, "Pickup": 0 } }
}"#;

pub type TestApis<B> = ServerApis<B, MockGateway, StaticCatalog>;

pub fn catalog() -> StaticCatalog {
    StaticCatalog::from_json_str(CATALOG_JSON).expect("Invalid test catalog")
}

pub fn apis_with<B: OrderStore>(db: B, gateway: MockGateway) -> TestApis<B> {
    let _ = env_logger::try_init();
    ServerApis::new(
        db,
        gateway,
        catalog(),
        EventProducers::default(),
        Some(format!("{STOREFRONT}/payments/gateway/callback")),
    )
}

pub fn memory_apis(gateway: MockGateway) -> TestApis<MemoryStore> {
    apis_with(MemoryStore::new(), gateway)
}

/// A gateway that expects no calls at all
pub fn idle_gateway() -> MockGateway {
    let mut gateway = MockGateway::new();
    gateway.expect_create_order().never();
    gateway.expect_transaction_status().never();
    gateway
}

/// Accepts any number of gateway orders, numbering the tracking ids TRK-1, TRK-2, ...
pub fn accept_gateway_orders(gateway: &mut MockGateway) {
    let mut n = 0;
    gateway.expect_create_order().returning(move |req| {
        n += 1;
        let tracking_id = format!("TRK-{n}");
        Ok(GatewayOrder {
            redirect_url: format!("https://pay.example.com/checkout/{tracking_id}"),
            tracking_id,
            merchant_reference: req.merchant_reference,
        })
    });
}

pub fn gateway_status(status: GatewaySettlement, amount: i64) -> GatewayTransactionStatus {
    GatewayTransactionStatus {
        is_paid: status == GatewaySettlement::Completed,
        status,
        amount: Some(Money::from_major_units(amount)),
        merchant_reference: None,
        confirmation_code: None,
        description: None,
    }
}

pub fn order_body(product_id: &str, quantity: u32, method: &str) -> Value {
    serde_json::json!({
        "customerName": "Amina Juma",
        "phone": PHONE,
        "region": "Pickup",
        "address": "Plot 12, Msasani",
        "items": [{ "productId": product_id, "quantity": quantity, "size": "M" }],
        "paymentMethod": method,
    })
}

pub fn payment_body(amount: i64, method: &str) -> Value {
    serde_json::json!({ "phone": PHONE, "amount": amount, "method": method })
}

pub fn admin(req: TestRequest) -> TestRequest {
    req.insert_header((ADMIN_SECRET_HEADER, ADMIN_SECRET))
}

/// Sends a request through an app with every route registered. Errors raised by middleware are rendered the same way
/// the server renders them.
pub async fn send<B, G>(
    apis: &ServerApis<B, G, StaticCatalog>,
    admin_secret: &str,
    req: TestRequest,
) -> (StatusCode, Value, Option<String>)
where
    B: OrderStore + 'static,
    G: PaymentGateway + 'static,
{
    let orders = apis.orders.clone();
    let payments = apis.payments.clone();
    let accounts = apis.accounts.clone();
    let reviews = apis.reviews.clone();
    let app = App::new()
        .app_data(web::Data::new(orders))
        .app_data(web::Data::new(payments))
        .app_data(web::Data::new(accounts))
        .app_data(web::Data::new(reviews))
        .app_data(web::Data::new(ServerOptions { storefront_url: STOREFRONT.to_string() }))
        .app_data(web::Data::new(AdminSecret::new(admin_secret)))
        .service(PlaceOrderRoute::<B, G, StaticCatalog>::new())
        .service(AccountOrdersRoute::<B, G>::new())
        .service(BalancePaymentRoute::<B, G>::new())
        .service(GatewayCallbackRoute::<B, G>::new())
        .service(SubmitReviewRoute::<B>::new())
        .service(ProductReviewsRoute::<B>::new())
        .service(ModifyOrderRoute::<B, G, StaticCatalog>::new())
        .service(ConfirmPaymentRoute::<B, G>::new())
        .service(AdminOrdersRoute::<B, G, StaticCatalog>::new())
        .service(AdminOrderRoute::<B, G, StaticCatalog>::new());
    #[cfg(feature = "pesapal")]
    let app = app.service(GatewayIpnGetRoute::<B, G>::new()).service(GatewayIpnPostRoute::<B, G>::new());
    let service = test::init_service(app).await;
    debug!("Making request");
    let (status, location, bytes) = match test::try_call_service(&service, req.to_request()).await {
        Ok(res) => {
            let status = res.status();
            let location =
                res.headers().get("location").and_then(|v| v.to_str().ok()).map(String::from);
            (status, location, test::read_body(res).await)
        },
        Err(e) => {
            let res = e.error_response();
            let status = res.status();
            (status, None, body::to_bytes(res.into_body()).await.unwrap())
        },
    };
    let json = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap_or(Value::Null) };
    (status, json, location)
}

pub fn as_f64(v: &Value) -> f64 {
    v.as_f64().unwrap_or_else(|| panic!("{v} is not a number"))
}
