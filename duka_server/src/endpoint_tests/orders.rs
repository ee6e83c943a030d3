use actix_web::{http::StatusCode, test::TestRequest};
use duka_engine::{
    db_types::{OrderId, PaymentStatus},
    traits::{GatewayError, GatewaySettlement, OrderQueryFilter, OrderStore},
};

use super::{
    helpers::{accept_gateway_orders, as_f64, gateway_status, idle_gateway, memory_apis, order_body, send, ADMIN_SECRET},
    mocks::MockGateway,
};

#[actix_web::test]
async fn cash_on_delivery_checkout() {
    let apis = memory_apis(idle_gateway());
    let req = TestRequest::post().uri("/orders").set_json(order_body("dress-01", 2, "cash_on_delivery"));
    let (status, body, _) = send(&apis, ADMIN_SECRET, req).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["result"], "created");
    assert_eq!(body["status"], "pending");
    assert_eq!(body["paymentStatus"], "unpaid");
    assert_eq!(as_f64(&body["total"]), 100_000.0);
    assert!(body["id"].as_str().is_some_and(|id| id.starts_with("DK-")));
}

#[actix_web::test]
async fn promotions_and_shipping_are_priced_on_the_server() {
    let apis = memory_apis(idle_gateway());
    let mut order = order_body("kanga-01", 3, "bank_deposit");
    order["region"] = "Mwanza".into();
    // Client-sent prices are ignored
    order["items"][0]["price"] = 1.into();
    let (status, body, _) = send(&apis, ADMIN_SECRET, TestRequest::post().uri("/orders").set_json(order)).await;
    assert_eq!(status, StatusCode::CREATED);
    // 2 paid kangas plus 10,000 default shipping
    assert_eq!(as_f64(&body["total"]), 60_000.0);
    assert_eq!(body["paymentStatus"], "pending_verification");
}

#[actix_web::test]
async fn invalid_checkouts() {
    let apis = memory_apis(idle_gateway());
    for order in [
        order_body("no-such-product", 1, "cash_on_delivery"),
        order_body("bag-01", 1, "cash_on_delivery"),
        order_body("dress-01", 0, "cash_on_delivery"),
    ] {
        let (status, body, _) = send(&apis, ADMIN_SECRET, TestRequest::post().uri("/orders").set_json(order)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
        assert!(body["error"].is_string());
    }
    let mut order = order_body("dress-01", 1, "cash_on_delivery");
    order["phone"] = "12-34".into();
    let (status, _, _) = send(&apis, ADMIN_SECRET, TestRequest::post().uri("/orders").set_json(order)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let orders = apis.payments.db().search_orders(OrderQueryFilter::default()).await.unwrap();
    assert!(orders.is_empty());
}

#[actix_web::test]
async fn gateway_checkout_returns_redirect() {
    let mut gateway = MockGateway::new();
    accept_gateway_orders(&mut gateway);
    let apis = memory_apis(gateway);
    let req = TestRequest::post().uri("/orders").set_json(order_body("dress-01", 1, "gateway"));
    let (status, body, _) = send(&apis, ADMIN_SECRET, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], "payment_required");
    assert_eq!(body["redirectUrl"], "https://pay.example.com/checkout/TRK-1");
    assert_eq!(body["trackingId"], "TRK-1");
    let order_id = OrderId::from(body["id"].as_str().unwrap());
    let payments = apis.payments.db().fetch_payments_for_order(&order_id).await.unwrap();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].status, PaymentStatus::Pending);
    assert_eq!(payments[0].tracking_id.as_deref(), Some("TRK-1"));
}

#[actix_web::test]
async fn gateway_outage_keeps_the_order() {
    let mut gateway = MockGateway::new();
    gateway.expect_create_order().times(1).returning(|_| Err(GatewayError::Timeout));
    let apis = memory_apis(gateway);
    let req = TestRequest::post().uri("/orders").set_json(order_body("dress-01", 1, "gateway"));
    let (status, body, _) = send(&apis, ADMIN_SECRET, req).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"].as_str().unwrap().contains("did not respond in time"));
    let orders = apis.payments.db().search_orders(OrderQueryFilter::default()).await.unwrap();
    assert_eq!(orders.len(), 1);
    let payments = apis.payments.db().fetch_payments_for_order(&orders[0].id).await.unwrap();
    assert!(payments.is_empty());
}

#[actix_web::test]
async fn account_lookup_reconciles_gateway_payments() {
    let mut gateway = MockGateway::new();
    accept_gateway_orders(&mut gateway);
    gateway
        .expect_transaction_status()
        .withf(|tracking_id| tracking_id == "TRK-1")
        .returning(|_| Ok(gateway_status(GatewaySettlement::Completed, 50_000)));
    let apis = memory_apis(gateway);
    let req = TestRequest::post().uri("/orders").set_json(order_body("dress-01", 1, "gateway"));
    let (_, placed, _) = send(&apis, ADMIN_SECRET, req).await;
    let order_id = placed["id"].as_str().unwrap().to_string();

    // Any formatting of the same number finds the order
    let req = TestRequest::get().uri("/account/orders?phone=255-653-670-590");
    let (status, body, _) = send(&apis, ADMIN_SECRET, req).await;
    assert_eq!(status, StatusCode::OK);
    let orders = body["orders"].as_array().unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0]["id"], order_id.as_str());
    assert_eq!(orders[0]["paymentStatus"], "paid");
    assert_eq!(as_f64(&orders[0]["amountPaid"]), 50_000.0);
    assert_eq!(as_f64(&orders[0]["balanceDue"]), 0.0);
    let payments = orders[0]["payments"].as_array().unwrap();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0]["status"], "paid");
}

#[actix_web::test]
async fn account_lookup_of_another_customers_order() {
    let apis = memory_apis(idle_gateway());
    let req = TestRequest::post().uri("/orders").set_json(order_body("dress-01", 1, "cash_on_delivery"));
    let (_, placed, _) = send(&apis, ADMIN_SECRET, req).await;
    let order_id = placed["id"].as_str().unwrap();

    let req = TestRequest::get().uri(&format!("/account/orders?phone=0713000111&order={order_id}"));
    let (status, _, _) = send(&apis, ADMIN_SECRET, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let req = TestRequest::get().uri("/account/orders?phone=0713000111");
    let (status, body, _) = send(&apis, ADMIN_SECRET, req).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["orders"].as_array().unwrap().is_empty());

    let req = TestRequest::get().uri("/account/orders?phone=12");
    let (status, _, _) = send(&apis, ADMIN_SECRET, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let req = TestRequest::get().uri("/account/orders?phone=255653670590&order=DK-00000000-MISSING");
    let (status, _, _) = send(&apis, ADMIN_SECRET, req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
