use actix_web::{http::StatusCode, test::TestRequest};
use duka_engine::{
    db_types::{OrderId, PaymentStatus},
    traits::{GatewaySettlement, OrderStore},
    MemoryStore,
};
use serde_json::Value;

use super::{
    helpers::{
        accept_gateway_orders,
        admin,
        as_f64,
        gateway_status,
        idle_gateway,
        memory_apis,
        order_body,
        payment_body,
        send,
        TestApis,
        ADMIN_SECRET,
        STOREFRONT,
    },
    mocks::MockGateway,
};

async fn place_order(apis: &TestApis<MemoryStore>, product_id: &str, method: &str) -> Value {
    let req = TestRequest::post().uri("/orders").set_json(order_body(product_id, 1, method));
    let (status, body, _) = send(apis, ADMIN_SECRET, req).await;
    assert!(status.is_success(), "{status}: {body}");
    body
}

async fn pay(apis: &TestApis<MemoryStore>, order_id: &str, body: Value) -> (StatusCode, Value) {
    let req = TestRequest::post().uri(&format!("/orders/{order_id}/payments")).set_json(body);
    let (status, body, _) = send(apis, ADMIN_SECRET, req).await;
    (status, body)
}

async fn confirm(apis: &TestApis<MemoryStore>, payment_id: &str) -> (StatusCode, Value) {
    let req = admin(TestRequest::post().uri(&format!("/admin/payments/{payment_id}/confirm")));
    let (status, body, _) = send(apis, ADMIN_SECRET, req).await;
    (status, body)
}

#[actix_web::test]
async fn installments_until_paid() {
    let apis = memory_apis(idle_gateway());
    let order = place_order(&apis, "shuka-01", "cash_on_delivery").await;
    let order_id = order["id"].as_str().unwrap();
    assert_eq!(as_f64(&order["total"]), 70_000.0);

    let (status, body) = pay(&apis, order_id, payment_body(70_001, "cash_on_delivery")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("70000"), "{body}");

    let (status, deposit) = pay(&apis, order_id, payment_body(30_000, "bank_deposit")).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(deposit["result"], "recorded");
    assert_eq!(deposit["payment"]["status"], "pending_verification");
    assert_eq!(deposit["payment"]["method"], "bank_deposit");
    assert_eq!(deposit["summary"]["paymentStatus"], "pending_verification");
    assert_eq!(as_f64(&deposit["summary"]["amountPaid"]), 0.0);

    // The unconfirmed deposit is reserved against the balance
    let (status, _) = pay(&apis, order_id, payment_body(50_000, "cash_on_delivery")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, confirmed) = confirm(&apis, deposit["payment"]["id"].as_str().unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(confirmed["payment"]["status"], "paid");
    assert_eq!(confirmed["summary"]["paymentStatus"], "partial");
    assert_eq!(as_f64(&confirmed["summary"]["amountPaid"]), 30_000.0);
    assert_eq!(as_f64(&confirmed["summary"]["balanceDue"]), 40_000.0);

    let (status, cash) = pay(&apis, order_id, payment_body(40_000, "cash_on_delivery")).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(cash["payment"]["status"], "pending");
    let (status, confirmed) = confirm(&apis, cash["payment"]["id"].as_str().unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(confirmed["summary"]["paymentStatus"], "paid");
    assert_eq!(as_f64(&confirmed["summary"]["balanceDue"]), 0.0);

    let (status, _) = pay(&apis, order_id, payment_body(1, "cash_on_delivery")).await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Confirming twice changes nothing
    let (status, _) = confirm(&apis, cash["payment"]["id"].as_str().unwrap()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let order = apis.payments.db().fetch_order(&OrderId::from(order_id)).await.unwrap().unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Paid);
    assert!(order.last_payment_at.is_some());
}

#[actix_web::test]
async fn refused_payments() {
    let apis = memory_apis(idle_gateway());
    let order = place_order(&apis, "shuka-01", "cash_on_delivery").await;
    let order_id = order["id"].as_str().unwrap();

    let mut body = payment_body(10_000, "cash_on_delivery");
    body["phone"] = "0713 000 111".into();
    let (status, _) = pay(&apis, order_id, body).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = pay(&apis, "DK-20240101-NOPE", payment_body(10_000, "cash_on_delivery")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = pay(&apis, order_id, payment_body(0, "cash_on_delivery")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = confirm(&apis, "PAY-doesnotexist").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let payments = apis.payments.db().fetch_payments_for_order(&OrderId::from(order_id)).await.unwrap();
    assert!(payments.is_empty());
}

#[actix_web::test]
async fn gateway_balance_payment_and_callback() {
    let mut gateway = MockGateway::new();
    accept_gateway_orders(&mut gateway);
    gateway.expect_transaction_status().returning(|_| Ok(gateway_status(GatewaySettlement::Completed, 70_000)));
    let apis = memory_apis(gateway);
    let order = place_order(&apis, "shuka-01", "cash_on_delivery").await;
    let order_id = order["id"].as_str().unwrap();

    let (status, body) = pay(&apis, order_id, payment_body(70_000, "gateway")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], "payment_required");
    assert_eq!(body["trackingId"], "TRK-1");
    assert_eq!(body["orderId"], order_id);
    let payment_id = body["paymentId"].as_str().unwrap().to_string();

    let uri = format!("/payments/gateway/callback?OrderTrackingId=TRK-1&OrderMerchantReference={payment_id}");
    let (status, _, location) = send(&apis, ADMIN_SECRET, TestRequest::get().uri(&uri)).await;
    assert_eq!(status, StatusCode::FOUND);
    let location = location.expect("redirect location");
    assert!(location.starts_with(&format!("{STOREFRONT}/account?order={order_id}")), "{location}");
    assert!(location.ends_with("payment=paid"), "{location}");

    // Pesapal redelivers the notification. Nothing changes.
    #[cfg(feature = "pesapal")]
    {
        let uri = format!("/payments/gateway/ipn?OrderTrackingId=TRK-1&OrderMerchantReference={payment_id}");
        let (status, ack, _) = send(&apis, ADMIN_SECRET, TestRequest::get().uri(&uri)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ack["status"], 200);
        assert_eq!(ack["orderTrackingId"], "TRK-1");
        assert_eq!(ack["orderNotificationType"], "IPNCHANGE");
    }

    let payments = apis.payments.db().fetch_payments_for_order(&OrderId::from(order_id)).await.unwrap();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].status, PaymentStatus::Paid);
}

#[cfg(feature = "pesapal")]
#[actix_web::test]
async fn failed_gateway_payment() {
    let mut gateway = MockGateway::new();
    accept_gateway_orders(&mut gateway);
    gateway.expect_transaction_status().returning(|_| Ok(gateway_status(GatewaySettlement::Failed, 50_000)));
    let apis = memory_apis(gateway);
    let order = place_order(&apis, "dress-01", "gateway").await;
    let order_id = order["id"].as_str().unwrap();

    let body = serde_json::json!({ "OrderTrackingId": "TRK-1", "OrderNotificationType": "IPNCHANGE" });
    let req = TestRequest::post().uri("/payments/gateway/ipn").set_json(body);
    let (status, ack, _) = send(&apis, ADMIN_SECRET, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["status"], 200);

    let order = apis.payments.db().fetch_order(&OrderId::from(order_id)).await.unwrap().unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Failed);

    // The customer can try again with a fresh gateway payment
    let (status, body) = pay(&apis, order_id, payment_body(50_000, "gateway")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["trackingId"], "TRK-2");
}

#[cfg(feature = "pesapal")]
#[actix_web::test]
async fn unknown_gateway_notifications() {
    let mut gateway = MockGateway::new();
    gateway.expect_transaction_status().returning(|_| Ok(gateway_status(GatewaySettlement::Completed, 1_000)));
    let apis = memory_apis(gateway);

    let body = serde_json::json!({ "OrderTrackingId": "TRK-404", "OrderMerchantReference": "PAY-404" });
    let req = TestRequest::post().uri("/payments/gateway/ipn").set_json(body);
    let (status, ack, _) = send(&apis, ADMIN_SECRET, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["status"], 500);
    assert_eq!(ack["orderMerchantReference"], "PAY-404");

    let req = TestRequest::get().uri("/payments/gateway/callback?OrderTrackingId=TRK-404");
    let (status, _, _) = send(&apis, ADMIN_SECRET, req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let req = TestRequest::get().uri("/payments/gateway/callback?OrderTrackingId=%20");
    let (status, _, _) = send(&apis, ADMIN_SECRET, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
