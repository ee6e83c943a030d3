use actix_web::{http::StatusCode, test::TestRequest};
use duka_engine::MemoryStore;
use serde_json::{json, Value};

use super::helpers::{admin, as_f64, idle_gateway, memory_apis, order_body, send, TestApis, ADMIN_SECRET, PHONE};
use crate::middleware::ADMIN_SECRET_HEADER;

async fn place_order(apis: &TestApis<MemoryStore>, product_id: &str) -> String {
    let req = TestRequest::post().uri("/orders").set_json(order_body(product_id, 1, "cash_on_delivery"));
    let (status, body, _) = send(apis, ADMIN_SECRET, req).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["id"].as_str().unwrap().to_string()
}

async fn patch(apis: &TestApis<MemoryStore>, order_id: &str, body: Value) -> (StatusCode, Value) {
    let req = admin(TestRequest::patch().uri(&format!("/orders/{order_id}")).set_json(body));
    let (status, body, _) = send(apis, ADMIN_SECRET, req).await;
    (status, body)
}

#[actix_web::test]
async fn admin_routes_require_the_secret() {
    let apis = memory_apis(idle_gateway());
    let order_id = place_order(&apis, "dress-01").await;
    let requests = || {
        [
            TestRequest::patch().uri(&format!("/orders/{order_id}")).set_json(json!({ "status": "confirmed" })),
            TestRequest::post().uri("/admin/payments/PAY-1/confirm"),
            TestRequest::get().uri("/admin/orders"),
            TestRequest::get().uri(&format!("/admin/orders/{order_id}")),
        ]
    };
    for req in requests() {
        let (status, body, _) = send(&apis, ADMIN_SECRET, req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["error"].is_string());
    }
    for req in requests() {
        let req = req.insert_header((ADMIN_SECRET_HEADER, "nazi-na-ndizi"));
        let (status, _, _) = send(&apis, ADMIN_SECRET, req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
    // An unconfigured secret locks everyone out, even a request carrying an empty header
    for req in requests() {
        let req = req.insert_header((ADMIN_SECRET_HEADER, ""));
        let (status, _, _) = send(&apis, "", req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
    let (status, body, _) = send(&apis, ADMIN_SECRET, admin(TestRequest::get().uri("/admin/orders"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["status"], "pending");
}

#[actix_web::test]
async fn fulfilment_status_changes() {
    let apis = memory_apis(idle_gateway());
    let order_id = place_order(&apis, "dress-01").await;

    let (status, _) = patch(&apis, &order_id, json!({ "status": "delivered" })).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, order) = patch(&apis, &order_id, json!({ "status": "confirmed" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], "confirmed");
    assert_eq!(order["id"], order_id.as_str());

    let (status, _) = patch(&apis, &order_id, json!({ "status": "confirmed" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = patch(&apis, &order_id, json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = patch(&apis, &order_id, json!({ "paymentStatus": "partial" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = patch(&apis, "DK-20240101-NOPE", json!({ "status": "confirmed" })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, order) = patch(&apis, &order_id, json!({ "status": "cancelled" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], "cancelled");
    let (status, order) = patch(&apis, &order_id, json!({ "status": "pending" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], "pending");
}

#[actix_web::test]
async fn shipping_adjustments_and_manual_settlement() {
    let apis = memory_apis(idle_gateway());
    let order_id = place_order(&apis, "dress-01").await;

    let (status, order) = patch(&apis, &order_id, json!({ "shippingAdjustment": 7500 })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(as_f64(&order["total"]), 57_500.0);
    assert_eq!(as_f64(&order["balanceDue"]), 57_500.0);

    let (status, _) = patch(&apis, &order_id, json!({ "shippingAdjustment": -60000 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, order) = patch(&apis, &order_id, json!({ "paymentStatus": "paid" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["paymentStatus"], "paid");
    assert_eq!(as_f64(&order["amountPaid"]), 57_500.0);
    assert_eq!(as_f64(&order["balanceDue"]), 0.0);

    let (status, _) = patch(&apis, &order_id, json!({ "paymentStatus": "paid" })).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let req = admin(TestRequest::get().uri(&format!("/admin/orders/{order_id}")));
    let (status, order, _) = send(&apis, ADMIN_SECRET, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["paymentStatus"], "paid");
    assert_eq!(as_f64(&order["shippingAdjustment"]), 7_500.0);

    let req = admin(TestRequest::get().uri("/admin/orders/DK-20240101-NOPE"));
    let (status, _, _) = send(&apis, ADMIN_SECRET, req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn admin_order_search() {
    let apis = memory_apis(idle_gateway());
    let unpaid = place_order(&apis, "dress-01").await;
    let settled = place_order(&apis, "shuka-01").await;
    let (status, _) = patch(&apis, &settled, json!({ "paymentStatus": "paid", "status": "confirmed" })).await;
    assert_eq!(status, StatusCode::OK);

    let search = |query: &str| admin(TestRequest::get().uri(&format!("/admin/orders{query}")));
    let (status, body, _) = send(&apis, ADMIN_SECRET, search("?payment_status=unpaid")).await;
    assert_eq!(status, StatusCode::OK);
    let orders = body.as_array().unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0]["id"], unpaid.as_str());

    let (_, body, _) = send(&apis, ADMIN_SECRET, search("?status=confirmed,delivered")).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["id"], settled.as_str());

    let (_, body, _) = send(&apis, ADMIN_SECRET, search("?phone=0653670590")).await;
    assert!(body.as_array().unwrap().is_empty());
    let (_, body, _) = send(&apis, ADMIN_SECRET, search("?phone=255653670590")).await;
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (status, _, _) = send(&apis, ADMIN_SECRET, search("?status=shipped")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn reviews_after_delivery() {
    let apis = memory_apis(idle_gateway());
    let order_id = place_order(&apis, "kanga-01").await;
    let review = json!({ "phone": PHONE, "rating": 5, "comment": "Kanga nzuri sana" });
    let submit = |body: Value| TestRequest::post().uri(&format!("/orders/{order_id}/review")).set_json(body);

    let (status, _, _) = send(&apis, ADMIN_SECRET, submit(review.clone())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    for next in ["confirmed", "delivered"] {
        let (status, _) = patch(&apis, &order_id, json!({ "status": next })).await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, _, _) = send(&apis, ADMIN_SECRET, submit(json!({ "phone": "0713000111", "rating": 4 }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _, _) = send(&apis, ADMIN_SECRET, submit(json!({ "phone": PHONE, "rating": 6 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body, _) = send(&apis, ADMIN_SECRET, submit(review.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["productId"], "kanga-01");
    assert_eq!(body["customerName"], "Amina Juma");
    assert_eq!(body["rating"], 5);

    let (status, _, _) = send(&apis, ADMIN_SECRET, submit(review)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body, _) = send(&apis, ADMIN_SECRET, TestRequest::get().uri("/products/kanga-01/reviews")).await;
    assert_eq!(status, StatusCode::OK);
    let reviews = body.as_array().unwrap();
    assert_eq!(reviews.len(), 1);
    assert_eq!(reviews[0]["comment"], "Kanga nzuri sana");

    let (_, body, _) = send(&apis, ADMIN_SECRET, TestRequest::get().uri("/products/dress-01/reviews")).await;
    assert!(body.as_array().unwrap().is_empty());
}
