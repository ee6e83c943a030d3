use actix_web::{http::StatusCode, test::TestRequest};
use duka_engine::{
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    SqliteDatabase,
};

use super::helpers::{admin, apis_with, as_f64, idle_gateway, order_body, payment_body, send, ADMIN_SECRET, PHONE};

async fn sqlite_apis() -> super::helpers::TestApis<SqliteDatabase> {
    let url = random_db_path();
    prepare_test_env(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating connection to database");
    apis_with(db, idle_gateway())
}

#[actix_web::test]
async fn order_life_cycle_on_sqlite() {
    let apis = sqlite_apis().await;
    let req = TestRequest::post().uri("/orders").set_json(order_body("kanga-01", 3, "cash_on_delivery"));
    let (status, placed, _) = send(&apis, ADMIN_SECRET, req).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(as_f64(&placed["total"]), 50_000.0);
    let order_id = placed["id"].as_str().unwrap().to_string();

    let req =
        TestRequest::post().uri(&format!("/orders/{order_id}/payments")).set_json(payment_body(20_000, "bank_deposit"));
    let (status, deposit, _) = send(&apis, ADMIN_SECRET, req).await;
    assert_eq!(status, StatusCode::CREATED);
    let payment_id = deposit["payment"]["id"].as_str().unwrap();

    let req = admin(TestRequest::post().uri(&format!("/admin/payments/{payment_id}/confirm")));
    let (status, confirmed, _) = send(&apis, ADMIN_SECRET, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(confirmed["summary"]["paymentStatus"], "partial");

    let req = TestRequest::get().uri(&format!("/account/orders?phone=255653670590&order={order_id}"));
    let (status, body, _) = send(&apis, ADMIN_SECRET, req).await;
    assert_eq!(status, StatusCode::OK);
    let order = &body["orders"][0];
    assert_eq!(order["phone"], PHONE);
    assert_eq!(as_f64(&order["amountPaid"]), 20_000.0);
    assert_eq!(as_f64(&order["balanceDue"]), 30_000.0);
    assert_eq!(order["orderItems"][0]["freeQuantity"], 1);
    assert_eq!(order["payments"].as_array().unwrap().len(), 1);

    for next in ["confirmed", "delivered"] {
        let body = serde_json::json!({ "status": next });
        let req = admin(TestRequest::patch().uri(&format!("/orders/{order_id}")).set_json(body));
        let (status, _, _) = send(&apis, ADMIN_SECRET, req).await;
        assert_eq!(status, StatusCode::OK);
    }
    let review = serde_json::json!({ "phone": PHONE, "rating": 4 });
    let req = TestRequest::post().uri(&format!("/orders/{order_id}/review")).set_json(review.clone());
    let (status, _, _) = send(&apis, ADMIN_SECRET, req).await;
    assert_eq!(status, StatusCode::CREATED);
    let req = TestRequest::post().uri(&format!("/orders/{order_id}/review")).set_json(review);
    let (status, _, _) = send(&apis, ADMIN_SECRET, req).await;
    assert_eq!(status, StatusCode::CONFLICT);
}
