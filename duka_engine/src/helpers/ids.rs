use chrono::Utc;
use rand::{distributions::Alphanumeric, Rng};

use crate::db_types::OrderId;

/// Generates an opaque order id of the form `DK-<yyyymmdd>-<random>`.
pub fn new_order_id() -> OrderId {
    let date = Utc::now().format("%Y%m%d");
    let suffix: String =
        rand::thread_rng().sample_iter(&Alphanumeric).take(6).map(|c| char::from(c).to_ascii_uppercase()).collect();
    OrderId(format!("DK-{date}-{suffix}"))
}

/// Generates a payment record id. Gateway payments use it as the merchant reference.
pub fn new_payment_id() -> String {
    let bytes: [u8; 8] = rand::thread_rng().gen();
    let hex = bytes.iter().map(|b| format!("{b:02x}")).collect::<String>();
    format!("PAY-{hex}")
}
