use duka_common::Money;
use serde::{Deserialize, Serialize};

/// "Buy `buy`, get `free` free"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Promotion {
    pub buy: u32,
    pub free: u32,
}

impl Promotion {
    /// How many of `quantity` units are free under this promotion. Each complete group of `buy + free` units yields
    /// `free` free units.
    pub fn free_units(&self, quantity: u32) -> u32 {
        let group = self.buy + self.free;
        if self.buy == 0 || self.free == 0 {
            return 0;
        }
        (quantity / group) * self.free
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub price: Money,
    /// The list price before any discount. Defaults to `price`.
    #[serde(default)]
    pub original_price: Option<Money>,
    #[serde(default)]
    pub promo: Option<Promotion>,
    #[serde(default = "in_stock_default")]
    pub in_stock: bool,
}

fn in_stock_default() -> bool {
    true
}

impl Product {
    pub fn original_price(&self) -> Money {
        self.original_price.unwrap_or(self.price)
    }
}

/// Product lookup as consumed by order creation. Prices always come from here, never from the client.
pub trait ProductCatalog {
    fn product(&self, product_id: &str) -> Option<Product>;

    /// The delivery fee for the given region
    fn shipping_fee(&self, region: &str) -> Money;
}
