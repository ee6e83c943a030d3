//! A product catalog loaded from a JSON file.
//!
//! ```json
//! {
//!   "products": [
//!     { "id": "kanga-01", "name": "Kanga ya Pwani", "price": 25000, "promo": { "buy": 2, "free": 1 } }
//!   ],
//!   "shipping": { "default": 10000, "regions": { "Dar es Salaam": 5000 } }
//! }
//! ```
use std::{collections::HashMap, path::Path};

use duka_common::Money;
use log::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::traits::{Product, ProductCatalog};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Could not read the catalog file: {0}")]
    Io(#[from] std::io::Error),
    #[error("The catalog file is not valid: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShippingTable {
    #[serde(default)]
    pub default: Money,
    /// Keyed by region name. Lookups are case-insensitive.
    #[serde(default)]
    pub regions: HashMap<String, Money>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    products: Vec<Product>,
    #[serde(default)]
    shipping: ShippingTable,
}

#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    products: HashMap<String, Product>,
    shipping: ShippingTable,
}

impl StaticCatalog {
    pub fn new(products: Vec<Product>, shipping: ShippingTable) -> Self {
        let products = products.into_iter().map(|p| (p.id.clone(), p)).collect();
        let regions = shipping.regions.into_iter().map(|(k, v)| (k.trim().to_lowercase(), v)).collect();
        Self { products, shipping: ShippingTable { default: shipping.default, regions } }
    }

    pub fn from_json_str(json: &str) -> Result<Self, CatalogError> {
        let file = serde_json::from_str::<CatalogFile>(json)?;
        Ok(Self::new(file.products, file.shipping))
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let catalog = Self::from_json_str(&json)?;
        info!("🛍️ Loaded {} products from {}", catalog.products.len(), path.as_ref().display());
        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

impl ProductCatalog for StaticCatalog {
    fn product(&self, product_id: &str) -> Option<Product> {
        self.products.get(product_id).cloned()
    }

    fn shipping_fee(&self, region: &str) -> Money {
        self.shipping.regions.get(&region.trim().to_lowercase()).copied().unwrap_or(self.shipping.default)
    }
}
