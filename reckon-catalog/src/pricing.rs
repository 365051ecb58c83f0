use chrono::{DateTime, Utc};

use crate::product::Product;
use reckon_shared::Package;

/// Volume-discounted batch price: `floor(base * units * discount^(units-1))`.
///
/// The whole batch scales by `discount^(units-1)`; this is not a per-unit
/// application. Floor semantics (not rounding) are load-bearing: the
/// order verifier recomputes this and requires integer equality with
/// client-submitted amounts.
pub fn purchase_price(base: i64, units: i64, discount: f64) -> i64 {
    (base as f64 * units as f64 * discount.powi(units as i32 - 1)).floor() as i64
}

/// A priced quantity of one product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemPrice {
    pub price: i64,
    pub discount: i64,
}

/// Prices catalog products, applying the catalog volume discount first
/// and any unexpired package discount second, on the already-discounted
/// price.
#[derive(Debug, Clone, Default)]
pub struct PricingEngine;

impl PricingEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn price(
        &self,
        product: &Product,
        units: i64,
        package: Option<&Package>,
        now: DateTime<Utc>,
    ) -> ItemPrice {
        let mut price = purchase_price(product.unit_price, units, product.discount_factor);
        let mut discount = product.unit_price * units - price;

        if let Some(d) = package.and_then(|p| p.active_discount(now)) {
            let rate = d.get(product.kind);
            if rate > 0.0 {
                let adj = (rate * price as f64).round() as i64;
                price -= adj;
                discount += adj;
            }
        }

        ItemPrice { price, discount }
    }
}
