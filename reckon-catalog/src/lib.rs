pub mod pricing;
pub mod product;

pub use pricing::{purchase_price, ItemPrice, PricingEngine};
pub use product::{Catalog, Product};
