use serde::{Deserialize, Serialize};

use reckon_shared::FilingKind;

/// A purchasable filing credit product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub kind: FilingKind,
    pub description: String,
    /// Price of a single credit, minor currency units.
    pub unit_price: i64,
    /// Per-unit geometric volume discount, 0 < f <= 1.
    pub discount_factor: f64,
    /// Maximum balance a user may hold for this kind.
    pub permitted: i64,
    pub min_purchase: i64,
}

/// The product catalog. An immutable configuration value injected into
/// every component that prices or caps credits; there is no process-wide
/// mutable pricing state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    products: Vec<Product>,
}

impl Catalog {
    pub fn new(products: Vec<Product>) -> Self {
        Self { products }
    }

    pub fn get(&self, kind: FilingKind) -> Option<&Product> {
        self.products.iter().find(|p| p.kind == kind)
    }

    pub fn permitted(&self, kind: FilingKind) -> i64 {
        self.get(kind).map(|p| p.permitted).unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Product> {
        self.products.iter()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new(vec![
            Product {
                kind: FilingKind::Vat,
                description: "VAT return".to_string(),
                unit_price: 650,
                discount_factor: 0.995,
                permitted: 10,
                min_purchase: 1,
            },
            Product {
                kind: FilingKind::Corptax,
                description: "Corp. tax filing".to_string(),
                unit_price: 1450,
                discount_factor: 0.995,
                permitted: 4,
                min_purchase: 1,
            },
            Product {
                kind: FilingKind::Accounts,
                description: "Accounts filing".to_string(),
                unit_price: 950,
                discount_factor: 0.995,
                permitted: 4,
                min_purchase: 1,
            },
        ])
    }
}
