use chrono::{DateTime, Utc};

use reckon_catalog::{Catalog, PricingEngine};
use reckon_ledger::Deltas;
use reckon_shared::{Order, Package};

/// Why a client-submitted order was rejected. Any mismatch rejects the
/// whole order; partial acceptance is not permitted.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum InvalidOrder {
    #[error("We don't sell one of those")]
    UnknownKind,

    #[error("Wrong price")]
    WrongPrice,

    #[error("Wrong discount")]
    WrongDiscount,

    #[error("Computed subtotal is wrong")]
    WrongSubtotal,

    #[error("Tax rate is wrong")]
    WrongVatRate,

    #[error("VAT calculation is wrong")]
    WrongVat,

    #[error("Total calculation is wrong")]
    WrongTotal,
}

/// Recompute every figure in a client-submitted order against the
/// current catalog and package, requiring exact integer equality.
/// Nothing from the client side is trusted.
pub fn verify_order(
    order: &Order,
    catalog: &Catalog,
    package: Option<&Package>,
    vat_rate: f64,
    now: DateTime<Utc>,
) -> Result<(), InvalidOrder> {
    let pricing = PricingEngine::new();
    let mut subtotal: i64 = 0;

    for item in &order.items {
        let product = catalog.get(item.kind).ok_or(InvalidOrder::UnknownKind)?;

        let p = pricing.price(product, item.quantity, package, now);

        if item.amount != p.price {
            return Err(InvalidOrder::WrongPrice);
        }

        if item.discount != p.discount {
            return Err(InvalidOrder::WrongDiscount);
        }

        subtotal += item.amount;
    }

    if subtotal != order.subtotal {
        return Err(InvalidOrder::WrongSubtotal);
    }

    // The tolerance absorbs float round-tripping through the client,
    // nothing more.
    if (order.vat_rate - vat_rate).abs() > 0.00005 {
        return Err(InvalidOrder::WrongVatRate);
    }

    let vat = (subtotal as f64 * order.vat_rate).round() as i64;

    if vat != order.vat {
        return Err(InvalidOrder::WrongVat);
    }

    if subtotal + vat != order.total {
        return Err(InvalidOrder::WrongTotal);
    }

    Ok(())
}

/// The balance change an order represents: per-kind summed quantities.
/// Prices play no part here.
pub fn order_deltas(order: &Order) -> Deltas {
    let mut deltas = Deltas::new();
    for item in &order.items {
        *deltas.entry(item.kind).or_insert(0) += item.quantity;
    }
    deltas
}
