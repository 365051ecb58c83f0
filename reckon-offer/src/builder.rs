use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::models::{KindOffer, Offer, OfferLine};
use reckon_catalog::{Catalog, PricingEngine};
use reckon_shared::{CreditBalance, Package};

/// Builds the purchasable-quantity/price table for a user. Pure: reads
/// the catalog, the user's balance and package, writes nothing, so it is
/// safe to call on every request.
#[derive(Debug, Clone)]
pub struct OfferBuilder {
    catalog: Catalog,
    pricing: PricingEngine,
}

impl OfferBuilder {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog,
            pricing: PricingEngine::new(),
        }
    }

    pub fn build(
        &self,
        balance: &CreditBalance,
        package: Option<&Package>,
        vat_rate: f64,
        now: DateTime<Utc>,
    ) -> Offer {
        let mut offer = HashMap::new();

        let discount = package.and_then(|p| p.active_discount(now));

        for product in self.catalog.iter() {
            let remaining = (product.permitted - balance.get(product.kind)).max(0);

            // Already at the cap, nothing to sell.
            if remaining == 0 {
                continue;
            }

            let quantities =
                std::iter::once(0).chain(product.min_purchase..=remaining);

            let ladder = quantities
                .map(|quantity| {
                    let p = self.pricing.price(product, quantity, package, now);
                    OfferLine {
                        quantity,
                        price: p.price,
                        discount: p.discount,
                    }
                })
                .collect();

            let adjustment = discount
                .map(|d| d.get(product.kind))
                .filter(|rate| *rate > 0.0)
                .zip(package)
                .map(|(rate, pkg)| format!("{} {}%", pkg.id, (100.0 * rate) as i64));

            offer.insert(
                product.kind,
                KindOffer {
                    description: product.description.clone(),
                    permitted: remaining,
                    min_purchase: product.min_purchase,
                    offer: ladder,
                    adjustment,
                },
            );
        }

        Offer { offer, vat_rate }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reckon_shared::{FilingKind, Referrals};

    fn builder() -> OfferBuilder {
        OfferBuilder::new(Catalog::default())
    }

    #[test]
    fn ladder_runs_from_zero_to_remaining() {
        let offer = builder().build(&CreditBalance::default(), None, 0.2, Utc::now());

        let vat = &offer.offer[&FilingKind::Vat];
        assert_eq!(vat.permitted, 10);
        // {0} then 1..=10
        assert_eq!(vat.offer.len(), 11);
        assert_eq!(vat.offer[0].quantity, 0);
        assert_eq!(vat.offer[0].price, 0);
        assert_eq!(vat.offer[3].quantity, 3);
        assert_eq!(vat.offer[3].price, 1930);
        assert_eq!(vat.offer[3].discount, 20);
        assert_eq!(offer.vat_rate, 0.2);
    }

    #[test]
    fn existing_balance_shrinks_the_ladder() {
        let mut balance = CreditBalance::default();
        balance.set(FilingKind::Vat, 8);

        let offer = builder().build(&balance, None, 0.2, Utc::now());
        let vat = &offer.offer[&FilingKind::Vat];
        assert_eq!(vat.permitted, 2);
        assert_eq!(vat.offer.last().unwrap().quantity, 2);
    }

    #[test]
    fn kind_at_capacity_is_omitted() {
        let mut balance = CreditBalance::default();
        balance.set(FilingKind::Corptax, 4);

        let offer = builder().build(&balance, None, 0.2, Utc::now());
        assert!(!offer.offer.contains_key(&FilingKind::Corptax));
        assert!(offer.offer.contains_key(&FilingKind::Vat));
    }

    #[test]
    fn package_discount_is_annotated() {
        let now = Utc::now();
        let pkg = Referrals::new().get_package("LAUNCHPAD", now).unwrap();

        let offer = builder().build(&CreditBalance::default(), Some(&pkg), 0.2, now);
        let vat = &offer.offer[&FilingKind::Vat];
        assert_eq!(vat.adjustment.as_deref(), Some("LAUNCHPAD 20%"));
        // round(0.2 * 1930) knocked off the already-discounted batch price
        assert_eq!(vat.offer[3].price, 1930 - 386);
    }

    #[test]
    fn standard_package_is_unannotated() {
        let now = Utc::now();
        let pkg = Referrals::new().default_package(now);

        let offer = builder().build(&CreditBalance::default(), Some(&pkg), 0.2, now);
        assert!(offer.offer[&FilingKind::Vat].adjustment.is_none());
    }
}
