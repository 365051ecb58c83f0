use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::kinds::PerKind;

/// The party that referred the user, kept for reporting.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Referrer {
    pub id: String,
    pub name: String,
}

/// An unallocated referral offer: free join-up credits and a time-limited
/// per-kind discount. Allocation stamps an absolute expiry to produce a
/// [`Package`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Referral {
    pub id: String,
    pub referrer: Referrer,
    #[serde(rename = "join-up-credits")]
    pub join_up_credits: PerKind<i64>,
    pub discount: PerKind<f64>,
    pub expiry_days: i64,
}

impl Referral {
    /// Allocate this referral to a user, fixing the expiry relative to now.
    pub fn allocate(&self, now: DateTime<Utc>) -> Package {
        Package {
            id: self.id.clone(),
            referrer: self.referrer.clone(),
            expiry: now + Duration::days(self.expiry_days),
            join_up_credits: self.join_up_credits,
            discount: self.discount,
        }
    }
}

/// A user's current referral package. Exactly one is current at a time;
/// superseded packages are retained as immutable records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Package {
    pub id: String,
    pub referrer: Referrer,
    pub expiry: DateTime<Utc>,
    #[serde(rename = "join-up-credits")]
    pub join_up_credits: PerKind<i64>,
    pub discount: PerKind<f64>,
}

impl Package {
    /// The per-kind discount table, if the package has not expired.
    pub fn active_discount(&self, now: DateTime<Utc>) -> Option<&PerKind<f64>> {
        if self.expiry > now {
            Some(&self.discount)
        } else {
            None
        }
    }
}

/// The static referral table.
pub struct Referrals {
    referrals: Vec<Referral>,
}

impl Referrals {
    pub fn new() -> Self {
        Self {
            referrals: vec![
                Referral {
                    id: "LAUNCHPAD".to_string(),
                    referrer: Referrer {
                        id: "20d07be0-1da0-41e8-ac15-6e950cec36c3".to_string(),
                        name: "Launch beta".to_string(),
                    },
                    join_up_credits: PerKind {
                        vat: 6,
                        corptax: 1,
                        accounts: 1,
                    },
                    discount: PerKind {
                        vat: 0.2,
                        corptax: 0.2,
                        accounts: 0.2,
                    },
                    expiry_days: 712,
                },
                Referral {
                    id: "STANDARD".to_string(),
                    referrer: Referrer {
                        id: "7b6ef04a-03ee-41c2-89a2-df16c1221b2e".to_string(),
                        name: "Standard package".to_string(),
                    },
                    join_up_credits: PerKind::default(),
                    discount: PerKind::default(),
                    expiry_days: 712,
                },
            ],
        }
    }

    pub fn get_referral(&self, id: &str) -> Option<&Referral> {
        self.referrals.iter().find(|r| r.id == id)
    }

    pub fn get_package(&self, id: &str, now: DateTime<Utc>) -> Option<Package> {
        self.get_referral(id).map(|r| r.allocate(now))
    }

    pub fn default_package(&self, now: DateTime<Utc>) -> Package {
        self.get_package("STANDARD", now)
            .unwrap_or_else(|| unreachable!("standard referral is always present"))
    }
}

impl Default for Referrals {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocation_stamps_absolute_expiry() {
        let refs = Referrals::new();
        let now = Utc::now();
        let pkg = refs.get_package("LAUNCHPAD", now).unwrap();
        assert_eq!(pkg.expiry, now + Duration::days(712));
        assert!(pkg.active_discount(now).is_some());
        assert!(pkg.active_discount(now + Duration::days(713)).is_none());
    }

    #[test]
    fn standard_package_has_no_discount() {
        let refs = Referrals::new();
        let pkg = refs.default_package(Utc::now());
        assert_eq!(pkg.discount.vat, 0.0);
        assert_eq!(pkg.join_up_credits.vat, 0);
    }
}
