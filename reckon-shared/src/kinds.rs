use serde::{Deserialize, Serialize};

/// The kinds of return the platform can file. One credit entitles the
/// user to one filing of the matching kind.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FilingKind {
    Vat,
    Corptax,
    Accounts,
}

impl FilingKind {
    pub const ALL: [FilingKind; 3] = [
        FilingKind::Vat,
        FilingKind::Corptax,
        FilingKind::Accounts,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FilingKind::Vat => "vat",
            FilingKind::Corptax => "corptax",
            FilingKind::Accounts => "accounts",
        }
    }
}

impl std::fmt::Display for FilingKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value held per filing kind. Referral packages carry one of these
/// for join-up credits (integers) and one for discounts (fractions).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct PerKind<T> {
    pub vat: T,
    pub corptax: T,
    pub accounts: T,
}

impl<T: Copy> PerKind<T> {
    pub fn get(&self, kind: FilingKind) -> T {
        match kind {
            FilingKind::Vat => self.vat,
            FilingKind::Corptax => self.corptax,
            FilingKind::Accounts => self.accounts,
        }
    }
}
