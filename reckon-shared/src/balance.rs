use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::kinds::FilingKind;

/// A user's per-kind credit balance. Only the credit ledger mutates this
/// document; every balance stays within `0..=permitted` for its kind.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct CreditBalance(pub HashMap<FilingKind, i64>);

impl CreditBalance {
    pub fn get(&self, kind: FilingKind) -> i64 {
        self.0.get(&kind).copied().unwrap_or(0)
    }

    pub fn set(&mut self, kind: FilingKind, value: i64) {
        self.0.insert(kind, value);
    }
}
