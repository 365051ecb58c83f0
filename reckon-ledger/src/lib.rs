pub mod audit;
pub mod ledger;
pub mod models;

pub use audit::{Audit, AuditRecord};
pub use ledger::{CreditLedger, Deltas, LedgerError, Settlement};
pub use models::{
    LedgerTransaction, PaymentDetail, PaymentMethod, TransactionStatus, TransactionType,
};
