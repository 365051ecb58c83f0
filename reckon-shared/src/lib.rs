pub mod balance;
pub mod billing;
pub mod kinds;
pub mod order;
pub mod package;

pub use balance::CreditBalance;
pub use billing::BillingProfile;
pub use kinds::{FilingKind, PerKind};
pub use order::{Order, OrderItem};
pub use package::{Package, Referral, Referrals, Referrer};
