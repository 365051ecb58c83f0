pub mod adapters;
pub mod crypto;
pub mod models;
pub mod verifier;
pub mod workflow;

pub use crypto::{
    verify_card_signature, verify_ipn_signature, CryptoWorkflow, IpnEvent, VerificationFailure,
};
pub use models::{CardEvent, CommerceSettings};
pub use verifier::{order_deltas, verify_order, InvalidOrder};
pub use workflow::{OrderError, OrderWorkflow};
