pub mod payment;
pub mod store;
pub mod submission;

pub use payment::{CardPaymentAdapter, CryptoPaymentAdapter, PaymentError, PaymentIntent};
pub use store::{DocumentStore, StoreError, TxnOps};
pub use submission::{FilingRenderer, Obligation, SubmissionError, TaxAuthorityClient, VatReturn};
