pub mod adapters;
pub mod models;
pub mod saga;

pub use models::{FilingRecord, FilingState, FilingStatus};
pub use saga::{FilingError, VatSubmission};
