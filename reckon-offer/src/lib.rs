pub mod builder;
pub mod models;

pub use builder::OfferBuilder;
pub use models::{KindOffer, Offer, OfferLine};
