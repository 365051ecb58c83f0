use serde::{Deserialize, Serialize};

/// Seller identity and tax configuration shared by both payment
/// workflows. Injected at construction, immutable thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommerceSettings {
    pub seller_name: String,
    pub seller_vat_number: String,
    /// Fraction, e.g. 0.2.
    pub vat_rate: f64,
}

/// Card processor webhook events the workflow reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardEvent {
    Created,
    Canceled,
    PaymentFailed,
    Processing,
    Succeeded,
}

impl CardEvent {
    /// Map the processor's `payment_intent.*` event type. Returns `None`
    /// for event types the engine does not act on.
    pub fn parse(event_type: &str) -> Option<Self> {
        match event_type {
            "payment_intent.created" => Some(CardEvent::Created),
            "payment_intent.canceled" => Some(CardEvent::Canceled),
            "payment_intent.payment_failed" => Some(CardEvent::PaymentFailed),
            "payment_intent.processing" => Some(CardEvent::Processing),
            "payment_intent.succeeded" => Some(CardEvent::Succeeded),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_event_types_parse() {
        assert_eq!(
            CardEvent::parse("payment_intent.succeeded"),
            Some(CardEvent::Succeeded)
        );
        assert_eq!(CardEvent::parse("charge.refunded"), None);
    }
}
