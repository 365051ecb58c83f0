use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub commerce: CommerceConfig,
    pub card: CardConfig,
    pub crypto: CryptoConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CommerceConfig {
    pub seller_name: String,
    pub seller_vat_number: String,
    /// Configured as a percentage, e.g. 20.0.
    pub vat_rate_percent: f64,
}

impl CommerceConfig {
    /// The VAT rate as a fraction, 3 decimal places.
    pub fn vat_rate(&self) -> f64 {
        (self.vat_rate_percent / 100.0 * 1000.0).round() / 1000.0
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CardConfig {
    pub public_key: String,
    pub secret_key: String,
    pub webhook_key: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CryptoConfig {
    pub api_key: String,
    pub ipn_secret: String,
    pub ipn_url: String,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("RECKON").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vat_rate_rounds_to_three_places() {
        let c = CommerceConfig {
            seller_name: "Reckon Ltd".to_string(),
            seller_vat_number: "GB123456789".to_string(),
            vat_rate_percent: 20.0,
        };
        assert_eq!(c.vat_rate(), 0.2);

        let odd = CommerceConfig {
            vat_rate_percent: 17.5349,
            ..c
        };
        assert_eq!(odd.vat_rate(), 0.175);
    }
}
