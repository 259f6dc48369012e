use crate::error::Error;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub wallet: WalletConfig,
    pub prover: ProverConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WalletConfig {
    /// Symbol of the public-ledger asset (default: ETH)
    pub public_asset: String,
    /// Symbol of the shielded asset (default: ATOS)
    pub private_asset: String,
    /// Public balance a fresh session starts with (default: 1.245)
    pub initial_public_balance: Decimal,
    /// Domain tag bound into the key-derivation message (default: "Atoshi v1")
    pub derivation_domain: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProverConfig {
    /// Progress granularity of the simulated prover in percent (default: 5)
    pub step_percent: u8,
    /// Delay per progress step in milliseconds (default: 80)
    pub step_delay_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub format: LogFormat,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        Ok(Self::from_lookup(|key| env::var(key).ok())?)
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let raw_balance = var("WALLET_INITIAL_PUBLIC_BALANCE", "1.245");
        let initial_public_balance = Decimal::from_str(raw_balance.trim())
            .map_err(|e| Error::Config(format!("WALLET_INITIAL_PUBLIC_BALANCE: {}", e)))?;
        if initial_public_balance.is_sign_negative() {
            return Err(Error::Validation(
                "WALLET_INITIAL_PUBLIC_BALANCE must not be negative".to_string(),
            ));
        }

        let step_percent: u8 = var("PROOF_STEP_PERCENT", "5")
            .parse()
            .map_err(|e| Error::Config(format!("PROOF_STEP_PERCENT: {}", e)))?;
        if step_percent == 0 || step_percent > 100 {
            return Err(Error::Validation(format!(
                "PROOF_STEP_PERCENT must be within 1..=100, got {}",
                step_percent
            )));
        }

        let step_delay_ms: u64 = var("PROOF_STEP_DELAY_MS", "80")
            .parse()
            .map_err(|e| Error::Config(format!("PROOF_STEP_DELAY_MS: {}", e)))?;

        let format = match var("LOG_FORMAT", "pretty").to_ascii_lowercase().as_str() {
            "json" => LogFormat::Json,
            "pretty" => LogFormat::Pretty,
            other => {
                return Err(Error::Config(format!(
                    "LOG_FORMAT must be 'json' or 'pretty', got '{}'",
                    other
                )))
            }
        };

        let derivation_domain = var("WALLET_DERIVATION_DOMAIN", "Atoshi v1");
        if derivation_domain.trim().is_empty() {
            return Err(Error::Validation(
                "WALLET_DERIVATION_DOMAIN must not be empty".to_string(),
            ));
        }

        Ok(Config {
            wallet: WalletConfig {
                public_asset: var("WALLET_PUBLIC_ASSET", "ETH"),
                private_asset: var("WALLET_PRIVATE_ASSET", "ATOS"),
                initial_public_balance,
                derivation_domain,
            },
            prover: ProverConfig {
                step_percent,
                step_delay_ms,
            },
            logging: LoggingConfig { format },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(|_| None).unwrap();

        assert_eq!(config.wallet.public_asset, "ETH");
        assert_eq!(config.wallet.private_asset, "ATOS");
        assert_eq!(config.wallet.initial_public_balance, Decimal::from_str("1.245").unwrap());
        assert_eq!(config.wallet.derivation_domain, "Atoshi v1");
        assert_eq!(config.prover.step_percent, 5);
        assert_eq!(config.prover.step_delay_ms, 80);
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("WALLET_PUBLIC_ASSET", "SOL"),
            ("WALLET_INITIAL_PUBLIC_BALANCE", "10"),
            ("PROOF_STEP_PERCENT", "25"),
            ("PROOF_STEP_DELAY_MS", "0"),
            ("LOG_FORMAT", "JSON"),
        ]))
        .unwrap();

        assert_eq!(config.wallet.public_asset, "SOL");
        assert_eq!(config.wallet.initial_public_balance, Decimal::from(10));
        assert_eq!(config.prover.step_percent, 25);
        assert_eq!(config.prover.step_delay_ms, 0);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_rejects_invalid_values() {
        let cases = [
            ("WALLET_INITIAL_PUBLIC_BALANCE", "abc"),
            ("WALLET_INITIAL_PUBLIC_BALANCE", "-1"),
            ("PROOF_STEP_PERCENT", "0"),
            ("PROOF_STEP_PERCENT", "101"),
            ("PROOF_STEP_DELAY_MS", "soon"),
            ("LOG_FORMAT", "xml"),
            ("WALLET_DERIVATION_DOMAIN", "  "),
        ];

        for (key, value) in cases {
            let result = Config::from_lookup(lookup_from(&[(key, value)]));
            assert!(result.is_err(), "Should reject {}={}", key, value);
        }
    }
}
