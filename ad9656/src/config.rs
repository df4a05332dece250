//! Bring-up configuration.
//!
//! [`InitParams`] is consumed once by [`crate::Ad9656::setup`]. The SPI
//! connection parameters are opaque here: their type is whatever the
//! transport declares as [`crate::hw_trait::Spi::Params`].

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};

/// How transport errors inside the fixed register sequence are handled.
///
/// Reads that verify the chip (identity, PLL lock) always abort on error;
/// this only governs the unconditional configuration writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WritePolicy {
    /// Stop at the first failed write and release the transport.
    #[default]
    Abort,
    /// Log the failure and keep going with the rest of the sequence.
    BestEffort,
}

/// Parameters for bringing up one AD9656.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InitParams<P> {
    /// Connection parameters handed to the transport's `open`
    pub spi: P,

    /// Target JESD204B lane rate (kbps)
    pub lane_rate_kbps: u32,

    /// Handling of failed configuration writes
    #[serde(default)]
    pub write_policy: WritePolicy,
}

impl<P> InitParams<P> {
    pub fn new(spi: P, lane_rate_kbps: u32) -> Self {
        Self {
            spi,
            lane_rate_kbps,
            write_policy: WritePolicy::default(),
        }
    }

    pub fn with_write_policy(mut self, write_policy: WritePolicy) -> Self {
        self.write_policy = write_policy;
        self
    }
}

impl<P: DeserializeOwned> InitParams<P> {
    /// Parse parameters from a JSON document.
    pub fn from_json(text: &str) -> Result<Self> {
        let params: Self = serde_json::from_str(text)?;
        if params.lane_rate_kbps == 0 {
            return Err(Error::Config("lane_rate_kbps must be non-zero".into()));
        }
        Ok(params)
    }

    /// Load parameters from a JSON file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize, Serialize, PartialEq)]
    struct Spidev {
        device: String,
        max_speed_hz: u32,
    }

    #[test]
    fn parse_with_default_policy() {
        let params = InitParams::<Spidev>::from_json(
            r#"{
                "spi": { "device": "/dev/spidev1.0", "max_speed_hz": 10000000 },
                "lane_rate_kbps": 1000000
            }"#,
        )
        .unwrap();

        assert_eq!(params.spi.device, "/dev/spidev1.0");
        assert_eq!(params.lane_rate_kbps, 1_000_000);
        assert_eq!(params.write_policy, WritePolicy::Abort);
    }

    #[test]
    fn parse_best_effort() {
        let params = InitParams::<Spidev>::from_json(
            r#"{
                "spi": { "device": "/dev/spidev0.1", "max_speed_hz": 1000000 },
                "lane_rate_kbps": 3200000,
                "write_policy": "best_effort"
            }"#,
        )
        .unwrap();

        assert_eq!(params.write_policy, WritePolicy::BestEffort);
    }

    #[test]
    fn zero_lane_rate_rejected() {
        let err = InitParams::<Spidev>::from_json(
            r#"{ "spi": { "device": "x", "max_speed_hz": 1 }, "lane_rate_kbps": 0 }"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn malformed_json_is_json_error() {
        let err = InitParams::<Spidev>::from_json("{ \"spi\": ").unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn missing_file_is_config_error() {
        let err = InitParams::<Spidev>::load_from(Path::new("/nonexistent/ad9656.json"))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn builder_sets_policy() {
        let params = InitParams::new((), 2_000_000).with_write_policy(WritePolicy::BestEffort);
        assert_eq!(params.write_policy, WritePolicy::BestEffort);
    }
}
