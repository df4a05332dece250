//! Bring-up driver for the Analog Devices AD9656 quad-channel ADC.
//!
//! The AD9656 is configured over SPI with 3-byte register frames and
//! streams samples over a JESD204B link. This crate identifies the chip,
//! resets it, programs the link and reports whether the JESD204B PLL
//! locked. The SPI transport itself is supplied by the caller through
//! [`hw_trait::Spi`].

pub mod config;
pub mod error;
pub mod hw_trait;
pub mod peripheral;
pub mod tracing;

pub use config::{InitParams, WritePolicy};
pub use error::{Error, Result};
pub use peripheral::ad9656::{Ad9656, Ad9656Error, LockStatus, Setup, TestMode};
