//! AD9656 Quad 16-bit JESD204B ADC Driver
//!
//! This module brings up an Analog Devices AD9656 over SPI: it checks the
//! chip ID, soft-resets the part, programs the JESD204B link for four
//! converters on four lanes and reports whether the serializer PLL locked.
//!
//! Datasheet: <https://www.analog.com/media/en/technical-documentation/data-sheets/AD9656.pdf>

use anyhow::{bail, Result};
use std::time::Duration;
use strum::{Display, FromRepr};
use thiserror::Error;
use tokio::time;

use super::adi_spi::{register_name, RegisterBus};
use crate::config::{InitParams, WritePolicy};
use crate::hw_trait::Spi;
use crate::tracing::prelude::*;

/// Register map (subset used by bring-up)
pub mod regs {
    pub const SPI_CONFIG: u16 = 0x000;
    pub const CHIP_ID: u16 = 0x001;
    pub const JESD204B_PLL_LOCK_STATUS: u16 = 0x00A;
    pub const ADC_TEST_MODE: u16 = 0x00D;
    pub const OUTPUT_MODE: u16 = 0x014;
    pub const JESD204B_LANE_RATE_CTRL: u16 = 0x021;
    pub const JESD204B_QUICK_CONFIG: u16 = 0x05E;
    pub const LINK_CONTROL: u16 = 0x05F;
    pub const JESD204B_SCR_L: u16 = 0x06E;
    pub const JESD204B_MF_CTRL: u16 = 0x070;
    pub const JESD204B_M_CTRL: u16 = 0x071;
    pub const JESD204B_CSN_CONFIG: u16 = 0x072;
    pub const JESD204B_SUBCLASS_CONFIG: u16 = 0x073;
}

/// Expected CHIP_ID contents
pub const CHIP_ID_AD9656: u8 = 0xC0;

/// SPI_CONFIG: soft reset, mirrored into both nibbles
const SPI_CONFIG_SOFT_RESET: u8 = 0x3C;

/// LINK_CONTROL values
const LINK_DISABLE_ILAS: u8 = 0x15; // Link powered down, ILAS enabled
const LINK_ENABLE: u8 = 0x14;

/// JESD204B_LANE_RATE_CTRL values
const LOW_LINE_RATE_ON: u8 = 0x08;
const LOW_LINE_RATE_OFF: u8 = 0x00;

/// Below this lane rate the serializer must run in low line rate mode.
pub const LANE_RATE_THRESHOLD_KBPS: u32 = 2_000_000;

/// JESD204B_PLL_LOCK_STATUS bit 7
const PLL_LOCKED: u8 = 0x80;

/// OUTPUT_MODE data formats
pub const FORMAT_OFFSET_BINARY: u8 = 0x00;
pub const FORMAT_TWOS_COMPLEMENT: u8 = 0x01;
const FORMAT_GRAY_CODE: u8 = 0x02;

/// Settling time after soft reset
const RESET_SETTLE: Duration = Duration::from_millis(250);
/// Settling time for link sync and PLL lock after enabling the link
const LINK_SETTLE: Duration = Duration::from_millis(250);

/// Fixed link configuration, written in order after reset.
///
/// Four converters (M = 4) on four lanes (L = 4), 14-bit samples in 16-bit
/// words, subclass 1, 32 frames per multiframe.
const LINK_CONFIG: [(u16, u8); 7] = [
    (regs::LINK_CONTROL, LINK_DISABLE_ILAS),
    (regs::JESD204B_MF_CTRL, 0x1F),         // K = 32
    (regs::JESD204B_M_CTRL, 0x03),          // M = 4
    (regs::JESD204B_CSN_CONFIG, 0x0D),      // N = 14
    (regs::JESD204B_SUBCLASS_CONFIG, 0x2F), // subclass 1, N' = 16
    (regs::JESD204B_QUICK_CONFIG, 0x44),    // M = 4, L = 4
    (regs::JESD204B_SCR_L, 0x83),           // scrambling on, L = 4
];

/// AD9656 error types
#[derive(Error, Debug, PartialEq, Eq)]
pub enum Ad9656Error {
    #[error("Chip ID mismatch: read 0x{observed:02X}, expected 0x{expected:02X}")]
    IdentityMismatch { observed: u8, expected: u8 },
    #[error("JESD204B PLL not locked (status 0x{status:02X})")]
    LockNotAchieved { status: u8 },
}

/// ADC_TEST_MODE output test patterns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, FromRepr)]
#[repr(u8)]
pub enum TestMode {
    /// Normal operation
    Off = 0x00,
    MidscaleShort = 0x01,
    PositiveFullScale = 0x02,
    NegativeFullScale = 0x03,
    AlternatingCheckerboard = 0x04,
    PnLong = 0x05,
    PnShort = 0x06,
    OneZeroToggle = 0x07,
    UserInput = 0x08,
    Ramp = 0x0F,
}

impl TestMode {
    /// OUTPUT_MODE data format paired with this test mode.
    ///
    /// Test patterns are defined in offset binary; normal sampling uses
    /// two's complement.
    pub fn output_format(self) -> u8 {
        output_format_for(self as u8)
    }
}

/// OUTPUT_MODE data format for a raw ADC_TEST_MODE value.
///
/// Only a value of exactly `TestMode::Off` counts as off; user pattern and
/// PN reset bits in [7:4] make it a test pattern.
pub fn output_format_for(test_mode: u8) -> u8 {
    if test_mode == TestMode::Off as u8 {
        FORMAT_TWOS_COMPLEMENT
    } else {
        FORMAT_OFFSET_BINARY
    }
}

fn describe_output_format(output_mode: u8) -> &'static str {
    match output_mode & 0x03 {
        FORMAT_OFFSET_BINARY => "offset binary",
        FORMAT_TWOS_COMPLEMENT => "two's complement",
        FORMAT_GRAY_CODE => "gray code",
        _ => "reserved",
    }
}

/// JESD204B PLL state read back after enabling the link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockStatus {
    Locked,
    NotLocked { status: u8 },
}

impl LockStatus {
    fn from_register(status: u8) -> Self {
        if status & PLL_LOCKED == PLL_LOCKED {
            LockStatus::Locked
        } else {
            LockStatus::NotLocked { status }
        }
    }

    pub fn is_locked(&self) -> bool {
        matches!(self, LockStatus::Locked)
    }
}

/// Outcome of a bring-up that identified the chip.
///
/// The device is returned even when the PLL did not lock; the caller may
/// still want to inspect or retry it.
pub struct Setup<S> {
    pub device: Ad9656<S>,
    pub lock: LockStatus,
}

impl<S> Setup<S> {
    /// Treat a missing PLL lock as an error.
    pub fn check_lock(&self) -> Result<(), Ad9656Error> {
        match self.lock {
            LockStatus::Locked => Ok(()),
            LockStatus::NotLocked { status } => Err(Ad9656Error::LockNotAchieved { status }),
        }
    }
}

/// AD9656 driver
pub struct Ad9656<S> {
    regs: RegisterBus<S>,
}

impl<S: Spi> Ad9656<S> {
    /// Open the transport and bring the chip up.
    ///
    /// On any error the transport is closed before returning, so no
    /// half-configured device escapes. If the future is dropped mid-way the
    /// transport is released by its own `Drop`.
    pub async fn setup(params: &InitParams<S::Params>) -> Result<Setup<S>> {
        debug!("Initializing AD9656 (lane rate {} kbps)", params.lane_rate_kbps);

        let spi = S::open(&params.spi).await?;
        let mut device = Self {
            regs: RegisterBus::new(spi),
        };

        match device.bring_up(params).await {
            Ok(lock) => {
                match lock {
                    LockStatus::Locked => info!("AD9656 ready, JESD204B PLL locked"),
                    LockStatus::NotLocked { status } => {
                        warn!("AD9656 up but JESD204B PLL is NOT locked (status 0x{:02X})", status)
                    }
                }
                Ok(Setup { device, lock })
            }
            Err(e) => {
                if let Err(close_err) = device.regs.close().await {
                    warn!("Failed to close SPI after aborted bring-up: {}", close_err);
                }
                Err(e)
            }
        }
    }

    async fn bring_up(&mut self, params: &InitParams<S::Params>) -> Result<LockStatus> {
        self.verify_chip_id().await?;

        let policy = params.write_policy;

        self.write_config(regs::SPI_CONFIG, SPI_CONFIG_SOFT_RESET, policy).await?;
        time::sleep(RESET_SETTLE).await;
        debug!("Soft reset complete");

        for (address, value) in LINK_CONFIG {
            self.write_config(address, value, policy).await?;
        }

        let lane_rate = if params.lane_rate_kbps < LANE_RATE_THRESHOLD_KBPS {
            LOW_LINE_RATE_ON
        } else {
            LOW_LINE_RATE_OFF
        };
        trace!(
            "Low line rate mode {}",
            if lane_rate == LOW_LINE_RATE_ON { "enabled" } else { "disabled" }
        );
        self.write_config(regs::JESD204B_LANE_RATE_CTRL, lane_rate, policy).await?;
        debug!("JESD204B link configured");

        self.write_config(regs::LINK_CONTROL, LINK_ENABLE, policy).await?;
        time::sleep(LINK_SETTLE).await;

        self.lock_status().await
    }

    /// Verify the chip ID
    async fn verify_chip_id(&mut self) -> Result<()> {
        let chip_id = self.regs.read(regs::CHIP_ID).await?;
        debug!("Chip ID: 0x{:02X}", chip_id);

        if chip_id != CHIP_ID_AD9656 {
            error!("Invalid chip ID 0x{:02X}", chip_id);
            bail!(Ad9656Error::IdentityMismatch {
                observed: chip_id,
                expected: CHIP_ID_AD9656,
            });
        }

        Ok(())
    }

    // One step of the fixed configuration sequence, subject to the write
    // policy.
    async fn write_config(&mut self, address: u16, value: u8, policy: WritePolicy) -> Result<()> {
        match self.regs.write(address, value).await {
            Ok(()) => Ok(()),
            Err(e) if policy == WritePolicy::BestEffort => {
                warn!(
                    "Write of 0x{:02X} to {} failed, continuing: {}",
                    value,
                    register_name(address),
                    e
                );
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Select an output test pattern.
    ///
    /// Switching the pattern off restores two's complement output; any
    /// pattern switches the data format to offset binary.
    pub async fn set_test_mode(&mut self, mode: TestMode) -> Result<()> {
        debug!("Test mode: {}", mode);
        self.set_test_mode_raw(mode as u8).await
    }

    /// Write a raw ADC_TEST_MODE value, including bits [7:4].
    ///
    /// 0x00 restores two's complement output; any other value switches the
    /// data format to offset binary.
    pub async fn set_test_mode_raw(&mut self, test_mode: u8) -> Result<()> {
        trace!("ADC_TEST_MODE <- 0x{:02X}", test_mode);
        self.regs.write(regs::ADC_TEST_MODE, test_mode).await?;
        self.regs
            .write(regs::OUTPUT_MODE, output_format_for(test_mode))
            .await?;
        Ok(())
    }

    /// Read the JESD204B PLL lock status
    pub async fn lock_status(&mut self) -> Result<LockStatus> {
        let status = self.regs.read(regs::JESD204B_PLL_LOCK_STATUS).await?;
        Ok(LockStatus::from_register(status))
    }

    /// Read the chip ID register
    pub async fn chip_id(&mut self) -> Result<u8> {
        self.regs.read(regs::CHIP_ID).await
    }

    /// Read an arbitrary register
    pub async fn read_register(&mut self, address: u16) -> Result<u8> {
        self.regs.read(address).await
    }

    /// Write an arbitrary register
    pub async fn write_register(&mut self, address: u16, value: u8) -> Result<()> {
        self.regs.write(address, value).await
    }

    /// Dump the link configuration for debugging
    pub async fn dump_configuration(&mut self) -> Result<()> {
        debug!("=== AD9656 Configuration Dump ===");

        let chip_id = self.chip_id().await?;
        debug!("CHIP_ID: 0x{:02X}", chip_id);

        for (address, expected) in LINK_CONFIG.iter().skip(1) {
            let value = self.regs.read(*address).await?;
            if value == *expected {
                debug!("{}: 0x{:02X}", register_name(*address), value);
            } else {
                debug!(
                    "{}: 0x{:02X} (configured 0x{:02X})",
                    register_name(*address),
                    value,
                    expected
                );
            }
        }

        let lane_rate = self.regs.read(regs::JESD204B_LANE_RATE_CTRL).await?;
        debug!(
            "JESD204B_LANE_RATE_CTRL: 0x{:02X} (low line rate {})",
            lane_rate,
            if lane_rate & LOW_LINE_RATE_ON != 0 { "on" } else { "off" }
        );

        let link = self.regs.read(regs::LINK_CONTROL).await?;
        debug!(
            "LINK_CONTROL: 0x{:02X} ({})",
            link,
            if link & 0x01 != 0 { "powered down" } else { "enabled" }
        );

        let test_mode = self.regs.read(regs::ADC_TEST_MODE).await?;
        let test_desc = TestMode::from_repr(test_mode & 0x0F)
            .map(|m| m.to_string())
            .unwrap_or_else(|| "reserved".to_string());
        debug!("ADC_TEST_MODE: 0x{:02X} ({})", test_mode, test_desc);

        let output_mode = self.regs.read(regs::OUTPUT_MODE).await?;
        debug!(
            "OUTPUT_MODE: 0x{:02X} ({})",
            output_mode,
            describe_output_format(output_mode)
        );

        let lock = self.lock_status().await?;
        debug!("JESD204B_PLL_LOCK_STATUS: {:?}", lock);

        debug!("=== End Configuration Dump ===");
        Ok(())
    }

    /// Close the transport and release the device.
    ///
    /// The handle is consumed whether or not the close succeeds.
    pub async fn remove(mut self) -> Result<()> {
        debug!("Removing AD9656");
        self.regs.close().await
    }
}
