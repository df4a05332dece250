//! ADI 3-byte SPI register protocol.
//!
//! Analog Devices high-speed converters share one register access format:
//! a 16-bit instruction word followed by one data byte.
//!
//! ```text
//!  byte 0            byte 1          byte 2
//!  R/W | A14..A8     A7..A0          D7..D0
//! ```
//!
//! R/W is 1 for reads. On a read the chip shifts the register contents out
//! during byte 2, so the transport overwrites the placeholder in place.
//! This layer knows nothing about what the registers mean.

use anyhow::Result;
use thiserror::Error;

use crate::hw_trait::Spi;
use crate::tracing::prelude::*;

/// Length of every register transaction, in either direction
pub const FRAME_LEN: usize = 3;

/// Highest register address representable in the instruction word
pub const MAX_ADDRESS: u16 = 0x7FFF;

const READ_BIT: u8 = 0x80;

/// Register access error types
#[derive(Error, Debug, PartialEq, Eq)]
pub enum AdiSpiError {
    #[error("Register address 0x{0:04X} exceeds 15 bits")]
    AddressOutOfRange(u16),
}

/// One register transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame {
    Read { address: u16 },
    Write { address: u16, value: u8 },
}

impl Frame {
    pub fn read(address: u16) -> Result<Self, AdiSpiError> {
        check_address(address)?;
        Ok(Frame::Read { address })
    }

    pub fn write(address: u16, value: u8) -> Result<Self, AdiSpiError> {
        check_address(address)?;
        Ok(Frame::Write { address, value })
    }

    /// Bytes to shift out for this transaction.
    pub fn encode(&self) -> [u8; FRAME_LEN] {
        match *self {
            Frame::Read { address } => [READ_BIT | (address >> 8) as u8, address as u8, 0x00],
            Frame::Write { address, value } => [(address >> 8) as u8, address as u8, value],
        }
    }

    /// Recover a frame from the bytes seen on the bus.
    ///
    /// The data byte of a read is whatever the chip shifted back and is not
    /// part of the frame.
    pub fn decode(bytes: &[u8; FRAME_LEN]) -> Self {
        let address = (u16::from(bytes[0] & !READ_BIT) << 8) | u16::from(bytes[1]);
        if bytes[0] & READ_BIT != 0 {
            Frame::Read { address }
        } else {
            Frame::Write {
                address,
                value: bytes[2],
            }
        }
    }
}

fn check_address(address: u16) -> Result<(), AdiSpiError> {
    if address > MAX_ADDRESS {
        return Err(AdiSpiError::AddressOutOfRange(address));
    }
    Ok(())
}

/// Register-level access to a chip speaking the ADI SPI format.
pub struct RegisterBus<S> {
    spi: S,
}

impl<S: Spi> RegisterBus<S> {
    pub fn new(spi: S) -> Self {
        Self { spi }
    }

    /// Read one register.
    pub async fn read(&mut self, address: u16) -> Result<u8> {
        let mut buf = Frame::read(address)?.encode();
        self.spi.write_and_read(&mut buf).await?;
        trace!("read  0x{:03X} ({}) -> 0x{:02X}", address, register_name(address), buf[2]);
        Ok(buf[2])
    }

    /// Write one register.
    pub async fn write(&mut self, address: u16, value: u8) -> Result<()> {
        let mut buf = Frame::write(address, value)?.encode();
        self.spi.write_and_read(&mut buf).await?;
        trace!("write 0x{:03X} ({}) <- 0x{:02X}", address, register_name(address), value);
        Ok(())
    }

    /// Release the underlying transport.
    pub async fn close(&mut self) -> Result<()> {
        self.spi.close().await?;
        Ok(())
    }
}

/// Name of a register the driver touches, for logs.
pub fn register_name(address: u16) -> &'static str {
    use super::ad9656::regs;

    match address {
        regs::SPI_CONFIG => "SPI_CONFIG",
        regs::CHIP_ID => "CHIP_ID",
        regs::JESD204B_PLL_LOCK_STATUS => "JESD204B_PLL_LOCK_STATUS",
        regs::ADC_TEST_MODE => "ADC_TEST_MODE",
        regs::OUTPUT_MODE => "OUTPUT_MODE",
        regs::JESD204B_LANE_RATE_CTRL => "JESD204B_LANE_RATE_CTRL",
        regs::JESD204B_QUICK_CONFIG => "JESD204B_QUICK_CONFIG",
        regs::LINK_CONTROL => "LINK_CONTROL",
        regs::JESD204B_SCR_L => "JESD204B_SCR_L",
        regs::JESD204B_MF_CTRL => "JESD204B_MF_CTRL",
        regs::JESD204B_M_CTRL => "JESD204B_M_CTRL",
        regs::JESD204B_CSN_CONFIG => "JESD204B_CSN_CONFIG",
        regs::JESD204B_SUBCLASS_CONFIG => "JESD204B_SUBCLASS_CONFIG",
        _ => "unknown",
    }
}
