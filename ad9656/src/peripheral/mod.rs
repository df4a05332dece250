//! Chip drivers.
//!
//! `adi_spi` is the register transport shared by ADI converters; `ad9656`
//! uses it to bring up the ADC.

pub mod ad9656;
pub mod adi_spi;
