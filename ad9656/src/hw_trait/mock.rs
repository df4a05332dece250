//! Simulated AD9656 register file behind the [`Spi`] trait.
//!
//! State is shared through an `Arc` so a test can keep inspecting the bus
//! after the driver has taken ownership of (or closed) the transport.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use super::Spi;
use crate::error::{Error, Result};

#[derive(Debug, Default)]
pub(crate) struct MockState {
    /// Register contents as the chip would report them
    pub regs: HashMap<u16, u8>,
    /// Every transaction, as shifted out by the driver
    pub frames: Vec<[u8; 3]>,
    /// Fail the transaction with this index (0-based)
    pub fail_transfer_at: Option<usize>,
    pub fail_open: bool,
    pub fail_close: bool,
    /// Echo the outgoing bytes instead of emulating the chip
    pub loopback: bool,
    pub opens: usize,
    pub closes: usize,
}

/// Handle shared between the test and the transport.
#[derive(Debug, Clone, Default)]
pub(crate) struct MockBus(pub Arc<Mutex<MockState>>);

impl MockBus {
    /// A bus whose chip answers with `chip_id` and `pll_status`.
    pub fn with_chip(chip_id: u8, pll_status: u8) -> Self {
        let bus = Self::default();
        {
            let mut state = bus.0.lock();
            state.regs.insert(0x001, chip_id);
            state.regs.insert(0x00A, pll_status);
        }
        bus
    }

    pub fn loopback() -> Self {
        let bus = Self::default();
        bus.0.lock().loopback = true;
        bus
    }

    pub fn state(&self) -> parking_lot::MutexGuard<'_, MockState> {
        self.0.lock()
    }

    /// Writes in the order they hit the bus, as (address, value).
    pub fn writes(&self) -> Vec<(u16, u8)> {
        self.state()
            .frames
            .iter()
            .filter(|f| f[0] & 0x80 == 0)
            .map(|f| ((u16::from(f[0]) << 8) | u16::from(f[1]), f[2]))
            .collect()
    }

    /// Last value written to `address`, if any.
    pub fn last_write(&self, address: u16) -> Option<u8> {
        self.writes()
            .into_iter()
            .rev()
            .find(|(a, _)| *a == address)
            .map(|(_, v)| v)
    }
}

#[derive(Debug)]
pub(crate) struct MockSpi {
    bus: MockBus,
    closed: bool,
}

#[async_trait]
impl Spi for MockSpi {
    type Params = MockBus;

    async fn open(params: &MockBus) -> Result<Self> {
        let mut state = params.state();
        if state.fail_open {
            return Err(Error::Transport("open refused".into()));
        }
        state.opens += 1;
        drop(state);
        Ok(Self {
            bus: params.clone(),
            closed: false,
        })
    }

    async fn write_and_read(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut state = self.bus.state();
        assert_eq!(buf.len(), 3, "AD9656 frames are three bytes");
        let index = state.frames.len();
        state.frames.push([buf[0], buf[1], buf[2]]);
        if state.fail_transfer_at == Some(index) {
            return Err(Error::Transport(format!("transfer {} failed", index)));
        }
        if state.loopback {
            return Ok(());
        }

        let address = (u16::from(buf[0] & 0x7F) << 8) | u16::from(buf[1]);
        if buf[0] & 0x80 != 0 {
            buf[2] = state.regs.get(&address).copied().unwrap_or(0);
        } else {
            state.regs.insert(address, buf[2]);
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        let mut state = self.bus.state();
        state.closes += 1;
        if state.fail_close {
            return Err(Error::Transport("close failed".into()));
        }
        Ok(())
    }
}

// A dropped connection counts as closed, like a file descriptor.
impl Drop for MockSpi {
    fn drop(&mut self) {
        if !self.closed {
            self.bus.state().closes += 1;
        }
    }
}
