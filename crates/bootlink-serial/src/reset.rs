//! Reset sequencing on a live transport

use bootlink_core::error::ResetError;
use bootlink_core::reset::{ResetStrategy, ResetTarget};

use crate::device::SerialDevice;
use crate::error::{Result, TransportError};
use crate::transport::Transport;

impl<D: SerialDevice> ResetTarget for Transport<D> {
    type Error = TransportError;

    async fn set_dtr(&mut self, level: bool) -> Result<()> {
        Transport::set_dtr(self, level).await
    }

    async fn set_rts(&mut self, level: bool) -> Result<()> {
        Transport::set_rts(self, level).await
    }

    async fn sleep(&mut self, ms: u32) {
        Transport::sleep(self, u64::from(ms)).await
    }
}

impl<D: SerialDevice> Transport<D> {
    /// Reset the chip with `strategy`
    pub async fn reset(
        &mut self,
        strategy: ResetStrategy<'_>,
    ) -> core::result::Result<(), ResetError<TransportError>> {
        log::debug!("reset: running {:?}", strategy);
        strategy.execute(self).await
    }
}
