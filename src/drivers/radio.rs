// PostureBand - Detached Radio
//
// No radio is connected in this firmware build. This Transport logs
// advertising requests, never produces a connection, has no bonds and
// reports `NotConnected` on every send, so the protocol layer stays idle on
// hardware. A BLE stack adapter takes its place and pushes its callbacks
// into the work queue as `Work::Transport` events.

use postureband::protocol::{AdvertisingData, ConnHandle, PeerAddr, SecurityLevel, SendTag, Transport};
use postureband::TransportError;

#[derive(Debug, Default)]
pub struct DetachedRadio {
    advertising: bool,
}

impl Transport for DetachedRadio {
    fn start_advertising(&mut self, data: &AdvertisingData) -> Result<(), TransportError> {
        if self.advertising {
            return Err(TransportError::Radio(-120));
        }
        log::info!(
            "Advertising as {:?} ({} + {} bytes)",
            data.name,
            data.advertisement().len(),
            data.scan_response().len()
        );
        self.advertising = true;
        Ok(())
    }

    fn stop_advertising(&mut self) -> Result<(), TransportError> {
        self.advertising = false;
        Ok(())
    }

    fn send(&mut self, _: ConnHandle, _: &[u8], _: Option<SendTag>) -> Result<(), TransportError> {
        Err(TransportError::NotConnected)
    }

    fn security_level(&self, _: ConnHandle) -> Option<SecurityLevel> {
        None
    }

    fn bonded_peers(&self) -> Vec<PeerAddr> {
        Vec::new()
    }

    fn respond_pairing(&mut self, conn: ConnHandle, accept: bool) {
        log::debug!("Pairing response for {:?}: {}", conn, accept);
    }

    fn unpair(&mut self, _: Option<PeerAddr>) -> Result<(), TransportError> {
        Ok(())
    }
}
