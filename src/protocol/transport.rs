// PostureBand - Transport Interface
//
// The point-to-point radio link the protocol layer drives. Radio events are
// delivered as TransportEvent work items; everything else is a call on the
// Transport trait.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::config::*;
use crate::error::TransportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerAddr(pub [u8; 6]);

impl fmt::Display for PeerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            b[5], b[4], b[3], b[2], b[1], b[0]
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnHandle(pub u16);

/// Link security, ordered weakest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SecurityLevel {
    /// No encryption.
    Open = 1,
    /// Encrypted after pairing.
    Encrypted = 2,
    Authenticated = 3,
    SecureConnections = 4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connection {
    pub handle: ConnHandle,
    pub peer: PeerAddr,
}

/// Identifies which send a `SendComplete` event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendTag {
    ExportPage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Connected {
        conn: ConnHandle,
        peer: PeerAddr,
        /// HCI error if the connection attempt failed.
        error: Option<u8>,
    },
    Disconnected {
        conn: ConnHandle,
        reason: u8,
    },
    SecurityChanged {
        conn: ConnHandle,
        level: Result<SecurityLevel, i32>,
    },
    /// Feature exchange of a pairing attempt; answered with
    /// `Transport::respond_pairing`.
    PairingRequest {
        conn: ConnHandle,
        peer: PeerAddr,
    },
    PairingComplete {
        conn: ConnHandle,
        peer: PeerAddr,
        bonded: bool,
    },
    PairingCancelled {
        peer: PeerAddr,
    },
    Received {
        conn: ConnHandle,
        data: Vec<u8>,
    },
    SendComplete {
        conn: ConnHandle,
        tag: SendTag,
    },
}

// ---------------------------------------------------------------------------
// Advertising records
// ---------------------------------------------------------------------------
const AD_TYPE_FLAGS: u8 = 0x01;
const AD_TYPE_UUID128_ALL: u8 = 0x07;
const AD_TYPE_NAME_COMPLETE: u8 = 0x09;
/// LE General Discoverable, BR/EDR not supported.
const AD_FLAGS_GENERAL_NO_BREDR: u8 = 0x06;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertisingData {
    pub flags: u8,
    pub service_uuid: [u8; 16],
    pub name: String,
}

impl Default for AdvertisingData {
    fn default() -> Self {
        Self {
            flags: AD_FLAGS_GENERAL_NO_BREDR,
            service_uuid: NUS_SERVICE_UUID,
            name: DEVICE_NAME.to_string(),
        }
    }
}

fn push_record(out: &mut Vec<u8>, ad_type: u8, value: &[u8]) {
    out.push(value.len() as u8 + 1);
    out.push(ad_type);
    out.extend_from_slice(value);
}

impl AdvertisingData {
    /// Advertisement payload: flags + 128-bit service UUID.
    pub fn advertisement(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(21);
        push_record(&mut out, AD_TYPE_FLAGS, &[self.flags]);
        push_record(&mut out, AD_TYPE_UUID128_ALL, &self.service_uuid);
        out
    }

    /// Scan response payload: complete device name.
    pub fn scan_response(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.name.len() + 2);
        push_record(&mut out, AD_TYPE_NAME_COMPLETE, self.name.as_bytes());
        out
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------
pub trait Transport {
    fn start_advertising(&mut self, data: &AdvertisingData) -> Result<(), TransportError>;

    fn stop_advertising(&mut self) -> Result<(), TransportError>;

    /// Queue one notification. With a tag, the transport reports
    /// `TransportEvent::SendComplete` once it is on air.
    fn send(
        &mut self,
        conn: ConnHandle,
        frame: &[u8],
        tag: Option<SendTag>,
    ) -> Result<(), TransportError>;

    fn security_level(&self, conn: ConnHandle) -> Option<SecurityLevel>;

    fn bonded_peers(&self) -> Vec<PeerAddr>;

    /// Accept or reject a pairing attempt at feature exchange.
    fn respond_pairing(&mut self, conn: ConnHandle, accept: bool);

    /// Remove the bond with `peer`, or every bond when `None`.
    fn unpair(&mut self, peer: Option<PeerAddr>) -> Result<(), TransportError>;
}

// ---------------------------------------------------------------------------
// Active connection handle
// ---------------------------------------------------------------------------

/// The single active connection, shared with radio callbacks that run outside
/// the work queue. Locked around every send.
#[derive(Debug, Clone, Default)]
pub struct ConnectionSlot(Arc<Mutex<Option<Connection>>>);

impl ConnectionSlot {
    pub fn acquire(&self) -> MutexGuard<'_, Option<Connection>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn current(&self) -> Option<Connection> {
        *self.acquire()
    }

    pub fn attach(&self, conn: Connection) {
        *self.acquire() = Some(conn);
    }

    /// Clear the slot if it still holds `handle`.
    pub fn release(&self, handle: ConnHandle) -> bool {
        let mut guard = self.acquire();
        match *guard {
            Some(c) if c.handle == handle => {
                *guard = None;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advertisement_records_are_length_prefixed() {
        let data = AdvertisingData {
            name: "PB".into(),
            ..Default::default()
        };
        let adv = data.advertisement();
        assert_eq!(&adv[..3], &[2, 0x01, 0x06]);
        assert_eq!(&adv[3..5], &[17, 0x07]);
        assert_eq!(&adv[5..], &NUS_SERVICE_UUID);
        assert_eq!(data.scan_response(), vec![3, 0x09, b'P', b'B']);
    }

    #[test]
    fn slot_release_ignores_stale_handles() {
        let slot = ConnectionSlot::default();
        let peer = PeerAddr([1, 2, 3, 4, 5, 6]);
        slot.attach(Connection { handle: ConnHandle(7), peer });
        assert!(!slot.release(ConnHandle(8)));
        assert!(slot.current().is_some());
        assert!(slot.release(ConnHandle(7)));
        assert!(slot.current().is_none());
    }

    #[test]
    fn security_levels_order() {
        assert!(SecurityLevel::Open < SecurityLevel::Encrypted);
        assert!(SecurityLevel::SecureConnections > SecurityLevel::Encrypted);
    }

    #[test]
    fn peer_address_displays_msb_first() {
        let peer = PeerAddr([0x01, 0x02, 0x03, 0x04, 0x05, 0xC6]);
        assert_eq!(peer.to_string(), "C6:05:04:03:02:01");
    }
}
