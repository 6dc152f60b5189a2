// In-memory stand-ins for the peripherals and the radio, shared by the unit
// tests.

use std::collections::HashMap;
use std::time::Duration;

use crate::error::{SinkError, StoreError, TransportError};
use crate::hal::{Haptic, SettingsStore};
use crate::posture::PostureSettings;
use crate::protocol::{AdvertisingData, ConnHandle, PeerAddr, SecurityLevel, SendTag, Transport};
use crate::telemetry::{Portion, TelemetryRecord, TelemetrySink};

// ---------------------------------------------------------------------------
// Haptic
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HapticCall {
    Start,
    Pulse(Duration),
    Stop,
}

#[derive(Debug, Default)]
pub struct FakeHaptic {
    pub calls: Vec<HapticCall>,
}

impl Haptic for FakeHaptic {
    fn start(&mut self) {
        self.calls.push(HapticCall::Start);
    }

    fn start_pulse(&mut self, duration: Duration) {
        self.calls.push(HapticCall::Pulse(duration));
    }

    fn stop(&mut self) {
        self.calls.push(HapticCall::Stop);
    }
}

// ---------------------------------------------------------------------------
// Telemetry sink
// ---------------------------------------------------------------------------
#[derive(Debug, Default)]
pub struct VecSink {
    pub records: Vec<TelemetryRecord>,
    pub busy: bool,
    pub fail_reads: bool,
    cursor: usize,
}

impl TelemetrySink for VecSink {
    fn submit(&mut self, record: TelemetryRecord) -> Result<(), SinkError> {
        if self.busy {
            return Err(SinkError::Busy);
        }
        self.records.push(record);
        Ok(())
    }

    fn read_next_portion(&mut self, buf: &mut [u8]) -> Result<Portion, SinkError> {
        if self.fail_reads {
            return Err(SinkError::Read(-5));
        }
        let mut len = 0;
        while len + TelemetryRecord::SIZE <= buf.len() {
            let Some(rec) = self.records.get(self.cursor) else {
                return Ok(Portion { len, done: true });
            };
            buf[len..len + TelemetryRecord::SIZE].copy_from_slice(&rec.to_bytes());
            len += TelemetryRecord::SIZE;
            self.cursor += 1;
        }
        Ok(Portion { len, done: false })
    }

    fn reset_read_cursor(&mut self) {
        self.cursor = 0;
    }
}

// ---------------------------------------------------------------------------
// Settings store
// ---------------------------------------------------------------------------
#[derive(Debug, Default)]
pub struct MemoryStore {
    pub saved: Option<PostureSettings>,
    pub saves: usize,
}

impl SettingsStore for MemoryStore {
    fn load(&mut self) -> Result<Option<PostureSettings>, StoreError> {
        Ok(self.saved)
    }

    fn save(&mut self, settings: &PostureSettings) -> Result<(), StoreError> {
        self.saved = Some(*settings);
        self.saves += 1;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sent {
    pub conn: ConnHandle,
    pub frame: Vec<u8>,
    pub tag: Option<SendTag>,
}

#[derive(Debug, Default)]
pub struct FakeTransport {
    pub advertising: bool,
    pub adv_starts: usize,
    pub adv_stops: usize,
    /// Error code returned by the next `start_advertising`.
    pub fail_start: Option<i32>,
    pub sent: Vec<Sent>,
    pub security: HashMap<ConnHandle, SecurityLevel>,
    pub bonds: Vec<PeerAddr>,
    pub pairing_responses: Vec<(ConnHandle, bool)>,
}

impl FakeTransport {
    pub fn frames(&self) -> Vec<Vec<u8>> {
        self.sent.iter().map(|s| s.frame.clone()).collect()
    }
}

impl Transport for FakeTransport {
    fn start_advertising(&mut self, data: &AdvertisingData) -> Result<(), TransportError> {
        if let Some(code) = self.fail_start.take() {
            return Err(TransportError::Radio(code));
        }
        // EALREADY on a real stack.
        if self.advertising {
            return Err(TransportError::Radio(-120));
        }
        assert!(!data.name.is_empty());
        self.advertising = true;
        self.adv_starts += 1;
        Ok(())
    }

    fn stop_advertising(&mut self) -> Result<(), TransportError> {
        self.advertising = false;
        self.adv_stops += 1;
        Ok(())
    }

    fn send(
        &mut self,
        conn: ConnHandle,
        frame: &[u8],
        tag: Option<SendTag>,
    ) -> Result<(), TransportError> {
        self.sent.push(Sent {
            conn,
            frame: frame.to_vec(),
            tag,
        });
        Ok(())
    }

    fn security_level(&self, conn: ConnHandle) -> Option<SecurityLevel> {
        self.security.get(&conn).copied()
    }

    fn bonded_peers(&self) -> Vec<PeerAddr> {
        self.bonds.clone()
    }

    fn respond_pairing(&mut self, conn: ConnHandle, accept: bool) {
        self.pairing_responses.push((conn, accept));
    }

    fn unpair(&mut self, peer: Option<PeerAddr>) -> Result<(), TransportError> {
        match peer {
            Some(p) => self.bonds.retain(|b| *b != p),
            None => self.bonds.clear(),
        }
        Ok(())
    }
}
