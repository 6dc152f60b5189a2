// PostureBand - Link Management
//
// Connection lifecycle, advertising policy, single-peer pairing admission,
// security gating and command dispatch on top of a Transport.
//
// Advertising policy, re-evaluated after every connection/pairing event:
//   no bond                 -> open advertising
//   bond, not connected     -> directed intent (advertised openly)
//   connected               -> no advertising

use crate::error::TransportError;
use crate::hal::SettingsStore;
use crate::posture::PostureDetector;
use crate::protocol::export::{ExportCursor, ExportStep};
use crate::protocol::frame::{Command, Notification, SettingChange, SettingsWrite};
use crate::protocol::transport::{
    AdvertisingData, ConnHandle, Connection, ConnectionSlot, PeerAddr, SecurityLevel, SendTag,
    Transport, TransportEvent,
};
use crate::telemetry::TelemetrySink;

/// Minimum link security for inbound commands and outbound notifications.
pub const REQUIRED_SECURITY: SecurityLevel = SecurityLevel::Encrypted;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advertising {
    None,
    Open,
    Directed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    AdvertisingOpen,
    AdvertisingDirected,
    Connected,
}

/// What command handling may touch besides the link itself.
pub struct ProtocolContext<'a> {
    pub detector: &'a mut PostureDetector,
    pub sink: &'a mut dyn TelemetrySink,
    pub store: &'a mut dyn SettingsStore,
}

/// A pairing attempt is admitted when nothing is bonded or the requester is
/// the bonded peer.
pub fn pairing_allowed(bonded: &[PeerAddr], peer: PeerAddr) -> bool {
    bonded.iter().all(|b| *b == peer)
}

pub struct Link<T: Transport> {
    transport: T,
    slot: ConnectionSlot,
    advertising: Advertising,
    adv_data: AdvertisingData,
    export: ExportCursor,
}

impl<T: Transport> Link<T> {
    pub fn new(transport: T) -> Self {
        Self::with_export(transport, ExportCursor::default())
    }

    pub fn with_export(transport: T, export: ExportCursor) -> Self {
        Self {
            transport,
            slot: ConnectionSlot::default(),
            advertising: Advertising::None,
            adv_data: AdvertisingData::default(),
            export,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn advertising(&self) -> Advertising {
        self.advertising
    }

    pub fn is_exporting(&self) -> bool {
        self.export.is_active()
    }

    pub fn state(&self) -> ConnectionState {
        if self.slot.current().is_some() {
            return ConnectionState::Connected;
        }
        match self.advertising {
            Advertising::None => ConnectionState::Idle,
            Advertising::Open => ConnectionState::AdvertisingOpen,
            Advertising::Directed => ConnectionState::AdvertisingDirected,
        }
    }

    /// The bonded peer, if any. With several bonds the last one reported wins.
    pub fn bonded_peer(&self) -> Option<PeerAddr> {
        self.transport.bonded_peers().last().copied()
    }

    // ---- Advertising -------------------------------------------------------

    pub fn update_advertising(&mut self) -> Result<(), TransportError> {
        let desired = if self.slot.current().is_some() {
            Advertising::None
        } else if let Some(peer) = self.bonded_peer() {
            log::debug!("Directed advertising to {}", peer);
            Advertising::Directed
        } else {
            Advertising::Open
        };

        log::info!("Changing adv state from {:?} to {:?}", self.advertising, desired);
        if desired == self.advertising {
            return Ok(());
        }

        if self.advertising != Advertising::None {
            self.transport.stop_advertising().map_err(|e| {
                log::error!("Failed to stop advertising: {}", e);
                e
            })?;
            self.advertising = Advertising::None;
        }

        if desired != Advertising::None {
            // Directed intent is advertised with the open parameters too.
            self.transport.start_advertising(&self.adv_data).map_err(|e| {
                log::error!("Advertising failed to start: {}", e);
                e
            })?;
            self.advertising = desired;
        }
        Ok(())
    }

    /// Operator action: forget the bonded peer and advertise again.
    pub fn remove_bond(&mut self) -> Result<(), TransportError> {
        log::info!("Removing bonded peer");
        self.transport.unpair(None)?;
        self.update_advertising()
    }

    // ---- Outbound ----------------------------------------------------------

    fn send_frame(&mut self, frame: &[u8], tag: Option<SendTag>) -> Result<(), TransportError> {
        let guard = self.slot.acquire();
        let conn = (*guard).ok_or(TransportError::NotConnected)?;
        let secure = self
            .transport
            .security_level(conn.handle)
            .map_or(false, |level| level >= REQUIRED_SECURITY);
        if !secure {
            return Err(TransportError::Insecure);
        }
        self.transport.send(conn.handle, frame, tag)?;
        log::debug!("Sent {} bytes", frame.len());
        Ok(())
    }

    /// Best-effort notification to the connected peer.
    pub fn notify(&mut self, notification: Notification) {
        if let Err(e) = self.send_frame(&notification.encode(), None) {
            log::debug!("Not sending {:?}: {}", notification, e);
        }
    }

    // ---- Events ------------------------------------------------------------

    pub fn handle_event(&mut self, event: TransportEvent, ctx: &mut ProtocolContext<'_>) {
        match event {
            TransportEvent::Connected { peer, error: Some(err), .. } => {
                log::warn!("Failed to connect to {} ({})", peer, err);
                self.refresh_advertising();
            }
            TransportEvent::Connected { conn, peer, error: None } => {
                self.slot.attach(Connection { handle: conn, peer });
                // The stack stops advertising when a connection is made.
                self.advertising = Advertising::None;
                log::info!("Connected {}", peer);
                self.refresh_advertising();
            }
            TransportEvent::Disconnected { conn, reason } => {
                if self.slot.release(conn) {
                    log::info!("Disconnected, reason 0x{:02x}", reason);
                    self.export.abort();
                }
                self.refresh_advertising();
            }
            TransportEvent::SecurityChanged { level: Ok(level), .. } => {
                log::info!("Security level changed to {:?}", level);
            }
            TransportEvent::SecurityChanged { level: Err(err), .. } => {
                log::error!("Security failed (err {})", err);
            }
            TransportEvent::PairingRequest { conn, peer } => {
                let accept = pairing_allowed(&self.transport.bonded_peers(), peer);
                if accept {
                    log::info!("Pairing request from {} accepted", peer);
                } else {
                    log::warn!("Pairing request from {} rejected, another peer is bonded", peer);
                }
                self.transport.respond_pairing(conn, accept);
            }
            TransportEvent::PairingComplete { peer, bonded, .. } => {
                let others: Vec<PeerAddr> = self
                    .transport
                    .bonded_peers()
                    .into_iter()
                    .filter(|p| *p != peer)
                    .collect();
                if bonded && !others.is_empty() {
                    log::warn!("Unexpected bond with {}, removing", peer);
                    if let Err(e) = self.transport.unpair(Some(peer)) {
                        log::error!("Failed to remove bond: {}", e);
                    }
                } else {
                    log::info!("Pairing completed with {}", peer);
                }
                self.refresh_advertising();
            }
            TransportEvent::PairingCancelled { peer } => {
                log::debug!("Pairing cancelled: {}", peer);
            }
            TransportEvent::Received { conn, data } => self.on_received(conn, &data, ctx),
            TransportEvent::SendComplete { tag: SendTag::ExportPage, .. } => {
                if self.export.is_active() {
                    self.pump_export(ctx.sink);
                }
            }
        }
    }

    fn refresh_advertising(&mut self) {
        // Already logged; the next event retries.
        let _ = self.update_advertising();
    }

    // ---- Inbound -----------------------------------------------------------

    fn on_received(&mut self, conn: ConnHandle, data: &[u8], ctx: &mut ProtocolContext<'_>) {
        if self.slot.current().map(|c| c.handle) != Some(conn) {
            log::warn!("Received data from unknown connection");
            return;
        }
        let level = self.transport.security_level(conn);
        if level.map_or(true, |l| l < REQUIRED_SECURITY) {
            log::warn!("Security level too low ({:?}), ignoring data", level);
            return;
        }

        match Command::decode(data) {
            Some(Command::RequestState) => {
                log::info!("Sending state");
                self.notify(Notification::State(ctx.detector.state()));
            }
            Some(Command::RequestSettings) => {
                log::info!("Sending settings");
                self.notify(Notification::Settings(ctx.detector.settings()));
            }
            Some(Command::WriteSettings(entries)) => {
                log::info!("Settings received");
                self.write_settings(entries, ctx);
            }
            Some(Command::ExportTelemetry) => {
                log::info!("Telemetry export requested");
                self.export.start(ctx.sink);
                self.pump_export(ctx.sink);
            }
            None => log::info!("Unknown data received ({} bytes)", data.len()),
        }
    }

    /// Entries are applied as they decode; a malformed entry stops the write
    /// with earlier entries kept, nothing saved and no snapshot sent.
    fn write_settings(&mut self, entries: SettingsWrite<'_>, ctx: &mut ProtocolContext<'_>) {
        for entry in entries {
            match entry {
                Ok(SettingChange::Calibrate) => ctx.detector.request_calibration(),
                Ok(SettingChange::Timeout(s)) => ctx.detector.set_timeout(s),
                Ok(SettingChange::Enabled(on)) => ctx.detector.set_enabled(on),
                Ok(SettingChange::Range(deg)) => ctx.detector.set_range(deg),
                Err(e) => {
                    log::error!("Invalid settings payload: {}", e);
                    return;
                }
            }
        }

        let settings = ctx.detector.settings();
        if let Err(e) = ctx.store.save(&settings) {
            log::error!("Failed to save settings: {}", e);
        }
        self.notify(Notification::Settings(settings));
    }

    fn pump_export(&mut self, sink: &mut dyn TelemetrySink) {
        match self.export.advance(sink) {
            ExportStep::Page(page) => {
                if let Err(e) = self.send_frame(&page, Some(SendTag::ExportPage)) {
                    log::warn!("Telemetry export abandoned: {}", e);
                    self.export.abort();
                }
            }
            ExportStep::Done => self.notify(Notification::TransferDone),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{OrientationSample, PostureState};
    use crate::posture::{DetectorTiming, PostureSettings};
    use crate::telemetry::TelemetryRecord;
    use crate::testing::{FakeHaptic, FakeTransport, MemoryStore, VecSink};

    const P: PeerAddr = PeerAddr([1, 1, 1, 1, 1, 1]);
    const Q: PeerAddr = PeerAddr([2, 2, 2, 2, 2, 2]);
    const CONN: ConnHandle = ConnHandle(1);

    struct Rig {
        link: Link<FakeTransport>,
        det: PostureDetector,
        sink: VecSink,
        store: MemoryStore,
    }

    impl Rig {
        fn new() -> Self {
            Self::with_export(ExportCursor::default())
        }

        fn with_export(export: ExportCursor) -> Self {
            Self {
                link: Link::with_export(FakeTransport::default(), export),
                det: PostureDetector::new(PostureSettings::default(), DetectorTiming::default(), 0),
                sink: VecSink::default(),
                store: MemoryStore::default(),
            }
        }

        fn event(&mut self, e: TransportEvent) {
            let mut ctx = ProtocolContext {
                detector: &mut self.det,
                sink: &mut self.sink,
                store: &mut self.store,
            };
            self.link.handle_event(e, &mut ctx);
        }

        fn transport(&mut self) -> &mut FakeTransport {
            self.link.transport_mut()
        }

        /// Connect `peer` on CONN with the given link security.
        fn connect(&mut self, peer: PeerAddr, level: SecurityLevel) {
            // The radio stops advertising by itself on connection.
            self.transport().advertising = false;
            self.transport().security.insert(CONN, level);
            self.event(TransportEvent::Connected { conn: CONN, peer, error: None });
        }

        fn receive(&mut self, data: &[u8]) {
            self.event(TransportEvent::Received { conn: CONN, data: data.to_vec() });
        }

        fn page_sent(&mut self) {
            self.event(TransportEvent::SendComplete { conn: CONN, tag: SendTag::ExportPage });
        }

        fn frames(&self) -> Vec<Vec<u8>> {
            self.link.transport().frames()
        }
    }

    // ---- advertising ----

    #[test]
    fn unbonded_device_advertises_openly_once() {
        let mut rig = Rig::new();
        assert_eq!(rig.link.state(), ConnectionState::Idle);
        rig.link.update_advertising().unwrap();
        assert_eq!(rig.link.state(), ConnectionState::AdvertisingOpen);
        rig.link.update_advertising().unwrap();
        assert_eq!(rig.link.transport().adv_starts, 1);
        assert_eq!(rig.link.transport().adv_stops, 0);
    }

    #[test]
    fn bonded_device_advertises_with_directed_intent() {
        let mut rig = Rig::new();
        rig.transport().bonds.push(P);
        rig.link.update_advertising().unwrap();
        assert_eq!(rig.link.state(), ConnectionState::AdvertisingDirected);
        assert_eq!(rig.link.bonded_peer(), Some(P));
    }

    #[test]
    fn connection_and_advertising_are_exclusive() {
        let mut rig = Rig::new();
        rig.link.update_advertising().unwrap();
        rig.connect(P, SecurityLevel::Open);
        assert_eq!(rig.link.state(), ConnectionState::Connected);
        assert_eq!(rig.link.advertising(), Advertising::None);
        assert_eq!(rig.link.transport().adv_starts, 1);

        rig.event(TransportEvent::Disconnected { conn: CONN, reason: 0x13 });
        assert_eq!(rig.link.state(), ConnectionState::AdvertisingOpen);
        assert_eq!(rig.link.transport().adv_starts, 2);
    }

    #[test]
    fn failed_connection_leaves_advertising_alone() {
        let mut rig = Rig::new();
        rig.link.update_advertising().unwrap();
        rig.event(TransportEvent::Connected { conn: CONN, peer: P, error: Some(0x3e) });
        assert_eq!(rig.link.state(), ConnectionState::AdvertisingOpen);
        assert_eq!(rig.link.transport().adv_starts, 1);
    }

    #[test]
    fn advertising_failure_is_returned() {
        let mut rig = Rig::new();
        rig.transport().fail_start = Some(-5);
        assert_eq!(rig.link.update_advertising(), Err(TransportError::Radio(-5)));
        assert_eq!(rig.link.state(), ConnectionState::Idle);
        // Caller retries.
        rig.link.update_advertising().unwrap();
        assert_eq!(rig.link.state(), ConnectionState::AdvertisingOpen);
    }

    #[test]
    fn removing_bond_switches_to_open_advertising() {
        let mut rig = Rig::new();
        rig.transport().bonds.push(P);
        rig.link.update_advertising().unwrap();
        rig.link.remove_bond().unwrap();
        assert!(rig.link.transport().bonds.is_empty());
        assert_eq!(rig.link.state(), ConnectionState::AdvertisingOpen);
        assert_eq!(rig.link.transport().adv_stops, 1);
        assert_eq!(rig.link.transport().adv_starts, 2);
    }

    // ---- pairing ----

    #[test]
    fn admission_rule() {
        assert!(pairing_allowed(&[], Q));
        assert!(pairing_allowed(&[P], P));
        assert!(!pairing_allowed(&[P], Q));
    }

    #[test]
    fn pairing_requests_are_answered_by_bond_state() {
        let mut rig = Rig::new();
        rig.event(TransportEvent::PairingRequest { conn: CONN, peer: Q });
        rig.transport().bonds.push(P);
        rig.event(TransportEvent::PairingRequest { conn: ConnHandle(2), peer: Q });
        rig.event(TransportEvent::PairingRequest { conn: ConnHandle(3), peer: P });
        assert_eq!(
            rig.link.transport().pairing_responses,
            vec![(CONN, true), (ConnHandle(2), false), (ConnHandle(3), true)]
        );
    }

    #[test]
    fn first_bond_is_kept() {
        let mut rig = Rig::new();
        rig.link.update_advertising().unwrap();
        rig.connect(P, SecurityLevel::Open);
        rig.transport().bonds.push(P);
        rig.event(TransportEvent::PairingComplete { conn: CONN, peer: P, bonded: true });
        assert_eq!(rig.link.transport().bonds, vec![P]);

        rig.event(TransportEvent::Disconnected { conn: CONN, reason: 0x13 });
        assert_eq!(rig.link.state(), ConnectionState::AdvertisingDirected);
    }

    #[test]
    fn racing_second_bond_is_removed() {
        let mut rig = Rig::new();
        rig.transport().bonds = vec![P, Q];
        rig.event(TransportEvent::PairingComplete { conn: CONN, peer: Q, bonded: true });
        assert_eq!(rig.link.transport().bonds, vec![P]);
    }

    // ---- inbound gating ----

    #[test]
    fn insecure_link_gets_nothing() {
        let mut rig = Rig::new();
        rig.connect(P, SecurityLevel::Open);
        rig.receive(b"RS");
        rig.link.notify(Notification::PostureAlert);
        assert!(rig.frames().is_empty());
    }

    #[test]
    fn frames_from_stale_connection_are_dropped() {
        let mut rig = Rig::new();
        rig.connect(P, SecurityLevel::Encrypted);
        rig.transport().security.insert(ConnHandle(9), SecurityLevel::Encrypted);
        rig.event(TransportEvent::Received { conn: ConnHandle(9), data: b"RS".to_vec() });
        assert!(rig.frames().is_empty());
    }

    #[test]
    fn notifications_need_a_connection() {
        let mut rig = Rig::new();
        rig.link.notify(Notification::State(PostureState::Incorrect));
        assert!(rig.frames().is_empty());
    }

    // ---- commands ----

    #[test]
    fn state_and_settings_queries() {
        let mut rig = Rig::new();
        rig.connect(P, SecurityLevel::Encrypted);
        rig.receive(b"RS");
        rig.receive(b"RU");
        rig.receive(b"??");
        assert_eq!(rig.frames(), vec![b"S\x00".to_vec(), vec![b'U', 10, 15, 1, 5]]);
    }

    #[test]
    fn settings_write_round_trips() {
        let mut rig = Rig::new();
        rig.connect(P, SecurityLevel::Authenticated);

        rig.receive(b"SCR\x14");
        assert_eq!(rig.store.saves, 1);
        // Calibration is taken from the next correct sample.
        let mut haptic = FakeHaptic::default();
        rig.det.update(&OrientationSample::new(-3, 0, 0), 500, &mut haptic, &mut rig.sink);

        rig.receive(b"ST\x05W\x00");
        rig.receive(b"RU");

        let expected = PostureSettings {
            detection_time: 5,
            detection_range: 20,
            is_notifying: false,
            x_angle_calibration: -3,
        };
        assert_eq!(rig.det.settings(), expected);
        assert_eq!(rig.store.saved, Some(expected));
        let frames = rig.frames();
        assert_eq!(frames.len(), 3);
        assert_eq!(PostureSettings::from_bytes(&frames[2][1..]).unwrap(), expected);
    }

    #[test]
    fn malformed_write_keeps_prefix_but_sends_nothing() {
        let mut rig = Rig::new();
        rig.connect(P, SecurityLevel::Encrypted);
        rig.receive(b"ST\x05X\x01R\x14");
        assert_eq!(rig.det.settings().detection_time, 5);
        assert_eq!(rig.det.settings().detection_range, 15);
        assert_eq!(rig.store.saves, 0);
        assert!(rig.frames().is_empty());
    }

    // ---- export ----

    fn records() -> Vec<TelemetryRecord> {
        (1..=3)
            .map(|ts| TelemetryRecord { timestamp: ts, ..Default::default() })
            .collect()
    }

    fn page(seq: u8, recs: &[TelemetryRecord]) -> Vec<u8> {
        let mut out = vec![seq];
        for r in recs {
            out.extend_from_slice(&r.to_bytes());
        }
        out
    }

    #[test]
    fn export_is_paced_by_send_completion() {
        let recs = records();
        let mut rig = Rig::with_export(ExportCursor::new(1 + 2 * TelemetryRecord::SIZE));
        rig.sink.records = recs.clone();
        rig.connect(P, SecurityLevel::Encrypted);

        for _ in 0..2 {
            let before = rig.link.transport().sent.len();
            rig.receive(b"TELEM");
            assert!(rig.link.is_exporting());
            rig.page_sent();
            rig.page_sent();
            assert!(!rig.link.is_exporting());

            let sent = &rig.link.transport().sent[before..];
            assert_eq!(sent.len(), 3);
            assert_eq!(sent[0].frame, page(0, &recs[..2]));
            assert_eq!(sent[0].tag, Some(SendTag::ExportPage));
            assert_eq!(sent[1].frame, page(1, &recs[2..]));
            assert_eq!(sent[2].frame, b"TD".to_vec());
            assert_eq!(sent[2].tag, None);
        }

        // Stray completion after the transfer is ignored.
        rig.page_sent();
        assert_eq!(rig.link.transport().sent.len(), 6);
    }

    #[test]
    fn sink_read_failure_ends_export_with_done_marker() {
        let mut rig = Rig::new();
        rig.sink.records = records();
        rig.sink.fail_reads = true;
        rig.connect(P, SecurityLevel::Encrypted);
        rig.receive(b"TELEM");
        assert_eq!(rig.frames(), vec![b"TD".to_vec()]);
        assert!(!rig.link.is_exporting());
    }

    #[test]
    fn disconnect_abandons_export() {
        let mut rig = Rig::with_export(ExportCursor::new(1 + TelemetryRecord::SIZE));
        rig.sink.records = records();
        rig.connect(P, SecurityLevel::Encrypted);
        rig.receive(b"TELEM");
        assert!(rig.link.is_exporting());
        rig.event(TransportEvent::Disconnected { conn: CONN, reason: 0x08 });
        assert!(!rig.link.is_exporting());
        rig.page_sent();
        assert_eq!(rig.frames().len(), 1);
    }
}
