// PostureBand - Protocol Layer
//
// Everything between the posture detector and the radio: frame codec,
// paginated telemetry export and the connection/pairing state machine.

pub mod export;
pub mod frame;
pub mod link;
pub mod transport;

pub use export::{ExportCursor, ExportStep};
pub use frame::{Command, Notification, SettingChange};
pub use link::{pairing_allowed, Advertising, ConnectionState, Link, ProtocolContext};
pub use transport::{
    AdvertisingData, ConnHandle, Connection, ConnectionSlot, PeerAddr, SecurityLevel, SendTag,
    Transport, TransportEvent,
};
