// PostureBand - Wire Frames
//
// Inbound frames are decoded once into a Command; outbound notifications are
// encoded from a Notification. Markers are ASCII.
//
//   in   RS            request posture state
//   in   RU            request settings
//   in   S <entries>   settings write
//   in   TELEM         request telemetry export
//   out  S <state>     posture state
//   out  U <settings>  settings snapshot
//   out  NP            sustained incorrect posture
//   out  NM            inactivity reminder
//   out  <seq> <recs>  telemetry export page
//   out  TD            telemetry export complete

use crate::error::FrameError;
use crate::events::{Alert, PostureState};
use crate::posture::PostureSettings;

pub const STATE_REQUEST: &[u8] = b"RS";
pub const SETTINGS_REQUEST: &[u8] = b"RU";
pub const SETTINGS_WRITE: u8 = b'S';
pub const TELEMETRY_REQUEST: &[u8] = b"TELEM";

pub const STATE_MARKER: u8 = b'S';
pub const SETTINGS_MARKER: u8 = b'U';
pub const POSTURE_NOTIF: &[u8] = b"NP";
pub const MOVEMENT_NOTIF: &[u8] = b"NM";
pub const TRANSFER_DONE: &[u8] = b"TD";

const SETTING_CALIBRATION: u8 = b'C';
const SETTING_TIMEOUT: u8 = b'T';
const SETTING_ENABLED: u8 = b'W';
const SETTING_RANGE: u8 = b'R';

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command<'a> {
    RequestState,
    RequestSettings,
    WriteSettings(SettingsWrite<'a>),
    ExportTelemetry,
}

impl<'a> Command<'a> {
    /// `None` for frames that match no command.
    pub fn decode(data: &'a [u8]) -> Option<Self> {
        match data {
            [SETTINGS_WRITE, body @ ..] if !body.is_empty() => {
                Some(Self::WriteSettings(SettingsWrite { rest: body }))
            }
            _ if data == TELEMETRY_REQUEST => Some(Self::ExportTelemetry),
            _ if data == STATE_REQUEST => Some(Self::RequestState),
            _ if data == SETTINGS_REQUEST => Some(Self::RequestSettings),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingChange {
    Calibrate,
    Timeout(u8),
    Enabled(bool),
    Range(u8),
}

/// Lazily decoded settings entries. Yields each entry in order; after the
/// first error the iterator is exhausted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsWrite<'a> {
    rest: &'a [u8],
}

impl Iterator for SettingsWrite<'_> {
    type Item = Result<SettingChange, FrameError>;

    fn next(&mut self) -> Option<Self::Item> {
        let (&marker, tail) = self.rest.split_first()?;
        if marker == SETTING_CALIBRATION {
            self.rest = tail;
            return Some(Ok(SettingChange::Calibrate));
        }

        let Some((&value, tail)) = tail.split_first() else {
            self.rest = &[];
            return Some(Err(FrameError::MissingValue(marker)));
        };
        let change = match marker {
            SETTING_TIMEOUT => SettingChange::Timeout(value),
            SETTING_ENABLED => SettingChange::Enabled(value != 0),
            SETTING_RANGE => SettingChange::Range(value),
            other => {
                self.rest = &[];
                return Some(Err(FrameError::UnknownSetting(other)));
            }
        };
        self.rest = tail;
        Some(Ok(change))
    }
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    State(PostureState),
    Settings(PostureSettings),
    PostureAlert,
    InactivityAlert,
    TransferDone,
}

impl Notification {
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Self::State(s) => vec![STATE_MARKER, s.as_byte()],
            Self::Settings(s) => {
                let mut out = Vec::with_capacity(1 + PostureSettings::SIZE);
                out.push(SETTINGS_MARKER);
                out.extend_from_slice(&s.to_bytes());
                out
            }
            Self::PostureAlert => POSTURE_NOTIF.to_vec(),
            Self::InactivityAlert => MOVEMENT_NOTIF.to_vec(),
            Self::TransferDone => TRANSFER_DONE.to_vec(),
        }
    }
}

impl From<Alert> for Notification {
    fn from(alert: Alert) -> Self {
        match alert {
            Alert::StateChanged(s) => Self::State(s),
            Alert::SustainedIncorrect => Self::PostureAlert,
            Alert::Inactivity => Self::InactivityAlert,
            Alert::Calibrated(s) => Self::Settings(s),
        }
    }
}
