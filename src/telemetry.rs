// PostureBand - Telemetry Records & Storage
//
// TelemetryRecord is accumulated by the posture detector and handed to a
// TelemetrySink at each flush. RecordLog is an append-only log split into
// fixed-size sectors; when every sector is full the oldest one is erased and
// the append retried.

use std::collections::VecDeque;

use crate::config::*;
use crate::error::SinkError;

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TelemetryRecord {
    /// Uptime in milliseconds at flush.
    pub timestamp: u32,
    pub posture_notifications: u8,
    pub activeness_notifications: u8,
    pub seconds_not_moving: u16,
    pub seconds_in_bad_posture: u16,
    pub seconds_in_good_posture: u16,
}

impl TelemetryRecord {
    /// Encoded size: fields in declaration order, little-endian, no padding.
    pub const SIZE: usize = 12;

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[0..4].copy_from_slice(&self.timestamp.to_le_bytes());
        out[4] = self.posture_notifications;
        out[5] = self.activeness_notifications;
        out[6..8].copy_from_slice(&self.seconds_not_moving.to_le_bytes());
        out[8..10].copy_from_slice(&self.seconds_in_bad_posture.to_le_bytes());
        out[10..12].copy_from_slice(&self.seconds_in_good_posture.to_le_bytes());
        out
    }

    pub fn from_bytes(b: &[u8; Self::SIZE]) -> Self {
        Self {
            timestamp: u32::from_le_bytes([b[0], b[1], b[2], b[3]]),
            posture_notifications: b[4],
            activeness_notifications: b[5],
            seconds_not_moving: u16::from_le_bytes([b[6], b[7]]),
            seconds_in_bad_posture: u16::from_le_bytes([b[8], b[9]]),
            seconds_in_good_posture: u16::from_le_bytes([b[10], b[11]]),
        }
    }

    /// Decode a page payload into whole records; a trailing partial record is
    /// ignored.
    pub fn decode_all(payload: &[u8]) -> Vec<Self> {
        payload
            .chunks_exact(Self::SIZE)
            .filter_map(|c| <&[u8; Self::SIZE]>::try_from(c).ok())
            .map(Self::from_bytes)
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Sink interface
// ---------------------------------------------------------------------------
/// Result of one `read_next_portion` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Portion {
    /// Bytes written into the caller's buffer (whole records only).
    pub len: usize,
    /// The cursor reached the end of the log.
    pub done: bool,
}

pub trait TelemetrySink {
    /// Best effort; `SinkError::Busy` means the record was not taken.
    fn submit(&mut self, record: TelemetryRecord) -> Result<(), SinkError>;

    /// Copy as many whole records as fit into `buf`, advancing the cursor.
    fn read_next_portion(&mut self, buf: &mut [u8]) -> Result<Portion, SinkError>;

    fn reset_read_cursor(&mut self);
}

// ---------------------------------------------------------------------------
// Sector-rotating log
// ---------------------------------------------------------------------------
pub struct RecordLog {
    sectors: VecDeque<Vec<TelemetryRecord>>,
    records_per_sector: usize,
    sector_count: usize,
    /// (sector index, record index) of the next record to read.
    cursor: (usize, usize),
}

impl Default for RecordLog {
    fn default() -> Self {
        Self::new(TELEMETRY_SECTOR_SIZE, TELEMETRY_SECTOR_COUNT)
    }
}

impl RecordLog {
    pub fn new(sector_size: usize, sector_count: usize) -> Self {
        let records_per_sector = (sector_size / TelemetryRecord::SIZE).max(1);
        let sector_count = sector_count.max(1);
        let mut sectors = VecDeque::with_capacity(sector_count);
        sectors.push_back(Vec::with_capacity(records_per_sector));
        log::info!(
            "Telemetry log: {} sectors x {} records",
            sector_count,
            records_per_sector
        );
        Self {
            sectors,
            records_per_sector,
            sector_count,
            cursor: (0, 0),
        }
    }

    pub fn len(&self) -> usize {
        self.sectors.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Erase the oldest sector.
    fn rotate(&mut self) {
        log::info!("Rotating telemetry sectors");
        self.sectors.pop_front();
        if self.sectors.is_empty() {
            self.sectors.push_back(Vec::with_capacity(self.records_per_sector));
        }
        self.cursor = match self.cursor {
            (0, _) => (0, 0),
            (s, r) => (s - 1, r),
        };
    }

    fn append(&mut self, record: TelemetryRecord) {
        let tail_full = self
            .sectors
            .back()
            .map_or(true, |s| s.len() >= self.records_per_sector);
        if tail_full {
            if self.sectors.len() >= self.sector_count {
                self.rotate();
            }
            // Rotation can leave an empty tail sector behind.
            if self.sectors.back().map_or(true, |s| s.len() >= self.records_per_sector) {
                self.sectors.push_back(Vec::with_capacity(self.records_per_sector));
            }
        }
        if let Some(tail) = self.sectors.back_mut() {
            tail.push(record);
        }
    }

    fn next_record(&mut self) -> Option<TelemetryRecord> {
        loop {
            let (s, r) = self.cursor;
            let sector = self.sectors.get(s)?;
            if let Some(rec) = sector.get(r) {
                self.cursor = (s, r + 1);
                return Some(*rec);
            }
            // Past the end of a full sector: move on. The tail sector may
            // still grow, so stay on it.
            if s + 1 < self.sectors.len() {
                self.cursor = (s + 1, 0);
            } else {
                return None;
            }
        }
    }
}

impl TelemetrySink for RecordLog {
    fn submit(&mut self, record: TelemetryRecord) -> Result<(), SinkError> {
        log::info!("Telemetry record at {} ms", record.timestamp);
        self.append(record);
        Ok(())
    }

    fn read_next_portion(&mut self, buf: &mut [u8]) -> Result<Portion, SinkError> {
        let mut written = 0;
        while written + TelemetryRecord::SIZE <= buf.len() {
            match self.next_record() {
                Some(rec) => {
                    buf[written..written + TelemetryRecord::SIZE].copy_from_slice(&rec.to_bytes());
                    written += TelemetryRecord::SIZE;
                }
                None => {
                    log::debug!("Telemetry log end");
                    return Ok(Portion { len: written, done: true });
                }
            }
        }
        Ok(Portion { len: written, done: false })
    }

    fn reset_read_cursor(&mut self) {
        self.cursor = (0, 0);
    }
}
