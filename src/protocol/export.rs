// PostureBand - Telemetry Export
//
// Paginated transfer of the telemetry log. Each page is one notification:
// a sequence byte followed by whole records. The next page is produced only
// when the previous one has been sent; the transfer ends with `TD`.

use crate::config::*;
use crate::telemetry::TelemetrySink;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportStep {
    /// Sequence byte + record bytes, ready to send.
    Page(Vec<u8>),
    /// End of data, or the sink failed; send the completion marker.
    Done,
}

#[derive(Debug)]
pub struct ExportCursor {
    page_size: usize,
    sequence: u8,
    active: bool,
}

impl Default for ExportCursor {
    fn default() -> Self {
        Self::new(EXPORT_PAGE_SIZE)
    }
}

impl ExportCursor {
    /// `page_size` includes the sequence byte.
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(2),
            sequence: 0,
            active: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Rewind the sink and arm the cursor at sequence 0.
    pub fn start(&mut self, sink: &mut dyn TelemetrySink) {
        if self.active {
            log::warn!("Telemetry export restarted before completion");
        }
        sink.reset_read_cursor();
        self.sequence = 0;
        self.active = true;
    }

    pub fn abort(&mut self) {
        self.active = false;
    }

    /// Produce the next step. Call once after `start` and then once per
    /// completed page send.
    pub fn advance(&mut self, sink: &mut dyn TelemetrySink) -> ExportStep {
        if !self.active {
            return ExportStep::Done;
        }

        let mut page = vec![0u8; self.page_size];
        page[0] = self.sequence;
        self.sequence = self.sequence.wrapping_add(1);

        match sink.read_next_portion(&mut page[1..]) {
            Err(e) => {
                log::error!("Failed to get telemetry portion: {}", e);
                self.active = false;
                ExportStep::Done
            }
            Ok(portion) if portion.done && portion.len == 0 => {
                log::info!("Telemetry export done");
                self.active = false;
                ExportStep::Done
            }
            Ok(portion) => {
                page.truncate(1 + portion.len);
                ExportStep::Page(page)
            }
        }
    }
}
