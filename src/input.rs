// PostureBand - Button Decoder
//
// Debounced button decoding with single-click, double-click and long-press
// detection. Pure state machine fed with the pin level and uptime; the
// firmware polls it at ~100 Hz from the input task.

use crate::config::*;
use crate::events::ButtonEvent;

#[derive(Debug)]
pub struct ButtonDecoder {
    // Debounce state
    last_raw: bool,
    last_change_ms: u64,

    // Press tracking
    press_start_ms: Option<u64>,
    button_down: bool,

    // Double-click state machine
    first_click_ms: Option<u64>,
}

impl ButtonDecoder {
    pub fn new(now_ms: u64) -> Self {
        Self {
            last_raw: false,
            last_change_ms: now_ms,
            press_start_ms: None,
            button_down: false,
            first_click_ms: None,
        }
    }

    pub fn is_down(&self) -> bool {
        self.button_down
    }

    /// Feed the current level (`true` = pressed). Returns at most one event
    /// per call.
    pub fn update(&mut self, pressed: bool, now_ms: u64) -> Option<ButtonEvent> {
        // ---- debounce filter ----
        if pressed != self.last_raw {
            self.last_change_ms = now_ms;
        }
        self.last_raw = pressed;

        if now_ms.saturating_sub(self.last_change_ms) < DEBOUNCE_MS {
            return self.check_double_click_timeout(now_ms);
        }

        // ---- pressed edge ----
        if pressed && !self.button_down {
            self.button_down = true;
            self.press_start_ms = Some(now_ms);
        }

        // ---- released edge ----
        if !pressed && self.button_down {
            self.button_down = false;
            let hold_ms = self
                .press_start_ms
                .take()
                .map_or(0, |start| now_ms.saturating_sub(start));

            if hold_ms >= LONG_PRESS_MS {
                self.first_click_ms = None;
                return Some(ButtonEvent::LongPress);
            }
            if self.first_click_ms.take().is_some() {
                return Some(ButtonEvent::DoubleClick);
            }
            self.first_click_ms = Some(now_ms);
            return None;
        }

        self.check_double_click_timeout(now_ms)
    }

    /// A lone click becomes a single click once the window expires.
    fn check_double_click_timeout(&mut self, now_ms: u64) -> Option<ButtonEvent> {
        match self.first_click_ms {
            Some(t) if now_ms.saturating_sub(t) > DOUBLE_CLICK_WINDOW_MS => {
                self.first_click_ms = None;
                Some(ButtonEvent::SingleClick)
            }
            _ => None,
        }
    }
}
