//! Converts clock <-> (line, line_clks); handles LCD on/off and the
//! "first frame is shorter" quirk (spec §4.3, SPEC_FULL §11.2).

use crate::clock::{CYCLES_PER_FRAME, CYCLES_PER_LINE, UNDEFINED};

#[derive(Clone)]
pub struct ScanlineTracker {
    frame_start_clock: u32,
    is_first_frame: bool,
    cached_line: u8,
    cached_line_start: u32,
    is_cgb: bool,
}

impl ScanlineTracker {
    pub fn new(is_cgb: bool) -> Self {
        Self {
            frame_start_clock: UNDEFINED,
            is_first_frame: true,
            cached_line: 0,
            cached_line_start: UNDEFINED,
            is_cgb,
        }
    }

    pub fn is_lcd_on(&self) -> bool {
        self.frame_start_clock != UNDEFINED
    }

    pub fn frame_start_clock(&self) -> u32 {
        self.frame_start_clock
    }

    pub fn is_first_frame(&self) -> bool {
        self.is_first_frame
    }

    /// Grounded in `age_gb_lcd_scanline.cpp`'s constructor: the first
    /// scanline after LCD-on is shorter, via a negative frame-start offset.
    pub fn lcd_on(&mut self, current_clock: u32) {
        let offset: i64 = if self.is_cgb {
            4396 - i64::from(CYCLES_PER_FRAME)
        } else {
            60 - i64::from(CYCLES_PER_FRAME)
        };
        self.frame_start_clock = (i64::from(current_clock) + offset) as u32;
        self.is_first_frame = true;
        self.cached_line_start = UNDEFINED;
    }

    pub fn lcd_off(&mut self) {
        self.frame_start_clock = UNDEFINED;
        self.is_first_frame = true;
    }

    /// Returns `(line, line_clks)` for `current_clock`, caching the last
    /// computed line so repeated same-line queries avoid the division.
    pub fn current_scanline(&mut self, current_clock: u32) -> (u8, u16) {
        debug_assert!(self.is_lcd_on());
        let clks_since_frame_start = current_clock.wrapping_sub(self.frame_start_clock);

        if self.cached_line_start != UNDEFINED {
            let since_cached = clks_since_frame_start
                .wrapping_sub(u32::from(self.cached_line) * CYCLES_PER_LINE);
            if since_cached < CYCLES_PER_LINE {
                return (self.cached_line, since_cached as u16);
            }
        }

        let frame_pos = clks_since_frame_start % CYCLES_PER_FRAME;
        let line = (frame_pos / CYCLES_PER_LINE) as u8;
        let line_clks = (frame_pos % CYCLES_PER_LINE) as u16;
        self.cached_line = line;
        self.cached_line_start = clks_since_frame_start - u32::from(line_clks);
        (line, line_clks)
    }

    /// Advances `frame_start_clock` by whole frames once `current_clock`
    /// has crossed a frame boundary, clearing the first-frame flag.
    pub fn fast_forward_frames(&mut self, current_clock: u32) {
        if !self.is_lcd_on() {
            return;
        }
        let elapsed = current_clock.wrapping_sub(self.frame_start_clock);
        if elapsed >= CYCLES_PER_FRAME {
            let frames = elapsed / CYCLES_PER_FRAME;
            self.frame_start_clock =
                self.frame_start_clock.wrapping_add(frames * CYCLES_PER_FRAME);
            self.is_first_frame = false;
            self.cached_line_start = UNDEFINED;
        }
    }

    pub fn set_back_clock(&mut self, delta: u32) {
        self.frame_start_clock = crate::clock::back_clock_value(self.frame_start_clock, delta);
        self.cached_line_start = crate::clock::back_clock_value(self.cached_line_start, delta);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lcd_off_has_no_current_line() {
        let tracker = ScanlineTracker::new(false);
        assert!(!tracker.is_lcd_on());
    }

    #[test]
    fn full_frame_is_70224_cycles() {
        let mut tracker = ScanlineTracker::new(false);
        tracker.lcd_on(0);
        tracker.fast_forward_frames(tracker.frame_start_clock() + CYCLES_PER_FRAME);
        assert!(!tracker.is_first_frame());
    }

    #[test]
    fn line_and_clks_derived_correctly() {
        let mut tracker = ScanlineTracker::new(false);
        tracker.lcd_on(0);
        let fs = tracker.frame_start_clock();
        let (line, clks) = tracker.current_scanline(fs + 456 * 3 + 10);
        assert_eq!(line, 3);
        assert_eq!(clks, 10);
    }

    #[test]
    fn cache_hit_matches_recompute() {
        let mut tracker = ScanlineTracker::new(true);
        tracker.lcd_on(0);
        let fs = tracker.frame_start_clock();
        let first = tracker.current_scanline(fs + 456 * 5 + 1);
        let second = tracker.current_scanline(fs + 456 * 5 + 200);
        assert_eq!(first.0, second.0);
        assert_eq!(second.1, 200);
    }
}
