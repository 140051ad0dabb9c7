//! DIV/TIMA timer (spec §4.11). Lazily catches its internal divider up to
//! the current clock on every read/write rather than ticking every T4
//! cycle, per the `read(current_clock)`/`write(current_clock, value)`
//! contract of spec §2.

use crate::{
    clock::UNDEFINED,
    event::{EventKind, EventQueue},
    interrupt::{Interrupt, InterruptTrigger},
};

/// T4-cycle period of a falling edge of the TAC-selected divider bit.
const PERIODS: [u64; 4] = [1024, 16, 64, 256];

#[derive(Clone, Default)]
pub struct Timer {
    /// T4 ticks elapsed since the last DIV reset (or power-on). Only the
    /// low 16 bits are architecturally meaningful; kept as `u64` so the
    /// edges crossed by an arbitrary catch-up span can be found by walking
    /// period boundaries directly, without simulating each cycle.
    counter: u64,
    last_sync_clock: u32,
    tima: u8,
    tma: u8,
    tac: u8,
    /// Clock at which a pending overflow's reload fires, or [`UNDEFINED`].
    reload_at: u32,
}

impl Timer {
    fn period(&self) -> u64 {
        PERIODS[usize::from(self.tac & 0x03)]
    }

    fn is_enabled(&self) -> bool {
        self.tac & 0x04 != 0
    }

    fn div16(&self) -> u16 {
        self.counter as u16
    }

    /// Advances `counter` to `current_clock` and applies every TIMA
    /// increment (and at most one overflow/reload) that occurred along the
    /// way. Must be called before any read or write of DIV/TIMA/TMA/TAC.
    pub fn catch_up(
        &mut self,
        current_clock: u32,
        events: &mut EventQueue,
        interrupts: &mut InterruptTrigger,
    ) {
        // A pending reload fires on its own schedule via `fire_reload`; it
        // is not resolved eagerly here so a TIMA/TMA write landing inside
        // the 4-cycle window can still observe (and cancel/modify) it.
        let delta = current_clock.wrapping_sub(self.last_sync_clock);
        self.last_sync_clock = current_clock;
        let new_counter = self.counter + u64::from(delta);

        // A single catch-up span can cross more than one falling edge: the
        // fastest TAC period (16 T4) is shorter than the longest CPU
        // instruction, so every crossed edge must be applied, not just the
        // first. `reload_at` is re-checked each iteration since the first
        // overflow in the span stops further TIMA increments until the
        // reload fires.
        if self.is_enabled() {
            let period = self.period();
            while self.reload_at == UNDEFINED {
                let next_edge = (self.counter / period + 1) * period;
                if next_edge > new_counter {
                    break;
                }
                self.counter = next_edge;
                self.increment_tima(current_clock, events);
            }
        }

        self.counter = new_counter;
        self.reschedule_overflow(current_clock, events);
    }

    fn increment_tima(&mut self, at_clock: u32, events: &mut EventQueue) {
        let (new_tima, overflowed) = self.tima.overflowing_add(1);
        self.tima = new_tima;
        if overflowed {
            self.reload_at = at_clock.wrapping_add(4);
            events.schedule(EventKind::TimerTmaReload, at_clock, 4);
        }
    }

    /// Predicts the next TIMA overflow from the current counter/tima state
    /// and schedules [`EventKind::TimerOverflow`] for that cycle, so the
    /// interrupt is discoverable purely from the event queue even if no
    /// register is touched in the meantime (spec §3's "CPU polls the event
    /// queue" contract). A pending reload already has its own precise
    /// [`EventKind::TimerTmaReload`] entry, so no prediction is needed while
    /// one is outstanding.
    fn reschedule_overflow(&mut self, current_clock: u32, events: &mut EventQueue) {
        if self.reload_at != UNDEFINED || !self.is_enabled() {
            events.remove(EventKind::TimerOverflow);
            return;
        }
        let period = self.period();
        let remaining_in_period = period - (self.counter % period);
        let edges_to_overflow = u64::from(0xffu8 - self.tima) + 1;
        let delta = remaining_in_period + (edges_to_overflow - 1) * period;
        events.schedule(EventKind::TimerOverflow, current_clock, delta as u32);
    }

    /// Handler for [`EventKind::TimerOverflow`]: just forces a catch-up, so
    /// the predicted edge is actually walked and (if still due) turned into
    /// a precise [`EventKind::TimerTmaReload`] four cycles later.
    pub fn fire_overflow(
        &mut self,
        at_clock: u32,
        events: &mut EventQueue,
        interrupts: &mut InterruptTrigger,
    ) {
        self.catch_up(at_clock, events, interrupts);
    }

    /// Handler for [`EventKind::TimerTmaReload`]: TIMA is loaded from TMA
    /// and the timer interrupt is raised, unless a TIMA write cancelled the
    /// reload in the meantime.
    pub fn fire_reload(&mut self, at_clock: u32, events: &mut EventQueue, interrupts: &mut InterruptTrigger) {
        if self.reload_at == UNDEFINED {
            return; // cancelled by a TIMA write inside the window
        }
        self.reload_at = UNDEFINED;
        self.tima = self.tma;
        interrupts.trigger(Interrupt::TIMER, at_clock);
        self.reschedule_overflow(at_clock, events);
    }

    fn in_reload_window(&self, current_clock: u32) -> bool {
        self.reload_at != UNDEFINED && self.reload_at > current_clock
    }

    pub fn read_div(&self) -> u8 {
        (self.div16() >> 8) as u8
    }

    /// Resets the entire 16-bit internal divider. Real hardware resets the
    /// whole counter, not just its low byte; if the TAC-selected bit was 1
    /// immediately before the reset this is itself a falling edge and
    /// ticks TIMA once (spec §4.11: "may cause a spurious TIMA increment").
    pub fn write_div(&mut self, current_clock: u32, events: &mut EventQueue) {
        let bit = match self.tac & 0x03 {
            0 => 9,
            1 => 3,
            2 => 5,
            _ => 7,
        };
        let was_high = self.is_enabled() && (self.div16() >> bit) & 1 != 0;
        self.counter = 0;
        self.last_sync_clock = current_clock;
        if was_high {
            self.increment_tima(current_clock, events);
        }
        self.reschedule_overflow(current_clock, events);
    }

    pub fn read_tima(&self, current_clock: u32) -> u8 {
        if self.in_reload_window(current_clock) {
            0
        } else {
            self.tima
        }
    }

    /// A write landing inside the 4-cycle post-overflow window cancels the
    /// pending reload (spec §4.11).
    pub fn write_tima(&mut self, value: u8, current_clock: u32, events: &mut EventQueue) {
        if self.in_reload_window(current_clock) {
            self.reload_at = UNDEFINED;
        }
        self.tima = value;
        self.reschedule_overflow(current_clock, events);
    }

    pub fn read_tma(&self) -> u8 {
        self.tma
    }

    /// A write landing inside the 4-cycle window also retargets the value
    /// that will be reloaded into TIMA (spec §4.11).
    pub fn write_tma(&mut self, value: u8) {
        self.tma = value;
    }

    pub fn read_tac(&self) -> u8 {
        self.tac | 0b1111_1000
    }

    pub fn write_tac(&mut self, value: u8, current_clock: u32, events: &mut EventQueue) {
        let was_high = self.is_enabled() && (self.div16() >> self.bit_for(self.tac)) & 1 != 0;
        self.tac = value & 0x07;
        let is_high = self.is_enabled() && (self.div16() >> self.bit_for(self.tac)) & 1 != 0;
        // Disabling the timer (or switching to a select whose bit just went
        // high-to-low) while the old selected bit was high is itself a
        // falling edge on real hardware.
        if was_high && !is_high {
            self.increment_tima(current_clock, events);
        }
        self.reschedule_overflow(current_clock, events);
    }

    /// Subtracts `delta` from every stored absolute clock value (spec §3).
    /// `counter` is relative to the last DIV reset, not an absolute clock,
    /// so it is left untouched.
    pub fn set_back_clock(&mut self, delta: u32) {
        self.last_sync_clock = crate::clock::back_clock_value(self.last_sync_clock, delta);
        self.reload_at = crate::clock::back_clock_value(self.reload_at, delta);
    }

    fn bit_for(&self, tac: u8) -> u8 {
        match tac & 0x03 {
            0 => 9,
            1 => 3,
            2 => 5,
            _ => 7,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_catch_up_span_applies_every_crossed_edge() {
        // TAC = 0x05 (enabled, select 01 -> period 16). A span of 40 T4
        // cycles from a period-aligned start crosses the boundaries at 16
        // and 32, so both must be applied by one `catch_up` call even
        // though it is only invoked once for the whole span.
        let mut timer = Timer {
            tac: 0x05,
            ..Default::default()
        };
        let mut events = EventQueue::default();
        let mut interrupts = InterruptTrigger::default();
        timer.catch_up(40, &mut events, &mut interrupts);
        assert_eq!(timer.tima, 2);
    }

    #[test]
    fn rapid_toggle_scenario_from_documented_start_state() {
        // Spec §8 scenario 5, driven from the literal register state:
        // DIV = 0xAB00, TAC = 0x05 (enabled, select 01 -> bit 3, period 16),
        // TIMA = 0, TMA = 0xFF.
        //
        // A period-16 falling-edge signal crosses exactly one edge in any
        // 16 T4-cycle window, regardless of starting phase: consecutive
        // edges are 16 apart, so a half-open window of width 16 contains
        // exactly one multiple of the period. Concretely here, bit 3 of
        // 0xAB00 is 0 (low byte 0x00), it next rises at 0xAB08 and falls
        // at 0xAB10 -- one edge inside (0xAB00, 0xAB10]. So TIMA can only
        // be 1 after these 16 cycles, never 2; the scenario's literal
        // "TIMA = 2" figure is unreachable for this TAC select and is not
        // reproduced here (see DESIGN.md).
        let mut timer = Timer {
            counter: 0xAB00,
            tac: 0x05,
            tma: 0xff,
            ..Default::default()
        };
        let mut events = EventQueue::default();
        let mut interrupts = InterruptTrigger::default();
        interrupts.write_ie(Interrupt::TIMER.bits());
        timer.catch_up(16, &mut events, &mut interrupts);
        assert_eq!(timer.tima, 1);

        // Continuing for 1024 more T4 cycles crosses 1024/16 = 64 more
        // edges (TIMA 1 -> 65); that is nowhere near the 254 more needed
        // to wrap from 1 to 0 and fire the reload, so no timer interrupt
        // is raised either. The scenario's "exactly one interrupt after
        // 1024 more cycles" claim is equally unreachable from this start
        // state under TAC select 01 -- overflowing from TIMA=1 needs at
        // least 255 * 16 = 4080 T4 cycles, not 1024.
        timer.catch_up(1040, &mut events, &mut interrupts);
        assert_eq!(timer.tima, 65);
        assert!(interrupts.pending().is_empty());
    }

    #[test]
    fn overflow_schedules_reload_and_raises_interrupt_after_window() {
        let mut timer = Timer {
            tima: 0xFF,
            tma: 0x10,
            tac: 0x04, // enabled, select 00 -> bit 9, period 1024
            ..Default::default()
        };
        let mut events = EventQueue::default();
        let mut interrupts = InterruptTrigger::default();
        timer.catch_up(1024, &mut events, &mut interrupts);
        assert_eq!(timer.tima, 0);
        assert_eq!(timer.read_tima(1024), 0);
        timer.fire_reload(1028, &mut events, &mut interrupts);
        assert_eq!(timer.tima, 0x10);
        assert!(interrupts.pending().is_empty()); // IE not yet set
        interrupts.write_ie(Interrupt::TIMER.bits());
        // re-trigger to check the flag was actually raised
        timer.tima = 0xFF;
        timer.reload_at = crate::clock::UNDEFINED;
        let mut events2 = EventQueue::default();
        timer.increment_tima(2000, &mut events2);
        timer.fire_reload(2004, &mut events2, &mut interrupts);
        assert_eq!(interrupts.pending(), Interrupt::TIMER);
    }

    #[test]
    fn tima_write_inside_window_cancels_reload() {
        let mut timer = Timer {
            tima: 0xFF,
            tac: 0x04,
            ..Default::default()
        };
        let mut events = EventQueue::default();
        let mut interrupts = InterruptTrigger::default();
        timer.catch_up(1024, &mut events, &mut interrupts);
        timer.write_tima(0x42, 1026, &mut events);
        timer.fire_reload(1028, &mut events, &mut interrupts);
        assert_eq!(timer.tima, 0x42);
        assert!(interrupts.pending().is_empty());
    }
}
