//! Merges IF flag writes with peripheral-raised interrupts timestamped at a
//! past clock (spec §4.2). The trigger itself does not store a clock; the
//! `at_clock` parameter exists so callers can log/assert ordering, matching
//! spec's "triggered with a past timestamp nevertheless take effect at the
//! CPU's current clock" rule.

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Interrupt: u8 {
        const VBLANK = 1 << 0;
        const LCD    = 1 << 1;
        const TIMER  = 1 << 2;
        const SERIAL = 1 << 3;
        const JOYPAD = 1 << 4;
    }
}

#[derive(Clone, Default)]
pub struct InterruptTrigger {
    flag: Interrupt,
    enable: Interrupt,
}

impl InterruptTrigger {
    pub fn read_if(&self) -> u8 {
        self.flag.bits() | 0b1110_0000
    }

    pub fn write_if(&mut self, value: u8) {
        self.flag = Interrupt::from_bits_retain(value & 0x1f);
    }

    pub fn read_ie(&self) -> u8 {
        self.enable.bits()
    }

    pub fn write_ie(&mut self, value: u8) {
        self.enable = Interrupt::from_bits_retain(value & 0x1f);
    }

    /// Sets `interrupt` in IF. `at_clock` is informational only: by the time
    /// a peripheral calls this, it has already caught its own state up to
    /// that clock; the bit is visible to the CPU starting at its current
    /// clock regardless of how far in the past `at_clock` is.
    pub fn trigger(&mut self, interrupt: Interrupt, at_clock: u32) {
        log::trace!("interrupt {interrupt:?} raised at clock {at_clock}");
        self.flag.insert(interrupt);
    }

    pub fn pending(&self) -> Interrupt {
        self.flag & self.enable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unused_if_bits_read_as_one() {
        let trigger = InterruptTrigger::default();
        assert_eq!(trigger.read_if() & 0b1110_0000, 0b1110_0000);
    }

    #[test]
    fn trigger_sets_bit_regardless_of_at_clock() {
        let mut trigger = InterruptTrigger::default();
        trigger.trigger(Interrupt::TIMER, 0);
        assert!(trigger.read_if() & Interrupt::TIMER.bits() != 0);
    }

    #[test]
    fn pending_masks_by_enable() {
        let mut trigger = InterruptTrigger::default();
        trigger.trigger(Interrupt::TIMER, 0);
        trigger.trigger(Interrupt::VBLANK, 0);
        trigger.write_ie(Interrupt::TIMER.bits());
        assert_eq!(trigger.pending(), Interrupt::TIMER);
    }
}
