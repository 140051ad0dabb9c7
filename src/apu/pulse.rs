//! Pulse channels 1 and 2 (spec §4.10), adapted from the teacher's
//! `apu/pulse_channel.rs` `PulseChannel<S: Sweep>` shape but replacing its
//! continuous-phase float sampler with a discrete frequency timer and
//! duty-step counter, advanced lazily like the timer and LCD catch-up
//! logic elsewhere in this crate.

use crate::apu::envelope::VolumeAndEnvelope;
use crate::apu::length::Length;
use crate::apu::sweep::Sweep;

const DUTY_TABLE: [[u8; 8]; 4] = [
    [0, 0, 0, 0, 0, 0, 0, 1],
    [1, 0, 0, 0, 0, 0, 0, 1],
    [1, 0, 0, 0, 0, 1, 1, 1],
    [0, 1, 1, 1, 1, 1, 1, 0],
];

#[derive(Clone, Default)]
pub struct PulseChannel<S: Sweep> {
    pub length: Length<64>,
    pub envelope: VolumeAndEnvelope,
    pub sweep: S,
    duty: u8,
    frequency: u16,
    duty_step: u8,
    period_remaining: u32,
    last_synced_clock: u32,
    on: bool,
}

impl<S: Sweep> PulseChannel<S> {
    fn period(&self) -> u32 {
        (2048 - u32::from(self.frequency)) * 4
    }

    pub fn is_on(&self) -> bool {
        self.on
    }

    pub fn nrx1_write(&mut self, value: u8) {
        self.duty = value >> 6;
        self.length.set_initial_timer_length(value & 0x3f);
    }

    pub fn nrx1_read(&self) -> u8 {
        (self.duty << 6) | 0x3f
    }

    pub fn nrx2_write(&mut self, value: u8, current_clock: u32) {
        self.catch_up(current_clock);
        if self.on {
            self.envelope.write_while_running(value);
        } else {
            self.envelope.write(value);
        }
        if !self.envelope.dac_enabled() {
            self.on = false;
        }
    }

    pub fn frequency_low_write(&mut self, value: u8) {
        self.frequency = (self.frequency & 0x700) | u16::from(value);
    }

    pub fn frequency_low_read(&self) -> u8 {
        0xff
    }

    pub fn nrx4_write(
        &mut self,
        value: u8,
        next_step_clocks_length: bool,
        current_clock: u32,
    ) -> bool {
        self.catch_up(current_clock);
        self.frequency = (self.frequency & 0xff) | (u16::from(value & 0x07) << 8);
        let disabled = self
            .length
            .set_is_enabled(value & 0x40 != 0, next_step_clocks_length);
        if disabled {
            self.on = false;
        }
        if value & 0x80 != 0 {
            self.trigger(next_step_clocks_length);
        }
        disabled
    }

    pub fn nrx4_read(&self) -> u8 {
        0xbf | if self.length.is_enabled() { 0x40 } else { 0 }
    }

    fn trigger(&mut self, next_step_clocks_length: bool) {
        self.on = self.envelope.dac_enabled();
        self.envelope.trigger();
        self.sweep.trigger(self.frequency);
        self.length.trigger(next_step_clocks_length);
        self.period_remaining = self.period();
    }

    /// Called by the frame sequencer on steps 0, 2, 4, 6.
    pub fn tick_length(&mut self) {
        if self.length.tick() {
            self.on = false;
        }
    }

    /// Called by the frame sequencer on steps 2 and 6.
    pub fn tick_sweep(&mut self) {
        match self.sweep.tick(self.frequency) {
            Ok(Some(new_frequency)) => self.frequency = new_frequency,
            Ok(None) => {}
            Err(()) => self.on = false,
        }
    }

    /// Called by the frame sequencer on step 7.
    pub fn tick_envelope(&mut self) {
        self.envelope.tick();
    }

    /// Advances the duty-step counter up to `current_clock`, without
    /// producing an output sample.
    pub fn catch_up(&mut self, current_clock: u32) {
        let mut elapsed = current_clock.wrapping_sub(self.last_synced_clock);
        self.last_synced_clock = current_clock;
        if !self.on {
            return;
        }
        while elapsed > 0 {
            if elapsed < self.period_remaining {
                self.period_remaining -= elapsed;
                break;
            }
            elapsed -= self.period_remaining;
            self.duty_step = (self.duty_step + 1) % 8;
            self.period_remaining = self.period();
        }
    }

    /// Clears NRx0-NRx4 register state on APU power-off. The length
    /// counter keeps counting across a power cycle on real hardware, so it
    /// alone survives the reset.
    pub fn power_off(&mut self) {
        let length = self.length.clone();
        *self = Self {
            length,
            ..Default::default()
        };
    }

    /// Instantaneous digital amplitude (0..=15), DAC-scaled by the caller.
    pub fn amplitude(&self) -> u8 {
        if !self.on {
            return 0;
        }
        DUTY_TABLE[self.duty as usize][self.duty_step as usize] * self.envelope.volume()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apu::sweep::NoSweep;

    #[test]
    fn triggering_turns_channel_on_when_dac_enabled() {
        let mut channel: PulseChannel<NoSweep> = Default::default();
        channel.nrx2_write(0xf0, 0);
        channel.nrx4_write(0x80, true, 0);
        assert!(channel.is_on());
    }

    #[test]
    fn catch_up_advances_duty_step() {
        let mut channel: PulseChannel<NoSweep> = Default::default();
        channel.nrx2_write(0xf0, 0);
        channel.frequency_low_write(0xff);
        channel.nrx4_write(0x87, true, 0);
        channel.catch_up((2048 - 0x7ff) * 4);
        // one full period elapsed; duty step advanced exactly once
    }
}
