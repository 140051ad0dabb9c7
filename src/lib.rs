//! Cycle-accurate DMG/CGB core: the scheduling substrate (spec §4.1),
//! LCD/PPU pipeline (§4.3-§4.8), APU (§4.9-§4.10), and timer (§4.11),
//! wired together behind the CPU-facing register window of spec §6.
//!
//! The CPU, MBC, DMA/HDMA engine, joypad and serial-link peripheral logic
//! are external collaborators (spec §1); [`Core`] exposes their event
//! kinds and the handful of registers they share the 0xFF00-0xFF7F window
//! with, but does not implement them. A host binds a concrete CPU decoder
//! against [`Core::read`]/[`Core::write`]/[`Core::advance`] and drains
//! [`Core::poll_and_dispatch`] between instructions, exactly as spec §2's
//! `emulate(cycles)` loop describes.

#![no_std]

extern crate alloc;

pub mod apu;
pub mod clock;
pub mod device;
pub mod error;
pub mod event;
pub mod interrupt;
pub mod lcd;
pub mod probe;
pub mod rom;
pub mod serial;
pub mod timer;

use alloc::vec::Vec;

use apu::Apu;
use clock::{BACK_CLOCK_WATERMARK, Clock};
use device::{ColorCorrection, DeviceVariant};
use error::ConstructionError;
use event::{EventKind, EventQueue};
use interrupt::{Interrupt, InterruptTrigger};
use lcd::Lcd;
use probe::TestProbe;
use rom::RomHeader;
use serial::{Serial, SerialControl};
use timer::Timer;

/// T4-cycle duration of one serial bit transfer at the normal 8192 Hz
/// internal clock (`4_194_304 / 8192`); the CGB fast-clock bit (SC.1)
/// divides this by 32.
const SERIAL_BIT_PERIOD_NORMAL: u32 = 512;
const SERIAL_BIT_PERIOD_FAST: u32 = 16;
const SERIAL_BITS_PER_BYTE: u32 = 8;

/// Ties every in-scope peripheral to the shared clock and event queue
/// (spec §2/§5) and exposes the CPU-facing register window (spec §6).
pub struct Core {
    clock: Clock,
    events: EventQueue,
    interrupts: InterruptTrigger,
    timer: Timer,
    serial: Serial,
    lcd: Lcd,
    apu: Apu,
    probe: TestProbe,
    is_cgb: bool,
}

impl Core {
    /// Constructs the core from a ROM image and an explicit, never
    /// auto-detected device variant (spec §3 "Lifecycle", §6 "Device
    /// variant selection"). Fails only if the ROM is too short to contain
    /// a cartridge header (spec §7).
    pub fn new(rom: &[u8], variant: DeviceVariant) -> Result<Self, ConstructionError> {
        let header = RomHeader::parse(rom)?;
        let is_cgb = variant.is_cgb();
        log::debug!(
            "core constructed: variant={variant:?} nintendo_published={} title_hash=0x{:02x}",
            header.is_nintendo_published,
            header.title_hash
        );
        Ok(Self {
            clock: Clock::default(),
            events: EventQueue::default(),
            interrupts: InterruptTrigger::default(),
            timer: Timer::default(),
            serial: Serial::default(),
            lcd: Lcd::new(&header, is_cgb),
            apu: Apu::new(is_cgb),
            probe: TestProbe::default(),
            is_cgb,
        })
    }

    pub fn is_cgb(&self) -> bool {
        self.is_cgb
    }

    pub fn current_clock(&self) -> u32 {
        self.clock.current()
    }

    pub fn is_double_speed(&self) -> bool {
        self.clock.is_double_speed()
    }

    /// Toggles the CPU's cycles-per-step quantum (spec §4.1). Already
    /// scheduled event cycles are absolute and are not rescaled.
    pub fn set_double_speed(&mut self, double_speed: bool) {
        self.clock.set_double_speed(double_speed);
        self.apu
            .set_double_speed(double_speed, self.clock.current(), &mut self.events);
    }

    pub fn set_color_correction(&mut self, correction: ColorCorrection) {
        self.lcd.set_color_correction(correction);
    }

    pub fn front_buffer(&self) -> &[[u8; 4]; lcd::WIDTH * lcd::HEIGHT] {
        self.lcd.front_buffer()
    }

    pub fn take_frame_ready(&mut self) -> bool {
        self.lcd.take_frame_ready()
    }

    /// Drains and returns every PCM frame generated so far (spec §6).
    pub fn take_samples(&mut self) -> Vec<(i16, i16)> {
        self.apu.take_samples()
    }

    pub fn probe(&self) -> &TestProbe {
        &self.probe
    }

    /// Called by the (external) CPU decoder on `LD B, B` (spec §6).
    pub fn mark_test_finished(&mut self) {
        self.probe.mark_finished();
    }

    /// Called by the (external) CPU decoder on an undefined opcode (spec §6).
    pub fn mark_invalid_opcode(&mut self, opcode: u8) {
        self.probe.mark_invalid_opcode(opcode);
    }

    /// Advances the shared clock by `delta` T4 cycles (a 2- or 4-cycle CPU
    /// quantum per spec §2), then runs back-clock normalization if the
    /// clock has crossed the high watermark (spec §3).
    pub fn advance(&mut self, delta: u32) {
        self.clock.advance(delta);
        if self.clock.needs_back_clock() {
            self.back_clock(BACK_CLOCK_WATERMARK);
        }
    }

    /// Subtracts `delta` from every live clock value held anywhere in the
    /// core (spec §3 "Periodically... the scheduler invokes
    /// `set_back_clock(Δ)` on every component").
    fn back_clock(&mut self, delta: u32) {
        self.clock.set_back_clock(delta);
        self.events.set_back_clock(delta);
        self.timer.set_back_clock(delta);
        self.lcd.set_back_clock(delta);
        self.apu.set_back_clock(delta);
        log::trace!("back-clock normalization: delta={delta}");
    }

    /// Forces every peripheral owning lazily-computed state to catch up to
    /// the current clock (spec §2 "update_state on demand"). Both
    /// [`Core::read`] and [`Core::write`] call this before touching any
    /// register, per spec §5 ordering guarantee 1.
    fn catch_up_all(&mut self) {
        let now = self.clock.current();
        self.timer.catch_up(now, &mut self.events, &mut self.interrupts);
        self.lcd.catch_up(now, &mut self.events, &mut self.interrupts);
        self.apu.catch_up(now, &mut self.events);
    }

    /// Polls at most one due event and dispatches it to the owning
    /// component (spec §4.12 "Event Scheduler Glue"). Event kinds owned by
    /// an external collaborator (DMA/HDMA engine, CPU speed-switch
    /// sequencing) are returned to the caller unhandled rather than
    /// silently dropped, so the external driver can service them against
    /// the same queue.
    pub fn poll_and_dispatch(&mut self) -> Option<EventKind> {
        let now = self.clock.current();
        loop {
            let (kind, cycle) = self.events.poll(now)?;
            match kind {
                EventKind::LcdInterruptVblank
                | EventKind::LcdInterruptLyc
                | EventKind::LcdInterruptMode0
                | EventKind::LcdInterruptMode2 => {
                    self.lcd.fire(kind, cycle, &mut self.interrupts);
                    self.lcd.catch_up(now, &mut self.events, &mut self.interrupts);
                    return Some(kind);
                }
                EventKind::TimerOverflow => {
                    self.timer.fire_overflow(cycle, &mut self.events, &mut self.interrupts);
                    return Some(kind);
                }
                EventKind::TimerTmaReload => {
                    self.timer.fire_reload(cycle, &mut self.events, &mut self.interrupts);
                    return Some(kind);
                }
                EventKind::SerialTransfer => {
                    self.serial.finish_transfer();
                    self.interrupts.trigger(Interrupt::SERIAL, cycle);
                    return Some(kind);
                }
                EventKind::ApuFrameSequencer => {
                    self.apu.fire(now, &mut self.events);
                    return Some(kind);
                }
                // Closed per spec §3's ~15-entry enumeration but owned by
                // collaborators outside this crate's scope (spec §1).
                EventKind::HdmaStep
                | EventKind::StartHdma
                | EventKind::DmaStep
                | EventKind::SwitchDoubleSpeed => {
                    return Some(kind);
                }
            }
        }
    }

    // --- register window (spec §6) ---

    pub fn read(&mut self, address: u16) -> u8 {
        self.catch_up_all();
        let now = self.clock.current();
        match address {
            0xff00 => 0xff, // joypad: external collaborator
            0xff01 => self.serial.read_sb(),
            0xff02 => self.serial.read_sc(),
            0xff04 => self.timer.read_div(),
            0xff05 => self.timer.read_tima(now),
            0xff06 => self.timer.read_tma(),
            0xff07 => self.timer.read_tac(),
            0xff0f => self.interrupts.read_if(),
            0xff10 => self.apu.read_nr10(),
            0xff11 => self.apu.read_nr11(),
            0xff12 => self.apu.read_nr12(),
            0xff13 => self.apu.read_nr13(),
            0xff14 => self.apu.read_nr14(),
            0xff16 => self.apu.read_nr21(),
            0xff17 => self.apu.read_nr22(),
            0xff18 => self.apu.read_nr23(),
            0xff19 => self.apu.read_nr24(),
            0xff1a => self.apu.read_nr30(),
            0xff1c => self.apu.read_nr32(),
            0xff1e => self.apu.read_nr34(),
            0xff21 => self.apu.read_nr42(),
            0xff22 => self.apu.read_nr43(),
            0xff23 => self.apu.read_nr44(),
            0xff24 => self.apu.read_nr50(),
            0xff25 => self.apu.read_nr51(),
            0xff26 => self.apu.read_nr52(),
            0xff30..=0xff3f => self.apu.read_wave_ram(usize::from(address - 0xff30)),
            0xff40 => self.lcd.read_lcdc(),
            0xff41 => self.lcd.read_stat(now),
            0xff42 => self.lcd.read_scy(),
            0xff43 => self.lcd.read_scx(),
            0xff44 => self.lcd.read_ly(now),
            0xff45 => self.lcd.read_lyc(),
            0xff46 => 0xff, // OAM DMA: external collaborator
            0xff47 => self.lcd.read_bgp(),
            0xff48 => self.lcd.read_obp0(),
            0xff49 => self.lcd.read_obp1(),
            0xff4a => self.lcd.read_wy(),
            0xff4b => self.lcd.read_wx(),
            0xff4d => 0x7e | (u8::from(self.clock.is_double_speed()) << 7),
            0xff4f => self.lcd.read_vbk(),
            0xff51..=0xff55 => 0xff, // HDMA: external collaborator
            0xff68 => self.lcd.read_bcps(),
            0xff69 => self.lcd.read_bcpd(),
            0xff6a => self.lcd.read_ocps(),
            0xff6b => self.lcd.read_ocpd(),
            0xff80..=0xfffe => 0xff, // HRAM: owned by the external memory subsystem
            0xffff => self.interrupts.read_ie(),
            0x8000..=0x9fff => self.lcd.read_vram(address - 0x8000, now),
            0xfe00..=0xfe9f => {
                let accessible = self.lcd.oam_accessible(now);
                self.lcd.read_oam((address - 0xfe00) as u8, accessible)
            }
            _ => 0xff,
        }
    }

    pub fn write(&mut self, address: u16, value: u8) {
        self.catch_up_all();
        let now = self.clock.current();
        match address {
            0xff00 => {} // joypad: external collaborator
            0xff01 => self.serial.write_sb(value),
            0xff02 => self.write_sc(value, now),
            0xff04 => {
                self.timer.write_div(now, &mut self.events);
                self.apu.notify_div_reset(now, &mut self.events);
            }
            0xff05 => self.timer.write_tima(value, now, &mut self.events),
            0xff06 => self.timer.write_tma(value),
            0xff07 => self.timer.write_tac(value, now, &mut self.events),
            0xff0f => self.interrupts.write_if(value),
            0xff10 => self.apu.write_nr10(value, now, &mut self.events),
            0xff11 => self.apu.write_nr11(value, now, &mut self.events),
            0xff12 => self.apu.write_nr12(value, now, &mut self.events),
            0xff13 => self.apu.write_nr13(value, now, &mut self.events),
            0xff14 => self.apu.write_nr14(value, now, &mut self.events),
            0xff16 => self.apu.write_nr21(value, now, &mut self.events),
            0xff17 => self.apu.write_nr22(value, now, &mut self.events),
            0xff18 => self.apu.write_nr23(value, now, &mut self.events),
            0xff19 => self.apu.write_nr24(value, now, &mut self.events),
            0xff1a => self.apu.write_nr30(value, now, &mut self.events),
            0xff1b => self.apu.write_nr31(value, now, &mut self.events),
            0xff1c => self.apu.write_nr32(value, now, &mut self.events),
            0xff1d => self.apu.write_nr33(value, now, &mut self.events),
            0xff1e => self.apu.write_nr34(value, now, &mut self.events),
            0xff20 => self.apu.write_nr41(value, now, &mut self.events),
            0xff21 => self.apu.write_nr42(value, now, &mut self.events),
            0xff22 => self.apu.write_nr43(value, now, &mut self.events),
            0xff23 => self.apu.write_nr44(value, now, &mut self.events),
            0xff24 => self.apu.write_nr50(value, now, &mut self.events),
            0xff25 => self.apu.write_nr51(value, now, &mut self.events),
            0xff26 => self.apu.write_nr52(value, now, &mut self.events),
            0xff30..=0xff3f => self
                .apu
                .write_wave_ram(usize::from(address - 0xff30), value, now, &mut self.events),
            0xff40 => self.lcd.write_lcdc(value, now, &mut self.events, &mut self.interrupts),
            0xff41 => self.lcd.write_stat(value, now, &mut self.events, &mut self.interrupts),
            0xff42 => self.lcd.write_scy(value, now, &mut self.events, &mut self.interrupts),
            0xff43 => self.lcd.write_scx(value, now, &mut self.events, &mut self.interrupts),
            0xff44 => {} // LY is read-only
            0xff45 => self.lcd.write_lyc(value, now, &mut self.events, &mut self.interrupts),
            0xff46 => {} // OAM DMA: external collaborator
            0xff47 => self.lcd.write_bgp(value, now, &mut self.events, &mut self.interrupts),
            0xff48 => self.lcd.write_obp0(value),
            0xff49 => self.lcd.write_obp1(value),
            0xff4a => self.lcd.write_wy(value, now, &mut self.events, &mut self.interrupts),
            0xff4b => self.lcd.write_wx(value, now, &mut self.events, &mut self.interrupts),
            0xff4d => {} // KEY1: the external CPU driver calls `Core::set_double_speed` on STOP
            0xff4f => self.lcd.write_vbk(value),
            0xff51..=0xff55 => {} // HDMA: external collaborator
            0xff68 => self.lcd.write_bcps(value),
            0xff69 => self.lcd.write_bcpd(value),
            0xff6a => self.lcd.write_ocps(value),
            0xff6b => self.lcd.write_ocpd(value),
            0xff80..=0xfffe => {} // HRAM: owned by the external memory subsystem
            0xffff => self.interrupts.write_ie(value),
            0x8000..=0x9fff => self.lcd.write_vram(address - 0x8000, value, now),
            0xfe00..=0xfe9f => {
                let accessible = self.lcd.oam_accessible(now);
                self.lcd.write_oam((address - 0xfe00) as u8, value, accessible)
            }
            _ => {}
        }
    }

    /// Schedules (or cancels) the `serial_transfer` event per spec §4.1's
    /// event-scheduler-glue role: the bit-shift timing itself is internal
    /// clock-sourced only; an externally clocked transfer (SC.0 clear)
    /// waits on the link partner instead and is not scheduled here.
    fn write_sc(&mut self, value: u8, current_clock: u32) {
        let starts_internal_transfer = self.serial.write_sc(value);
        if starts_internal_transfer {
            let sc = SerialControl::from_bits_retain(self.serial.read_sc());
            let bit_period = if sc.contains(SerialControl::CLOCK_SPEED) {
                SERIAL_BIT_PERIOD_FAST
            } else {
                SERIAL_BIT_PERIOD_NORMAL
            };
            self.events.schedule(
                EventKind::SerialTransfer,
                current_clock,
                bit_period * SERIAL_BITS_PER_BYTE,
            );
        } else {
            self.events.remove(EventKind::SerialTransfer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rom() -> alloc::vec::Vec<u8> {
        alloc::vec![0u8; 0x150]
    }

    fn core() -> Core {
        Core::new(&rom(), DeviceVariant::Dmg).unwrap()
    }

    #[test]
    fn construction_rejects_truncated_rom() {
        let short = alloc::vec![0u8; 8];
        assert_eq!(
            Core::new(&short, DeviceVariant::Dmg).unwrap_err(),
            ConstructionError::RomTooShort { len: 8 }
        );
    }

    #[test]
    fn unused_register_window_reads_high() {
        let mut c = core();
        assert_eq!(c.read(0xff00), 0xff);
    }

    #[test]
    fn lcdc_write_then_read_round_trips() {
        let mut c = core();
        c.write(0xff40, 0x91);
        assert_eq!(c.read(0xff40), 0x91);
    }

    #[test]
    fn enabling_lcd_and_running_a_frame_swaps_buffers() {
        let mut c = core();
        c.write(0xff40, 0x91); // LCD + BG enable
        c.advance(70_224);
        c.catch_up_all_for_test();
        assert!(c.take_frame_ready());
    }

    #[test]
    fn timer_rapid_toggle_scenario() {
        // Spec §8 scenario 5: DIV=0xAB00, TAC=0x05, TIMA=0, TMA=0xFF.
        //
        // The register API cannot set DIV to an arbitrary value (a DIV
        // write always resets the whole 16-bit divider, matching real
        // hardware), so 0xAB00 can't be driven directly here. It doesn't
        // need to be: TAC select 01 watches bit 3, which only depends on
        // the divider's low byte, and 0xAB00's low byte is 0x00 -- the
        // same phase as the divider's power-on value. So running from
        // reset reproduces the same edge-crossing behavior as the
        // documented start state for this TAC select.
        //
        // `src/timer.rs`'s `rapid_toggle_scenario_from_documented_start_state`
        // drives the literal 0xAB00 counter value directly and shows the
        // scenario's "TIMA = 2 after 16 cycles, one interrupt after 1024
        // more" figures are unreachable for TAC select 01 (a period-16
        // edge signal crosses exactly one edge per 16-cycle window from
        // any phase, and overflowing from near-zero needs far more than
        // 1024 more cycles). This test checks the same accurate value
        // through the public API.
        let mut c = core();
        c.write(0xff06, 0xff); // TMA
        c.write(0xff07, 0x05); // TAC enabled, select 01
        c.advance(16);
        assert_eq!(c.read(0xff05), 1);
        c.advance(1024);
        assert_eq!(c.read(0xff05), 65);
    }

    #[test]
    fn serial_internal_clock_transfer_schedules_event() {
        let mut c = core();
        c.write(0xff02, 0x81); // start transfer, internal clock
        assert!(c.events.is_scheduled(EventKind::SerialTransfer));
    }

    #[test]
    fn apu_power_on_then_nr52_reads_back_enabled_bit() {
        let mut c = core();
        c.write(0xff26, 0x80);
        assert_eq!(c.read(0xff26) & 0x80, 0x80);
    }

    impl Core {
        fn catch_up_all_for_test(&mut self) {
            self.catch_up_all();
        }
    }
}
