//! Independently predicts the next clock of each of the four STAT IRQ
//! sources and keeps the event queue's four `lcd_interrupt_*` slots in
//! sync (spec §4.8, SPEC_FULL §11.1).

use crate::{
    clock::{CYCLES_PER_FRAME, CYCLES_PER_LINE, UNDEFINED},
    event::{EventKind, EventQueue},
    interrupt::{Interrupt, InterruptTrigger},
};

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct StatEnable: u8 {
        const LYC_INT    = 1 << 6;
        const MODE2_INT  = 1 << 5;
        const MODE1_INT  = 1 << 4;
        const MODE0_INT  = 1 << 3;
    }
}

pub struct StatSchedulerInputs<'a> {
    pub frame_start: u32,
    pub lyc: u8,
    pub scx: u8,
    pub enable: StatEnable,
    pub is_first_frame: bool,
    pub is_cgb: bool,
    pub current_clock: u32,
    pub current_line: u8,
    pub current_line_clks: u16,
    pub events: &'a mut EventQueue,
}

/// Recomputes and (re)schedules all four STAT sources. Call on any write to
/// STAT/SCX/LYC/LCDC, or after any of the four event handlers fires.
pub fn reschedule(inputs: StatSchedulerInputs<'_>) {
    let StatSchedulerInputs {
        frame_start,
        lyc,
        scx,
        enable,
        is_first_frame,
        is_cgb,
        current_clock,
        current_line,
        current_line_clks,
        events,
    } = inputs;

    if frame_start == UNDEFINED {
        events.remove(EventKind::LcdInterruptVblank);
        events.remove(EventKind::LcdInterruptLyc);
        events.remove(EventKind::LcdInterruptMode0);
        events.remove(EventKind::LcdInterruptMode2);
        return;
    }

    schedule_vblank(frame_start, current_clock, events);

    if enable.contains(StatEnable::LYC_INT) && lyc < 154 {
        schedule_lyc(frame_start, lyc, current_line, current_line_clks, current_clock, is_cgb, events);
    } else {
        events.remove(EventKind::LcdInterruptLyc);
    }

    if enable.contains(StatEnable::MODE2_INT) {
        schedule_mode2(frame_start, current_clock, events);
    } else {
        events.remove(EventKind::LcdInterruptMode2);
    }

    if enable.contains(StatEnable::MODE0_INT) {
        schedule_mode0(frame_start, scx, is_first_frame, current_clock, events);
    } else {
        events.remove(EventKind::LcdInterruptMode0);
    }
}

fn roll_forward(mut cycle: u32, current_clock: u32) -> u32 {
    if cycle <= current_clock {
        let diff = current_clock - cycle;
        cycle += CYCLES_PER_FRAME * (diff / CYCLES_PER_FRAME + 1);
    }
    cycle
}

fn schedule_vblank(frame_start: u32, current_clock: u32, events: &mut EventQueue) {
    let cycle = roll_forward(frame_start.wrapping_add(144 * CYCLES_PER_LINE), current_clock);
    events.schedule(EventKind::LcdInterruptVblank, current_clock, cycle - current_clock);
}

fn schedule_lyc(
    frame_start: u32,
    lyc: u8,
    current_line: u8,
    current_line_clks: u16,
    current_clock: u32,
    is_cgb: bool,
    events: &mut EventQueue,
) {
    let raw = frame_start.wrapping_add(u32::from(lyc) * CYCLES_PER_LINE);
    let immediate = lyc == current_line
        && u32::from(current_line_clks) < CYCLES_PER_LINE - if is_cgb { 2 } else { 0 };
    let cycle = if immediate {
        current_clock
    } else {
        roll_forward(raw, current_clock)
    };
    events.schedule(EventKind::LcdInterruptLyc, current_clock, cycle - current_clock);
}

fn schedule_mode2(frame_start: u32, current_clock: u32, events: &mut EventQueue) {
    // Fires 1 T4 before the target scanline, skipping v-blank scanlines (144..154).
    let mut target_line = {
        let elapsed = current_clock.wrapping_sub(frame_start) % CYCLES_PER_FRAME;
        ((elapsed / CYCLES_PER_LINE) as u8).wrapping_add(1)
    };
    if target_line >= 154 {
        target_line = 0;
    }
    if (144..154).contains(&target_line) {
        target_line = 0;
    }
    let raw = frame_start.wrapping_add(u32::from(target_line) * CYCLES_PER_LINE);
    let cycle = roll_forward(raw.wrapping_sub(1), current_clock);
    events.schedule(EventKind::LcdInterruptMode2, current_clock, cycle - current_clock);
}

fn schedule_mode0(
    frame_start: u32,
    scx: u8,
    is_first_frame: bool,
    current_clock: u32,
    events: &mut EventQueue,
) {
    let elapsed = current_clock.wrapping_sub(frame_start) % CYCLES_PER_FRAME;
    let mut line = (elapsed / CYCLES_PER_LINE) as u8;
    if line >= 144 {
        line = 0;
    }
    let m0_delay: i32 = if is_first_frame && line == 0 { -1 } else { 1 };
    let within_line = 80 + 172 + i32::from(scx & 7) + m0_delay;
    let raw = frame_start
        .wrapping_add(u32::from(line) * CYCLES_PER_LINE)
        .wrapping_add(within_line as u32);
    let cycle = roll_forward(raw, current_clock);
    events.schedule(EventKind::LcdInterruptMode0, current_clock, cycle - current_clock);
}

/// Handler for any of the four `lcd_interrupt_*` events: raises `lcd`, and
/// for v-blank additionally raises `vblank` and (if enabled) the mode-1
/// STAT source.
pub fn fire(kind: EventKind, enable: StatEnable, at_clock: u32, interrupts: &mut InterruptTrigger) {
    match kind {
        EventKind::LcdInterruptVblank => {
            interrupts.trigger(Interrupt::VBLANK, at_clock);
            if enable.contains(StatEnable::MODE1_INT) {
                interrupts.trigger(Interrupt::LCD, at_clock);
            }
        }
        EventKind::LcdInterruptLyc
        | EventKind::LcdInterruptMode0
        | EventKind::LcdInterruptMode2 => {
            interrupts.trigger(Interrupt::LCD, at_clock);
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vblank_scheduled_at_line_144() {
        let mut events = EventQueue::default();
        schedule_vblank(0, 0, &mut events);
        assert_eq!(events.cycle_of(EventKind::LcdInterruptVblank), Some(144 * 456));
    }

    #[test]
    fn vblank_rolls_forward_past_frame() {
        let mut events = EventQueue::default();
        schedule_vblank(0, 144 * 456 + 10, &mut events);
        assert_eq!(
            events.cycle_of(EventKind::LcdInterruptVblank),
            Some(144 * 456 + 70224)
        );
    }

    #[test]
    fn lyc_fires_immediately_when_already_matching() {
        let mut events = EventQueue::default();
        schedule_lyc(0, 5, 5, 10, 456 * 5 + 10, false, &mut events);
        assert_eq!(events.cycle_of(EventKind::LcdInterruptLyc), Some(456 * 5 + 10));
    }
}
