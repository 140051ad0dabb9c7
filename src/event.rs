//! Single priority event queue shared by every peripheral: at most one
//! pending event per [`EventKind`], polled by the (external) CPU driver
//! between instructions.

use arrayvec::ArrayVec;

use crate::clock::UNDEFINED;

/// Closed enumeration of schedulable event kinds (spec §3: "≈15 entries").
/// Twelve are named explicitly in the spec; the queue's capacity is sized to
/// this enum's cardinality so the `kind -> cycle` array below never
/// reallocates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum EventKind {
    LcdInterruptVblank,
    LcdInterruptLyc,
    LcdInterruptMode0,
    LcdInterruptMode2,
    TimerOverflow,
    TimerTmaReload,
    SerialTransfer,
    ApuFrameSequencer,
    HdmaStep,
    StartHdma,
    DmaStep,
    SwitchDoubleSpeed,
}

impl EventKind {
    const COUNT: usize = 12;

    const ALL: [EventKind; Self::COUNT] = [
        EventKind::LcdInterruptVblank,
        EventKind::LcdInterruptLyc,
        EventKind::LcdInterruptMode0,
        EventKind::LcdInterruptMode2,
        EventKind::TimerOverflow,
        EventKind::TimerTmaReload,
        EventKind::SerialTransfer,
        EventKind::ApuFrameSequencer,
        EventKind::HdmaStep,
        EventKind::StartHdma,
        EventKind::DmaStep,
        EventKind::SwitchDoubleSpeed,
    ];

    fn index(self) -> usize {
        Self::ALL.iter().position(|k| *k == self).unwrap()
    }
}

/// `kind -> cycle` array plus an insertion-sorted `cycle -> kind` view
/// (the `ArrayVec` below) used for next-due lookup, per spec §3.
#[derive(Clone)]
pub struct EventQueue {
    by_kind: [u32; EventKind::COUNT],
    by_cycle: ArrayVec<(u32, EventKind), { EventKind::COUNT }>,
}

impl Default for EventQueue {
    fn default() -> Self {
        Self {
            by_kind: [UNDEFINED; EventKind::COUNT],
            by_cycle: ArrayVec::new(),
        }
    }
}

impl EventQueue {
    /// Schedules `kind` at `current_clock + delta_cycles`, replacing any
    /// existing entry for the same kind.
    pub fn schedule(&mut self, kind: EventKind, current_clock: u32, delta_cycles: u32) {
        self.remove(kind);
        let cycle = current_clock.wrapping_add(delta_cycles);
        self.by_kind[kind.index()] = cycle;
        let pos = self.by_cycle.partition_point(|(c, k)| (*c, *k) < (cycle, kind));
        self.by_cycle.insert(pos, (cycle, kind));
    }

    pub fn remove(&mut self, kind: EventKind) {
        let slot = &mut self.by_kind[kind.index()];
        if *slot == UNDEFINED {
            return;
        }
        *slot = UNDEFINED;
        if let Some(pos) = self.by_cycle.iter().position(|(_, k)| *k == kind) {
            self.by_cycle.remove(pos);
        }
    }

    pub fn is_scheduled(&self, kind: EventKind) -> bool {
        self.by_kind[kind.index()] != UNDEFINED
    }

    pub fn cycle_of(&self, kind: EventKind) -> Option<u32> {
        let v = self.by_kind[kind.index()];
        (v != UNDEFINED).then_some(v)
    }

    /// Returns the earliest entry whose cycle is `<= current_clock`,
    /// removing it. Ties break by `EventKind` enumerator order (derived
    /// `Ord`), matching the `(cycle, kind)` sort key used on insertion.
    pub fn poll(&mut self, current_clock: u32) -> Option<(EventKind, u32)> {
        let (cycle, kind) = *self.by_cycle.first()?;
        if cycle > current_clock {
            return None;
        }
        self.by_cycle.remove(0);
        self.by_kind[kind.index()] = UNDEFINED;
        Some((kind, cycle))
    }

    /// Subtracts `delta` from every non-sentinel scheduled cycle.
    pub fn set_back_clock(&mut self, delta: u32) {
        for v in &mut self.by_kind {
            if *v != UNDEFINED {
                *v = v.saturating_sub(delta);
            }
        }
        for (c, _) in &mut self.by_cycle {
            *c = c.saturating_sub(delta);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unscheduled_is_sentinel() {
        let q = EventQueue::default();
        assert!(!q.is_scheduled(EventKind::TimerOverflow));
    }

    #[test]
    fn schedule_replaces_existing_entry() {
        let mut q = EventQueue::default();
        q.schedule(EventKind::TimerOverflow, 0, 100);
        q.schedule(EventKind::TimerOverflow, 0, 50);
        assert_eq!(q.cycle_of(EventKind::TimerOverflow), Some(50));
        assert_eq!(q.by_cycle.len(), 1);
    }

    #[test]
    fn poll_returns_earliest_due_and_clears_slot() {
        let mut q = EventQueue::default();
        q.schedule(EventKind::TimerOverflow, 0, 100);
        q.schedule(EventKind::ApuFrameSequencer, 0, 10);
        assert_eq!(q.poll(5), None);
        let (kind, cycle) = q.poll(50).unwrap();
        assert_eq!(kind, EventKind::ApuFrameSequencer);
        assert_eq!(cycle, 10);
        assert!(!q.is_scheduled(EventKind::ApuFrameSequencer));
        assert!(q.is_scheduled(EventKind::TimerOverflow));
    }

    #[test]
    fn ties_break_by_kind_order() {
        let mut q = EventQueue::default();
        q.schedule(EventKind::TimerOverflow, 0, 10);
        q.schedule(EventKind::LcdInterruptVblank, 0, 10);
        let (first, _) = q.poll(10).unwrap();
        assert_eq!(first, EventKind::LcdInterruptVblank);
        let (second, _) = q.poll(10).unwrap();
        assert_eq!(second, EventKind::TimerOverflow);
    }

    #[test]
    fn back_clock_preserves_order() {
        let mut q = EventQueue::default();
        q.schedule(EventKind::TimerOverflow, 0, 2_000_000_000);
        q.set_back_clock(1_000_000_000);
        assert_eq!(q.cycle_of(EventKind::TimerOverflow), Some(1_000_000_000));
    }
}
