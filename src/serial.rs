//! Serial link port interface. The actual transfer logic (shift timing
//! against an external link cable or a second emulator instance) is an
//! external collaborator per spec §1; this module only owns the SB/SC
//! register bits and the event-queue hook (`serial_transfer` in
//! [`crate::event::EventKind`]) that the scheduler glue dispatches through.

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SerialControl: u8 {
        const TRANSFER_START = 1 << 7;
        const CLOCK_SPEED    = 1 << 1; // CGB only
        const CLOCK_SOURCE   = 1 << 0;
    }
}

#[derive(Clone, Default)]
pub struct Serial {
    sb: u8,
    sc: SerialControl,
}

impl Serial {
    pub fn read_sb(&self) -> u8 {
        self.sb
    }

    pub fn write_sb(&mut self, value: u8) {
        self.sb = value;
    }

    pub fn read_sc(&self) -> u8 {
        self.sc.bits() | 0b0111_1100
    }

    /// Returns `true` if this write should schedule a `serial_transfer`
    /// event (internal-clock transfer start); the handler itself lives with
    /// the external collaborator that owns the link.
    pub fn write_sc(&mut self, value: u8) -> bool {
        self.sc = SerialControl::from_bits_retain(value);
        self.sc.contains(SerialControl::TRANSFER_START)
            && self.sc.contains(SerialControl::CLOCK_SOURCE)
    }

    pub fn finish_transfer(&mut self) {
        self.sc.remove(SerialControl::TRANSFER_START);
    }
}
