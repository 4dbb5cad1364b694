/// Raw x86 I/O port access.
///
/// The ATA driver only ever talks to hardware through this trait, so a
/// register-level model of a drive can stand in for real ports in tests.
pub trait PortIo {
    fn inb(&self, port: u16) -> u8;
    fn outb(&self, port: u16, value: u8);
    fn inw(&self, port: u16) -> u16;
    fn outw(&self, port: u16, value: u16);
}

/// Unused POST diagnostic port; writing to it takes roughly 1µs.
pub const IO_WAIT_PORT: u16 = 0x80;

pub fn io_wait<P: PortIo + ?Sized>(io: &P) {
    io.outb(IO_WAIT_PORT, 0);
}

/// Real `in`/`out` instructions.
#[cfg(target_arch = "x86_64")]
#[derive(Debug, Default, Clone, Copy)]
pub struct X86Ports;

#[cfg(target_arch = "x86_64")]
impl PortIo for X86Ports {
    fn inb(&self, port: u16) -> u8 {
        let mut port = x86_64::instructions::port::Port::<u8>::new(port);
        unsafe { port.read() }
    }

    fn outb(&self, port: u16, value: u8) {
        let mut port = x86_64::instructions::port::Port::<u8>::new(port);
        unsafe { port.write(value) }
    }

    fn inw(&self, port: u16) -> u16 {
        let mut port = x86_64::instructions::port::Port::<u16>::new(port);
        unsafe { port.read() }
    }

    fn outw(&self, port: u16, value: u16) {
        let mut port = x86_64::instructions::port::Port::<u16>::new(port);
        unsafe { port.write(value) }
    }
}
