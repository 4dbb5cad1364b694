pub mod channel;
pub mod identify;
pub mod pio;
pub mod regs;

#[cfg(test)]
pub(crate) mod sim;

use heapless::Vec;
use spin::Mutex;

use crate::config::StorageConfig;
use crate::drivers::block::BlockDevice;
use crate::drivers::port::PortIo;

use channel::Channel;
use pio::{ChannelId, Device, DrivePosition, IdentifyResult, Transfer};

/// Two channels, two drives each.
pub const MAX_DEVICES: usize = 4;

const POSITIONS: [(ChannelId, DrivePosition); MAX_DEVICES] = [
    (ChannelId::Primary, DrivePosition::Master),
    (ChannelId::Primary, DrivePosition::Slave),
    (ChannelId::Secondary, DrivePosition::Master),
    (ChannelId::Secondary, DrivePosition::Slave),
];

// ──────────────────────────────────────────────────────────────
//  Controller ports
// ──────────────────────────────────────────────────────────────

/// I/O BARs of a PCI IDE function. A zero BAR keeps the legacy port.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ControllerPorts {
    pub primary_base: u16,
    pub primary_ctrl: u16,
    pub secondary_base: u16,
    pub secondary_ctrl: u16,
    pub bus_master: u16,
}

impl ControllerPorts {
    /// Compatibility-mode controller: every port at its legacy address.
    pub const LEGACY: ControllerPorts = ControllerPorts {
        primary_base: 0,
        primary_ctrl: 0,
        secondary_base: 0,
        secondary_ctrl: 0,
        bus_master: 0,
    };

    /// BAR0..BAR3 and, when present, BAR4.
    pub fn from_bars(bars: &[u16]) -> Self {
        let bar = |i: usize| bars.get(i).copied().unwrap_or(0);
        ControllerPorts {
            primary_base: bar(0),
            primary_ctrl: bar(1),
            secondary_base: bar(2),
            secondary_ctrl: bar(3),
            bus_master: bar(4),
        }
    }

    pub fn channels(&self) -> [Channel; 2] {
        let pick = |bar: u16, legacy: u16| if bar != 0 { bar } else { legacy };
        let mut primary = Channel::PRIMARY_LEGACY;
        let mut secondary = Channel::SECONDARY_LEGACY;

        primary.base = pick(self.primary_base, primary.base);
        primary.ctrl = pick(self.primary_ctrl, primary.ctrl);
        secondary.base = pick(self.secondary_base, secondary.base);
        secondary.ctrl = pick(self.secondary_ctrl, secondary.ctrl);
        if self.bus_master != 0 {
            primary.bus_master = self.bus_master;
            secondary.bus_master = self.bus_master + 8;
        }
        [primary, secondary]
    }
}

// ──────────────────────────────────────────────────────────────
//  Controller
// ──────────────────────────────────────────────────────────────

/// Both channels of one IDE controller and the drives found on them.
///
/// Built once by [`IdeController::new`], read-only afterwards. Each channel
/// is locked for the length of a command so the two drives sharing its
/// wires are never driven at the same time.
pub struct IdeController<P: PortIo> {
    io: P,
    channels: [Mutex<Channel>; 2],
    devices: Vec<Device, MAX_DEVICES>,
    config: StorageConfig,
}

impl<P: PortIo> IdeController<P> {
    /// Apply the port assignment, mask drive interrupts and identify every
    /// drive position. Positions that do not identify are left out.
    pub fn new(io: P, ports: ControllerPorts, config: StorageConfig) -> Self {
        let [primary, secondary] = ports.channels();
        let mut controller = IdeController {
            io,
            channels: [Mutex::new(primary), Mutex::new(secondary)],
            devices: Vec::new(),
            config,
        };

        for ch in &controller.channels {
            ch.lock().bus(&controller.io, config.poll_limit).disable_irqs();
        }

        for (id, (channel, position)) in POSITIONS.into_iter().enumerate() {
            match controller.identify(channel, position) {
                IdentifyResult::Success(device) => {
                    crate::log_info!(
                        "ATA: disk {}: {} ({} KiB) interface {}",
                        id, device.model(), device.size() / 2, device.interface()
                    );
                    // One slot per position, so this cannot overflow.
                    let _ = controller.devices.push(device);
                }
                IdentifyResult::NoDevice => {
                    crate::log_debug!("ATA: disk {}: not present", id);
                }
                IdentifyResult::UnknownDeviceType => {
                    crate::log_error!("ATA: error identifying disk {}: unknown device type", id);
                }
                IdentifyResult::RequestError(code) => {
                    crate::log_error!("ATA: error identifying disk {}: device returned error code {:#x}", id, code);
                }
                IdentifyResult::Unresponsive => {
                    crate::log_error!("ATA: error identifying disk {}: drive never became ready", id);
                }
            }
        }

        controller
    }

    /// Run the identification handshake on one drive position.
    pub fn identify(&self, channel: ChannelId, position: DrivePosition) -> IdentifyResult {
        let ch = self.channels[channel.index()].lock();
        Device::identify(&ch.bus(&self.io, self.config.poll_limit), channel, position)
    }

    pub fn channel(&self, channel: ChannelId) -> Channel {
        *self.channels[channel.index()].lock()
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    /// Panics if `index` is past the identified drives.
    pub fn device(&self, index: usize) -> &Device {
        &self.devices[index]
    }

    /// Block-device view of the drive at `index`. Panics like [`Self::device`].
    pub fn disk(&self, index: usize) -> AtaDisk<'_, P> {
        AtaDisk { controller: self, device: self.device(index) }
    }

    pub fn disks(&self) -> impl Iterator<Item = AtaDisk<'_, P>> + '_ {
        self.devices.iter().map(move |device| AtaDisk { controller: self, device })
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    #[cfg(test)]
    pub(crate) fn io(&self) -> &P {
        &self.io
    }

    fn access(&self, device: &Device, lba: u64, transfer: Transfer<'_>) -> pio::PollingResult {
        let ch = self.channels[device.channel().index()].lock();
        device.access(&ch.bus(&self.io, self.config.poll_limit), lba, transfer)
    }
}

/// A drive on a controller, usable wherever a [`BlockDevice`] is expected.
pub struct AtaDisk<'a, P: PortIo> {
    controller: &'a IdeController<P>,
    device: &'a Device,
}

impl<'a, P: PortIo> AtaDisk<'a, P> {
    pub fn device(&self) -> &'a Device {
        self.device
    }
}

impl<P: PortIo> BlockDevice for AtaDisk<'_, P> {
    fn read(&self, lba: u64, buf: &mut [u8]) -> bool {
        self.controller.access(self.device, lba, Transfer::Read(buf)).is_success()
    }

    /// Reports the flush's outcome, so a drive that never finishes the
    /// write is seen as failed.
    fn write(&self, lba: u64, buf: &[u8]) -> bool {
        self.controller.access(self.device, lba, Transfer::Write(buf)).is_success()
    }
}

// ──────────────────────────────────────────────────────────────
//  Kernel-wide instance
// ──────────────────────────────────────────────────────────────

#[cfg(target_arch = "x86_64")]
static IDE: spin::Once<IdeController<crate::drivers::port::X86Ports>> = spin::Once::new();

/// Probe the controller behind `ports`. Later calls return the first
/// controller unchanged.
#[cfg(target_arch = "x86_64")]
pub fn init(
    ports: ControllerPorts,
    config: StorageConfig,
) -> &'static IdeController<crate::drivers::port::X86Ports> {
    IDE.call_once(|| {
        let controller = IdeController::new(crate::drivers::port::X86Ports, ports, config);
        crate::log_info!("ATA PIO: {} disk(s) detected.", controller.devices().len());
        controller
    })
}

#[cfg(target_arch = "x86_64")]
pub fn controller() -> Option<&'static IdeController<crate::drivers::port::X86Ports>> {
    IDE.get()
}
