//! Legacy IDE storage for AtomicOS: ATA PIO disk access plus a read-only
//! FAT12/16/32 root directory lister.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod serial;
pub mod config;
pub mod drivers;
pub mod fs;

use alloc::vec::Vec;

pub use config::StorageConfig;
pub use drivers::ata::{AtaDisk, ControllerPorts, IdeController};
pub use drivers::block::BlockDevice;
pub use drivers::port::PortIo;
pub use fs::Volume;

/// Probe every identified disk for a FAT volume and log what it holds.
/// Results are in disk index order.
pub fn scan<P: PortIo>(ide: &IdeController<P>) -> Vec<Volume> {
    ide.disks()
        .map(|disk| {
            let device = disk.device();
            log_info!(
                "  - {} ({} KiB) interface: {}",
                device.model(),
                device.size() / 2,
                device.interface()
            );
            let volume = fs::probe(&disk);
            match &volume {
                Volume::NoFilesystem => log_info!("    No file system."),
                Volume::ListFailed => log_error!("    Failed to list the files."),
                Volume::Listed(entries) => {
                    for entry in entries {
                        let suffix = if entry.is_directory { "/" } else { "" };
                        log_info!("    + {}{}", entry.name, suffix);
                    }
                }
            }
            volume
        })
        .collect()
}

/// Bring up logging, probe the IDE controller behind `ports` and list the
/// root directory of every disk found.
#[cfg(target_arch = "x86_64")]
pub fn init(
    ports: ControllerPorts,
    config: StorageConfig,
) -> &'static IdeController<drivers::port::X86Ports> {
    serial::init(config.log_level);
    log_info!("AtomicOS storage: probing IDE controller.");
    let ide = drivers::ata::init(ports, config);
    scan(ide);
    ide
}
