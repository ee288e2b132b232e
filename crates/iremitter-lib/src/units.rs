//! Extension-unit discovery from the kernel's USB descriptor dump.
//!
//! A UVC camera's vendor controls live in extension units, and the unit IDs
//! are static descriptor metadata: the kernel exposes the raw configuration
//! descriptors of every USB device as a flat `descriptors` file in sysfs.
//! We walk up from the video node's sysfs `device` link to the USB device
//! directory and pull each VideoControl extension unit's `bUnitID` out of
//! that file — no process spawning, no userspace USB stack.

use std::io;
use std::path::{Path, PathBuf};

const USB_DT_INTERFACE: u8 = 0x04;
const USB_DT_CS_INTERFACE: u8 = 0x24;
const USB_CLASS_VIDEO: u8 = 0x0e;
const USB_SUBCLASS_VIDEOCONTROL: u8 = 0x01;
const UVC_VC_EXTENSION_UNIT: u8 = 0x06;

/// The extension-unit IDs exposed by the USB device behind a video node.
///
/// Deduplicated, ascending, and empty when the device declares none.
pub fn enumerate_units(device: &Path) -> io::Result<Vec<u8>> {
    let usb_dir = usb_device_dir(device)?;
    let descriptors = std::fs::read(usb_dir.join("descriptors"))?;
    Ok(parse_extension_units(&descriptors))
}

/// USB vendor and product IDs of the device behind a video node, as the
/// lowercase hex strings sysfs reports ("0bda", "58f4").
pub fn usb_ids(device: &Path) -> io::Result<(String, String)> {
    let usb_dir = usb_device_dir(device)?;
    let read_id = |name: &str| -> io::Result<String> {
        Ok(std::fs::read_to_string(usb_dir.join(name))?.trim().to_string())
    };
    Ok((read_id("idVendor")?, read_id("idProduct")?))
}

/// Walk up from `/sys/class/video4linux/<node>/device` to the first
/// ancestor carrying idVendor/idProduct — the USB device directory.
fn usb_device_dir(device: &Path) -> io::Result<PathBuf> {
    let node = device.file_name().and_then(|n| n.to_str()).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("not a video node: {}", device.display()),
        )
    })?;
    let mut dir = PathBuf::from(format!("/sys/class/video4linux/{node}/device")).canonicalize()?;
    loop {
        if dir.join("idVendor").is_file() && dir.join("idProduct").is_file() {
            return Ok(dir);
        }
        if !dir.pop() || dir.as_os_str() == "/sys" || dir.as_os_str() == "/" {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no USB device found above {node} in sysfs"),
            ));
        }
    }
}

/// Pull every VideoControl extension unit's `bUnitID` out of a raw USB
/// descriptor dump.
///
/// Class-specific descriptors are only meaningful inside the interface they
/// follow, so the walk tracks whether the current interface is
/// VideoControl; audio class descriptors reuse subtype 0x06 for something
/// else entirely. A malformed tail ends the walk quietly.
pub fn parse_extension_units(bytes: &[u8]) -> Vec<u8> {
    let mut units = Vec::new();
    let mut in_videocontrol = false;
    let mut offset = 0usize;
    while offset + 2 <= bytes.len() {
        let length = bytes[offset] as usize;
        if length < 2 || offset + length > bytes.len() {
            break;
        }
        let descriptor_type = bytes[offset + 1];
        match descriptor_type {
            // bInterfaceClass at byte 5, bInterfaceSubClass at byte 6
            USB_DT_INTERFACE if length >= 7 => {
                in_videocontrol = bytes[offset + 5] == USB_CLASS_VIDEO
                    && bytes[offset + 6] == USB_SUBCLASS_VIDEOCONTROL;
            }
            // bDescriptorSubtype at byte 2, bUnitID at byte 3
            USB_DT_CS_INTERFACE
                if in_videocontrol
                    && length >= 4
                    && bytes[offset + 2] == UVC_VC_EXTENSION_UNIT =>
            {
                units.push(bytes[offset + 3]);
            }
            _ => {}
        }
        offset += length;
    }
    units.sort_unstable();
    units.dedup();
    units
}
