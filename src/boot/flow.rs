//! Reset-reason handling and application image validation

use super::state::{BootRecord, BootState};
use super::store::ObjectStore;
use crate::config::{APP_VERSION_MAX_LEN, APP_VERSION_OFFSET, IMAGE_CRC_KEY, IMAGE_VERSION_KEY};
use crate::timer::{elapsed, ticks_to_ms_tenths, TickSource};

/// Where the bootloader goes next
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "embedded", derive(defmt::Format))]
pub enum BootDecision {
    /// Jump to the application
    BootApplication,
    /// Stay in the bootloader and wait for a new image
    FirmwareUpdate,
}

/// Version string embedded in the application image
///
/// A NUL-terminated string of fewer than [`APP_VERSION_MAX_LEN`] bytes at
/// [`APP_VERSION_OFFSET`]. `None` if there is no terminator in range or the
/// text is not UTF-8.
#[must_use]
pub fn image_version(image: &[u8]) -> Option<&str> {
    let field = image.get(APP_VERSION_OFFSET..)?;
    let field = &field[..field.len().min(APP_VERSION_MAX_LEN)];
    let end = field.iter().position(|&b| b == 0)?;
    core::str::from_utf8(&field[..end]).ok()
}

/// Stored value up to its first NUL, if it was persisted with one
fn trim_nul(value: &[u8]) -> &[u8] {
    let end = value.iter().position(|&b| b == 0).unwrap_or(value.len());
    &value[..end]
}

/// Boot decision logic over an application partition and an object store
pub struct Bootloader<'t, S: ObjectStore, T: TickSource> {
    store: S,
    timer: &'t T,
}

impl<'t, S: ObjectStore, T: TickSource> Bootloader<'t, S, T> {
    /// Create the boot flow
    pub fn new(store: S, timer: &'t T) -> Self {
        Self { store, timer }
    }

    /// Access the object store
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Give the object store back
    pub fn release(self) -> S {
        self.store
    }

    /// Decide what to run after this reset
    ///
    /// On [`BootDecision::BootApplication`] the record's state becomes
    /// [`BootState::App`] so that a later crash can be told apart from a
    /// cold boot.
    pub fn decide(&mut self, record: &mut BootRecord, image: &[u8]) -> BootDecision {
        let decision = match record.state {
            BootState::Dfu => {
                info!("Application requested DFU entry");
                BootDecision::FirmwareUpdate
            }
            BootState::Crash => {
                match record.crash() {
                    Some(reason) => error!("Application crashed: {}", reason.name()),
                    None => error!("Application crashed: unknown crash code {}", record.crash_reason),
                }

                if self.is_app_updated(image) {
                    info!("Application was updated since the crash, attempting to boot new image");
                    self.validated(image)
                } else {
                    warn!("Still running the same crashing image, staying in firmware update mode");
                    BootDecision::FirmwareUpdate
                }
            }
            BootState::Por | BootState::App => {
                if record.state == BootState::Por {
                    info!("Power cycle");
                } else {
                    info!("Application was running, probably requested warm reboot");
                }
                self.validated(image)
            }
        };

        if decision == BootDecision::BootApplication {
            info!("Booting application");
            record.state = BootState::App;
        }
        decision
    }

    fn validated(&mut self, image: &[u8]) -> BootDecision {
        if self.validate_app_partition(image) {
            BootDecision::BootApplication
        } else {
            BootDecision::FirmwareUpdate
        }
    }

    /// True if the image's version differs from the last one booted
    ///
    /// An image without a valid version string is never considered updated.
    /// A valid version with nothing stored means the first image was just
    /// programmed.
    pub fn is_app_updated(&self, image: &[u8]) -> bool {
        let Some(version) = image_version(image) else {
            error!(
                "No version string found in application partition (expected a NUL terminated string at {:#x})",
                APP_VERSION_OFFSET
            );
            return false;
        };
        info!("Found firmware version: {}", version);

        match self.store.find_object(IMAGE_VERSION_KEY) {
            Some(stored) => {
                let stored = trim_nul(stored);
                info!("Previous image version: {}", core::str::from_utf8(stored).unwrap_or("?"));
                stored != version.as_bytes()
            }
            None => {
                info!("No previous image version in the object store");
                true
            }
        }
    }

    /// Check the application partition is present and intact
    ///
    /// A freshly programmed image (new version, or a version with no stored
    /// CRC) is trusted and its version and CRC are persisted. Otherwise the
    /// CRC of the whole partition must match the stored one.
    pub fn validate_app_partition(&mut self, image: &[u8]) -> bool {
        if image.len() < 4 || image[..4] == [0xff; 4] {
            error!("Application partition appears to be blank");
            return false;
        }

        let mut updated = self.is_app_updated(image);
        let mut expected = None;
        if !updated {
            match self.store.find_object(IMAGE_CRC_KEY) {
                Some(&[a, b, c, d]) => {
                    let crc = u32::from_le_bytes([a, b, c, d]);
                    info!("Expected image CRC: {:#x}", crc);
                    expected = Some(crc);
                }
                Some(_) | None => {
                    warn!("Image version found in the object store, but not a CRC; can't verify integrity");
                    updated = true;
                }
            }
        }

        let start = self.timer.count();
        let crc = crc32fast::hash(image);
        let (ms, tenths) = ticks_to_ms_tenths(elapsed(start, self.timer.count()));
        info!("CRC of application partition: {:#x} (took {}.{} ms)", crc, ms, tenths);

        if updated {
            info!("New image present, updating stored CRC and version");
            if let Some(version) = image_version(image) {
                if let Err(err) = self.store.store_object(IMAGE_VERSION_KEY, version.as_bytes()) {
                    error!("Failed to store image version: {}", err);
                }
            }
            if let Err(err) = self.store.store_object(IMAGE_CRC_KEY, &crc.to_le_bytes()) {
                error!("Failed to store image CRC: {}", err);
            }
            return true;
        }

        if expected == Some(crc) {
            info!("CRC verification passed");
            true
        } else {
            error!("CRC mismatch, application partition flash corruption?");
            false
        }
    }
}
