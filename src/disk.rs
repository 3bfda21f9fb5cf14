//! Paging disk geometry.
//!
//! Pages live on a direct access storage device addressed by external page
//! address (cylinder, track, slot). Nothing is read or written; the module
//! only maps absolute page numbers onto the device geometry.

use std::fmt;

use crate::error::{DatError, Result};
use crate::memory::frame_base;

/// Tracks per cylinder and page slots per track of a disk model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DiskGeometry {
    tracks_per_cylinder: u32,
    slots_per_track: u32,
}

impl DiskGeometry {
    pub const IBM_3330: DiskGeometry = DiskGeometry::from_parts(19, 6);
    pub const IBM_3340: DiskGeometry = DiskGeometry::from_parts(12, 3);
    pub const IBM_3350: DiskGeometry = DiskGeometry::from_parts(30, 8);

    const fn from_parts(tracks_per_cylinder: u32, slots_per_track: u32) -> Self {
        DiskGeometry {
            tracks_per_cylinder,
            slots_per_track,
        }
    }

    /// Custom geometry; both factors must be positive and their product must
    /// fit in a `u32`.
    pub fn new(tracks_per_cylinder: u32, slots_per_track: u32) -> Result<Self> {
        if tracks_per_cylinder == 0 || slots_per_track == 0 {
            log::warn!("rejecting disk geometry {tracks_per_cylinder}x{slots_per_track}");
            return Err(DatError::invalid(format!(
                "disk geometry {tracks_per_cylinder}x{slots_per_track} must have positive factors"
            )));
        }
        if tracks_per_cylinder.checked_mul(slots_per_track).is_none() {
            log::warn!("rejecting disk geometry {tracks_per_cylinder}x{slots_per_track}");
            return Err(DatError::invalid(format!(
                "disk geometry {tracks_per_cylinder}x{slots_per_track} has too many slots per cylinder"
            )));
        }
        Ok(Self::from_parts(tracks_per_cylinder, slots_per_track))
    }

    #[inline]
    pub const fn tracks_per_cylinder(self) -> u32 {
        self.tracks_per_cylinder
    }

    #[inline]
    pub const fn slots_per_track(self) -> u32 {
        self.slots_per_track
    }

    #[inline]
    pub const fn slots_per_cylinder(self) -> u32 {
        self.tracks_per_cylinder * self.slots_per_track
    }

    /// Map an absolute page number to its external page address
    pub fn locate(self, absolute_page: u32) -> DiskLocator {
        let slots_per_cylinder = self.slots_per_cylinder();
        let remainder = absolute_page % slots_per_cylinder;

        DiskLocator {
            cylinder: absolute_page / slots_per_cylinder,
            track: remainder / self.slots_per_track,
            slot: remainder % self.slots_per_track,
            slots_per_cylinder,
            slots_per_track: self.slots_per_track,
        }
    }
}

impl fmt::Display for DiskGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} tracks/cylinder x {} slots/track",
            self.tracks_per_cylinder, self.slots_per_track
        )
    }
}

/// External page address (EPA) of a page on the paging disk.
///
/// Carries the geometry it was derived from so the arithmetic can be shown
/// without a catalog lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskLocator {
    pub cylinder: u32,
    pub track: u32,
    pub slot: u32,
    pub slots_per_cylinder: u32,
    pub slots_per_track: u32,
}

impl DiskLocator {
    /// Inverse of [`DiskGeometry::locate`]. `None` if the fields describe a
    /// page beyond `u32::MAX`.
    pub fn absolute_page(&self) -> Option<u32> {
        self.cylinder
            .checked_mul(self.slots_per_cylinder)?
            .checked_add(self.track.checked_mul(self.slots_per_track)?)?
            .checked_add(self.slot)
    }
}

impl fmt::Display for DiskLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "EPA (cylinder={}, track={}, slot={})",
            self.cylinder, self.track, self.slot
        )
    }
}

/// Named disk models available to a session.
///
/// Starts with the 3330, 3340 and 3350 models. Custom geometries can be
/// appended; existing names are never replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskCatalog {
    models: Vec<(String, DiskGeometry)>,
}

impl DiskCatalog {
    pub fn new() -> Self {
        DiskCatalog {
            models: vec![
                ("3330".to_string(), DiskGeometry::IBM_3330),
                ("3340".to_string(), DiskGeometry::IBM_3340),
                ("3350".to_string(), DiskGeometry::IBM_3350),
            ],
        }
    }

    pub fn get(&self, name: &str) -> Result<DiskGeometry> {
        self.models
            .iter()
            .find(|(model, _)| model == name)
            .map(|&(_, geometry)| geometry)
            .ok_or_else(|| DatError::invalid(format!("unknown disk model: {name}")))
    }

    pub fn register(&mut self, name: &str, geometry: DiskGeometry) -> Result<()> {
        if self.models.iter().any(|(model, _)| model == name) {
            return Err(DatError::invalid(format!(
                "disk model {name} is already registered"
            )));
        }
        log::debug!("registering disk model {name}: {geometry}");
        self.models.push((name.to_string(), geometry));
        Ok(())
    }

    /// Register a custom geometry under `custom_<T>x<S>` and return that name.
    ///
    /// The name encodes the geometry, so registering the same geometry twice
    /// returns the existing entry.
    pub fn register_custom(&mut self, geometry: DiskGeometry) -> Result<String> {
        let name = format!(
            "custom_{}x{}",
            geometry.tracks_per_cylinder(),
            geometry.slots_per_track()
        );
        if self.get(&name).is_err() {
            self.register(&name, geometry)?;
        }
        Ok(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, DiskGeometry)> {
        self.models
            .iter()
            .map(|(name, geometry)| (name.as_str(), *geometry))
    }
}

impl Default for DiskCatalog {
    fn default() -> Self {
        Self::new()
    }
}

/// One page moved between the paging disk and a frame: where the page sits on
/// disk and where the frame starts in real storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageTransfer {
    pub absolute_page: u32,
    pub frame: u16,
    pub locator: DiskLocator,
    pub frame_base: u32,
}

impl PageTransfer {
    pub fn compute(absolute_page: u32, frame: u16, geometry: DiskGeometry) -> Self {
        let transfer = PageTransfer {
            absolute_page,
            frame,
            locator: geometry.locate(absolute_page),
            frame_base: frame_base(frame),
        };
        log::debug!(
            "page {absolute_page} <-> frame {frame}: {} DC={:06X}",
            transfer.locator,
            transfer.frame_base
        );
        transfer
    }

    pub fn frame_base_hex(&self) -> String {
        format!("{:06X}", self.frame_base)
    }

    pub fn frame_base_binary(&self) -> String {
        format!("{:024b}", self.frame_base)
    }
}
