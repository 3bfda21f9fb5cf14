//! Scenario files.
//!
//! One exercise per file, one `<key> <values...>` line per field:
//!
//! ```text
//! # fault with every queue populated
//! address 03FFA3
//! entry   103C
//! disk    3330
//! memory  100
//! Q00     17 1 0, 25 1 1, 14 1 0
//! Q01     31 1 1, 48 1 1
//! evicted 05A2
//! ```
//!
//! `disk` takes a catalog model name or a custom `<tracks>x<slots>`
//! geometry. A file with `page` and `frame` instead of `address` and `entry`
//! describes a single page transfer.

use std::fs;
use std::path::Path;

use crate::address::{AbsolutePage, VirtualAddress};
use crate::disk::{DiskCatalog, DiskGeometry, PageTransfer};
use crate::error::{DatError, Result};
use crate::pte::PageTableEntry;
use crate::replacement::{QueueEntry, QueueName, QueueSet};
use crate::translation::TranslationRequest;

/// Parse a fixed-width hexadecimal field, case-insensitive.
pub fn parse_hex(field: &str, text: &str, digits: usize) -> Result<u32> {
    let text = text.trim();
    if text.len() != digits || !text.chars().all(|c| c.is_ascii_hexdigit()) {
        log::warn!("rejecting {field} {text:?}");
        return Err(DatError::invalid(format!(
            "{field} must be exactly {digits} hex digits, got {text:?}"
        )));
    }
    u32::from_str_radix(text, 16)
        .map_err(|e| DatError::invalid(format!("{field} {text:?}: {e}")))
}

/// Disk model as written in a scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiskSpec<'a> {
    Model(&'a str),
    Custom(DiskGeometry),
}

impl DiskSpec<'_> {
    /// Look the model up, registering a custom geometry first if needed.
    /// Returns the catalog name and the geometry.
    pub fn resolve(&self, catalog: &mut DiskCatalog) -> Result<(String, DiskGeometry)> {
        match *self {
            DiskSpec::Model(name) => Ok((name.to_string(), catalog.get(name)?)),
            DiskSpec::Custom(geometry) => Ok((catalog.register_custom(geometry)?, geometry)),
        }
    }
}

/// What a scenario asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exercise {
    /// Full translation of one virtual address.
    Translate {
        address: VirtualAddress,
        entry: PageTableEntry,
        queues: Option<QueueSet>,
        evicted: Option<AbsolutePage>,
    },
    /// Disk and frame addresses for moving one page.
    Transfer { absolute_page: u32, frame: u16 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scenario<'a> {
    pub disk: DiskSpec<'a>,
    pub real_memory_kb: Option<u32>,
    pub exercise: Exercise,
}

#[derive(Default)]
struct Fields<'a> {
    address: Option<VirtualAddress>,
    entry: Option<PageTableEntry>,
    disk: Option<DiskSpec<'a>>,
    memory: Option<u32>,
    queues: Option<QueueSet>,
    evicted: Option<AbsolutePage>,
    page: Option<u32>,
    frame: Option<u16>,
}

impl<'a> Scenario<'a> {
    pub fn parse(content: &'a str) -> Result<Self> {
        let mut fields = Fields::default();

        for (index, line) in content.lines().enumerate() {
            let line = line.split('#').next().unwrap_or_default().trim();
            if line.is_empty() {
                continue;
            }
            Self::parse_line(&mut fields, line)
                .map_err(|e| DatError::invalid(format!("line {}: {}", index + 1, reason(e))))?;
        }

        let disk = fields
            .disk
            .ok_or_else(|| DatError::invalid("scenario has no disk model"))?;

        let exercise = match (fields.address, fields.entry, fields.page, fields.frame) {
            (Some(address), Some(entry), None, None) => Exercise::Translate {
                address,
                entry,
                queues: fields.queues,
                evicted: fields.evicted,
            },
            (None, None, Some(absolute_page), Some(frame)) => Exercise::Transfer { absolute_page, frame },
            _ => {
                return Err(DatError::invalid(
                    "scenario needs either `address` and `entry`, or `page` and `frame`",
                ));
            }
        };

        Ok(Scenario {
            disk,
            real_memory_kb: fields.memory,
            exercise,
        })
    }

    fn parse_line(fields: &mut Fields<'a>, line: &'a str) -> Result<()> {
        let (key, rest) = line
            .split_once(char::is_whitespace)
            .map(|(key, rest)| (key, rest.trim()))
            .unwrap_or((line, ""));

        match key.to_ascii_lowercase().as_str() {
            "address" => fields.address = Some(VirtualAddress::parse_hex(rest)?),
            "entry" => fields.entry = Some(PageTableEntry::parse_hex(rest)?),
            "evicted" => fields.evicted = Some(AbsolutePage::parse_hex(rest)?),
            "disk" => fields.disk = Some(Self::parse_disk(rest)?),
            "memory" => fields.memory = Some(parse_decimal("memory size", rest)?),
            "page" => fields.page = Some(parse_decimal("page number", rest)?),
            "frame" => fields.frame = Some(parse_decimal("frame number", rest)?),
            _ => {
                let name: QueueName = key
                    .parse()
                    .map_err(|_| DatError::invalid(format!("unknown key {key:?}")))?;
                let queues = fields.queues.get_or_insert_with(QueueSet::new);
                for entry in Self::parse_queue(rest)? {
                    queues.push(name, entry);
                }
            }
        }
        Ok(())
    }

    fn parse_disk(text: &'a str) -> Result<DiskSpec<'a>> {
        let is_number = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
        let geometry = text
            .split_once(['x', 'X'])
            .filter(|&(tracks, slots)| is_number(tracks) && is_number(slots));

        match geometry {
            Some((tracks, slots)) => {
                let tracks = parse_decimal("tracks per cylinder", tracks)?;
                let slots = parse_decimal("slots per track", slots)?;
                Ok(DiskSpec::Custom(DiskGeometry::new(tracks, slots)?))
            }
            None if !text.is_empty() => Ok(DiskSpec::Model(text)),
            None => Err(DatError::invalid("missing disk model")),
        }
    }

    fn parse_queue(text: &str) -> Result<Vec<QueueEntry>> {
        let mut entries = Vec::new();
        for triple in text.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let tokens: Vec<&str> = triple.split_whitespace().collect();
            if tokens.len() != 3 {
                return Err(DatError::invalid(format!(
                    "queue entry {triple:?} has {} values, expected `frame R C`",
                    tokens.len()
                )));
            }
            let frame = parse_decimal("frame number", tokens[0])?;
            let referenced = parse_decimal("R bit", tokens[1])?;
            let modified = parse_decimal("C bit", tokens[2])?;
            entries.push(QueueEntry::from_bits(frame, referenced, modified)?);
        }
        Ok(entries)
    }

    /// Build the translation request, resolving the disk model in `catalog`.
    pub fn request(&self, catalog: &mut DiskCatalog) -> Result<TranslationRequest> {
        let Exercise::Translate {
            address,
            entry,
            queues,
            evicted,
        } = &self.exercise
        else {
            return Err(DatError::IllegalState("transfer scenario has no translation request"));
        };

        let (_, geometry) = self.disk.resolve(catalog)?;
        let mut request = TranslationRequest::new(*address, *entry, geometry);
        if let Some(queues) = queues {
            request = request.with_queues(queues.clone());
        }
        if let Some(evicted) = evicted {
            request = request.with_evicted(*evicted);
        }
        Ok(request)
    }

    /// Page transfer of a transfer-only scenario.
    pub fn transfer(&self, catalog: &mut DiskCatalog) -> Result<PageTransfer> {
        let Exercise::Transfer { absolute_page, frame } = self.exercise else {
            return Err(DatError::IllegalState("translation scenario has no single transfer"));
        };
        let (_, geometry) = self.disk.resolve(catalog)?;
        Ok(PageTransfer::compute(absolute_page, frame, geometry))
    }
}

fn parse_decimal<T: std::str::FromStr>(field: &str, text: &str) -> Result<T> {
    let text = text.trim();
    text.parse()
        .map_err(|_| DatError::invalid(format!("invalid {field}: {text:?}")))
}

fn reason(error: DatError) -> String {
    match error {
        DatError::InvalidInput(message) => message,
        other => other.to_string(),
    }
}

pub fn read_scenario<P: AsRef<Path>>(path: P) -> Result<String> {
    fs::read_to_string(path.as_ref()).map_err(|e| {
        DatError::invalid(format!(
            "failed to read scenario {}: {}",
            path.as_ref().display(),
            e
        ))
    })
}
