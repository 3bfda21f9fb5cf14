use std::fmt;

use crate::address::{AbsolutePage, EvictedPage, VirtualAddress};
use crate::disk::{DiskGeometry, PageTransfer};
use crate::error::{DatError, Result};
use crate::memory::RealAddress;
use crate::pte::{EntryState, PageTableEntry, PteAnalysis, RebuiltEntries};
use crate::replacement::{Eviction, QueueSet, SecondChance};

/// Everything needed to translate one virtual address.
///
/// `queues` and `evicted` are only consulted when the entry faults, but then
/// both are required.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationRequest {
    pub address: VirtualAddress,
    pub entry: PageTableEntry,
    pub geometry: DiskGeometry,
    pub queues: Option<QueueSet>,
    /// Absolute page number stored for the frame's current occupant
    pub evicted: Option<AbsolutePage>,
}

impl TranslationRequest {
    pub fn new(address: VirtualAddress, entry: PageTableEntry, geometry: DiskGeometry) -> Self {
        TranslationRequest {
            address,
            entry,
            geometry,
            queues: None,
            evicted: None,
        }
    }

    pub fn with_queues(mut self, queues: QueueSet) -> Self {
        self.queues = Some(queues);
        self
    }

    pub fn with_evicted(mut self, evicted: AbsolutePage) -> Self {
        self.evicted = Some(evicted);
        self
    }
}

/// Stages of a translation, in the order they are entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Decomposed,
    Analyzed,
    FaultDetected,
    VictimChosen,
    EvictedPageIdentified,
    PageOutComputed,
    PageInComputed,
    EntriesRebuilt,
    Resolved,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Decomposed => "decomposed",
            Stage::Analyzed => "analyzed",
            Stage::FaultDetected => "fault detected",
            Stage::VictimChosen => "victim chosen",
            Stage::EvictedPageIdentified => "evicted page identified",
            Stage::PageOutComputed => "page-out computed",
            Stage::PageInComputed => "page-in computed",
            Stage::EntriesRebuilt => "entries rebuilt",
            Stage::Resolved => "resolved",
        };
        f.write_str(name)
    }
}

/// The page was resident; DR comes straight from the entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoFaultResult {
    pub address: VirtualAddress,
    pub entry: PteAnalysis,
    pub frame: u16,
    pub real_address: RealAddress,
    pub stages: Vec<Stage>,
}

/// The page had to be brought in, replacing the victim frame's occupant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultResult {
    pub address: VirtualAddress,
    pub entry: PteAnalysis,
    pub eviction: Eviction,
    pub evicted: EvictedPage,
    /// Present only when the victim was changed (`C` = 1)
    pub page_out: Option<PageTransfer>,
    pub page_in: PageTransfer,
    pub rebuilt: RebuiltEntries,
    pub real_address: RealAddress,
    pub stages: Vec<Stage>,
}

/// Result of an address translation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Translation {
    NoFault(NoFaultResult),
    Fault(FaultResult),
}

impl Translation {
    pub fn address(&self) -> &VirtualAddress {
        match self {
            Translation::NoFault(result) => &result.address,
            Translation::Fault(result) => &result.address,
        }
    }

    pub fn entry(&self) -> &PteAnalysis {
        match self {
            Translation::NoFault(result) => &result.entry,
            Translation::Fault(result) => &result.entry,
        }
    }

    pub fn real_address(&self) -> &RealAddress {
        match self {
            Translation::NoFault(result) => &result.real_address,
            Translation::Fault(result) => &result.real_address,
        }
    }

    pub fn stages(&self) -> &[Stage] {
        match self {
            Translation::NoFault(result) => &result.stages,
            Translation::Fault(result) => &result.stages,
        }
    }

    #[inline]
    pub fn is_fault(&self) -> bool {
        matches!(self, Translation::Fault(_))
    }

    /// Fault details, for consumers that only hold a `Translation`.
    pub fn fault(&self) -> Result<&FaultResult> {
        match self {
            Translation::Fault(result) => Ok(result),
            Translation::NoFault(_) => Err(DatError::IllegalState(
                "translation did not fault; no replacement took place",
            )),
        }
    }
}

/// Records the stages a translation passes through
#[derive(Default)]
struct Trace {
    stages: Vec<Stage>,
}

impl Trace {
    fn enter(&mut self, stage: Stage) {
        log::debug!("stage: {stage}");
        self.stages.push(stage);
    }
}

/// Translate with the default second chance evictor
pub fn translate(request: &TranslationRequest) -> Result<Translation> {
    translate_with(request, &SecondChance::default())
}

/// Translate a virtual address to a real address, replacing a frame on a page fault
pub fn translate_with(request: &TranslationRequest, evictor: &SecondChance) -> Result<Translation> {
    let mut trace = Trace::default();

    // Step 1: split dV into S, P, d
    let address = request.address;
    trace.enter(Stage::Decomposed);

    // Step 2: check bit I of the page table entry
    let entry = request.entry.analyze();
    trace.enter(Stage::Analyzed);

    if let EntryState::Present { frame } = entry.state {
        let real_address = RealAddress::assemble(frame, address.offset)?;
        trace.enter(Stage::Resolved);
        log::info!("{address} -> {real_address}");

        return Ok(Translation::NoFault(NoFaultResult {
            address,
            entry,
            frame,
            real_address,
            stages: trace.stages,
        }));
    }

    trace.enter(Stage::FaultDetected);
    let queues = request
        .queues
        .as_ref()
        .ok_or_else(|| DatError::invalid("page fault requires the replacement queues"))?;
    let locator = request
        .evicted
        .ok_or_else(|| DatError::invalid("page fault requires the evicted page locator"))?;

    // Step 3: pick the victim frame
    log::debug!("choosing victim, at most {} iterations", evictor.limit());
    let eviction = evictor.evict(queues)?;
    let victim = eviction.victim.frame;
    trace.enter(Stage::VictimChosen);

    // Step 4: find out whose page lives in the victim frame
    let evicted = EvictedPage::resolve(locator);
    trace.enter(Stage::EvictedPageIdentified);

    // Step 5: write back a changed victim
    let page_out = if eviction.needs_page_out() {
        let transfer = PageTransfer::compute(evicted.locator.value(), victim, request.geometry);
        trace.enter(Stage::PageOutComputed);
        Some(transfer)
    } else {
        None
    };

    // Step 6: read the requested page into the freed frame
    let page_in = PageTransfer::compute(address.absolute_page().value(), victim, request.geometry);
    trace.enter(Stage::PageInComputed);

    // Step 7: new entries for the incoming and the evicted page
    let rebuilt = RebuiltEntries::for_frame(victim);
    trace.enter(Stage::EntriesRebuilt);

    let real_address = RealAddress::assemble(victim, address.offset)?;
    trace.enter(Stage::Resolved);
    log::info!(
        "{address} -> {real_address} (page fault, victim frame {victim}, page-out: {})",
        page_out.is_some()
    );

    Ok(Translation::Fault(FaultResult {
        address,
        entry,
        eviction,
        evicted,
        page_out,
        page_in,
        rebuilt,
        real_address,
        stages: trace.stages,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::Scenario;
    use crate::replacement::{EvictionStep, QueueEntry, QueueName};
    use crate::disk::DiskCatalog;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn request(address: &str, entry: &str, geometry: DiskGeometry) -> TranslationRequest {
        TranslationRequest::new(
            VirtualAddress::parse_hex(address).unwrap(),
            PageTableEntry::parse_hex(entry).unwrap(),
            geometry,
        )
    }

    fn queue(triples: &[(u16, u8, u8)]) -> Vec<QueueEntry> {
        triples
            .iter()
            .map(|&(frame, r, c)| QueueEntry::from_bits(frame, r, c).unwrap())
            .collect()
    }

    fn populated_queues() -> QueueSet {
        QueueSet::new()
            .with_queue(QueueName::Q00, queue(&[(17, 1, 0), (25, 1, 1), (14, 1, 0)]))
            .with_queue(QueueName::Q01, queue(&[(31, 1, 1), (48, 1, 1), (33, 1, 1), (29, 1, 1)]))
            .with_queue(QueueName::Q10, queue(&[(35, 1, 0), (22, 1, 1)]))
            .with_queue(QueueName::Q11, queue(&[(20, 0, 1), (37, 1, 1), (34, 1, 1)]))
            .with_queue(QueueName::Hq, queue(&[(32, 1, 0), (36, 1, 1), (28, 1, 0)]))
    }

    // =========================================================================
    // Page present
    // =========================================================================

    #[test]
    fn test_translate_without_fault() {
        init_logger();
        let translation = translate(&request("03FFA3", "05E8", DiskGeometry::IBM_3330)).unwrap();

        let Translation::NoFault(result) = &translation else {
            panic!("expected no fault");
        };
        assert_eq!(result.address.segment, 3);
        assert_eq!(result.address.page, 31);
        assert_eq!(result.address.offset, 1955);
        assert_eq!(result.frame, 189);
        assert_eq!(result.real_address.base, 387_072);
        assert_eq!(result.real_address.value, 389_027);
        assert_eq!(result.real_address.to_hex(), "05EFA3");
        assert_eq!(
            result.stages,
            vec![Stage::Decomposed, Stage::Analyzed, Stage::Resolved]
        );

        assert!(!translation.is_fault());
        assert!(matches!(translation.fault(), Err(DatError::IllegalState(_))));
    }

    #[test]
    fn test_present_entry_ignores_replacement_input() {
        let translation = translate(
            &request("03F7A3", "1033", DiskGeometry::IBM_3350)
                .with_queues(populated_queues())
                .with_evicted(AbsolutePage::new(0x05A2)),
        )
        .unwrap();

        assert!(!translation.is_fault());
        assert_eq!(translation.real_address().frame, 0x1033 >> 3);
    }

    // =========================================================================
    // Page fault
    // =========================================================================

    #[test]
    fn test_translate_fault_without_page_out() {
        init_logger();
        let translation = translate(
            &request("03FFA3", "103C", DiskGeometry::IBM_3330)
                .with_queues(populated_queues())
                .with_evicted(AbsolutePage::parse_hex("05A2").unwrap()),
        )
        .unwrap();

        let result = translation.fault().unwrap();
        assert!(result.entry.is_fault());
        assert_eq!(result.eviction.victim, QueueEntry::new(17, false, false));
        assert!(!result.eviction.needs_page_out());
        assert!(result.page_out.is_none());

        assert_eq!((result.evicted.segment, result.evicted.page), (45, 2));

        // page 127 on a 3330: 1 * 114 + 2 * 6 + 1
        let epa = result.page_in.locator;
        assert_eq!(result.page_in.absolute_page, 127);
        assert_eq!((epa.cylinder, epa.track, epa.slot), (1, 2, 1));
        assert_eq!(result.page_in.frame_base_hex(), "008800");

        assert_eq!(result.rebuilt.incoming.to_hex(), "0088");
        assert_eq!(result.rebuilt.outgoing.to_hex(), "008C");

        assert_eq!(result.real_address.value, 36_771);
        assert_eq!(result.real_address.to_hex(), "008FA3");

        assert_eq!(
            result.stages,
            vec![
                Stage::Decomposed,
                Stage::Analyzed,
                Stage::FaultDetected,
                Stage::VictimChosen,
                Stage::EvictedPageIdentified,
                Stage::PageInComputed,
                Stage::EntriesRebuilt,
                Stage::Resolved,
            ]
        );
    }

    #[test]
    fn test_translate_fault_with_page_out() {
        init_logger();
        // Frame 32 sits in both Q10 and HQ; accepted as given
        let queues = QueueSet::new()
            .with_queue(QueueName::Q00, queue(&[(13, 1, 1), (24, 1, 1), (15, 1, 1)]))
            .with_queue(QueueName::Q01, queue(&[(29, 1, 1), (30, 1, 1)]))
            .with_queue(QueueName::Q10, queue(&[(32, 1, 1)]))
            .with_queue(QueueName::Q11, queue(&[(25, 0, 1)]))
            .with_queue(QueueName::Hq, queue(&[(32, 1, 0), (36, 1, 1), (28, 1, 0)]));
        let translation = translate(
            &request("00A845", "2565", DiskGeometry::IBM_3350)
                .with_queues(queues)
                .with_evicted(AbsolutePage::parse_hex("1542").unwrap()),
        )
        .unwrap();

        let result = translation.fault().unwrap();
        assert_eq!(result.eviction.victim, QueueEntry::new(13, false, true));
        assert!(result.eviction.needs_page_out());

        assert_eq!((result.evicted.segment, result.evicted.page), (170, 2));
        let page_out = result.page_out.unwrap();
        assert_eq!(page_out.absolute_page, 5442);
        assert_eq!(
            (page_out.locator.cylinder, page_out.locator.track, page_out.locator.slot),
            (22, 20, 2)
        );
        assert_eq!(page_out.frame_base, 13 * 2048);

        // requested page: S=0, P=21
        let page_in = result.page_in;
        assert_eq!(page_in.absolute_page, 21);
        assert_eq!(
            (page_in.locator.cylinder, page_in.locator.track, page_in.locator.slot),
            (0, 2, 5)
        );

        assert_eq!(result.rebuilt.incoming.to_hex(), "0068");
        assert_eq!(result.rebuilt.outgoing.to_hex(), "006C");
        assert_eq!(result.real_address.to_hex(), "006845");
        assert!(result.stages.contains(&Stage::PageOutComputed));
    }

    #[test]
    fn test_translate_fault_after_rotation() {
        let queues = QueueSet::new().with_queue(QueueName::Q01, queue(&[(5, 0, 0)]));
        let translation = translate(
            &request("000000", "0004", DiskGeometry::IBM_3340)
                .with_queues(queues)
                .with_evicted(AbsolutePage::new(0)),
        )
        .unwrap();

        let result = translation.fault().unwrap();
        assert_eq!(result.eviction.steps[0], EvictionStep::RotateQueues);
        assert_eq!(result.eviction.victim.frame, 5);
        assert!(result.page_out.is_none());
        assert_eq!(result.real_address.value, 5 * 2048);
    }

    #[test]
    fn test_fault_requires_queues() {
        let err = translate(
            &request("03FFA3", "103C", DiskGeometry::IBM_3330)
                .with_evicted(AbsolutePage::new(0x05A2)),
        )
        .unwrap_err();
        assert!(matches!(err, DatError::InvalidInput(_)));
    }

    #[test]
    fn test_fault_requires_evicted_locator() {
        let err = translate(
            &request("03FFA3", "103C", DiskGeometry::IBM_3330).with_queues(populated_queues()),
        )
        .unwrap_err();
        assert!(matches!(err, DatError::InvalidInput(_)));
    }

    #[test]
    fn test_eviction_errors_propagate() {
        let base = request("03FFA3", "103C", DiskGeometry::IBM_3330).with_evicted(AbsolutePage::new(1));

        let err = translate(&base.clone().with_queues(QueueSet::new())).unwrap_err();
        assert_eq!(err, DatError::NoVictimAvailable);

        let err = translate_with(
            &base.with_queues(populated_queues()),
            &SecondChance::with_limit(2),
        )
        .unwrap_err();
        assert_eq!(err, DatError::ReplacementLimitExceeded { limit: 2 });
    }

    #[test]
    fn test_translation_leaves_request_untouched() {
        let request = request("03FFA3", "103C", DiskGeometry::IBM_3330)
            .with_queues(populated_queues())
            .with_evicted(AbsolutePage::new(0x05A2));
        let before = request.clone();

        let first = translate(&request).unwrap();
        let second = translate(&request).unwrap();
        assert_eq!(request, before);
        assert_eq!(first, second);
    }

    // =========================================================================
    // Scenario files
    // =========================================================================

    #[test]
    fn test_translate_from_scenario() {
        let content = "
            address 03F7A3
            entry   0134
            disk    3350
            Q00     17 1 0, 25 1 1, 14 1 0
            Q01     31 1 1, 48 1 1, 23 0 1, 29 1 1
            evicted 05A2
        ";
        let scenario = Scenario::parse(content).unwrap();
        let mut catalog = DiskCatalog::new();
        let translation = translate(&scenario.request(&mut catalog).unwrap()).unwrap();

        let result = translation.fault().unwrap();
        assert_eq!(result.eviction.victim.frame, 17);
        // page 126 on a 3350: 0 * 240 + 15 * 8 + 6
        let epa = result.page_in.locator;
        assert_eq!((epa.cylinder, epa.track, epa.slot), (0, 15, 6));
        assert_eq!(result.real_address.value, 17 * 2048 + 0x7A3);
    }
}
