// Copyright 2021 Johannes Köster.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Classification of single reads into support counts of one variant in one sample.

use anyhow::Result;
use rust_htslib::bam;

use crate::calling::counts::{ReadSupportCounts, SupportKind};
use crate::calling::quality;
use crate::config::EvidenceConfig;
use crate::reference::ReferenceWindow;
use crate::utils::{aligned_bounds, alignment_start, is_improper_pair};
use crate::variants::context::VariantContext;
use crate::variants::evidence::bases::{QualityRecalibrationMap, EMPTY_RECALIBRATION};
use crate::variants::evidence::distance::ReadDistance;
use crate::variants::evidence::events;
use crate::variants::evidence::expansion::GapExpander;
use crate::variants::evidence::raw_context::RawContext;
use crate::variants::evidence::realignment::{self, Realignment, RealignmentKind};
use crate::variants::window::MatchResult;
use crate::variants::Candidate;

/// What happened to a read passed to `EvidenceAggregator::accept`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReadOutcome {
    /// The coverage cap was reached before, nothing was counted.
    CoverageCapped,
    LowMappingQuality,
    /// The variant lies in a reference region skipped by the read.
    SkippedRegion,
    /// Only raw bookkeeping was updated.
    Uninformative,
    Counted {
        /// `None` if the read only counts toward coverage.
        support: Option<SupportKind>,
        quality: f64,
        realignment: RealignmentKind,
    },
}

impl ReadOutcome {
    pub fn is_counted(&self) -> bool {
        matches!(self, ReadOutcome::Counted { .. })
    }

    pub fn support(&self) -> Option<SupportKind> {
        match self {
            ReadOutcome::Counted { support, .. } => *support,
            _ => None,
        }
    }
}

/// Tallies the reads of one sample for one candidate variant.
///
/// Every read passes the same sequence of checks, the first applicable one
/// decides what is counted.
pub struct EvidenceAggregator<'a> {
    variant: &'a Candidate,
    context: &'a VariantContext,
    config: &'a EvidenceConfig,
    recalibration: &'a QualityRecalibrationMap,
    reference: &'a ReferenceWindow,
    expander: GapExpander,
    counts: ReadSupportCounts,
}

impl<'a> EvidenceAggregator<'a> {
    /// Without a recalibration map, reported base qualities are used as is.
    pub fn new(
        variant: &'a Candidate,
        context: &'a VariantContext,
        config: &'a EvidenceConfig,
        recalibration: Option<&'a QualityRecalibrationMap>,
        reference: &'a ReferenceWindow,
    ) -> Self {
        EvidenceAggregator {
            variant,
            context,
            config,
            recalibration: recalibration.unwrap_or(&*EMPTY_RECALIBRATION),
            reference,
            expander: GapExpander::from(config.skipped_reference_regions()),
            counts: ReadSupportCounts::default(),
        }
    }

    pub fn counts(&self) -> &ReadSupportCounts {
        &self.counts
    }

    pub fn into_counts(self) -> ReadSupportCounts {
        self.counts
    }

    /// Classify the read and update the counts.
    ///
    /// Errors (e.g. malformed records) are logged and returned with the variant
    /// locus attached. They are meant to abort the processing of the region.
    pub fn accept(&mut self, record: &bam::Record) -> Result<ReadOutcome> {
        let variant = self.variant;
        self.classify(record).map_err(|e| {
            error!(
                "failed to process read {} for variant {}: {}",
                String::from_utf8_lossy(record.qname()),
                variant,
                e
            );
            e.context(format!(
                "error processing reads at {}:{}",
                variant.chrom(),
                variant.pos()
            ))
        })
    }

    fn classify(&mut self, record: &bam::Record) -> Result<ReadOutcome> {
        let qname = record.qname();
        if self.counts.coverage() >= self.config.max_coverage() {
            debug!(
                "coverage cap reached, skipping {}",
                String::from_utf8_lossy(qname)
            );
            return Ok(ReadOutcome::CoverageCapped);
        }
        if !self.variant.is_hotspot() && record.mapq() < self.config.min_map_quality() {
            debug!(
                "mapping quality {} too low, skipping {}",
                record.mapq(),
                String::from_utf8_lossy(qname)
            );
            return Ok(ReadOutcome::LowMappingQuality);
        }

        let raw = RawContext::classify(record, self.variant)?;
        if raw.in_skipped() {
            debug!(
                "variant in skipped region of {}",
                String::from_utf8_lossy(qname)
            );
            return Ok(ReadOutcome::SkippedRegion);
        }
        self.counts.register_raw(&raw);

        let read_index = match raw.read_index() {
            Some(read_index) if !raw.in_delete() => read_index,
            _ => return Ok(self.uninformative(qname)),
        };

        let template = self.context.window();
        let cigar = record.cigar();
        let bases = record.seq().as_bytes();
        let expanded = self.expander.expand(&cigar, &bases, read_index);
        if !template.is_core_covered(expanded.index(), expanded.bases().len()) {
            return Ok(self.uninformative(qname));
        }

        let (core_left, core_right) = quality::core_in_read(template, read_index, bases.len())
            .unwrap_or((read_index, read_index));
        let quality = self.read_quality(record, &raw, read_index, (core_left, core_right))?;

        let wildcards = self.context.wildcards_in_core(self.variant);
        let support = match template.match_at(expanded.index(), expanded.bases(), wildcards) {
            MatchResult::Full => Some(SupportKind::Full),
            MatchResult::Partial => Some(SupportKind::Partial),
            MatchResult::Core => Some(SupportKind::Core),
            MatchResult::None => None,
        };
        if support.is_some() {
            return Ok(self.count(record, support, quality, Realignment::none()));
        }

        let realignment = if self.config.realign() {
            let read_distance = ReadDistance::score(
                &cigar,
                &bases,
                alignment_start(record),
                self.reference,
                core_left,
                core_right,
            );
            realignment::realign(
                template,
                self.context.repeat().as_ref(),
                expanded.index(),
                expanded.bases(),
                read_distance.indel_bases() as usize,
            )
        } else {
            Realignment::none()
        };
        match realignment.kind() {
            RealignmentKind::Exact => {
                return Ok(self.count(record, Some(SupportKind::Realigned), quality, realignment))
            }
            RealignmentKind::None if raw.in_soft_clip() => return Ok(self.uninformative(qname)),
            _ => (),
        }

        if realignment.is_jitter() {
            let penalty = quality::jitter_penalty(
                self.config.quality(),
                realignment.repeat_count(),
            );
            self.counts
                .register_jitter(realignment.kind() == RealignmentKind::Lengthened, penalty);
        }
        let support = if raw.alt_support() {
            Some(SupportKind::Alt)
        } else if raw.ref_support() {
            Some(SupportKind::Reference)
        } else {
            None
        };
        Ok(self.count(record, support, quality, realignment))
    }

    fn read_quality(
        &self,
        record: &bam::Record,
        raw: &RawContext,
        read_index: usize,
        core: (usize, usize),
    ) -> Result<f64> {
        let cigar = record.cigar();
        let quality_config = self.config.quality();

        let edit_distance = events::raw_edit_distance(record, self.reference)?;
        let events = events::number_of_events_with_mnv(
            events::number_of_events(&cigar, edit_distance),
            self.variant,
            raw.alt_support(),
        );
        let map_quality = quality::modified_map_quality(
            quality_config,
            record.mapq(),
            events,
            self.config.min_number_of_events(),
            is_improper_pair(record),
        );

        let base_quality = quality::variant_base_quality(
            self.variant,
            record.qual(),
            read_index,
            self.context.window(),
            self.recalibration,
            self.reference,
        );
        let edge_distance =
            quality::read_edge_distance(core.0, core.1, aligned_bounds(&cigar, record.seq_len()));
        let base_quality = quality::modified_base_quality(quality_config, base_quality, edge_distance);

        Ok(quality::quality_score(map_quality, base_quality))
    }

    fn count(
        &mut self,
        record: &bam::Record,
        support: Option<SupportKind>,
        quality: f64,
        realignment: Realignment,
    ) -> ReadOutcome {
        self.counts.register(support, quality);
        if is_improper_pair(record) {
            self.counts.register_improper_pair();
        }
        ReadOutcome::Counted {
            support,
            quality,
            realignment: realignment.kind(),
        }
    }

    fn uninformative(&self, qname: &[u8]) -> ReadOutcome {
        debug!(
            "read {} is uninformative for {}",
            String::from_utf8_lossy(qname),
            self.variant
        );
        ReadOutcome::Uninformative
    }
}
