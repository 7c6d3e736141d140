// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use std::cmp;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use rayon::prelude::*;
use rust_htslib::bam::{self, Read as BamRead};
use rust_htslib::bcf::{self, Read as BcfRead};
use structopt::StructOpt;

use crate::calling::aggregator::EvidenceAggregator;
use crate::calling::counts::{ReadSupportCounts, SupportKind};
use crate::config::EvidenceConfig;
use crate::errors::Error;
use crate::reference::{self, ReferenceWindow};
use crate::variants::context::{ContextBuilder, VariantContext};
use crate::variants::evidence::bases::QualityRecalibrationMap;
use crate::variants::evidence::raw_context::RawContext;
use crate::variants::{Candidate, Tier};

/// Reference bases loaded around each candidate, enough to cover reads overlapping it.
const REFERENCE_PADDING: u64 = 500;

#[derive(Debug, StructOpt, Clone)]
#[structopt(
    name = "readtally",
    about = "Classify reads as supporting candidate somatic variants or the reference and tally quality-weighted support per sample."
)]
#[structopt(setting = structopt::clap::AppSettings::ColoredHelp)]
pub enum Readtally {
    #[structopt(
        name = "count",
        about = "Count read support of candidate variants in one or more samples.",
        usage = "readtally count --reference ref.fa --candidates calls.bcf --bam tumor=tumor.bam --bam normal=normal.bam > counts.tsv"
    )]
    Count {
        #[structopt(
            long,
            parse(from_os_str),
            help = "FASTA file with reference genome. Has to be indexed with samtools faidx."
        )]
        reference: PathBuf,
        #[structopt(
            long,
            parse(from_os_str),
            help = "VCF/BCF file with candidate variants. Records with the INFO flag HOTSPOT are \
                    exempt from the mapping quality threshold."
        )]
        candidates: PathBuf,
        #[structopt(
            long = "bam",
            required = true,
            help = "Indexed BAM file of a sample, given as samplename=path. Can be repeated."
        )]
        bams: Vec<String>,
        #[structopt(
            long,
            parse(from_os_str),
            help = "YAML file with configuration (flank size, coverage cap, quality penalties)."
        )]
        config: Option<PathBuf>,
        #[structopt(
            long,
            parse(from_os_str),
            help = "Tab separated base quality recalibration table."
        )]
        recalibration: Option<PathBuf>,
        #[structopt(long, default_value = "1", help = "Number of threads to use.")]
        threads: usize,
        #[structopt(
            long,
            parse(from_os_str),
            help = "TSV file that shall contain the results (if omitted, write to STDOUT)."
        )]
        output: Option<PathBuf>,
        #[structopt(long, help = "Print debugging information.")]
        verbose: bool,
    },
}

impl Readtally {
    pub fn verbose(&self) -> bool {
        match self {
            Readtally::Count { verbose, .. } => *verbose,
        }
    }
}

/// One line of output, describing the support of a candidate in a sample.
#[derive(Debug, Serialize)]
struct CountRecord<'a> {
    chrom: &'a str,
    pos: u64,
    #[serde(rename = "ref")]
    ref_allele: String,
    #[serde(rename = "alt")]
    alt_allele: String,
    tier: String,
    sample: &'a str,
    full: u32,
    partial: u32,
    core: u32,
    realigned: u32,
    alt: u32,
    reference: u32,
    coverage: u32,
    full_quality: u32,
    partial_quality: u32,
    core_quality: u32,
    realigned_quality: u32,
    alt_quality: u32,
    reference_quality: u32,
    coverage_quality: u32,
    alt_support: u32,
    vaf: f64,
    tumor_quality: u32,
    lengthened: u32,
    shortened: u32,
    jitter_penalty: u32,
    raw_depth: u32,
    raw_alt_support: u32,
    raw_ref_support: u32,
    raw_depth_base_quality: u32,
    raw_alt_base_quality: u32,
    raw_ref_base_quality: u32,
    improper_pair: u32,
    repeat_count: usize,
    microhomology: String,
    template_distance: u32,
    template_cigar: &'a str,
}

impl<'a> CountRecord<'a> {
    fn new(
        candidate: &'a Candidate,
        sample: &'a str,
        context: &'a VariantContext,
        counts: &ReadSupportCounts,
    ) -> Self {
        CountRecord {
            chrom: candidate.chrom(),
            pos: candidate.pos(),
            ref_allele: String::from_utf8_lossy(candidate.ref_allele()).into_owned(),
            alt_allele: String::from_utf8_lossy(candidate.alt_allele()).into_owned(),
            tier: candidate.tier().to_string(),
            sample,
            full: counts.count(SupportKind::Full),
            partial: counts.count(SupportKind::Partial),
            core: counts.count(SupportKind::Core),
            realigned: counts.count(SupportKind::Realigned),
            alt: counts.count(SupportKind::Alt),
            reference: counts.count(SupportKind::Reference),
            coverage: counts.coverage(),
            full_quality: counts.quality(SupportKind::Full),
            partial_quality: counts.quality(SupportKind::Partial),
            core_quality: counts.quality(SupportKind::Core),
            realigned_quality: counts.quality(SupportKind::Realigned),
            alt_quality: counts.quality(SupportKind::Alt),
            reference_quality: counts.quality(SupportKind::Reference),
            coverage_quality: counts.quality(SupportKind::Coverage),
            alt_support: counts.alt_support(),
            vaf: counts.vaf(),
            tumor_quality: counts.tumor_quality(),
            lengthened: counts.lengthened(),
            shortened: counts.shortened(),
            jitter_penalty: counts.jitter_penalty() as u32,
            raw_depth: counts.raw_depth(),
            raw_alt_support: counts.raw_alt_support(),
            raw_ref_support: counts.raw_ref_support(),
            raw_depth_base_quality: counts.raw_depth_base_quality(),
            raw_alt_base_quality: counts.raw_alt_base_quality(),
            raw_ref_base_quality: counts.raw_ref_base_quality(),
            improper_pair: counts.improper_pair(),
            repeat_count: context.repeat_count(),
            microhomology: String::from_utf8_lossy(context.microhomology()).into_owned(),
            template_distance: context.distance().distance(),
            template_cigar: context.distance().cigar(),
        }
    }
}

/// Counts of all samples for one candidate.
struct CandidateCounts {
    candidate: Candidate,
    context: VariantContext,
    counts: Vec<ReadSupportCounts>,
}

pub fn run(opt: Readtally) -> Result<()> {
    match opt {
        Readtally::Count {
            reference,
            candidates,
            bams,
            config,
            recalibration,
            threads,
            output,
            ..
        } => {
            let config = match config {
                Some(path) => EvidenceConfig::from_path(path)?,
                None => EvidenceConfig::default(),
            };
            let recalibration = match recalibration {
                Some(path) => Some(QualityRecalibrationMap::from_path(path)?),
                None => None,
            };
            let samples = bams
                .iter()
                .map(|spec| parse_sample(spec))
                .collect::<Result<Vec<_>>>()?;
            let candidates = read_candidates(&candidates)?;
            info!(
                "counting read support of {} candidates in {} samples",
                candidates.len(),
                samples.len()
            );

            let reference_buffer = reference::Buffer::from_path(&reference, threads.max(1) * 2)?;
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()?;

            let results: Vec<CandidateCounts> = pool.install(|| {
                candidates
                    .into_par_iter()
                    .map_init(
                        || open_samples(&samples),
                        |readers, candidate| {
                            let readers = match readers {
                                Ok(readers) => readers,
                                Err(e) => return Err(anyhow!("unable to open BAM files: {}", e)),
                            };
                            count_candidate(
                                candidate,
                                readers,
                                &reference_buffer,
                                &config,
                                recalibration.as_ref(),
                            )
                        },
                    )
                    .collect::<Result<Vec<_>>>()
            })?;

            let writer: Box<dyn io::Write> = match output {
                Some(path) => Box::new(std::fs::File::create(&path).with_context(|| {
                    format!("unable to create output file {}", path.display())
                })?),
                None => Box::new(io::stdout()),
            };
            let mut writer = csv::WriterBuilder::new()
                .delimiter(b'\t')
                .from_writer(writer);
            for result in &results {
                for ((name, _), counts) in samples.iter().zip(&result.counts) {
                    writer.serialize(CountRecord::new(
                        &result.candidate,
                        name,
                        &result.context,
                        counts,
                    ))?;
                }
            }
            writer.flush()?;
            Ok(())
        }
    }
}

fn parse_sample(spec: &str) -> Result<(String, PathBuf)> {
    match spec.splitn(2, '=').collect::<Vec<_>>().as_slice() {
        [name, path] if !name.is_empty() && !path.is_empty() => {
            Ok(((*name).to_owned(), PathBuf::from(path)))
        }
        _ => Err(Error::InvalidSampleSpec.into()),
    }
}

fn open_samples(samples: &[(String, PathBuf)]) -> Result<Vec<bam::IndexedReader>> {
    samples
        .iter()
        .map(|(_, path)| {
            bam::IndexedReader::from_path(path)
                .with_context(|| format!("unable to open BAM file {}", path.display()))
        })
        .collect()
}

/// Read candidates from a VCF/BCF file. Every ALT allele yields a candidate.
pub fn read_candidates<P: AsRef<Path>>(path: P) -> Result<Vec<Candidate>> {
    let mut reader = bcf::Reader::from_path(&path).with_context(|| {
        format!(
            "unable to read candidates from {}",
            path.as_ref().display()
        )
    })?;
    let mut candidates = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record?;
        let rid = record.rid().ok_or(Error::MissingChromosome { i })?;
        let chrom = String::from_utf8_lossy(record.header().rid2name(rid)?).into_owned();
        let pos = record.pos() as u64 + 1;
        let tier = if record.info(b"HOTSPOT").flag().unwrap_or(false) {
            Tier::Hotspot
        } else {
            Tier::default()
        };
        let alleles = record.alleles();
        let (ref_allele, alt_alleles) = match alleles.split_first() {
            Some(alleles) => alleles,
            None => {
                warn!("skipping record {} at {}:{} without alleles", i, chrom, pos);
                continue;
            }
        };
        for alt_allele in alt_alleles {
            match Candidate::new(&chrom, pos, ref_allele, alt_allele) {
                Ok(candidate) => candidates.push(candidate.with_tier(tier)),
                Err(e) => warn!("skipping candidate at {}:{}: {}", chrom, pos, e),
            }
        }
    }
    Ok(candidates)
}

fn fetch_reads(reader: &mut bam::IndexedReader, candidate: &Candidate) -> Result<Vec<bam::Record>> {
    let start = candidate.pos() as i64 - 1;
    let end = candidate.end() as i64 + 1;
    reader.fetch((candidate.chrom().as_str(), start, end))?;
    let mut reads = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.is_unmapped()
            || record.is_secondary()
            || record.is_duplicate()
            || record.is_quality_check_failed()
        {
            continue;
        }
        reads.push(record);
    }
    Ok(reads)
}

/// Build the template from the first alt supporting read yielding a complete
/// window, falling back to the reference with the alt allele applied.
fn select_template(
    builder: &ContextBuilder,
    candidate: &Candidate,
    reference: &ReferenceWindow,
    reads: &[Vec<bam::Record>],
) -> Result<VariantContext> {
    for record in reads.iter().flatten() {
        let raw = RawContext::classify(record, candidate)?;
        let read_index = match raw.read_index() {
            Some(read_index) if raw.alt_support() && !raw.in_soft_clip() => read_index,
            _ => continue,
        };
        let context = builder.build(candidate, reference, record, read_index)?;
        if context.window().is_complete() {
            debug!(
                "template of {} taken from read {}",
                candidate,
                String::from_utf8_lossy(record.qname())
            );
            return Ok(context);
        }
    }
    builder.build_from_reference(candidate, reference)
}

fn count_candidate(
    candidate: Candidate,
    readers: &mut [bam::IndexedReader],
    reference_buffer: &reference::Buffer,
    config: &EvidenceConfig,
    recalibration: Option<&QualityRecalibrationMap>,
) -> Result<CandidateCounts> {
    let padding = cmp::max(
        REFERENCE_PADDING,
        2 * (config.flank_size() as u64 + candidate.ref_allele().len() as u64),
    );
    let reference = reference_buffer.window(candidate.chrom(), candidate.pos(), padding)?;
    let reads = readers
        .iter_mut()
        .map(|reader| fetch_reads(reader, &candidate))
        .collect::<Result<Vec<_>>>()?;

    let builder = ContextBuilder::new(config.flank_size());
    let context = select_template(&builder, &candidate, &reference, &reads)?;

    let counts = reads
        .iter()
        .map(|sample_reads| {
            let mut aggregator =
                EvidenceAggregator::new(&candidate, &context, config, recalibration, &reference);
            for record in sample_reads {
                aggregator.accept(record)?;
            }
            Ok(aggregator.into_counts())
        })
        .collect::<Result<Vec<_>>>()?;
    debug!(
        "{}: coverage {:?}",
        candidate,
        counts.iter().map(|c| c.coverage()).collect::<Vec<_>>()
    );

    Ok(CandidateCounts {
        candidate,
        context,
        counts,
    })
}
