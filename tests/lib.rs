use std::collections::HashMap;
use std::fs;

use approx::assert_relative_eq;
use itertools::Itertools;
use rust_htslib::bam::record::Cigar;
use rust_htslib::bam::Record;

use readtally::calling::aggregator::ReadOutcome;
use readtally::cli::{run, Readtally};
use readtally::config::EvidenceConfigBuilder;
use readtally::variants::evidence::realignment::RealignmentKind;
use readtally::{
    Candidate, ContextBuilder, EvidenceConfig, MatchResult, SupportKind, Tier,
};

mod common;

use common::{count, inserted, record, reference, substituted, REFERENCE};

fn config() -> EvidenceConfig {
    EvidenceConfigBuilder::default().flank_size(10).build().unwrap()
}

/// G>T within unique sequence.
fn snv() -> Candidate {
    Candidate::new(common::CONTIG, 45, b"G", b"T").unwrap()
}

/// One more A at the end of the run of 8 As at 22..=29.
fn repeat_insertion() -> Candidate {
    Candidate::new(common::CONTIG, 29, b"A", b"AA").unwrap()
}

fn full_length(qname: &str, seq: &[u8]) -> Record {
    record(qname, 0, vec![Cigar::Match(seq.len() as u32)], seq)
}

macro_rules! support {
    ($name:ident, $variant:expr, $read:expr, $expected:expr) => {
        #[test]
        fn $name() {
            let (counts, outcomes) = count(&$variant, &config(), &[$read]);
            assert_eq!(outcomes[0].support(), $expected);
            assert_eq!(counts.coverage(), 1);
        }
    };
}

support!(
    test_snv_full,
    snv(),
    full_length("alt", &substituted(45, b'T')),
    Some(SupportKind::Full)
);
support!(
    test_snv_reference,
    snv(),
    full_length("ref", REFERENCE),
    Some(SupportKind::Reference)
);
// read ends 5 bases after the core
support!(
    test_snv_partial,
    snv(),
    full_length("partial", &substituted(45, b'T')[..52]),
    Some(SupportKind::Partial)
);
support!(
    test_snv_flank_mismatch,
    snv(),
    {
        let mut seq = substituted(45, b'T');
        seq[48] = b'C';
        full_length("mismatch", &seq)
    },
    Some(SupportKind::Core)
);
support!(
    test_insertion_full,
    repeat_insertion(),
    record(
        "alt",
        0,
        vec![Cigar::Match(29), Cigar::Ins(1), Cigar::Match(31)],
        &inserted(29, b"A"),
    ),
    Some(SupportKind::Full)
);
// AG>CT at 44..=45
support!(
    test_mnv_full,
    Candidate::new(common::CONTIG, 44, b"AG", b"CT").unwrap(),
    full_length("alt", &[&REFERENCE[..43], b"CT", &REFERENCE[45..]].concat()),
    Some(SupportKind::Full)
);
// ATC>A at 36
support!(
    test_deletion_full,
    Candidate::new(common::CONTIG, 36, b"ATC", b"A").unwrap(),
    record(
        "alt",
        0,
        vec![Cigar::Match(36), Cigar::Del(2), Cigar::Match(22)],
        &[&REFERENCE[..36], &REFERENCE[38..]].concat(),
    ),
    Some(SupportKind::Full)
);

#[test]
fn test_soft_clipped_read_without_realignment() {
    // variant within the trailing soft clip, another base than the alt allele
    let other = substituted(45, b'A');
    let clipped = record(
        "clipped",
        0,
        vec![Cigar::Match(44), Cigar::SoftClip(16)],
        &other,
    );
    let (counts, outcomes) = count(&snv(), &config(), &[clipped]);
    assert_eq!(outcomes[0], ReadOutcome::Uninformative);
    assert_eq!(counts.coverage(), 0);

    // the same bases aligned count toward coverage
    let (counts, outcomes) = count(&snv(), &config(), &[full_length("aligned", &other)]);
    assert!(outcomes[0].is_counted());
    assert_eq!(outcomes[0].support(), None);
    assert_eq!(counts.coverage(), 1);
}

#[test]
fn test_improper_pair() {
    let alt = substituted(45, b'T');
    let with_flags = |qname: &str, flags: u16| {
        let mut read = full_length(qname, &alt);
        read.set_mapq(40);
        read.set_flags(flags);
        read
    };
    let reads = [
        // paired, not proper
        with_flags("improper", 0x1),
        with_flags("proper", 0x1 | 0x2),
        with_flags("unpaired", 0x0),
    ];
    let (counts, outcomes) = count(&snv(), &config(), &reads);
    let qualities = outcomes
        .iter()
        .map(|outcome| match outcome {
            ReadOutcome::Counted { quality, .. } => *quality,
            outcome => panic!("unexpected outcome {:?}", outcome),
        })
        .collect_vec();
    // min(40 - 15 - 15, 35 - 12)
    assert_relative_eq!(qualities[0], 10.0);
    // min(40 - 15, 35 - 12)
    assert_relative_eq!(qualities[1], 23.0);
    assert_relative_eq!(qualities[2], 23.0);
    assert_eq!(counts.improper_pair(), 1);
    assert_eq!(counts.count(SupportKind::Full), 3);
    assert_eq!(counts.quality(SupportKind::Full), 56);
}

#[test]
fn test_realignment_disabled() {
    let read = record(
        "shifted",
        0,
        vec![Cigar::Match(21), Cigar::Ins(1), Cigar::Match(39)],
        &inserted(29, b"A"),
    );
    let config = EvidenceConfigBuilder::default()
        .flank_size(10)
        .realign(false)
        .build()
        .unwrap();
    let (counts, outcomes) = count(&repeat_insertion(), &config, &[read]);
    match outcomes[0] {
        ReadOutcome::Counted {
            support,
            realignment,
            ..
        } => {
            // falls back to the base at the anchor
            assert_eq!(support, Some(SupportKind::Reference));
            assert_eq!(realignment, RealignmentKind::None);
        }
        outcome => panic!("unexpected outcome {:?}", outcome),
    }
    assert_eq!(counts.count(SupportKind::Realigned), 0);
    assert_eq!(counts.shortened() + counts.lengthened(), 0);
}

#[test]
fn test_snv_quality() {
    let (counts, outcomes) = count(
        &snv(),
        &config(),
        &[full_length("alt", &substituted(45, b'T'))],
    );
    // min(60 - 15, 35 - 12)
    match outcomes[0] {
        ReadOutcome::Counted { quality, .. } => assert_relative_eq!(quality, 23.0),
        outcome => panic!("unexpected outcome {:?}", outcome),
    }
    assert_eq!(counts.quality(SupportKind::Full), 23);
    assert_eq!(counts.tumor_quality(), 23);
    assert_eq!(counts.raw_alt_support(), 1);
    assert_eq!(counts.raw_alt_base_quality(), 35);
}

#[test]
fn test_insertion_placed_left_of_repeat_is_realigned() {
    // same bases as the alt haplotype, but the aligner put the extra A in
    // front of the run
    let read = record(
        "shifted",
        0,
        vec![Cigar::Match(21), Cigar::Ins(1), Cigar::Match(39)],
        &inserted(29, b"A"),
    );
    let (counts, outcomes) = count(&repeat_insertion(), &config(), &[read]);
    match outcomes[0] {
        ReadOutcome::Counted {
            support,
            realignment,
            ..
        } => {
            assert_eq!(support, Some(SupportKind::Realigned));
            assert_eq!(realignment, RealignmentKind::Exact);
        }
        outcome => panic!("unexpected outcome {:?}", outcome),
    }
    assert_eq!(counts.count(SupportKind::Realigned), 1);
    assert_eq!(counts.alt_support(), 1);
    assert_relative_eq!(counts.jitter_penalty(), 0.0);
}

#[test]
fn test_repeat_jitter() {
    let shortened = full_length("ref", REFERENCE);
    let lengthened = record(
        "lengthened",
        0,
        vec![Cigar::Match(21), Cigar::Ins(3), Cigar::Match(39)],
        &inserted(29, b"AAA"),
    );
    let (counts, outcomes) = count(&repeat_insertion(), &config(), &[shortened, lengthened]);

    let realignments = outcomes
        .iter()
        .map(|outcome| match outcome {
            ReadOutcome::Counted { realignment, .. } => *realignment,
            _ => RealignmentKind::None,
        })
        .collect_vec();
    assert_eq!(
        realignments,
        vec![RealignmentKind::Shortened, RealignmentKind::Lengthened]
    );
    assert_eq!(counts.shortened(), 1);
    assert_eq!(counts.lengthened(), 1);
    // 0.25 * (8 - 3) + 0.25 * (11 - 3)
    assert_relative_eq!(counts.jitter_penalty(), 3.25);
    // both reads carry the reference base at the anchor
    assert_eq!(counts.ref_support(), 2);
    assert_eq!(counts.alt_support(), 0);
}

#[test]
fn test_variant_within_deletion() {
    let variant = Candidate::new(common::CONTIG, 18, b"T", b"C").unwrap();
    let seq = [&REFERENCE[..15], &REFERENCE[23..]].concat();
    let read = record(
        "deletion",
        0,
        vec![Cigar::Match(15), Cigar::Del(8), Cigar::Match(37)],
        &seq,
    );
    let (counts, outcomes) = count(&variant, &config(), &[read]);
    assert_eq!(outcomes[0], ReadOutcome::Uninformative);
    assert_eq!(counts.coverage(), 0);
    assert_eq!(counts.raw_depth(), 1);
    assert_eq!(counts.raw_ref_support(), 0);
}

#[test]
fn test_spliced_reads() {
    let alt = substituted(45, b'T');
    // variant within the skipped region
    let skipping = record(
        "skipping",
        0,
        vec![Cigar::Match(10), Cigar::RefSkip(40), Cigar::Match(10)],
        &[&alt[..10], &alt[50..]].concat(),
    );
    // long gap upstream of the variant, the left flank is lost
    let upstream = record(
        "upstream",
        0,
        vec![Cigar::Match(5), Cigar::RefSkip(35), Cigar::Match(20)],
        &[&alt[..5], &alt[40..]].concat(),
    );
    let (counts, outcomes) = count(&snv(), &config(), &[skipping, upstream]);
    assert_eq!(outcomes[0], ReadOutcome::SkippedRegion);
    assert_eq!(outcomes[1].support(), Some(SupportKind::Core));
    assert_eq!(counts.coverage(), 1);
    assert_eq!(counts.raw_depth(), 1);
}

#[test]
fn test_counted_reads_make_up_coverage() {
    let alt = substituted(45, b'T');
    let mut mismatch = alt.clone();
    mismatch[48] = b'C';
    let reads = vec![
        full_length("alt", &alt),
        full_length("ref", REFERENCE),
        full_length("partial", &alt[..52]),
        full_length("mismatch", &mismatch),
        full_length("other", &substituted(45, b'A')),
        record("short", 0, vec![Cigar::Match(46)], &alt[..46]),
    ];
    let (counts, outcomes) = count(&snv(), &config(), &reads);

    let counted = outcomes.iter().filter(|outcome| outcome.is_counted()).count();
    assert_eq!(counted as u32, counts.coverage());
    assert_eq!(counts.coverage(), 5);
    // the read with another base only counts toward coverage
    assert_eq!(outcomes[4].support(), None);
    assert_eq!(outcomes[5], ReadOutcome::Uninformative);
    assert!(counts.alt_support() + counts.ref_support() <= counts.coverage());
    assert_relative_eq!(counts.vaf(), 0.6);
}

#[test]
fn test_smaller_flanks_never_match_weaker() {
    let context = ContextBuilder::new(10)
        .build_from_reference(&snv(), &reference())
        .unwrap();
    let template = context.window();
    let mut read = substituted(45, b'T');
    read[48] = b'C';

    let results = (1..=10)
        .map(|flank_size| template.with_flank_size(flank_size).match_at(44, &read, true))
        .collect_vec();
    assert_eq!(results[0], MatchResult::Full);
    assert_eq!(results[1], MatchResult::Core);
    assert!(results.windows(2).all(|pair| pair[0] >= pair[1]));
}

#[test]
fn test_count_command() {
    let dir = tempfile::tempdir().unwrap();
    let reference = common::write_reference(dir.path());
    let candidates = common::write_candidates(
        dir.path(),
        &[
            "chr1\t29\t.\tA\tAA\t.\t.\t.",
            "chr1\t45\t.\tG\tT\t.\t.\tHOTSPOT",
        ],
    );

    let alt = substituted(45, b'T');
    let mut duplicate = full_length("duplicate", &alt);
    duplicate.set_flags(0x400);
    let tumor = common::write_bam(
        dir.path(),
        "tumor",
        &[
            full_length("alt1", &alt),
            full_length("alt2", &alt),
            duplicate,
            full_length("ref", REFERENCE),
        ],
    );
    let normal = common::write_bam(
        dir.path(),
        "normal",
        &[full_length("ref1", REFERENCE), full_length("ref2", REFERENCE)],
    );
    let output = dir.path().join("counts.tsv");

    run(Readtally::Count {
        reference,
        candidates,
        bams: vec![
            format!("tumor={}", tumor.display()),
            format!("normal={}", normal.display()),
        ],
        config: None,
        recalibration: None,
        threads: 2,
        output: Some(output.clone()),
        verbose: false,
    })
    .unwrap();

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .from_reader(fs::File::open(&output).unwrap());
    let rows: Vec<HashMap<String, String>> = reader.deserialize().map(|row| row.unwrap()).collect();
    assert_eq!(rows.len(), 4);

    let samples = rows.iter().map(|row| row["sample"].as_str()).collect_vec();
    assert_eq!(samples, vec!["tumor", "normal", "tumor", "normal"]);

    let tumor_snv = &rows[2];
    assert_eq!(tumor_snv["pos"], "45");
    assert_eq!(tumor_snv["tier"], Tier::Hotspot.to_string());
    assert_eq!(tumor_snv["full"], "2");
    assert_eq!(tumor_snv["reference"], "1");
    assert_eq!(tumor_snv["coverage"], "3");
    assert_eq!(tumor_snv["template_cigar"], "12M1X12M");

    let normal_snv = &rows[3];
    assert_eq!(normal_snv["alt_support"], "0");
    assert_eq!(normal_snv["reference"], "2");

    let tumor_insertion = &rows[0];
    assert_eq!(tumor_insertion["alt"], "AA");
    assert_eq!(tumor_insertion["repeat_count"], "9");
    assert_eq!(tumor_insertion["shortened"], "3");
}
