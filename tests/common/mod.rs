use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use rust_htslib::bam;
use rust_htslib::bam::record::{Cigar, CigarString};

use readtally::{
    Candidate, ContextBuilder, EvidenceAggregator, EvidenceConfig, ReadOutcome, ReadSupportCounts,
    ReferenceWindow,
};

pub(crate) const CONTIG: &str = "chr1";

/// 1-based positions 1..=60, with a run of 8 As at 22..=29.
pub(crate) const REFERENCE: &[u8] =
    b"GATCCGTAGCTTGACCATGGCAAAAAAAATGCTGGATCAGTCCAGTTCAGGTACGACTTG";

pub(crate) fn reference() -> ReferenceWindow {
    ReferenceWindow::new(CONTIG, 1, REFERENCE)
}

/// Reference bases with the base at the 1-based position replaced.
pub(crate) fn substituted(pos: usize, base: u8) -> Vec<u8> {
    let mut seq = REFERENCE.to_vec();
    seq[pos - 1] = base;
    seq
}

/// Reference bases with `inserted` placed after the 1-based position `pos`.
pub(crate) fn inserted(pos: usize, inserted: &[u8]) -> Vec<u8> {
    let mut seq = REFERENCE[..pos].to_vec();
    seq.extend_from_slice(inserted);
    seq.extend_from_slice(&REFERENCE[pos..]);
    seq
}

/// An unpaired record with mapping quality 60 and base qualities of 35.
/// `pos` is 0-based, as stored in BAM.
pub(crate) fn record(qname: &str, pos: i64, cigar: Vec<Cigar>, seq: &[u8]) -> bam::Record {
    let mut record = bam::Record::new();
    record.set(
        qname.as_bytes(),
        Some(&CigarString(cigar)),
        seq,
        &vec![35; seq.len()],
    );
    record.set_tid(0);
    record.set_pos(pos);
    record.set_mtid(-1);
    record.set_mpos(-1);
    record.set_mapq(60);
    record
}

/// Classify all reads against a template built from the reference.
pub(crate) fn count(
    variant: &Candidate,
    config: &EvidenceConfig,
    reads: &[bam::Record],
) -> (ReadSupportCounts, Vec<ReadOutcome>) {
    let _ = env_logger::builder().is_test(true).try_init();
    let reference = reference();
    let context = ContextBuilder::new(config.flank_size())
        .build_from_reference(variant, &reference)
        .unwrap();
    let mut aggregator = EvidenceAggregator::new(variant, &context, config, None, &reference);
    let outcomes = reads
        .iter()
        .map(|read| aggregator.accept(read).unwrap())
        .collect();
    (aggregator.into_counts(), outcomes)
}

pub(crate) fn write_reference(dir: &Path) -> PathBuf {
    let path = dir.join("ref.fa");
    let mut fasta = fs::File::create(&path).unwrap();
    writeln!(fasta, ">{}", CONTIG).unwrap();
    fasta.write_all(REFERENCE).unwrap();
    writeln!(fasta).unwrap();
    let mut fai = fs::File::create(dir.join("ref.fa.fai")).unwrap();
    writeln!(
        fai,
        "{}\t{}\t{}\t{}\t{}",
        CONTIG,
        REFERENCE.len(),
        CONTIG.len() + 2,
        REFERENCE.len(),
        REFERENCE.len() + 1
    )
    .unwrap();
    path
}

pub(crate) fn write_candidates(dir: &Path, records: &[&str]) -> PathBuf {
    let path = dir.join("candidates.vcf");
    let mut vcf = fs::File::create(&path).unwrap();
    writeln!(vcf, "##fileformat=VCFv4.2").unwrap();
    writeln!(vcf, "##contig=<ID={},length={}>", CONTIG, REFERENCE.len()).unwrap();
    writeln!(
        vcf,
        "##INFO=<ID=HOTSPOT,Number=0,Type=Flag,Description=\"Known hotspot\">"
    )
    .unwrap();
    writeln!(vcf, "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO").unwrap();
    for record in records {
        writeln!(vcf, "{}", record).unwrap();
    }
    path
}

/// Write position sorted reads to an indexed BAM file.
pub(crate) fn write_bam(dir: &Path, name: &str, reads: &[bam::Record]) -> PathBuf {
    let path = dir.join(format!("{}.bam", name));
    let mut header = bam::Header::new();
    let mut contig = bam::header::HeaderRecord::new(b"SQ");
    contig.push_tag(b"SN", &CONTIG);
    contig.push_tag(b"LN", &REFERENCE.len());
    header.push_record(&contig);
    {
        let mut writer = bam::Writer::from_path(&path, &header, bam::Format::Bam).unwrap();
        for read in reads {
            writer.write(read).unwrap();
        }
    }
    bam::index::build(&path, None, bam::index::Type::Bai, 1).unwrap();
    path
}
