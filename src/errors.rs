use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum Error {
    #[error("malformed BAM record {qname}: {msg}")]
    MalformedRecord { qname: String, msg: String },
    #[error("invalid sequence window: {msg}")]
    InvalidWindow { msg: String },
    #[error("invalid allele '{allele}': alleles must be non-empty and consist of A, C, G, T or N")]
    InvalidAllele { allele: String },
    #[error("indel {ref_allele}>{alt_allele} does not consist of a single anchor base and the inserted or deleted bases")]
    UnanchoredIndel {
        ref_allele: String,
        alt_allele: String,
    },
    #[error("aux tag {tag} of BAM record has a non-integer type")]
    InvalidAuxTag { tag: String },
    #[error("contig {contig} not found in reference")]
    ContigNotFound { contig: String },
    #[error("position {contig}:{pos} lies outside of the reference window")]
    ReferenceWindowOutOfBounds { contig: String, pos: u64 },
    #[error("BAM files must be provided as samplename=path")]
    InvalidSampleSpec,
    #[error("record {i} in candidate BCF/VCF does not define a chromosome")]
    MissingChromosome { i: usize },
    #[error("invalid base quality recalibration record: {msg}")]
    InvalidRecalibrationRecord { msg: String },
}

pub(crate) fn malformed_record(qname: &[u8], msg: &str) -> Error {
    Error::MalformedRecord {
        qname: String::from_utf8_lossy(qname).into_owned(),
        msg: msg.to_owned(),
    }
}
