use std::cmp;
use std::fmt;

use anyhow::Result;

use crate::errors::Error;

pub mod context;
pub mod evidence;
pub mod window;

/// Kind of a candidate variant, derived from the allele lengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum VariantKind {
    #[strum(serialize = "SNV")]
    Snv,
    #[strum(serialize = "MNV")]
    Mnv,
    #[strum(serialize = "INS")]
    Insertion,
    #[strum(serialize = "DEL")]
    Deletion,
}

/// Tier of a candidate. Hotspots are known recurrent variants and bypass the
/// mapping quality floor.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Tier {
    Hotspot,
    Panel,
    HighConfidence,
    LowConfidence,
}

impl Default for Tier {
    fn default() -> Self {
        Tier::LowConfidence
    }
}

/// A candidate variant. Positions are 1-based; alleles are upper-cased and
/// share their first (anchor) base in case of indels.
#[derive(Debug, Clone, PartialEq, Eq, Getters, CopyGetters)]
pub struct Candidate {
    #[getset(get = "pub")]
    chrom: String,
    #[getset(get_copy = "pub")]
    pos: u64,
    #[getset(get = "pub")]
    ref_allele: Vec<u8>,
    #[getset(get = "pub")]
    alt_allele: Vec<u8>,
    #[getset(get_copy = "pub")]
    tier: Tier,
}

impl Candidate {
    pub fn new(chrom: &str, pos: u64, ref_allele: &[u8], alt_allele: &[u8]) -> Result<Self> {
        for allele in &[ref_allele, alt_allele] {
            if allele.is_empty()
                || !allele
                    .iter()
                    .all(|b| matches!(b.to_ascii_uppercase(), b'A' | b'C' | b'G' | b'T' | b'N'))
            {
                return Err(Error::InvalidAllele {
                    allele: String::from_utf8_lossy(allele).into_owned(),
                }
                .into());
            }
        }
        let ref_allele = ref_allele.to_ascii_uppercase();
        let alt_allele = alt_allele.to_ascii_uppercase();
        if ref_allele.len() == alt_allele.len() {
            return Ok(Candidate {
                chrom: chrom.to_owned(),
                pos,
                ref_allele,
                alt_allele,
                tier: Tier::default(),
            });
        }

        let (offset, anchored_ref, anchored_alt) = anchor_indel(&ref_allele, &alt_allele)
            .ok_or_else(|| Error::UnanchoredIndel {
                ref_allele: String::from_utf8_lossy(&ref_allele).into_owned(),
                alt_allele: String::from_utf8_lossy(&alt_allele).into_owned(),
            })?;
        Ok(Candidate {
            chrom: chrom.to_owned(),
            pos: pos + offset as u64,
            ref_allele: anchored_ref.to_vec(),
            alt_allele: anchored_alt.to_vec(),
            tier: Tier::default(),
        })
    }

    pub fn with_tier(mut self, tier: Tier) -> Self {
        self.tier = tier;
        self
    }

    pub fn kind(&self) -> VariantKind {
        let (ref_len, alt_len) = (self.ref_allele.len(), self.alt_allele.len());
        if ref_len == alt_len {
            if ref_len == 1 {
                VariantKind::Snv
            } else {
                VariantKind::Mnv
            }
        } else if alt_len > ref_len {
            VariantKind::Insertion
        } else {
            VariantKind::Deletion
        }
    }

    pub fn is_indel(&self) -> bool {
        matches!(self.kind(), VariantKind::Insertion | VariantKind::Deletion)
    }

    /// Last reference position covered by the ref allele.
    pub fn end(&self) -> u64 {
        self.pos + self.ref_allele.len() as u64 - 1
    }

    /// Number of inserted (positive) or deleted (negative) bases.
    pub fn indel_len(&self) -> i64 {
        self.alt_allele.len() as i64 - self.ref_allele.len() as i64
    }

    pub fn is_hotspot(&self) -> bool {
        self.tier == Tier::Hotspot
    }
}

/// Trim the alleles of an indel to a single shared anchor base followed by the
/// inserted or deleted bases. Returns the number of leading bases removed, or
/// `None` if the alleles differ beyond one contiguous insertion or deletion.
fn anchor_indel<'a>(
    mut ref_allele: &'a [u8],
    mut alt_allele: &'a [u8],
) -> Option<(usize, &'a [u8], &'a [u8])> {
    while ref_allele.len() > 1 && alt_allele.len() > 1 && ref_allele.last() == alt_allele.last() {
        ref_allele = &ref_allele[..ref_allele.len() - 1];
        alt_allele = &alt_allele[..alt_allele.len() - 1];
    }
    let mut offset = 0;
    while ref_allele.len() > 1 && alt_allele.len() > 1 && ref_allele[1] == alt_allele[1] {
        ref_allele = &ref_allele[1..];
        alt_allele = &alt_allele[1..];
        offset += 1;
    }
    if cmp::min(ref_allele.len(), alt_allele.len()) == 1 && ref_allele[0] == alt_allele[0] {
        Some((offset, ref_allele, alt_allele))
    } else {
        None
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} {}>{}",
            self.chrom,
            self.pos,
            String::from_utf8_lossy(&self.ref_allele),
            String::from_utf8_lossy(&self.alt_allele)
        )
    }
}
