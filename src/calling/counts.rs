use strum::IntoEnumIterator;

use crate::variants::evidence::raw_context::RawContext;

/// Kinds of read support tallied per variant and sample.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
pub enum SupportKind {
    Full,
    Partial,
    Core,
    Realigned,
    Alt,
    Reference,
    Coverage,
}

const SUPPORT_KINDS: usize = 7;

/// Read support for one variant in one sample.
///
/// Quality sums are accumulated as truncated integers.
#[derive(Debug, Clone, Default, PartialEq, CopyGetters)]
pub struct ReadSupportCounts {
    counts: [u32; SUPPORT_KINDS],
    qualities: [u32; SUPPORT_KINDS],
    #[getset(get_copy = "pub")]
    lengthened: u32,
    #[getset(get_copy = "pub")]
    shortened: u32,
    #[getset(get_copy = "pub")]
    jitter_penalty: f64,
    #[getset(get_copy = "pub")]
    raw_depth: u32,
    #[getset(get_copy = "pub")]
    raw_alt_support: u32,
    #[getset(get_copy = "pub")]
    raw_ref_support: u32,
    #[getset(get_copy = "pub")]
    raw_depth_base_quality: u32,
    #[getset(get_copy = "pub")]
    raw_alt_base_quality: u32,
    #[getset(get_copy = "pub")]
    raw_ref_base_quality: u32,
    #[getset(get_copy = "pub")]
    improper_pair: u32,
}

impl ReadSupportCounts {
    pub fn count(&self, kind: SupportKind) -> u32 {
        self.counts[kind as usize]
    }

    pub fn quality(&self, kind: SupportKind) -> u32 {
        self.qualities[kind as usize]
    }

    /// Counts in the order of `SupportKind`.
    pub fn counts(&self) -> &[u32] {
        &self.counts
    }

    /// Quality sums in the order of `SupportKind`.
    pub fn qualities(&self) -> &[u32] {
        &self.qualities
    }

    pub fn coverage(&self) -> u32 {
        self.count(SupportKind::Coverage)
    }

    pub fn alt_support(&self) -> u32 {
        SupportKind::iter()
            .filter(|kind| kind.is_alt())
            .map(|kind| self.count(kind))
            .sum()
    }

    pub fn ref_support(&self) -> u32 {
        self.count(SupportKind::Reference)
    }

    pub fn vaf(&self) -> f64 {
        match self.coverage() {
            0 => 0.0,
            coverage => self.alt_support() as f64 / coverage as f64,
        }
    }

    /// Quality of full and partial support, minus the accumulated jitter penalty.
    pub fn tumor_quality(&self) -> u32 {
        let quality = self.quality(SupportKind::Full) as i64
            + self.quality(SupportKind::Partial) as i64
            - self.jitter_penalty.floor() as i64;
        quality.max(0) as u32
    }

    /// Register a counted read. `support` is `None` for reads that count
    /// toward coverage only.
    pub(crate) fn register(&mut self, support: Option<SupportKind>, quality: f64) {
        let quality = quality.max(0.0) as u32;
        if let Some(kind) = support {
            self.counts[kind as usize] += 1;
            self.qualities[kind as usize] += quality;
        }
        self.counts[SupportKind::Coverage as usize] += 1;
        self.qualities[SupportKind::Coverage as usize] += quality;
    }

    pub(crate) fn register_raw(&mut self, raw: &RawContext) {
        let quality = raw.base_quality() as u32;
        if raw.depth_support() {
            self.raw_depth += 1;
            self.raw_depth_base_quality += quality;
        }
        if raw.alt_support() {
            self.raw_alt_support += 1;
            self.raw_alt_base_quality += quality;
        }
        if raw.ref_support() {
            self.raw_ref_support += 1;
            self.raw_ref_base_quality += quality;
        }
    }

    pub(crate) fn register_jitter(&mut self, lengthened: bool, penalty: f64) {
        if lengthened {
            self.lengthened += 1;
        } else {
            self.shortened += 1;
        }
        self.jitter_penalty += penalty;
    }

    pub(crate) fn register_improper_pair(&mut self) {
        self.improper_pair += 1;
    }
}

impl SupportKind {
    /// Whether the kind counts as support of the alt allele.
    pub fn is_alt(self) -> bool {
        !matches!(self, SupportKind::Reference | SupportKind::Coverage)
    }
}
