use std::cmp;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::{Mutex, RwLock};

use anyhow::{anyhow, Result};
use bio::io::fasta;
use lru_time_cache::LruCache;

use crate::errors::Error;

/// A slice of reference sequence anchored at a genomic position.
///
/// Positions are 1-based. Bases are stored upper-cased.
#[derive(Debug, Clone, PartialEq, Eq, Getters, CopyGetters)]
pub struct ReferenceWindow {
    #[getset(get = "pub")]
    contig: String,
    /// Position of the first base.
    #[getset(get_copy = "pub")]
    start: u64,
    #[getset(get = "pub")]
    bases: Vec<u8>,
}

impl ReferenceWindow {
    pub fn new(contig: &str, start: u64, bases: &[u8]) -> Self {
        ReferenceWindow {
            contig: contig.to_owned(),
            start,
            bases: bases.to_ascii_uppercase(),
        }
    }

    /// Position of the last base.
    pub fn end(&self) -> u64 {
        (self.start + self.bases.len() as u64).saturating_sub(1)
    }

    pub fn len(&self) -> usize {
        self.bases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bases.is_empty()
    }

    /// Offset of the given position within the window.
    pub fn index(&self, pos: u64) -> Option<usize> {
        if pos >= self.start && pos < self.start + self.bases.len() as u64 {
            Some((pos - self.start) as usize)
        } else {
            None
        }
    }

    pub fn base(&self, pos: u64) -> Option<u8> {
        self.index(pos).map(|i| self.bases[i])
    }

    /// Bases of the inclusive position range `[start, end]`.
    pub fn slice(&self, start: u64, end: u64) -> Option<&[u8]> {
        if end < start {
            return None;
        }
        match (self.index(start), self.index(end)) {
            (Some(i), Some(j)) => Some(&self.bases[i..=j]),
            _ => None,
        }
    }

    /// The base at `pos` together with its two neighbours.
    pub fn trinucleotide(&self, pos: u64) -> Option<[u8; 3]> {
        if pos == 0 {
            return None;
        }
        self.slice(pos - 1, pos + 1).map(|s| [s[0], s[1], s[2]])
    }
}

/// A lazy buffer for reference sequences, handing out windows around positions.
pub struct Buffer {
    reader: RwLock<fasta::IndexedReader<fs::File>>,
    sequences: Mutex<LruCache<String, Arc<Vec<u8>>>>,
}

impl Buffer {
    pub fn from_path<P: AsRef<Path> + std::fmt::Debug>(path: P, capacity: usize) -> Result<Self> {
        let fasta: fasta::IndexedReader<fs::File> = fasta::IndexedReader::from_file(&path)
            .map_err(|e| anyhow!("unable to open reference {:?}: {}", path, e))?;
        Ok(Buffer {
            reader: RwLock::new(fasta),
            sequences: Mutex::new(LruCache::with_capacity(capacity)),
        })
    }

    /// Load given chromosome. This is O(1) if chromosome was loaded before.
    pub fn seq(&self, chrom: &str) -> Result<Arc<Vec<u8>>> {
        let mut sequences = self
            .sequences
            .lock()
            .map_err(|_| anyhow!("reference cache lock poisoned"))?;

        if let Some(sequence) = sequences.get(chrom) {
            return Ok(Arc::clone(sequence));
        }

        let mut sequence = Vec::new();
        {
            let mut reader = self
                .reader
                .write()
                .map_err(|_| anyhow!("reference reader lock poisoned"))?;
            reader.fetch_all(chrom).map_err(|_| Error::ContigNotFound {
                contig: chrom.to_owned(),
            })?;
            reader.read(&mut sequence)?;
        }
        debug!("loaded reference sequence {} ({} bases)", chrom, sequence.len());
        let sequence = Arc::new(sequence);
        sequences.insert(chrom.to_owned(), Arc::clone(&sequence));
        Ok(sequence)
    }

    /// Window of `padding` bases left and right of the 1-based position `pos`.
    pub fn window(&self, chrom: &str, pos: u64, padding: u64) -> Result<ReferenceWindow> {
        let seq = self.seq(chrom)?;
        if pos == 0 || pos > seq.len() as u64 {
            return Err(Error::ReferenceWindowOutOfBounds {
                contig: chrom.to_owned(),
                pos,
            }
            .into());
        }
        let start = cmp::max(pos.saturating_sub(padding), 1);
        let end = cmp::min(pos + padding, seq.len() as u64);
        Ok(ReferenceWindow::new(
            chrom,
            start,
            &seq[(start - 1) as usize..end as usize],
        ))
    }
}
