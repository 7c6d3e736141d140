//! Read evidence classification for candidate somatic variants.
//!
//! For a candidate variant, a template read context is built once
//! (`variants::context::ContextBuilder`). Each aligned read overlapping the
//! variant is then classified by `calling::aggregator::EvidenceAggregator`,
//! which tallies quality-weighted support per sample.

#[macro_use]
extern crate log;
#[macro_use]
extern crate serde_derive;
#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate derive_builder;
#[macro_use]
extern crate getset;
#[macro_use]
extern crate derive_new;
#[macro_use]
extern crate strum_macros;
#[cfg(test)]
#[macro_use]
extern crate approx;

pub mod calling;
pub mod cli;
pub mod config;
pub mod errors;
pub mod reference;
pub(crate) mod utils;
pub mod variants;

pub use crate::calling::aggregator::{EvidenceAggregator, ReadOutcome};
pub use crate::calling::counts::{ReadSupportCounts, SupportKind};
pub use crate::config::EvidenceConfig;
pub use crate::reference::ReferenceWindow;
pub use crate::variants::context::{ContextBuilder, VariantContext};
pub use crate::variants::evidence::bases::QualityRecalibrationMap;
pub use crate::variants::window::{MatchResult, SequenceWindow};
pub use crate::variants::{Candidate, Tier, VariantKind};
