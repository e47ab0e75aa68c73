//! Adjudication of ballot write-ins.
//!
//! Election officials resolve each handwritten selection of a contest to an
//! official candidate, to a write-in candidate registered on the way, or
//! to nothing. This crate holds the records ([WriteInStore]), the review
//! queues, the double vote check, the adjudication state machine and the
//! geometry used to show the write-in on the ballot image.
//!
//! [AdjudicationEngine] is the entry point for queries and commands.
//! [session::ReviewSession] drives a reviewer through one contest.
//!
//! See the [manual] for the election file format and the command line.

mod adjudication;
pub mod cache;
mod config;
pub mod detector;
mod engine;
pub mod manual;
pub mod navigation;
mod queue;
mod registry;
pub mod session;
mod store;
pub mod viewer;

pub use crate::config::*;
pub use crate::detector::{detect_double_vote, DoubleVote, DoubleVoteKind, PreCheck};
pub use crate::engine::AdjudicationEngine;
pub use crate::registry::normalize_candidate_name;
pub use crate::store::{StoreSnapshot, WriteInStore};
pub use crate::viewer::{focus_transform, FocusTransform, ZoomLevel};
