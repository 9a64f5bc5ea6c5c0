//! Prelude module for qplay
//!
//! This module re-exports commonly used types and traits to reduce
//! boilerplate imports throughout the codebase.
//!
//! # Usage
//!
//! ```rust
//! use qplay::prelude::*;
//! ```

pub use crate::config::Config;
pub use crate::coordinator::{ApplyCoordinator, ApplyOutcome, ApplyPhase, ViewState};
pub use crate::error::{Error, Result};
pub use crate::evaluator::Evaluator;
pub use crate::session::Session;
pub use crate::store::{PageRequest, StoreHandle};
pub use crate::types::{DocumentKind, EntryId, HistoryKind, TypedDocument};
