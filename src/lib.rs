//! # Dossier Core
//!
//! The accounting ledger engine of a double-entry bookkeeping application:
//! entry lifecycle, per-account balance buckets, bank reconciliation,
//! settlement grouping, and per-dossier identifier counters.
//!
//! ## Features
//!
//! - **Entry lifecycle**: rough → validated state machine with soft
//!   deletion, future-dated entries, and strict editability rules
//! - **Account balances**: six concurrent buckets (validated/rough/future ×
//!   debit/credit) plus append-only period-end archives
//! - **Bank reconciliation**: conciliation groups matching entries with
//!   imported bank-statement lines
//! - **Settlement**: marking invoice/payment entries as mutually cleared,
//!   partial settlements included
//! - **Counters**: monotonic per-kind identifier allocation safe across
//!   processes sharing one dossier database
//! - **Storage abstraction**: database-agnostic design with trait-based
//!   storage
//!
//! ## Quick Start
//!
//! ```rust
//! use dossier_core::{Dossier, DossierConfig};
//! use dossier_core::utils::MemoryStorage;
//!
//! // The engine runs over any DossierStorage implementation
//! // let mut dossier = Dossier::new(MemoryStorage::new(), config);
//! ```

pub mod counters;
pub mod ledger;
pub mod reconciliation;
pub mod settlement;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use counters::*;
pub use ledger::*;
pub use reconciliation::*;
pub use settlement::*;
pub use traits::*;
pub use types::*;
