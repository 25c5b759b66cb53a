//! Per-dossier monotonic identifier allocation
//!
//! Every durable object of the dossier (entries, conciliation groups,
//! settlements, imported bank files and their lines, documents, operation
//! templates, tiers) draws its identifier from a per-kind counter persisted
//! in the dossier store. Allocation is delegated to the storage layer,
//! which must persist the incremented value before handing it out, so that
//! several processes attached to the same dossier never share a value.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::traits::DossierStorage;
use crate::types::LedgerResult;

/// The identifier families managed per dossier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CounterKind {
    /// Imported bank account transaction files
    Bat,
    /// Lines of imported bank files
    BatLine,
    /// Conciliation groups
    Conciliation,
    /// Attached documents
    Document,
    /// Ledger entries
    Entry,
    /// Operation templates
    Operation,
    /// Settlement groups
    Settlement,
    /// Third parties
    Tiers,
}

impl CounterKind {
    /// The persisted key of this counter kind
    pub fn key(&self) -> &'static str {
        match self {
            CounterKind::Bat => "bat",
            CounterKind::BatLine => "batline",
            CounterKind::Conciliation => "concil",
            CounterKind::Document => "doc",
            CounterKind::Entry => "entry",
            CounterKind::Operation => "ope",
            CounterKind::Settlement => "settlement",
            CounterKind::Tiers => "tiers",
        }
    }
}

/// Identifier allocator over the dossier store
///
/// No next value is ever cached in memory: each allocation round-trips to
/// storage so concurrent processes stay consistent.
pub struct Counters<S: DossierStorage> {
    storage: S,
}

macro_rules! counter_accessors {
    ($(($last:ident, $next:ident, $kind:ident)),* $(,)?) => {
        $(
            /// Last allocated identifier for this kind
            pub async fn $last(&self) -> LedgerResult<u64> {
                self.get_last(CounterKind::$kind).await
            }

            /// Allocate the next identifier for this kind
            pub async fn $next(&mut self) -> LedgerResult<u64> {
                self.get_next(CounterKind::$kind).await
            }
        )*
    };
}

impl<S: DossierStorage> Counters<S> {
    /// Create an allocator over the given storage
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Last allocated value for a kind, 0 if none was ever allocated
    pub async fn get_last(&self, kind: CounterKind) -> LedgerResult<u64> {
        self.storage.counter_last(kind).await
    }

    /// Allocate the next value for a kind
    ///
    /// The incremented value is durably persisted before this returns; on
    /// storage failure no value is issued.
    pub async fn get_next(&mut self, kind: CounterKind) -> LedgerResult<u64> {
        let value = self.storage.counter_next(kind).await?;
        debug!(kind = kind.key(), value, "allocated identifier");
        Ok(value)
    }

    counter_accessors!(
        (get_last_bat_id, get_next_bat_id, Bat),
        (get_last_batline_id, get_next_batline_id, BatLine),
        (get_last_concil_id, get_next_concil_id, Conciliation),
        (get_last_doc_id, get_next_doc_id, Document),
        (get_last_entry_id, get_next_entry_id, Entry),
        (get_last_ope_id, get_next_ope_id, Operation),
        (get_last_settlement_id, get_next_settlement_id, Settlement),
        (get_last_tiers_id, get_next_tiers_id, Tiers),
    );
}
