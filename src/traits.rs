//! Traits for storage abstraction and extensibility

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::counters::CounterKind;
use crate::types::*;

/// Storage abstraction for one dossier database
///
/// The engine runs against any relational backend (PostgreSQL, MySQL,
/// SQLite, in-memory, ...) implementing these methods. The dossier store is
/// shared by several independent processes, so every method that mutates
/// state MUST execute as one atomically-committed transaction: either all
/// of its writes are observable afterwards, or none. Implementations must
/// use parameterized queries throughout; never interpolate values into SQL
/// text.
#[async_trait]
pub trait DossierStorage: Send + Sync {
    // -- counters ----------------------------------------------------------

    /// Last allocated value for a counter kind, 0 if never allocated
    async fn counter_last(&self, kind: CounterKind) -> LedgerResult<u64>;

    /// Increment the counter and durably persist the new value before
    /// returning it
    ///
    /// The read-increment-write must be a single transaction so that two
    /// processes attached to the same dossier can never be handed the same
    /// value. On write failure the call returns `Storage` and no value is
    /// considered allocated.
    async fn counter_next(&mut self, kind: CounterKind) -> LedgerResult<u64>;

    // -- accounts ----------------------------------------------------------

    /// Save a new account
    async fn save_account(&mut self, account: &Account) -> LedgerResult<()>;

    /// Get an account by number
    async fn get_account(&self, number: &str) -> LedgerResult<Option<Account>>;

    /// List all accounts of the dossier, ordered by number
    async fn list_accounts(&self) -> LedgerResult<Vec<Account>>;

    /// Update an existing account
    async fn update_account(&mut self, account: &Account) -> LedgerResult<()>;

    /// Delete an account row
    ///
    /// The engine checks deletability first; the storage only removes the
    /// row.
    async fn delete_account(&mut self, number: &str) -> LedgerResult<()>;

    /// Count entries referencing an account, whatever their status
    async fn account_entry_count(&self, number: &str) -> LedgerResult<u64>;

    // -- entries -----------------------------------------------------------

    /// Persist a new entry row together with its account's mutated buckets,
    /// as one transaction
    async fn insert_entry(&mut self, entry: &Entry, account: &Account) -> LedgerResult<()>;

    /// Persist an updated entry row together with every account it touched,
    /// as one transaction
    ///
    /// `accounts` is empty for linkage-only updates (settlement), holds one
    /// account for a status transition, and may hold two when an editable
    /// entry moved between accounts.
    async fn update_entry(&mut self, entry: &Entry, accounts: &[Account]) -> LedgerResult<()>;

    /// Get an entry by identifier
    async fn get_entry(&self, id: u64) -> LedgerResult<Option<Entry>>;

    /// List entries imputed on an account
    async fn entries_by_account(&self, number: &str) -> LedgerResult<Vec<Entry>>;

    /// List entries of a ledger
    async fn entries_by_ledger(&self, mnemo: &str) -> LedgerResult<Vec<Entry>>;

    /// List entries in a given status
    async fn entries_by_status(&self, status: EntryStatus) -> LedgerResult<Vec<Entry>>;

    /// List entries settled under a settlement number
    async fn entries_by_settlement(&self, number: u64) -> LedgerResult<Vec<Entry>>;

    /// Max effect date among an account's entries in a given status
    async fn max_effect_date(
        &self,
        number: &str,
        status: EntryStatus,
    ) -> LedgerResult<Option<NaiveDate>>;

    // -- conciliation ------------------------------------------------------

    /// Save a new conciliation group with its initial members
    async fn save_group(&mut self, group: &ConciliationGroup) -> LedgerResult<()>;

    /// Get a conciliation group by identifier
    async fn get_group(&self, id: u64) -> LedgerResult<Option<ConciliationGroup>>;

    /// Get the conciliation group owning a member, if any
    async fn get_group_by_member(
        &self,
        member: ConciliationMember,
    ) -> LedgerResult<Option<ConciliationGroup>>;

    /// Attach a member to a group as one atomic check-then-set
    ///
    /// Returns `Ok(true)` when the member was attached, `Ok(false)` when it
    /// already belonged to this very group (idempotent no-op), and
    /// `AlreadyReconciled` when a different group owns it. The ownership
    /// check and the membership write must commit together, so that a bank
    /// line can never transiently belong to two groups.
    async fn attach_group_member(
        &mut self,
        group_id: u64,
        member: ConciliationMember,
    ) -> LedgerResult<bool>;

    /// Replace a group's membership
    async fn update_group(&mut self, group: &ConciliationGroup) -> LedgerResult<()>;

    /// Delete a group and all of its member rows, as one transaction
    async fn delete_group(&mut self, id: u64) -> LedgerResult<()>;
}

/// Trait for implementing custom account validation rules
pub trait AccountValidator: Send + Sync {
    /// Validate an account before saving
    fn validate_account(&self, account: &Account) -> LedgerResult<()>;
}

/// Trait for implementing custom entry validation rules
pub trait EntryValidator: Send + Sync {
    /// Validate an entry before it reaches storage
    fn validate_entry(&self, entry: &Entry) -> LedgerResult<()>;
}

/// Default account validator with the engine's structural rules
pub struct DefaultAccountValidator;

impl AccountValidator for DefaultAccountValidator {
    fn validate_account(&self, account: &Account) -> LedgerResult<()> {
        crate::utils::validation::validate_account_number(&account.number)?;
        crate::utils::validation::validate_label(&account.label)?;
        crate::utils::validation::validate_currency(&account.currency)?;
        Ok(())
    }
}

/// Default entry validator delegating to [`Entry::validate_data`]
pub struct DefaultEntryValidator;

impl EntryValidator for DefaultEntryValidator {
    fn validate_entry(&self, entry: &Entry) -> LedgerResult<()> {
        entry.validate_data()
    }
}
