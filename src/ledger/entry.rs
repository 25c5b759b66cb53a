//! Entry lifecycle and queries
//!
//! Entries move through a small state machine: inserted as rough (or
//! future when dated after the exercice end), then validated, or deleted
//! while still rough. Every transition posts or reverses the entry's
//! amount on the matching bucket of its account, and the entry row and the
//! account mutation are handed to storage as one transaction.

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::counters::CounterKind;
use crate::traits::*;
use crate::types::*;

/// Entry manager carrying the lifecycle state machine
pub struct EntryManager<S: DossierStorage> {
    pub(crate) storage: S,
    config: DossierConfig,
    validator: Box<dyn EntryValidator>,
}

impl<S: DossierStorage> EntryManager<S> {
    /// Create a new entry manager for a dossier
    pub fn new(storage: S, config: DossierConfig) -> Self {
        Self {
            storage,
            config,
            validator: Box::new(DefaultEntryValidator),
        }
    }

    /// Create a new entry manager with a custom validator
    pub fn with_validator(
        storage: S,
        config: DossierConfig,
        validator: Box<dyn EntryValidator>,
    ) -> Self {
        Self {
            storage,
            config,
            validator,
        }
    }

    /// Insert a new entry, allocating its identifier and posting its amount
    ///
    /// The entry becomes `Rough`, or `Future` when its effect date falls
    /// after the exercice end. Closed accounts are refused; use
    /// [`EntryManager::insert_into_closed`] for the explicit override.
    pub async fn insert(&mut self, entry: Entry) -> LedgerResult<Entry> {
        self.insert_inner(entry, false).await
    }

    /// Insert a new entry on a closed account, overriding the closed check
    pub async fn insert_into_closed(&mut self, entry: Entry) -> LedgerResult<Entry> {
        self.insert_inner(entry, true).await
    }

    async fn insert_inner(&mut self, mut entry: Entry, allow_closed: bool) -> LedgerResult<Entry> {
        self.validator.validate_entry(&entry)?;

        let mut account = self
            .storage
            .get_account(&entry.account)
            .await?
            .ok_or_else(|| LedgerError::AccountNotFound(entry.account.clone()))?;

        if account.root {
            return Err(LedgerError::InvalidData {
                field: "account",
                reason: format!("root account '{}' does not receive entries", account.number),
            });
        }

        if account.closed && !allow_closed {
            return Err(LedgerError::InvalidData {
                field: "account",
                reason: format!("account '{}' is closed", account.number),
            });
        }

        if entry.currency != account.currency {
            return Err(LedgerError::InvalidData {
                field: "currency",
                reason: format!(
                    "entry currency '{}' does not match account currency '{}'",
                    entry.currency, account.currency
                ),
            });
        }

        let (status, bucket) = if self.config.is_future(entry.effect_date) {
            (EntryStatus::Future, BalanceBucket::Future)
        } else {
            (EntryStatus::Rough, BalanceBucket::Rough)
        };
        entry.status = status;

        // The identifier is durably allocated before the insert; it is not
        // reclaimed if the insert itself fails.
        let id = self.storage.counter_next(CounterKind::Entry).await?;
        entry.id = Some(id);
        entry.updated_at = chrono::Utc::now().naive_utc();

        account.add_amount(bucket, entry.side(), entry.amount());

        self.storage.insert_entry(&entry, &account).await?;
        info!(id, account = %entry.account, status = %entry.status, "inserted entry");

        Ok(entry)
    }

    /// Validate a rough entry, moving its amount to the validated bucket
    ///
    /// Legal only from `Rough`; any other status is an
    /// [`LedgerError::InvalidStateTransition`] and balances are untouched.
    pub async fn validate(&mut self, id: u64) -> LedgerResult<Entry> {
        let mut entry = self.get_required(id).await?;

        if entry.status != EntryStatus::Rough {
            return Err(LedgerError::InvalidStateTransition {
                operation: "validate",
                status: entry.status,
            });
        }

        let mut account = self.account_of(&entry).await?;
        account.sub_amount(BalanceBucket::Rough, entry.side(), entry.amount());
        account.add_amount(BalanceBucket::Validated, entry.side(), entry.amount());

        entry.status = EntryStatus::Validated;
        entry.updated_at = chrono::Utc::now().naive_utc();

        self.storage.update_entry(&entry, &[account]).await?;
        info!(id, account = %entry.account, "validated entry");

        Ok(entry)
    }

    /// Soft-delete an entry, reversing its bucket posting
    ///
    /// Legal while `Rough`, and administratively for `Past` and `Future`
    /// entries that were never validated. A validated entry is refused: it
    /// must be reversed by a counter-entry instead.
    pub async fn delete(&mut self, id: u64) -> LedgerResult<Entry> {
        let mut entry = self.get_required(id).await?;

        match entry.status {
            EntryStatus::Rough | EntryStatus::Future | EntryStatus::Past => {}
            EntryStatus::Validated | EntryStatus::Deleted => {
                return Err(LedgerError::InvalidStateTransition {
                    operation: "delete",
                    status: entry.status,
                });
            }
        }

        let accounts = match entry.status.bucket() {
            Some(bucket) => {
                let mut account = self.account_of(&entry).await?;
                account.sub_amount(bucket, entry.side(), entry.amount());
                vec![account]
            }
            // past entries never posted to the current buckets
            None => Vec::new(),
        };

        entry.status = EntryStatus::Deleted;
        entry.updated_at = chrono::Utc::now().naive_utc();

        self.storage.update_entry(&entry, &accounts).await?;
        warn!(id, account = %entry.account, "deleted entry");

        Ok(entry)
    }

    /// Update an editable entry, re-posting its amount
    ///
    /// Only `Rough` and `Future` entries are editable; the engine refuses
    /// mutation of any other status. The amount, dates, ledger, label and
    /// even the imputed account may change: the old posting is reversed and
    /// the new one applied, both within the same storage transaction.
    pub async fn update(&mut self, mut entry: Entry) -> LedgerResult<Entry> {
        let id = entry.id.ok_or(LedgerError::InvalidData {
            field: "id",
            reason: "cannot update an entry that was never inserted".to_string(),
        })?;

        let old = self.get_required(id).await?;
        if !old.is_editable() {
            return Err(LedgerError::InvalidStateTransition {
                operation: "update",
                status: old.status,
            });
        }

        self.validator.validate_entry(&entry)?;

        let old_bucket = old.status.bucket().ok_or(LedgerError::InvalidStateTransition {
            operation: "update",
            status: old.status,
        })?;
        let (status, new_bucket) = if self.config.is_future(entry.effect_date) {
            (EntryStatus::Future, BalanceBucket::Future)
        } else {
            (EntryStatus::Rough, BalanceBucket::Rough)
        };
        entry.status = status;

        let accounts = if old.account == entry.account {
            let mut account = self.account_of(&old).await?;
            account.sub_amount(old_bucket, old.side(), old.amount());
            account.add_amount(new_bucket, entry.side(), entry.amount());
            vec![account]
        } else {
            let mut old_account = self.account_of(&old).await?;
            let mut new_account = self
                .storage
                .get_account(&entry.account)
                .await?
                .ok_or_else(|| LedgerError::AccountNotFound(entry.account.clone()))?;

            if new_account.root || new_account.closed {
                return Err(LedgerError::InvalidData {
                    field: "account",
                    reason: format!("account '{}' does not accept entries", new_account.number),
                });
            }

            old_account.sub_amount(old_bucket, old.side(), old.amount());
            new_account.add_amount(new_bucket, entry.side(), entry.amount());
            vec![old_account, new_account]
        };

        entry.settlement = old.settlement;
        entry.created_at = old.created_at;
        entry.updated_at = chrono::Utc::now().naive_utc();

        self.storage.update_entry(&entry, &accounts).await?;
        info!(id, account = %entry.account, "updated entry");

        Ok(entry)
    }

    /// Attach an entry to a settlement group; balances are untouched
    ///
    /// An entry already settled under a different group must be unsettled
    /// first. Settlement linkage is the one mutation validated entries
    /// still accept.
    pub async fn update_settlement(&mut self, id: u64, number: u64) -> LedgerResult<Entry> {
        let mut entry = self.get_required(id).await?;

        if entry.status == EntryStatus::Deleted {
            return Err(LedgerError::InvalidStateTransition {
                operation: "settle",
                status: entry.status,
            });
        }

        if let Some(existing) = entry.settlement {
            if existing.number != number {
                return Err(LedgerError::AlreadySettled {
                    entry: id,
                    settlement: existing.number,
                });
            }
            return Ok(entry);
        }

        entry.settlement = Some(EntrySettlement {
            number,
            stamp: chrono::Utc::now().naive_utc(),
        });
        entry.updated_at = chrono::Utc::now().naive_utc();

        self.storage.update_entry(&entry, &[]).await?;

        Ok(entry)
    }

    /// Detach one entry from its settlement group, if any
    pub async fn unsettle(&mut self, id: u64) -> LedgerResult<Entry> {
        let mut entry = self.get_required(id).await?;

        if entry.settlement.is_some() {
            entry.settlement = None;
            entry.updated_at = chrono::Utc::now().naive_utc();
            self.storage.update_entry(&entry, &[]).await?;
        }

        Ok(entry)
    }

    /// Detach every entry settled under the given settlement number
    pub async fn unsettle_by_number(&mut self, number: u64) -> LedgerResult<Vec<Entry>> {
        let entries = self.storage.entries_by_settlement(number).await?;
        let mut detached = Vec::with_capacity(entries.len());

        for mut entry in entries {
            entry.settlement = None;
            entry.updated_at = chrono::Utc::now().naive_utc();
            self.storage.update_entry(&entry, &[]).await?;
            detached.push(entry);
        }

        Ok(detached)
    }

    /// Get an entry by identifier
    pub async fn get(&self, id: u64) -> LedgerResult<Option<Entry>> {
        self.storage.get_entry(id).await
    }

    /// Get an entry by identifier, failing when absent
    pub async fn get_required(&self, id: u64) -> LedgerResult<Entry> {
        self.storage
            .get_entry(id)
            .await?
            .ok_or(LedgerError::EntryNotFound(id))
    }

    /// Entries imputed on an account
    pub async fn get_dataset_by_account(&self, number: &str) -> LedgerResult<Vec<Entry>> {
        self.storage.entries_by_account(number).await
    }

    /// Entries of a ledger
    pub async fn get_dataset_by_ledger(&self, mnemo: &str) -> LedgerResult<Vec<Entry>> {
        self.storage.entries_by_ledger(mnemo).await
    }

    /// Entries in a given status
    pub async fn get_dataset_by_status(&self, status: EntryStatus) -> LedgerResult<Vec<Entry>> {
        self.storage.entries_by_status(status).await
    }

    /// Max effect date among an account's validated entries
    pub async fn get_max_val_deffect(&self, number: &str) -> LedgerResult<Option<NaiveDate>> {
        self.storage
            .max_effect_date(number, EntryStatus::Validated)
            .await
    }

    /// Max effect date among an account's rough entries
    pub async fn get_max_rough_deffect(&self, number: &str) -> LedgerResult<Option<NaiveDate>> {
        self.storage.max_effect_date(number, EntryStatus::Rough).await
    }

    /// Max effect date among an account's future entries
    pub async fn get_max_futur_deffect(&self, number: &str) -> LedgerResult<Option<NaiveDate>> {
        self.storage
            .max_effect_date(number, EntryStatus::Future)
            .await
    }

    async fn account_of(&self, entry: &Entry) -> LedgerResult<Account> {
        self.storage
            .get_account(&entry.account)
            .await?
            .ok_or_else(|| LedgerError::AccountNotFound(entry.account.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::account::AccountManager;
    use crate::utils::memory_storage::MemoryStorage;
    use bigdecimal::BigDecimal;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn config() -> DossierConfig {
        DossierConfig {
            label: "Test dossier".to_string(),
            currency: "EUR".to_string(),
            exercice_begin: date(2024, 1, 1),
            exercice_end: date(2024, 12, 31),
        }
    }

    async fn setup() -> (EntryManager<MemoryStorage>, AccountManager<MemoryStorage>) {
        let storage = MemoryStorage::new();
        let mut accounts = AccountManager::new(storage.clone());

        accounts
            .insert(Account::new(
                "411000".to_string(),
                "Clients".to_string(),
                "EUR".to_string(),
            ))
            .await
            .unwrap();
        accounts
            .insert(Account::new(
                "512000".to_string(),
                "Bank".to_string(),
                "EUR".to_string(),
            ))
            .await
            .unwrap();

        (EntryManager::new(storage, config()), accounts)
    }

    fn sale(amount: i64) -> Entry {
        Entry::debit(
            "Client invoice".to_string(),
            date(2024, 3, 15),
            date(2024, 3, 15),
            "411000".to_string(),
            "EUR".to_string(),
            "VT".to_string(),
            BigDecimal::from(amount),
        )
    }

    #[tokio::test]
    async fn test_insert_posts_rough_bucket() {
        let (mut entries, accounts) = setup().await;

        let entry = entries.insert(sale(100)).await.unwrap();

        assert_eq!(entry.id, Some(1));
        assert_eq!(entry.status, EntryStatus::Rough);

        let account = accounts.get_required("411000").await.unwrap();
        assert_eq!(account.rough_debit, BigDecimal::from(100));
        assert_eq!(account.validated_debit, BigDecimal::from(0));
    }

    #[tokio::test]
    async fn test_insert_after_exercice_end_is_future() {
        let (mut entries, accounts) = setup().await;

        let mut entry = sale(80);
        entry.effect_date = date(2025, 1, 10);
        let entry = entries.insert(entry).await.unwrap();

        assert_eq!(entry.status, EntryStatus::Future);

        let account = accounts.get_required("411000").await.unwrap();
        assert_eq!(account.future_debit, BigDecimal::from(80));
        assert_eq!(account.rough_debit, BigDecimal::from(0));
    }

    #[tokio::test]
    async fn test_validate_moves_rough_to_validated() {
        let (mut entries, accounts) = setup().await;

        let entry = entries.insert(sale(100)).await.unwrap();
        let entry = entries.validate(entry.id.unwrap()).await.unwrap();

        assert_eq!(entry.status, EntryStatus::Validated);

        let account = accounts.get_required("411000").await.unwrap();
        assert_eq!(account.rough_debit, BigDecimal::from(0));
        assert_eq!(account.validated_debit, BigDecimal::from(100));
    }

    #[tokio::test]
    async fn test_validate_is_one_way_and_delete_refused_after() {
        let (mut entries, accounts) = setup().await;

        let entry = entries.insert(sale(100)).await.unwrap();
        let id = entry.id.unwrap();
        entries.validate(id).await.unwrap();

        let again = entries.validate(id).await;
        assert!(matches!(
            again,
            Err(LedgerError::InvalidStateTransition {
                operation: "validate",
                status: EntryStatus::Validated,
            })
        ));

        let deleted = entries.delete(id).await;
        assert!(matches!(
            deleted,
            Err(LedgerError::InvalidStateTransition {
                operation: "delete",
                status: EntryStatus::Validated,
            })
        ));

        // balances unchanged by the refused calls
        let account = accounts.get_required("411000").await.unwrap();
        assert_eq!(account.validated_debit, BigDecimal::from(100));
        assert_eq!(account.rough_debit, BigDecimal::from(0));
    }

    #[tokio::test]
    async fn test_delete_rough_reverses_posting() {
        let (mut entries, accounts) = setup().await;

        let entry = entries.insert(sale(100)).await.unwrap();
        let entry = entries.delete(entry.id.unwrap()).await.unwrap();

        assert_eq!(entry.status, EntryStatus::Deleted);

        let account = accounts.get_required("411000").await.unwrap();
        assert_eq!(account.rough_debit, BigDecimal::from(0));
    }

    #[tokio::test]
    async fn test_insert_refused_on_root_closed_or_missing_account() {
        let (mut entries, mut accounts) = setup().await;

        let mut root = Account::new(
            "410".to_string(),
            "Clients root".to_string(),
            "EUR".to_string(),
        );
        root.root = true;
        accounts.insert(root).await.unwrap();

        let mut closed = Account::new(
            "471000".to_string(),
            "Suspense".to_string(),
            "EUR".to_string(),
        );
        closed.closed = true;
        accounts.insert(closed).await.unwrap();

        let mut on_root = sale(10);
        on_root.account = "410".to_string();
        assert!(entries.insert(on_root).await.is_err());

        let mut on_closed = sale(10);
        on_closed.account = "471000".to_string();
        assert!(entries.insert(on_closed.clone()).await.is_err());

        // the explicit override path accepts the closed account
        assert!(entries.insert_into_closed(on_closed).await.is_ok());

        let mut on_missing = sale(10);
        on_missing.account = "999999".to_string();
        assert!(matches!(
            entries.insert(on_missing).await,
            Err(LedgerError::AccountNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_ids_are_not_reused_after_a_refused_insert() {
        let (mut entries, _) = setup().await;

        let first = entries.insert(sale(10)).await.unwrap();
        assert_eq!(first.id, Some(1));

        // fails after data validation, before any allocation
        let mut invalid = sale(0);
        invalid.debit = BigDecimal::from(0);
        assert!(entries.insert(invalid).await.is_err());

        let second = entries.insert(sale(20)).await.unwrap();
        assert_eq!(second.id, Some(2));
    }

    #[tokio::test]
    async fn test_update_reposts_amount_and_keeps_linkage() {
        let (mut entries, accounts) = setup().await;

        let entry = entries.insert(sale(100)).await.unwrap();

        let mut edited = entry.clone();
        edited.debit = BigDecimal::from(150);
        let edited = entries.update(edited).await.unwrap();

        assert_eq!(edited.amount(), &BigDecimal::from(150));
        let account = accounts.get_required("411000").await.unwrap();
        assert_eq!(account.rough_debit, BigDecimal::from(150));
    }

    #[tokio::test]
    async fn test_update_moves_between_accounts() {
        let (mut entries, accounts) = setup().await;

        let entry = entries.insert(sale(100)).await.unwrap();

        let mut moved = entry.clone();
        moved.account = "512000".to_string();
        entries.update(moved).await.unwrap();

        let old_account = accounts.get_required("411000").await.unwrap();
        let new_account = accounts.get_required("512000").await.unwrap();
        assert_eq!(old_account.rough_debit, BigDecimal::from(0));
        assert_eq!(new_account.rough_debit, BigDecimal::from(100));
    }

    #[tokio::test]
    async fn test_update_refused_once_validated() {
        let (mut entries, _) = setup().await;

        let entry = entries.insert(sale(100)).await.unwrap();
        let entry = entries.validate(entry.id.unwrap()).await.unwrap();

        let mut edited = entry.clone();
        edited.label = "Changed".to_string();
        assert!(matches!(
            entries.update(edited).await,
            Err(LedgerError::InvalidStateTransition {
                operation: "update",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_settlement_linkage_rules() {
        let (mut entries, _) = setup().await;

        let entry = entries.insert(sale(100)).await.unwrap();
        let id = entry.id.unwrap();

        let settled = entries.update_settlement(id, 7).await.unwrap();
        assert_eq!(settled.settlement.map(|s| s.number), Some(7));

        // same group again is a no-op, a different group is refused
        assert!(entries.update_settlement(id, 7).await.is_ok());
        assert!(matches!(
            entries.update_settlement(id, 8).await,
            Err(LedgerError::AlreadySettled {
                entry: _,
                settlement: 7
            })
        ));

        let unsettled = entries.unsettle(id).await.unwrap();
        assert!(unsettled.settlement.is_none());
        assert!(entries.update_settlement(id, 8).await.is_ok());
    }

    #[tokio::test]
    async fn test_max_deffect_per_status() {
        let (mut entries, _) = setup().await;

        let e1 = entries.insert(sale(10)).await.unwrap();
        let mut late = sale(20);
        late.effect_date = date(2024, 11, 2);
        entries.insert(late).await.unwrap();

        entries.validate(e1.id.unwrap()).await.unwrap();

        assert_eq!(
            entries.get_max_val_deffect("411000").await.unwrap(),
            Some(date(2024, 3, 15))
        );
        assert_eq!(
            entries.get_max_rough_deffect("411000").await.unwrap(),
            Some(date(2024, 11, 2))
        );
        assert_eq!(entries.get_max_futur_deffect("411000").await.unwrap(), None);
    }
}
