//! Main dossier orchestrator that coordinates the ledger engines

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::counters::Counters;
use crate::ledger::{AccountManager, EntryManager};
use crate::reconciliation::ConciliationManager;
use crate::settlement::SettlementManager;
use crate::traits::*;
use crate::types::*;

/// One open dossier: the engines over a shared storage backend
///
/// Owns all engine state explicitly; nothing is cached process-wide, so
/// several dossiers can be open side by side and every mutation
/// re-validates against storage.
pub struct Dossier<S: DossierStorage> {
    config: DossierConfig,
    account_manager: AccountManager<S>,
    entry_manager: EntryManager<S>,
    conciliation_manager: ConciliationManager<S>,
    settlement_manager: SettlementManager<S>,
    counters: Counters<S>,
}

impl<S: DossierStorage + Clone> Dossier<S> {
    /// Open a dossier over the given storage backend
    pub fn new(storage: S, config: DossierConfig) -> Self {
        Self {
            account_manager: AccountManager::new(storage.clone()),
            entry_manager: EntryManager::new(storage.clone(), config.clone()),
            conciliation_manager: ConciliationManager::new(storage.clone()),
            settlement_manager: SettlementManager::new(storage.clone()),
            counters: Counters::new(storage),
            config,
        }
    }

    /// The dossier configuration
    pub fn config(&self) -> &DossierConfig {
        &self.config
    }

    /// The identifier allocator
    pub fn counters(&mut self) -> &mut Counters<S> {
        &mut self.counters
    }

    // Account operations
    /// Insert a new account into the chart
    pub async fn create_account(&mut self, account: Account) -> LedgerResult<Account> {
        self.account_manager.insert(account).await
    }

    /// Get an account by number
    pub async fn account(&self, number: &str) -> LedgerResult<Option<Account>> {
        self.account_manager.get_by_number(number).await
    }

    /// The full chart of accounts
    pub async fn accounts(&self) -> LedgerResult<Vec<Account>> {
        self.account_manager.get_dataset().await
    }

    /// Accounts of one class
    pub async fn accounts_by_class(&self, class: u8) -> LedgerResult<Vec<Account>> {
        self.account_manager.get_dataset_by_class(class).await
    }

    /// Update an account
    pub async fn update_account(&mut self, account: &Account) -> LedgerResult<()> {
        self.account_manager.update(account).await
    }

    /// Delete an account that owns no entries
    pub async fn delete_account(&mut self, number: &str) -> LedgerResult<()> {
        self.account_manager.delete(number).await
    }

    /// Whether an account may be deleted
    pub async fn account_is_deletable(&self, number: &str) -> LedgerResult<bool> {
        self.account_manager.is_deletable(number).await
    }

    /// Children of an account by number prefix
    pub async fn account_children(&self, number: &str) -> LedgerResult<Vec<Account>> {
        self.account_manager.get_children(number).await
    }

    /// Max effect date touched on an account
    pub async fn account_global_deffect(&self, number: &str) -> LedgerResult<Option<NaiveDate>> {
        self.account_manager.get_global_deffect(number).await
    }

    /// Snapshot an account's global balance under a date
    pub async fn archive_balances(
        &mut self,
        number: &str,
        date: NaiveDate,
    ) -> LedgerResult<Account> {
        self.account_manager.archive_balances(number, date).await
    }

    // Entry operations
    /// Insert a new entry
    pub async fn insert_entry(&mut self, entry: Entry) -> LedgerResult<Entry> {
        self.entry_manager.insert(entry).await
    }

    /// Insert a new entry on a closed account
    pub async fn insert_entry_into_closed(&mut self, entry: Entry) -> LedgerResult<Entry> {
        self.entry_manager.insert_into_closed(entry).await
    }

    /// Validate a rough entry
    pub async fn validate_entry(&mut self, id: u64) -> LedgerResult<Entry> {
        self.entry_manager.validate(id).await
    }

    /// Soft-delete an entry
    pub async fn delete_entry(&mut self, id: u64) -> LedgerResult<Entry> {
        self.entry_manager.delete(id).await
    }

    /// Update an editable entry
    pub async fn update_entry(&mut self, entry: Entry) -> LedgerResult<Entry> {
        self.entry_manager.update(entry).await
    }

    /// Get an entry by identifier
    pub async fn entry(&self, id: u64) -> LedgerResult<Option<Entry>> {
        self.entry_manager.get(id).await
    }

    /// Entries imputed on an account
    pub async fn entries_by_account(&self, number: &str) -> LedgerResult<Vec<Entry>> {
        self.entry_manager.get_dataset_by_account(number).await
    }

    /// Entries of a ledger
    pub async fn entries_by_ledger(&self, mnemo: &str) -> LedgerResult<Vec<Entry>> {
        self.entry_manager.get_dataset_by_ledger(mnemo).await
    }

    /// Entries in a given status
    pub async fn entries_by_status(&self, status: EntryStatus) -> LedgerResult<Vec<Entry>> {
        self.entry_manager.get_dataset_by_status(status).await
    }

    /// Max effect date among an account's validated entries
    pub async fn max_val_deffect(&self, number: &str) -> LedgerResult<Option<NaiveDate>> {
        self.entry_manager.get_max_val_deffect(number).await
    }

    /// Max effect date among an account's rough entries
    pub async fn max_rough_deffect(&self, number: &str) -> LedgerResult<Option<NaiveDate>> {
        self.entry_manager.get_max_rough_deffect(number).await
    }

    /// Max effect date among an account's future entries
    pub async fn max_futur_deffect(&self, number: &str) -> LedgerResult<Option<NaiveDate>> {
        self.entry_manager.get_max_futur_deffect(number).await
    }

    // Settlement operations
    /// Create a settlement group from entries of one account
    pub async fn settle(&mut self, entry_ids: &[u64]) -> LedgerResult<u64> {
        self.settlement_manager.create(entry_ids).await
    }

    /// Attach further entries to a settlement group
    pub async fn extend_settlement(&mut self, number: u64, entry_ids: &[u64]) -> LedgerResult<()> {
        self.settlement_manager.extend(number, entry_ids).await
    }

    /// Dissolve a settlement group
    pub async fn dissolve_settlement(&mut self, number: u64) -> LedgerResult<()> {
        self.settlement_manager.dissolve(number).await
    }

    /// Attach one entry to a settlement group
    pub async fn update_settlement(&mut self, entry_id: u64, number: u64) -> LedgerResult<Entry> {
        self.entry_manager.update_settlement(entry_id, number).await
    }

    /// Detach one entry from its settlement group
    pub async fn unsettle_entry(&mut self, entry_id: u64) -> LedgerResult<Entry> {
        self.entry_manager.unsettle(entry_id).await
    }

    /// Detach every entry of a settlement group
    pub async fn unsettle_by_number(&mut self, number: u64) -> LedgerResult<Vec<Entry>> {
        self.entry_manager.unsettle_by_number(number).await
    }

    // Conciliation operations
    /// Match an entry with a bank line, creating a conciliation group
    pub async fn conciliate(
        &mut self,
        entry_id: u64,
        bat_line_id: u64,
    ) -> LedgerResult<ConciliationGroup> {
        self.conciliation_manager
            .conciliate(entry_id, bat_line_id)
            .await
    }

    /// Get a conciliation group by identifier
    pub async fn conciliation_group(&self, id: u64) -> LedgerResult<Option<ConciliationGroup>> {
        self.conciliation_manager.get_by_id(id).await
    }

    /// Get the conciliation group owning a member
    pub async fn conciliation_group_by_member(
        &self,
        kind: MemberKind,
        id: u64,
    ) -> LedgerResult<Option<ConciliationGroup>> {
        self.conciliation_manager.get_by_member(kind, id).await
    }

    /// Attach a member to a conciliation group
    pub async fn add_to_conciliation(
        &mut self,
        group_id: u64,
        member: ConciliationMember,
    ) -> LedgerResult<ConciliationGroup> {
        self.conciliation_manager.add(group_id, member).await
    }

    /// Detach a member from a conciliation group
    pub async fn remove_from_conciliation(
        &mut self,
        group_id: u64,
        member: ConciliationMember,
    ) -> LedgerResult<Option<ConciliationGroup>> {
        self.conciliation_manager.remove(group_id, member).await
    }

    // Balance engine
    /// Per-ledger totals, one row per (ledger, bucket) pair
    pub async fn ledger_balances(&self) -> LedgerResult<HashMap<String, LedgerBalance>> {
        let accounts = self.account_manager.get_dataset().await?;
        let mut balances: HashMap<String, LedgerBalance> = HashMap::new();

        for account in &accounts {
            for entry in self.entry_manager.get_dataset_by_account(&account.number).await? {
                let Some(bucket) = entry.status.bucket() else {
                    continue;
                };
                let balance = balances
                    .entry(entry.ledger.clone())
                    .or_insert_with(|| LedgerBalance::new(entry.ledger.clone()));
                balance.add(bucket, entry.side(), entry.amount());
            }
        }

        Ok(balances)
    }

    /// Rebuild every detail account's buckets from its entries and compare
    /// with the stored buckets, then check global debit=credit equality
    pub async fn check_balances(&self) -> LedgerResult<BalanceCheckReport> {
        let accounts = self.account_manager.get_dataset().await?;
        let mut issues = Vec::new();

        let zero = BigDecimal::from(0);
        let mut total_validated_debit = zero.clone();
        let mut total_validated_credit = zero.clone();
        let mut total_rough_debit = zero.clone();
        let mut total_rough_credit = zero.clone();

        for account in accounts.iter().filter(|a| a.is_detail()) {
            let mut rebuilt = LedgerBalance::new(account.number.clone());
            for entry in self.entry_manager.get_dataset_by_account(&account.number).await? {
                if let Some(bucket) = entry.status.bucket() {
                    rebuilt.add(bucket, entry.side(), entry.amount());
                }
            }

            let stored = [
                (BalanceBucket::Validated, "validated"),
                (BalanceBucket::Rough, "rough"),
                (BalanceBucket::Future, "future"),
            ];
            for (bucket, name) in stored {
                let (debit, credit) = account.bucket(bucket);
                let (rebuilt_debit, rebuilt_credit) = rebuilt.bucket(bucket);
                if debit != rebuilt_debit || credit != rebuilt_credit {
                    issues.push(format!(
                        "account {}: stored {} bucket {}/{} differs from entries {}/{}",
                        account.number, name, debit, credit, rebuilt_debit, rebuilt_credit
                    ));
                }
            }

            total_validated_debit += &account.validated_debit;
            total_validated_credit += &account.validated_credit;
            total_rough_debit += &account.rough_debit;
            total_rough_credit += &account.rough_credit;
        }

        if total_validated_debit != total_validated_credit {
            issues.push(format!(
                "validated entries are not balanced: debit = {total_validated_debit}, credit = {total_validated_credit}"
            ));
        }

        if total_rough_debit != total_rough_credit {
            issues.push(format!(
                "rough entries are not balanced: debit = {total_rough_debit}, credit = {total_rough_credit}"
            ));
        }

        Ok(BalanceCheckReport {
            is_valid: issues.is_empty(),
            issues,
            total_validated_debit,
            total_validated_credit,
            total_rough_debit,
            total_rough_credit,
        })
    }
}

/// Totals of one ledger (or one rebuilt account) across the three buckets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerBalance {
    /// Ledger mnemonic (or account number when used as a rebuild buffer)
    pub key: String,
    /// Debit total of validated entries
    pub validated_debit: BigDecimal,
    /// Credit total of validated entries
    pub validated_credit: BigDecimal,
    /// Debit total of rough entries
    pub rough_debit: BigDecimal,
    /// Credit total of rough entries
    pub rough_credit: BigDecimal,
    /// Debit total of future entries
    pub future_debit: BigDecimal,
    /// Credit total of future entries
    pub future_credit: BigDecimal,
}

impl LedgerBalance {
    fn new(key: String) -> Self {
        let zero = BigDecimal::from(0);
        Self {
            key,
            validated_debit: zero.clone(),
            validated_credit: zero.clone(),
            rough_debit: zero.clone(),
            rough_credit: zero.clone(),
            future_debit: zero.clone(),
            future_credit: zero,
        }
    }

    fn add(&mut self, bucket: BalanceBucket, side: EntryType, amount: &BigDecimal) {
        let slot = match (bucket, side) {
            (BalanceBucket::Validated, EntryType::Debit) => &mut self.validated_debit,
            (BalanceBucket::Validated, EntryType::Credit) => &mut self.validated_credit,
            (BalanceBucket::Rough, EntryType::Debit) => &mut self.rough_debit,
            (BalanceBucket::Rough, EntryType::Credit) => &mut self.rough_credit,
            (BalanceBucket::Future, EntryType::Debit) => &mut self.future_debit,
            (BalanceBucket::Future, EntryType::Credit) => &mut self.future_credit,
        };
        *slot = &*slot + amount;
    }

    fn bucket(&self, bucket: BalanceBucket) -> (&BigDecimal, &BigDecimal) {
        match bucket {
            BalanceBucket::Validated => (&self.validated_debit, &self.validated_credit),
            BalanceBucket::Rough => (&self.rough_debit, &self.rough_credit),
            BalanceBucket::Future => (&self.future_debit, &self.future_credit),
        }
    }
}

/// Report of a balance integrity check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceCheckReport {
    /// Whether stored buckets match the entry set and totals balance
    pub is_valid: bool,
    /// Human-readable description of every discrepancy found
    pub issues: Vec<String>,
    /// Validated debit total over all detail accounts
    pub total_validated_debit: BigDecimal,
    /// Validated credit total over all detail accounts
    pub total_validated_credit: BigDecimal,
    /// Rough debit total over all detail accounts
    pub total_rough_debit: BigDecimal,
    /// Rough credit total over all detail accounts
    pub total_rough_credit: BigDecimal,
}
