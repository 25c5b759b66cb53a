//! In-memory storage implementation for testing

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::counters::CounterKind;
use crate::traits::DossierStorage;
use crate::types::*;

/// In-memory dossier storage for testing and development
///
/// Every trait method takes the lock exactly once, so each call is one
/// atomic "transaction" over the shared state, mirroring what a relational
/// backend provides.
#[derive(Debug, Clone)]
pub struct MemoryStorage {
    inner: Arc<RwLock<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    counters: HashMap<CounterKind, u64>,
    accounts: HashMap<String, Account>,
    entries: HashMap<u64, Entry>,
    groups: HashMap<u64, ConciliationGroup>,
}

impl MemoryStorage {
    /// Create a new memory storage instance
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
        }
    }

    /// Clear all data (useful for testing)
    pub fn clear(&self) {
        let mut inner = self.inner.write().unwrap();
        *inner = Inner::default();
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DossierStorage for MemoryStorage {
    async fn counter_last(&self, kind: CounterKind) -> LedgerResult<u64> {
        Ok(self
            .inner
            .read()
            .unwrap()
            .counters
            .get(&kind)
            .copied()
            .unwrap_or(0))
    }

    async fn counter_next(&mut self, kind: CounterKind) -> LedgerResult<u64> {
        let mut inner = self.inner.write().unwrap();
        let slot = inner.counters.entry(kind).or_insert(0);
        *slot += 1;
        Ok(*slot)
    }

    async fn save_account(&mut self, account: &Account) -> LedgerResult<()> {
        self.inner
            .write()
            .unwrap()
            .accounts
            .insert(account.number.clone(), account.clone());
        Ok(())
    }

    async fn get_account(&self, number: &str) -> LedgerResult<Option<Account>> {
        Ok(self.inner.read().unwrap().accounts.get(number).cloned())
    }

    async fn list_accounts(&self) -> LedgerResult<Vec<Account>> {
        let inner = self.inner.read().unwrap();
        let mut accounts: Vec<Account> = inner.accounts.values().cloned().collect();
        accounts.sort_by(|a, b| a.number.cmp(&b.number));
        Ok(accounts)
    }

    async fn update_account(&mut self, account: &Account) -> LedgerResult<()> {
        let mut inner = self.inner.write().unwrap();
        if inner.accounts.contains_key(&account.number) {
            inner
                .accounts
                .insert(account.number.clone(), account.clone());
            Ok(())
        } else {
            Err(LedgerError::AccountNotFound(account.number.clone()))
        }
    }

    async fn delete_account(&mut self, number: &str) -> LedgerResult<()> {
        if self
            .inner
            .write()
            .unwrap()
            .accounts
            .remove(number)
            .is_some()
        {
            Ok(())
        } else {
            Err(LedgerError::AccountNotFound(number.to_string()))
        }
    }

    async fn account_entry_count(&self, number: &str) -> LedgerResult<u64> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .entries
            .values()
            .filter(|e| e.account == number)
            .count() as u64)
    }

    async fn insert_entry(&mut self, entry: &Entry, account: &Account) -> LedgerResult<()> {
        let id = entry
            .id
            .ok_or_else(|| LedgerError::Storage("entry has no identifier".to_string()))?;
        let mut inner = self.inner.write().unwrap();
        inner.entries.insert(id, entry.clone());
        inner
            .accounts
            .insert(account.number.clone(), account.clone());
        Ok(())
    }

    async fn update_entry(&mut self, entry: &Entry, accounts: &[Account]) -> LedgerResult<()> {
        let id = entry
            .id
            .ok_or_else(|| LedgerError::Storage("entry has no identifier".to_string()))?;
        let mut inner = self.inner.write().unwrap();
        if !inner.entries.contains_key(&id) {
            return Err(LedgerError::EntryNotFound(id));
        }
        inner.entries.insert(id, entry.clone());
        for account in accounts {
            inner
                .accounts
                .insert(account.number.clone(), account.clone());
        }
        Ok(())
    }

    async fn get_entry(&self, id: u64) -> LedgerResult<Option<Entry>> {
        Ok(self.inner.read().unwrap().entries.get(&id).cloned())
    }

    async fn entries_by_account(&self, number: &str) -> LedgerResult<Vec<Entry>> {
        let inner = self.inner.read().unwrap();
        let mut entries: Vec<Entry> = inner
            .entries
            .values()
            .filter(|e| e.account == number)
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.id);
        Ok(entries)
    }

    async fn entries_by_ledger(&self, mnemo: &str) -> LedgerResult<Vec<Entry>> {
        let inner = self.inner.read().unwrap();
        let mut entries: Vec<Entry> = inner
            .entries
            .values()
            .filter(|e| e.ledger == mnemo)
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.id);
        Ok(entries)
    }

    async fn entries_by_status(&self, status: EntryStatus) -> LedgerResult<Vec<Entry>> {
        let inner = self.inner.read().unwrap();
        let mut entries: Vec<Entry> = inner
            .entries
            .values()
            .filter(|e| e.status == status)
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.id);
        Ok(entries)
    }

    async fn entries_by_settlement(&self, number: u64) -> LedgerResult<Vec<Entry>> {
        let inner = self.inner.read().unwrap();
        let mut entries: Vec<Entry> = inner
            .entries
            .values()
            .filter(|e| e.settlement.map(|s| s.number) == Some(number))
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.id);
        Ok(entries)
    }

    async fn max_effect_date(
        &self,
        number: &str,
        status: EntryStatus,
    ) -> LedgerResult<Option<NaiveDate>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .entries
            .values()
            .filter(|e| e.account == number && e.status == status)
            .map(|e| e.effect_date)
            .max())
    }

    async fn save_group(&mut self, group: &ConciliationGroup) -> LedgerResult<()> {
        self.inner
            .write()
            .unwrap()
            .groups
            .insert(group.id, group.clone());
        Ok(())
    }

    async fn get_group(&self, id: u64) -> LedgerResult<Option<ConciliationGroup>> {
        Ok(self.inner.read().unwrap().groups.get(&id).cloned())
    }

    async fn get_group_by_member(
        &self,
        member: ConciliationMember,
    ) -> LedgerResult<Option<ConciliationGroup>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .groups
            .values()
            .find(|g| g.contains(&member))
            .cloned())
    }

    async fn attach_group_member(
        &mut self,
        group_id: u64,
        member: ConciliationMember,
    ) -> LedgerResult<bool> {
        let mut inner = self.inner.write().unwrap();

        // ownership check and membership write under one lock acquisition
        if let Some(owner) = inner.groups.values().find(|g| g.contains(&member)) {
            if owner.id == group_id {
                return Ok(false);
            }
            return Err(LedgerError::AlreadyReconciled {
                kind: member.kind,
                id: member.id,
                group: owner.id,
            });
        }

        let group = inner
            .groups
            .get_mut(&group_id)
            .ok_or(LedgerError::GroupNotFound(group_id))?;
        group.members.push(member);
        Ok(true)
    }

    async fn update_group(&mut self, group: &ConciliationGroup) -> LedgerResult<()> {
        let mut inner = self.inner.write().unwrap();
        if inner.groups.contains_key(&group.id) {
            inner.groups.insert(group.id, group.clone());
            Ok(())
        } else {
            Err(LedgerError::GroupNotFound(group.id))
        }
    }

    async fn delete_group(&mut self, id: u64) -> LedgerResult<()> {
        if self.inner.write().unwrap().groups.remove(&id).is_some() {
            Ok(())
        } else {
            Err(LedgerError::GroupNotFound(id))
        }
    }
}
