//! Settlement: marking entries as mutually cleared
//!
//! A settlement group ties together entries of one account that clear each
//! other, typically an invoice and its payments. The linkage lives on the
//! entry rows themselves; no balance constraint applies, partial and
//! unequal settlements are legitimate.

use tracing::info;

use crate::counters::CounterKind;
use crate::traits::DossierStorage;
use crate::types::*;

/// Settlement group manager
pub struct SettlementManager<S: DossierStorage> {
    pub(crate) storage: S,
}

impl<S: DossierStorage> SettlementManager<S> {
    /// Create a new settlement manager
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Create a settlement group from the given entries
    ///
    /// All entries must exist, share one settleable account, not be
    /// deleted, and not already belong to a settlement group.
    pub async fn create(&mut self, entry_ids: &[u64]) -> LedgerResult<u64> {
        if entry_ids.is_empty() {
            return Err(LedgerError::InvalidData {
                field: "entries",
                reason: "a settlement needs at least one entry".to_string(),
            });
        }

        let entries = self.load_for_settlement(entry_ids, None).await?;

        let account = self
            .storage
            .get_account(&entries[0].account)
            .await?
            .ok_or_else(|| LedgerError::AccountNotFound(entries[0].account.clone()))?;
        if !account.settleable {
            return Err(LedgerError::InvalidData {
                field: "account",
                reason: format!("account '{}' is not settleable", account.number),
            });
        }

        let number = self.storage.counter_next(CounterKind::Settlement).await?;
        self.stamp(entries, number).await?;
        info!(settlement = number, count = entry_ids.len(), "created settlement group");

        Ok(number)
    }

    /// Attach further entries to an existing settlement group
    pub async fn extend(&mut self, number: u64, entry_ids: &[u64]) -> LedgerResult<()> {
        let members = self.storage.entries_by_settlement(number).await?;
        let account = members
            .first()
            .map(|e| e.account.clone())
            .ok_or(LedgerError::GroupNotFound(number))?;

        let entries = self.load_for_settlement(entry_ids, Some(&account)).await?;
        self.stamp(entries, number).await?;

        Ok(())
    }

    /// Dissolve a settlement group, detaching every member entry
    pub async fn dissolve(&mut self, number: u64) -> LedgerResult<()> {
        let members = self.storage.entries_by_settlement(number).await?;
        if members.is_empty() {
            return Err(LedgerError::GroupNotFound(number));
        }

        for mut entry in members {
            entry.settlement = None;
            entry.updated_at = chrono::Utc::now().naive_utc();
            self.storage.update_entry(&entry, &[]).await?;
        }
        info!(settlement = number, "dissolved settlement group");

        Ok(())
    }

    /// The entries settled under a settlement number
    pub async fn get_by_number(&self, number: u64) -> LedgerResult<Vec<Entry>> {
        self.storage.entries_by_settlement(number).await
    }

    async fn load_for_settlement(
        &self,
        entry_ids: &[u64],
        account: Option<&str>,
    ) -> LedgerResult<Vec<Entry>> {
        let mut entries = Vec::with_capacity(entry_ids.len());

        for &id in entry_ids {
            let entry = self
                .storage
                .get_entry(id)
                .await?
                .ok_or(LedgerError::EntryNotFound(id))?;

            if entry.status == EntryStatus::Deleted {
                return Err(LedgerError::InvalidStateTransition {
                    operation: "settle",
                    status: entry.status,
                });
            }

            if let Some(existing) = entry.settlement {
                return Err(LedgerError::AlreadySettled {
                    entry: id,
                    settlement: existing.number,
                });
            }

            if let Some(required) = account.or_else(|| entries.first().map(|e: &Entry| e.account.as_str()))
            {
                if entry.account != required {
                    return Err(LedgerError::InvalidData {
                        field: "account",
                        reason: "settlement members must share one account".to_string(),
                    });
                }
            }

            entries.push(entry);
        }

        Ok(entries)
    }

    async fn stamp(&mut self, entries: Vec<Entry>, number: u64) -> LedgerResult<()> {
        let stamp = chrono::Utc::now().naive_utc();

        for mut entry in entries {
            entry.settlement = Some(EntrySettlement { number, stamp });
            entry.updated_at = stamp;
            self.storage.update_entry(&entry, &[]).await?;
        }

        Ok(())
    }
}
