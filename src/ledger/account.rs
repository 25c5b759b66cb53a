//! Account management functionality

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use tracing::{debug, info};

use crate::traits::*;
use crate::types::*;

/// Account manager for chart-of-accounts operations
pub struct AccountManager<S: DossierStorage> {
    pub(crate) storage: S,
    validator: Box<dyn AccountValidator>,
}

impl<S: DossierStorage> AccountManager<S> {
    /// Create a new account manager
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            validator: Box::new(DefaultAccountValidator),
        }
    }

    /// Create a new account manager with a custom validator
    pub fn with_validator(storage: S, validator: Box<dyn AccountValidator>) -> Self {
        Self { storage, validator }
    }

    /// Insert a new account into the chart
    pub async fn insert(&mut self, account: Account) -> LedgerResult<Account> {
        self.validator.validate_account(&account)?;

        if self.storage.get_account(&account.number).await?.is_some() {
            return Err(LedgerError::InvalidData {
                field: "account",
                reason: format!("account '{}' already exists", account.number),
            });
        }

        self.storage.save_account(&account).await?;
        info!(number = %account.number, "created account");

        Ok(account)
    }

    /// Get an account by number
    pub async fn get_by_number(&self, number: &str) -> LedgerResult<Option<Account>> {
        self.storage.get_account(number).await
    }

    /// Get an account by number, failing when absent
    pub async fn get_required(&self, number: &str) -> LedgerResult<Account> {
        self.storage
            .get_account(number)
            .await?
            .ok_or_else(|| LedgerError::AccountNotFound(number.to_string()))
    }

    /// The full chart of accounts, ordered by number
    pub async fn get_dataset(&self) -> LedgerResult<Vec<Account>> {
        self.storage.list_accounts().await
    }

    /// Accounts of one class (first digit of the number)
    pub async fn get_dataset_by_class(&self, class: u8) -> LedgerResult<Vec<Account>> {
        let accounts = self.storage.list_accounts().await?;
        Ok(accounts
            .into_iter()
            .filter(|a| a.class() == Some(class))
            .collect())
    }

    /// Update an existing account
    pub async fn update(&mut self, account: &Account) -> LedgerResult<()> {
        self.validator.validate_account(account)?;

        if self.storage.get_account(&account.number).await?.is_none() {
            return Err(LedgerError::AccountNotFound(account.number.clone()));
        }

        self.storage.update_account(account).await
    }

    /// Whether the account owns no entry and may be deleted
    ///
    /// Deleted-status entries still count as references.
    pub async fn is_deletable(&self, number: &str) -> LedgerResult<bool> {
        Ok(self.storage.account_entry_count(number).await? == 0)
    }

    /// Delete an account, refused while any entry references it
    pub async fn delete(&mut self, number: &str) -> LedgerResult<()> {
        if self.storage.get_account(number).await?.is_none() {
            return Err(LedgerError::AccountNotFound(number.to_string()));
        }

        if !self.is_deletable(number).await? {
            return Err(LedgerError::InvalidData {
                field: "account",
                reason: format!("account '{number}' still owns entries"),
            });
        }

        self.storage.delete_account(number).await?;
        info!(number, "deleted account");
        Ok(())
    }

    /// Direct and indirect children of an account, by number prefix
    pub async fn get_children(&self, number: &str) -> LedgerResult<Vec<Account>> {
        let accounts = self.storage.list_accounts().await?;
        Ok(accounts
            .into_iter()
            .filter(|a| a.is_child_of(number))
            .collect())
    }

    /// Whether the account has at least one child
    pub async fn has_children(&self, number: &str) -> LedgerResult<bool> {
        Ok(!self.get_children(number).await?.is_empty())
    }

    /// Max effect date touched on the account, across the rough, validated
    /// and future entry sets
    pub async fn get_global_deffect(&self, number: &str) -> LedgerResult<Option<NaiveDate>> {
        let mut max = None;
        for status in [
            EntryStatus::Validated,
            EntryStatus::Rough,
            EntryStatus::Future,
        ] {
            let candidate = self.storage.max_effect_date(number, status).await?;
            max = match (max, candidate) {
                (None, c) => c,
                (m, None) => m,
                (Some(m), Some(c)) => Some(m.max(c)),
            };
        }
        Ok(max)
    }

    /// Snapshot the account's current global balance under the given date
    ///
    /// Archived rows are append-only; re-archiving an already archived date
    /// overwrites only that date's row.
    pub async fn archive_balances(
        &mut self,
        number: &str,
        date: NaiveDate,
    ) -> LedgerResult<Account> {
        let mut account = self.get_required(number).await?;

        let snapshot = ArchivedBalance {
            date,
            debit: account.global_debit(),
            credit: account.global_credit(),
        };

        match account.archived.iter_mut().find(|a| a.date == date) {
            Some(existing) => *existing = snapshot,
            None => {
                account.archived.push(snapshot);
                account.archived.sort_by_key(|a| a.date);
            }
        }
        account.updated_at = chrono::Utc::now().naive_utc();

        self.storage.update_account(&account).await?;
        debug!(number, %date, "archived account balances");

        Ok(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::memory_storage::MemoryStorage;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn account(number: &str, label: &str) -> Account {
        Account::new(number.to_string(), label.to_string(), "EUR".to_string())
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicates_and_bad_numbers() {
        let mut manager = AccountManager::new(MemoryStorage::new());

        manager.insert(account("411000", "Clients")).await.unwrap();

        let duplicate = manager.insert(account("411000", "Again")).await;
        assert!(matches!(
            duplicate,
            Err(LedgerError::InvalidData {
                field: "account",
                ..
            })
        ));

        let bad = manager.insert(account("X000", "Bad class")).await;
        assert!(bad.is_err());
    }

    #[tokio::test]
    async fn test_children_by_prefix() {
        let mut manager = AccountManager::new(MemoryStorage::new());

        let mut root = account("411", "Clients");
        root.root = true;
        manager.insert(root).await.unwrap();
        manager.insert(account("411000", "General")).await.unwrap();
        manager.insert(account("411100", "Export")).await.unwrap();
        manager.insert(account("512000", "Bank")).await.unwrap();

        let children = manager.get_children("411").await.unwrap();
        assert_eq!(children.len(), 2);
        assert!(manager.has_children("411").await.unwrap());
        assert!(!manager.has_children("512000").await.unwrap());
    }

    #[tokio::test]
    async fn test_archive_overwrites_same_date_only() {
        let mut manager = AccountManager::new(MemoryStorage::new());

        let mut a = account("411000", "Clients");
        a.rough_debit = BigDecimal::from(100);
        manager.insert(a).await.unwrap();

        manager
            .archive_balances("411000", date(2024, 3, 31))
            .await
            .unwrap();

        let mut a = manager.get_required("411000").await.unwrap();
        a.rough_debit = BigDecimal::from(250);
        manager.update(&a).await.unwrap();

        manager
            .archive_balances("411000", date(2024, 6, 30))
            .await
            .unwrap();
        let archived = manager
            .archive_balances("411000", date(2024, 3, 31))
            .await
            .unwrap();

        assert_eq!(archived.archived.len(), 2);
        assert_eq!(archived.archived[0].date, date(2024, 3, 31));
        assert_eq!(archived.archived[0].debit, BigDecimal::from(250));
        assert_eq!(archived.archived[1].date, date(2024, 6, 30));
    }
}
