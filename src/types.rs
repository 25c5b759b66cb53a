//! Core types and data structures for the ledger engine

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::BitOr;

/// Sides of a ledger movement in double-entry bookkeeping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryType {
    /// Debit leg
    Debit,
    /// Credit leg
    Credit,
}

/// Lifecycle status of an entry
///
/// `Past` entries were inherited from a prior, closed exercice and are never
/// posted to the current buckets. `Future` is entered directly at creation
/// time when the effect date falls after the exercice end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryStatus {
    /// Inherited from a closed exercice
    Past,
    /// Posted to the rough bucket, still freely editable
    Rough,
    /// Posted to the validated bucket, read-only apart from
    /// settlement/conciliation linkage
    Validated,
    /// Soft-deleted, excluded from all balances
    Deleted,
    /// Dated after the exercice end, posted to the future bucket
    Future,
}

impl EntryStatus {
    /// Whether entries in this status may still be modified
    pub fn is_editable(&self) -> bool {
        matches!(self, EntryStatus::Rough | EntryStatus::Future)
    }

    /// The balance bucket this status posts to, if any
    pub fn bucket(&self) -> Option<BalanceBucket> {
        match self {
            EntryStatus::Rough => Some(BalanceBucket::Rough),
            EntryStatus::Validated => Some(BalanceBucket::Validated),
            EntryStatus::Future => Some(BalanceBucket::Future),
            EntryStatus::Past | EntryStatus::Deleted => None,
        }
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EntryStatus::Past => "past",
            EntryStatus::Rough => "rough",
            EntryStatus::Validated => "validated",
            EntryStatus::Deleted => "deleted",
            EntryStatus::Future => "future",
        };
        f.write_str(s)
    }
}

/// The three concurrent balance buckets carried by each account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BalanceBucket {
    /// Amounts of validated entries
    Validated,
    /// Amounts of rough (not yet validated) entries
    Rough,
    /// Amounts of entries dated after the exercice end
    Future,
}

/// OR-able criteria mask for [`Account::is_allowed`]
///
/// The account matches when at least one of the requested criteria holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllowMask(u8);

impl AllowMask {
    /// Match root accounts
    pub const ROOT: AllowMask = AllowMask(1);
    /// Match detail accounts
    pub const DETAIL: AllowMask = AllowMask(1 << 1);
    /// Match settleable accounts
    pub const SETTLEABLE: AllowMask = AllowMask(1 << 2);
    /// Match reconciliable accounts
    pub const RECONCILIABLE: AllowMask = AllowMask(1 << 3);
    /// Match closed accounts
    pub const CLOSED: AllowMask = AllowMask(1 << 4);
    /// Match any account
    pub const ALL: AllowMask = AllowMask(0b1_1111);

    /// Whether all bits of `other` are set in this mask
    pub fn contains(&self, other: AllowMask) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for AllowMask {
    type Output = AllowMask;

    fn bitor(self, rhs: AllowMask) -> AllowMask {
        AllowMask(self.0 | rhs.0)
    }
}

/// A period-end snapshot of an account's global balance, keyed by date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchivedBalance {
    /// Date the snapshot was taken for
    pub date: NaiveDate,
    /// Global debit total (validated + rough + future) at that date
    pub debit: BigDecimal,
    /// Global credit total at that date
    pub credit: BigDecimal,
}

/// A chart-of-accounts node
///
/// The account number is hierarchical by prefix: `411` is the parent of
/// `411000`. Root accounts structure the chart and never receive entries
/// directly; only detail accounts accumulate amounts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Hierarchical account number (max 64 chars, first digit is the class)
    pub number: String,
    /// Human-readable account label
    pub label: String,
    /// ISO currency code of the account
    pub currency: String,
    /// Free-form notes
    pub notes: Option<String>,
    /// Root (structuring) account; false means detail account
    pub root: bool,
    /// Whether entries on this account may be settled
    pub settleable: bool,
    /// Whether entries on this account may be reconciled against bank lines
    pub reconciliable: bool,
    /// Whether the balance is carried forward at exercice closing
    pub forwardable: bool,
    /// Closed accounts reject new entries unless explicitly overridden
    pub closed: bool,
    /// Debit total of validated entries
    pub validated_debit: BigDecimal,
    /// Credit total of validated entries
    pub validated_credit: BigDecimal,
    /// Debit total of rough entries
    pub rough_debit: BigDecimal,
    /// Credit total of rough entries
    pub rough_credit: BigDecimal,
    /// Debit total of future-dated entries
    pub future_debit: BigDecimal,
    /// Credit total of future-dated entries
    pub future_credit: BigDecimal,
    /// Ordered period-end snapshots, append-only
    pub archived: Vec<ArchivedBalance>,
    /// When the account was created
    pub created_at: NaiveDateTime,
    /// When the account was last updated
    pub updated_at: NaiveDateTime,
}

impl Account {
    /// Create a new detail account with zeroed buckets
    pub fn new(number: String, label: String, currency: String) -> Self {
        let now = chrono::Utc::now().naive_utc();
        Self {
            number,
            label,
            currency,
            notes: None,
            root: false,
            settleable: false,
            reconciliable: false,
            forwardable: false,
            closed: false,
            validated_debit: BigDecimal::from(0),
            validated_credit: BigDecimal::from(0),
            rough_debit: BigDecimal::from(0),
            rough_credit: BigDecimal::from(0),
            future_debit: BigDecimal::from(0),
            future_credit: BigDecimal::from(0),
            archived: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a new root (structuring) account
    pub fn new_root(number: String, label: String, currency: String) -> Self {
        let mut account = Self::new(number, label, currency);
        account.root = true;
        account
    }

    /// The account class, i.e. the first digit of the number
    pub fn class(&self) -> Option<u8> {
        self.number
            .chars()
            .next()
            .and_then(|c| c.to_digit(10))
            .map(|d| d as u8)
    }

    /// Whether this is a detail account (the only kind receiving entries)
    pub fn is_detail(&self) -> bool {
        !self.root
    }

    /// Whether this account is a descendant of `other` by number prefix
    pub fn is_child_of(&self, other: &str) -> bool {
        self.number != other && self.number.starts_with(other)
    }

    /// Whether this account matches at least one criterion of the mask
    pub fn is_allowed(&self, mask: AllowMask) -> bool {
        (mask.contains(AllowMask::ROOT) && self.root)
            || (mask.contains(AllowMask::DETAIL) && self.is_detail())
            || (mask.contains(AllowMask::SETTLEABLE) && self.settleable)
            || (mask.contains(AllowMask::RECONCILIABLE) && self.reconciliable)
            || (mask.contains(AllowMask::CLOSED) && self.closed)
    }

    /// Net balance over the three buckets: total debit minus total credit
    pub fn get_global_solde(&self) -> BigDecimal {
        self.global_debit() - self.global_credit()
    }

    /// Debit total summed over the validated, rough and future buckets
    pub fn global_debit(&self) -> BigDecimal {
        &self.validated_debit + &self.rough_debit + &self.future_debit
    }

    /// Credit total summed over the validated, rough and future buckets
    pub fn global_credit(&self) -> BigDecimal {
        &self.validated_credit + &self.rough_credit + &self.future_credit
    }

    /// Borrow the requested bucket pair as (debit, credit)
    pub fn bucket(&self, bucket: BalanceBucket) -> (&BigDecimal, &BigDecimal) {
        match bucket {
            BalanceBucket::Validated => (&self.validated_debit, &self.validated_credit),
            BalanceBucket::Rough => (&self.rough_debit, &self.rough_credit),
            BalanceBucket::Future => (&self.future_debit, &self.future_credit),
        }
    }

    /// Add an amount to one side of a bucket
    pub fn add_amount(&mut self, bucket: BalanceBucket, side: EntryType, amount: &BigDecimal) {
        let slot = self.bucket_slot(bucket, side);
        *slot = &*slot + amount;
        self.updated_at = chrono::Utc::now().naive_utc();
    }

    /// Subtract an amount from one side of a bucket
    pub fn sub_amount(&mut self, bucket: BalanceBucket, side: EntryType, amount: &BigDecimal) {
        let slot = self.bucket_slot(bucket, side);
        *slot = &*slot - amount;
        self.updated_at = chrono::Utc::now().naive_utc();
    }

    fn bucket_slot(&mut self, bucket: BalanceBucket, side: EntryType) -> &mut BigDecimal {
        match (bucket, side) {
            (BalanceBucket::Validated, EntryType::Debit) => &mut self.validated_debit,
            (BalanceBucket::Validated, EntryType::Credit) => &mut self.validated_credit,
            (BalanceBucket::Rough, EntryType::Debit) => &mut self.rough_debit,
            (BalanceBucket::Rough, EntryType::Credit) => &mut self.rough_credit,
            (BalanceBucket::Future, EntryType::Debit) => &mut self.future_debit,
            (BalanceBucket::Future, EntryType::Credit) => &mut self.future_credit,
        }
    }
}

/// Settlement linkage carried by a settled entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntrySettlement {
    /// Settlement group identifier
    pub number: u64,
    /// When the entry was settled
    pub stamp: NaiveDateTime,
}

/// An atomic accounting movement: one debit or credit leg against one
/// account, one ledger, one date of effect
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// Allocated identifier, `None` until inserted
    pub id: Option<u64>,
    /// Entry label
    pub label: String,
    /// Optional piece reference (invoice number, check number, ...)
    pub reference: Option<String>,
    /// Date of effect, drives bucket classification
    pub effect_date: NaiveDate,
    /// Date of operation
    pub operation_date: NaiveDate,
    /// Number of the imputed account
    pub account: String,
    /// ISO currency code
    pub currency: String,
    /// Mnemonic of the ledger (journal) the entry belongs to
    pub ledger: String,
    /// Mnemonic of the operation template the entry was generated from
    pub ope_template: Option<String>,
    /// Debit amount; exactly one of debit/credit is non-zero
    pub debit: BigDecimal,
    /// Credit amount; exactly one of debit/credit is non-zero
    pub credit: BigDecimal,
    /// Lifecycle status
    pub status: EntryStatus,
    /// Settlement linkage, if the entry is settled
    pub settlement: Option<EntrySettlement>,
    /// When the entry was created
    pub created_at: NaiveDateTime,
    /// When the entry was last updated
    pub updated_at: NaiveDateTime,
}

impl Entry {
    /// Create a new entry from user-provided data
    ///
    /// The entry is not yet persisted: it has no identifier and a
    /// provisional `Rough` status. Call [`Entry::validate_data`] before
    /// handing it to the engine.
    #[allow(clippy::too_many_arguments)]
    pub fn new_with_data(
        label: String,
        reference: Option<String>,
        effect_date: NaiveDate,
        operation_date: NaiveDate,
        account: String,
        currency: String,
        ledger: String,
        ope_template: Option<String>,
        debit: BigDecimal,
        credit: BigDecimal,
    ) -> Self {
        let now = chrono::Utc::now().naive_utc();
        Self {
            id: None,
            label,
            reference,
            effect_date,
            operation_date,
            account,
            currency,
            ledger,
            ope_template,
            debit,
            credit,
            status: EntryStatus::Rough,
            settlement: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a debit entry
    pub fn debit(
        label: String,
        effect_date: NaiveDate,
        operation_date: NaiveDate,
        account: String,
        currency: String,
        ledger: String,
        amount: BigDecimal,
    ) -> Self {
        Self::new_with_data(
            label,
            None,
            effect_date,
            operation_date,
            account,
            currency,
            ledger,
            None,
            amount,
            BigDecimal::from(0),
        )
    }

    /// Create a credit entry
    pub fn credit(
        label: String,
        effect_date: NaiveDate,
        operation_date: NaiveDate,
        account: String,
        currency: String,
        ledger: String,
        amount: BigDecimal,
    ) -> Self {
        Self::new_with_data(
            label,
            None,
            effect_date,
            operation_date,
            account,
            currency,
            ledger,
            None,
            BigDecimal::from(0),
            amount,
        )
    }

    /// The side this entry moves
    pub fn side(&self) -> EntryType {
        if self.debit > BigDecimal::from(0) {
            EntryType::Debit
        } else {
            EntryType::Credit
        }
    }

    /// The non-zero amount of the entry
    pub fn amount(&self) -> &BigDecimal {
        match self.side() {
            EntryType::Debit => &self.debit,
            EntryType::Credit => &self.credit,
        }
    }

    /// Validate the entry data, naming the first offending field
    pub fn validate_data(&self) -> LedgerResult<()> {
        crate::utils::validation::validate_label(&self.label)?;
        crate::utils::validation::validate_account_number(&self.account)?;
        crate::utils::validation::validate_currency(&self.currency)?;
        crate::utils::validation::validate_ledger_mnemo(&self.ledger)?;
        crate::utils::validation::validate_amounts(&self.debit, &self.credit)?;
        Ok(())
    }

    /// Whether the entry data is valid
    pub fn is_valid(&self) -> bool {
        self.validate_data().is_ok()
    }

    /// Whether the entry may still be modified
    pub fn is_editable(&self) -> bool {
        self.status.is_editable()
    }
}

/// Kinds of conciliation group members
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemberKind {
    /// A ledger entry
    Entry,
    /// One line of an imported bank account transaction file
    BatLine,
}

/// One member of a conciliation group: a typed identifier, not an
/// inheritance hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConciliationMember {
    /// Member kind discriminant
    pub kind: MemberKind,
    /// Identifier within the member kind's own number space
    pub id: u64,
}

impl ConciliationMember {
    /// A ledger-entry member
    pub fn entry(id: u64) -> Self {
        Self {
            kind: MemberKind::Entry,
            id,
        }
    }

    /// A bank-line member
    pub fn bat_line(id: u64) -> Self {
        Self {
            kind: MemberKind::BatLine,
            id,
        }
    }
}

/// A set of entries and bank lines matched as one real-world movement
///
/// Invariant: a live group always holds at least one entry member; a bank
/// line belongs to at most one group at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConciliationGroup {
    /// Allocated group identifier
    pub id: u64,
    /// Member set; order carries no meaning
    pub members: Vec<ConciliationMember>,
    /// When the group was created
    pub created_at: NaiveDateTime,
}

impl ConciliationGroup {
    /// Create a group from its first members
    pub fn new(id: u64, members: Vec<ConciliationMember>) -> Self {
        Self {
            id,
            members,
            created_at: chrono::Utc::now().naive_utc(),
        }
    }

    /// Whether the member already belongs to this group
    pub fn contains(&self, member: &ConciliationMember) -> bool {
        self.members.contains(member)
    }

    /// Number of entry members
    pub fn entry_count(&self) -> usize {
        self.members
            .iter()
            .filter(|m| m.kind == MemberKind::Entry)
            .count()
    }
}

/// Per-dossier configuration the engine is constructed with
///
/// Loaded by the embedding application from its own settings store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DossierConfig {
    /// Dossier label
    pub label: String,
    /// Default dossier currency
    pub currency: String,
    /// First day of the current exercice
    pub exercice_begin: NaiveDate,
    /// Last day of the current exercice
    pub exercice_end: NaiveDate,
}

impl DossierConfig {
    /// Whether a date falls after the exercice end (future bucket)
    pub fn is_future(&self, date: NaiveDate) -> bool {
        date > self.exercice_end
    }

    /// Whether a date falls within the exercice
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.exercice_begin && date <= self.exercice_end
    }
}

/// Errors that can occur in the ledger engine
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Local validation failure, surfaced before any storage write
    #[error("invalid {field}: {reason}")]
    InvalidData {
        /// First offending field
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },
    /// Operation requested on an entry whose status forbids it
    #[error("cannot {operation} an entry while it is {status}")]
    InvalidStateTransition {
        /// The refused operation
        operation: &'static str,
        /// Status the entry was found in
        status: EntryStatus,
    },
    /// Member already claimed by a different conciliation group
    #[error("{kind:?} {id} already belongs to conciliation group {group}")]
    AlreadyReconciled {
        /// Kind of the claimed member
        kind: MemberKind,
        /// Identifier of the claimed member
        id: u64,
        /// Group currently owning it
        group: u64,
    },
    /// Entry already belongs to another settlement group
    #[error("entry {entry} is already settled under settlement {settlement}")]
    AlreadySettled {
        /// The settled entry
        entry: u64,
        /// Settlement group currently owning it
        settlement: u64,
    },
    /// No account with this number
    #[error("account not found: {0}")]
    AccountNotFound(String),
    /// No entry with this identifier
    #[error("entry not found: {0}")]
    EntryNotFound(u64),
    /// No conciliation group with this identifier
    #[error("conciliation group not found: {0}")]
    GroupNotFound(u64),
    /// Failure of the underlying store; the current operation was rolled
    /// back in full and may be retried
    #[error("storage error: {0}")]
    Storage(String),
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;
