//! Bank reconciliation: grouping entries with imported bank lines
//!
//! A conciliation group ties together the ledger entries and the
//! bank-statement lines that represent the same real-world movement.
//! Membership is a set: order carries no meaning, adding an existing
//! member is a no-op, and a member can belong to one group at a time.
//! A group lives as long as it holds at least one entry; once the last
//! entry leaves, the remaining bank lines have nothing to be reconciled
//! against and the group dissolves.

use tracing::{debug, info};

use crate::counters::CounterKind;
use crate::traits::DossierStorage;
use crate::types::*;

/// Conciliation group manager
pub struct ConciliationManager<S: DossierStorage> {
    pub(crate) storage: S,
}

impl<S: DossierStorage> ConciliationManager<S> {
    /// Create a new conciliation manager
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Match a bank line with an entry, creating a new group
    ///
    /// Both members must be free: a member already claimed by any group is
    /// refused with [`LedgerError::AlreadyReconciled`].
    pub async fn conciliate(
        &mut self,
        entry_id: u64,
        bat_line_id: u64,
    ) -> LedgerResult<ConciliationGroup> {
        if self.storage.get_entry(entry_id).await?.is_none() {
            return Err(LedgerError::EntryNotFound(entry_id));
        }

        for member in [
            ConciliationMember::entry(entry_id),
            ConciliationMember::bat_line(bat_line_id),
        ] {
            if let Some(owner) = self.storage.get_group_by_member(member).await? {
                return Err(LedgerError::AlreadyReconciled {
                    kind: member.kind,
                    id: member.id,
                    group: owner.id,
                });
            }
        }

        let id = self.storage.counter_next(CounterKind::Conciliation).await?;
        let group = ConciliationGroup::new(
            id,
            vec![
                ConciliationMember::entry(entry_id),
                ConciliationMember::bat_line(bat_line_id),
            ],
        );

        self.storage.save_group(&group).await?;
        info!(group = id, entry_id, bat_line_id, "created conciliation group");

        Ok(group)
    }

    /// Get a group by identifier
    pub async fn get_by_id(&self, id: u64) -> LedgerResult<Option<ConciliationGroup>> {
        self.storage.get_group(id).await
    }

    /// Get the group owning a member, if any
    pub async fn get_by_member(
        &self,
        kind: MemberKind,
        id: u64,
    ) -> LedgerResult<Option<ConciliationGroup>> {
        self.storage
            .get_group_by_member(ConciliationMember { kind, id })
            .await
    }

    /// Attach a member to an existing group
    ///
    /// Idempotent for members already in the group. A member owned by a
    /// different group is refused; the ownership check and the membership
    /// write commit as one storage transaction.
    pub async fn add(
        &mut self,
        group_id: u64,
        member: ConciliationMember,
    ) -> LedgerResult<ConciliationGroup> {
        if member.kind == MemberKind::Entry && self.storage.get_entry(member.id).await?.is_none() {
            return Err(LedgerError::EntryNotFound(member.id));
        }

        let attached = self.storage.attach_group_member(group_id, member).await?;
        if attached {
            debug!(group = group_id, ?member, "attached conciliation member");
        }

        self.storage
            .get_group(group_id)
            .await?
            .ok_or(LedgerError::GroupNotFound(group_id))
    }

    /// Detach a member from a group
    ///
    /// When the last entry member leaves, the group dissolves: the
    /// remaining bank-line members are released and the group id stops
    /// resolving. Returns the surviving group, or `None` after dissolution.
    pub async fn remove(
        &mut self,
        group_id: u64,
        member: ConciliationMember,
    ) -> LedgerResult<Option<ConciliationGroup>> {
        let mut group = self
            .storage
            .get_group(group_id)
            .await?
            .ok_or(LedgerError::GroupNotFound(group_id))?;

        group.members.retain(|m| *m != member);

        if group.entry_count() == 0 {
            self.storage.delete_group(group_id).await?;
            info!(group = group_id, "dissolved conciliation group");
            return Ok(None);
        }

        self.storage.update_group(&group).await?;
        debug!(group = group_id, ?member, "detached conciliation member");

        Ok(Some(group))
    }
}
