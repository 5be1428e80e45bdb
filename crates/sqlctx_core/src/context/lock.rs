//! Lock requests recorded on table references.
//!
//! Nothing here takes a lock. The execution layer reads the requests back from
//! the table list.
use crate::ast::query::{LockStrength, LockedRowAction};

/// Table lock type, weakest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LockType {
    Ignore,
    Unlock,
    /// Placeholder resolved to `Read` or `ReadWithSharedLocks` later.
    ReadDefault,
    Read,
    ReadWithSharedLocks,
    ReadHighPriority,
    ReadNoInsert,
    WriteAllowWrite,
    WriteConcurrentInsert,
    /// Placeholder resolved to `WriteConcurrentInsert` or `Write` later.
    WriteConcurrentDefault,
    /// Placeholder resolved by the low priority setting later.
    WriteDefault,
    WriteLowPriority,
    Write,
    WriteOnly,
}

impl LockType {
    pub fn is_write(&self) -> bool {
        *self >= LockType::WriteAllowWrite
    }
}

/// Lock type plus what to do about rows locked by others.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LockDescriptor {
    pub lock_type: LockType,
    pub action: LockedRowAction,
}

impl LockDescriptor {
    pub const fn new(lock_type: LockType) -> Self {
        LockDescriptor {
            lock_type,
            action: LockedRowAction::Wait,
        }
    }

    /// Descriptor for a `FOR UPDATE|SHARE` clause.
    pub fn from_locking_clause(strength: LockStrength, action: LockedRowAction) -> Self {
        let lock_type = match strength {
            LockStrength::Update => LockType::Write,
            LockStrength::Share => LockType::ReadWithSharedLocks,
        };
        LockDescriptor { lock_type, action }
    }
}

/// Metadata lock type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MdlType {
    SharedRead,
    SharedWrite,
    SharedWriteLowPrio,
    SharedUpgradable,
    SharedNoWrite,
    SharedNoReadWrite,
    Shared,
    Exclusive,
}

/// Metadata lock matching a DML table lock.
pub fn mdl_type_for_dml(lock_type: LockType) -> MdlType {
    if lock_type.is_write() {
        if lock_type == LockType::WriteLowPriority {
            MdlType::SharedWriteLowPrio
        } else {
            MdlType::SharedWrite
        }
    } else {
        MdlType::SharedRead
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LockRequest {
    pub lock: LockDescriptor,
    pub mdl: MdlType,
}

impl LockRequest {
    pub const fn new(lock_type: LockType, mdl: MdlType) -> Self {
        LockRequest {
            lock: LockDescriptor::new(lock_type),
            mdl,
        }
    }

    /// Default request for tables read by a query.
    pub const fn read() -> Self {
        Self::new(LockType::ReadDefault, MdlType::SharedRead)
    }

    /// Request for a DML lock type with its matching metadata lock.
    pub fn dml(lock_type: LockType) -> Self {
        Self::new(lock_type, mdl_type_for_dml(lock_type))
    }
}
