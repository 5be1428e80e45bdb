use crate::ast::Statement;

/// `'<user>'@'<host>'`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdent {
    pub user: String,
    pub host: Option<String>,
}

impl UserIdent {
    pub fn new(user: impl Into<String>) -> Self {
        UserIdent {
            user: user.into(),
            host: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlterInstanceAction {
    RotateInnodbMasterKey,
    RotateBinlogMasterKey,
    ReloadTls { channel: Option<String>, no_rollback_on_error: bool },
    EnableInnodbRedoLog,
    DisableInnodbRedoLog,
    ReloadKeyring,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleSpec {
    /// `SET ROLE <roles>`
    Roles(Vec<UserIdent>),
    Default,
    None,
    All { except: Vec<UserIdent> },
}

/// Statements that skip scope resolution entirely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminStatement {
    Restart,
    AlterInstance(AlterInstanceAction),
    CreateRole {
        if_not_exists: bool,
        roles: Vec<UserIdent>,
    },
    DropRole {
        if_exists: bool,
        roles: Vec<UserIdent>,
    },
    SetRole(RoleSpec),
    /// `GRANT <roles> TO <users> [WITH ADMIN OPTION]`
    GrantRoles {
        roles: Vec<UserIdent>,
        users: Vec<UserIdent>,
        with_admin_option: bool,
    },
    /// `REVOKE <roles> FROM <users>`
    RevokeRoles {
        roles: Vec<UserIdent>,
        users: Vec<UserIdent>,
    },
    /// `SHOW GRANTS [FOR <user> [USING <roles>]]`
    ShowGrants {
        user: Option<UserIdent>,
        using: Vec<UserIdent>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceGroupType {
    System,
    User,
}

/// `<start>[-<end>]` in a VCPU list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VcpuRange {
    pub start: u64,
    pub end: u64,
}

impl VcpuRange {
    pub fn single(id: u64) -> Self {
        VcpuRange { start: id, end: id }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceGroupStatement {
    /// `CREATE RESOURCE GROUP <name> TYPE = ... [VCPU = ...] [THREAD_PRIORITY = ...] [ENABLE|DISABLE]`
    Create {
        name: String,
        group_type: ResourceGroupType,
        vcpus: Vec<VcpuRange>,
        priority: Option<i64>,
        enabled: bool,
    },
    Alter {
        name: String,
        vcpus: Vec<VcpuRange>,
        priority: Option<i64>,
        enabled: Option<bool>,
        force: bool,
    },
    Drop {
        name: String,
        force: bool,
    },
    /// `SET RESOURCE GROUP <name> [FOR <thread ids>]`
    Set {
        name: String,
        thread_ids: Vec<u64>,
    },
}

/// Attributes of `CREATE SPATIAL REFERENCE SYSTEM`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SrsAttributes {
    pub name: Option<String>,
    pub definition: Option<String>,
    pub organization: Option<String>,
    /// `ORGANIZATION <name> IDENTIFIED BY <id>`
    pub organization_coordsys_id: u64,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SrsStatement {
    Create {
        or_replace: bool,
        if_not_exists: bool,
        srid: u64,
        attributes: SrsAttributes,
    },
    Drop {
        if_exists: bool,
        srid: u64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExplainFormat {
    #[default]
    Traditional,
    Json,
    Tree,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExplainBody {
    Statement(Statement),
    /// `EXPLAIN FOR CONNECTION <id>`
    ForConnection(u64),
}

/// `EXPLAIN [ANALYZE] [FORMAT = ...] <stmt>`
#[derive(Debug, Clone, PartialEq)]
pub struct ExplainStatement {
    pub format: ExplainFormat,
    /// `EXPLAIN ANALYZE`, executes and reports as a tree.
    pub analyze: bool,
    pub body: ExplainBody,
}
