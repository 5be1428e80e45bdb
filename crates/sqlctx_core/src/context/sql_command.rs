use crate::ast::set::OptionType;

/// Tag of the statement being built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SqlCommand {
    #[default]
    Empty,
    Select,
    Do,
    Insert,
    InsertSelect,
    Replace,
    ReplaceSelect,
    Update,
    UpdateMulti,
    Delete,
    DeleteMulti,
    Call,
    CreateTable,
    AlterTable,
    CreateIndex,
    DropIndex,
    Analyze,
    Check,
    Optimize,
    Repair,
    Truncate,
    SetOption,
    SetPassword,
    ShowDatabases,
    ShowTables,
    ShowTableStatus,
    ShowFields,
    ShowKeys,
    ShowStatus,
    ShowVariables,
    ShowProcesslist,
    ShowEngines,
    ShowCharsets,
    ShowCollations,
    ShowTriggers,
    ShowEvents,
    ShowOpenTables,
    ShowErrors,
    ShowWarnings,
    /// SHOW CREATE TABLE and SHOW CREATE VIEW.
    ShowCreate,
    ShowCreateDb,
    ShowGrants,
    RestartServer,
    AlterInstance,
    CreateRole,
    DropRole,
    SetRole,
    GrantRole,
    RevokeRole,
    CreateResourceGroup,
    AlterResourceGroup,
    DropResourceGroup,
    SetResourceGroup,
    CreateSrs,
    DropSrs,
    /// EXPLAIN FOR CONNECTION.
    ExplainOther,
}

impl SqlCommand {
    /// If EXPLAIN may wrap a statement with this tag.
    pub fn is_explainable(&self) -> bool {
        matches!(
            self,
            SqlCommand::Select
                | SqlCommand::Insert
                | SqlCommand::InsertSelect
                | SqlCommand::Replace
                | SqlCommand::ReplaceSelect
                | SqlCommand::Update
                | SqlCommand::UpdateMulti
                | SqlCommand::Delete
                | SqlCommand::DeleteMulti
        )
    }
}

/// Handling of rows that collide on a unique key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Duplicates {
    #[default]
    Error,
    Replace,
    Update,
}

/// Statement level flags set while contextualizing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementFlags {
    pub is_explain: bool,
    pub explain_analyze: bool,
    /// LIMIT makes the statement unsafe for statement based replication.
    pub unsafe_limit: bool,
    pub unsafe_skip_locked: bool,
    pub unsafe_nowait: bool,
    pub safe_to_cache_query: bool,
    /// Leave the diagnostics area untouched (SHOW WARNINGS and friends).
    pub keep_diagnostics: bool,
    pub duplicates: Duplicates,
    pub ignore: bool,
    /// DELETE QUICK
    pub quick: bool,
    pub no_write_to_binlog: bool,
    /// Rows given to INSERT ... VALUES.
    pub bulk_insert_row_count: usize,
    /// Running scope for SET assignments without their own scope keyword.
    pub option_type: OptionType,
}

impl Default for StatementFlags {
    fn default() -> Self {
        StatementFlags {
            is_explain: false,
            explain_analyze: false,
            unsafe_limit: false,
            unsafe_skip_locked: false,
            unsafe_nowait: false,
            safe_to_cache_query: true,
            keep_diagnostics: false,
            duplicates: Duplicates::Error,
            ignore: false,
            quick: false,
            no_write_to_binlog: false,
            bulk_insert_row_count: 0,
            option_type: OptionType::Default,
        }
    }
}
