use std::collections::HashMap;
use std::sync::LazyLock;

/// Which scopes a system variable exists in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableScope {
    Global,
    Session,
    Both,
}

#[derive(Debug, PartialEq, Eq)]
pub struct SystemVariable {
    pub name: &'static str,
    pub scope: VariableScope,
    pub read_only: bool,
    /// Structured variables can be addressed through a named instance, as in
    /// `cache_name.key_buffer_size`.
    pub is_struct: bool,
}

impl SystemVariable {
    pub fn has_global(&self) -> bool {
        matches!(self.scope, VariableScope::Global | VariableScope::Both)
    }

    pub fn has_session(&self) -> bool {
        matches!(self.scope, VariableScope::Session | VariableScope::Both)
    }
}

const fn var(name: &'static str, scope: VariableScope) -> SystemVariable {
    SystemVariable {
        name,
        scope,
        read_only: false,
        is_struct: false,
    }
}

const fn read_only(name: &'static str, scope: VariableScope) -> SystemVariable {
    SystemVariable {
        name,
        scope,
        read_only: true,
        is_struct: false,
    }
}

const fn structured(name: &'static str) -> SystemVariable {
    SystemVariable {
        name,
        scope: VariableScope::Global,
        read_only: false,
        is_struct: true,
    }
}

use VariableScope::{Both, Global, Session};

static VARIABLES: &[SystemVariable] = &[
    var("autocommit", Both),
    var("sql_mode", Both),
    var("max_connections", Global),
    var("transaction_isolation", Both),
    var("transaction_read_only", Both),
    var("character_set_client", Both),
    var("character_set_results", Both),
    var("character_set_connection", Both),
    var("collation_connection", Both),
    var("sql_select_limit", Both),
    var("max_execution_time", Both),
    var("sort_buffer_size", Both),
    var("foreign_key_checks", Both),
    var("unique_checks", Both),
    var("time_zone", Both),
    var("default_storage_engine", Both),
    var("default_tmp_storage_engine", Both),
    var("default_collation_for_utf8mb4", Both),
    var("pseudo_thread_id", Session),
    var("timestamp", Session),
    var("insert_id", Session),
    var("last_insert_id", Session),
    var("sql_log_bin", Session),
    var("innodb_buffer_pool_size", Global),
    var("read_only", Global),
    var("super_read_only", Global),
    var("validate_password.length", Global),
    read_only("warning_count", Session),
    read_only("error_count", Session),
    read_only("version", Global),
    read_only("datadir", Global),
    read_only("lower_case_table_names", Global),
    structured("key_buffer_size"),
    structured("key_cache_block_size"),
    structured("key_cache_age_threshold"),
    structured("key_cache_division_limit"),
];

static BY_NAME: LazyLock<HashMap<&'static str, &'static SystemVariable>> =
    LazyLock::new(|| VARIABLES.iter().map(|v| (v.name, v)).collect());

/// Look up a system variable, case-insensitively.
pub fn find_system_variable(name: &str) -> Option<&'static SystemVariable> {
    BY_NAME.get(name.to_ascii_lowercase().as_str()).copied()
}

/// Find the registered variable name most similar to `name`.
pub fn similar_system_variable(name: &str) -> Option<&'static str> {
    const SIMILARITY_THRESHOLD: f64 = 0.7;

    let name = name.to_ascii_lowercase();
    let mut best: Option<(f64, &'static str)> = None;
    for v in VARIABLES {
        let score = strsim::jaro(v.name, &name);
        if score > SIMILARITY_THRESHOLD && best.is_none_or(|(best, _)| score > best) {
            best = Some((score, v.name));
        }
    }
    best.map(|(_, name)| name)
}
