//! Session handle consulted by the pass.
use crate::config::session::ContextConfig;
use crate::registry::sysvar::{self, SystemVariable};

/// Everything the pass needs to know about the surrounding session.
pub trait Environment {
    fn config(&self) -> &ContextConfig;

    /// Database used for unqualified table names.
    fn current_database(&self) -> Option<&str>;

    fn find_system_variable(&self, name: &str) -> Option<&'static SystemVariable> {
        sysvar::find_system_variable(name)
    }

    /// Offset of a stored program variable visible at this point, if any.
    fn find_local_variable(&self, _name: &str) -> Option<usize> {
        None
    }

    fn is_temporary_table(&self, _db: Option<&str>, _table: &str) -> bool {
        false
    }
}

/// A plain in-memory session.
#[derive(Debug, Default, Clone)]
pub struct Session {
    pub config: ContextConfig,
    pub database: Option<String>,
    /// Stored program variables in scope, by declaration order.
    pub local_variables: Vec<String>,
    pub temporary_tables: Vec<(Option<String>, String)>,
}

impl Session {
    pub fn new(config: ContextConfig) -> Self {
        Session {
            config,
            ..Default::default()
        }
    }

    pub fn with_database(mut self, db: impl Into<String>) -> Self {
        self.database = Some(db.into());
        self
    }

    pub fn with_local_variable(mut self, name: impl Into<String>) -> Self {
        self.local_variables.push(name.into());
        self
    }

    pub fn with_temporary_table(mut self, db: Option<&str>, table: impl Into<String>) -> Self {
        self.temporary_tables
            .push((db.map(|s| s.to_string()), table.into()));
        self
    }
}

impl Environment for Session {
    fn config(&self) -> &ContextConfig {
        &self.config
    }

    fn current_database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    fn find_local_variable(&self, name: &str) -> Option<usize> {
        self.local_variables
            .iter()
            .position(|v| v.eq_ignore_ascii_case(name))
    }

    fn is_temporary_table(&self, db: Option<&str>, table: &str) -> bool {
        let db = db.or(self.current_database());
        self.temporary_tables
            .iter()
            .any(|(t_db, t_name)| t_db.as_deref() == db && self.config.names_equal(t_name, table))
    }
}
