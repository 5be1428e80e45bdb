//! Syntax tree handed to the contextualization pass.
//!
//! Nodes are plain data. Resolution state written back by the pass (table
//! references, resolved units) lives in `Option` fields that start out as
//! `None`.
pub mod admin;
pub mod ddl;
pub mod dml;
pub mod from;
pub mod query;
pub mod set;
pub mod show;

use std::fmt;

use admin::{AdminStatement, ExplainStatement, ResourceGroupStatement, SrsStatement};
use ddl::{
    AlterTableStatement,
    CreateIndexStatement,
    CreateTableStatement,
    DropIndexStatement,
    TableMaintenanceStatement,
};
use dml::{CallStatement, DeleteStatement, InsertStatement, SelectStatement, UpdateStatement};
use set::SetStatement;
use show::ShowStatement;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ident {
    pub value: String,
    /// Written with backticks.
    pub quoted: bool,
}

impl Ident {
    pub fn new(value: impl Into<String>) -> Self {
        Ident {
            value: value.into(),
            quoted: false,
        }
    }

    pub fn quoted(value: impl Into<String>) -> Self {
        Ident {
            value: value.into(),
            quoted: true,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }
}

impl From<&str> for Ident {
    fn from(value: &str) -> Self {
        Ident::new(value)
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.quoted {
            write!(f, "`{}`", self.value)
        } else {
            write!(f, "{}", self.value)
        }
    }
}

/// A possibly qualified table name.
///
/// `[<db>.]<table>`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableIdent {
    pub db: Option<Ident>,
    pub table: Ident,
}

impl TableIdent {
    pub fn new(table: impl Into<String>) -> Self {
        TableIdent {
            db: None,
            table: Ident::new(table),
        }
    }

    pub fn qualified(db: impl Into<String>, table: impl Into<String>) -> Self {
        TableIdent {
            db: Some(Ident::new(db)),
            table: Ident::new(table),
        }
    }
}

impl fmt::Display for TableIdent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.db {
            Some(db) => write!(f, "{db}.{}", self.table),
            None => write!(f, "{}", self.table),
        }
    }
}

/// A column, optionally qualified by table (and database).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    pub qualifier: Option<TableIdent>,
    pub column: Ident,
}

impl ColumnRef {
    pub fn new(column: impl Into<String>) -> Self {
        ColumnRef {
            qualifier: None,
            column: Ident::new(column),
        }
    }

    pub fn qualified(table: impl Into<String>, column: impl Into<String>) -> Self {
        ColumnRef {
            qualifier: Some(TableIdent::new(table)),
            column: Ident::new(column),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// SELECT and DO.
    Select(SelectStatement),
    /// INSERT and REPLACE.
    Insert(InsertStatement),
    Update(UpdateStatement),
    Delete(DeleteStatement),
    Call(CallStatement),
    CreateTable(Box<CreateTableStatement>),
    AlterTable(Box<AlterTableStatement>),
    CreateIndex(CreateIndexStatement),
    DropIndex(DropIndexStatement),
    /// ANALYZE, CHECK, OPTIMIZE, REPAIR and TRUNCATE TABLE.
    TableMaintenance(TableMaintenanceStatement),
    Set(SetStatement),
    Show(ShowStatement),
    Explain(Box<ExplainStatement>),
    Admin(AdminStatement),
    ResourceGroup(ResourceGroupStatement),
    Srs(SrsStatement),
}
