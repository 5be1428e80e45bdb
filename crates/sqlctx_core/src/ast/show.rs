use crate::ast::query::LimitClause;
use crate::ast::set::OptionType;
use crate::ast::{Ident, TableIdent};
use crate::expr::Expr;

/// `[LIKE '<pattern>' | WHERE <expr>]`
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ShowFilter {
    #[default]
    None,
    Like(String),
    Where(Expr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShowModifier {
    #[default]
    Standard,
    /// `SHOW FULL ...`
    Full,
    /// `SHOW EXTENDED ...`
    Extended,
    /// `SHOW EXTENDED FULL ...`
    ExtendedFull,
}

impl ShowModifier {
    pub fn is_full(&self) -> bool {
        matches!(self, ShowModifier::Full | ShowModifier::ExtendedFull)
    }

    pub fn is_extended(&self) -> bool {
        matches!(self, ShowModifier::Extended | ShowModifier::ExtendedFull)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ShowStatement {
    Databases {
        filter: ShowFilter,
    },
    /// `SHOW [FULL] TABLES [FROM <db>]`
    Tables {
        modifier: ShowModifier,
        db: Option<Ident>,
        filter: ShowFilter,
    },
    TableStatus {
        db: Option<Ident>,
        filter: ShowFilter,
    },
    /// `SHOW [EXTENDED] [FULL] COLUMNS FROM <table>`
    Columns {
        modifier: ShowModifier,
        table: TableIdent,
        filter: ShowFilter,
    },
    /// `SHOW [EXTENDED] INDEX FROM <table> [WHERE <expr>]`
    Index {
        extended: bool,
        table: TableIdent,
        filter: Option<Expr>,
    },
    Status {
        scope: OptionType,
        filter: ShowFilter,
    },
    Variables {
        scope: OptionType,
        filter: ShowFilter,
    },
    Processlist {
        full: bool,
    },
    Engines,
    Charset {
        filter: ShowFilter,
    },
    Collation {
        filter: ShowFilter,
    },
    Triggers {
        full: bool,
        db: Option<Ident>,
        filter: ShowFilter,
    },
    Events {
        db: Option<Ident>,
        filter: ShowFilter,
    },
    OpenTables {
        db: Option<Ident>,
        filter: ShowFilter,
    },
    Errors {
        limit: Option<LimitClause>,
    },
    Warnings {
        limit: Option<LimitClause>,
    },
    /// `SHOW COUNT(*) ERRORS`
    CountErrors,
    /// `SHOW COUNT(*) WARNINGS`
    CountWarnings,
    CreateTable {
        table: TableIdent,
    },
    CreateView {
        view: TableIdent,
    },
    CreateDatabase {
        if_not_exists: bool,
        name: Ident,
    },
}
