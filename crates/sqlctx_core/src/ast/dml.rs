use crate::ast::from::TableReference;
use crate::ast::query::{IntoClause, OrderItem, QueryExpression, WithClause};
use crate::ast::{ColumnRef, Ident, TableIdent};
use crate::expr::Expr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectKind {
    Select,
    /// `DO <exprs>`, evaluated for side effects only.
    Do,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectStatement {
    pub kind: SelectKind,
    pub query: QueryExpression,
    /// INTO written after the whole query expression.
    pub into: Option<IntoClause>,
    /// Locking clauses follow the query expression at statement level.
    pub has_trailing_locking_clauses: bool,
}

impl SelectStatement {
    pub fn new(query: QueryExpression) -> Self {
        SelectStatement {
            kind: SelectKind::Select,
            query,
            into: None,
            has_trailing_locking_clauses: false,
        }
    }
}

/// Lock priority for INSERT/REPLACE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InsertLockOption {
    #[default]
    Default,
    LowPriority,
    Delayed,
    HighPriority,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InsertSource {
    /// `VALUES (...), (...)`
    Values(Vec<Vec<Expr>>),
    /// `SELECT ...` or `VALUES ROW(...), ...`
    Query(QueryExpression),
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement {
    /// REPLACE instead of INSERT.
    pub replace: bool,
    pub lock_option: InsertLockOption,
    pub ignore: bool,
    pub table: TableIdent,
    pub partitions: Vec<Ident>,
    pub columns: Vec<ColumnRef>,
    pub source: InsertSource,
    /// `AS <alias> [(<columns>)]` for the inserted row.
    pub values_alias: Option<Ident>,
    pub values_columns: Vec<Ident>,
    /// `ON DUPLICATE KEY UPDATE <col> = <expr>, ...`
    pub on_duplicate: Vec<(ColumnRef, Expr)>,
}

impl InsertStatement {
    pub fn new(table: TableIdent, source: InsertSource) -> Self {
        InsertStatement {
            replace: false,
            lock_option: InsertLockOption::Default,
            ignore: false,
            table,
            partitions: Vec::new(),
            columns: Vec::new(),
            source,
            values_alias: None,
            values_columns: Vec::new(),
            on_duplicate: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStatement {
    pub with: Option<WithClause>,
    pub low_priority: bool,
    pub ignore: bool,
    pub tables: Vec<TableReference>,
    pub assignments: Vec<(ColumnRef, Expr)>,
    pub where_cond: Option<Expr>,
    pub order_by: Option<Vec<OrderItem>>,
    pub limit: Option<Expr>,
}

impl UpdateStatement {
    pub fn new(tables: Vec<TableReference>, assignments: Vec<(ColumnRef, Expr)>) -> Self {
        UpdateStatement {
            with: None,
            low_priority: false,
            ignore: false,
            tables,
            assignments,
            where_cond: None,
            order_by: None,
            limit: None,
        }
    }
}

/// A table to delete from.
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteTarget {
    pub name: TableIdent,
    pub alias: Option<Ident>,
}

impl DeleteTarget {
    pub fn new(name: TableIdent) -> Self {
        DeleteTarget { name, alias: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeleteOptions {
    pub low_priority: bool,
    pub quick: bool,
    pub ignore: bool,
}

/// DELETE in single and multi-table form.
///
/// `DELETE FROM t ...` has one target and no `from`.
/// `DELETE t1, t2 FROM <refs>` and `DELETE FROM t1, t2 USING <refs>` have
/// several targets matched against `from`.
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteStatement {
    pub with: Option<WithClause>,
    pub options: DeleteOptions,
    pub multi_table: bool,
    pub targets: Vec<DeleteTarget>,
    pub partitions: Vec<Ident>,
    pub from: Vec<TableReference>,
    pub where_cond: Option<Expr>,
    pub order_by: Option<Vec<OrderItem>>,
    pub limit: Option<Expr>,
}

impl DeleteStatement {
    pub fn single(target: DeleteTarget) -> Self {
        DeleteStatement {
            with: None,
            options: DeleteOptions::default(),
            multi_table: false,
            targets: vec![target],
            partitions: Vec::new(),
            from: Vec::new(),
            where_cond: None,
            order_by: None,
            limit: None,
        }
    }

    pub fn multi(targets: Vec<DeleteTarget>, from: Vec<TableReference>) -> Self {
        DeleteStatement {
            with: None,
            options: DeleteOptions::default(),
            multi_table: true,
            targets,
            partitions: Vec::new(),
            from,
            where_cond: None,
            order_by: None,
            limit: None,
        }
    }
}

/// `CALL <proc>([<args>])`
#[derive(Debug, Clone, PartialEq)]
pub struct CallStatement {
    pub procedure: TableIdent,
    pub args: Option<Vec<Expr>>,
}
