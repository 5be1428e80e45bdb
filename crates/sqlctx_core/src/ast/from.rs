use crate::ast::query::Subquery;
use crate::ast::{Ident, TableIdent};
use crate::expr::Expr;
use crate::resolver::table_list::TableRef;

/// One entry in a FROM clause.
#[derive(Debug, Clone, PartialEq)]
pub enum TableReference {
    Table(FromBaseTable),
    Derived(FromDerived),
    Function(FromTableFunction),
    Join(Box<JoinedTable>),
    /// A joined table in parentheses.
    ///
    /// `(<left> JOIN <right> ...)`
    Nested(Box<NestedJoin>),
    /// Comma separated references in parentheses.
    ///
    /// `(<ref>, <ref>, ...)`
    ParenList(FromParenList),
}

impl TableReference {
    /// Table reference this node resolved to.
    pub fn value(&self) -> Option<TableRef> {
        match self {
            TableReference::Table(t) => t.value,
            TableReference::Derived(t) => t.value,
            TableReference::Function(t) => t.value,
            TableReference::Join(t) => t.value,
            TableReference::Nested(t) => t.value,
            TableReference::ParenList(t) => t.value,
        }
    }

    pub fn table(name: &str) -> Self {
        TableReference::Table(FromBaseTable::new(TableIdent::new(name)))
    }

    pub fn table_as(name: &str, alias: &str) -> Self {
        TableReference::Table(FromBaseTable::new(TableIdent::new(name)).with_alias(alias))
    }

    pub fn join(
        left: TableReference,
        join_type: JoinType,
        right: TableReference,
        condition: JoinCondition,
    ) -> Self {
        TableReference::Join(Box::new(JoinedTable::new(left, join_type, right, condition)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexHintKind {
    Use,
    Force,
    Ignore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexHintScope {
    #[default]
    Any,
    Join,
    OrderBy,
    GroupBy,
}

/// `USE|FORCE|IGNORE INDEX [FOR JOIN|ORDER BY|GROUP BY] (<names>)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexHint {
    pub kind: IndexHintKind,
    pub scope: IndexHintScope,
    pub names: Vec<Ident>,
}

/// `<table> [PARTITION (...)] [AS <alias>] [<index hints>]`
#[derive(Debug, Clone, PartialEq)]
pub struct FromBaseTable {
    pub name: TableIdent,
    pub alias: Option<Ident>,
    pub partitions: Vec<Ident>,
    pub index_hints: Vec<IndexHint>,
    pub value: Option<TableRef>,
}

impl FromBaseTable {
    pub fn new(name: TableIdent) -> Self {
        FromBaseTable {
            name,
            alias: None,
            partitions: Vec::new(),
            index_hints: Vec::new(),
            value: None,
        }
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias = Some(Ident::new(alias));
        self
    }
}

/// `[LATERAL] (<query>) [AS] <alias> [(<columns>)]`
#[derive(Debug, Clone, PartialEq)]
pub struct FromDerived {
    pub lateral: bool,
    pub subquery: Subquery,
    pub alias: Option<Ident>,
    pub columns: Vec<Ident>,
    pub value: Option<TableRef>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableFunction {
    /// `JSON_TABLE(<expr>, <path> COLUMNS (...))`
    JsonTable {
        expr: Expr,
        path: Expr,
        columns: Vec<JsonTableColumn>,
    },
    /// A sequence generating function taking an upper bound.
    Sequence { upper_bound: Expr },
}

impl TableFunction {
    pub fn name(&self) -> &'static str {
        match self {
            TableFunction::JsonTable { .. } => "json_table",
            TableFunction::Sequence { .. } => "sequence_table",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum JsonTableColumn {
    /// `<name> FOR ORDINALITY`
    Ordinality { name: Ident },
    /// `<name> <type> PATH <path> [DEFAULT ... ON EMPTY] [DEFAULT ... ON ERROR]`
    Path {
        name: Ident,
        data_type: String,
        charset: Option<String>,
        collation: Option<String>,
        path: Expr,
        default_on_empty: Option<Expr>,
        default_on_error: Option<Expr>,
    },
    /// `NESTED PATH <path> COLUMNS (...)`
    Nested {
        path: Expr,
        columns: Vec<JsonTableColumn>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FromTableFunction {
    pub function: TableFunction,
    pub alias: Ident,
    pub value: Option<TableRef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    /// `[INNER] JOIN`
    Inner,
    /// `STRAIGHT_JOIN`
    Straight,
    /// `CROSS JOIN`
    Cross,
    Left,
    Right,
    NaturalInner,
    NaturalLeft,
    NaturalRight,
}

impl JoinType {
    pub fn is_natural(&self) -> bool {
        matches!(
            self,
            JoinType::NaturalInner | JoinType::NaturalLeft | JoinType::NaturalRight
        )
    }

    pub fn is_left(&self) -> bool {
        matches!(self, JoinType::Left | JoinType::NaturalLeft)
    }

    pub fn is_right(&self) -> bool {
        matches!(self, JoinType::Right | JoinType::NaturalRight)
    }

    /// The LEFT variant of a RIGHT join type.
    pub fn to_left(self) -> Self {
        match self {
            JoinType::Right => JoinType::Left,
            JoinType::NaturalRight => JoinType::NaturalLeft,
            other => other,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum JoinCondition {
    None,
    /// `ON <expr>`
    On(Expr),
    /// `USING (<columns>)`, also used for NATURAL joins with an empty list.
    Using(Vec<Ident>),
}

/// `<left> <join type> <right> [<condition>]`
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedTable {
    pub left: TableReference,
    pub join_type: JoinType,
    pub right: TableReference,
    pub condition: JoinCondition,
    /// Resolved leaf operands (left, right) after RIGHT to LEFT rewriting.
    pub operands: Option<(TableRef, TableRef)>,
    /// Join nest produced for this join.
    pub value: Option<TableRef>,
}

impl JoinedTable {
    pub fn new(
        left: TableReference,
        join_type: JoinType,
        right: TableReference,
        condition: JoinCondition,
    ) -> Self {
        JoinedTable {
            left,
            join_type,
            right,
            condition,
            operands: None,
            value: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NestedJoin {
    pub join: JoinedTable,
    pub value: Option<TableRef>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FromParenList {
    pub references: Vec<TableReference>,
    pub value: Option<TableRef>,
}
