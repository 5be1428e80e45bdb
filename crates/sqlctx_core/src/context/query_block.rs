use std::fmt;

use crate::ast::query::{Olap, SelectOptions};
use crate::resolver::cte::WithListRef;
use crate::resolver::table_list::TableRef;

/// Reference to a query block in the statement context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QueryBlockRef {
    pub block_idx: usize,
}

impl fmt::Display for QueryBlockRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BLOCK_{}", self.block_idx)
    }
}

/// Reference to a query expression unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UnitRef {
    pub unit_idx: usize,
}

impl fmt::Display for UnitRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UNIT_{}", self.unit_idx)
    }
}

/// Clause of a query block currently being contextualized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParsingPlace {
    #[default]
    None,
    SelectList,
    Where,
    GroupBy,
    Having,
    OrderBy,
    On,
    UpdateValue,
    InsertValues,
    InsertUpdate,
    Derived,
}

/// How a query block relates to its unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Linkage {
    #[default]
    Unspecified,
    /// Body of a derived table.
    Derived,
    /// Second or later branch of a union.
    Union,
    /// Block holding ORDER BY/LIMIT that apply to a whole union.
    GlobalOptions,
}

/// A single name-resolution scope.
#[derive(Debug)]
pub struct QueryBlock {
    pub unit: UnitRef,
    pub linkage: Linkage,
    pub parsing_place: ParsingPlace,
    pub options: SelectOptions,
    /// Leaf table references in FROM order.
    pub tables: Vec<TableRef>,
    /// Top level join list.
    pub join_list: Vec<TableRef>,
    /// Open parenthesized joins, innermost last.
    pub nest_stack: Vec<TableRef>,
    /// Scope visible to column references when this block was created.
    pub outer_resolution: Option<QueryBlockRef>,
    pub field_count: usize,
    pub has_where: bool,
    pub has_having: bool,
    pub group_count: usize,
    pub order_count: usize,
    pub has_limit: bool,
    pub olap: Olap,
    /// Names from the WINDOW clause.
    pub windows: Vec<String>,
    /// Units of subqueries directly contained in this block.
    pub inner_units: Vec<UnitRef>,
    /// Some RIGHT JOIN was rewritten to a LEFT JOIN.
    pub right_joins: bool,
    pub is_table_value_constructor: bool,
    /// Rows in a table value constructor.
    pub row_count: usize,
    pub uncacheable: bool,
}

impl QueryBlock {
    pub(crate) fn new(unit: UnitRef, linkage: Linkage, outer_resolution: Option<QueryBlockRef>) -> Self {
        QueryBlock {
            unit,
            linkage,
            parsing_place: ParsingPlace::None,
            options: SelectOptions::default(),
            tables: Vec::new(),
            join_list: Vec::new(),
            nest_stack: Vec::new(),
            outer_resolution,
            field_count: 0,
            has_where: false,
            has_having: false,
            group_count: 0,
            order_count: 0,
            has_limit: false,
            olap: Olap::None,
            windows: Vec::new(),
            inner_units: Vec::new(),
            right_joins: false,
            is_table_value_constructor: false,
            row_count: 0,
            uncacheable: false,
        }
    }

    pub fn has_order_or_limit(&self) -> bool {
        self.order_count > 0 || self.has_limit
    }
}

/// A query expression: one or more union branches plus an optional block
/// for union level ORDER BY and LIMIT.
#[derive(Debug)]
pub struct QueryUnit {
    pub blocks: Vec<QueryBlockRef>,
    pub fake_block: Option<QueryBlockRef>,
    pub with_list: Option<WithListRef>,
    /// Block containing this unit. None for the outermost unit.
    pub outer_block: Option<QueryBlockRef>,
    pub union_distinct: bool,
}

impl QueryUnit {
    pub fn is_union(&self) -> bool {
        self.blocks.len() > 1
    }

    pub fn first_block(&self) -> Option<QueryBlockRef> {
        self.blocks.first().copied()
    }
}
