use crate::ast::from::TableReference;
use crate::ast::{Ident, TableIdent};
use crate::context::query_block::UnitRef;
use crate::expr::Expr;

/// A full query expression.
///
/// `[WITH ...] <body> [ORDER BY ...] [LIMIT ...] [FOR UPDATE ...]`
#[derive(Debug, Clone, PartialEq)]
pub struct QueryExpression {
    pub with: Option<WithClause>,
    pub body: QueryBody,
    pub order_by: Option<Vec<OrderItem>>,
    pub limit: Option<LimitClause>,
    pub locking: Option<Vec<LockingClause>>,
}

impl QueryExpression {
    pub fn new(body: QueryBody) -> Self {
        QueryExpression {
            with: None,
            body,
            order_by: None,
            limit: None,
            locking: None,
        }
    }

    pub fn from_spec(spec: QuerySpecification) -> Self {
        Self::new(QueryBody::Specification(Box::new(spec)))
    }

    pub fn values(rows: Vec<Vec<Expr>>) -> Self {
        Self::new(QueryBody::Values(TableValueConstructor { rows }))
    }

    pub fn with_order_by(mut self, order_by: Vec<OrderItem>) -> Self {
        self.order_by = Some(order_by);
        self
    }

    pub fn with_limit(mut self, limit: LimitClause) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_locking(mut self, locking: Vec<LockingClause>) -> Self {
        self.locking = Some(locking);
        self
    }

    pub fn is_union(&self) -> bool {
        self.body.is_union()
    }

    /// If this is a bare `VALUES ROW(...), ...` with nothing attached.
    pub fn is_table_value_constructor(&self) -> bool {
        self.with.is_none()
            && self.order_by.is_none()
            && self.limit.is_none()
            && matches!(self.body, QueryBody::Values(_))
    }

    /// If any query block of this expression (not counting subqueries) has an
    /// INTO clause.
    pub fn has_into_clause(&self) -> bool {
        self.body.has_into_clause()
    }

    /// If the INTO clause of this expression is written after everything it
    /// applies to.
    pub fn has_trailing_into_clause(&self) -> bool {
        self.body.has_trailing_into_clause() && self.order_by.is_none() && self.limit.is_none()
    }

    /// If ORDER BY and LIMIT given alongside this expression can be handled
    /// by its body directly.
    pub fn can_absorb_order_and_limit(&self, order: bool, limit: bool) -> bool {
        if self.body.is_union() {
            return false;
        }
        if self.order_by.is_none() && self.limit.is_none() {
            return self.body.can_absorb_order_and_limit(order, limit);
        }
        false
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryBody {
    Specification(Box<QuerySpecification>),
    /// `VALUES ROW(...), ROW(...)`
    Values(TableValueConstructor),
    /// `<left> UNION [ALL|DISTINCT] <right>`
    Union(Box<UnionNode>),
    /// A parenthesized query expression.
    Nested(Box<QueryExpression>),
}

impl QueryBody {
    pub fn is_union(&self) -> bool {
        match self {
            QueryBody::Union(_) => true,
            QueryBody::Nested(q) => q.is_union(),
            _ => false,
        }
    }

    pub fn has_into_clause(&self) -> bool {
        match self {
            QueryBody::Specification(spec) => spec.into.is_some(),
            QueryBody::Values(_) => false,
            QueryBody::Union(u) => u.left.has_into_clause() || u.right.has_into_clause(),
            QueryBody::Nested(q) => q.has_into_clause(),
        }
    }

    pub fn has_trailing_into_clause(&self) -> bool {
        match self {
            QueryBody::Specification(spec) => spec.into.as_ref().is_some_and(|i| i.trailing),
            QueryBody::Values(_) => false,
            QueryBody::Union(u) => u.right.has_trailing_into_clause(),
            QueryBody::Nested(q) => q.has_trailing_into_clause(),
        }
    }

    pub fn can_absorb_order_and_limit(&self, order: bool, limit: bool) -> bool {
        match self {
            QueryBody::Specification(_) | QueryBody::Values(_) => true,
            QueryBody::Union(_) => false,
            QueryBody::Nested(q) => q.can_absorb_order_and_limit(order, limit),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnionNode {
    pub left: QueryBody,
    pub distinct: bool,
    pub right: QueryBody,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TableValueConstructor {
    pub rows: Vec<Vec<Expr>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SelectOptions {
    pub distinct: bool,
    pub high_priority: bool,
    pub straight_join: bool,
    pub sql_small_result: bool,
    pub sql_big_result: bool,
    pub sql_buffer_result: bool,
    pub sql_calc_found_rows: bool,
    pub sql_no_cache: bool,
}

/// A single SELECT.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QuerySpecification {
    pub options: SelectOptions,
    /// Projection list.
    pub items: Vec<SelectItem>,
    /// INTO, either before FROM or trailing.
    pub into: Option<IntoClause>,
    /// FROM, comma separated references.
    pub from: Vec<TableReference>,
    pub where_cond: Option<Expr>,
    pub group_by: Option<GroupClause>,
    pub having: Option<Expr>,
    /// WINDOW
    pub windows: Vec<WindowDefinition>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectItem {
    /// `*` or `<table>.*`
    Wildcard(Option<TableIdent>),
    /// `<expr> [AS <ident>]`
    Expr { expr: Expr, alias: Option<Ident> },
}

impl SelectItem {
    pub fn expr(expr: Expr) -> Self {
        SelectItem::Expr { expr, alias: None }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IntoClause {
    pub destination: IntoDestination,
    /// Written after FROM/WHERE/etc instead of before FROM.
    pub trailing: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IntoDestination {
    Outfile {
        file_name: String,
        charset: Option<String>,
        fields_terminated_by: Option<String>,
        lines_terminated_by: Option<String>,
    },
    Dumpfile {
        file_name: String,
    },
    /// `INTO @a, local_var, ...`
    Variables(Vec<IntoVariable>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntoVariable {
    User(String),
    /// Stored program variable.
    Local(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderDirection {
    #[default]
    Unspecified,
    Asc,
    Desc,
    /// GROUP BY items, ordering is irrelevant.
    NotRelevant,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderItem {
    pub expr: Expr,
    pub direction: OrderDirection,
}

impl OrderItem {
    pub fn new(expr: Expr) -> Self {
        OrderItem {
            expr,
            direction: OrderDirection::Unspecified,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Olap {
    #[default]
    None,
    Rollup,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupClause {
    pub items: Vec<OrderItem>,
    /// `WITH ROLLUP`
    pub olap: Olap,
}

/// `LIMIT <limit> [OFFSET <offset>]` or `LIMIT <offset>, <limit>`
#[derive(Debug, Clone, PartialEq)]
pub struct LimitClause {
    pub limit: Expr,
    pub offset: Option<Expr>,
    /// Written as `LIMIT <offset>, <limit>`.
    pub offset_first: bool,
}

impl LimitClause {
    pub fn new(limit: Expr) -> Self {
        LimitClause {
            limit,
            offset: None,
            offset_first: false,
        }
    }
}

/// `<name> AS (<spec>)` in the WINDOW clause.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowDefinition {
    pub name: Ident,
    pub spec: WindowSpec,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct WindowSpec {
    /// Window this one inherits from.
    pub base: Option<Ident>,
    pub partition_by: Vec<Expr>,
    pub order_by: Vec<OrderItem>,
    pub frame: Option<WindowFrame>,
}

impl WindowSpec {
    pub fn exprs(&self) -> Vec<&Expr> {
        let mut exprs: Vec<&Expr> = self.partition_by.iter().collect();
        exprs.extend(self.order_by.iter().map(|o| &o.expr));
        if let Some(frame) = &self.frame {
            exprs.extend(frame.start.expr());
            if let Some(end) = &frame.end {
                exprs.extend(end.expr());
            }
        }
        exprs
    }

    pub fn exprs_mut(&mut self) -> Vec<&mut Expr> {
        let mut exprs: Vec<&mut Expr> = self.partition_by.iter_mut().collect();
        exprs.extend(self.order_by.iter_mut().map(|o| &mut o.expr));
        if let Some(frame) = &mut self.frame {
            exprs.extend(frame.start.expr_mut());
            if let Some(end) = &mut frame.end {
                exprs.extend(end.expr_mut());
            }
        }
        exprs
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameUnits {
    Rows,
    Range,
    Groups,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WindowFrame {
    pub units: FrameUnits,
    pub start: FrameBound,
    pub end: Option<FrameBound>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FrameBound {
    UnboundedPreceding,
    Preceding(Expr),
    CurrentRow,
    Following(Expr),
    UnboundedFollowing,
}

impl FrameBound {
    fn expr(&self) -> Option<&Expr> {
        match self {
            FrameBound::Preceding(e) | FrameBound::Following(e) => Some(e),
            _ => None,
        }
    }

    fn expr_mut(&mut self) -> Option<&mut Expr> {
        match self {
            FrameBound::Preceding(e) | FrameBound::Following(e) => Some(e),
            _ => None,
        }
    }
}

/// `WITH [RECURSIVE] <cte>, ...`
#[derive(Debug, Clone, PartialEq)]
pub struct WithClause {
    pub recursive: bool,
    pub ctes: Vec<CommonTableExpr>,
}

/// `<name> [(<columns>)] AS (<query>)`
#[derive(Debug, Clone, PartialEq)]
pub struct CommonTableExpr {
    pub name: Ident,
    pub columns: Vec<Ident>,
    pub query: QueryExpression,
}

/// A parenthesized query used as an expression or table.
#[derive(Debug, Clone, PartialEq)]
pub struct Subquery {
    pub query: QueryExpression,
    /// Unit created for this subquery once contextualized.
    pub resolved: Option<UnitRef>,
}

impl Subquery {
    pub fn new(query: QueryExpression) -> Self {
        Subquery {
            query,
            resolved: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockStrength {
    /// `FOR UPDATE`
    Update,
    /// `FOR SHARE` or `LOCK IN SHARE MODE`
    Share,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LockedRowAction {
    #[default]
    Wait,
    /// `SKIP LOCKED`
    Skip,
    /// `NOWAIT`
    Nowait,
}

/// `FOR UPDATE|SHARE [OF <tables>] [SKIP LOCKED|NOWAIT]`
#[derive(Debug, Clone, PartialEq)]
pub struct LockingClause {
    pub strength: LockStrength,
    pub action: LockedRowAction,
    /// Empty applies the lock to every table in the query block.
    pub tables: Vec<TableIdent>,
}

impl LockingClause {
    pub fn new(strength: LockStrength) -> Self {
        LockingClause {
            strength,
            action: LockedRowAction::Wait,
            tables: Vec::new(),
        }
    }
}
