//! Per-statement context threaded through contextualization.
pub mod lock;
pub mod query_block;
pub mod sql_command;

use std::ops::{Deref, DerefMut};

use lock::LockRequest;
use query_block::{Linkage, ParsingPlace, QueryBlock, QueryBlockRef, QueryUnit, UnitRef};
use sql_command::{SqlCommand, StatementFlags};
use sqlctx_error::{DbError, ErrorCode, Result, Severity};
use tracing::{debug, trace};

use crate::ast::query::IntoDestination;
use crate::config::session::ContextConfig;
use crate::contextualize::Contextualize;
use crate::contextualize::set::SetVar;
use crate::diagnostics::DiagnosticsSink;
use crate::expr::{AttachScope, Expr, ExpressionHook};
use crate::resolver::cte::{WithList, WithListRef};
use crate::resolver::table_list::{TableList, TableRef};
use crate::session::Environment;

/// Lifecycle of a statement build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementState {
    Created,
    ChildrenContextualizing,
    Resolved,
    CommandBuilt,
    Failed,
}

impl StatementState {
    fn can_transition_to(&self, next: StatementState) -> bool {
        use StatementState::*;
        matches!(
            (self, next),
            (Created, ChildrenContextualizing)
                | (ChildrenContextualizing, Resolved)
                | (Resolved, CommandBuilt)
                | (Created | ChildrenContextualizing | Resolved, Failed)
        )
    }
}

/// Mutable state for building one statement.
///
/// Created with a single unit holding a single query block, which is the
/// current block. Everything reachable from the tree is registered here:
/// query blocks, units, table references and WITH lists are kept in arenas
/// and referred to by index.
pub struct StatementContext<'a> {
    env: &'a dyn Environment,
    hook: &'a dyn ExpressionHook,
    diagnostics: &'a mut dyn DiagnosticsSink,
    state: StatementState,
    pub command: SqlCommand,
    pub flags: StatementFlags,
    blocks: Vec<QueryBlock>,
    units: Vec<QueryUnit>,
    pub(crate) tables: TableList,
    pub(crate) with_lists: Vec<WithList>,
    /// Block new clauses are added to.
    select: QueryBlockRef,
    /// Scopes visible to column references, innermost last. `None` entries
    /// hide every enclosing scope.
    resolution_stack: Vec<Option<QueryBlockRef>>,
    /// Lock request given to new table references.
    lock_default: LockRequest,
    depth: usize,
    allows_subselect: bool,
    join_operands: Option<(TableRef, TableRef)>,
    /// Common table expressions whose bodies are being contextualized.
    pub(crate) cte_expansions: Vec<(WithListRef, usize)>,
    /// Resolved INTO destination of the statement.
    pub into: Option<IntoDestination>,
    /// Pending SET assignments.
    pub var_list: Vec<SetVar>,
}

impl std::fmt::Debug for StatementContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatementContext")
            .field("state", &self.state)
            .field("command", &self.command)
            .field("select", &self.select)
            .field("blocks", &self.blocks.len())
            .field("tables", &self.tables.len())
            .finish_non_exhaustive()
    }
}

impl<'a> StatementContext<'a> {
    pub fn new(
        env: &'a dyn Environment,
        hook: &'a dyn ExpressionHook,
        diagnostics: &'a mut dyn DiagnosticsSink,
    ) -> Self {
        let root_unit = UnitRef { unit_idx: 0 };
        let root = QueryBlockRef { block_idx: 0 };
        StatementContext {
            env,
            hook,
            diagnostics,
            state: StatementState::Created,
            command: SqlCommand::Empty,
            flags: StatementFlags::default(),
            blocks: vec![QueryBlock::new(root_unit, Linkage::Unspecified, None)],
            units: vec![QueryUnit {
                blocks: vec![root],
                fake_block: None,
                with_list: None,
                outer_block: None,
                union_distinct: false,
            }],
            tables: TableList::default(),
            with_lists: Vec::new(),
            select: root,
            resolution_stack: vec![Some(root)],
            lock_default: LockRequest::read(),
            depth: 0,
            allows_subselect: true,
            join_operands: None,
            cte_expansions: Vec::new(),
            into: None,
            var_list: Vec::new(),
        }
    }

    pub fn env(&self) -> &'a dyn Environment {
        self.env
    }

    pub fn config(&self) -> &'a ContextConfig {
        self.env.config()
    }

    pub fn state(&self) -> StatementState {
        self.state
    }

    pub fn transition(&mut self, next: StatementState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(DbError::new("Invalid statement state transition")
                .with_field("from", format!("{:?}", self.state))
                .with_field("to", format!("{next:?}")));
        }
        trace!(from = ?self.state, to = ?next, "statement state transition");
        self.state = next;
        Ok(())
    }

    /// Move to `Resolved`, checking every block left its clauses.
    pub fn mark_resolved(&mut self) -> Result<()> {
        if let Some(idx) = self
            .blocks
            .iter()
            .position(|b| b.parsing_place != ParsingPlace::None)
        {
            return Err(DbError::new("Parsing place not restored")
                .with_field("block", QueryBlockRef { block_idx: idx })
                .with_field("place", format!("{:?}", self.blocks[idx].parsing_place)));
        }
        self.transition(StatementState::Resolved)
    }

    /// Report a statement failure and move to `Failed`.
    ///
    /// Errors without a code are internal and are not reported to the sink.
    pub fn fail(&mut self, err: &DbError) {
        if let Some(code) = err.code() {
            self.diagnostics.report(Severity::Error, code, err.args());
        }
        debug!(%err, "statement failed");
        self.state = StatementState::Failed;
    }

    pub fn warn<I, S>(&mut self, code: ErrorCode, args: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        debug!(%code, ?args, "warning");
        self.diagnostics.report(Severity::Warning, code, &args);
    }

    pub fn current_select(&self) -> QueryBlockRef {
        self.select
    }

    /// Make `block` current without restoring the previous block later.
    pub fn set_current_select(&mut self, block: QueryBlockRef) {
        self.select = block;
    }

    pub fn current_unit(&self) -> Result<UnitRef> {
        Ok(self.get_block(self.select)?.unit)
    }

    pub fn current_block(&self) -> Result<&QueryBlock> {
        self.get_block(self.select)
    }

    pub fn current_block_mut(&mut self) -> Result<&mut QueryBlock> {
        self.get_block_mut(self.select)
    }

    pub fn get_block(&self, block: QueryBlockRef) -> Result<&QueryBlock> {
        self.blocks
            .get(block.block_idx)
            .ok_or_else(|| DbError::new("Missing query block").with_field("block", block))
    }

    pub fn get_block_mut(&mut self, block: QueryBlockRef) -> Result<&mut QueryBlock> {
        self.blocks
            .get_mut(block.block_idx)
            .ok_or_else(|| DbError::new("Missing query block").with_field("block", block))
    }

    pub fn get_unit(&self, unit: UnitRef) -> Result<&QueryUnit> {
        self.units
            .get(unit.unit_idx)
            .ok_or_else(|| DbError::new("Missing query unit").with_field("unit", unit))
    }

    pub fn get_unit_mut(&mut self, unit: UnitRef) -> Result<&mut QueryUnit> {
        self.units
            .get_mut(unit.unit_idx)
            .ok_or_else(|| DbError::new("Missing query unit").with_field("unit", unit))
    }

    /// Create a unit nested in `outer` with a first block of the given
    /// linkage.
    pub fn new_unit(
        &mut self,
        outer: Option<QueryBlockRef>,
        linkage: Linkage,
    ) -> Result<(UnitRef, QueryBlockRef)> {
        let unit = UnitRef {
            unit_idx: self.units.len(),
        };
        self.units.push(QueryUnit {
            blocks: Vec::new(),
            fake_block: None,
            with_list: None,
            outer_block: outer,
            union_distinct: false,
        });
        if let Some(outer) = outer {
            self.get_block_mut(outer)?.inner_units.push(unit);
        }
        let block = self.new_block(unit, linkage)?;
        debug!(%unit, %block, ?outer, "new query unit");
        Ok((unit, block))
    }

    /// Add a union branch to `unit`.
    pub fn new_block(&mut self, unit: UnitRef, linkage: Linkage) -> Result<QueryBlockRef> {
        let block = QueryBlockRef {
            block_idx: self.blocks.len(),
        };
        let outer_resolution = self.resolution_scope();
        self.get_unit_mut(unit)?.blocks.push(block);
        self.blocks
            .push(QueryBlock::new(unit, linkage, outer_resolution));
        Ok(block)
    }

    /// The block holding union level ORDER BY and LIMIT, created on first use.
    pub fn fake_block(&mut self, unit: UnitRef) -> Result<QueryBlockRef> {
        if let Some(block) = self.get_unit(unit)?.fake_block {
            return Ok(block);
        }
        let block = QueryBlockRef {
            block_idx: self.blocks.len(),
        };
        let outer_resolution = self.resolution_scope();
        self.get_unit_mut(unit)?.fake_block = Some(block);
        self.blocks
            .push(QueryBlock::new(unit, Linkage::GlobalOptions, outer_resolution));
        debug!(%unit, %block, "new fake query block");
        Ok(block)
    }

    /// Innermost scope visible to column references.
    pub fn resolution_scope(&self) -> Option<QueryBlockRef> {
        self.resolution_stack.last().copied().flatten()
    }

    pub fn lock_default(&self) -> LockRequest {
        self.lock_default
    }

    /// Change the lock request for new table references for the rest of the
    /// statement.
    pub fn set_lock_default(&mut self, request: LockRequest) {
        self.lock_default = request;
    }

    pub fn allows_subselect(&self) -> bool {
        self.allows_subselect
    }

    pub fn join_operands(&self) -> Option<(TableRef, TableRef)> {
        self.join_operands
    }

    pub fn parsing_place(&self) -> ParsingPlace {
        self.blocks
            .get(self.select.block_idx)
            .map(|b| b.parsing_place)
            .unwrap_or_default()
    }

    pub fn attach_scope(&self) -> AttachScope {
        AttachScope {
            block: self.select,
            place: self.parsing_place(),
            resolution: self.resolution_scope(),
            allows_subselect: self.allows_subselect,
            join_operands: self.join_operands,
        }
    }

    /// Contextualize subqueries inside `expr`, then hand it to the expression
    /// hook.
    pub fn attach(&mut self, mut expr: Expr) -> Result<Expr> {
        self.contextualize_subqueries(&mut expr)?;
        let hook = self.hook;
        let scope = self.attach_scope();
        hook.attach(expr, &scope)
    }

    /// Attach an expression in place.
    pub fn attach_in_place(&mut self, expr: &mut Expr) -> Result<()> {
        let taken = std::mem::take(expr);
        *expr = self.attach(taken)?;
        Ok(())
    }

    pub fn attach_opt(&mut self, expr: &mut Option<Expr>) -> Result<()> {
        if let Some(expr) = expr {
            self.attach_in_place(expr)?;
        }
        Ok(())
    }

    pub fn attach_all(&mut self, exprs: &mut [Expr]) -> Result<()> {
        for expr in exprs {
            self.attach_in_place(expr)?;
        }
        Ok(())
    }

    fn contextualize_subqueries(&mut self, expr: &mut Expr) -> Result<()> {
        for subquery in expr.subqueries_mut() {
            subquery.contextualize(self)?;
        }
        for child in expr.children_mut() {
            self.contextualize_subqueries(child)?;
        }
        Ok(())
    }

    /// Set the parsing place of the current block until the guard drops.
    pub fn enter_place(&mut self, place: ParsingPlace) -> ContextGuard<'_, 'a> {
        let restore = self.apply(Change::Place(place));
        ContextGuard::new(self, restore)
    }

    /// Make `block` current until the guard drops.
    pub fn enter_select(&mut self, block: QueryBlockRef) -> ContextGuard<'_, 'a> {
        let restore = self.apply(Change::Select(block));
        ContextGuard::new(self, restore)
    }

    /// Push a name-resolution scope until the guard drops.
    pub fn push_resolution(&mut self, scope: Option<QueryBlockRef>) -> ContextGuard<'_, 'a> {
        let restore = self.apply(Change::Resolution(scope));
        ContextGuard::new(self, restore)
    }

    /// Go one query nesting level deeper.
    pub fn enter_nesting(&mut self) -> Result<ContextGuard<'_, 'a>> {
        let max = self.config().max_nesting_depth;
        if self.depth as u64 >= max {
            return Err(DbError::coded(
                ErrorCode::TooHighNestingLevel,
                [max.to_string()],
            ));
        }
        let restore = self.apply(Change::Nesting);
        Ok(ContextGuard::new(self, restore))
    }

    pub fn disallow_subselect(&mut self) -> ContextGuard<'_, 'a> {
        let restore = self.apply(Change::Subselect(false));
        ContextGuard::new(self, restore)
    }

    pub fn with_lock_default(&mut self, request: LockRequest) -> ContextGuard<'_, 'a> {
        let restore = self.apply(Change::LockDefault(request));
        ContextGuard::new(self, restore)
    }

    pub(crate) fn enter_cte_expansion(
        &mut self,
        with_list: WithListRef,
        index: usize,
    ) -> ContextGuard<'_, 'a> {
        let restore = self.apply(Change::CteExpansion(with_list, index));
        ContextGuard::new(self, restore)
    }

    fn apply(&mut self, change: Change) -> Restore {
        match change {
            Change::Place(place) => {
                let block = self.select;
                let previous = match self.blocks.get_mut(block.block_idx) {
                    Some(b) => std::mem::replace(&mut b.parsing_place, place),
                    None => ParsingPlace::None,
                };
                Restore::Place {
                    block,
                    previous,
                    entered: place,
                }
            }
            Change::Select(block) => Restore::Select(std::mem::replace(&mut self.select, block)),
            Change::Resolution(scope) => {
                let len = self.resolution_stack.len();
                self.resolution_stack.push(scope);
                Restore::Resolution(len)
            }
            Change::Nesting => {
                self.depth += 1;
                Restore::Nesting
            }
            Change::JoinOperands(operands) => Restore::JoinOperands(std::mem::replace(
                &mut self.join_operands,
                Some(operands),
            )),
            Change::Subselect(allowed) => {
                Restore::Subselect(std::mem::replace(&mut self.allows_subselect, allowed))
            }
            Change::LockDefault(request) => {
                Restore::LockDefault(std::mem::replace(&mut self.lock_default, request))
            }
            Change::CteExpansion(with_list, index) => {
                self.cte_expansions.push((with_list, index));
                Restore::CteExpansion
            }
        }
    }

    fn restore(&mut self, restore: Restore) {
        match restore {
            Restore::Place {
                block,
                previous,
                entered,
            } => {
                if let Some(b) = self.blocks.get_mut(block.block_idx) {
                    debug_assert_eq!(
                        entered, b.parsing_place,
                        "parsing place of {block} overwritten"
                    );
                    b.parsing_place = previous;
                }
            }
            Restore::Select(block) => self.select = block,
            Restore::Resolution(len) => {
                debug_assert_eq!(len + 1, self.resolution_stack.len());
                self.resolution_stack.truncate(len);
            }
            Restore::Nesting => self.depth -= 1,
            Restore::JoinOperands(operands) => self.join_operands = operands,
            Restore::Subselect(allowed) => self.allows_subselect = allowed,
            Restore::LockDefault(request) => self.lock_default = request,
            Restore::CteExpansion => {
                self.cte_expansions.pop();
            }
        }
    }

    /// Give up the context, keeping everything resolved so far.
    pub fn into_resolved(self) -> ResolvedContext {
        ResolvedContext {
            command: self.command,
            flags: self.flags,
            blocks: self.blocks,
            units: self.units,
            tables: self.tables,
            with_lists: self.with_lists,
            into: self.into,
            var_list: self.var_list,
        }
    }
}

enum Change {
    Place(ParsingPlace),
    Select(QueryBlockRef),
    Resolution(Option<QueryBlockRef>),
    Nesting,
    JoinOperands((TableRef, TableRef)),
    Subselect(bool),
    LockDefault(LockRequest),
    CteExpansion(WithListRef, usize),
}

#[derive(Debug)]
enum Restore {
    Place {
        block: QueryBlockRef,
        previous: ParsingPlace,
        entered: ParsingPlace,
    },
    Select(QueryBlockRef),
    Resolution(usize),
    Nesting,
    JoinOperands(Option<(TableRef, TableRef)>),
    Subselect(bool),
    LockDefault(LockRequest),
    CteExpansion,
}

/// Scoped change to a [`StatementContext`].
///
/// Derefs to the context. Every change made through the guard is undone in
/// reverse order when it drops, including on early return with `?`.
pub struct ContextGuard<'c, 'a> {
    ctx: &'c mut StatementContext<'a>,
    restores: Vec<Restore>,
}

impl<'c, 'a> ContextGuard<'c, 'a> {
    fn new(ctx: &'c mut StatementContext<'a>, restore: Restore) -> Self {
        ContextGuard {
            ctx,
            restores: vec![restore],
        }
    }

    fn and(mut self, change: Change) -> Self {
        let restore = self.ctx.apply(change);
        self.restores.push(restore);
        self
    }

    pub fn and_place(self, place: ParsingPlace) -> Self {
        self.and(Change::Place(place))
    }

    pub fn and_select(self, block: QueryBlockRef) -> Self {
        self.and(Change::Select(block))
    }

    pub fn and_resolution(self, scope: Option<QueryBlockRef>) -> Self {
        self.and(Change::Resolution(scope))
    }

    pub fn and_join_operands(self, left: TableRef, right: TableRef) -> Self {
        self.and(Change::JoinOperands((left, right)))
    }
}

impl<'a> Deref for ContextGuard<'_, 'a> {
    type Target = StatementContext<'a>;

    fn deref(&self) -> &Self::Target {
        self.ctx
    }
}

impl DerefMut for ContextGuard<'_, '_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.ctx
    }
}

impl Drop for ContextGuard<'_, '_> {
    fn drop(&mut self) {
        while let Some(restore) = self.restores.pop() {
            self.ctx.restore(restore);
        }
    }
}

/// Everything registered while building a statement.
#[derive(Debug)]
pub struct ResolvedContext {
    pub command: SqlCommand,
    pub flags: StatementFlags,
    pub blocks: Vec<QueryBlock>,
    pub units: Vec<QueryUnit>,
    pub tables: TableList,
    pub with_lists: Vec<WithList>,
    pub into: Option<IntoDestination>,
    pub var_list: Vec<SetVar>,
}

impl ResolvedContext {
    pub fn root_block(&self) -> QueryBlockRef {
        QueryBlockRef { block_idx: 0 }
    }

    pub fn get_block(&self, block: QueryBlockRef) -> Result<&QueryBlock> {
        self.blocks
            .get(block.block_idx)
            .ok_or_else(|| DbError::new("Missing query block").with_field("block", block))
    }

    pub fn get_unit(&self, unit: UnitRef) -> Result<&QueryUnit> {
        self.units
            .get(unit.unit_idx)
            .ok_or_else(|| DbError::new("Missing query unit").with_field("unit", unit))
    }
}
