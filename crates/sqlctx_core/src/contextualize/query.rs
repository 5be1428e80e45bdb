use sqlctx_error::{DbError, ErrorCode, Result, not_implemented};
use tracing::{debug, trace};

use super::{Contextualize, contextualize_all};
use crate::ast::query::{
    GroupClause,
    IntoClause,
    IntoDestination,
    IntoVariable,
    LimitClause,
    LockedRowAction,
    LockingClause,
    Olap,
    OrderDirection,
    OrderItem,
    QueryBody,
    QueryExpression,
    QuerySpecification,
    SelectItem,
    TableValueConstructor,
    UnionNode,
    WindowDefinition,
    WithClause,
};
use crate::context::StatementContext;
use crate::context::lock::{LockDescriptor, LockRequest, LockType, MdlType, mdl_type_for_dml};
use crate::context::query_block::{Linkage, ParsingPlace};
use crate::context::sql_command::SqlCommand;
use crate::expr::{Expr, WindowRef};
use crate::resolver::cte::{CteDefinition, WithList};

impl Contextualize for QueryExpression {
    fn contextualize(&mut self, ctx: &mut StatementContext<'_>) -> Result<()> {
        if let Some(with) = &mut self.with {
            with.contextualize(ctx)?;
        }
        self.body.contextualize(ctx)?;
        self.contextualize_order_and_limit(ctx)?;
        if let Some(locking) = &mut self.locking {
            contextualize_all(locking, ctx)?;
        }
        Ok(())
    }
}

impl QueryExpression {
    /// ORDER BY and LIMIT go to the body's block when it can take them, and
    /// to the unit's global options block otherwise.
    fn contextualize_order_and_limit(&mut self, ctx: &mut StatementContext<'_>) -> Result<()> {
        if self.order_by.is_none() && self.limit.is_none() {
            return Ok(());
        }

        if self
            .body
            .can_absorb_order_and_limit(self.order_by.is_some(), self.limit.is_some())
        {
            return contextualize_order_and_limit(&mut self.order_by, &mut self.limit, ctx);
        }

        let unit = ctx.current_unit()?;
        if let Some(fake) = ctx.get_unit(unit)?.fake_block {
            if ctx.get_block(fake)?.has_order_or_limit() {
                not_implemented!(
                    "parenthesized query expression with more than one external level of ORDER/LIMIT operations"
                );
            }
        }

        let first = ctx.get_unit(unit)?.first_block();
        let outer_scope = match first {
            Some(first) => ctx.get_block(first)?.outer_resolution,
            None => None,
        };
        let fake = {
            let mut guard = ctx.push_resolution(outer_scope);
            guard.fake_block(unit)?
        };
        debug!(%unit, %fake, "ORDER/LIMIT on global options block");

        let mut guard = ctx.enter_select(fake).and_resolution(Some(fake));
        debug_assert_eq!(ParsingPlace::None, guard.parsing_place());
        contextualize_order_and_limit(&mut self.order_by, &mut self.limit, &mut guard)
    }
}

fn contextualize_order_and_limit(
    order_by: &mut Option<Vec<OrderItem>>,
    limit: &mut Option<LimitClause>,
    ctx: &mut StatementContext<'_>,
) -> Result<()> {
    if let Some(order_by) = order_by {
        contextualize_order_by(order_by, ctx)?;
    }
    if let Some(limit) = limit {
        limit.contextualize(ctx)?;
    }
    Ok(())
}

/// `ORDER BY <items>` of the current block.
pub(crate) fn contextualize_order_by(
    items: &mut [OrderItem],
    ctx: &mut StatementContext<'_>,
) -> Result<()> {
    let mut guard = ctx.enter_place(ParsingPlace::OrderBy);
    for item in items.iter_mut() {
        guard.attach_in_place(&mut item.expr)?;
    }
    guard.current_block_mut()?.order_count = items.len();
    Ok(())
}

impl Contextualize for QueryBody {
    fn contextualize(&mut self, ctx: &mut StatementContext<'_>) -> Result<()> {
        match self {
            QueryBody::Specification(spec) => spec.contextualize(ctx),
            QueryBody::Values(values) => values.contextualize(ctx),
            QueryBody::Union(union) => union.contextualize(&mut *ctx.enter_nesting()?),
            QueryBody::Nested(query) => query.contextualize(&mut *ctx.enter_nesting()?),
        }
    }
}

impl Contextualize for UnionNode {
    /// Leaves the right hand block current.
    fn contextualize(&mut self, ctx: &mut StatementContext<'_>) -> Result<()> {
        self.left.contextualize(ctx)?;

        if self.right.is_union() {
            not_implemented!("nesting of unions at the right-hand side");
        }

        let unit = ctx.current_unit()?;
        let outer_scope = ctx.current_block()?.outer_resolution;
        let block = {
            let mut guard = ctx.push_resolution(outer_scope);
            guard.new_block(unit, Linkage::Union)?
        };
        if self.distinct {
            ctx.get_unit_mut(unit)?.union_distinct = true;
        }
        trace!(%unit, %block, distinct = self.distinct, "union branch");

        ctx.set_current_select(block);
        let mut guard = ctx.push_resolution(Some(block));
        self.right.contextualize(&mut guard)
    }
}

impl Contextualize for TableValueConstructor {
    fn contextualize(&mut self, ctx: &mut StatementContext<'_>) -> Result<()> {
        for row in self.rows.iter_mut() {
            ctx.attach_all(row)?;
        }
        let field_count = self.rows.first().map(|r| r.len()).unwrap_or(0);
        let block = ctx.current_block_mut()?;
        block.is_table_value_constructor = true;
        block.row_count = self.rows.len();
        block.field_count = field_count;
        Ok(())
    }
}

impl Contextualize for QuerySpecification {
    fn contextualize(&mut self, ctx: &mut StatementContext<'_>) -> Result<()> {
        {
            let mut guard = ctx.enter_place(ParsingPlace::SelectList);
            if self.options.high_priority {
                guard.set_lock_default(LockRequest::new(
                    LockType::ReadHighPriority,
                    MdlType::SharedRead,
                ));
            }
            guard.current_block_mut()?.options = self.options;

            for item in self.items.iter_mut() {
                if let SelectItem::Expr { expr, .. } = item {
                    guard.attach_in_place(expr)?;
                }
            }
            guard.current_block_mut()?.field_count = self.items.len();
        }

        if let Some(into) = &mut self.into {
            into.contextualize(ctx)?;
        }

        contextualize_all(&mut self.from, ctx)?;

        if self.where_cond.is_some() {
            let mut guard = ctx.enter_place(ParsingPlace::Where);
            guard.attach_opt(&mut self.where_cond)?;
            guard.current_block_mut()?.has_where = true;
        }

        if let Some(group_by) = &mut self.group_by {
            group_by.contextualize(ctx)?;
        }

        if self.having.is_some() {
            let mut guard = ctx.enter_place(ParsingPlace::Having);
            guard.attach_opt(&mut self.having)?;
            guard.current_block_mut()?.has_having = true;
        }

        let names = contextualize_windows(&mut self.windows, ctx)?;
        for item in &self.items {
            if let SelectItem::Expr { expr, .. } = item {
                check_window_refs(expr, &names)?;
            }
        }
        Ok(())
    }
}

/// Window clause, resolved as part of the select list.
///
/// Returns the names defined by the clause.
fn contextualize_windows(
    windows: &mut [WindowDefinition],
    ctx: &mut StatementContext<'_>,
) -> Result<Vec<String>> {
    let mut names: Vec<String> = Vec::with_capacity(windows.len());
    for window in windows.iter() {
        let name = window.name.value.clone();
        if names.iter().any(|n| n.eq_ignore_ascii_case(&name)) {
            return Err(DbError::coded(ErrorCode::WindowDuplicateName, [name]));
        }
        names.push(name);
    }

    let mut guard = ctx.enter_place(ParsingPlace::SelectList);
    for window in windows.iter_mut() {
        if let Some(base) = &window.spec.base {
            if !names.iter().any(|n| n.eq_ignore_ascii_case(base.as_str())) {
                return Err(DbError::coded(
                    ErrorCode::WindowNoSuchWindow,
                    [base.value.clone()],
                ));
            }
        }
        for expr in window.spec.exprs_mut() {
            guard.attach_in_place(expr)?;
        }
    }
    guard.current_block_mut()?.windows = names.clone();
    Ok(names)
}

/// Check window functions only name windows from the WINDOW clause.
fn check_window_refs(expr: &Expr, names: &[String]) -> Result<()> {
    if let Expr::WindowFunction { window, .. } = expr {
        let referenced = match window {
            WindowRef::Named(name) => Some(name),
            WindowRef::Inline(spec) => spec.base.as_ref(),
        };
        if let Some(name) = referenced {
            if !names.iter().any(|n| n.eq_ignore_ascii_case(name.as_str())) {
                return Err(DbError::coded(
                    ErrorCode::WindowNoSuchWindow,
                    [name.value.clone()],
                ));
            }
        }
    }
    for child in expr.children() {
        check_window_refs(child, names)?;
    }
    Ok(())
}

impl Contextualize for GroupClause {
    fn contextualize(&mut self, ctx: &mut StatementContext<'_>) -> Result<()> {
        if self.olap == Olap::Rollup && ctx.current_block()?.linkage == Linkage::GlobalOptions {
            return Err(DbError::coded(
                ErrorCode::WrongUsage,
                ["WITH ROLLUP", "global union parameters"],
            ));
        }

        let mut guard = ctx.enter_place(ParsingPlace::GroupBy);
        for item in self.items.iter_mut() {
            guard.attach_in_place(&mut item.expr)?;
            item.direction = OrderDirection::NotRelevant;
        }
        let block = guard.current_block_mut()?;
        block.group_count = self.items.len();
        if self.olap == Olap::Rollup {
            block.olap = Olap::Rollup;
        }
        Ok(())
    }
}

impl Contextualize for LimitClause {
    fn contextualize(&mut self, ctx: &mut StatementContext<'_>) -> Result<()> {
        if self.offset_first {
            ctx.attach_opt(&mut self.offset)?;
        }
        ctx.attach_in_place(&mut self.limit)?;
        if !self.offset_first {
            ctx.attach_opt(&mut self.offset)?;
        }
        ctx.current_block_mut()?.has_limit = true;
        ctx.flags.unsafe_limit = true;
        Ok(())
    }
}

impl Contextualize for WithClause {
    fn contextualize(&mut self, ctx: &mut StatementContext<'_>) -> Result<()> {
        let config = ctx.config();
        let mut list = WithList::new(self.recursive);
        for cte in &self.ctes {
            list.push(CteDefinition {
                name: config.fold_name(cte.name.as_str()),
                columns: cte.columns.iter().map(|c| c.value.clone()).collect(),
                body: cte.query.clone(),
            })?;
        }
        let with_list = ctx.add_with_list(list);
        let unit = ctx.current_unit()?;
        ctx.get_unit_mut(unit)?.with_list = Some(with_list);
        debug!(%unit, %with_list, recursive = self.recursive, "WITH list");
        Ok(())
    }
}

impl Contextualize for LockingClause {
    fn contextualize(&mut self, ctx: &mut StatementContext<'_>) -> Result<()> {
        if ctx.flags.is_explain {
            return Ok(());
        }
        match self.action {
            LockedRowAction::Skip => ctx.flags.unsafe_skip_locked = true,
            LockedRowAction::Nowait => ctx.flags.unsafe_nowait = true,
            LockedRowAction::Wait => (),
        }
        ctx.flags.safe_to_cache_query = false;

        let lock = LockDescriptor::from_locking_clause(self.strength, self.action);
        let request = LockRequest {
            lock,
            mdl: mdl_type_for_dml(lock.lock_type),
        };
        let block = ctx.current_select();

        if self.tables.is_empty() {
            let tables = ctx.current_block()?.tables.clone();
            for table in tables {
                let entry = ctx.get_table_mut(table)?;
                if entry.is_derived() {
                    continue;
                }
                if entry.lock.lock_type != LockType::ReadDefault {
                    return Err(DbError::coded(
                        ErrorCode::DuplicateTableLock,
                        [entry.alias.clone()],
                    ));
                }
                entry.set_lock(request);
                entry.updating = lock.lock_type.is_write();
            }
            return Ok(());
        }

        for ident in &self.tables {
            let table = ctx
                .find_table_by_name(block, ident)?
                .ok_or_else(|| DbError::coded(ErrorCode::UnresolvedTableLock, [ident.to_string()]))?;
            let entry = ctx.get_table_mut(table)?;
            if entry.lock.lock_type != LockType::ReadDefault {
                return Err(DbError::coded(
                    ErrorCode::DuplicateTableLock,
                    [ident.to_string()],
                ));
            }
            entry.set_lock(request);
            entry.updating = lock.lock_type.is_write();
        }
        Ok(())
    }
}

impl Contextualize for IntoClause {
    fn contextualize(&mut self, ctx: &mut StatementContext<'_>) -> Result<()> {
        if !ctx.config().allow_select_into {
            if ctx.command == SqlCommand::ShowCreate {
                return Err(DbError::coded(ErrorCode::ViewSelectClause, ["INTO"]));
            }
            return Err(DbError::coded(ErrorCode::ParseError, ["INTO"]));
        }
        if ctx.into.is_some() {
            return Err(DbError::coded(ErrorCode::MultipleIntoClauses, [] as [String; 0]));
        }

        let is_explain = ctx.flags.is_explain;
        let records_result = match &self.destination {
            IntoDestination::Outfile { .. } => true,
            IntoDestination::Dumpfile { .. } => !is_explain,
            IntoDestination::Variables(vars) => {
                for var in vars {
                    if let IntoVariable::Local(name) = var {
                        if ctx.env().find_local_variable(name).is_none() {
                            return Err(DbError::coded(
                                ErrorCode::SpUndeclaredVar,
                                [name.clone()],
                            ));
                        }
                    }
                }
                !is_explain
            }
        };

        if records_result {
            ctx.current_block_mut()?.uncacheable = true;
            ctx.into = Some(self.destination.clone());
        }
        Ok(())
    }
}
