//! INSERT, REPLACE, UPDATE, DELETE and CALL.
use sqlctx_error::{DbError, ErrorCode, Result};
use tracing::debug;

use super::Command;
use crate::ast::dml::{
    CallStatement,
    DeleteStatement,
    InsertLockOption,
    InsertSource,
    InsertStatement,
    UpdateStatement,
};
use crate::ast::query::{OrderItem, QueryBody, QueryExpression};
use crate::ast::{ColumnRef, TableIdent};
use crate::context::StatementContext;
use crate::context::lock::{LockRequest, LockType, MdlType, mdl_type_for_dml};
use crate::context::query_block::{ParsingPlace, QueryBlockRef};
use crate::context::sql_command::{Duplicates, SqlCommand};
use crate::contextualize::query::contextualize_order_by;
use crate::contextualize::{Contextualize, contextualize_all, contextualize_opt};
use crate::expr::{Expr, Literal};
use crate::resolver::check_ident_length;
use crate::resolver::table_list::{TableRef, TableSource, TableSpec};

/// Rows given to INSERT.
#[derive(Debug, Clone, PartialEq)]
pub enum InsertData {
    /// `VALUES (...), ...`, also `VALUES ROW(...), ...`.
    Rows(Vec<Vec<Expr>>),
    Query(Box<QueryExpression>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertCommand {
    pub replace: bool,
    pub table: TableRef,
    pub columns: Vec<Expr>,
    pub data: InsertData,
    /// Row alias for the inserted values, readable from ON DUPLICATE KEY
    /// UPDATE.
    pub values_table: Option<TableRef>,
    pub values_columns: Vec<String>,
    /// `ON DUPLICATE KEY UPDATE` assignments.
    pub update_list: Vec<(Expr, Expr)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateCommand {
    pub multi_table: bool,
    pub tables: Vec<TableRef>,
    pub assignments: Vec<(Expr, Expr)>,
    pub where_cond: Option<Expr>,
    pub order_by: Option<Vec<OrderItem>>,
    pub limit: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteCommand {
    pub multi_table: bool,
    /// Tables rows are deleted from. For multi-table DELETE each target is
    /// linked to its FROM list entry through `correspondent_table`.
    pub targets: Vec<TableRef>,
    pub where_cond: Option<Expr>,
    pub order_by: Option<Vec<OrderItem>>,
    pub limit: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallCommand {
    pub procedure: TableIdent,
    pub args: Option<Vec<Expr>>,
}

fn insert_lock_type(replace: bool, option: InsertLockOption) -> LockType {
    match (replace, option) {
        (false, InsertLockOption::Default) => LockType::WriteConcurrentDefault,
        (true, InsertLockOption::Default) => LockType::WriteDefault,
        (_, InsertLockOption::LowPriority) => LockType::WriteLowPriority,
        (_, InsertLockOption::Delayed) => LockType::WriteDefault,
        (_, InsertLockOption::HighPriority) => LockType::Write,
    }
}

/// Attach a column list in the current parsing place.
fn attach_columns(ctx: &mut StatementContext<'_>, columns: Vec<ColumnRef>) -> Result<Vec<Expr>> {
    columns
        .into_iter()
        .map(|column| ctx.attach(Expr::Column(column)))
        .collect()
}

fn attach_assignments(
    ctx: &mut StatementContext<'_>,
    assignments: Vec<(ColumnRef, Expr)>,
) -> Result<Vec<(Expr, Expr)>> {
    let mut attached = Vec::with_capacity(assignments.len());
    for (column, value) in assignments {
        let column = ctx.attach(Expr::Column(column))?;
        let value = ctx.attach(value)?;
        attached.push((column, value));
    }
    Ok(attached)
}

/// Contextualize the query feeding an INSERT or CREATE TABLE in the current
/// block, keeping the tables already registered in front of the ones the
/// query adds.
pub(crate) fn contextualize_source_query(
    ctx: &mut StatementContext<'_>,
    query: &mut QueryExpression,
) -> Result<()> {
    let block = ctx.current_select();
    let saved = std::mem::take(&mut ctx.get_block_mut(block)?.tables);
    query.contextualize(ctx)?;
    ctx.set_current_select(block);
    ctx.get_block_mut(block)?.tables.splice(0..0, saved);
    Ok(())
}

pub(crate) fn build_insert(ctx: &mut StatementContext<'_>, stmt: InsertStatement) -> Result<Command> {
    let InsertStatement {
        replace,
        lock_option,
        ignore,
        table,
        partitions,
        columns,
        source,
        values_alias,
        values_columns,
        on_duplicate,
    } = stmt;

    let source = match source {
        InsertSource::Query(query) if query.is_table_value_constructor() => match query.body {
            QueryBody::Values(values) => InsertSource::Values(values.rows),
            body => InsertSource::Query(QueryExpression { body, ..query }),
        },
        source => source,
    };
    let from_query = matches!(source, InsertSource::Query(_));

    if replace {
        ctx.command = if from_query {
            SqlCommand::ReplaceSelect
        } else {
            SqlCommand::Replace
        };
        ctx.flags.duplicates = Duplicates::Replace;
    } else {
        ctx.command = if from_query {
            SqlCommand::InsertSelect
        } else {
            SqlCommand::Insert
        };
        ctx.flags.duplicates = Duplicates::Error;
        ctx.flags.ignore = ignore;
    }

    let block = ctx.current_select();
    let mut spec = TableSpec::new(table.clone()).updating(true).base_only();
    spec.partitions = partitions;
    let target = ctx.add_table(spec)?;
    ctx.set_lock_for_tables(block, insert_lock_type(replace, lock_option))?;

    let columns = attach_columns(ctx, columns)?;

    let data = match source {
        InsertSource::Query(mut query) => {
            if query.has_into_clause() {
                return Err(DbError::coded(ErrorCode::MisplacedInto, [] as [String; 0]));
            }
            contextualize_source_query(ctx, &mut query)?;
            ctx.flags.bulk_insert_row_count = 0;
            InsertData::Query(Box::new(query))
        }
        InsertSource::Values(mut rows) => {
            {
                let mut guard = ctx.enter_place(ParsingPlace::InsertValues);
                for row in rows.iter_mut() {
                    guard.attach_all(row)?;
                }
            }
            ctx.flags.bulk_insert_row_count = rows.len();
            InsertData::Rows(rows)
        }
    };

    let values_columns: Vec<String> = values_columns.into_iter().map(|c| c.value).collect();
    let values_table = match &values_alias {
        Some(alias) => {
            if alias.value == table.table.value {
                return Err(DbError::coded(ErrorCode::NonUniqTable, [alias.value.clone()]));
            }
            Some(ctx.add_synthetic_table(
                alias.as_str(),
                TableSource::InsertValues,
                LockRequest::new(LockType::Read, MdlType::SharedRead),
                values_columns.clone(),
            )?)
        }
        None => None,
    };

    let mut update_list = Vec::new();
    if !on_duplicate.is_empty() {
        if replace {
            return Err(DbError::coded(
                ErrorCode::ParseError,
                ["ON DUPLICATE KEY UPDATE"],
            ));
        }
        ctx.flags.duplicates = Duplicates::Update;
        let entry = ctx.get_table_mut(target)?;
        if entry.lock.lock_type == LockType::WriteConcurrentDefault {
            entry.set_lock(LockRequest::dml(LockType::WriteDefault));
        }
        let mut guard = ctx.enter_place(ParsingPlace::InsertUpdate);
        update_list = attach_assignments(&mut guard, on_duplicate)?;
    }

    debug!(command = ?ctx.command, duplicates = ?ctx.flags.duplicates, "insert command");
    Ok(Command::Insert(InsertCommand {
        replace,
        table: target,
        columns,
        data,
        values_table,
        values_columns,
        update_list,
    }))
}

pub(crate) fn build_update(ctx: &mut StatementContext<'_>, stmt: UpdateStatement) -> Result<Command> {
    let UpdateStatement {
        mut with,
        low_priority,
        ignore,
        mut tables,
        assignments,
        mut where_cond,
        mut order_by,
        mut limit,
    } = stmt;

    ctx.flags.duplicates = Duplicates::Error;
    ctx.flags.ignore = ignore;

    contextualize_opt(&mut with, ctx)?;
    contextualize_all(&mut tables, ctx)?;

    let assignments = {
        let mut guard = ctx.enter_place(ParsingPlace::UpdateValue);
        attach_assignments(&mut guard, assignments)?
    };

    let block = ctx.current_select();
    let block_tables = ctx.get_block(block)?.tables.clone();
    let multi_table = block_tables.len() > 1;
    ctx.command = if multi_table {
        SqlCommand::UpdateMulti
    } else {
        SqlCommand::Update
    };
    let lock_type = if low_priority {
        LockType::WriteLowPriority
    } else {
        LockType::WriteDefault
    };
    ctx.set_lock_for_tables(block, lock_type)?;

    if where_cond.is_some() {
        let mut guard = ctx.enter_place(ParsingPlace::Where);
        guard.attach_opt(&mut where_cond)?;
        guard.current_block_mut()?.has_where = true;
    }
    if let Some(order_by) = &mut order_by {
        contextualize_order_by(order_by, ctx)?;
    }
    if limit.is_some() {
        ctx.attach_opt(&mut limit)?;
        ctx.current_block_mut()?.has_limit = true;
        ctx.flags.unsafe_limit = true;
    }

    debug!(multi_table, tables = block_tables.len(), "update command");
    Ok(Command::Update(UpdateCommand {
        multi_table,
        tables: block_tables,
        assignments,
        where_cond,
        order_by,
        limit,
    }))
}

pub(crate) fn build_delete(ctx: &mut StatementContext<'_>, stmt: DeleteStatement) -> Result<Command> {
    let DeleteStatement {
        mut with,
        options,
        multi_table,
        targets,
        partitions,
        mut from,
        mut where_cond,
        mut order_by,
        mut limit,
    } = stmt;

    ctx.command = if multi_table {
        SqlCommand::DeleteMulti
    } else {
        SqlCommand::Delete
    };
    ctx.flags.ignore = options.ignore;
    ctx.flags.quick = options.quick;

    contextualize_opt(&mut with, ctx)?;

    let request = if options.low_priority {
        LockRequest::new(LockType::WriteLowPriority, MdlType::SharedWriteLowPrio)
    } else {
        LockRequest::new(LockType::WriteDefault, MdlType::SharedWrite)
    };
    let mut target_refs = Vec::with_capacity(targets.len());
    let mut partitions = Some(partitions);
    for target in targets {
        let mut spec = TableSpec::new(target.name)
            .alias(target.alias)
            .updating(true)
            .alias_only(multi_table)
            .lock(request)
            .base_only();
        if !multi_table {
            spec.partitions = partitions.take().unwrap_or_default();
        }
        target_refs.push(ctx.add_table(spec)?);
    }

    let block = ctx.current_select();
    if multi_table {
        ctx.get_block_mut(block)?.tables.clear();
    } else {
        for &target in &target_refs {
            ctx.add_joined_table(target)?;
        }
    }

    ctx.set_lock_default(LockRequest::read());
    if multi_table {
        contextualize_all(&mut from, ctx)?;
    }

    if where_cond.is_some() {
        let mut guard = ctx.enter_place(ParsingPlace::Where);
        guard.attach_opt(&mut where_cond)?;
        guard.current_block_mut()?.has_where = true;
    }
    if let Some(order_by) = &mut order_by {
        contextualize_order_by(order_by, ctx)?;
    }
    if limit.is_some() {
        ctx.attach_opt(&mut limit)?;
        ctx.current_block_mut()?.has_limit = true;
        if matches!(limit, Some(Expr::Literal(Literal::Integer(n))) if n != 0) {
            ctx.flags.unsafe_limit = true;
        }
    }

    if multi_table {
        link_delete_targets(ctx, block, &target_refs)?;
    }

    debug!(multi_table, targets = target_refs.len(), "delete command");
    Ok(Command::Delete(DeleteCommand {
        multi_table,
        targets: target_refs,
        where_cond,
        order_by,
        limit,
    }))
}

/// Bind each multi-table DELETE target to exactly one table of the FROM list
/// and move the write lock onto it.
fn link_delete_targets(
    ctx: &mut StatementContext<'_>,
    block: QueryBlockRef,
    targets: &[TableRef],
) -> Result<()> {
    let config = ctx.config();
    let candidates = ctx.get_block(block)?.tables.clone();
    for &target in targets {
        let found = ctx.tables.match_multi_target(config, target, &candidates)?;
        let (updating, lock) = {
            let entry = ctx.get_table(target)?;
            (entry.updating, entry.lock)
        };
        let matched = ctx.get_table_mut(found)?;
        matched.updating = updating;
        matched.lock = lock;
        matched.mdl = mdl_type_for_dml(lock.lock_type);
        let name = (!matched.is_derived()).then(|| matched.table_name.clone());

        let entry = ctx.get_table_mut(target)?;
        if let Some(name) = name {
            entry.table_name = name;
        }
        entry.correspondent_table = Some(found);
    }
    Ok(())
}

pub(crate) fn build_call(ctx: &mut StatementContext<'_>, stmt: CallStatement) -> Result<Command> {
    let CallStatement {
        procedure,
        mut args,
    } = stmt;
    if let Some(args) = &mut args {
        ctx.attach_all(args)?;
    }
    ctx.command = SqlCommand::Call;
    check_ident_length(procedure.table.as_str())?;
    Ok(Command::Call(CallCommand { procedure, args }))
}
