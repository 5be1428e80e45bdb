use sqlctx_error::{DbError, ErrorCode, Result};
use tracing::debug;

use super::Command;
use crate::ast::dml::{SelectKind, SelectStatement};
use crate::ast::query::{IntoDestination, QueryExpression};
use crate::context::StatementContext;
use crate::context::sql_command::SqlCommand;
use crate::contextualize::{Contextualize, contextualize_opt};

#[derive(Debug, Clone, PartialEq)]
pub struct SelectCommand {
    pub kind: SelectKind,
    pub query: Box<QueryExpression>,
    /// Destination of the result when it does not go to the client.
    pub into: Option<IntoDestination>,
}

pub(crate) fn build_select(ctx: &mut StatementContext<'_>, stmt: SelectStatement) -> Result<Command> {
    let SelectStatement {
        kind,
        mut query,
        mut into,
        has_trailing_locking_clauses,
    } = stmt;

    ctx.command = match kind {
        SelectKind::Select => SqlCommand::Select,
        SelectKind::Do => SqlCommand::Do,
    };
    query.contextualize(ctx)?;

    let inner_into = ctx.into.is_some();
    if inner_into && into.is_some() {
        return Err(DbError::coded(
            ErrorCode::MultipleIntoClauses,
            [] as [String; 0],
        ));
    }
    contextualize_opt(&mut into, ctx)?;

    if into.is_some() && has_trailing_locking_clauses {
        // ... INTO ... FOR UPDATE
        ctx.warn(ErrorCode::WarnDeprecatedInnerInto, [] as [String; 0]);
    } else if inner_into && ctx.get_unit(ctx.current_unit()?)?.is_union() {
        // ... UNION SELECT ... INTO ..., warned unless the INTO is trailing
        // and nothing follows it.
        if !query.has_trailing_into_clause() || has_trailing_locking_clauses {
            ctx.warn(ErrorCode::WarnDeprecatedInnerInto, [] as [String; 0]);
        }
    }

    debug!(?kind, into = ctx.into.is_some(), "select command");
    Ok(Command::Select(SelectCommand {
        kind,
        query: Box::new(query),
        into: ctx.into.clone(),
    }))
}
