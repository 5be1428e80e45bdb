//! Final step of building a statement.
//!
//! [`StatementBuilder`] walks a statement tree against a fresh
//! [`StatementContext`] and assembles the [`Command`] handed to the execution
//! layer, together with everything the context resolved. The first error
//! stops the build. It is reported once to the diagnostics sink and no
//! command is returned.
pub mod admin;
pub mod ddl;
pub mod dml;
pub mod select;
pub mod show;

use sqlctx_error::Result;
use tracing::debug;

use crate::ast::Statement;
use crate::ast::admin::{AdminStatement, ResourceGroupStatement};
use crate::context::{ResolvedContext, StatementContext, StatementState};
use crate::contextualize::Contextualize;
use crate::contextualize::set::SetVar;
use crate::diagnostics::DiagnosticsSink;
use crate::expr::ExpressionHook;
use crate::session::Environment;

use admin::{ExplainCommand, SrsCommand};
use ddl::{AlterTableCommand, CreateTableCommand, MaintenanceCommand};
use dml::{CallCommand, DeleteCommand, InsertCommand, UpdateCommand};
use select::SelectCommand;
use show::ShowCommand;

/// A resolved statement ready for execution.
///
/// Table references, query blocks and units mentioned in the payloads refer
/// into the [`ResolvedContext`] returned alongside.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// SELECT and DO, also SHOW COUNT(*) WARNINGS|ERRORS.
    Select(SelectCommand),
    /// INSERT and REPLACE.
    Insert(InsertCommand),
    Update(UpdateCommand),
    Delete(DeleteCommand),
    Call(CallCommand),
    CreateTable(Box<CreateTableCommand>),
    AlterTable(Box<AlterTableCommand>),
    CreateIndex(Box<AlterTableCommand>),
    DropIndex(Box<AlterTableCommand>),
    TableMaintenance(MaintenanceCommand),
    /// Assignments of a SET statement, in order.
    Set(Vec<SetVar>),
    Show(Box<ShowCommand>),
    Explain(Box<ExplainCommand>),
    Admin(AdminStatement),
    ResourceGroup(ResourceGroupStatement),
    Srs(SrsCommand),
}

/// Builds [`Command`]s for one session.
pub struct StatementBuilder<'a> {
    env: &'a dyn Environment,
    hook: &'a dyn ExpressionHook,
}

impl std::fmt::Debug for StatementBuilder<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatementBuilder")
            .field("database", &self.env.current_database())
            .finish_non_exhaustive()
    }
}

impl<'a> StatementBuilder<'a> {
    pub fn new(env: &'a dyn Environment, hook: &'a dyn ExpressionHook) -> Self {
        StatementBuilder { env, hook }
    }

    /// Contextualize `stmt` and assemble its command.
    pub fn build(
        &self,
        stmt: Statement,
        diagnostics: &mut dyn DiagnosticsSink,
    ) -> Result<(Command, ResolvedContext)> {
        let mut ctx = StatementContext::new(self.env, self.hook, diagnostics);
        match build_command(&mut ctx, stmt) {
            Ok(command) => {
                debug!(command = ?ctx.command, tables = ctx.tables.len(), "statement built");
                Ok((command, ctx.into_resolved()))
            }
            Err(err) => {
                ctx.fail(&err);
                Err(err)
            }
        }
    }
}

fn build_command(ctx: &mut StatementContext<'_>, stmt: Statement) -> Result<Command> {
    ctx.transition(StatementState::ChildrenContextualizing)?;
    let command = assemble(ctx, stmt)?;
    ctx.mark_resolved()?;
    ctx.transition(StatementState::CommandBuilt)?;
    Ok(command)
}

/// Contextualize a statement and assemble its command, leaving the state
/// machine alone.
pub(crate) fn assemble(ctx: &mut StatementContext<'_>, stmt: Statement) -> Result<Command> {
    match stmt {
        Statement::Select(stmt) => select::build_select(ctx, stmt),
        Statement::Insert(stmt) => dml::build_insert(ctx, stmt),
        Statement::Update(stmt) => dml::build_update(ctx, stmt),
        Statement::Delete(stmt) => dml::build_delete(ctx, stmt),
        Statement::Call(stmt) => dml::build_call(ctx, stmt),
        Statement::CreateTable(stmt) => ddl::build_create_table(ctx, *stmt),
        Statement::AlterTable(stmt) => ddl::build_alter_table(ctx, *stmt),
        Statement::CreateIndex(stmt) => ddl::build_create_index(ctx, stmt),
        Statement::DropIndex(stmt) => ddl::build_drop_index(ctx, stmt),
        Statement::TableMaintenance(stmt) => ddl::build_table_maintenance(ctx, stmt),
        Statement::Set(mut stmt) => {
            stmt.contextualize(ctx)?;
            Ok(Command::Set(ctx.var_list.clone()))
        }
        Statement::Show(stmt) => show::build_show(ctx, stmt),
        Statement::Explain(stmt) => admin::build_explain(ctx, *stmt),
        Statement::Admin(stmt) => Ok(admin::build_admin(ctx, stmt)),
        Statement::ResourceGroup(stmt) => admin::build_resource_group(ctx, stmt),
        Statement::Srs(stmt) => admin::build_srs(ctx, stmt),
    }
}
