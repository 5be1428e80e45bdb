//! SHOW statements.
//!
//! Most SHOW variants read a system view. The view is registered as the only
//! table of the root block so a WHERE filter resolves against its columns.
use sqlctx_error::{DbError, ErrorCode, Result};
use tracing::debug;

use super::Command;
use super::select::SelectCommand;
use crate::ast::dml::SelectKind;
use crate::ast::query::{QueryExpression, QuerySpecification, SelectItem};
use crate::ast::set::OptionType;
use crate::ast::show::{ShowFilter, ShowStatement};
use crate::ast::{Ident, TableIdent};
use crate::context::StatementContext;
use crate::context::lock::LockRequest;
use crate::context::query_block::ParsingPlace;
use crate::context::sql_command::SqlCommand;
use crate::contextualize::{Contextualize, contextualize_opt};
use crate::expr::Expr;
use crate::resolver::check_db_name;
use crate::resolver::table_list::{TableRef, TableSource, TableSpec};

#[derive(Debug, Clone, PartialEq)]
pub struct ShowCommand {
    pub statement: ShowStatement,
    /// System view the rows come from.
    pub view: Option<&'static str>,
    /// Table a SHOW COLUMNS, SHOW INDEX or SHOW CREATE is about.
    pub target: Option<TableRef>,
    /// Database the listing is restricted to.
    pub db: Option<String>,
    /// LIKE pattern.
    pub wild: Option<String>,
}

/// `SHOW COUNT(*) ERRORS|WARNINGS` as `SELECT @@session.<variable>`.
fn build_show_count(ctx: &mut StatementContext<'_>, variable: &str) -> Result<Command> {
    ctx.command = SqlCommand::Select;
    ctx.flags.keep_diagnostics = true;

    let spec = QuerySpecification {
        items: vec![SelectItem::Expr {
            expr: Expr::SystemVariable {
                scope: OptionType::Session,
                name: variable.to_string(),
            },
            alias: Some(Ident::new(format!("@@session.{variable}"))),
        }],
        ..Default::default()
    };
    let mut query = QueryExpression::from_spec(spec);
    query.contextualize(ctx)?;

    Ok(Command::Select(SelectCommand {
        kind: SelectKind::Select,
        query: Box::new(query),
        into: None,
    }))
}

/// Database named by `FROM <db>`, or the current one.
fn show_db(ctx: &StatementContext<'_>, db: Option<&Ident>) -> Result<String> {
    match db {
        Some(db) => {
            check_db_name(db.as_str())?;
            Ok(ctx.config().fold_name(db.as_str()))
        }
        None => ctx
            .env()
            .current_database()
            .map(|db| db.to_string())
            .ok_or_else(|| DbError::coded(ErrorCode::NoDbError, [] as [String; 0])),
    }
}

fn add_view(ctx: &mut StatementContext<'_>, view: &'static str) -> Result<TableRef> {
    let table = ctx.add_synthetic_table(
        view,
        TableSource::SystemView { name: view },
        LockRequest::read(),
        Vec::new(),
    )?;
    ctx.add_joined_table(table)?;
    Ok(table)
}

/// Apply `LIKE` or `WHERE`, returning the LIKE pattern.
fn apply_filter(ctx: &mut StatementContext<'_>, filter: &mut ShowFilter) -> Result<Option<String>> {
    match filter {
        ShowFilter::None => Ok(None),
        ShowFilter::Like(pattern) => Ok(Some(pattern.clone())),
        ShowFilter::Where(cond) => {
            attach_where(ctx, cond)?;
            Ok(None)
        }
    }
}

fn attach_where(ctx: &mut StatementContext<'_>, cond: &mut Expr) -> Result<()> {
    let mut guard = ctx.enter_place(ParsingPlace::Where);
    guard.attach_in_place(cond)?;
    guard.current_block_mut()?.has_where = true;
    Ok(())
}

fn add_show_target(ctx: &mut StatementContext<'_>, table: &TableIdent) -> Result<TableRef> {
    ctx.add_table(
        TableSpec::new(table.clone())
            .lock(LockRequest::read())
            .outside_block()
            .base_only(),
    )
}

pub(crate) fn build_show(ctx: &mut StatementContext<'_>, stmt: ShowStatement) -> Result<Command> {
    let mut stmt = stmt;
    let mut show = ShowParts::default();

    match &mut stmt {
        ShowStatement::CountErrors => return build_show_count(ctx, "error_count"),
        ShowStatement::CountWarnings => return build_show_count(ctx, "warning_count"),
        ShowStatement::Databases { filter } => {
            ctx.command = SqlCommand::ShowDatabases;
            show.view(ctx, "SCHEMATA")?;
            show.wild = apply_filter(ctx, filter)?;
        }
        ShowStatement::Tables { db, filter, .. } => {
            ctx.command = SqlCommand::ShowTables;
            show.db = Some(show_db(ctx, db.as_ref())?);
            show.view(ctx, "TABLES")?;
            show.wild = apply_filter(ctx, filter)?;
        }
        ShowStatement::TableStatus { db, filter } => {
            ctx.command = SqlCommand::ShowTableStatus;
            show.db = Some(show_db(ctx, db.as_ref())?);
            show.view(ctx, "TABLES")?;
            show.wild = apply_filter(ctx, filter)?;
        }
        ShowStatement::Columns { table, filter, .. } => {
            ctx.command = SqlCommand::ShowFields;
            let target = add_show_target(ctx, table)?;
            let temporary = ctx.get_table(target)?.is_temporary;
            show.target = Some(target);
            show.view(ctx, if temporary { "TMP_TABLE_COLUMNS" } else { "COLUMNS" })?;
            show.wild = apply_filter(ctx, filter)?;
        }
        ShowStatement::Index { table, filter, .. } => {
            ctx.command = SqlCommand::ShowKeys;
            let target = add_show_target(ctx, table)?;
            let temporary = ctx.get_table(target)?.is_temporary;
            show.target = Some(target);
            show.view(ctx, if temporary { "TMP_TABLE_KEYS" } else { "STATISTICS" })?;
            if let Some(cond) = filter {
                attach_where(ctx, cond)?;
            }
        }
        ShowStatement::Status { scope, filter } => {
            ctx.command = SqlCommand::ShowStatus;
            let view = if scope.is_global() {
                "GLOBAL_STATUS"
            } else {
                "SESSION_STATUS"
            };
            show.view(ctx, view)?;
            show.wild = apply_filter(ctx, filter)?;
        }
        ShowStatement::Variables { scope, filter } => {
            ctx.command = SqlCommand::ShowVariables;
            let view = if scope.is_global() {
                "GLOBAL_VARIABLES"
            } else {
                "SESSION_VARIABLES"
            };
            show.view(ctx, view)?;
            show.wild = apply_filter(ctx, filter)?;
        }
        ShowStatement::Processlist { .. } => {
            ctx.command = SqlCommand::ShowProcesslist;
            show.view(ctx, "PROCESSLIST")?;
        }
        ShowStatement::Engines => {
            ctx.command = SqlCommand::ShowEngines;
            show.view(ctx, "ENGINES")?;
        }
        ShowStatement::Charset { filter } => {
            ctx.command = SqlCommand::ShowCharsets;
            show.view(ctx, "CHARACTER_SETS")?;
            show.wild = apply_filter(ctx, filter)?;
        }
        ShowStatement::Collation { filter } => {
            ctx.command = SqlCommand::ShowCollations;
            show.view(ctx, "COLLATIONS")?;
            show.wild = apply_filter(ctx, filter)?;
        }
        ShowStatement::Triggers { db, filter, .. } => {
            ctx.command = SqlCommand::ShowTriggers;
            show.db = Some(show_db(ctx, db.as_ref())?);
            show.view(ctx, "TRIGGERS")?;
            show.wild = apply_filter(ctx, filter)?;
        }
        ShowStatement::Events { db, filter } => {
            ctx.command = SqlCommand::ShowEvents;
            show.db = Some(show_db(ctx, db.as_ref())?);
            show.view(ctx, "EVENTS")?;
            show.wild = apply_filter(ctx, filter)?;
        }
        ShowStatement::OpenTables { db, filter } => {
            ctx.command = SqlCommand::ShowOpenTables;
            // Without FROM every database is listed.
            if db.is_some() {
                show.db = Some(show_db(ctx, db.as_ref())?);
            }
            show.view(ctx, "OPEN_TABLES")?;
            show.wild = apply_filter(ctx, filter)?;
        }
        ShowStatement::Errors { limit } => {
            ctx.command = SqlCommand::ShowErrors;
            ctx.flags.keep_diagnostics = true;
            contextualize_opt(limit, ctx)?;
        }
        ShowStatement::Warnings { limit } => {
            ctx.command = SqlCommand::ShowWarnings;
            ctx.flags.keep_diagnostics = true;
            contextualize_opt(limit, ctx)?;
        }
        ShowStatement::CreateTable { table } | ShowStatement::CreateView { view: table } => {
            ctx.command = SqlCommand::ShowCreate;
            let target = ctx.add_table(
                TableSpec::new(table.clone())
                    .lock(LockRequest::read())
                    .base_only(),
            )?;
            show.target = Some(target);
        }
        ShowStatement::CreateDatabase { name, .. } => {
            ctx.command = SqlCommand::ShowCreateDb;
            check_db_name(name.as_str())?;
            show.db = Some(ctx.config().fold_name(name.as_str()));
        }
    }

    debug!(command = ?ctx.command, view = ?show.view, db = ?show.db, "show command");
    Ok(Command::Show(Box::new(ShowCommand {
        statement: stmt,
        view: show.view,
        target: show.target,
        db: show.db,
        wild: show.wild,
    })))
}

#[derive(Debug, Default)]
struct ShowParts {
    view: Option<&'static str>,
    target: Option<TableRef>,
    db: Option<String>,
    wild: Option<String>,
}

impl ShowParts {
    fn view(&mut self, ctx: &mut StatementContext<'_>, view: &'static str) -> Result<()> {
        add_view(ctx, view)?;
        self.view = Some(view);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::ast::Statement;
    use crate::ast::query::{LimitClause, QueryBody};
    use crate::ast::show::ShowModifier;
    use crate::config::session::ContextConfig;
    use crate::context::ResolvedContext;
    use crate::session::Session;
    use crate::testutil::TestContext;

    fn show_ok(t: &mut TestContext, stmt: ShowStatement) -> (ShowCommand, ResolvedContext) {
        let (command, resolved) = t.build(Statement::Show(stmt)).unwrap();
        let Command::Show(show) = command else {
            panic!("expected SHOW command");
        };
        (*show, resolved)
    }

    #[test]
    fn show_tables_in_current_db() {
        let mut t = TestContext::new();
        let (show, resolved) = show_ok(
            &mut t,
            ShowStatement::Tables {
                modifier: ShowModifier::Full,
                db: None,
                filter: ShowFilter::Like("t%".to_string()),
            },
        );
        assert_eq!(SqlCommand::ShowTables, resolved.command);
        assert_eq!(Some("TABLES"), show.view);
        assert_eq!(Some("db1".to_string()), show.db);
        assert_eq!(Some("t%".to_string()), show.wild);

        let root = resolved.get_block(resolved.root_block()).unwrap();
        assert_eq!(1, root.tables.len());
        let view = resolved.tables.get(root.tables[0]).unwrap();
        assert_eq!(TableSource::SystemView { name: "TABLES" }, view.source);
    }

    #[test]
    fn show_tables_without_db() {
        let mut t = TestContext::with_session(Session::new(ContextConfig::default()));
        let err = t
            .build(Statement::Show(ShowStatement::Tables {
                modifier: ShowModifier::Standard,
                db: None,
                filter: ShowFilter::None,
            }))
            .unwrap_err();
        assert_eq!(Some(ErrorCode::NoDbError), err.code());
    }

    #[test]
    fn show_where_attached_on_view() {
        let mut t = TestContext::new();
        let (show, resolved) = show_ok(
            &mut t,
            ShowStatement::Variables {
                scope: OptionType::Global,
                filter: ShowFilter::Where(Expr::column("Variable_name")),
            },
        );
        assert_eq!(Some("GLOBAL_VARIABLES"), show.view);
        assert_eq!(None, show.wild);
        let root = resolved.get_block(resolved.root_block()).unwrap();
        assert!(root.has_where);
        assert_eq!(ParsingPlace::None, root.parsing_place);
    }

    #[test]
    fn show_columns_of_temporary_table() {
        let session = Session::new(ContextConfig::default())
            .with_database("db1")
            .with_temporary_table(Some("db1"), "tmp");
        let mut t = TestContext::with_session(session);
        let (show, resolved) = show_ok(
            &mut t,
            ShowStatement::Columns {
                modifier: ShowModifier::Standard,
                table: TableIdent::new("tmp"),
                filter: ShowFilter::None,
            },
        );
        assert_eq!(SqlCommand::ShowFields, resolved.command);
        assert_eq!(Some("TMP_TABLE_COLUMNS"), show.view);

        let root = resolved.get_block(resolved.root_block()).unwrap();
        let target = show.target.unwrap();
        assert!(!root.tables.contains(&target));
        assert!(resolved.tables.get(target).unwrap().is_temporary);

        let mut t = TestContext::new();
        let (show, _) = show_ok(
            &mut t,
            ShowStatement::Index {
                extended: false,
                table: TableIdent::new("t1"),
                filter: None,
            },
        );
        assert_eq!(Some("STATISTICS"), show.view);
    }

    #[test]
    fn show_count_is_a_select() {
        let mut t = TestContext::new();
        let (command, resolved) = t.build(Statement::Show(ShowStatement::CountWarnings)).unwrap();
        assert_eq!(SqlCommand::Select, resolved.command);
        assert!(resolved.flags.keep_diagnostics);
        let Command::Select(select) = command else {
            panic!("expected SELECT command");
        };
        let QueryBody::Specification(spec) = &select.query.body else {
            panic!("expected query specification");
        };
        assert_eq!(
            vec![SelectItem::Expr {
                expr: Expr::SystemVariable {
                    scope: OptionType::Session,
                    name: "warning_count".to_string(),
                },
                alias: Some(Ident::new("@@session.warning_count")),
            }],
            spec.items
        );
    }

    #[test]
    fn show_warnings_keeps_diagnostics() {
        let mut t = TestContext::new();
        let (_, resolved) = show_ok(
            &mut t,
            ShowStatement::Warnings {
                limit: Some(LimitClause::new(Expr::int(10))),
            },
        );
        assert_eq!(SqlCommand::ShowWarnings, resolved.command);
        assert!(resolved.flags.keep_diagnostics);
        assert!(resolved.get_block(resolved.root_block()).unwrap().has_limit);
    }

    #[test]
    fn show_create() {
        let mut t = TestContext::new();
        let (show, resolved) = show_ok(
            &mut t,
            ShowStatement::CreateTable {
                table: TableIdent::qualified("db2", "t1"),
            },
        );
        assert_eq!(SqlCommand::ShowCreate, resolved.command);
        let entry = resolved.tables.get(show.target.unwrap()).unwrap();
        assert_eq!(Some("db2"), entry.db.as_deref());

        let mut t = TestContext::new();
        let err = t
            .build(Statement::Show(ShowStatement::CreateDatabase {
                if_not_exists: false,
                name: Ident::new("bad db "),
            }))
            .unwrap_err();
        assert_eq!(Some(ErrorCode::WrongDbName), err.code());
    }
}
