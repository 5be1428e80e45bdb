//! Table DDL commands: CREATE TABLE, ALTER TABLE, CREATE/DROP INDEX and the
//! table maintenance statements.
use sqlctx_error::{DbError, ErrorCode, Result};
use tracing::debug;

use super::Command;
use super::dml::contextualize_source_query;
use crate::ast::TableIdent;
use crate::ast::ddl::{
    AlterTableStatement,
    CreateIndexStatement,
    CreateTableStatement,
    DropIndexStatement,
    HistogramCommand,
    MaintenanceKind,
    OnDuplicate,
    TableMaintenanceStatement,
};
use crate::ast::query::QueryExpression;
use crate::context::StatementContext;
use crate::context::lock::{LockRequest, LockType, MdlType};
use crate::context::sql_command::{Duplicates, SqlCommand};
use crate::contextualize::ddl::contextualize_ddl_all;
use crate::ddl::key::setup_index;
use crate::ddl::partition::build_partition_info;
use crate::ddl::{AlterFlags, AlterInfo, CreateInfo, DropKind, TableDdlContext, UsedFields};
use crate::registry::engine::find_engine;
use crate::resolver::check_ident_length;
use crate::resolver::table_list::{TableRef, TableSpec};

/// Histogram bucket counts accepted by ANALYZE TABLE.
const BUCKET_RANGE: std::ops::RangeInclusive<u32> = 1..=1024;

#[derive(Debug, Clone, PartialEq)]
pub struct CreateTableCommand {
    pub table: TableRef,
    pub create_info: CreateInfo,
    pub alter_info: AlterInfo,
    /// Source table of `CREATE TABLE ... LIKE`.
    pub like: Option<TableRef>,
    pub query: Option<Box<QueryExpression>>,
    pub on_duplicate: OnDuplicate,
}

/// ALTER TABLE, also CREATE INDEX and DROP INDEX which are executed as one.
#[derive(Debug, Clone, PartialEq)]
pub struct AlterTableCommand {
    pub table: TableRef,
    pub create_info: CreateInfo,
    pub alter_info: AlterInfo,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MaintenanceCommand {
    pub kind: MaintenanceKind,
    pub tables: Vec<TableRef>,
}

pub(crate) fn build_create_table(
    ctx: &mut StatementContext<'_>,
    stmt: CreateTableStatement,
) -> Result<Command> {
    let CreateTableStatement {
        temporary,
        if_not_exists,
        table,
        mut elements,
        mut options,
        mut partitioning,
        on_duplicate,
        mut query,
        like,
    } = stmt;

    ctx.command = SqlCommand::CreateTable;
    let target = ctx.add_table(
        TableSpec::new(table.clone())
            .updating(true)
            .lock(LockRequest::new(LockType::Write, MdlType::Shared))
            .base_only(),
    )?;

    let mut ddl = TableDdlContext::new(ctx, target);
    ddl.create_info.temporary = temporary;
    ddl.create_info.if_not_exists = if_not_exists;

    let mut like_table = None;
    if let Some(source) = like {
        ddl.create_info.like = true;
        like_table = Some(
            ddl.add_table(
                TableSpec::new(source)
                    .lock(LockRequest::new(LockType::Read, MdlType::SharedRead))
                    .base_only(),
            )?,
        );
    } else {
        contextualize_ddl_all(&mut elements, &mut ddl)?;
        contextualize_ddl_all(&mut options, &mut ddl)?;

        if let Some(clause) = &mut partitioning {
            let info = build_partition_info(&mut ddl, clause)?;
            ddl.alter_info.partition = Some(info);
        }

        match on_duplicate {
            OnDuplicate::Ignore => ddl.flags.ignore = true,
            OnDuplicate::Replace => ddl.flags.duplicates = Duplicates::Replace,
            OnDuplicate::Error => ddl.flags.duplicates = Duplicates::Error,
        }

        if let Some(query) = &mut query {
            contextualize_source_query(&mut ddl, query)?;
        }
    }

    if ddl.create_info.needs_engine_substitution() {
        let config = ddl.config();
        let name = if temporary {
            &config.default_tmp_storage_engine
        } else {
            &config.default_storage_engine
        };
        let engine = find_engine(name, temporary)
            .ok_or_else(|| DbError::coded(ErrorCode::UnknownStorageEngine, [name.clone()]))?;
        ddl.create_info.engine = Some(engine);
        ddl.warn(
            ErrorCode::WarnUsingOtherHandler,
            [engine.name.to_string(), table.table.value.clone()],
        );
    }

    let (create_info, alter_info) = ddl.into_descriptors();
    debug!(table = %table, like = like_table.is_some(), query = query.is_some(), "create table command");
    Ok(Command::CreateTable(Box::new(CreateTableCommand {
        table: target,
        create_info,
        alter_info,
        like: like_table,
        query: query.map(Box::new),
        on_duplicate,
    })))
}

/// Register the table changed by ALTER TABLE, CREATE INDEX or DROP INDEX.
fn add_altered_table(ctx: &mut StatementContext<'_>, table: TableIdent) -> Result<TableRef> {
    ctx.add_table(
        TableSpec::new(table)
            .updating(true)
            .lock(LockRequest::new(LockType::ReadNoInsert, MdlType::SharedUpgradable))
            .base_only(),
    )
}

fn alter_command(ddl: TableDdlContext<'_, '_>) -> Box<AlterTableCommand> {
    let table = ddl.table;
    let (create_info, alter_info) = ddl.into_descriptors();
    Box::new(AlterTableCommand {
        table,
        create_info,
        alter_info,
    })
}

pub(crate) fn build_alter_table(
    ctx: &mut StatementContext<'_>,
    stmt: AlterTableStatement,
) -> Result<Command> {
    let AlterTableStatement {
        table,
        mut actions,
        algorithm,
        lock,
        validation,
    } = stmt;

    ctx.command = SqlCommand::AlterTable;
    let target = add_altered_table(ctx, table)?;

    // The new name decides where foreign keys of the table point.
    actions.sort_by_key(|action| !action.is_rename_table());

    let mut ddl = TableDdlContext::new(ctx, target);
    ddl.alter_info.algorithm = algorithm;
    ddl.alter_info.lock = lock;
    ddl.alter_info.validation = validation;
    contextualize_ddl_all(&mut actions, &mut ddl)?;

    if ddl.create_info.needs_engine_substitution() {
        ddl.create_info.used_fields.remove(UsedFields::ENGINE);
    }

    debug!(actions = actions.len(), flags = ?ddl.alter_info.flags, "alter table command");
    Ok(Command::AlterTable(alter_command(ddl)))
}

pub(crate) fn build_create_index(
    ctx: &mut StatementContext<'_>,
    stmt: CreateIndexStatement,
) -> Result<Command> {
    let CreateIndexStatement {
        mut index,
        table,
        algorithm,
        lock,
    } = stmt;

    ctx.command = SqlCommand::CreateIndex;
    let target = add_altered_table(ctx, table)?;

    let mut ddl = TableDdlContext::new(ctx, target);
    ddl.alter_info.flags.insert(AlterFlags::ADD_INDEX);
    setup_index(&mut ddl, &mut index)?;
    ddl.alter_info.algorithm = algorithm;
    ddl.alter_info.lock = lock;

    Ok(Command::CreateIndex(alter_command(ddl)))
}

pub(crate) fn build_drop_index(
    ctx: &mut StatementContext<'_>,
    stmt: DropIndexStatement,
) -> Result<Command> {
    let DropIndexStatement {
        name,
        table,
        algorithm,
        lock,
    } = stmt;

    ctx.command = SqlCommand::DropIndex;
    check_ident_length(name.as_str())?;
    let target = add_altered_table(ctx, table)?;

    let mut ddl = TableDdlContext::new(ctx, target);
    ddl.alter_info
        .push_drop(DropKind::Key, name.as_str(), AlterFlags::DROP_INDEX);
    ddl.alter_info.algorithm = algorithm;
    ddl.alter_info.lock = lock;

    Ok(Command::DropIndex(alter_command(ddl)))
}

fn check_histogram(histogram: &HistogramCommand) -> Result<()> {
    let columns = match histogram {
        HistogramCommand::Update { columns, buckets } => {
            if let Some(buckets) = buckets {
                if !BUCKET_RANGE.contains(buckets) {
                    return Err(DbError::coded(
                        ErrorCode::DataOutOfRange,
                        ["Number of buckets", "ANALYZE TABLE"],
                    ));
                }
            }
            columns
        }
        HistogramCommand::Drop { columns } => columns,
    };
    for column in columns {
        check_ident_length(column.as_str())?;
    }
    Ok(())
}

pub(crate) fn build_table_maintenance(
    ctx: &mut StatementContext<'_>,
    stmt: TableMaintenanceStatement,
) -> Result<Command> {
    let TableMaintenanceStatement {
        kind,
        tables,
        no_write_to_binlog,
    } = stmt;

    let admin = LockRequest::new(LockType::Unlock, MdlType::SharedRead);
    let (command, request) = match &kind {
        MaintenanceKind::Analyze { histogram } => {
            if let Some(histogram) = histogram {
                check_histogram(histogram)?;
            }
            (SqlCommand::Analyze, admin)
        }
        MaintenanceKind::Check => (SqlCommand::Check, admin),
        MaintenanceKind::Optimize => (SqlCommand::Optimize, admin),
        MaintenanceKind::Repair => (SqlCommand::Repair, admin),
        MaintenanceKind::Truncate => (
            SqlCommand::Truncate,
            LockRequest::new(LockType::Write, MdlType::Exclusive),
        ),
    };
    ctx.command = command;
    ctx.flags.no_write_to_binlog = no_write_to_binlog;

    let tables = tables
        .into_iter()
        .map(|table| {
            ctx.add_table(
                TableSpec::new(table)
                    .updating(true)
                    .lock(request)
                    .base_only(),
            )
        })
        .collect::<Result<Vec<_>>>()?;

    debug!(?command, tables = tables.len(), "table maintenance command");
    Ok(Command::TableMaintenance(MaintenanceCommand { kind, tables }))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::ast::{Ident, Statement};
    use crate::ast::ddl::{
        AlterAction,
        ColumnDef,
        DataType,
        IndexDef,
        KeyPart,
        KeyType,
        PartitionClause,
        PartitionMethod,
        TableElement,
        TableOption,
        TypeName,
    };
    use crate::ast::query::OrderDirection;
    use crate::config::session::ContextConfig;
    use crate::context::ResolvedContext;
    use crate::expr::Expr;
    use crate::testutil::{TestContext, select_from};

    fn int_column(name: &str) -> TableElement {
        TableElement::Column(ColumnDef::new(name, DataType::new(TypeName::Int)))
    }

    fn build_ok(t: &mut TestContext, stmt: Statement) -> (Command, ResolvedContext) {
        t.build(stmt).unwrap()
    }

    #[test]
    fn create_table_registers_target() {
        let mut t = TestContext::new();
        let mut stmt = CreateTableStatement::new(TableIdent::new("t1"));
        stmt.elements = vec![int_column("a"), int_column("b")];
        stmt.if_not_exists = true;
        let (command, resolved) = build_ok(&mut t, Statement::CreateTable(Box::new(stmt)));

        assert_eq!(SqlCommand::CreateTable, resolved.command);
        let Command::CreateTable(create) = command else {
            panic!("expected CREATE TABLE command");
        };
        assert!(create.create_info.if_not_exists);
        assert_eq!(2, create.alter_info.create_list.len());
        let entry = resolved.tables.get(create.table).unwrap();
        assert_eq!(LockType::Write, entry.lock.lock_type);
        assert_eq!(MdlType::Shared, entry.mdl);
        assert!(entry.updating);
    }

    #[test]
    fn create_table_like() {
        let mut t = TestContext::new();
        let mut stmt = CreateTableStatement::new(TableIdent::new("t1"));
        stmt.like = Some(TableIdent::new("t2"));
        let (command, resolved) = build_ok(&mut t, Statement::CreateTable(Box::new(stmt)));

        let Command::CreateTable(create) = command else {
            panic!("expected CREATE TABLE command");
        };
        assert!(create.create_info.like);
        let source = resolved.tables.get(create.like.unwrap()).unwrap();
        assert_eq!("t2", source.table_name);
        assert_eq!(LockType::Read, source.lock.lock_type);
        assert!(!source.updating);
    }

    #[test]
    fn create_table_select_keeps_target_first() {
        let mut t = TestContext::new();
        let mut stmt = CreateTableStatement::new(TableIdent::new("t1"));
        stmt.on_duplicate = OnDuplicate::Replace;
        stmt.query = Some(select_from(&["t2", "t3"]));
        let (command, resolved) = build_ok(&mut t, Statement::CreateTable(Box::new(stmt)));

        let Command::CreateTable(create) = command else {
            panic!("expected CREATE TABLE command");
        };
        let root = resolved.get_block(resolved.root_block()).unwrap();
        assert_eq!(3, root.tables.len());
        assert_eq!(create.table, root.tables[0]);
        assert_eq!(Duplicates::Replace, resolved.flags.duplicates);
    }

    fn engine_substitution() -> TestContext {
        TestContext::with_config(ContextConfig {
            no_engine_substitution: false,
            ..Default::default()
        })
    }

    #[test]
    fn unknown_engine_substituted() {
        let mut t = engine_substitution();
        let mut stmt = CreateTableStatement::new(TableIdent::new("t1"));
        stmt.options = vec![TableOption::Engine("NoSuchEngine".to_string())];
        let (command, _) = build_ok(&mut t, Statement::CreateTable(Box::new(stmt)));

        let Command::CreateTable(create) = command else {
            panic!("expected CREATE TABLE command");
        };
        assert_eq!("InnoDB", create.create_info.engine.unwrap().name);
        assert!(t.diagnostics.has_code(ErrorCode::UnknownStorageEngine));
        let warning = t
            .diagnostics
            .warnings()
            .find(|w| w.code == ErrorCode::WarnUsingOtherHandler)
            .unwrap();
        assert_eq!(vec!["InnoDB".to_string(), "t1".to_string()], warning.args);
    }

    #[test]
    fn missing_engine_left_alone() {
        let mut t = TestContext::new();
        let stmt = CreateTableStatement::new(TableIdent::new("t1"));
        let (command, _) = build_ok(&mut t, Statement::CreateTable(Box::new(stmt)));
        let Command::CreateTable(create) = command else {
            panic!("expected CREATE TABLE command");
        };
        assert_eq!(None, create.create_info.engine);
        assert_eq!(0, t.diagnostics.warning_count());
    }

    #[test]
    fn unknown_engine_without_substitution() {
        let mut t = TestContext::with_config(ContextConfig {
            no_engine_substitution: true,
            ..Default::default()
        });
        let mut stmt = CreateTableStatement::new(TableIdent::new("t1"));
        stmt.options = vec![TableOption::Engine("NoSuchEngine".to_string())];
        let err = t.build(Statement::CreateTable(Box::new(stmt))).unwrap_err();
        assert_eq!(Some(ErrorCode::UnknownStorageEngine), err.code());
    }

    #[test]
    fn create_table_partitions() {
        let mut t = TestContext::new();
        let mut stmt = CreateTableStatement::new(TableIdent::new("t1"));
        stmt.elements = vec![int_column("a")];
        stmt.partitioning = Some(PartitionClause {
            method: PartitionMethod::Hash {
                linear: false,
                expr: Expr::column("a"),
            },
            count: Some(4),
            subpartition: None,
            definitions: Vec::new(),
        });
        let (command, _) = build_ok(&mut t, Statement::CreateTable(Box::new(stmt)));
        let Command::CreateTable(create) = command else {
            panic!("expected CREATE TABLE command");
        };
        assert_eq!(4, create.alter_info.partition.unwrap().num_parts);
    }

    #[test]
    fn alter_table_renames_first() {
        let mut t = TestContext::new();
        let stmt = AlterTableStatement::new(
            TableIdent::new("t1"),
            vec![
                AlterAction::DropColumn(Ident::new("a")),
                AlterAction::RenameTable(TableIdent::qualified("db2", "t2")),
            ],
        );
        let (command, resolved) = build_ok(&mut t, Statement::AlterTable(Box::new(stmt)));

        assert_eq!(SqlCommand::AlterTable, resolved.command);
        let Command::AlterTable(alter) = command else {
            panic!("expected ALTER TABLE command");
        };
        let flags = alter.alter_info.flags;
        assert!(flags.contains(AlterFlags::RENAME));
        assert!(flags.contains(AlterFlags::DROP_COLUMN));
        assert_eq!(Some("t2"), alter.alter_info.new_table_name.as_deref());
        let entry = resolved.tables.get(alter.table).unwrap();
        assert_eq!(LockType::ReadNoInsert, entry.lock.lock_type);
        assert_eq!(MdlType::SharedUpgradable, entry.mdl);
    }

    #[test]
    fn alter_unknown_engine_clears_used_flag() {
        let mut t = engine_substitution();
        let stmt = AlterTableStatement::new(
            TableIdent::new("t1"),
            vec![AlterAction::TableOption(TableOption::Engine(
                "NoSuchEngine".to_string(),
            ))],
        );
        let (command, _) = build_ok(&mut t, Statement::AlterTable(Box::new(stmt)));
        let Command::AlterTable(alter) = command else {
            panic!("expected ALTER TABLE command");
        };
        assert!(!alter.create_info.used_fields.contains(UsedFields::ENGINE));
        assert!(t.diagnostics.has_code(ErrorCode::UnknownStorageEngine));
    }

    #[test]
    fn create_and_drop_index() {
        let mut t = TestContext::new();
        let mut index = IndexDef::new(KeyType::Multiple, vec![KeyPart::column("a")]);
        index.name = Some(Ident::new("i1"));
        let stmt = CreateIndexStatement {
            index,
            table: TableIdent::new("t1"),
            algorithm: Default::default(),
            lock: Default::default(),
        };
        let (command, resolved) = build_ok(&mut t, Statement::CreateIndex(stmt));
        assert_eq!(SqlCommand::CreateIndex, resolved.command);
        let Command::CreateIndex(create) = command else {
            panic!("expected CREATE INDEX command");
        };
        assert!(create.alter_info.flags.contains(AlterFlags::ADD_INDEX));
        assert_eq!(1, create.alter_info.key_list.len());

        let mut t = TestContext::new();
        let stmt = DropIndexStatement {
            name: Ident::new("i1"),
            table: TableIdent::new("t1"),
            algorithm: Default::default(),
            lock: Default::default(),
        };
        let (command, resolved) = build_ok(&mut t, Statement::DropIndex(stmt));
        assert_eq!(SqlCommand::DropIndex, resolved.command);
        let Command::DropIndex(drop) = command else {
            panic!("expected DROP INDEX command");
        };
        assert_eq!(DropKind::Key, drop.alter_info.drop_list[0].kind);
        assert_eq!("i1", drop.alter_info.drop_list[0].name);
        assert!(drop.alter_info.flags.contains(AlterFlags::DROP_INDEX));
    }

    #[test]
    fn spatial_index_with_order_rejected() {
        let mut t = TestContext::new();
        let index = IndexDef::new(
            KeyType::Spatial,
            vec![KeyPart::column("g").with_order(OrderDirection::Desc)],
        );
        let stmt = CreateIndexStatement {
            index,
            table: TableIdent::new("t1"),
            algorithm: Default::default(),
            lock: Default::default(),
        };
        let err = t.build(Statement::CreateIndex(stmt)).unwrap_err();
        assert_eq!(Some(ErrorCode::WrongUsage), err.code());
    }

    #[test]
    fn maintenance_locks() {
        let mut t = TestContext::new();
        let stmt = TableMaintenanceStatement {
            kind: MaintenanceKind::Optimize,
            tables: vec![TableIdent::new("t1"), TableIdent::new("t2")],
            no_write_to_binlog: true,
        };
        let (command, resolved) = build_ok(&mut t, Statement::TableMaintenance(stmt));
        assert_eq!(SqlCommand::Optimize, resolved.command);
        assert!(resolved.flags.no_write_to_binlog);
        let Command::TableMaintenance(maintenance) = command else {
            panic!("expected maintenance command");
        };
        for &table in &maintenance.tables {
            let entry = resolved.tables.get(table).unwrap();
            assert_eq!(LockType::Unlock, entry.lock.lock_type);
            assert_eq!(MdlType::SharedRead, entry.mdl);
            assert!(entry.updating);
        }

        let mut t = TestContext::new();
        let stmt = TableMaintenanceStatement {
            kind: MaintenanceKind::Truncate,
            tables: vec![TableIdent::new("t1")],
            no_write_to_binlog: false,
        };
        let (_, resolved) = build_ok(&mut t, Statement::TableMaintenance(stmt));
        assert_eq!(SqlCommand::Truncate, resolved.command);
        let (_, entry) = resolved.tables.iter().next().unwrap();
        assert_eq!(LockType::Write, entry.lock.lock_type);
        assert_eq!(MdlType::Exclusive, entry.mdl);
    }

    #[test]
    fn histogram_bucket_range() {
        let analyze = |buckets| TableMaintenanceStatement {
            kind: MaintenanceKind::Analyze {
                histogram: Some(HistogramCommand::Update {
                    columns: vec![Ident::new("a")],
                    buckets: Some(buckets),
                }),
            },
            tables: vec![TableIdent::new("t1")],
            no_write_to_binlog: false,
        };

        let mut t = TestContext::new();
        let (_, resolved) = build_ok(&mut t, Statement::TableMaintenance(analyze(1024)));
        assert_eq!(SqlCommand::Analyze, resolved.command);

        for buckets in [0, 1025] {
            let mut t = TestContext::new();
            let err = t
                .build(Statement::TableMaintenance(analyze(buckets)))
                .unwrap_err();
            assert_eq!(Some(ErrorCode::DataOutOfRange), err.code());
            assert_eq!(&["Number of buckets", "ANALYZE TABLE"], err.args());
        }
    }
}
