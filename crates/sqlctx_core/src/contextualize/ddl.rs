//! Table DDL items.
//!
//! Items accumulate into the [`CreateInfo`](crate::ddl::CreateInfo) and
//! [`AlterInfo`] of a [`TableDdlContext`] in declaration order.
use sqlctx_error::{DbError, ErrorCode, Result};
use tracing::trace;

use super::ContextualizeDdl;
use crate::ast::TableIdent;
use crate::ast::ddl::{
    AlterAction,
    ColumnAttribute,
    ColumnDef,
    PartitionAction,
    PartitionNames,
    TableElement,
    TableOption,
};
use crate::context::lock::{LockRequest, LockType, MdlType};
use crate::ddl::column::{ColumnBuilder, ColumnFlags};
use crate::ddl::key::{
    build_check_constraint,
    setup_check_constraint,
    setup_foreign_key,
    setup_index,
};
use crate::ddl::partition::{build_partition_elements, build_partition_info};
use crate::ddl::{
    AlterColumn,
    AlterColumnChange,
    AlterDrop,
    AlterFlags,
    AlterInfo,
    DropKind,
    TableDdlContext,
    UsedFields,
};
use crate::registry::charset;
use crate::resolver::table_list::TableSpec;
use crate::resolver::{check_db_name, check_ident_length, check_table_name};

pub fn contextualize_ddl_all<T: ContextualizeDdl>(
    nodes: &mut [T],
    ddl: &mut TableDdlContext<'_, '_>,
) -> Result<()> {
    for node in nodes {
        node.contextualize_ddl(ddl)?;
    }
    Ok(())
}

impl ContextualizeDdl for TableElement {
    fn contextualize_ddl(&mut self, ddl: &mut TableDdlContext<'_, '_>) -> Result<()> {
        match self {
            TableElement::Column(column) => column.contextualize_ddl(ddl),
            TableElement::Index(index) => setup_index(ddl, index),
            TableElement::ForeignKey(fk) => setup_foreign_key(ddl, fk),
            TableElement::Check(check) => setup_check_constraint(ddl, check),
        }
    }
}

impl ContextualizeDdl for ColumnDef {
    fn contextualize_ddl(&mut self, ddl: &mut TableDdlContext<'_, '_>) -> Result<()> {
        let builder = build_column(ddl, self)?;
        ddl.alter_info.add_field(builder)
    }
}

/// Build a column from its definition.
///
/// Expressions are attached with subqueries disallowed. On error the
/// builder and everything queued on it is dropped.
fn build_column(
    ddl: &mut TableDdlContext<'_, '_>,
    column: &mut ColumnDef,
) -> Result<ColumnBuilder> {
    let name = column.name.value.clone();
    let mut builder = ColumnBuilder::new(&name, column.field.data_type.clone())?;
    if let Some(place) = &column.place {
        builder.field_mut().place = Some(place.clone());
        builder.alter_flags.insert(AlterFlags::COLUMN_ORDER);
    }

    for attr in column.field.attributes.iter_mut() {
        match attr {
            ColumnAttribute::Null => builder.set_nullable(true),
            ColumnAttribute::NotNull => builder.set_nullable(false),
            ColumnAttribute::Default(expr) => {
                let mut guard = ddl.disallow_subselect();
                guard.attach_in_place(expr)?;
                builder.field_mut().default = Some(expr.clone());
            }
            ColumnAttribute::OnUpdate(expr) => {
                let mut guard = ddl.disallow_subselect();
                guard.attach_in_place(expr)?;
                builder.field_mut().on_update = Some(expr.clone());
            }
            ColumnAttribute::AutoIncrement => {
                builder
                    .field_mut()
                    .flags
                    .insert(ColumnFlags::AUTO_INCREMENT | ColumnFlags::NOT_NULL);
            }
            ColumnAttribute::PrimaryKey => {
                builder
                    .field_mut()
                    .flags
                    .insert(ColumnFlags::PRI_KEY | ColumnFlags::NOT_NULL);
            }
            ColumnAttribute::Unique => builder.field_mut().flags.insert(ColumnFlags::UNIQUE_KEY),
            ColumnAttribute::Comment(comment) => builder.field_mut().comment = Some(comment.clone()),
            ColumnAttribute::Collate(collation) => builder.collate(collation)?,
            ColumnAttribute::ColumnFormat(format) => builder.field_mut().column_format = Some(*format),
            ColumnAttribute::Storage(storage) => builder.field_mut().storage = Some(*storage),
            ColumnAttribute::Srid(srid) => builder.srid(*srid)?,
            ColumnAttribute::Visibility(visible) => {
                if *visible {
                    builder.field_mut().flags.remove(ColumnFlags::INVISIBLE);
                } else {
                    builder.field_mut().flags.insert(ColumnFlags::INVISIBLE);
                }
            }
            ColumnAttribute::Check(check) => {
                let spec = build_check_constraint(ddl, check, Some(&name))?;
                builder.check_constraint(spec);
            }
            ColumnAttribute::EngineAttribute(attr) => builder.engine_attribute(attr.clone(), false),
            ColumnAttribute::SecondaryEngineAttribute(attr) => {
                builder.engine_attribute(attr.clone(), true)
            }
            ColumnAttribute::NotSecondary => {
                builder.field_mut().flags.insert(ColumnFlags::NOT_SECONDARY)
            }
        }
    }

    if let Some(generated) = &mut column.field.generated {
        let mut guard = ddl.disallow_subselect();
        guard.attach_in_place(&mut generated.expr)?;
        builder.field_mut().generated = Some(generated.clone());
    }

    if column.references.is_some() {
        trace!(column = %name, "inline REFERENCES ignored");
    }

    Ok(builder)
}

impl ContextualizeDdl for TableOption {
    fn contextualize_ddl(&mut self, ddl: &mut TableDdlContext<'_, '_>) -> Result<()> {
        let config = ddl.config();
        let info = &mut ddl.create_info;
        let used = match self {
            TableOption::Engine(name) => {
                let warning = info.set_engine(name, config)?;
                ddl.report_warning(warning);
                return Ok(());
            }
            TableOption::SecondaryEngine(name) => {
                info.secondary_engine = Some(name.clone());
                UsedFields::SECONDARY_ENGINE
            }
            TableOption::DefaultCharset(name) => {
                let cs = match name {
                    Some(name) => charset::resolve_charset(name)?,
                    None => charset::resolve_collation(&config.collation_database)?,
                };
                return info.set_default_charset(cs);
            }
            TableOption::DefaultCollation(name) => {
                let collation = match name {
                    Some(name) => charset::resolve_collation(name)?,
                    None => charset::resolve_collation(&config.collation_database)?,
                };
                return info.set_default_collation(collation);
            }
            TableOption::AutoIncrement(v) => {
                info.auto_increment = Some(*v);
                UsedFields::AUTO_INCREMENT
            }
            TableOption::Comment(comment) => {
                info.comment = Some(comment.clone());
                UsedFields::COMMENT
            }
            TableOption::RowFormat(format) => {
                info.row_format = Some(*format);
                UsedFields::ROW_FORMAT
            }
            TableOption::StatsAutoRecalc(v) => {
                info.stats_auto_recalc = Some(*v);
                UsedFields::STATS_AUTO_RECALC
            }
            TableOption::StatsPersistent(v) => {
                info.stats_persistent = Some(*v);
                UsedFields::STATS_PERSISTENT
            }
            TableOption::StatsSamplePages(v) => {
                info.stats_sample_pages = Some(*v);
                UsedFields::STATS_SAMPLE_PAGES
            }
            TableOption::Union(tables) => {
                let mut merge_list = Vec::with_capacity(tables.len());
                for table in tables.iter() {
                    let spec = TableSpec::new(table.clone())
                        .updating(true)
                        .outside_block()
                        .base_only();
                    merge_list.push(ddl.add_table(spec)?);
                }
                ddl.create_info.merge_list = merge_list;
                ddl.create_info.used_fields.insert(UsedFields::UNION);
                return Ok(());
            }
            TableOption::KeyBlockSize(v) => {
                info.key_block_size = Some(*v);
                UsedFields::KEY_BLOCK_SIZE
            }
            TableOption::Compression(v) => {
                info.compression = Some(v.clone());
                UsedFields::COMPRESSION
            }
            TableOption::Encryption(v) => {
                info.encryption = Some(v.clone());
                UsedFields::ENCRYPTION
            }
            TableOption::MaxRows(v) => {
                info.max_rows = Some(*v);
                UsedFields::MAX_ROWS
            }
            TableOption::MinRows(v) => {
                info.min_rows = Some(*v);
                UsedFields::MIN_ROWS
            }
            TableOption::AvgRowLength(v) => {
                info.avg_row_length = Some(*v);
                UsedFields::AVG_ROW_LENGTH
            }
            TableOption::Checksum(v) => {
                info.checksum = Some(*v);
                UsedFields::CHECKSUM
            }
            TableOption::Tablespace(v) => {
                info.tablespace = Some(v.clone());
                UsedFields::TABLESPACE
            }
            TableOption::DataDirectory(v) => {
                info.data_directory = Some(v.clone());
                UsedFields::DATADIR
            }
            TableOption::IndexDirectory(v) => {
                info.index_directory = Some(v.clone());
                UsedFields::INDEXDIR
            }
            TableOption::EngineAttribute(v) => {
                info.engine_attribute = Some(v.clone());
                UsedFields::ENGINE_ATTRIBUTE
            }
            TableOption::SecondaryEngineAttribute(v) => {
                info.secondary_engine_attribute = Some(v.clone());
                UsedFields::SECONDARY_ENGINE_ATTRIBUTE
            }
        };
        info.used_fields.insert(used);
        Ok(())
    }
}

impl AlterInfo {
    pub(crate) fn push_drop(&mut self, kind: DropKind, name: &str, flag: AlterFlags) {
        self.drop_list.push(AlterDrop {
            kind,
            name: name.to_string(),
        });
        self.flags.insert(flag);
    }
}

impl ContextualizeDdl for AlterAction {
    fn contextualize_ddl(&mut self, ddl: &mut TableDdlContext<'_, '_>) -> Result<()> {
        match self {
            AlterAction::AddColumn(column) => {
                column.contextualize_ddl(ddl)?;
                ddl.alter_info.flags.insert(AlterFlags::ADD_COLUMN);
            }
            AlterAction::AddIndex(index) => setup_index(ddl, index)?,
            AlterAction::AddForeignKey(fk) => setup_foreign_key(ddl, fk)?,
            AlterAction::AddCheck(check) => setup_check_constraint(ddl, check)?,
            AlterAction::ChangeColumn { old_name, column } => {
                column.contextualize_ddl(ddl)?;
                if let Some(field) = ddl.alter_info.create_list.last_mut() {
                    field.change = Some(old_name.value.clone());
                }
                ddl.alter_info.flags.insert(AlterFlags::CHANGE_COLUMN);
            }
            AlterAction::AlterColumnDefault { name, default } => {
                let change = match default {
                    Some(expr) => {
                        let mut guard = ddl.disallow_subselect();
                        guard.attach_in_place(expr)?;
                        AlterColumnChange::SetDefault(expr.clone())
                    }
                    None => AlterColumnChange::DropDefault,
                };
                ddl.alter_info.alter_list.push(AlterColumn {
                    name: name.value.clone(),
                    change,
                });
                ddl.alter_info
                    .flags
                    .insert(AlterFlags::CHANGE_COLUMN_DEFAULT);
            }
            AlterAction::AlterColumnVisibility { name, visible } => {
                ddl.alter_info.alter_list.push(AlterColumn {
                    name: name.value.clone(),
                    change: AlterColumnChange::Visibility(*visible),
                });
                ddl.alter_info.flags.insert(AlterFlags::COLUMN_VISIBILITY);
            }
            AlterAction::AlterIndexVisibility { name, visible } => {
                ddl.alter_info
                    .index_visibility
                    .push((name.value.clone(), *visible));
                ddl.alter_info.flags.insert(AlterFlags::INDEX_VISIBILITY);
            }
            AlterAction::AlterCheck { name, enforced } => {
                ddl.alter_info
                    .constraint_enforcement
                    .push((name.value.clone(), *enforced));
                ddl.alter_info.flags.insert(if *enforced {
                    AlterFlags::ENFORCE_CHECK_CONSTRAINT
                } else {
                    AlterFlags::SUSPEND_CHECK_CONSTRAINT
                });
            }
            AlterAction::DropColumn(name) => {
                ddl.alter_info
                    .push_drop(DropKind::Column, name.as_str(), AlterFlags::DROP_COLUMN)
            }
            AlterAction::DropIndex(name) => {
                ddl.alter_info
                    .push_drop(DropKind::Key, name.as_str(), AlterFlags::DROP_INDEX)
            }
            AlterAction::DropPrimaryKey => {
                ddl.alter_info
                    .push_drop(DropKind::Key, "PRIMARY", AlterFlags::DROP_INDEX)
            }
            AlterAction::DropForeignKey(name) => ddl.alter_info.push_drop(
                DropKind::ForeignKey,
                name.as_str(),
                AlterFlags::DROP_FOREIGN_KEY,
            ),
            AlterAction::DropCheck(name) => ddl.alter_info.push_drop(
                DropKind::CheckConstraint,
                name.as_str(),
                AlterFlags::DROP_CHECK_CONSTRAINT,
            ),
            AlterAction::DropConstraint(name) => ddl.alter_info.push_drop(
                DropKind::AnyConstraint,
                name.as_str(),
                AlterFlags::DROP_ANY_CONSTRAINT,
            ),
            AlterAction::RenameColumn { old_name, new_name } => {
                check_ident_length(new_name.as_str())?;
                ddl.alter_info
                    .rename_columns
                    .push((old_name.value.clone(), new_name.value.clone()));
                ddl.alter_info.flags.insert(AlterFlags::RENAME_COLUMN);
            }
            AlterAction::RenameIndex { old_name, new_name } => {
                check_ident_length(new_name.as_str())?;
                ddl.alter_info
                    .rename_keys
                    .push((old_name.value.clone(), new_name.value.clone()));
                ddl.alter_info.flags.insert(AlterFlags::RENAME_INDEX);
            }
            AlterAction::RenameTable(target) => rename_table(ddl, target)?,
            AlterAction::TableOption(option) => {
                option.contextualize_ddl(ddl)?;
                ddl.alter_info.flags.insert(AlterFlags::OPTIONS);
            }
            AlterAction::ConvertToCharset { charset: cs, collation } => {
                let config = ddl.config();
                let cs = match cs {
                    Some(name) => charset::resolve_charset(name)?,
                    None => charset::resolve_collation(&config.collation_database)?,
                };
                let collation = match collation {
                    Some(name) => Some(charset::resolve_collation(name)?),
                    None => None,
                };
                ddl.create_info.convert_to_charset(cs, collation)?;
                ddl.alter_info.flags.insert(AlterFlags::OPTIONS);
            }
            AlterAction::EnableKeys => {
                ddl.alter_info.keys_onoff = Some(true);
                ddl.alter_info.flags.insert(AlterFlags::KEYS_ONOFF);
            }
            AlterAction::DisableKeys => {
                ddl.alter_info.keys_onoff = Some(false);
                ddl.alter_info.flags.insert(AlterFlags::KEYS_ONOFF);
            }
            AlterAction::Force => ddl.alter_info.flags.insert(AlterFlags::RECREATE),
            AlterAction::Partition(action) => action.contextualize_ddl(ddl)?,
        }
        Ok(())
    }
}

/// `RENAME TO [<db>.]<table>`
///
/// An unqualified target stays in the current database.
fn rename_table(ddl: &mut TableDdlContext<'_, '_>, target: &TableIdent) -> Result<()> {
    let config = ddl.config();
    let db = match &target.db {
        Some(db) => {
            check_db_name(db.as_str())?;
            config.fold_name(db.as_str())
        }
        None => match ddl.env().current_database() {
            Some(db) => db.to_string(),
            None => ddl
                .table_db()?
                .ok_or_else(|| DbError::coded(ErrorCode::NoDbError, [] as [String; 0]))?,
        },
    };
    check_table_name(target.table.as_str())?;
    ddl.alter_info.new_db_name = Some(db);
    ddl.alter_info.new_table_name = Some(config.fold_name(target.table.as_str()));
    ddl.alter_info.flags.insert(AlterFlags::RENAME);
    Ok(())
}

impl ContextualizeDdl for PartitionAction {
    fn contextualize_ddl(&mut self, ddl: &mut TableDdlContext<'_, '_>) -> Result<()> {
        let flag = match self {
            PartitionAction::Add { definitions, count } => {
                if *count == Some(0) {
                    return Err(DbError::coded(ErrorCode::NoPartsError, ["partitions"]));
                }
                let elements = build_partition_elements(ddl, definitions)?;
                ddl.alter_info.num_parts = match count {
                    Some(count) => *count,
                    None => u32::try_from(elements.len())
                        .map_err(|_| DbError::coded(ErrorCode::OutOfResources, ["partitions"]))?,
                };
                ddl.alter_info.new_partitions = elements;
                AlterFlags::ADD_PARTITION
            }
            PartitionAction::Drop(names) => {
                ddl.alter_info.partition_names = names.iter().map(|n| n.value.clone()).collect();
                AlterFlags::DROP_PARTITION
            }
            PartitionAction::Rebuild(names) => {
                set_partition_names(&mut ddl.alter_info, names);
                AlterFlags::REBUILD_PARTITION
            }
            PartitionAction::Optimize(names)
            | PartitionAction::Analyze(names)
            | PartitionAction::Check(names)
            | PartitionAction::Repair(names) => {
                set_partition_names(&mut ddl.alter_info, names);
                AlterFlags::ADMIN_PARTITION
            }
            PartitionAction::Truncate(names) => {
                set_partition_names(&mut ddl.alter_info, names);
                AlterFlags::TRUNCATE_PARTITION
            }
            PartitionAction::Coalesce(count) => {
                if *count == 0 {
                    return Err(DbError::coded(ErrorCode::NoPartsError, ["partitions"]));
                }
                ddl.alter_info.num_parts = *count;
                AlterFlags::COALESCE_PARTITION
            }
            PartitionAction::Reorganize { names, into } => {
                ddl.alter_info.partition_names = names.iter().map(|n| n.value.clone()).collect();
                ddl.alter_info.new_partitions = build_partition_elements(ddl, into)?;
                AlterFlags::REORGANIZE_PARTITION
            }
            PartitionAction::Exchange {
                name,
                table,
                validation,
            } => {
                let spec = TableSpec::new(table.clone())
                    .updating(true)
                    .base_only()
                    .lock(LockRequest::new(LockType::ReadNoInsert, MdlType::SharedNoWrite));
                let exchanged = ddl.add_table(spec)?;
                ddl.alter_info.partition_names = vec![name.value.clone()];
                ddl.alter_info.exchange_table = Some(exchanged);
                ddl.alter_info.validation = *validation;
                AlterFlags::EXCHANGE_PARTITION
            }
            PartitionAction::RemovePartitioning => AlterFlags::REMOVE_PARTITIONING,
            PartitionAction::PartitionBy(clause) => {
                let info = build_partition_info(ddl, clause)?;
                ddl.alter_info.partition = Some(info);
                AlterFlags::PARTITION
            }
        };
        trace!(?flag, "partition action");
        ddl.alter_info.flags.insert(flag);
        Ok(())
    }
}

fn set_partition_names(alter_info: &mut AlterInfo, names: &PartitionNames) {
    match names {
        PartitionNames::All => alter_info.flags.insert(AlterFlags::ALL_PARTITION),
        PartitionNames::Names(names) => {
            alter_info.partition_names = names.iter().map(|n| n.value.clone()).collect()
        }
    }
}
