//! Descriptors accumulated while contextualizing table DDL.
//!
//! CREATE TABLE, ALTER TABLE and the index statements collect their intent
//! into a [`CreateInfo`] (table level options) and an [`AlterInfo`] (columns,
//! keys, constraints and the actions to perform). Items are visited through a
//! [`TableDdlContext`], which derefs to the statement context.

/// Declares a set of single bit flags over an integer.
macro_rules! flag_set {
    (
        $(#[$meta:meta])*
        pub struct $name:ident($repr:ty) {
            $( $(#[$fmeta:meta])* const $flag:ident = $bit:expr; )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Default, Hash)]
        pub struct $name($repr);

        impl $name {
            $( $(#[$fmeta])* pub const $flag: $name = $name(1 << $bit); )*

            pub const fn empty() -> Self {
                $name(0)
            }

            pub const fn is_empty(&self) -> bool {
                self.0 == 0
            }

            pub const fn contains(&self, other: $name) -> bool {
                self.0 & other.0 == other.0
            }

            pub fn insert(&mut self, other: $name) {
                self.0 |= other.0;
            }

            pub fn remove(&mut self, other: $name) {
                self.0 &= !other.0;
            }
        }

        impl std::ops::BitOr for $name {
            type Output = $name;

            fn bitor(self, rhs: $name) -> $name {
                $name(self.0 | rhs.0)
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                let mut set = f.debug_set();
                $(
                    if self.contains($name::$flag) {
                        set.entry(&format_args!("{}", stringify!($flag)));
                    }
                )*
                set.finish()
            }
        }
    };
}

pub mod column;
pub mod key;
pub mod partition;
pub mod resource_group;
pub mod srs;

use std::ops::{Deref, DerefMut};

use column::CreateField;
use key::{CheckConstraintSpec, ForeignKeySpec, KeyCreateInfo, KeySpec};
use partition::{PartitionElement, PartitionInfo};
use sqlctx_error::{DbError, ErrorCode, Result};
use tracing::debug;

use crate::ast::ddl::{AlterAlgorithm, AlterLock, RowFormat, Ternary, Validation};
use crate::config::session::ContextConfig;
use crate::context::StatementContext;
use crate::expr::Expr;
use crate::registry::charset::{self, CharsetInfo};
use crate::registry::engine::{self, Engine};
use crate::resolver::table_list::TableRef;

flag_set! {
    /// What an ALTER TABLE changes.
    pub struct AlterFlags(u64) {
        const ADD_COLUMN = 0;
        const DROP_COLUMN = 1;
        const CHANGE_COLUMN = 2;
        const ADD_INDEX = 3;
        const DROP_INDEX = 4;
        const RENAME = 5;
        const OPTIONS = 6;
        const CHANGE_COLUMN_DEFAULT = 7;
        const KEYS_ONOFF = 8;
        /// ALTER TABLE ... FORCE
        const RECREATE = 9;
        const ADD_PARTITION = 10;
        const DROP_PARTITION = 11;
        const COALESCE_PARTITION = 12;
        const REORGANIZE_PARTITION = 13;
        /// PARTITION BY given in ALTER TABLE.
        const PARTITION = 14;
        /// ANALYZE, CHECK, OPTIMIZE and REPAIR PARTITION.
        const ADMIN_PARTITION = 15;
        const TRUNCATE_PARTITION = 16;
        const REMOVE_PARTITIONING = 17;
        /// Partition action given with ALL instead of names.
        const ALL_PARTITION = 18;
        const EXCHANGE_PARTITION = 19;
        const REBUILD_PARTITION = 20;
        const ADD_FOREIGN_KEY = 21;
        const DROP_FOREIGN_KEY = 22;
        const INDEX_VISIBILITY = 23;
        const RENAME_INDEX = 24;
        const RENAME_COLUMN = 25;
        const ADD_CHECK_CONSTRAINT = 26;
        const DROP_CHECK_CONSTRAINT = 27;
        const ENFORCE_CHECK_CONSTRAINT = 28;
        const SUSPEND_CHECK_CONSTRAINT = 29;
        const DROP_ANY_CONSTRAINT = 30;
        const COLUMN_VISIBILITY = 31;
        /// FIRST or AFTER given for a column.
        const COLUMN_ORDER = 32;
        const ANY_ENGINE_ATTRIBUTE = 33;
    }
}

flag_set! {
    /// Table options given explicitly.
    pub struct UsedFields(u32) {
        const ENGINE = 0;
        const DEFAULT_CHARSET = 1;
        const DEFAULT_COLLATE = 2;
        /// CONVERT TO CHARACTER SET
        const CHARSET = 3;
        const AUTO_INCREMENT = 4;
        const COMMENT = 5;
        const ROW_FORMAT = 6;
        const STATS_AUTO_RECALC = 7;
        const STATS_PERSISTENT = 8;
        const STATS_SAMPLE_PAGES = 9;
        const UNION = 10;
        const KEY_BLOCK_SIZE = 11;
        const COMPRESSION = 12;
        const ENCRYPTION = 13;
        const MAX_ROWS = 14;
        const MIN_ROWS = 15;
        const AVG_ROW_LENGTH = 16;
        const CHECKSUM = 17;
        const TABLESPACE = 18;
        const DATADIR = 19;
        const INDEXDIR = 20;
        const ENGINE_ATTRIBUTE = 21;
        const SECONDARY_ENGINE_ATTRIBUTE = 22;
        const SECONDARY_ENGINE = 23;
    }
}

/// Table level options of CREATE and ALTER TABLE.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CreateInfo {
    pub temporary: bool,
    pub if_not_exists: bool,
    /// CREATE TABLE ... LIKE
    pub like: bool,
    pub used_fields: UsedFields,
    /// `None` with ENGINE used means the engine was unknown and will be
    /// substituted.
    pub engine: Option<&'static Engine>,
    /// Engine name as written.
    pub engine_name: Option<String>,
    /// `Some(None)` for SECONDARY_ENGINE = NULL.
    pub secondary_engine: Option<Option<String>>,
    pub default_charset: Option<&'static CharsetInfo>,
    pub table_charset: Option<&'static CharsetInfo>,
    pub auto_increment: Option<u64>,
    pub comment: Option<String>,
    pub row_format: Option<RowFormat>,
    pub stats_auto_recalc: Option<Ternary>,
    pub stats_persistent: Option<Ternary>,
    pub stats_sample_pages: Option<u32>,
    /// Underlying tables of a merge table.
    pub merge_list: Vec<TableRef>,
    pub key_block_size: Option<u64>,
    pub compression: Option<String>,
    pub encryption: Option<String>,
    pub max_rows: Option<u64>,
    pub min_rows: Option<u64>,
    pub avg_row_length: Option<u64>,
    pub checksum: Option<bool>,
    pub tablespace: Option<String>,
    pub data_directory: Option<String>,
    pub index_directory: Option<String>,
    pub engine_attribute: Option<String>,
    pub secondary_engine_attribute: Option<String>,
}

impl CreateInfo {
    /// Record `[DEFAULT] CHARACTER SET`.
    ///
    /// A second declaration naming a different character set conflicts with
    /// the first.
    pub fn set_default_charset(&mut self, value: &'static CharsetInfo) -> Result<()> {
        if self.used_fields.contains(UsedFields::DEFAULT_CHARSET) {
            if let Some(current) = self.default_charset {
                if !current.same_charset(value) {
                    return Err(conflicting_charsets(current, value));
                }
            }
        }
        self.default_charset = Some(value);
        self.used_fields.insert(UsedFields::DEFAULT_CHARSET);
        Ok(())
    }

    /// Record `[DEFAULT] COLLATE`, which must belong to the character set
    /// given so far.
    pub fn set_default_collation(&mut self, collation: &'static CharsetInfo) -> Result<()> {
        self.default_charset =
            charset::merge_charset_and_collation(self.default_charset, Some(collation))?;
        self.used_fields
            .insert(UsedFields::DEFAULT_CHARSET | UsedFields::DEFAULT_COLLATE);
        Ok(())
    }

    /// `CONVERT TO CHARACTER SET <cs> [COLLATE <collation>]`
    pub fn convert_to_charset(
        &mut self,
        cs: &'static CharsetInfo,
        collation: Option<&'static CharsetInfo>,
    ) -> Result<()> {
        let effective = collation.unwrap_or(cs);
        if !cs.same_charset(effective) {
            return Err(DbError::coded(
                ErrorCode::CollationCharsetMismatch,
                [effective.collation, cs.charset],
            ));
        }
        if self.used_fields.contains(UsedFields::DEFAULT_CHARSET) {
            if let Some(current) = self.default_charset {
                if !current.same_charset(effective) {
                    return Err(conflicting_charsets(current, effective));
                }
            }
        }
        self.table_charset = Some(effective);
        self.default_charset = Some(effective);
        self.used_fields
            .insert(UsedFields::CHARSET | UsedFields::DEFAULT_CHARSET);
        if collation.is_some() {
            self.used_fields.insert(UsedFields::DEFAULT_COLLATE);
        }
        Ok(())
    }

    /// Record `ENGINE = <name>`.
    ///
    /// Unknown engines fail when substitution is disabled. Otherwise the
    /// engine is left unset and a warning is returned for the caller to
    /// report.
    pub fn set_engine(&mut self, name: &str, config: &ContextConfig) -> Result<Option<DbError>> {
        self.used_fields.insert(UsedFields::ENGINE);
        self.engine_name = Some(name.to_string());
        match engine::find_engine(name, self.temporary) {
            Some(engine) => {
                self.engine = Some(engine);
                Ok(None)
            }
            None => {
                let err = DbError::coded(ErrorCode::UnknownStorageEngine, [name]);
                if config.no_engine_substitution {
                    return Err(err);
                }
                self.engine = None;
                Ok(Some(err))
            }
        }
    }

    /// If ENGINE named an engine that has to be substituted.
    pub fn needs_engine_substitution(&self) -> bool {
        self.used_fields.contains(UsedFields::ENGINE) && self.engine.is_none()
    }
}

fn conflicting_charsets(current: &CharsetInfo, new: &CharsetInfo) -> DbError {
    DbError::coded(
        ErrorCode::ConflictingDeclarations,
        ["CHARACTER SET ", current.charset, "CHARACTER SET ", new.charset],
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropKind {
    Column,
    Key,
    ForeignKey,
    CheckConstraint,
    /// DROP CONSTRAINT, kind decided when the table is known.
    AnyConstraint,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlterDrop {
    pub kind: DropKind,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AlterColumnChange {
    SetDefault(Expr),
    DropDefault,
    Visibility(bool),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlterColumn {
    pub name: String,
    pub change: AlterColumnChange,
}

/// Columns, keys, constraints and actions of a table DDL statement.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AlterInfo {
    pub flags: AlterFlags,
    pub create_list: Vec<CreateField>,
    pub key_list: Vec<KeySpec>,
    pub foreign_keys: Vec<ForeignKeySpec>,
    pub check_constraints: Vec<CheckConstraintSpec>,
    pub drop_list: Vec<AlterDrop>,
    pub alter_list: Vec<AlterColumn>,
    /// Index name and new visibility.
    pub index_visibility: Vec<(String, bool)>,
    /// Check constraint name and whether it is enforced.
    pub constraint_enforcement: Vec<(String, bool)>,
    /// Old and new column names.
    pub rename_columns: Vec<(String, String)>,
    /// Old and new index names.
    pub rename_keys: Vec<(String, String)>,
    pub new_db_name: Option<String>,
    pub new_table_name: Option<String>,
    /// ENABLE KEYS (true) or DISABLE KEYS (false).
    pub keys_onoff: Option<bool>,
    pub partition: Option<PartitionInfo>,
    /// Partitions named by a partition action.
    pub partition_names: Vec<String>,
    /// Definitions given to ADD or REORGANIZE PARTITION.
    pub new_partitions: Vec<PartitionElement>,
    /// Count for ADD PARTITION PARTITIONS n and COALESCE PARTITION n.
    pub num_parts: u32,
    pub exchange_table: Option<TableRef>,
    pub algorithm: AlterAlgorithm,
    pub lock: AlterLock,
    pub validation: Validation,
}

/// Statement context plus the descriptors a table DDL statement fills in.
pub struct TableDdlContext<'c, 'a> {
    ctx: &'c mut StatementContext<'a>,
    /// Table being created or altered.
    pub table: TableRef,
    pub create_info: CreateInfo,
    pub alter_info: AlterInfo,
    /// Options of the index being set up.
    pub key_create_info: KeyCreateInfo,
}

impl std::fmt::Debug for TableDdlContext<'_, '_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableDdlContext")
            .field("table", &self.table)
            .field("create_info", &self.create_info)
            .field("alter_info", &self.alter_info)
            .finish_non_exhaustive()
    }
}

impl<'c, 'a> TableDdlContext<'c, 'a> {
    pub fn new(ctx: &'c mut StatementContext<'a>, table: TableRef) -> Self {
        TableDdlContext {
            ctx,
            table,
            create_info: CreateInfo::default(),
            alter_info: AlterInfo::default(),
            key_create_info: KeyCreateInfo::default(),
        }
    }

    /// Database of the table being created or altered.
    pub fn table_db(&self) -> Result<Option<String>> {
        Ok(self.ctx.get_table(self.table)?.db.clone())
    }

    /// Report a warning produced while recording an option.
    pub(crate) fn report_warning(&mut self, warning: Option<DbError>) {
        if let Some(warning) = warning {
            if let Some(code) = warning.code() {
                debug!(%warning, "ddl option warning");
                self.ctx.warn(code, warning.args().to_vec());
            }
        }
    }

    pub fn into_descriptors(self) -> (CreateInfo, AlterInfo) {
        (self.create_info, self.alter_info)
    }
}

impl<'a> Deref for TableDdlContext<'_, 'a> {
    type Target = StatementContext<'a>;

    fn deref(&self) -> &Self::Target {
        self.ctx
    }
}

impl DerefMut for TableDdlContext<'_, '_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.ctx
    }
}
