//! Column definitions.
//!
//! Each column is built by its own [`ColumnBuilder`]. Attributes that depend
//! on the full type, such as COLLATE, are queued on the builder as appliers
//! and only run when the builder is handed to [`AlterInfo::add_field`]. A
//! column that fails part way is dropped together with its queued appliers.

use std::fmt;

use sqlctx_error::{DbError, ErrorCode, Result};
use tracing::trace;

use super::key::{CheckConstraintSpec, KeySpec};
use super::{AlterFlags, AlterInfo};
use crate::ast::ddl::{
    ColumnFormat,
    ColumnPlace,
    ColumnStorage,
    DataType,
    GeneratedColumn,
    KeyType,
};
use crate::expr::Expr;
use crate::registry::charset::{self, CharsetInfo};
use crate::resolver::check_ident_length;

flag_set! {
    /// Column properties known after the definition.
    pub struct ColumnFlags(u32) {
        const NOT_NULL = 0;
        /// NULL written explicitly.
        const EXPLICIT_NULL = 1;
        const AUTO_INCREMENT = 2;
        const PRI_KEY = 3;
        const UNIQUE_KEY = 4;
        const UNSIGNED = 5;
        const ZEROFILL = 6;
        const BINARY = 7;
        const INVISIBLE = 8;
        const NOT_SECONDARY = 9;
    }
}

/// A column as it will be created.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateField {
    pub name: String,
    /// Old name for CHANGE and MODIFY.
    pub change: Option<String>,
    pub data_type: DataType,
    pub flags: ColumnFlags,
    pub default: Option<Expr>,
    pub on_update: Option<Expr>,
    pub comment: Option<String>,
    pub charset: Option<&'static CharsetInfo>,
    pub has_explicit_collation: bool,
    pub column_format: Option<ColumnFormat>,
    pub storage: Option<ColumnStorage>,
    pub srid: Option<u32>,
    pub generated: Option<GeneratedColumn>,
    pub check_constraints: Vec<CheckConstraintSpec>,
    pub engine_attribute: Option<String>,
    pub secondary_engine_attribute: Option<String>,
    pub place: Option<ColumnPlace>,
}

type Applier = Box<dyn FnOnce(&mut CreateField, &mut AlterInfo) -> Result<()>>;

/// Builds a single [`CreateField`].
pub struct ColumnBuilder {
    field: CreateField,
    /// Flags merged into the descriptor when the column is added.
    pub alter_flags: AlterFlags,
    appliers: Vec<Applier>,
}

impl fmt::Debug for ColumnBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnBuilder")
            .field("field", &self.field)
            .field("alter_flags", &self.alter_flags)
            .field("appliers", &self.appliers.len())
            .finish()
    }
}

impl ColumnBuilder {
    /// Start a column of the given type.
    ///
    /// A character set given with the type is resolved here.
    pub fn new(name: &str, data_type: DataType) -> Result<Self> {
        check_ident_length(name)?;
        let charset = match &data_type.charset {
            Some(cs) => Some(charset::resolve_charset(cs)?),
            None => None,
        };

        let mut flags = ColumnFlags::empty();
        if data_type.unsigned {
            flags.insert(ColumnFlags::UNSIGNED);
        }
        if data_type.zerofill {
            flags.insert(ColumnFlags::ZEROFILL | ColumnFlags::UNSIGNED);
        }
        if data_type.binary {
            flags.insert(ColumnFlags::BINARY);
        }

        Ok(ColumnBuilder {
            field: CreateField {
                name: name.to_string(),
                change: None,
                data_type,
                flags,
                default: None,
                on_update: None,
                comment: None,
                charset,
                has_explicit_collation: false,
                column_format: None,
                storage: None,
                srid: None,
                generated: None,
                check_constraints: Vec::new(),
                engine_attribute: None,
                secondary_engine_attribute: None,
                place: None,
            },
            alter_flags: AlterFlags::empty(),
            appliers: Vec::new(),
        })
    }

    pub fn field(&self) -> &CreateField {
        &self.field
    }

    pub fn field_mut(&mut self) -> &mut CreateField {
        &mut self.field
    }

    /// Queue a change to run once the column is complete.
    pub fn push_applier<F>(&mut self, applier: F)
    where
        F: FnOnce(&mut CreateField, &mut AlterInfo) -> Result<()> + 'static,
    {
        self.appliers.push(Box::new(applier));
    }

    pub fn pending_appliers(&self) -> usize {
        self.appliers.len()
    }

    /// `COLLATE <name>`, merged with the column character set once known.
    pub fn collate(&mut self, collation: &str) -> Result<()> {
        let collation = charset::resolve_collation(collation)?;
        self.push_applier(move |field, _| {
            field.charset = charset::merge_charset_and_collation(field.charset, Some(collation))?;
            field.has_explicit_collation = true;
            Ok(())
        });
        Ok(())
    }

    /// `ENGINE_ATTRIBUTE` and `SECONDARY_ENGINE_ATTRIBUTE`.
    pub fn engine_attribute(&mut self, attr: String, secondary: bool) {
        self.push_applier(move |field, alter_info| {
            if secondary {
                field.secondary_engine_attribute = Some(attr);
            } else {
                field.engine_attribute = Some(attr);
            }
            alter_info.flags.insert(AlterFlags::ANY_ENGINE_ATTRIBUTE);
            Ok(())
        });
    }

    /// Column level CHECK constraint.
    pub fn check_constraint(&mut self, check: CheckConstraintSpec) {
        self.alter_flags.insert(AlterFlags::ADD_CHECK_CONSTRAINT);
        self.push_applier(move |field, _| {
            field.check_constraints.push(check);
            Ok(())
        });
    }

    /// `SRID <n>`, limited to 32 bits.
    pub fn srid(&mut self, srid: u64) -> Result<()> {
        let srid = u32::try_from(srid).map_err(|_| {
            DbError::coded(ErrorCode::DataOutOfRange, ["SRID", "column definition"])
        })?;
        self.field.srid = Some(srid);
        Ok(())
    }

    pub fn set_nullable(&mut self, nullable: bool) {
        if nullable {
            self.field.flags.remove(ColumnFlags::NOT_NULL);
            self.field.flags.insert(ColumnFlags::EXPLICIT_NULL);
        } else {
            self.field.flags.insert(ColumnFlags::NOT_NULL);
            self.field.flags.remove(ColumnFlags::EXPLICIT_NULL);
        }
    }
}

impl AlterInfo {
    /// Finish a column and add it to the create list.
    ///
    /// Queued appliers run in declaration order. Inline PRIMARY KEY and
    /// UNIQUE create single column keys.
    pub fn add_field(&mut self, builder: ColumnBuilder) -> Result<()> {
        let ColumnBuilder {
            mut field,
            alter_flags,
            appliers,
        } = builder;
        for applier in appliers {
            applier(&mut field, self)?;
        }

        if field.flags.contains(ColumnFlags::PRI_KEY) {
            self.key_list
                .push(KeySpec::for_column(KeyType::Primary, &field.name));
            self.flags.insert(AlterFlags::ADD_INDEX);
        }
        if field.flags.contains(ColumnFlags::UNIQUE_KEY) {
            self.key_list
                .push(KeySpec::for_column(KeyType::Unique, &field.name));
            self.flags.insert(AlterFlags::ADD_INDEX);
        }

        trace!(column = %field.name, flags = ?field.flags, "add column");
        self.flags.insert(alter_flags);
        self.create_list.push(field);
        Ok(())
    }
}
