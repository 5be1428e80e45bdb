use sqlctx_error::{DbError, ErrorCode, Result};
use tracing::trace;

use super::{AlterFlags, TableDdlContext};
use crate::ast::ddl::{
    CheckConstraintDef,
    FkAction,
    FkMatch,
    ForeignKeyDef,
    IndexAlgorithm,
    IndexDef,
    IndexOption,
    KeyPart,
    KeyPartTarget,
    KeyType,
};
use crate::ast::query::OrderDirection;
use crate::expr::Expr;
use crate::resolver::{check_db_name, check_ident_length, check_table_name};

/// Options of the index currently being set up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCreateInfo {
    pub algorithm: Option<IndexAlgorithm>,
    pub block_size: u64,
    pub comment: Option<String>,
    pub is_visible: bool,
    pub parser: Option<String>,
    pub engine_attribute: Option<String>,
    pub secondary_engine_attribute: Option<String>,
}

impl Default for KeyCreateInfo {
    fn default() -> Self {
        KeyCreateInfo {
            algorithm: None,
            block_size: 0,
            comment: None,
            is_visible: true,
            parser: None,
            engine_attribute: None,
            secondary_engine_attribute: None,
        }
    }
}

impl KeyCreateInfo {
    fn apply(&mut self, option: &IndexOption) {
        match option {
            IndexOption::Algorithm(algorithm) => self.algorithm = Some(*algorithm),
            IndexOption::KeyBlockSize(size) => self.block_size = *size,
            IndexOption::Comment(comment) => self.comment = Some(comment.clone()),
            IndexOption::Visibility(visible) => self.is_visible = *visible,
            IndexOption::Parser(parser) => self.parser = Some(parser.clone()),
            IndexOption::EngineAttribute(attr) => self.engine_attribute = Some(attr.clone()),
            IndexOption::SecondaryEngineAttribute(attr) => {
                self.secondary_engine_attribute = Some(attr.clone())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum KeyPartSpec {
    Column {
        name: String,
        prefix: Option<u32>,
        order: OrderDirection,
    },
    /// Functional key part.
    Expr { expr: Expr, order: OrderDirection },
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeySpec {
    pub key_type: KeyType,
    pub name: Option<String>,
    pub options: KeyCreateInfo,
    /// Created implicitly, for a foreign key or an inline column key.
    pub generated: bool,
    pub columns: Vec<KeyPartSpec>,
}

impl KeySpec {
    /// Single column key created by an inline column attribute.
    pub(crate) fn for_column(key_type: KeyType, column: &str) -> Self {
        KeySpec {
            key_type,
            name: None,
            options: KeyCreateInfo::default(),
            generated: false,
            columns: vec![KeyPartSpec::Column {
                name: column.to_string(),
                prefix: None,
                order: OrderDirection::Unspecified,
            }],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKeySpec {
    pub name: Option<String>,
    pub columns: Vec<String>,
    /// Folded referenced database.
    pub ref_db: String,
    /// Referenced database as written, or as inherited.
    pub orig_ref_db: String,
    pub ref_table: String,
    pub orig_ref_table: String,
    pub ref_columns: Vec<String>,
    pub on_delete: FkAction,
    pub on_update: FkAction,
    pub match_option: FkMatch,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckConstraintSpec {
    pub name: Option<String>,
    pub expr: Expr,
    pub enforced: bool,
    /// Column the constraint was declared on, for column constraints.
    pub column: Option<String>,
}

/// Set up an index definition and add its key to the descriptor.
///
/// Key options are reset first, then the algorithm and each option are
/// applied in order. Functional key parts are attached with subqueries
/// disallowed.
pub fn setup_index(ddl: &mut TableDdlContext<'_, '_>, index: &mut IndexDef) -> Result<()> {
    if let Some(name) = &index.name {
        check_ident_length(name.as_str())?;
    }

    ddl.key_create_info = KeyCreateInfo::default();
    if let Some(algorithm) = index.algorithm {
        ddl.key_create_info.algorithm = Some(algorithm);
    }
    for option in &index.options {
        ddl.key_create_info.apply(option);
    }

    let unordered = matches!(index.key_type, KeyType::Fulltext | KeyType::Spatial)
        || ddl.key_create_info.algorithm == Some(IndexAlgorithm::Hash);
    if unordered && index.columns.iter().any(KeyPart::is_explicit) {
        return Err(DbError::coded(
            ErrorCode::WrongUsage,
            ["spatial/fulltext/hash index", "explicit index order"],
        ));
    }

    if index.key_type == KeyType::Primary && !ddl.key_create_info.is_visible {
        return Err(DbError::coded(ErrorCode::PkIndexCantBeInvisible, [] as [String; 0]));
    }

    let columns = build_key_parts(ddl, &mut index.columns)?;
    let spec = KeySpec {
        key_type: index.key_type,
        name: index.name.as_ref().map(|n| n.value.clone()),
        options: ddl.key_create_info.clone(),
        generated: false,
        columns,
    };
    trace!(key_type = ?spec.key_type, name = ?spec.name, "add key");
    ddl.alter_info.key_list.push(spec);
    ddl.alter_info.flags.insert(AlterFlags::ADD_INDEX);
    Ok(())
}

fn build_key_parts(
    ddl: &mut TableDdlContext<'_, '_>,
    parts: &mut [KeyPart],
) -> Result<Vec<KeyPartSpec>> {
    let mut specs = Vec::with_capacity(parts.len());
    for part in parts {
        let spec = match &mut part.target {
            KeyPartTarget::Column { name, prefix } => KeyPartSpec::Column {
                name: name.value.clone(),
                prefix: *prefix,
                order: part.order,
            },
            KeyPartTarget::Expr(expr) => {
                let mut guard = ddl.disallow_subselect();
                guard.attach_in_place(expr)?;
                KeyPartSpec::Expr {
                    expr: expr.clone(),
                    order: part.order,
                }
            }
        };
        specs.push(spec);
    }
    Ok(specs)
}

/// Add a foreign key and the index supporting it.
///
/// The referenced database defaults to the target of a pending RENAME, then
/// to the database of the table being defined.
pub fn setup_foreign_key(ddl: &mut TableDdlContext<'_, '_>, fk: &mut ForeignKeyDef) -> Result<()> {
    let config = ddl.config();
    let references = &fk.references;

    let (ref_db, orig_ref_db) = match &references.table.db {
        Some(db) => {
            check_db_name(db.as_str())?;
            (config.fold_name(db.as_str()), db.value.clone())
        }
        None => {
            let inherited = match &ddl.alter_info.new_db_name {
                Some(db) => Some(db.clone()),
                None => ddl.table_db()?,
            };
            let inherited = inherited
                .ok_or_else(|| DbError::coded(ErrorCode::NoDbError, [] as [String; 0]))?;
            (config.fold_name(&inherited), inherited)
        }
    };

    let orig_ref_table = references.table.table.value.clone();
    check_table_name(&orig_ref_table)?;
    let ref_table = config.fold_name(&orig_ref_table);

    let name = fk
        .constraint_name
        .as_ref()
        .or(fk.key_name.as_ref())
        .map(|n| n.value.clone());
    if let Some(name) = &name {
        check_ident_length(name)?;
    }

    let mut columns = Vec::with_capacity(fk.columns.len());
    let mut key_parts = Vec::with_capacity(fk.columns.len());
    for part in &fk.columns {
        match &part.target {
            KeyPartTarget::Column { name, prefix } => {
                columns.push(name.value.clone());
                key_parts.push(KeyPartSpec::Column {
                    name: name.value.clone(),
                    prefix: *prefix,
                    order: part.order,
                });
            }
            KeyPartTarget::Expr(_) => {
                return Err(DbError::coded(ErrorCode::ParseError, ["foreign key expression"]));
            }
        }
    }

    let spec = ForeignKeySpec {
        name: name.clone(),
        columns,
        ref_db,
        orig_ref_db,
        ref_table,
        orig_ref_table,
        ref_columns: references.columns.iter().map(|c| c.value.clone()).collect(),
        on_delete: references.on_delete,
        on_update: references.on_update,
        match_option: references.match_option,
    };
    trace!(name = ?spec.name, ref_table = %spec.ref_table, "add foreign key");
    ddl.alter_info.foreign_keys.push(spec);
    ddl.alter_info.key_list.push(KeySpec {
        key_type: KeyType::Multiple,
        name,
        options: KeyCreateInfo::default(),
        generated: true,
        columns: key_parts,
    });
    ddl.alter_info.flags.insert(AlterFlags::ADD_FOREIGN_KEY);
    Ok(())
}

/// Attach the check expression and build the constraint.
pub(crate) fn build_check_constraint(
    ddl: &mut TableDdlContext<'_, '_>,
    check: &mut CheckConstraintDef,
    column: Option<&str>,
) -> Result<CheckConstraintSpec> {
    if let Some(name) = &check.name {
        check_ident_length(name.as_str())?;
    }
    {
        let mut guard = ddl.disallow_subselect();
        guard.attach_in_place(&mut check.expr)?;
    }
    Ok(CheckConstraintSpec {
        name: check.name.as_ref().map(|n| n.value.clone()),
        expr: check.expr.clone(),
        enforced: check.enforced,
        column: column.map(str::to_string),
    })
}

/// Add a table check constraint.
pub fn setup_check_constraint(
    ddl: &mut TableDdlContext<'_, '_>,
    check: &mut CheckConstraintDef,
) -> Result<()> {
    let spec = build_check_constraint(ddl, check, None)?;
    ddl.alter_info.check_constraints.push(spec);
    ddl.alter_info.flags.insert(AlterFlags::ADD_CHECK_CONSTRAINT);
    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::ast::ddl::ReferencesClause;
    use crate::ast::query::Subquery;
    use crate::ast::{Ident, TableIdent};
    use crate::config::session::ContextConfig;
    use crate::resolver::table_list::TableSpec;
    use crate::testutil::{TestContext, select_from};

    fn with_ddl<F>(f: F)
    where
        F: FnOnce(&mut TableDdlContext<'_, '_>),
    {
        let mut t = TestContext::with_config(ContextConfig {
            lower_case_table_names: 1,
            ..Default::default()
        });
        let mut ctx = t.context();
        let table = ctx.add_table(TableSpec::new(TableIdent::new("t1"))).unwrap();
        let mut ddl = TableDdlContext::new(&mut ctx, table);
        f(&mut ddl);
    }

    #[test]
    fn index_options_applied_in_order() {
        with_ddl(|ddl| {
            let mut index = IndexDef::new(KeyType::Multiple, vec![KeyPart::column("a")]);
            index.name = Some(Ident::new("idx"));
            index.algorithm = Some(IndexAlgorithm::Hash);
            index.options = vec![
                IndexOption::Algorithm(IndexAlgorithm::BTree),
                IndexOption::Comment("first".to_string()),
                IndexOption::Comment("second".to_string()),
                IndexOption::Visibility(false),
            ];
            setup_index(ddl, &mut index).unwrap();

            let key = &ddl.alter_info.key_list[0];
            assert_eq!(Some(IndexAlgorithm::BTree), key.options.algorithm);
            assert_eq!(Some("second".to_string()), key.options.comment);
            assert!(!key.options.is_visible);
            assert!(ddl.alter_info.flags.contains(AlterFlags::ADD_INDEX));

            // Options do not carry over to the next index.
            let mut index = IndexDef::new(KeyType::Unique, vec![KeyPart::column("b")]);
            setup_index(ddl, &mut index).unwrap();
            assert_eq!(KeyCreateInfo::default(), ddl.alter_info.key_list[1].options);
        });
    }

    #[test]
    fn explicit_order_rejected_for_unordered_keys() {
        with_ddl(|ddl| {
            let part = KeyPart::column("g").with_order(OrderDirection::Desc);
            let mut index = IndexDef::new(KeyType::Spatial, vec![part.clone()]);
            let err = setup_index(ddl, &mut index).unwrap_err();
            assert_eq!(Some(ErrorCode::WrongUsage), err.code());
            assert_eq!(&["spatial/fulltext/hash index", "explicit index order"], err.args());

            let mut index = IndexDef::new(KeyType::Multiple, vec![part.clone()]);
            index.options = vec![IndexOption::Algorithm(IndexAlgorithm::Hash)];
            let err = setup_index(ddl, &mut index).unwrap_err();
            assert_eq!(Some(ErrorCode::WrongUsage), err.code());

            let mut index = IndexDef::new(KeyType::Multiple, vec![part]);
            setup_index(ddl, &mut index).unwrap();
        });
    }

    #[test]
    fn invisible_primary_key() {
        with_ddl(|ddl| {
            let mut index = IndexDef::new(KeyType::Primary, vec![KeyPart::column("id")]);
            index.options = vec![IndexOption::Visibility(false)];
            let err = setup_index(ddl, &mut index).unwrap_err();
            assert_eq!(Some(ErrorCode::PkIndexCantBeInvisible), err.code());
        });
    }

    #[test]
    fn functional_key_part_without_subquery() {
        with_ddl(|ddl| {
            let part = KeyPart {
                target: KeyPartTarget::Expr(Expr::Subquery(Box::new(Subquery::new(
                    select_from(&["t2"]),
                )))),
                order: OrderDirection::Unspecified,
            };
            let mut index = IndexDef::new(KeyType::Multiple, vec![part]);
            let err = setup_index(ddl, &mut index).unwrap_err();
            assert_eq!(Some(ErrorCode::ParseError), err.code());
            assert!(ddl.allows_subselect());
        });
    }

    #[test]
    fn foreign_key_db_defaults() {
        with_ddl(|ddl| {
            let mut fk = ForeignKeyDef {
                constraint_name: Some(Ident::new("fk1")),
                key_name: Some(Ident::new("ignored")),
                columns: vec![KeyPart::column("p")],
                references: ReferencesClause::new(
                    TableIdent::new("Parent"),
                    vec![Ident::new("id")],
                ),
            };
            setup_foreign_key(ddl, &mut fk).unwrap();
            let spec = &ddl.alter_info.foreign_keys[0];
            assert_eq!(Some("fk1".to_string()), spec.name);
            assert_eq!("db1", spec.ref_db);
            assert_eq!("parent", spec.ref_table);
            assert_eq!("Parent", spec.orig_ref_table);

            let key = ddl.alter_info.key_list.last().unwrap();
            assert!(key.generated);
            assert_eq!(KeyType::Multiple, key.key_type);

            ddl.alter_info.new_db_name = Some("db2".to_string());
            setup_foreign_key(ddl, &mut fk).unwrap();
            assert_eq!("db2", ddl.alter_info.foreign_keys[1].ref_db);

            fk.references.table = TableIdent::qualified("Db3", "parent");
            setup_foreign_key(ddl, &mut fk).unwrap();
            assert_eq!("db3", ddl.alter_info.foreign_keys[2].ref_db);
            assert_eq!("Db3", ddl.alter_info.foreign_keys[2].orig_ref_db);
            assert!(ddl.alter_info.flags.contains(AlterFlags::ADD_FOREIGN_KEY));
        });
    }

    #[test]
    fn foreign_key_bad_names() {
        with_ddl(|ddl| {
            let mut fk = ForeignKeyDef {
                constraint_name: Some(Ident::new("x".repeat(65))),
                key_name: None,
                columns: vec![KeyPart::column("p")],
                references: ReferencesClause::new(TableIdent::new("parent"), vec![]),
            };
            let err = setup_foreign_key(ddl, &mut fk).unwrap_err();
            assert_eq!(Some(ErrorCode::TooLongIdent), err.code());

            fk.constraint_name = None;
            fk.references.table = TableIdent::new("bad ");
            let err = setup_foreign_key(ddl, &mut fk).unwrap_err();
            assert_eq!(Some(ErrorCode::WrongTableName), err.code());
            assert!(ddl.alter_info.foreign_keys.is_empty());
        });
    }

    #[test]
    fn check_constraint() {
        with_ddl(|ddl| {
            let mut check = CheckConstraintDef {
                name: Some(Ident::new("c1")),
                expr: Expr::column("a"),
                enforced: false,
            };
            setup_check_constraint(ddl, &mut check).unwrap();
            assert_eq!(1, ddl.alter_info.check_constraints.len());
            assert!(!ddl.alter_info.check_constraints[0].enforced);
            assert!(ddl.alter_info.flags.contains(AlterFlags::ADD_CHECK_CONSTRAINT));
        });
    }
}
