use std::fmt;

use sqlctx_error::{DbError, ErrorCode, OptionExt, Result};
use tracing::trace;

use crate::ast::from::IndexHint;
use crate::ast::query::Subquery;
use crate::ast::{Ident, TableIdent};
use crate::config::session::ContextConfig;
use crate::context::StatementContext;
use crate::context::lock::{LockDescriptor, LockRequest, LockType, MdlType};
use crate::context::query_block::{QueryBlockRef, UnitRef};
use crate::expr::Expr;
use crate::resolver::cte::WithListRef;
use crate::resolver::{check_db_name, check_ident_length, check_table_name};

/// Reference to a table in the statement's table list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TableRef {
    pub table_idx: usize,
}

impl From<usize> for TableRef {
    fn from(value: usize) -> Self {
        TableRef { table_idx: value }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.table_idx)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableSource {
    Base,
    /// Derived table owning a query unit.
    Derived { unit: UnitRef, lateral: bool },
    /// Join nest holding its operands in join order.
    Nest { children: Vec<TableRef> },
    /// Table valued function such as JSON_TABLE.
    Function { name: &'static str },
    /// Reference to a common table expression, with its own copy of the body.
    Cte {
        with_list: WithListRef,
        index: usize,
        unit: UnitRef,
        body: Box<Subquery>,
    },
    /// Reference to a recursive common table expression from inside its own
    /// definition.
    RecursiveCte { with_list: WithListRef, index: usize },
    /// Row alias of INSERT ... VALUES.
    InsertValues,
    /// System view read by a SHOW statement.
    SystemView { name: &'static str },
}

/// A table reference registered during contextualization.
#[derive(Debug, Clone, PartialEq)]
pub struct TableEntry {
    pub db: Option<String>,
    pub table_name: String,
    pub alias: String,
    /// Alias was given explicitly.
    pub is_alias: bool,
    /// Database was given explicitly.
    pub is_fqtn: bool,
    pub source: TableSource,
    /// Block this table belongs to, if any.
    pub block: Option<QueryBlockRef>,
    pub lock: LockDescriptor,
    pub mdl: MdlType,
    pub updating: bool,
    /// Names a table by alias only, used for multi-table DELETE targets.
    pub alias_only: bool,
    pub is_temporary: bool,
    pub partitions: Vec<String>,
    pub index_hints: Vec<IndexHint>,
    /// Column names given to a derived table or CTE reference.
    pub columns: Vec<String>,
    /// Right hand side of an outer join.
    pub outer_join: bool,
    /// Operand swapped when rewriting RIGHT JOIN to LEFT JOIN.
    pub join_order_swapped: bool,
    /// Right hand side of STRAIGHT_JOIN.
    pub straight: bool,
    /// Left operand of a NATURAL or USING join.
    pub natural_join: Option<TableRef>,
    pub join_using_fields: Option<Vec<String>>,
    pub join_cond: Option<Expr>,
    /// Nest directly containing this table.
    pub embedding: Option<TableRef>,
    /// Table in the FROM list a multi-table DELETE target resolved to.
    pub correspondent_table: Option<TableRef>,
}

impl TableEntry {
    pub fn new(table_name: impl Into<String>, source: TableSource, request: LockRequest) -> Self {
        let table_name = table_name.into();
        TableEntry {
            db: None,
            alias: table_name.clone(),
            table_name,
            is_alias: false,
            is_fqtn: false,
            source,
            block: None,
            lock: request.lock,
            mdl: request.mdl,
            updating: false,
            alias_only: false,
            is_temporary: false,
            partitions: Vec::new(),
            index_hints: Vec::new(),
            columns: Vec::new(),
            outer_join: false,
            join_order_swapped: false,
            straight: false,
            natural_join: None,
            join_using_fields: None,
            join_cond: None,
            embedding: None,
            correspondent_table: None,
        }
    }

    fn nest(name: &str, children: Vec<TableRef>, block: QueryBlockRef) -> Self {
        let mut entry = TableEntry::new(name, TableSource::Nest { children }, LockRequest::read());
        entry.block = Some(block);
        entry
    }

    pub fn is_base(&self) -> bool {
        matches!(self.source, TableSource::Base)
    }

    pub fn is_derived(&self) -> bool {
        matches!(
            self.source,
            TableSource::Derived { .. } | TableSource::Cte { .. } | TableSource::RecursiveCte { .. }
        )
    }

    pub fn nest_children(&self) -> Option<&[TableRef]> {
        match &self.source {
            TableSource::Nest { children } => Some(children),
            _ => None,
        }
    }

    pub fn set_lock(&mut self, request: LockRequest) {
        self.lock = request.lock;
        self.mdl = request.mdl;
    }
}

/// Arena of every table reference in a statement.
#[derive(Debug, Default)]
pub struct TableList {
    tables: Vec<TableEntry>,
}

impl TableList {
    pub fn push(&mut self, entry: TableEntry) -> TableRef {
        let idx = self.tables.len();
        self.tables.push(entry);
        TableRef { table_idx: idx }
    }

    pub fn get(&self, table: TableRef) -> Result<&TableEntry> {
        self.tables
            .get(table.table_idx)
            .ok_or_else(|| DbError::new("Missing table reference").with_field("table", table))
    }

    pub fn get_mut(&mut self, table: TableRef) -> Result<&mut TableEntry> {
        self.tables
            .get_mut(table.table_idx)
            .ok_or_else(|| DbError::new("Missing table reference").with_field("table", table))
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TableRef, &TableEntry)> {
        self.tables
            .iter()
            .enumerate()
            .map(|(idx, t)| (TableRef { table_idx: idx }, t))
    }

    /// Find the FROM list entry a multi-table DELETE target names.
    ///
    /// A qualified target never matches an aliased candidate. Aliased
    /// candidates match on alias, others on name and database.
    pub fn match_multi_target(
        &self,
        config: &ContextConfig,
        target: TableRef,
        candidates: &[TableRef],
    ) -> Result<TableRef> {
        let target_entry = self.get(target)?;
        let mut found: Option<TableRef> = None;

        for &candidate in candidates {
            let elem = self.get(candidate)?;
            let matches = if target_entry.is_fqtn && elem.is_alias {
                false
            } else if target_entry.is_fqtn && elem.is_fqtn {
                config.names_equal(&elem.table_name, &target_entry.table_name)
                    && elem.db == target_entry.db
            } else if elem.is_alias {
                config.names_equal(&elem.alias, &target_entry.alias)
            } else {
                config.names_equal(&elem.table_name, &target_entry.table_name)
                    && elem.db == target_entry.db
            };

            if matches {
                if found.is_some() {
                    return Err(DbError::coded(ErrorCode::NonUniqTable, [elem.alias.clone()]));
                }
                found = Some(candidate);
            }
        }

        found.ok_or_else(|| {
            DbError::coded(
                ErrorCode::UnknownTable,
                [target_entry.table_name.clone(), "MULTI DELETE".to_string()],
            )
        })
    }
}

/// Description of a table reference to add to the current block.
#[derive(Debug, Clone)]
pub struct TableSpec {
    pub name: TableIdent,
    pub alias: Option<Ident>,
    pub updating: bool,
    pub alias_only: bool,
    /// Lock request, the context default when `None`.
    pub lock: Option<LockRequest>,
    pub partitions: Vec<Ident>,
    pub index_hints: Vec<IndexHint>,
    /// Register in the block's leaf list.
    pub in_block: bool,
    /// Look up unqualified names among common table expressions first.
    pub resolve_cte: bool,
}

impl TableSpec {
    pub fn new(name: TableIdent) -> Self {
        TableSpec {
            name,
            alias: None,
            updating: false,
            alias_only: false,
            lock: None,
            partitions: Vec::new(),
            index_hints: Vec::new(),
            in_block: true,
            resolve_cte: true,
        }
    }

    pub fn alias(mut self, alias: Option<Ident>) -> Self {
        self.alias = alias;
        self
    }

    pub fn updating(mut self, updating: bool) -> Self {
        self.updating = updating;
        self
    }

    pub fn alias_only(mut self, alias_only: bool) -> Self {
        self.alias_only = alias_only;
        self
    }

    pub fn lock(mut self, request: LockRequest) -> Self {
        self.lock = Some(request);
        self
    }

    pub fn outside_block(mut self) -> Self {
        self.in_block = false;
        self
    }

    pub fn base_only(mut self) -> Self {
        self.resolve_cte = false;
        self
    }
}

impl StatementContext<'_> {
    /// Register a named table in the current block.
    ///
    /// Names are checked and folded. Unqualified names matching a visible
    /// common table expression resolve to it. Duplicate aliases are not
    /// checked here.
    pub fn add_table(&mut self, spec: TableSpec) -> Result<TableRef> {
        let config = self.config();
        check_table_name(spec.name.table.as_str())?;
        let db = match &spec.name.db {
            Some(db) => {
                check_db_name(db.as_str())?;
                Some(config.fold_name(db.as_str()))
            }
            None => None,
        };
        if let Some(alias) = &spec.alias {
            check_ident_length(alias.as_str())?;
        }

        if db.is_none() && spec.resolve_cte {
            if let Some((with_list, index)) = self.find_cte(spec.name.table.as_str())? {
                return self.add_cte_reference(with_list, index, spec.alias, spec.in_block);
            }
        }

        let table_name = config.fold_name(spec.name.table.as_str());
        let is_fqtn = db.is_some();
        let db = db.or_else(|| self.env().current_database().map(|s| s.to_string()));
        let request = spec.lock.unwrap_or(self.lock_default());
        let block = self.current_select();

        let mut entry = TableEntry::new(table_name, TableSource::Base, request);
        entry.is_temporary = self
            .env()
            .is_temporary_table(db.as_deref(), &entry.table_name);
        entry.db = db;
        entry.is_fqtn = is_fqtn;
        if let Some(alias) = spec.alias {
            entry.alias = alias.value;
            entry.is_alias = true;
        }
        entry.block = Some(block);
        entry.updating = spec.updating;
        entry.alias_only = spec.alias_only;
        entry.partitions = spec.partitions.into_iter().map(|p| p.value).collect();
        entry.index_hints = spec.index_hints;

        trace!(table = %entry.table_name, alias = %entry.alias, lock = ?entry.lock, "add table");
        let table = self.tables.push(entry);
        if spec.in_block {
            self.get_block_mut(block)?.tables.push(table);
        }
        Ok(table)
    }

    /// Register a table that is not looked up by name, such as a derived
    /// table or table function, in the current block.
    pub fn add_synthetic_table(
        &mut self,
        alias: &str,
        source: TableSource,
        request: LockRequest,
        columns: Vec<String>,
    ) -> Result<TableRef> {
        check_ident_length(alias)?;
        let block = self.current_select();
        let mut entry = TableEntry::new(alias, source, request);
        entry.is_alias = true;
        entry.block = Some(block);
        entry.columns = columns;
        let table = self.tables.push(entry);
        self.get_block_mut(block)?.tables.push(table);
        Ok(table)
    }

    fn current_nest(&self) -> Result<Option<TableRef>> {
        Ok(self.current_block()?.nest_stack.last().copied())
    }

    fn current_join_list_mut(&mut self) -> Result<&mut Vec<TableRef>> {
        match self.current_nest()? {
            Some(nest) => match &mut self.tables.get_mut(nest)?.source {
                TableSource::Nest { children } => Ok(children),
                _ => Err(DbError::new("Open nested join is not a join nest").with_field("table", nest)),
            },
            None => Ok(&mut self.current_block_mut()?.join_list),
        }
    }

    /// Append a table to the join list in effect.
    pub fn add_joined_table(&mut self, table: TableRef) -> Result<()> {
        let embedding = self.current_nest()?;
        self.tables.get_mut(table)?.embedding = embedding;
        self.current_join_list_mut()?.push(table);
        Ok(())
    }

    /// Open a parenthesized join. Tables joined until the matching
    /// [`end_nested_join`](Self::end_nested_join) go into the new nest.
    pub fn init_nested_join(&mut self) -> Result<TableRef> {
        let block = self.current_select();
        let nest = self
            .tables
            .push(TableEntry::nest("(nested_join)", Vec::new(), block));
        self.add_joined_table(nest)?;
        self.current_block_mut()?.nest_stack.push(nest);
        Ok(nest)
    }

    /// Close the innermost parenthesized join.
    ///
    /// A nest with a single table is replaced by that table. An empty nest is
    /// dropped and `None` returned.
    pub fn end_nested_join(&mut self) -> Result<Option<TableRef>> {
        let nest = self
            .current_block_mut()?
            .nest_stack
            .pop()
            .required("open nested join")?;
        let entry = self.tables.get(nest)?;
        let embedding = entry.embedding;
        let children = entry
            .nest_children()
            .required("join nest children")?
            .to_vec();

        match children.as_slice() {
            [] => {
                self.current_join_list_mut()?.retain(|t| *t != nest);
                Ok(None)
            }
            [only] => {
                let only = *only;
                for t in self.current_join_list_mut()?.iter_mut() {
                    if *t == nest {
                        *t = only;
                    }
                }
                self.tables.get_mut(only)?.embedding = embedding;
                Ok(Some(only))
            }
            _ => Ok(Some(nest)),
        }
    }

    /// Move the last `count` entries of the join list in effect into a new
    /// nest, appended in their place.
    pub fn nest_last_join(&mut self, count: usize) -> Result<TableRef> {
        let block = self.current_select();
        let embedding = self.current_nest()?;
        let list = self.current_join_list_mut()?;
        if list.len() < count {
            return Err(DbError::new("Not enough tables in join list to nest")
                .with_field("count", count)
                .with_field("available", list.len()));
        }
        let children = list.split_off(list.len() - count);

        let nest = self
            .tables
            .push(TableEntry::nest("(nest_last_join)", children.clone(), block));
        for child in children {
            self.tables.get_mut(child)?.embedding = Some(nest);
        }
        self.tables.get_mut(nest)?.embedding = embedding;
        self.current_join_list_mut()?.push(nest);
        Ok(nest)
    }

    /// Table of `block` referred to by `name`, matching on alias.
    pub fn find_table_by_name(
        &self,
        block: QueryBlockRef,
        name: &TableIdent,
    ) -> Result<Option<TableRef>> {
        let config = self.config();
        let db = name.db.as_ref().map(|db| config.fold_name(db.as_str()));
        let mut found = None;
        for &table in &self.get_block(block)?.tables {
            let entry = self.tables.get(table)?;
            if !config.names_equal(&entry.alias, name.table.as_str()) {
                continue;
            }
            if db.is_some() && entry.db != db {
                continue;
            }
            if found.is_some() {
                return Err(DbError::coded(
                    ErrorCode::NonUniqTable,
                    [name.table.value.clone()],
                ));
            }
            found = Some(table);
        }
        Ok(found)
    }

    /// Apply a DML lock type to every table of `block`.
    pub fn set_lock_for_tables(&mut self, block: QueryBlockRef, lock_type: LockType) -> Result<()> {
        let request = LockRequest::dml(lock_type);
        let tables = self.get_block(block)?.tables.clone();
        for table in tables {
            let entry = self.tables.get_mut(table)?;
            entry.set_lock(request);
            entry.updating = lock_type.is_write();
        }
        Ok(())
    }

    pub fn get_table(&self, table: TableRef) -> Result<&TableEntry> {
        self.tables.get(table)
    }

    pub fn get_table_mut(&mut self, table: TableRef) -> Result<&mut TableEntry> {
        self.tables.get_mut(table)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::config::session::ContextConfig;
    use crate::testutil::TestContext;

    fn spec(name: &str, alias: Option<&str>) -> TableSpec {
        TableSpec::new(TableIdent::new(name)).alias(alias.map(Ident::new))
    }

    #[test]
    fn alias_defaults_to_name() {
        let mut t = TestContext::new();
        let mut ctx = t.context();
        let table = ctx.add_table(spec("t1", None)).unwrap();
        let entry = ctx.get_table(table).unwrap();
        assert_eq!("t1", entry.alias);
        assert!(!entry.is_alias);
        assert_eq!(Some("db1".to_string()), entry.db);
        assert!(!entry.is_fqtn);
    }

    #[test]
    fn names_are_folded_in_lowercase_mode() {
        let mut t = TestContext::with_config(ContextConfig {
            lower_case_table_names: 1,
            ..Default::default()
        });
        let mut ctx = t.context();
        let table = ctx
            .add_table(TableSpec::new(TableIdent::qualified("DB2", "T1")))
            .unwrap();
        let entry = ctx.get_table(table).unwrap();
        assert_eq!("t1", entry.table_name);
        assert_eq!(Some("db2".to_string()), entry.db);
        assert!(entry.is_fqtn);
    }

    #[test]
    fn bad_names_rejected() {
        let mut t = TestContext::new();
        let mut ctx = t.context();

        let err = ctx.add_table(spec("t1 ", None)).unwrap_err();
        assert_eq!(Some(ErrorCode::WrongTableName), err.code());

        let err = ctx.add_table(spec(&"x".repeat(65), None)).unwrap_err();
        assert_eq!(Some(ErrorCode::TooLongIdent), err.code());

        let err = ctx
            .add_table(TableSpec::new(TableIdent::qualified("", "t1")))
            .unwrap_err();
        assert_eq!(Some(ErrorCode::WrongDbName), err.code());
    }

    #[test]
    fn nest_last_join_moves_tail() {
        let mut t = TestContext::new();
        let mut ctx = t.context();
        let a = ctx.add_table(spec("a", None)).unwrap();
        ctx.add_joined_table(a).unwrap();
        let b = ctx.add_table(spec("b", None)).unwrap();
        ctx.add_joined_table(b).unwrap();
        let c = ctx.add_table(spec("c", None)).unwrap();
        ctx.add_joined_table(c).unwrap();

        let nest = ctx.nest_last_join(2).unwrap();
        assert_eq!(vec![a, nest], ctx.current_block().unwrap().join_list);
        assert_eq!(
            Some(&[b, c][..]),
            ctx.get_table(nest).unwrap().nest_children()
        );
        assert_eq!(Some(nest), ctx.get_table(b).unwrap().embedding);
        assert_eq!(vec![a, b, c], ctx.current_block().unwrap().tables);
    }

    #[test]
    fn single_table_nest_unwrapped() {
        let mut t = TestContext::new();
        let mut ctx = t.context();
        ctx.init_nested_join().unwrap();
        let a = ctx.add_table(spec("a", None)).unwrap();
        ctx.add_joined_table(a).unwrap();
        let out = ctx.end_nested_join().unwrap();

        assert_eq!(Some(a), out);
        assert_eq!(vec![a], ctx.current_block().unwrap().join_list);
        assert_eq!(None, ctx.get_table(a).unwrap().embedding);
    }

    #[test]
    fn empty_nest_dropped() {
        let mut t = TestContext::new();
        let mut ctx = t.context();
        ctx.init_nested_join().unwrap();
        assert_eq!(None, ctx.end_nested_join().unwrap());
        assert!(ctx.current_block().unwrap().join_list.is_empty());
    }

    #[test]
    fn find_by_alias_requires_unique_match() {
        let mut t = TestContext::new();
        let mut ctx = t.context();
        ctx.add_table(spec("t1", Some("a"))).unwrap();
        let b = ctx.add_table(spec("t2", Some("b"))).unwrap();
        let block = ctx.current_select();

        assert_eq!(Some(b), ctx.find_table_by_name(block, &TableIdent::new("b")).unwrap());
        assert_eq!(None, ctx.find_table_by_name(block, &TableIdent::new("t1")).unwrap());

        ctx.add_table(spec("t3", Some("b"))).unwrap();
        let err = ctx
            .find_table_by_name(block, &TableIdent::new("b"))
            .unwrap_err();
        assert_eq!(Some(ErrorCode::NonUniqTable), err.code());
    }

    #[test]
    fn multi_target_matching() {
        let mut t = TestContext::new();
        let mut ctx = t.context();
        let config = ContextConfig::default();

        // FROM t1 AS a, t2 AS b
        let ta = ctx.add_table(spec("t1", Some("a"))).unwrap();
        let tb = ctx.add_table(spec("t2", Some("b"))).unwrap();
        let candidates = vec![ta, tb];

        let target_a = ctx
            .add_table(spec("a", None).alias_only(true).outside_block())
            .unwrap();
        assert_eq!(
            ta,
            ctx.tables
                .match_multi_target(&config, target_a, &candidates)
                .unwrap()
        );

        let target_t1 = ctx
            .add_table(spec("t1", None).alias_only(true).outside_block())
            .unwrap();
        let err = ctx
            .tables
            .match_multi_target(&config, target_t1, &candidates)
            .unwrap_err();
        assert_eq!(Some(ErrorCode::UnknownTable), err.code());
        assert_eq!(&["t1".to_string(), "MULTI DELETE".to_string()], err.args());

        // FROM t1, t1 AS c
        let plain = ctx.add_table(spec("t1", None)).unwrap();
        let aliased = ctx.add_table(spec("t1", Some("c"))).unwrap();
        let candidates = vec![plain, aliased];
        assert_eq!(
            plain,
            ctx.tables
                .match_multi_target(&config, target_t1, &candidates)
                .unwrap()
        );
        let target_c = ctx
            .add_table(spec("c", None).alias_only(true).outside_block())
            .unwrap();
        assert_eq!(
            aliased,
            ctx.tables
                .match_multi_target(&config, target_c, &candidates)
                .unwrap()
        );
    }

    #[test]
    fn qualified_target_skips_aliased_candidates() {
        let mut t = TestContext::new();
        let mut ctx = t.context();
        let config = ContextConfig::default();

        let aliased = ctx
            .add_table(TableSpec::new(TableIdent::qualified("db1", "t1")).alias(Some(Ident::new("t1"))))
            .unwrap();
        let plain = ctx
            .add_table(TableSpec::new(TableIdent::qualified("db1", "t1")))
            .unwrap();
        let target = ctx
            .add_table(TableSpec::new(TableIdent::qualified("db1", "t1")).outside_block())
            .unwrap();

        assert_eq!(
            plain,
            ctx.tables
                .match_multi_target(&config, target, &[aliased, plain])
                .unwrap()
        );
    }

    #[test]
    fn ambiguous_multi_target() {
        let mut t = TestContext::new();
        let mut ctx = t.context();
        let config = ContextConfig::default();
        let first = ctx.add_table(spec("t1", None)).unwrap();
        let second = ctx.add_table(spec("t1", None)).unwrap();
        let target = ctx.add_table(spec("t1", None).outside_block()).unwrap();

        let err = ctx
            .tables
            .match_multi_target(&config, target, &[first, second])
            .unwrap_err();
        assert_eq!(Some(ErrorCode::NonUniqTable), err.code());
    }

    #[test]
    fn lock_for_tables_marks_updating() {
        let mut t = TestContext::new();
        let mut ctx = t.context();
        let a = ctx.add_table(spec("a", None)).unwrap();
        let block = ctx.current_select();
        ctx.set_lock_for_tables(block, LockType::WriteLowPriority)
            .unwrap();

        let entry = ctx.get_table(a).unwrap();
        assert_eq!(LockType::WriteLowPriority, entry.lock.lock_type);
        assert_eq!(MdlType::SharedWriteLowPrio, entry.mdl);
        assert!(entry.updating);
    }
}
