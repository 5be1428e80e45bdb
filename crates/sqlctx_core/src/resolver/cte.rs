use std::fmt;

use indexmap::IndexMap;
use sqlctx_error::{DbError, ErrorCode, OptionExt, Result};
use tracing::debug;

use crate::ast::Ident;
use crate::ast::query::{QueryExpression, Subquery};
use crate::context::StatementContext;
use crate::context::lock::LockRequest;
use crate::context::query_block::{Linkage, ParsingPlace};
use crate::resolver::table_list::{TableEntry, TableRef, TableSource};

/// Reference to a WITH list in the statement context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WithListRef {
    pub with_idx: usize,
}

impl fmt::Display for WithListRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WITH_{}", self.with_idx)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CteDefinition {
    pub name: String,
    pub columns: Vec<String>,
    /// Unresolved body. Each reference contextualizes its own copy.
    pub body: QueryExpression,
}

/// Common table expressions of one WITH clause, in declaration order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WithList {
    pub recursive: bool,
    pub ctes: IndexMap<String, CteDefinition>,
}

impl WithList {
    pub fn new(recursive: bool) -> Self {
        WithList {
            recursive,
            ctes: IndexMap::new(),
        }
    }

    /// Add a definition. Names must be unique within the list.
    pub fn push(&mut self, def: CteDefinition) -> Result<()> {
        if self.ctes.contains_key(&def.name) {
            return Err(DbError::coded(ErrorCode::NonUniqTable, [def.name]));
        }
        self.ctes.insert(def.name.clone(), def);
        Ok(())
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.ctes.get_index_of(name)
    }

    pub fn get(&self, index: usize) -> Option<&CteDefinition> {
        self.ctes.get_index(index).map(|(_, def)| def)
    }
}

impl StatementContext<'_> {
    pub fn add_with_list(&mut self, list: WithList) -> WithListRef {
        let with_idx = self.with_lists.len();
        self.with_lists.push(list);
        WithListRef { with_idx }
    }

    pub fn get_with_list(&self, with_list: WithListRef) -> Result<&WithList> {
        self.with_lists
            .get(with_list.with_idx)
            .ok_or_else(|| DbError::new("Missing WITH list").with_field("with_list", with_list))
    }

    /// Find the common table expression an unqualified table name refers to.
    ///
    /// WITH lists are searched from the current unit outward. In a
    /// non-recursive list, a definition being expanded only sees the
    /// definitions before it.
    pub fn find_cte(&self, name: &str) -> Result<Option<(WithListRef, usize)>> {
        let name = self.config().fold_name(name);
        let mut block = Some(self.current_select());

        while let Some(current) = block {
            let unit = self.get_unit(self.get_block(current)?.unit)?;
            if let Some(with_list) = unit.with_list {
                let list = self.get_with_list(with_list)?;
                if let Some(index) = list.position(&name) {
                    let expanding = self
                        .cte_expansions
                        .iter()
                        .rev()
                        .find(|(l, _)| *l == with_list)
                        .map(|(_, idx)| *idx);
                    let visible = list.recursive || expanding.is_none_or(|idx| index < idx);
                    if visible {
                        return Ok(Some((with_list, index)));
                    }
                }
            }
            block = unit.outer_block;
        }

        Ok(None)
    }

    /// Register a reference to a common table expression in the current
    /// block.
    ///
    /// A reference from inside the definition's own expansion becomes a
    /// recursive reference. Any other reference contextualizes a fresh copy of
    /// the body as a derived unit.
    pub(crate) fn add_cte_reference(
        &mut self,
        with_list: WithListRef,
        index: usize,
        alias: Option<Ident>,
        in_block: bool,
    ) -> Result<TableRef> {
        let def = self
            .get_with_list(with_list)?
            .get(index)
            .required("common table expression")?;
        let name = def.name.clone();
        let columns = def.columns.clone();
        let body = def.body.clone();

        let source = if self.cte_expansions.contains(&(with_list, index)) {
            TableSource::RecursiveCte { with_list, index }
        } else {
            let outer = self.current_select();
            let outer_scope = self.get_block(outer)?.outer_resolution;
            let mut body = Box::new(Subquery::new(body));
            let unit = {
                let mut place = self.enter_place(ParsingPlace::Derived);
                let mut expansion = place.enter_cte_expansion(with_list, index);
                body.contextualize_unit(&mut expansion, Linkage::Derived, outer_scope)?
            };
            TableSource::Cte {
                with_list,
                index,
                unit,
                body,
            }
        };
        debug!(%name, %with_list, index, ?source, "common table expression reference");

        let block = self.current_select();
        let mut entry = TableEntry::new(name, source, LockRequest::read());
        if let Some(alias) = alias {
            entry.alias = alias.value;
            entry.is_alias = true;
        }
        entry.block = Some(block);
        entry.columns = columns;

        let table = self.tables.push(entry);
        if in_block {
            self.get_block_mut(block)?.tables.push(table);
        }
        Ok(table)
    }
}
