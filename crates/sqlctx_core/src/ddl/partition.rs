use sqlctx_error::{DbError, ErrorCode, Result};
use tracing::trace;

use crate::ast::ddl::{
    PartitionClause,
    PartitionDef,
    PartitionMethod,
    PartitionOption,
    PartitionValues,
};
use crate::context::StatementContext;
use crate::expr::Expr;
use crate::resolver::check_ident_length;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionType {
    Hash,
    Key,
    Range,
    List,
}

/// How rows are assigned to partitions or subpartitions.
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionScheme {
    pub part_type: PartitionType,
    pub linear: bool,
    /// Partitioning function for HASH, RANGE and LIST.
    pub expr: Option<Expr>,
    /// Columns for KEY, RANGE COLUMNS and LIST COLUMNS.
    pub columns: Vec<String>,
    /// RANGE COLUMNS or LIST COLUMNS.
    pub column_list: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PartitionElement {
    pub name: String,
    pub values: PartitionValues,
    pub options: Vec<PartitionOption>,
    pub subpartitions: Vec<PartitionElement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PartitionInfo {
    pub scheme: PartitionScheme,
    pub num_parts: u32,
    pub subpart: Option<PartitionScheme>,
    pub num_subparts: u32,
    pub partitions: Vec<PartitionElement>,
    /// No partition definitions were given.
    pub use_default_partitions: bool,
}

/// Build the partitioning of a table from `PARTITION BY`.
pub fn build_partition_info(
    ctx: &mut StatementContext<'_>,
    clause: &mut PartitionClause,
) -> Result<PartitionInfo> {
    if clause.count == Some(0) {
        return Err(DbError::coded(ErrorCode::NoPartsError, ["partitions"]));
    }
    if clause.definitions.is_empty() && clause.method.requires_definitions() {
        let method = match clause.method {
            PartitionMethod::Range(_) | PartitionMethod::RangeColumns(_) => "RANGE",
            _ => "LIST",
        };
        return Err(DbError::coded(ErrorCode::PartitionsMustBeDefined, [method]));
    }
    if let Some(count) = clause.count {
        if !clause.definitions.is_empty() && count as usize != clause.definitions.len() {
            return Err(DbError::coded(
                ErrorCode::PartitionWrongNoPart,
                [] as [String; 0],
            ));
        }
    }

    let scheme = build_scheme(ctx, &mut clause.method)?;
    let (subpart, num_subparts) = match &mut clause.subpartition {
        Some(sub) => {
            if !matches!(
                sub.method,
                PartitionMethod::Hash { .. } | PartitionMethod::Key { .. }
            ) {
                return Err(DbError::coded(ErrorCode::ParseError, ["SUBPARTITION BY"]));
            }
            if sub.count == Some(0) {
                return Err(DbError::coded(ErrorCode::NoPartsError, ["subpartitions"]));
            }
            let scheme = build_scheme(ctx, &mut sub.method)?;
            (Some(scheme), sub.count.unwrap_or(0))
        }
        None => (None, 0),
    };

    let partitions = build_partition_elements(ctx, &mut clause.definitions)?;
    let use_default_partitions = partitions.is_empty();
    let num_parts = if use_default_partitions {
        clause.count.unwrap_or(1)
    } else {
        u32::try_from(partitions.len())
            .map_err(|_| DbError::coded(ErrorCode::OutOfResources, ["partitions"]))?
    };

    trace!(part_type = ?scheme.part_type, num_parts, "partition by");
    Ok(PartitionInfo {
        scheme,
        num_parts,
        subpart,
        num_subparts,
        partitions,
        use_default_partitions,
    })
}

fn build_scheme(
    ctx: &mut StatementContext<'_>,
    method: &mut PartitionMethod,
) -> Result<PartitionScheme> {
    let (part_type, linear, expr, columns, column_list) = match method {
        PartitionMethod::Hash { linear, expr } => {
            (PartitionType::Hash, *linear, Some(expr), Vec::new(), false)
        }
        PartitionMethod::Key { linear, columns } => {
            (PartitionType::Key, *linear, None, columns.clone(), false)
        }
        PartitionMethod::Range(expr) => (PartitionType::Range, false, Some(expr), Vec::new(), false),
        PartitionMethod::RangeColumns(columns) => {
            (PartitionType::Range, false, None, columns.clone(), true)
        }
        PartitionMethod::List(expr) => (PartitionType::List, false, Some(expr), Vec::new(), false),
        PartitionMethod::ListColumns(columns) => {
            (PartitionType::List, false, None, columns.clone(), true)
        }
    };

    let expr = match expr {
        Some(expr) => {
            let mut guard = ctx.disallow_subselect();
            guard.attach_in_place(expr)?;
            Some(expr.clone())
        }
        None => None,
    };

    Ok(PartitionScheme {
        part_type,
        linear,
        expr,
        columns: columns.into_iter().map(|c| c.value).collect(),
        column_list,
    })
}

/// Build partition definitions. Value expressions are attached with
/// subqueries disallowed.
pub fn build_partition_elements(
    ctx: &mut StatementContext<'_>,
    definitions: &mut [PartitionDef],
) -> Result<Vec<PartitionElement>> {
    let mut elements = Vec::new();
    elements
        .try_reserve(definitions.len())
        .map_err(|_| DbError::coded(ErrorCode::OutOfResources, ["partitions"]))?;

    for def in definitions {
        check_ident_length(def.name.as_str())?;
        {
            let mut guard = ctx.disallow_subselect();
            match &mut def.values {
                PartitionValues::None => (),
                PartitionValues::LessThan(values) => {
                    for value in values.iter_mut().flatten() {
                        guard.attach_in_place(value)?;
                    }
                }
                PartitionValues::In(rows) => {
                    for row in rows {
                        guard.attach_all(row)?;
                    }
                }
            }
        }

        let mut subpartitions = Vec::with_capacity(def.subpartitions.len());
        for sub in &def.subpartitions {
            check_ident_length(sub.name.as_str())?;
            subpartitions.push(PartitionElement {
                name: sub.name.value.clone(),
                values: PartitionValues::None,
                options: sub.options.clone(),
                subpartitions: Vec::new(),
            });
        }

        elements.push(PartitionElement {
            name: def.name.value.clone(),
            values: def.values.clone(),
            options: def.options.clone(),
            subpartitions,
        });
    }
    Ok(elements)
}
