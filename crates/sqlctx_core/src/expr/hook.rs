use sqlctx_error::{DbError, ErrorCode, Result};
use tracing::trace;

use super::{BinaryOperator, Expr, Literal};
use crate::context::query_block::{ParsingPlace, QueryBlockRef};
use crate::resolver::table_list::TableRef;

/// Where an expression is being attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachScope {
    /// Current query block.
    pub block: QueryBlockRef,
    pub place: ParsingPlace,
    /// Innermost block visible to column references.
    pub resolution: Option<QueryBlockRef>,
    pub allows_subselect: bool,
    /// Leaf operands of the join whose ON condition is being attached.
    pub join_operands: Option<(TableRef, TableRef)>,
}

/// Attaches expressions to the scope they appear in.
///
/// Implementations may validate, rewrite or replace the expression. Subqueries
/// inside the expression have already been contextualized when this is
/// called.
pub trait ExpressionHook: Sync {
    fn attach(&self, expr: Expr, scope: &AttachScope) -> Result<Expr>;
}

/// Hook with the checks that do not need type information.
///
/// Rejects aggregates and window functions in clauses that cannot hold them
/// and folds integer arithmetic on literals.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultExpressionHook;

impl ExpressionHook for DefaultExpressionHook {
    fn attach(&self, expr: Expr, scope: &AttachScope) -> Result<Expr> {
        check_placement(&expr, scope.place)?;
        let expr = fold_constants(expr);
        trace!(block = %scope.block, place = ?scope.place, "attached expression");
        Ok(expr)
    }
}

fn check_placement(expr: &Expr, place: ParsingPlace) -> Result<()> {
    match expr {
        Expr::Aggregate { name, .. } => {
            if matches!(
                place,
                ParsingPlace::Where
                    | ParsingPlace::On
                    | ParsingPlace::GroupBy
                    | ParsingPlace::UpdateValue
                    | ParsingPlace::InsertValues
            ) {
                return Err(DbError::coded(ErrorCode::InvalidGroupFuncUse, [] as [String; 0])
                    .with_field("function", name));
            }
        }
        Expr::WindowFunction { name, .. } => {
            if !matches!(place, ParsingPlace::SelectList | ParsingPlace::OrderBy) {
                return Err(DbError::coded(
                    ErrorCode::WindowInvalidWindowFuncUse,
                    [name.clone()],
                ));
            }
        }
        _ => (),
    }

    for child in expr.children() {
        check_placement(child, place)?;
    }
    Ok(())
}

/// Fold `+`, `-` and `*` over integer literals, bottom up. Overflowing
/// operations are left as they are.
fn fold_constants(expr: Expr) -> Expr {
    match expr {
        Expr::Binary { left, op, right } => {
            let left = fold_constants(*left);
            let right = fold_constants(*right);
            if let (Expr::Literal(Literal::Integer(l)), Expr::Literal(Literal::Integer(r))) =
                (&left, &right)
            {
                let folded = match op {
                    BinaryOperator::Plus => l.checked_add(*r),
                    BinaryOperator::Minus => l.checked_sub(*r),
                    BinaryOperator::Multiply => l.checked_mul(*r),
                    _ => None,
                };
                if let Some(v) = folded {
                    return Expr::int(v);
                }
            }
            Expr::binary(left, op, right)
        }
        Expr::Function { name, args } => Expr::Function {
            name,
            args: args.into_iter().map(fold_constants).collect(),
        },
        Expr::Row(items) => Expr::Row(items.into_iter().map(fold_constants).collect()),
        other => other,
    }
}
