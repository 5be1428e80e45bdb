//! Unresolved value expressions and the hook used to attach them.
//!
//! The pass does not interpret expressions. Wherever an expression appears it
//! hands it to an [`ExpressionHook`] together with the scope it appears in,
//! and keeps whatever expression the hook returns.
pub mod hook;

use std::fmt;

use sqlctx_error::{DbError, Result};

pub use hook::{AttachScope, DefaultExpressionHook, ExpressionHook};

use crate::ast::query::{Subquery, WindowSpec};
use crate::ast::set::OptionType;
use crate::ast::{ColumnRef, Ident};

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Literal {
    #[default]
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl Literal {
    pub fn try_as_bool(&self) -> Result<bool> {
        match self {
            Literal::Boolean(b) => Ok(*b),
            Literal::Integer(0) => Ok(false),
            Literal::Integer(1) => Ok(true),
            other => Err(DbError::new(format!("Not a bool: {other}"))),
        }
    }

    pub fn try_as_i64(&self) -> Result<i64> {
        match self {
            Literal::Integer(i) => Ok(*i),
            other => Err(DbError::new(format!("Not an integer: {other}"))),
        }
    }

    pub fn try_as_str(&self) -> Result<&str> {
        match self {
            Literal::String(s) => Ok(s),
            other => Err(DbError::new(format!("Not a string: {other}"))),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => write!(f, "NULL"),
            Literal::Boolean(b) => write!(f, "{b}"),
            Literal::Integer(i) => write!(f, "{i}"),
            Literal::Float(v) => write!(f, "{v}"),
            Literal::String(s) => write!(f, "'{s}'"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Plus,
    Minus,
    Multiply,
    Divide,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
    Like,
}

impl BinaryOperator {
    /// If the operator produces a truth value.
    pub fn is_boolean(&self) -> bool {
        !matches!(
            self,
            BinaryOperator::Plus
                | BinaryOperator::Minus
                | BinaryOperator::Multiply
                | BinaryOperator::Divide
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Not,
    Negate,
    IsNull,
    IsNotNull,
    IsTrue,
}

/// Window used by a window function call.
#[derive(Debug, Clone, PartialEq)]
pub enum WindowRef {
    Named(Ident),
    Inline(Box<WindowSpec>),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Expr {
    #[default]
    Default,
    Literal(Literal),
    Column(ColumnRef),
    /// `@name`
    UserVariable(String),
    /// `@@scope.name`
    SystemVariable {
        scope: OptionType,
        name: String,
    },
    Function {
        name: String,
        args: Vec<Expr>,
    },
    Aggregate {
        name: String,
        args: Vec<Expr>,
        distinct: bool,
    },
    WindowFunction {
        name: String,
        args: Vec<Expr>,
        window: WindowRef,
    },
    Unary {
        op: UnaryOperator,
        expr: Box<Expr>,
    },
    Binary {
        left: Box<Expr>,
        op: BinaryOperator,
        right: Box<Expr>,
    },
    Row(Vec<Expr>),
    Subquery(Box<Subquery>),
    Exists(Box<Subquery>),
    InSubquery {
        expr: Box<Expr>,
        subquery: Box<Subquery>,
        negated: bool,
    },
}

impl Expr {
    pub fn int(v: i64) -> Expr {
        Expr::Literal(Literal::Integer(v))
    }

    pub fn string(s: impl Into<String>) -> Expr {
        Expr::Literal(Literal::String(s.into()))
    }

    pub fn column(name: &str) -> Expr {
        Expr::Column(ColumnRef::new(name))
    }

    pub fn binary(left: Expr, op: BinaryOperator, right: Expr) -> Expr {
        Expr::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    /// If evaluating this expression produces a truth value.
    pub fn is_bool_func(&self) -> bool {
        match self {
            Expr::Binary { op, .. } => op.is_boolean(),
            Expr::Unary { op, .. } => !matches!(op, UnaryOperator::Negate),
            Expr::Exists(_) | Expr::InSubquery { .. } => true,
            Expr::Literal(Literal::Boolean(_)) => true,
            _ => false,
        }
    }

    /// Wrap a non-boolean expression into `expr <> 0`.
    pub fn into_condition(self) -> Expr {
        if self.is_bool_func() {
            return self;
        }
        Expr::binary(self, BinaryOperator::NotEq, Expr::int(0))
    }

    /// Direct children that are part of the same scope.
    ///
    /// Subquery bodies are not included.
    pub fn children_mut(&mut self) -> Vec<&mut Expr> {
        match self {
            Expr::Function { args, .. } | Expr::Aggregate { args, .. } | Expr::Row(args) => {
                args.iter_mut().collect()
            }
            Expr::WindowFunction { args, window, .. } => {
                let mut children: Vec<&mut Expr> = args.iter_mut().collect();
                if let WindowRef::Inline(spec) = window {
                    children.extend(spec.exprs_mut());
                }
                children
            }
            Expr::Unary { expr, .. } => vec![expr.as_mut()],
            Expr::Binary { left, right, .. } => vec![left.as_mut(), right.as_mut()],
            Expr::InSubquery { expr, .. } => vec![expr.as_mut()],
            Expr::Default
            | Expr::Literal(_)
            | Expr::Column(_)
            | Expr::UserVariable(_)
            | Expr::SystemVariable { .. }
            | Expr::Subquery(_)
            | Expr::Exists(_) => Vec::new(),
        }
    }

    pub fn children(&self) -> Vec<&Expr> {
        match self {
            Expr::Function { args, .. } | Expr::Aggregate { args, .. } | Expr::Row(args) => {
                args.iter().collect()
            }
            Expr::WindowFunction { args, window, .. } => {
                let mut children: Vec<&Expr> = args.iter().collect();
                if let WindowRef::Inline(spec) = window {
                    children.extend(spec.exprs());
                }
                children
            }
            Expr::Unary { expr, .. } => vec![expr.as_ref()],
            Expr::Binary { left, right, .. } => vec![left.as_ref(), right.as_ref()],
            Expr::InSubquery { expr, .. } => vec![expr.as_ref()],
            Expr::Default
            | Expr::Literal(_)
            | Expr::Column(_)
            | Expr::UserVariable(_)
            | Expr::SystemVariable { .. }
            | Expr::Subquery(_)
            | Expr::Exists(_) => Vec::new(),
        }
    }

    /// Subqueries directly owned by this expression.
    pub fn subqueries_mut(&mut self) -> Vec<&mut Subquery> {
        match self {
            Expr::Subquery(q) | Expr::Exists(q) => vec![q.as_mut()],
            Expr::InSubquery { subquery, .. } => vec![subquery.as_mut()],
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn condition_wraps_non_boolean() {
        let expr = Expr::column("a").into_condition();
        assert_eq!(
            Expr::binary(Expr::column("a"), BinaryOperator::NotEq, Expr::int(0)),
            expr
        );
    }

    #[test]
    fn condition_keeps_boolean() {
        let cmp = Expr::binary(Expr::column("a"), BinaryOperator::Eq, Expr::int(1));
        assert_eq!(cmp.clone(), cmp.into_condition());
    }

    #[test]
    fn literal_conversions() {
        assert!(Literal::Integer(1).try_as_bool().unwrap());
        Literal::String("x".into()).try_as_i64().unwrap_err();
        assert_eq!("x", Literal::String("x".into()).try_as_str().unwrap());
    }
}
