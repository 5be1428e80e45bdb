//! Walks tree nodes against a [`StatementContext`].
//!
//! Every node family implements [`Contextualize`]. Composite nodes walk their
//! children left to right and stop at the first error. Table DDL items
//! implement [`ContextualizeDdl`] instead, which also gives them the
//! descriptors they accumulate into.
pub mod ddl;
pub mod expr;
pub mod from;
pub mod query;
pub mod set;

use sqlctx_error::Result;

use crate::context::StatementContext;
use crate::ddl::TableDdlContext;

pub trait Contextualize {
    fn contextualize(&mut self, ctx: &mut StatementContext<'_>) -> Result<()>;
}

pub trait ContextualizeDdl {
    fn contextualize_ddl(&mut self, ctx: &mut TableDdlContext<'_, '_>) -> Result<()>;
}

impl<T: Contextualize> Contextualize for Box<T> {
    fn contextualize(&mut self, ctx: &mut StatementContext<'_>) -> Result<()> {
        self.as_mut().contextualize(ctx)
    }
}

/// Contextualize a child if present.
pub fn contextualize_opt<T: Contextualize>(
    node: &mut Option<T>,
    ctx: &mut StatementContext<'_>,
) -> Result<()> {
    match node {
        Some(node) => node.contextualize(ctx),
        None => Ok(()),
    }
}

pub fn contextualize_all<T: Contextualize>(
    nodes: &mut [T],
    ctx: &mut StatementContext<'_>,
) -> Result<()> {
    for node in nodes {
        node.contextualize(ctx)?;
    }
    Ok(())
}

/// Contextualize a sequence of optional children of different types,
/// skipping absent ones and returning on the first error.
///
/// ```ignore
/// contextualize_safe!(ctx, &mut self.with, &mut self.limit)?;
/// ```
#[macro_export]
macro_rules! contextualize_safe {
    ($ctx:expr, $($node:expr),+ $(,)?) => {{
        let mut res: ::sqlctx_error::Result<()> = Ok(());
        $(
            if res.is_ok() {
                res = $crate::contextualize::contextualize_opt($node, $ctx);
            }
        )+
        res
    }};
}
