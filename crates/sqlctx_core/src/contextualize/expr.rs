use sqlctx_error::{DbError, ErrorCode, Result};
use tracing::debug;

use super::Contextualize;
use crate::ast::query::Subquery;
use crate::context::StatementContext;
use crate::context::query_block::{Linkage, QueryBlockRef, UnitRef};

impl Subquery {
    /// Contextualize the body as a new unit nested in the current block.
    ///
    /// `outer_scope` is the scope column references inside the body fall back
    /// to. Returns the existing unit if this node was already contextualized.
    pub(crate) fn contextualize_unit(
        &mut self,
        ctx: &mut StatementContext<'_>,
        linkage: Linkage,
        outer_scope: Option<QueryBlockRef>,
    ) -> Result<UnitRef> {
        if let Some(unit) = self.resolved {
            return Ok(unit);
        }
        if !ctx.allows_subselect() {
            return Err(DbError::coded(ErrorCode::ParseError, ["subquery"])
                .with_field("place", format!("{:?}", ctx.parsing_place())));
        }
        if self.query.has_into_clause() {
            return Err(DbError::coded(ErrorCode::MisplacedInto, [] as [String; 0]));
        }

        let outer = ctx.current_select();
        let mut guard = ctx.enter_nesting()?.and_resolution(outer_scope);
        let (unit, block) = guard.new_unit(Some(outer), linkage)?;
        debug!(%outer, %unit, ?linkage, "contextualizing subquery");
        {
            let mut inner = guard.enter_select(block).and_resolution(Some(block));
            self.query.contextualize(&mut inner)?;
        }

        self.resolved = Some(unit);
        Ok(unit)
    }
}

impl Contextualize for Subquery {
    fn contextualize(&mut self, ctx: &mut StatementContext<'_>) -> Result<()> {
        let outer = ctx.resolution_scope();
        self.contextualize_unit(ctx, Linkage::Unspecified, outer)?;
        Ok(())
    }
}
