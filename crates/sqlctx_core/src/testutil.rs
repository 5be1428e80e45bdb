//! Helpers for building contexts and tree fragments in tests.
use sqlctx_error::Result;

use crate::ast::Statement;
use crate::ast::from::TableReference;
use crate::ast::query::{QueryBody, QueryExpression, QuerySpecification, SelectItem, UnionNode};
use crate::command::{Command, StatementBuilder};
use crate::config::session::ContextConfig;
use crate::context::{ResolvedContext, StatementContext};
use crate::diagnostics::DiagnosticsArea;
use crate::expr::DefaultExpressionHook;
use crate::session::Session;

/// Owns everything a [`StatementContext`] borrows.
#[derive(Debug)]
pub struct TestContext {
    pub session: Session,
    pub diagnostics: DiagnosticsArea,
}

impl TestContext {
    /// Default configuration, current database `db1`.
    pub fn new() -> Self {
        Self::with_config(ContextConfig::default())
    }

    pub fn with_config(config: ContextConfig) -> Self {
        Self::with_session(Session::new(config).with_database("db1"))
    }

    pub fn with_session(session: Session) -> Self {
        logutil::init_test();
        TestContext {
            session,
            diagnostics: DiagnosticsArea::new(),
        }
    }

    pub fn context(&mut self) -> StatementContext<'_> {
        StatementContext::new(&self.session, &DefaultExpressionHook, &mut self.diagnostics)
    }

    /// Run a whole statement through the builder.
    pub fn build(&mut self, stmt: Statement) -> Result<(Command, ResolvedContext)> {
        StatementBuilder::new(&self.session, &DefaultExpressionHook)
            .build(stmt, &mut self.diagnostics)
    }
}

/// `SELECT * FROM <tables>`
pub fn spec_from(tables: &[&str]) -> QuerySpecification {
    QuerySpecification {
        items: vec![SelectItem::Wildcard(None)],
        from: tables.iter().map(|t| TableReference::table(t)).collect(),
        ..Default::default()
    }
}

/// `SELECT * FROM <tables>` as a query expression.
pub fn select_from(tables: &[&str]) -> QueryExpression {
    QueryExpression::from_spec(spec_from(tables))
}

/// `<left> UNION [DISTINCT] <right>`
pub fn union(left: QueryExpression, distinct: bool, right: QueryExpression) -> QueryExpression {
    QueryExpression::new(QueryBody::Union(Box::new(UnionNode {
        left: into_body(left),
        distinct,
        right: into_body(right),
    })))
}

fn into_body(query: QueryExpression) -> QueryBody {
    if query.with.is_none()
        && query.order_by.is_none()
        && query.limit.is_none()
        && query.locking.is_none()
    {
        return query.body;
    }
    QueryBody::Nested(Box::new(query))
}
