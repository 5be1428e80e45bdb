use sqlctx_error::{DbError, ErrorCode, Result};
use tracing::{debug, trace};

use super::{Contextualize, contextualize_all};
use crate::ast::from::{
    FromBaseTable,
    FromDerived,
    FromParenList,
    FromTableFunction,
    JoinCondition,
    JoinType,
    JoinedTable,
    JsonTableColumn,
    NestedJoin,
    TableFunction,
    TableReference,
};
use crate::context::StatementContext;
use crate::context::lock::{LockRequest, LockType, MdlType};
use crate::context::query_block::{Linkage, ParsingPlace};
use crate::resolver::table_list::{TableRef, TableSource, TableSpec};

/// Lock requested by tables that are computed rather than read from storage.
const COMPUTED_TABLE_LOCK: LockRequest = LockRequest::new(LockType::Read, MdlType::SharedRead);

impl Contextualize for TableReference {
    fn contextualize(&mut self, ctx: &mut StatementContext<'_>) -> Result<()> {
        match self {
            TableReference::Table(t) => t.contextualize(ctx),
            TableReference::Derived(t) => t.contextualize(ctx),
            TableReference::Function(t) => t.contextualize(ctx),
            TableReference::Join(t) => t.contextualize(ctx),
            TableReference::Nested(t) => t.contextualize(ctx),
            TableReference::ParenList(t) => t.contextualize(ctx),
        }
    }
}

impl Contextualize for FromBaseTable {
    fn contextualize(&mut self, ctx: &mut StatementContext<'_>) -> Result<()> {
        let mut spec = TableSpec::new(self.name.clone()).alias(self.alias.clone());
        spec.partitions = self.partitions.clone();
        spec.index_hints = self.index_hints.clone();

        let table = ctx.add_table(spec)?;
        ctx.add_joined_table(table)?;
        self.value = Some(table);
        Ok(())
    }
}

impl Contextualize for FromDerived {
    fn contextualize(&mut self, ctx: &mut StatementContext<'_>) -> Result<()> {
        let outer = ctx.current_select();
        // Lateral bodies see the block owning the FROM clause, others only
        // the block that structurally encloses it.
        let outer_scope = if self.lateral {
            ctx.resolution_scope()
        } else {
            let unit = ctx.get_block(outer)?.unit;
            ctx.get_unit(unit)?.outer_block
        };

        let unit = {
            let mut guard = ctx.enter_place(ParsingPlace::Derived);
            self.subquery
                .contextualize_unit(&mut guard, Linkage::Derived, outer_scope)?
        };
        debug_assert_eq!(outer, ctx.current_select());

        let Some(alias) = self.alias.as_ref().map(|a| a.value.clone()) else {
            return Err(DbError::coded(
                ErrorCode::DerivedMustHaveAlias,
                [] as [String; 0],
            ));
        };
        let columns = self.columns.iter().map(|c| c.value.clone()).collect();
        let table = ctx.add_synthetic_table(
            &alias,
            TableSource::Derived {
                unit,
                lateral: self.lateral,
            },
            COMPUTED_TABLE_LOCK,
            columns,
        )?;
        debug!(%table, %unit, lateral = self.lateral, "derived table");

        ctx.add_joined_table(table)?;
        self.value = Some(table);
        Ok(())
    }
}

impl Contextualize for FromTableFunction {
    fn contextualize(&mut self, ctx: &mut StatementContext<'_>) -> Result<()> {
        let mut columns = Vec::new();
        match &mut self.function {
            TableFunction::JsonTable {
                expr,
                path,
                columns: json_columns,
            } => {
                ctx.attach_in_place(expr)?;
                ctx.attach_in_place(path)?;
                contextualize_json_columns(json_columns, &mut columns, ctx)?;
            }
            TableFunction::Sequence { upper_bound } => {
                ctx.attach_in_place(upper_bound)?;
                columns.push("value".to_string());
            }
        }

        let name = self.function.name();
        let table = ctx.add_synthetic_table(
            self.alias.as_str(),
            TableSource::Function { name },
            COMPUTED_TABLE_LOCK,
            columns,
        )?;
        ctx.get_table_mut(table)?.table_name = name.to_string();
        ctx.add_joined_table(table)?;
        self.value = Some(table);
        Ok(())
    }
}

/// Attach the expressions of JSON_TABLE columns, collecting the produced
/// column names depth first.
fn contextualize_json_columns(
    columns: &mut [JsonTableColumn],
    names: &mut Vec<String>,
    ctx: &mut StatementContext<'_>,
) -> Result<()> {
    for column in columns {
        match column {
            JsonTableColumn::Ordinality { name } => names.push(name.value.clone()),
            JsonTableColumn::Path {
                name,
                path,
                default_on_empty,
                default_on_error,
                ..
            } => {
                ctx.attach_in_place(path)?;
                ctx.attach_opt(default_on_empty)?;
                ctx.attach_opt(default_on_error)?;
                names.push(name.value.clone());
            }
            JsonTableColumn::Nested { path, columns } => {
                ctx.attach_in_place(path)?;
                contextualize_json_columns(columns, names, ctx)?;
            }
        }
    }
    Ok(())
}

impl JoinedTable {
    /// Resolve both operands, rewriting RIGHT joins to LEFT joins first.
    ///
    /// Does nothing if the operands are already resolved.
    fn contextualize_operands(&mut self, ctx: &mut StatementContext<'_>) -> Result<(TableRef, TableRef)> {
        if let Some(operands) = self.operands {
            return Ok(operands);
        }

        let was_right = self.join_type.is_right();
        if was_right {
            self.join_type = self.join_type.to_left();
            std::mem::swap(&mut self.left, &mut self.right);
        }

        {
            let mut guard = ctx.enter_nesting()?;
            self.left.contextualize(&mut guard)?;
            self.right.contextualize(&mut guard)?;
        }

        let (left, right) = match (self.left.value(), self.right.value()) {
            (Some(left), Some(right)) => (left, right),
            _ => return Err(DbError::coded(ErrorCode::ParseError, ["JOIN"])),
        };

        if self.join_type.is_left() {
            ctx.get_table_mut(right)?.outer_join = true;
            if was_right {
                ctx.get_table_mut(right)?.join_order_swapped = true;
                ctx.current_block_mut()?.right_joins = true;
            }
        }
        trace!(%left, %right, join_type = ?self.join_type, was_right, "join operands");

        self.operands = Some((left, right));
        Ok((left, right))
    }
}

impl Contextualize for JoinedTable {
    fn contextualize(&mut self, ctx: &mut StatementContext<'_>) -> Result<()> {
        if self.value.is_some() {
            return Ok(());
        }
        let (left, right) = self.contextualize_operands(ctx)?;

        if self.join_type.is_natural() {
            ctx.get_table_mut(right)?.natural_join = Some(left);
        }
        if self.join_type == JoinType::Straight {
            ctx.get_table_mut(right)?.straight = true;
        }

        match &mut self.condition {
            JoinCondition::None => (),
            JoinCondition::On(on) => {
                let mut guard = ctx
                    .enter_place(ParsingPlace::On)
                    .and_join_operands(left, right);
                let taken = std::mem::take(on);
                let attached = guard.attach(taken)?.into_condition();
                *on = attached.clone();
                guard.get_table_mut(right)?.join_cond = Some(attached);
            }
            JoinCondition::Using(fields) => {
                ctx.get_table_mut(right)?.natural_join = Some(left);
                let nest = ctx.nest_last_join(2)?;
                if !fields.is_empty() {
                    ctx.get_table_mut(nest)?.join_using_fields =
                        Some(fields.iter().map(|f| f.value.clone()).collect());
                }
                self.value = Some(nest);
                return Ok(());
            }
        }

        self.value = Some(ctx.nest_last_join(2)?);
        Ok(())
    }
}

impl Contextualize for NestedJoin {
    fn contextualize(&mut self, ctx: &mut StatementContext<'_>) -> Result<()> {
        ctx.init_nested_join()?;
        self.join.contextualize(&mut *ctx.enter_nesting()?)?;
        self.value = self.join.value;
        ctx.end_nested_join()?;
        Ok(())
    }
}

impl Contextualize for FromParenList {
    fn contextualize(&mut self, ctx: &mut StatementContext<'_>) -> Result<()> {
        contextualize_all(&mut self.references, ctx)?;
        self.value = Some(ctx.nest_last_join(self.references.len())?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::ast::Ident;
    use crate::ast::query::{QueryExpression, Subquery};
    use crate::config::session::ContextConfig;
    use crate::diagnostics::DiagnosticsArea;
    use crate::expr::{AttachScope, BinaryOperator, Expr, ExpressionHook};
    use crate::session::Session;
    use crate::testutil::{TestContext, select_from, spec_from};

    fn join(
        left: TableReference,
        join_type: JoinType,
        right: TableReference,
        condition: JoinCondition,
    ) -> TableReference {
        TableReference::join(left, join_type, right, condition)
    }

    fn on_eq() -> JoinCondition {
        JoinCondition::On(Expr::binary(
            Expr::column("a"),
            BinaryOperator::Eq,
            Expr::column("b"),
        ))
    }

    #[test]
    fn right_join_rewritten_to_left() {
        let mut t = TestContext::new();
        let mut ctx = t.context();

        let mut from = join(
            TableReference::table("t1"),
            JoinType::Right,
            TableReference::table("t2"),
            on_eq(),
        );
        from.contextualize(&mut ctx).unwrap();

        let TableReference::Join(joined) = &from else {
            panic!("expected a join");
        };
        assert_eq!(JoinType::Left, joined.join_type);
        let (left, right) = joined.operands.unwrap();
        assert_eq!("t2", ctx.get_table(left).unwrap().table_name);

        let right = ctx.get_table(right).unwrap();
        assert_eq!("t1", right.table_name);
        assert!(right.outer_join);
        assert!(right.join_order_swapped);
        assert!(right.join_cond.is_some());
        assert!(ctx.current_block().unwrap().right_joins);

        // Leaf order follows the rewritten join.
        let names: Vec<_> = ctx
            .current_block()
            .unwrap()
            .tables
            .iter()
            .map(|&t| ctx.get_table(t).unwrap().table_name.clone())
            .collect();
        assert_eq!(vec!["t2", "t1"], names);
        assert_eq!(ParsingPlace::None, ctx.parsing_place());
    }

    #[test]
    fn join_contextualized_once() {
        let mut t = TestContext::new();
        let mut ctx = t.context();
        let mut from = join(
            TableReference::table("t1"),
            JoinType::Inner,
            TableReference::table("t2"),
            on_eq(),
        );
        from.contextualize(&mut ctx).unwrap();
        from.contextualize(&mut ctx).unwrap();
        assert_eq!(2, ctx.current_block().unwrap().tables.len());
        assert_eq!(1, ctx.current_block().unwrap().join_list.len());
    }

    #[test]
    fn on_condition_wrapped_and_scoped() {
        #[derive(Default)]
        struct RecordingHook {
            scopes: Mutex<Vec<AttachScope>>,
        }

        impl ExpressionHook for RecordingHook {
            fn attach(&self, expr: Expr, scope: &AttachScope) -> Result<Expr> {
                self.scopes.lock().unwrap().push(*scope);
                Ok(expr)
            }
        }

        let session = Session::default();
        let hook = RecordingHook::default();
        let mut diags = DiagnosticsArea::new();
        let mut ctx = StatementContext::new(&session, &hook, &mut diags);

        let mut from = join(
            TableReference::table("t1"),
            JoinType::Left,
            TableReference::table("t2"),
            JoinCondition::On(Expr::column("a")),
        );
        from.contextualize(&mut ctx).unwrap();

        let TableReference::Join(joined) = &from else {
            panic!("expected a join");
        };
        let expected = Expr::binary(Expr::column("a"), BinaryOperator::NotEq, Expr::int(0));
        assert_eq!(JoinCondition::On(expected.clone()), joined.condition);
        let (_, right) = joined.operands.unwrap();
        assert_eq!(Some(expected), ctx.get_table(right).unwrap().join_cond);

        let scopes = hook.scopes.lock().unwrap();
        assert_eq!(1, scopes.len());
        assert_eq!(ParsingPlace::On, scopes[0].place);
        assert_eq!(joined.operands, scopes[0].join_operands);
        assert_eq!(None, ctx.join_operands());
    }

    #[test]
    fn aggregate_in_on_rejected() {
        let mut t = TestContext::new();
        let mut ctx = t.context();
        let mut from = join(
            TableReference::table("t1"),
            JoinType::Inner,
            TableReference::table("t2"),
            JoinCondition::On(Expr::Aggregate {
                name: "sum".to_string(),
                args: vec![Expr::column("a")],
                distinct: false,
            }),
        );
        let err = from.contextualize(&mut ctx).unwrap_err();
        assert_eq!(Some(ErrorCode::InvalidGroupFuncUse), err.code());
        assert_eq!(ParsingPlace::None, ctx.parsing_place());
    }

    #[test]
    fn natural_using_and_straight() {
        let mut t = TestContext::new();
        let mut ctx = t.context();

        let mut using = join(
            TableReference::table("t1"),
            JoinType::Inner,
            TableReference::table("t2"),
            JoinCondition::Using(vec![Ident::new("id")]),
        );
        using.contextualize(&mut ctx).unwrap();
        let TableReference::Join(joined) = &using else {
            panic!("expected a join");
        };
        let (left, right) = joined.operands.unwrap();
        assert_eq!(Some(left), ctx.get_table(right).unwrap().natural_join);
        assert_eq!(
            Some(vec!["id".to_string()]),
            ctx.get_table(joined.value.unwrap()).unwrap().join_using_fields
        );

        let mut natural = join(
            TableReference::table("t3"),
            JoinType::NaturalInner,
            TableReference::table("t4"),
            JoinCondition::Using(Vec::new()),
        );
        natural.contextualize(&mut ctx).unwrap();
        let TableReference::Join(joined) = &natural else {
            panic!("expected a join");
        };
        let (left, right) = joined.operands.unwrap();
        assert_eq!(Some(left), ctx.get_table(right).unwrap().natural_join);
        assert_eq!(
            None,
            ctx.get_table(joined.value.unwrap()).unwrap().join_using_fields
        );

        let mut straight = join(
            TableReference::table("t5"),
            JoinType::Straight,
            TableReference::table("t6"),
            JoinCondition::None,
        );
        straight.contextualize(&mut ctx).unwrap();
        let TableReference::Join(joined) = &straight else {
            panic!("expected a join");
        };
        let (_, right) = joined.operands.unwrap();
        assert!(ctx.get_table(right).unwrap().straight);
    }

    #[test]
    fn cross_join_chain_nests_left_deep() {
        let mut t = TestContext::new();
        let mut ctx = t.context();

        // t1 CROSS JOIN t2 CROSS JOIN t3
        let inner = join(
            TableReference::table("t1"),
            JoinType::Cross,
            TableReference::table("t2"),
            JoinCondition::None,
        );
        let mut from = join(inner, JoinType::Cross, TableReference::table("t3"), JoinCondition::None);
        from.contextualize(&mut ctx).unwrap();

        let block = ctx.current_block().unwrap();
        assert_eq!(3, block.tables.len());
        assert_eq!(1, block.join_list.len());
        let top = ctx.get_table(block.join_list[0]).unwrap();
        let children = top.nest_children().unwrap();
        assert_eq!(2, children.len());
        assert!(ctx.get_table(children[0]).unwrap().nest_children().is_some());
    }

    #[test]
    fn nested_join_unwrapped() {
        let mut t = TestContext::new();
        let mut ctx = t.context();
        let mut from = TableReference::Nested(Box::new(NestedJoin {
            join: JoinedTable::new(
                TableReference::table("t1"),
                JoinType::Inner,
                TableReference::table("t2"),
                on_eq(),
            ),
            value: None,
        }));
        from.contextualize(&mut ctx).unwrap();

        let block = ctx.current_block().unwrap();
        assert_eq!(vec![from.value().unwrap()], block.join_list);
        assert!(block.nest_stack.is_empty());
        assert_eq!(None, ctx.get_table(from.value().unwrap()).unwrap().embedding);
    }

    #[test]
    fn paren_list_nests_all() {
        let mut t = TestContext::new();
        let mut ctx = t.context();
        let mut from = TableReference::ParenList(FromParenList {
            references: vec![
                TableReference::table("t1"),
                TableReference::table("t2"),
                TableReference::table("t3"),
            ],
            value: None,
        });
        from.contextualize(&mut ctx).unwrap();
        let nest = from.value().unwrap();
        assert_eq!(3, ctx.get_table(nest).unwrap().nest_children().unwrap().len());
        assert_eq!(vec![nest], ctx.current_block().unwrap().join_list);
    }

    #[test]
    fn join_trees_are_depth_limited() {
        let left_deep = |tables: usize| {
            let mut from = TableReference::table("t0");
            for i in 1..tables {
                from = join(
                    from,
                    JoinType::Inner,
                    TableReference::table(&format!("t{i}")),
                    JoinCondition::None,
                );
            }
            from
        };
        let config = || ContextConfig {
            max_nesting_depth: 8,
            ..Default::default()
        };

        let mut t = TestContext::with_config(config());
        let mut ctx = t.context();
        left_deep(4).contextualize(&mut ctx).unwrap();
        assert_eq!(4, ctx.current_block().unwrap().tables.len());

        let mut t = TestContext::with_config(config());
        let mut ctx = t.context();
        let err = left_deep(500).contextualize(&mut ctx).unwrap_err();
        assert_eq!(Some(ErrorCode::TooHighNestingLevel), err.code());

        let mut nested = TableReference::Nested(Box::new(NestedJoin {
            join: JoinedTable::new(
                TableReference::table("a"),
                JoinType::Inner,
                TableReference::table("b"),
                JoinCondition::None,
            ),
            value: None,
        }));
        for _ in 0..20 {
            nested = TableReference::Nested(Box::new(NestedJoin {
                join: JoinedTable::new(
                    nested,
                    JoinType::Inner,
                    TableReference::table("c"),
                    JoinCondition::None,
                ),
                value: None,
            }));
        }
        let mut t = TestContext::with_config(config());
        let mut ctx = t.context();
        let err = nested.contextualize(&mut ctx).unwrap_err();
        assert_eq!(Some(ErrorCode::TooHighNestingLevel), err.code());
    }

    #[test]
    fn derived_table_scopes() {
        let mut t = TestContext::new();
        let mut ctx = t.context();
        let root = ctx.current_select();

        let derived = |lateral: bool| {
            TableReference::Derived(FromDerived {
                lateral,
                subquery: Subquery::new(select_from(&["t1"])),
                alias: Some(Ident::new("d")),
                columns: vec![Ident::new("c1")],
                value: None,
            })
        };

        let mut plain = derived(false);
        plain.contextualize(&mut ctx).unwrap();
        let entry = ctx.get_table(plain.value().unwrap()).unwrap();
        assert_eq!("d", entry.alias);
        assert_eq!(vec!["c1".to_string()], entry.columns);
        assert_eq!(LockType::Read, entry.lock.lock_type);
        let TableSource::Derived { unit, lateral } = entry.source else {
            panic!("expected a derived table, got {:?}", entry.source);
        };
        assert!(!lateral);
        let body = ctx.get_unit(unit).unwrap().first_block().unwrap();
        assert_eq!(Linkage::Derived, ctx.get_block(body).unwrap().linkage);
        assert_eq!(None, ctx.get_block(body).unwrap().outer_resolution);

        let mut lateral = derived(true);
        lateral.contextualize(&mut ctx).unwrap();
        let entry = ctx.get_table(lateral.value().unwrap()).unwrap();
        let TableSource::Derived { unit, .. } = entry.source else {
            panic!("expected a derived table, got {:?}", entry.source);
        };
        let body = ctx.get_unit(unit).unwrap().first_block().unwrap();
        assert_eq!(Some(root), ctx.get_block(body).unwrap().outer_resolution);
        assert_eq!(ParsingPlace::None, ctx.parsing_place());
    }

    #[test]
    fn nested_derived_sees_enclosing_block() {
        let mut t = TestContext::new();
        let mut ctx = t.context();
        let root = ctx.current_select();

        let derived = |query: QueryExpression, alias: &str| {
            TableReference::Derived(FromDerived {
                lateral: false,
                subquery: Subquery::new(query),
                alias: Some(Ident::new(alias)),
                columns: Vec::new(),
                value: None,
            })
        };
        let mut body = spec_from(&[]);
        body.from.push(derived(select_from(&["t2"]), "d2"));
        let mut from = derived(QueryExpression::from_spec(body), "d1");
        from.contextualize(&mut ctx).unwrap();

        let entry = ctx.get_table(from.value().unwrap()).unwrap();
        let TableSource::Derived { unit, .. } = entry.source else {
            panic!("expected a derived table, got {:?}", entry.source);
        };
        let d1_body = ctx.get_unit(unit).unwrap().first_block().unwrap();
        let d1_block = ctx.get_block(d1_body).unwrap();
        assert_eq!(None, d1_block.outer_resolution);

        let d2_unit = d1_block.inner_units[0];
        let d2_body = ctx.get_unit(d2_unit).unwrap().first_block().unwrap();
        assert_eq!(Some(root), ctx.get_block(d2_body).unwrap().outer_resolution);
    }

    #[test]
    fn derived_table_requires_alias() {
        let mut t = TestContext::new();
        let mut ctx = t.context();
        let mut from = TableReference::Derived(FromDerived {
            lateral: false,
            subquery: Subquery::new(select_from(&["t1"])),
            alias: None,
            columns: Vec::new(),
            value: None,
        });
        let err = from.contextualize(&mut ctx).unwrap_err();
        assert_eq!(Some(ErrorCode::DerivedMustHaveAlias), err.code());
    }

    #[test]
    fn table_functions() {
        let mut t = TestContext::new();
        let mut ctx = t.context();

        let mut json = TableReference::Function(FromTableFunction {
            function: TableFunction::JsonTable {
                expr: Expr::string("[1, 2]"),
                path: Expr::string("$[*]"),
                columns: vec![
                    JsonTableColumn::Ordinality {
                        name: Ident::new("n"),
                    },
                    JsonTableColumn::Nested {
                        path: Expr::string("$.a"),
                        columns: vec![JsonTableColumn::Path {
                            name: Ident::new("v"),
                            data_type: "INT".to_string(),
                            charset: None,
                            collation: None,
                            path: Expr::string("$"),
                            default_on_empty: None,
                            default_on_error: Some(Expr::int(0)),
                        }],
                    },
                ],
            },
            alias: Ident::new("jt"),
            value: None,
        });
        json.contextualize(&mut ctx).unwrap();
        let entry = ctx.get_table(json.value().unwrap()).unwrap();
        assert_eq!("json_table", entry.table_name);
        assert_eq!("jt", entry.alias);
        assert_eq!(vec!["n".to_string(), "v".to_string()], entry.columns);
        assert_eq!(LockType::Read, entry.lock.lock_type);

        let mut seq = TableReference::Function(FromTableFunction {
            function: TableFunction::Sequence {
                upper_bound: Expr::binary(Expr::int(2), BinaryOperator::Multiply, Expr::int(5)),
            },
            alias: Ident::new("s"),
            value: None,
        });
        seq.contextualize(&mut ctx).unwrap();
        let TableReference::Function(f) = &seq else {
            panic!("expected a table function");
        };
        assert_eq!(
            TableFunction::Sequence {
                upper_bound: Expr::int(10)
            },
            f.function
        );
        assert_eq!(2, ctx.current_block().unwrap().join_list.len());
    }
}
