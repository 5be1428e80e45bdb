//! EXPLAIN, administrative statements, resource groups and spatial reference
//! systems.
use sqlctx_error::{DbError, ErrorCode, Result};
use tracing::debug;

use super::{Command, assemble};
use crate::ast::Statement;
use crate::ast::admin::{
    AdminStatement,
    ExplainBody,
    ExplainFormat,
    ExplainStatement,
    ResourceGroupStatement,
    SrsStatement,
};
use crate::context::StatementContext;
use crate::context::sql_command::SqlCommand;
use crate::ddl::resource_group::validate_resource_group;
use crate::ddl::srs::{SrsDefinition, build_srs_definition, validate_srs};

#[derive(Debug, Clone, PartialEq)]
pub enum ExplainTarget {
    Command(Command),
    /// `EXPLAIN FOR CONNECTION <id>`
    Connection(u64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExplainCommand {
    /// Output format. EXPLAIN ANALYZE always reports as a tree.
    pub format: ExplainFormat,
    pub analyze: bool,
    pub target: ExplainTarget,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SrsCommand {
    Create {
        definition: SrsDefinition,
        or_replace: bool,
        if_not_exists: bool,
    },
    Drop {
        srid: u32,
        if_exists: bool,
    },
}

fn non_explainable() -> DbError {
    DbError::coded(ErrorCode::WrongUsage, ["EXPLAIN", "non-explainable query"])
}

pub(crate) fn build_explain(ctx: &mut StatementContext<'_>, stmt: ExplainStatement) -> Result<Command> {
    let ExplainStatement {
        format,
        analyze,
        body,
    } = stmt;

    let format = match (format, analyze) {
        (ExplainFormat::Json, true) => {
            return Err(DbError::coded(
                ErrorCode::NotSupportedYet,
                ["FORMAT=JSON with EXPLAIN ANALYZE"],
            ));
        }
        (_, true) => ExplainFormat::Tree,
        (format, false) => format,
    };
    ctx.flags.is_explain = true;
    ctx.flags.explain_analyze = analyze;

    let target = match body {
        ExplainBody::ForConnection(id) => {
            ctx.command = SqlCommand::ExplainOther;
            if analyze {
                return Err(DbError::coded(
                    ErrorCode::NotSupportedYet,
                    ["EXPLAIN ANALYZE FOR CONNECTION"],
                ));
            }
            ExplainTarget::Connection(id)
        }
        ExplainBody::Statement(Statement::Explain(_)) => return Err(non_explainable()),
        ExplainBody::Statement(stmt) => {
            let command = assemble(ctx, stmt)?;
            if !ctx.command.is_explainable() {
                return Err(non_explainable());
            }
            ExplainTarget::Command(command)
        }
    };

    debug!(?format, analyze, command = ?ctx.command, "explain command");
    Ok(Command::Explain(Box::new(ExplainCommand {
        format,
        analyze,
        target,
    })))
}

/// Tag an administrative statement. Nothing in it refers to tables or
/// expressions.
pub(crate) fn build_admin(ctx: &mut StatementContext<'_>, stmt: AdminStatement) -> Command {
    ctx.command = match &stmt {
        AdminStatement::Restart => SqlCommand::RestartServer,
        AdminStatement::AlterInstance(_) => SqlCommand::AlterInstance,
        AdminStatement::CreateRole { .. } => SqlCommand::CreateRole,
        AdminStatement::DropRole { .. } => SqlCommand::DropRole,
        AdminStatement::SetRole(_) => SqlCommand::SetRole,
        AdminStatement::GrantRoles { .. } => SqlCommand::GrantRole,
        AdminStatement::RevokeRoles { .. } => SqlCommand::RevokeRole,
        AdminStatement::ShowGrants { .. } => SqlCommand::ShowGrants,
    };
    Command::Admin(stmt)
}

pub(crate) fn build_resource_group(
    ctx: &mut StatementContext<'_>,
    stmt: ResourceGroupStatement,
) -> Result<Command> {
    validate_resource_group(ctx.config(), &stmt)?;
    ctx.command = match &stmt {
        ResourceGroupStatement::Create { .. } => SqlCommand::CreateResourceGroup,
        ResourceGroupStatement::Alter { .. } => SqlCommand::AlterResourceGroup,
        ResourceGroupStatement::Drop { .. } => SqlCommand::DropResourceGroup,
        ResourceGroupStatement::Set { .. } => SqlCommand::SetResourceGroup,
    };
    Ok(Command::ResourceGroup(stmt))
}

pub(crate) fn build_srs(ctx: &mut StatementContext<'_>, stmt: SrsStatement) -> Result<Command> {
    let command = match &stmt {
        SrsStatement::Create {
            or_replace,
            if_not_exists,
            srid,
            attributes,
        } => {
            ctx.command = SqlCommand::CreateSrs;
            SrsCommand::Create {
                definition: build_srs_definition(*srid, attributes)?,
                or_replace: *or_replace,
                if_not_exists: *if_not_exists,
            }
        }
        SrsStatement::Drop { if_exists, .. } => {
            ctx.command = SqlCommand::DropSrs;
            SrsCommand::Drop {
                srid: validate_srs(&stmt)?,
                if_exists: *if_exists,
            }
        }
    };
    Ok(Command::Srs(command))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::ast::admin::{ResourceGroupType, RoleSpec, SrsAttributes, UserIdent, VcpuRange};
    use crate::ast::dml::SelectStatement;
    use crate::ast::show::ShowStatement;
    use crate::config::session::ContextConfig;
    use crate::testutil::{TestContext, select_from};

    fn explain(format: ExplainFormat, analyze: bool, body: ExplainBody) -> Statement {
        Statement::Explain(Box::new(ExplainStatement {
            format,
            analyze,
            body,
        }))
    }

    fn select_body() -> ExplainBody {
        ExplainBody::Statement(Statement::Select(SelectStatement::new(select_from(&["t1"]))))
    }

    #[test]
    fn explain_select() {
        let mut t = TestContext::new();
        let (command, resolved) = t
            .build(explain(ExplainFormat::Json, false, select_body()))
            .unwrap();
        assert_eq!(SqlCommand::Select, resolved.command);
        assert!(resolved.flags.is_explain);
        let Command::Explain(cmd) = command else {
            panic!("expected EXPLAIN command");
        };
        assert_eq!(ExplainFormat::Json, cmd.format);
        assert!(matches!(cmd.target, ExplainTarget::Command(Command::Select(_))));
        assert_eq!(1, resolved.tables.len());
    }

    #[test]
    fn explain_analyze_reports_tree() {
        let mut t = TestContext::new();
        let (command, resolved) = t
            .build(explain(ExplainFormat::Traditional, true, select_body()))
            .unwrap();
        assert!(resolved.flags.explain_analyze);
        let Command::Explain(cmd) = command else {
            panic!("expected EXPLAIN command");
        };
        assert_eq!(ExplainFormat::Tree, cmd.format);

        let mut t = TestContext::new();
        let err = t
            .build(explain(ExplainFormat::Json, true, select_body()))
            .unwrap_err();
        assert_eq!(Some(ErrorCode::NotSupportedYet), err.code());
    }

    #[test]
    fn explain_for_connection() {
        let mut t = TestContext::new();
        let (command, resolved) = t
            .build(explain(
                ExplainFormat::Traditional,
                false,
                ExplainBody::ForConnection(7),
            ))
            .unwrap();
        assert_eq!(SqlCommand::ExplainOther, resolved.command);
        let Command::Explain(cmd) = command else {
            panic!("expected EXPLAIN command");
        };
        assert_eq!(ExplainTarget::Connection(7), cmd.target);

        let mut t = TestContext::new();
        let err = t
            .build(explain(ExplainFormat::Tree, true, ExplainBody::ForConnection(7)))
            .unwrap_err();
        assert_eq!(Some(ErrorCode::NotSupportedYet), err.code());
        assert_eq!(&["EXPLAIN ANALYZE FOR CONNECTION"], err.args());
    }

    #[test]
    fn explain_rejects_non_explainable() {
        let mut t = TestContext::new();
        let body = ExplainBody::Statement(Statement::Show(ShowStatement::Engines));
        let err = t
            .build(explain(ExplainFormat::Traditional, false, body))
            .unwrap_err();
        assert_eq!(Some(ErrorCode::WrongUsage), err.code());
        assert_eq!(&["EXPLAIN", "non-explainable query"], err.args());

        let mut t = TestContext::new();
        let nested = ExplainBody::Statement(explain(
            ExplainFormat::Traditional,
            false,
            select_body(),
        ));
        let err = t
            .build(explain(ExplainFormat::Traditional, false, nested))
            .unwrap_err();
        assert_eq!(Some(ErrorCode::WrongUsage), err.code());
    }

    #[test]
    fn admin_tags() {
        let cases = [
            (AdminStatement::Restart, SqlCommand::RestartServer),
            (
                AdminStatement::SetRole(RoleSpec::Default),
                SqlCommand::SetRole,
            ),
            (
                AdminStatement::GrantRoles {
                    roles: vec![UserIdent::new("r1")],
                    users: vec![UserIdent::new("u1")],
                    with_admin_option: false,
                },
                SqlCommand::GrantRole,
            ),
            (
                AdminStatement::ShowGrants {
                    user: None,
                    using: Vec::new(),
                },
                SqlCommand::ShowGrants,
            ),
        ];
        for (stmt, expected) in cases {
            let mut t = TestContext::new();
            let (command, resolved) = t.build(Statement::Admin(stmt.clone())).unwrap();
            assert_eq!(expected, resolved.command);
            assert_eq!(Command::Admin(stmt), command);
        }
    }

    #[test]
    fn resource_group_commands() {
        let mut t = TestContext::with_config(ContextConfig {
            resource_groups_supported: true,
            ..Default::default()
        });
        let stmt = ResourceGroupStatement::Create {
            name: "rg1".to_string(),
            group_type: ResourceGroupType::User,
            vcpus: vec![VcpuRange { start: 0, end: 1 }],
            priority: Some(5),
            enabled: true,
        };
        let (_, resolved) = t.build(Statement::ResourceGroup(stmt)).unwrap();
        assert_eq!(SqlCommand::CreateResourceGroup, resolved.command);

        let mut t = TestContext::with_config(ContextConfig {
            resource_groups_supported: false,
            ..Default::default()
        });
        let stmt = ResourceGroupStatement::Drop {
            name: "rg1".to_string(),
            force: false,
        };
        let err = t.build(Statement::ResourceGroup(stmt)).unwrap_err();
        assert_eq!(Some(ErrorCode::FeatureUnsupported), err.code());
    }

    #[test]
    fn srs_commands() {
        let mut t = TestContext::new();
        let stmt = SrsStatement::Create {
            or_replace: true,
            if_not_exists: false,
            srid: 4000,
            attributes: SrsAttributes {
                name: Some("my srs".to_string()),
                definition: Some("GEOGCS[]".to_string()),
                ..Default::default()
            },
        };
        let (command, resolved) = t.build(Statement::Srs(stmt)).unwrap();
        assert_eq!(SqlCommand::CreateSrs, resolved.command);
        let Command::Srs(SrsCommand::Create { definition, .. }) = command else {
            panic!("expected CREATE SPATIAL REFERENCE SYSTEM command");
        };
        assert_eq!(4000, definition.srid);
        assert_eq!("my srs", definition.name);

        let mut t = TestContext::new();
        let stmt = SrsStatement::Drop {
            if_exists: true,
            srid: 0,
        };
        let err = t.build(Statement::Srs(stmt)).unwrap_err();
        assert_eq!(Some(ErrorCode::CantModifySrid0), err.code());
    }
}
