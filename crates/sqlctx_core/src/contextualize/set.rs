//! SET statement assignments.
//!
//! Every assignment becomes a [`SetVar`] appended to the statement's pending
//! list. Nothing is applied to the session here.
use sqlctx_error::{DbError, ErrorCode, Result};
use tracing::debug;

use super::Contextualize;
use crate::ast::admin::UserIdent;
use crate::ast::set::{
    IsolationLevel,
    OptionType,
    SetOption,
    SetStatement,
    TransactionCharacteristic,
    VariableName,
};
use crate::context::StatementContext;
use crate::context::sql_command::SqlCommand;
use crate::expr::Expr;
use crate::registry::charset::{self, CharsetInfo};
use crate::registry::sysvar::{SystemVariable, similar_system_variable};

/// Flags of a character set assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CharsetAssignment {
    /// `SET NAMES`, as opposed to `SET CHARACTER SET`.
    pub names: bool,
    /// `DEFAULT` was given instead of a character set.
    pub default: bool,
    /// An explicit COLLATE was given.
    pub collate: bool,
}

/// A pending assignment.
#[derive(Debug, Clone, PartialEq)]
pub enum SetVar {
    System {
        variable: &'static SystemVariable,
        /// Named instance of a structured variable, `default` for
        /// `DEFAULT.<name>`.
        base: Option<String>,
        scope: OptionType,
        /// `None` assigns the default value.
        value: Option<Expr>,
    },
    /// Stored program variable.
    Local {
        name: String,
        offset: usize,
        value: Expr,
    },
    User {
        name: String,
        value: Expr,
    },
    /// Client, connection and result character sets.
    CollationClient {
        client: &'static CharsetInfo,
        connection: &'static CharsetInfo,
        results: &'static CharsetInfo,
        flags: CharsetAssignment,
    },
    Password {
        /// Current user when `None`.
        user: Option<UserIdent>,
        password: Option<String>,
        current_password: Option<String>,
        retain_current: bool,
        random: bool,
    },
}

impl Contextualize for SetStatement {
    fn contextualize(&mut self, ctx: &mut StatementContext<'_>) -> Result<()> {
        ctx.command = SqlCommand::SetOption;
        ctx.flags.option_type = OptionType::Session;
        ctx.var_list.clear();

        for option in self.options.iter_mut() {
            option.contextualize(ctx)?;
        }
        debug!(assignments = ctx.var_list.len(), "SET");
        Ok(())
    }
}

impl Contextualize for SetOption {
    fn contextualize(&mut self, ctx: &mut StatementContext<'_>) -> Result<()> {
        match self {
            SetOption::Variable { scope, name, value } => {
                if let Some(scope) = scope {
                    ctx.flags.option_type = *scope;
                }
                ctx.attach_opt(value)?;

                if let VariableName::Simple(ident) = name {
                    if let Some(offset) = ctx.env().find_local_variable(ident.as_str()) {
                        // A scope keyword in front of a stored program
                        // variable, or assigning it DEFAULT.
                        if scope.is_some() {
                            return Err(DbError::coded(ErrorCode::ParseError, [ident.value.clone()]));
                        }
                        let value = value
                            .clone()
                            .ok_or_else(|| DbError::coded(ErrorCode::ParseError, ["DEFAULT"]))?;
                        ctx.var_list.push(SetVar::Local {
                            name: ident.value.clone(),
                            offset,
                            value,
                        });
                        return Ok(());
                    }
                }

                let scope = ctx.flags.option_type;
                let var = system_variable(ctx, name, scope, value.clone())?;
                ctx.var_list.push(var);
            }
            SetOption::SystemVariable { scope, name, value } => {
                ctx.attach_opt(value)?;
                let var = system_variable(ctx, name, *scope, value.clone())?;
                ctx.var_list.push(var);
            }
            SetOption::UserVariable { name, value } => {
                ctx.attach_in_place(value)?;
                ctx.var_list.push(SetVar::User {
                    name: name.clone(),
                    value: value.clone(),
                });
            }
            SetOption::CharacterSet { charset } => {
                let config = ctx.config();
                let cs = match charset {
                    Some(name) => charset::resolve_charset(name)?,
                    None => charset::resolve_charset(&config.character_set_client)?,
                };
                let connection = charset::resolve_collation(&config.collation_database)?;
                ctx.var_list.push(SetVar::CollationClient {
                    client: cs,
                    connection,
                    results: cs,
                    flags: CharsetAssignment {
                        names: false,
                        default: charset.is_none(),
                        collate: false,
                    },
                });
            }
            SetOption::Names { charset, collation } => {
                let var = set_names(ctx, charset.as_deref(), collation.as_deref())?;
                ctx.var_list.push(var);
            }
            SetOption::Password {
                user,
                password,
                current_password,
                retain_current,
                random,
            } => {
                ctx.var_list.push(SetVar::Password {
                    user: user.clone(),
                    password: if *random { None } else { password.clone() },
                    current_password: current_password.clone(),
                    retain_current: *retain_current,
                    random: *random,
                });
                ctx.command = SqlCommand::SetPassword;
            }
            SetOption::Transaction {
                scope,
                characteristics,
            } => {
                ctx.flags.option_type = scope.unwrap_or(OptionType::Default);
                for characteristic in characteristics.iter() {
                    let var = transaction_characteristic(ctx, *characteristic)?;
                    ctx.var_list.push(var);
                }
            }
        }
        Ok(())
    }
}

fn lookup_system_variable(ctx: &StatementContext<'_>, name: &str) -> Result<&'static SystemVariable> {
    match ctx.env().find_system_variable(name) {
        Some(var) => Ok(var),
        None => {
            let err = DbError::coded(ErrorCode::UnknownSystemVariable, [name]);
            Err(match similar_system_variable(name) {
                Some(similar) => err.with_field("hint", format!("Did you mean '{similar}'?")),
                None => err,
            })
        }
    }
}

/// Key cache variables addressed through a named cache instance.
fn is_key_cache_variable(name: &str) -> bool {
    [
        "key_buffer_size",
        "key_cache_block_size",
        "key_cache_division_limit",
        "key_cache_age_threshold",
    ]
    .iter()
    .any(|v| v.eq_ignore_ascii_case(name))
}

/// Resolve an assignment to a system variable and check it can be set in
/// `scope`.
fn system_variable(
    ctx: &StatementContext<'_>,
    name: &VariableName,
    scope: OptionType,
    value: Option<Expr>,
) -> Result<SetVar> {
    let (variable, base) = match name {
        VariableName::Simple(ident) => (lookup_system_variable(ctx, ident.as_str())?, None),
        VariableName::Qualified(instance, ident) if is_key_cache_variable(ident.as_str()) => {
            let variable = lookup_system_variable(ctx, ident.as_str())?;
            if !variable.is_struct {
                return Err(DbError::coded(ErrorCode::VariableIsNotStruct, [ident.value.clone()]));
            }
            (variable, Some(instance.value.clone()))
        }
        VariableName::Qualified(component, ident) => {
            let full = format!("{}.{}", component.value, ident.value);
            (lookup_system_variable(ctx, &full)?, None)
        }
        VariableName::Default(ident) => {
            let variable = lookup_system_variable(ctx, ident.as_str())?;
            if !variable.is_struct {
                return Err(DbError::coded(ErrorCode::VariableIsNotStruct, [ident.value.clone()]));
            }
            (variable, Some("default".to_string()))
        }
    };

    check_variable_scope(variable, scope)?;

    Ok(SetVar::System {
        variable,
        base,
        scope,
        value,
    })
}

fn check_variable_scope(variable: &SystemVariable, scope: OptionType) -> Result<()> {
    if variable.read_only && scope != OptionType::PersistOnly {
        return Err(DbError::coded(
            ErrorCode::IncorrectGlobalLocalVar,
            [variable.name, "read only"],
        ));
    }
    if scope.is_global() {
        if !variable.has_global() {
            return Err(DbError::coded(ErrorCode::LocalVariable, [variable.name]));
        }
    } else if !variable.has_session() {
        return Err(DbError::coded(ErrorCode::GlobalVariable, [variable.name]));
    }
    Ok(())
}

fn set_names(
    ctx: &StatementContext<'_>,
    charset: Option<&str>,
    collation: Option<&str>,
) -> Result<SetVar> {
    let config = ctx.config();
    let cs = match charset {
        Some(name) => charset::resolve_charset(name)?,
        None => charset::resolve_charset(&config.character_set_client)?,
    };

    let effective = match collation {
        Some(name) => {
            let collation = charset::resolve_collation(name)?;
            if !cs.same_charset(collation) {
                return Err(DbError::coded(
                    ErrorCode::CollationCharsetMismatch,
                    [collation.collation, cs.charset],
                ));
            }
            collation
        }
        None if cs.charset == "utf8mb4" && cs.is_default => {
            charset::resolve_collation(&config.default_collation_for_utf8mb4)?
        }
        None => cs,
    };

    Ok(SetVar::CollationClient {
        client: effective,
        connection: effective,
        results: effective,
        flags: CharsetAssignment {
            names: true,
            default: charset.is_none(),
            collate: collation.is_some(),
        },
    })
}

fn transaction_characteristic(
    ctx: &StatementContext<'_>,
    characteristic: TransactionCharacteristic,
) -> Result<SetVar> {
    let (name, value) = match characteristic {
        TransactionCharacteristic::IsolationLevel(level) => {
            let level = match level {
                IsolationLevel::ReadUncommitted => 0,
                IsolationLevel::ReadCommitted => 1,
                IsolationLevel::RepeatableRead => 2,
                IsolationLevel::Serializable => 3,
            };
            ("transaction_isolation", level)
        }
        TransactionCharacteristic::ReadOnly(read_only) => {
            ("transaction_read_only", i64::from(read_only))
        }
    };
    Ok(SetVar::System {
        variable: lookup_system_variable(ctx, name)?,
        base: None,
        scope: ctx.flags.option_type,
        value: Some(Expr::int(value)),
    })
}

impl SetVar {
    /// Name of the assigned variable, if the assignment targets one.
    pub fn variable_name(&self) -> Option<&str> {
        match self {
            SetVar::System { variable, .. } => Some(variable.name),
            SetVar::Local { name, .. } | SetVar::User { name, .. } => Some(name),
            SetVar::CollationClient { .. } | SetVar::Password { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::ast::Ident;
    use crate::config::session::ContextConfig;
    use crate::session::Session;
    use crate::testutil::TestContext;

    fn set(options: Vec<SetOption>) -> SetStatement {
        SetStatement { options }
    }

    fn assign(scope: Option<OptionType>, name: &str, value: Option<Expr>) -> SetOption {
        SetOption::Variable {
            scope,
            name: name.into(),
            value,
        }
    }

    fn scopes(ctx: &StatementContext<'_>) -> Vec<OptionType> {
        ctx.var_list
            .iter()
            .filter_map(|v| match v {
                SetVar::System { scope, .. } => Some(*scope),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn explicit_scope_carries_forward() {
        let mut t = TestContext::new();
        let mut ctx = t.context();
        let mut stmt = set(vec![
            assign(None, "sql_mode", Some(Expr::string(""))),
            assign(Some(OptionType::Global), "max_connections", Some(Expr::int(10))),
            assign(None, "autocommit", Some(Expr::int(1))),
            assign(Some(OptionType::Session), "sort_buffer_size", None),
        ]);
        stmt.contextualize(&mut ctx).unwrap();

        assert_eq!(SqlCommand::SetOption, ctx.command);
        assert_eq!(
            vec![
                OptionType::Session,
                OptionType::Global,
                OptionType::Global,
                OptionType::Session
            ],
            scopes(&ctx)
        );
    }

    #[test]
    fn pending_list_cleared() {
        let mut t = TestContext::new();
        let mut ctx = t.context();
        ctx.var_list.push(SetVar::User {
            name: "stale".to_string(),
            value: Expr::int(0),
        });
        set(vec![SetOption::UserVariable {
            name: "a".to_string(),
            value: Expr::binary(Expr::int(1), crate::expr::BinaryOperator::Plus, Expr::int(2)),
        }])
        .contextualize(&mut ctx)
        .unwrap();
        assert_eq!(
            vec![SetVar::User {
                name: "a".to_string(),
                value: Expr::int(3)
            }],
            ctx.var_list
        );
    }

    #[test]
    fn scope_errors() {
        let mut t = TestContext::new();
        let mut ctx = t.context();

        let err = set(vec![assign(None, "max_connections", Some(Expr::int(1)))])
            .contextualize(&mut ctx)
            .unwrap_err();
        assert_eq!(Some(ErrorCode::GlobalVariable), err.code());

        let err = set(vec![assign(Some(OptionType::Global), "timestamp", Some(Expr::int(1)))])
            .contextualize(&mut ctx)
            .unwrap_err();
        assert_eq!(Some(ErrorCode::LocalVariable), err.code());

        let err = set(vec![assign(Some(OptionType::Global), "version", Some(Expr::string("x")))])
            .contextualize(&mut ctx)
            .unwrap_err();
        assert_eq!(Some(ErrorCode::IncorrectGlobalLocalVar), err.code());
        assert_eq!(&["version".to_string(), "read only".to_string()], err.args());

        set(vec![assign(
            Some(OptionType::PersistOnly),
            "lower_case_table_names",
            Some(Expr::int(1)),
        )])
        .contextualize(&mut ctx)
        .unwrap();
    }

    #[test]
    fn unknown_variable_with_hint() {
        let mut t = TestContext::new();
        let mut ctx = t.context();
        let err = set(vec![assign(None, "autocomit", Some(Expr::int(1)))])
            .contextualize(&mut ctx)
            .unwrap_err();
        assert_eq!(Some(ErrorCode::UnknownSystemVariable), err.code());
        assert_eq!(Some("Did you mean 'autocommit'?"), err.get_field("hint"));
    }

    #[test]
    fn structured_variables() {
        let mut t = TestContext::new();
        let mut ctx = t.context();
        let mut stmt = set(vec![
            SetOption::Variable {
                scope: Some(OptionType::Global),
                name: VariableName::Qualified(Ident::new("hot_cache"), Ident::new("key_buffer_size")),
                value: Some(Expr::int(1024)),
            },
            SetOption::Variable {
                scope: None,
                name: VariableName::Default(Ident::new("key_cache_block_size")),
                value: None,
            },
            SetOption::SystemVariable {
                scope: OptionType::Global,
                name: VariableName::Qualified(Ident::new("validate_password"), Ident::new("length")),
                value: Some(Expr::int(8)),
            },
        ]);
        stmt.contextualize(&mut ctx).unwrap();

        let bases: Vec<_> = ctx
            .var_list
            .iter()
            .map(|v| match v {
                SetVar::System { base, .. } => base.clone(),
                other => panic!("unexpected assignment {other:?}"),
            })
            .collect();
        assert_eq!(vec![Some("hot_cache".to_string()), Some("default".to_string()), None], bases);
        assert_eq!(Some("validate_password.length"), ctx.var_list[2].variable_name());

        let err = set(vec![SetOption::Variable {
            scope: Some(OptionType::Global),
            name: VariableName::Default(Ident::new("sql_mode")),
            value: None,
        }])
        .contextualize(&mut ctx)
        .unwrap_err();
        assert_eq!(Some(ErrorCode::VariableIsNotStruct), err.code());
    }

    #[test]
    fn local_variables() {
        let mut t = TestContext::with_session(Session::default().with_local_variable("x"));
        let mut ctx = t.context();
        set(vec![assign(None, "x", Some(Expr::int(5)))])
            .contextualize(&mut ctx)
            .unwrap();
        assert_eq!(
            vec![SetVar::Local {
                name: "x".to_string(),
                offset: 0,
                value: Expr::int(5)
            }],
            ctx.var_list
        );

        let err = set(vec![assign(Some(OptionType::Session), "x", Some(Expr::int(5)))])
            .contextualize(&mut ctx)
            .unwrap_err();
        assert_eq!(Some(ErrorCode::ParseError), err.code());

        let err = set(vec![assign(None, "x", None)])
            .contextualize(&mut ctx)
            .unwrap_err();
        assert_eq!(Some(ErrorCode::ParseError), err.code());
    }

    #[test]
    fn names_and_character_set() {
        let mut t = TestContext::new();
        let mut ctx = t.context();
        set(vec![
            SetOption::Names {
                charset: Some("latin1".to_string()),
                collation: Some("latin1_bin".to_string()),
            },
            SetOption::CharacterSet { charset: None },
        ])
        .contextualize(&mut ctx)
        .unwrap();

        let SetVar::CollationClient {
            client,
            connection,
            flags,
            ..
        } = &ctx.var_list[0]
        else {
            panic!("expected a character set assignment");
        };
        assert_eq!("latin1_bin", client.collation);
        assert_eq!("latin1_bin", connection.collation);
        assert!(flags.names && flags.collate && !flags.default);

        let SetVar::CollationClient {
            client,
            connection,
            flags,
            ..
        } = &ctx.var_list[1]
        else {
            panic!("expected a character set assignment");
        };
        assert_eq!("utf8mb4", client.charset);
        assert_eq!("utf8mb4_0900_ai_ci", connection.collation);
        assert!(!flags.names && flags.default);

        let err = set(vec![SetOption::Names {
            charset: Some("latin1".to_string()),
            collation: Some("utf8_bin".to_string()),
        }])
        .contextualize(&mut ctx)
        .unwrap_err();
        assert_eq!(Some(ErrorCode::CollationCharsetMismatch), err.code());
        assert_eq!(&["utf8_bin".to_string(), "latin1".to_string()], err.args());

        let err = set(vec![SetOption::CharacterSet {
            charset: Some("klingon".to_string()),
        }])
        .contextualize(&mut ctx)
        .unwrap_err();
        assert_eq!(Some(ErrorCode::UnknownCharacterSet), err.code());
    }

    #[test]
    fn names_uses_configured_utf8mb4_collation() {
        let mut t = TestContext::with_config(ContextConfig {
            default_collation_for_utf8mb4: "utf8mb4_general_ci".to_string(),
            ..Default::default()
        });
        let mut ctx = t.context();
        set(vec![SetOption::Names {
            charset: Some("utf8mb4".to_string()),
            collation: None,
        }])
        .contextualize(&mut ctx)
        .unwrap();
        let SetVar::CollationClient { results, .. } = &ctx.var_list[0] else {
            panic!("expected a character set assignment");
        };
        assert_eq!("utf8mb4_general_ci", results.collation);
    }

    #[test]
    fn password_changes_command() {
        let mut t = TestContext::new();
        let mut ctx = t.context();
        set(vec![SetOption::Password {
            user: None,
            password: Some("secret".to_string()),
            current_password: None,
            retain_current: false,
            random: true,
        }])
        .contextualize(&mut ctx)
        .unwrap();
        assert_eq!(SqlCommand::SetPassword, ctx.command);
        let SetVar::Password { password, .. } = &ctx.var_list[0] else {
            panic!("expected a password assignment");
        };
        assert_eq!(None, *password);
    }

    #[test]
    fn transaction_characteristics() {
        let mut t = TestContext::new();
        let mut ctx = t.context();
        set(vec![SetOption::Transaction {
            scope: None,
            characteristics: vec![
                TransactionCharacteristic::IsolationLevel(IsolationLevel::ReadCommitted),
                TransactionCharacteristic::ReadOnly(true),
            ],
        }])
        .contextualize(&mut ctx)
        .unwrap();

        assert_eq!(vec![OptionType::Default, OptionType::Default], scopes(&ctx));
        assert_eq!(Some("transaction_isolation"), ctx.var_list[0].variable_name());
        let SetVar::System { value, .. } = &ctx.var_list[1] else {
            panic!("expected a system variable assignment");
        };
        assert_eq!(Some(Expr::int(1)), *value);
    }
}
