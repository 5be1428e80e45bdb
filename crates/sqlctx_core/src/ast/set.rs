use crate::ast::Ident;
use crate::ast::admin::UserIdent;
use crate::expr::Expr;

/// Scope keyword of a variable assignment or reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OptionType {
    /// No keyword. For SET TRANSACTION this means the next transaction only.
    #[default]
    Default,
    Global,
    Session,
    Persist,
    PersistOnly,
}

impl OptionType {
    pub fn is_global(&self) -> bool {
        matches!(
            self,
            OptionType::Global | OptionType::Persist | OptionType::PersistOnly
        )
    }
}

/// Name on the left hand side of an assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariableName {
    /// `<name>`
    Simple(Ident),
    /// `<ident>.<ident>`, either a component variable or a named key cache
    /// instance of a structured variable.
    Qualified(Ident, Ident),
    /// `DEFAULT.<name>`
    Default(Ident),
}

impl From<&str> for VariableName {
    fn from(name: &str) -> Self {
        VariableName::Simple(Ident::new(name))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionCharacteristic {
    IsolationLevel(IsolationLevel),
    /// `READ ONLY` (true) or `READ WRITE` (false).
    ReadOnly(bool),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SetOption {
    /// `[GLOBAL|SESSION|...] <name> = <expr>|DEFAULT`
    ///
    /// A `None` value assigns DEFAULT.
    Variable {
        scope: Option<OptionType>,
        name: VariableName,
        value: Option<Expr>,
    },
    /// `@<name> = <expr>`
    UserVariable { name: String, value: Expr },
    /// `@@[scope.]<name> = <expr>`
    SystemVariable {
        scope: OptionType,
        name: VariableName,
        value: Option<Expr>,
    },
    /// `CHARACTER SET <charset>|DEFAULT`
    CharacterSet { charset: Option<String> },
    /// `NAMES <charset> [COLLATE <collation>]` or `NAMES DEFAULT`
    Names {
        charset: Option<String>,
        collation: Option<String>,
    },
    /// `PASSWORD [FOR <user>] = <auth>`
    Password {
        user: Option<UserIdent>,
        password: Option<String>,
        current_password: Option<String>,
        retain_current: bool,
        random: bool,
    },
    /// `[GLOBAL|SESSION] TRANSACTION <characteristics>`
    Transaction {
        scope: Option<OptionType>,
        characteristics: Vec<TransactionCharacteristic>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SetStatement {
    pub options: Vec<SetOption>,
}
