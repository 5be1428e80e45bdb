use std::fmt;

/// How a reported condition affects the statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Note,
    Warning,
    Error,
}

macro_rules! error_codes {
    ($( $(#[$meta:meta])* $variant:ident = ($num:expr, $name:literal), )*) => {
        /// Stable error codes selected by the contextualization pass.
        ///
        /// Codes are paired with an argument list. Rendering a message from the
        /// code and arguments is left to the diagnostics layer.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum ErrorCode {
            $( $(#[$meta])* $variant, )*
        }

        impl ErrorCode {
            pub const ALL: &'static [ErrorCode] = &[$(ErrorCode::$variant,)*];

            /// Numeric value of the code. Never changes once assigned.
            pub const fn number(self) -> u32 {
                match self {
                    $(ErrorCode::$variant => $num,)*
                }
            }

            /// Symbolic name of the code.
            pub const fn name(self) -> &'static str {
                match self {
                    $(ErrorCode::$variant => $name,)*
                }
            }
        }
    };
}

error_codes! {
    TooLongIdent = (1059, "ER_TOO_LONG_IDENT"),
    ParseError = (1064, "ER_PARSE_ERROR"),
    NonUniqTable = (1066, "ER_NONUNIQ_TABLE"),
    WrongDbName = (1102, "ER_WRONG_DB_NAME"),
    WrongTableName = (1103, "ER_WRONG_TABLE_NAME"),
    UnknownTable = (1109, "ER_UNKNOWN_TABLE"),
    InvalidGroupFuncUse = (1111, "ER_INVALID_GROUP_FUNC_USE"),
    UnknownCharacterSet = (1115, "ER_UNKNOWN_CHARACTER_SET"),
    UnknownSystemVariable = (1193, "ER_UNKNOWN_SYSTEM_VARIABLE"),
    WrongArguments = (1210, "ER_WRONG_ARGUMENTS"),
    WrongUsage = (1221, "ER_WRONG_USAGE"),
    LocalVariable = (1228, "ER_LOCAL_VARIABLE"),
    GlobalVariable = (1229, "ER_GLOBAL_VARIABLE"),
    WrongValueForVar = (1231, "ER_WRONG_VALUE_FOR_VAR"),
    NotSupportedYet = (1235, "ER_NOT_SUPPORTED_YET"),
    IncorrectGlobalLocalVar = (1238, "ER_INCORRECT_GLOBAL_LOCAL_VAR"),
    DerivedMustHaveAlias = (1248, "ER_DERIVED_MUST_HAVE_ALIAS"),
    CollationCharsetMismatch = (1253, "ER_COLLATION_CHARSET_MISMATCH"),
    WarnUsingOtherHandler = (1266, "ER_WARN_USING_OTHER_HANDLER"),
    VariableIsNotStruct = (1272, "ER_VARIABLE_IS_NOT_STRUCT"),
    UnknownCollation = (1273, "ER_UNKNOWN_COLLATION"),
    UnknownStorageEngine = (1286, "ER_UNKNOWN_STORAGE_ENGINE"),
    ConflictingDeclarations = (1302, "ER_CONFLICTING_DECLARATIONS"),
    SpUndeclaredVar = (1327, "ER_SP_UNDECLARED_VAR"),
    ViewSelectClause = (1350, "ER_VIEW_SELECT_CLAUSE"),
    OutOfResources = (1041, "ER_OUT_OF_RESOURCES"),
    NoDbError = (1046, "ER_NO_DB_ERROR"),
    TooHighNestingLevel = (1473, "ER_TOO_HIGH_LEVEL_OF_NESTING_FOR_SELECT"),
    PartitionWrongNoPart = (1484, "ER_PARTITION_WRONG_NO_PART_ERROR"),
    PartitionsMustBeDefined = (1492, "ER_PARTITIONS_MUST_BE_DEFINED_ERROR"),
    NoPartsError = (1504, "ER_NO_PARTS_ERROR"),
    DataOutOfRange = (1690, "ER_DATA_OUT_OF_RANGE"),
    PkIndexCantBeInvisible = (3522, "ER_PK_INDEX_CANT_BE_INVISIBLE"),
    UnresolvedTableLock = (3568, "ER_UNRESOLVED_TABLE_LOCK"),
    DuplicateTableLock = (3569, "ER_DUPLICATE_TABLE_LOCK"),
    WindowNoSuchWindow = (3579, "ER_WINDOW_NO_SUCH_WINDOW"),
    WindowDuplicateName = (3591, "ER_WINDOW_DUPLICATE_NAME"),
    WindowInvalidWindowFuncUse = (3593, "ER_WINDOW_INVALID_WINDOW_FUNC_USE"),
    InvalidVcpuId = (3652, "ER_INVALID_VCPU_ID"),
    InvalidVcpuRange = (3653, "ER_INVALID_VCPU_RANGE"),
    InvalidThreadPriority = (3654, "ER_INVALID_THREAD_PRIORITY"),
    FeatureUnsupported = (3658, "ER_FEATURE_UNSUPPORTED"),
    CantModifySrid0 = (3714, "ER_CANT_MODIFY_SRID_0"),
    SrsMissingMandatoryAttribute = (3716, "ER_SRS_MISSING_MANDATORY_ATTRIBUTE"),
    SrsNameCantBeEmptyOrWhitespace = (3720, "ER_SRS_NAME_CANT_BE_EMPTY_OR_WHITESPACE"),
    SrsOrganizationCantBeEmptyOrWhitespace = (3721, "ER_SRS_ORGANIZATION_CANT_BE_EMPTY_OR_WHITESPACE"),
    SrsInvalidCharacterInAttribute = (3722, "ER_SRS_INVALID_CHARACTER_IN_ATTRIBUTE"),
    SrsAttributeStringTooLong = (3723, "ER_SRS_ATTRIBUTE_STRING_TOO_LONG"),
    WarnDeprecatedInnerInto = (3962, "ER_WARN_DEPRECATED_INNER_INTO"),
    MisplacedInto = (3963, "ER_MISPLACED_INTO"),
    MultipleIntoClauses = (3964, "ER_MULTIPLE_INTO_CLAUSES"),
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.number())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn numbers_are_unique() {
        let mut seen = HashSet::new();
        for code in ErrorCode::ALL {
            assert!(seen.insert(code.number()), "duplicate number for {code}");
        }
    }

    #[test]
    fn names_are_unique() {
        let mut seen = HashSet::new();
        for code in ErrorCode::ALL {
            assert!(seen.insert(code.name()), "duplicate name for {code:?}");
        }
    }

    #[test]
    fn display_includes_number() {
        assert_eq!("ER_NONUNIQ_TABLE (1066)", ErrorCode::NonUniqTable.to_string());
    }
}
