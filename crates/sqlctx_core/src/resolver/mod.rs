//! Table references, join trees and common table expressions.
pub mod cte;
pub mod table_list;

use sqlctx_error::{DbError, ErrorCode, Result};

/// Longest identifier accepted, in characters.
pub const NAME_CHAR_LEN: usize = 64;

pub fn check_ident_length(name: &str) -> Result<()> {
    if name.chars().count() > NAME_CHAR_LEN {
        return Err(DbError::coded(ErrorCode::TooLongIdent, [name]));
    }
    Ok(())
}

fn check_name(name: &str, code: ErrorCode) -> Result<()> {
    if name.is_empty() || name.ends_with(' ') {
        return Err(DbError::coded(code, [name]));
    }
    check_ident_length(name)
}

pub fn check_table_name(name: &str) -> Result<()> {
    check_name(name, ErrorCode::WrongTableName)
}

pub fn check_db_name(name: &str) -> Result<()> {
    check_name(name, ErrorCode::WrongDbName)
}
