use std::collections::HashMap;
use std::sync::LazyLock;

use sqlctx_error::{DbError, ErrorCode, Result};

/// A collation together with the character set it belongs to.
#[derive(Debug, PartialEq, Eq)]
pub struct CharsetInfo {
    pub collation: &'static str,
    pub charset: &'static str,
    /// If this is the default collation for its character set.
    pub is_default: bool,
}

impl CharsetInfo {
    pub fn same_charset(&self, other: &CharsetInfo) -> bool {
        self.charset == other.charset
    }
}

const fn info(collation: &'static str, charset: &'static str, is_default: bool) -> CharsetInfo {
    CharsetInfo {
        collation,
        charset,
        is_default,
    }
}

static COLLATIONS: &[CharsetInfo] = &[
    info("utf8mb4_0900_ai_ci", "utf8mb4", true),
    info("utf8mb4_0900_as_cs", "utf8mb4", false),
    info("utf8mb4_0900_bin", "utf8mb4", false),
    info("utf8mb4_bin", "utf8mb4", false),
    info("utf8mb4_general_ci", "utf8mb4", false),
    info("utf8mb4_unicode_ci", "utf8mb4", false),
    info("utf8_general_ci", "utf8", true),
    info("utf8_bin", "utf8", false),
    info("utf8_unicode_ci", "utf8", false),
    info("latin1_swedish_ci", "latin1", true),
    info("latin1_bin", "latin1", false),
    info("latin1_general_ci", "latin1", false),
    info("latin1_general_cs", "latin1", false),
    info("ascii_general_ci", "ascii", true),
    info("ascii_bin", "ascii", false),
    info("utf16_general_ci", "utf16", true),
    info("utf16_bin", "utf16", false),
    info("binary", "binary", true),
];

/// Character set names that resolve to another name.
static CHARSET_ALIASES: &[(&str, &str)] = &[("utf8mb3", "utf8")];

static BY_COLLATION: LazyLock<HashMap<&'static str, &'static CharsetInfo>> =
    LazyLock::new(|| COLLATIONS.iter().map(|c| (c.collation, c)).collect());

static BY_CHARSET: LazyLock<HashMap<&'static str, &'static CharsetInfo>> = LazyLock::new(|| {
    COLLATIONS
        .iter()
        .filter(|c| c.is_default)
        .map(|c| (c.charset, c))
        .collect()
});

/// Find the default collation of a character set.
pub fn find_charset(name: &str) -> Option<&'static CharsetInfo> {
    let name = name.to_ascii_lowercase();
    let name = CHARSET_ALIASES
        .iter()
        .find(|(alias, _)| *alias == name)
        .map(|(_, target)| target.to_string())
        .unwrap_or(name);
    BY_CHARSET.get(name.as_str()).copied()
}

pub fn find_collation(name: &str) -> Option<&'static CharsetInfo> {
    BY_COLLATION.get(name.to_ascii_lowercase().as_str()).copied()
}

pub fn resolve_charset(name: &str) -> Result<&'static CharsetInfo> {
    find_charset(name).ok_or_else(|| DbError::coded(ErrorCode::UnknownCharacterSet, [name]))
}

pub fn resolve_collation(name: &str) -> Result<&'static CharsetInfo> {
    find_collation(name).ok_or_else(|| DbError::coded(ErrorCode::UnknownCollation, [name]))
}

/// Combine an optional character set with an optional collation.
///
/// The collation wins when both are given, but it must belong to the
/// character set.
pub fn merge_charset_and_collation(
    cs: Option<&'static CharsetInfo>,
    collation: Option<&'static CharsetInfo>,
) -> Result<Option<&'static CharsetInfo>> {
    match (cs, collation) {
        (Some(cs), Some(collation)) => {
            if !cs.same_charset(collation) {
                return Err(DbError::coded(
                    ErrorCode::CollationCharsetMismatch,
                    [collation.collation, cs.charset],
                ));
            }
            Ok(Some(collation))
        }
        (None, Some(collation)) => Ok(Some(collation)),
        (cs, None) => Ok(cs),
    }
}
