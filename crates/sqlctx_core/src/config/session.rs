use std::collections::HashMap;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};
use sqlctx_error::{DbError, ErrorCode, Result, ResultExt};

use crate::expr::Literal;
use crate::registry::charset;

/// How table names, database names and aliases are folded and compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierFolding {
    /// Stored as given, compared exactly.
    CaseSensitive,
    /// Stored lowercased, compared case-insensitively.
    Lowercase,
    /// Stored as given, compared case-insensitively.
    CaseInsensitive,
}

/// Configuration consulted by the contextualization pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// 0 (case sensitive), 1 (lowercase) or 2 (case insensitive).
    pub lower_case_table_names: u8,
    pub default_charset: String,
    pub default_collation_for_utf8mb4: String,
    pub character_set_client: String,
    pub collation_connection: String,
    pub collation_database: String,
    pub default_storage_engine: String,
    pub default_tmp_storage_engine: String,
    /// Unknown engines are errors instead of warnings.
    pub no_engine_substitution: bool,
    pub allow_select_into: bool,
    pub max_nesting_depth: u64,
    pub max_vcpu_id: u64,
    pub resource_groups_supported: bool,
}

impl Default for ContextConfig {
    fn default() -> Self {
        ContextConfig {
            lower_case_table_names: 0,
            default_charset: "utf8mb4".to_string(),
            default_collation_for_utf8mb4: "utf8mb4_0900_ai_ci".to_string(),
            character_set_client: "utf8mb4".to_string(),
            collation_connection: "utf8mb4_0900_ai_ci".to_string(),
            collation_database: "utf8mb4_0900_ai_ci".to_string(),
            default_storage_engine: "InnoDB".to_string(),
            default_tmp_storage_engine: "InnoDB".to_string(),
            no_engine_substitution: true,
            allow_select_into: true,
            max_nesting_depth: 63,
            max_vcpu_id: 63,
            resource_groups_supported: true,
        }
    }
}

impl ContextConfig {
    pub fn from_json(s: &str) -> Result<Self> {
        let conf: ContextConfig =
            serde_json::from_str(s).context("Failed to deserialize context config")?;
        conf.validate()?;
        Ok(conf)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).context("Failed to serialize context config")
    }

    fn validate(&self) -> Result<()> {
        if self.lower_case_table_names > 2 {
            return Err(DbError::coded(
                ErrorCode::WrongValueForVar,
                [
                    "lower_case_table_names".to_string(),
                    self.lower_case_table_names.to_string(),
                ],
            ));
        }
        charset::resolve_charset(&self.default_charset)?;
        charset::resolve_charset(&self.character_set_client)?;
        charset::resolve_collation(&self.collation_connection)?;
        charset::resolve_collation(&self.collation_database)?;
        charset::resolve_collation(&self.default_collation_for_utf8mb4)?;
        Ok(())
    }

    pub fn folding(&self) -> IdentifierFolding {
        match self.lower_case_table_names {
            0 => IdentifierFolding::CaseSensitive,
            1 => IdentifierFolding::Lowercase,
            _ => IdentifierFolding::CaseInsensitive,
        }
    }

    /// Apply storage folding to a table or database name.
    pub fn fold_name(&self, name: &str) -> String {
        match self.folding() {
            IdentifierFolding::Lowercase => name.to_lowercase(),
            _ => name.to_string(),
        }
    }

    /// Compare two table names or aliases under the configured folding.
    pub fn names_equal(&self, a: &str, b: &str) -> bool {
        match self.folding() {
            IdentifierFolding::CaseSensitive => a == b,
            _ => a.eq_ignore_ascii_case(b),
        }
    }

    pub fn set_from_literal(&mut self, name: &str, value: Literal) -> Result<()> {
        let func = GET_SET_FUNCTIONS
            .get(name)
            .ok_or_else(|| DbError::new(format!("Missing setting for '{name}'")))?;

        (func.set)(value, self)
    }

    pub fn get_as_literal(&self, name: &str) -> Result<Literal> {
        let func = GET_SET_FUNCTIONS
            .get(name)
            .ok_or_else(|| DbError::new(format!("Missing setting for '{name}'")))?;

        Ok((func.get)(self))
    }

    pub fn reset(&mut self, name: &str) -> Result<()> {
        let def_conf = Self::default();

        let func = GET_SET_FUNCTIONS
            .get(name)
            .ok_or_else(|| DbError::new(format!("Missing setting for '{name}'")))?;

        let value = (func.get)(&def_conf);
        (func.set)(value, self)
    }

    pub fn reset_all(&mut self) {
        *self = Self::default();
    }
}

struct SettingFunctions {
    set: fn(value: Literal, conf: &mut ContextConfig) -> Result<()>,
    get: fn(conf: &ContextConfig) -> Literal,
}

impl SettingFunctions {
    const fn new<S: ContextSetting>() -> Self {
        SettingFunctions {
            set: S::set_from_literal as _,
            get: S::get_as_literal as _,
        }
    }
}

fn insert_setting<S: ContextSetting>(map: &mut HashMap<&'static str, SettingFunctions>) {
    if map.insert(S::NAME, SettingFunctions::new::<S>()).is_some() {
        panic!("Duplicate settings names: {}", S::NAME);
    }
}

static GET_SET_FUNCTIONS: LazyLock<HashMap<&'static str, SettingFunctions>> = LazyLock::new(|| {
    let mut map = HashMap::new();

    insert_setting::<LowerCaseTableNames>(&mut map);
    insert_setting::<DefaultCharset>(&mut map);
    insert_setting::<CollationDatabase>(&mut map);
    insert_setting::<DefaultStorageEngine>(&mut map);
    insert_setting::<DefaultTmpStorageEngine>(&mut map);
    insert_setting::<NoEngineSubstitution>(&mut map);
    insert_setting::<AllowSelectInto>(&mut map);
    insert_setting::<MaxNestingDepth>(&mut map);

    map
});

pub trait ContextSetting: Sync + Send + 'static {
    const NAME: &'static str;
    const DESCRIPTION: &'static str;

    fn set_from_literal(value: Literal, conf: &mut ContextConfig) -> Result<()>;
    fn get_as_literal(conf: &ContextConfig) -> Literal;
}

pub struct LowerCaseTableNames;

impl ContextSetting for LowerCaseTableNames {
    const NAME: &'static str = "lower_case_table_names";
    const DESCRIPTION: &'static str = "How table names and aliases are folded and compared";

    fn set_from_literal(value: Literal, conf: &mut ContextConfig) -> Result<()> {
        let val = value.try_as_i64()?;
        if !(0..=2).contains(&val) {
            return Err(DbError::coded(
                ErrorCode::WrongValueForVar,
                [Self::NAME.to_string(), val.to_string()],
            ));
        }
        conf.lower_case_table_names = val as u8;
        Ok(())
    }

    fn get_as_literal(conf: &ContextConfig) -> Literal {
        Literal::Integer(conf.lower_case_table_names as i64)
    }
}

pub struct DefaultCharset;

impl ContextSetting for DefaultCharset {
    const NAME: &'static str = "default_charset";
    const DESCRIPTION: &'static str = "Character set used when none is given";

    fn set_from_literal(value: Literal, conf: &mut ContextConfig) -> Result<()> {
        let cs = charset::resolve_charset(value.try_as_str()?)?;
        conf.default_charset = cs.charset.to_string();
        Ok(())
    }

    fn get_as_literal(conf: &ContextConfig) -> Literal {
        Literal::String(conf.default_charset.clone())
    }
}

pub struct CollationDatabase;

impl ContextSetting for CollationDatabase {
    const NAME: &'static str = "collation_database";
    const DESCRIPTION: &'static str = "Collation of the current database";

    fn set_from_literal(value: Literal, conf: &mut ContextConfig) -> Result<()> {
        let coll = charset::resolve_collation(value.try_as_str()?)?;
        conf.collation_database = coll.collation.to_string();
        Ok(())
    }

    fn get_as_literal(conf: &ContextConfig) -> Literal {
        Literal::String(conf.collation_database.clone())
    }
}

pub struct DefaultStorageEngine;

impl ContextSetting for DefaultStorageEngine {
    const NAME: &'static str = "default_storage_engine";
    const DESCRIPTION: &'static str = "Engine used for tables without an ENGINE option";

    fn set_from_literal(value: Literal, conf: &mut ContextConfig) -> Result<()> {
        conf.default_storage_engine = value.try_as_str()?.to_string();
        Ok(())
    }

    fn get_as_literal(conf: &ContextConfig) -> Literal {
        Literal::String(conf.default_storage_engine.clone())
    }
}

pub struct DefaultTmpStorageEngine;

impl ContextSetting for DefaultTmpStorageEngine {
    const NAME: &'static str = "default_tmp_storage_engine";
    const DESCRIPTION: &'static str = "Engine used for temporary tables without an ENGINE option";

    fn set_from_literal(value: Literal, conf: &mut ContextConfig) -> Result<()> {
        conf.default_tmp_storage_engine = value.try_as_str()?.to_string();
        Ok(())
    }

    fn get_as_literal(conf: &ContextConfig) -> Literal {
        Literal::String(conf.default_tmp_storage_engine.clone())
    }
}

pub struct NoEngineSubstitution;

impl ContextSetting for NoEngineSubstitution {
    const NAME: &'static str = "no_engine_substitution";
    const DESCRIPTION: &'static str = "Reject unknown storage engines instead of substituting";

    fn set_from_literal(value: Literal, conf: &mut ContextConfig) -> Result<()> {
        conf.no_engine_substitution = value.try_as_bool()?;
        Ok(())
    }

    fn get_as_literal(conf: &ContextConfig) -> Literal {
        Literal::Boolean(conf.no_engine_substitution)
    }
}

pub struct AllowSelectInto;

impl ContextSetting for AllowSelectInto {
    const NAME: &'static str = "allow_select_into";
    const DESCRIPTION: &'static str = "Controls if SELECT ... INTO is accepted";

    fn set_from_literal(value: Literal, conf: &mut ContextConfig) -> Result<()> {
        conf.allow_select_into = value.try_as_bool()?;
        Ok(())
    }

    fn get_as_literal(conf: &ContextConfig) -> Literal {
        Literal::Boolean(conf.allow_select_into)
    }
}

pub struct MaxNestingDepth;

impl ContextSetting for MaxNestingDepth {
    const NAME: &'static str = "max_nesting_depth";
    const DESCRIPTION: &'static str = "Maximum nesting of query expressions";

    fn set_from_literal(value: Literal, conf: &mut ContextConfig) -> Result<()> {
        let val = value.try_as_i64()?;
        if val < 1 {
            return Err(DbError::coded(
                ErrorCode::WrongValueForVar,
                [Self::NAME.to_string(), val.to_string()],
            ));
        }
        conf.max_nesting_depth = val as u64;
        Ok(())
    }

    fn get_as_literal(conf: &ContextConfig) -> Literal {
        Literal::Integer(conf.max_nesting_depth as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_setting_exists() {
        let mut conf = ContextConfig::default();
        conf.set_from_literal("default_storage_engine", Literal::String("MyISAM".into()))
            .unwrap();

        let val = conf.get_as_literal("default_storage_engine").unwrap();
        assert_eq!("MyISAM", val.try_as_str().unwrap());
    }

    #[test]
    fn set_setting_not_exists() {
        let mut conf = ContextConfig::default();
        conf.set_from_literal("hello_world", Literal::Integer(58))
            .unwrap_err();
    }

    #[test]
    fn set_lower_case_out_of_range() {
        let mut conf = ContextConfig::default();
        let err = conf
            .set_from_literal("lower_case_table_names", Literal::Integer(3))
            .unwrap_err();
        assert_eq!(Some(ErrorCode::WrongValueForVar), err.code());
    }

    #[test]
    fn set_unknown_charset() {
        let mut conf = ContextConfig::default();
        let err = conf
            .set_from_literal("default_charset", Literal::String("klingon".into()))
            .unwrap_err();
        assert_eq!(Some(ErrorCode::UnknownCharacterSet), err.code());
    }

    #[test]
    fn reset_setting() {
        let mut conf = ContextConfig::default();
        conf.set_from_literal("max_nesting_depth", Literal::Integer(4))
            .unwrap();
        conf.reset("max_nesting_depth").unwrap();
        assert_eq!(63, conf.max_nesting_depth);
    }

    #[test]
    fn json_round_trip() {
        let mut conf = ContextConfig::default();
        conf.lower_case_table_names = 1;
        let s = conf.to_json().unwrap();
        let got = ContextConfig::from_json(&s).unwrap();
        assert_eq!(conf, got);
    }

    #[test]
    fn json_partial_uses_defaults() {
        let conf = ContextConfig::from_json(r#"{"lower_case_table_names": 2}"#).unwrap();
        assert_eq!(IdentifierFolding::CaseInsensitive, conf.folding());
        assert_eq!("InnoDB", conf.default_storage_engine);
    }

    #[test]
    fn json_invalid_folding() {
        let err = ContextConfig::from_json(r#"{"lower_case_table_names": 7}"#).unwrap_err();
        assert_eq!(Some(ErrorCode::WrongValueForVar), err.code());
    }

    #[test]
    fn folding_rules() {
        let mut conf = ContextConfig::default();
        assert!(!conf.names_equal("T1", "t1"));
        assert_eq!("T1", conf.fold_name("T1"));

        conf.lower_case_table_names = 1;
        assert!(conf.names_equal("T1", "t1"));
        assert_eq!("t1", conf.fold_name("T1"));

        conf.lower_case_table_names = 2;
        assert!(conf.names_equal("T1", "t1"));
        assert_eq!("T1", conf.fold_name("T1"));
    }
}
