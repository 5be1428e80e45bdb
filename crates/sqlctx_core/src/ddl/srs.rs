use sqlctx_error::{DbError, ErrorCode, Result};

use crate::ast::admin::{SrsAttributes, SrsStatement};

pub const MAX_SRS_NAME_LENGTH: usize = 80;
pub const MAX_SRS_DEFINITION_LENGTH: usize = 4096;
pub const MAX_SRS_ORGANIZATION_LENGTH: usize = 256;
pub const MAX_SRS_DESCRIPTION_LENGTH: usize = 2048;

/// Checked attributes of a spatial reference system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrsDefinition {
    pub srid: u32,
    pub name: String,
    pub definition: String,
    pub organization: Option<String>,
    pub organization_coordsys_id: Option<u32>,
    pub description: Option<String>,
}

fn check_srid(srid: u64, statement: &str) -> Result<u32> {
    let srid = u32::try_from(srid)
        .map_err(|_| DbError::coded(ErrorCode::DataOutOfRange, ["SRID", statement]))?;
    if srid == 0 {
        return Err(DbError::coded(ErrorCode::CantModifySrid0, [] as [String; 0]));
    }
    Ok(srid)
}

fn has_control_chars(s: &str) -> bool {
    s.chars().any(char::is_control)
}

fn is_empty_or_padded(s: &str) -> bool {
    s.is_empty() || s.starts_with(char::is_whitespace) || s.ends_with(char::is_whitespace)
}

fn check_attribute(value: &str, attribute: &str, max_len: usize) -> Result<()> {
    if has_control_chars(value) {
        return Err(DbError::coded(
            ErrorCode::SrsInvalidCharacterInAttribute,
            [attribute],
        ));
    }
    if value.chars().count() > max_len {
        return Err(DbError::coded(
            ErrorCode::SrsAttributeStringTooLong,
            [attribute.to_string(), max_len.to_string()],
        ));
    }
    Ok(())
}

fn mandatory<'a>(value: &'a Option<String>, attribute: &str) -> Result<&'a str> {
    value
        .as_deref()
        .ok_or_else(|| DbError::coded(ErrorCode::SrsMissingMandatoryAttribute, [attribute]))
}

/// Check `CREATE [OR REPLACE] SPATIAL REFERENCE SYSTEM`.
pub fn build_srs_definition(srid: u64, attributes: &SrsAttributes) -> Result<SrsDefinition> {
    const STATEMENT: &str = "CREATE SPATIAL REFERENCE SYSTEM";
    let srid = check_srid(srid, STATEMENT)?;

    let name = mandatory(&attributes.name, "NAME")?;
    if is_empty_or_padded(name) {
        return Err(DbError::coded(
            ErrorCode::SrsNameCantBeEmptyOrWhitespace,
            [] as [String; 0],
        ));
    }
    check_attribute(name, "NAME", MAX_SRS_NAME_LENGTH)?;

    let definition = mandatory(&attributes.definition, "DEFINITION")?;
    check_attribute(definition, "DEFINITION", MAX_SRS_DEFINITION_LENGTH)?;

    let (organization, organization_coordsys_id) = match &attributes.organization {
        Some(organization) => {
            if is_empty_or_padded(organization) {
                return Err(DbError::coded(
                    ErrorCode::SrsOrganizationCantBeEmptyOrWhitespace,
                    [] as [String; 0],
                ));
            }
            check_attribute(organization, "ORGANIZATION", MAX_SRS_ORGANIZATION_LENGTH)?;
            let id = u32::try_from(attributes.organization_coordsys_id).map_err(|_| {
                DbError::coded(ErrorCode::DataOutOfRange, ["IDENTIFIED BY", STATEMENT])
            })?;
            (Some(organization.clone()), Some(id))
        }
        None => (None, None),
    };

    if let Some(description) = &attributes.description {
        check_attribute(description, "DESCRIPTION", MAX_SRS_DESCRIPTION_LENGTH)?;
    }

    Ok(SrsDefinition {
        srid,
        name: name.to_string(),
        definition: definition.to_string(),
        organization,
        organization_coordsys_id,
        description: attributes.description.clone(),
    })
}

/// Check a spatial reference system statement, returning the SRID.
pub fn validate_srs(stmt: &SrsStatement) -> Result<u32> {
    match stmt {
        SrsStatement::Create {
            srid, attributes, ..
        } => Ok(build_srs_definition(*srid, attributes)?.srid),
        SrsStatement::Drop { srid, .. } => check_srid(*srid, "DROP SPATIAL REFERENCE SYSTEM"),
    }
}
