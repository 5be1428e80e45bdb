use std::ops::RangeInclusive;

use sqlctx_error::{DbError, ErrorCode, Result};

use crate::ast::admin::{ResourceGroupStatement, ResourceGroupType, VcpuRange};
use crate::config::session::ContextConfig;
use crate::resolver::NAME_CHAR_LEN;

/// Allowed thread priorities for a resource group type.
pub fn priority_range(group_type: ResourceGroupType) -> RangeInclusive<i64> {
    match group_type {
        ResourceGroupType::System => -20..=0,
        ResourceGroupType::User => 0..=19,
    }
}

/// Check a resource group statement.
///
/// Priorities can only be checked when the group type is known, so ALTER
/// only has its VCPU list checked here.
pub fn validate_resource_group(
    config: &ContextConfig,
    stmt: &ResourceGroupStatement,
) -> Result<()> {
    if !config.resource_groups_supported {
        return Err(DbError::coded(
            ErrorCode::FeatureUnsupported,
            ["Resource groups", "thread priority support"],
        ));
    }

    let name = match stmt {
        ResourceGroupStatement::Create { name, .. }
        | ResourceGroupStatement::Alter { name, .. }
        | ResourceGroupStatement::Drop { name, .. }
        | ResourceGroupStatement::Set { name, .. } => name,
    };
    if name.chars().count() > NAME_CHAR_LEN {
        return Err(DbError::coded(ErrorCode::TooLongIdent, [name.as_str()]));
    }

    match stmt {
        ResourceGroupStatement::Create {
            name,
            group_type,
            vcpus,
            priority,
            ..
        } => {
            if let Some(priority) = priority {
                let range = priority_range(*group_type);
                if !range.contains(priority) {
                    let type_name = match group_type {
                        ResourceGroupType::System => "System",
                        ResourceGroupType::User => "User",
                    };
                    return Err(DbError::coded(
                        ErrorCode::InvalidThreadPriority,
                        [
                            priority.to_string(),
                            type_name.to_string(),
                            name.clone(),
                            range.start().to_string(),
                            range.end().to_string(),
                        ],
                    ));
                }
            }
            validate_vcpus(config, vcpus)
        }
        ResourceGroupStatement::Alter { vcpus, .. } => validate_vcpus(config, vcpus),
        ResourceGroupStatement::Drop { .. } | ResourceGroupStatement::Set { .. } => Ok(()),
    }
}

fn validate_vcpus(config: &ContextConfig, vcpus: &[VcpuRange]) -> Result<()> {
    for range in vcpus {
        if range.start > range.end {
            return Err(DbError::coded(
                ErrorCode::InvalidVcpuRange,
                [format!("{}-{}", range.start, range.end)],
            ));
        }
        if range.end > config.max_vcpu_id {
            let id = if range.start > config.max_vcpu_id {
                range.start
            } else {
                range.end
            };
            return Err(DbError::coded(ErrorCode::InvalidVcpuId, [id.to_string()]));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn create(group_type: ResourceGroupType, priority: Option<i64>) -> ResourceGroupStatement {
        ResourceGroupStatement::Create {
            name: "rg1".to_string(),
            group_type,
            vcpus: vec![VcpuRange { start: 0, end: 3 }],
            priority,
            enabled: true,
        }
    }

    #[test]
    fn priority_per_type() {
        let config = ContextConfig::default();
        validate_resource_group(&config, &create(ResourceGroupType::System, Some(-20))).unwrap();
        validate_resource_group(&config, &create(ResourceGroupType::User, Some(19))).unwrap();

        let err = validate_resource_group(&config, &create(ResourceGroupType::User, Some(-1)))
            .unwrap_err();
        assert_eq!(Some(ErrorCode::InvalidThreadPriority), err.code());
        assert_eq!(&["-1", "User", "rg1", "0", "19"], err.args());

        let err = validate_resource_group(&config, &create(ResourceGroupType::System, Some(1)))
            .unwrap_err();
        assert_eq!(Some(ErrorCode::InvalidThreadPriority), err.code());
    }

    #[test]
    fn vcpu_ranges() {
        let config = ContextConfig {
            max_vcpu_id: 7,
            ..Default::default()
        };
        let alter = |vcpus| ResourceGroupStatement::Alter {
            name: "rg1".to_string(),
            vcpus,
            priority: None,
            enabled: None,
            force: false,
        };

        validate_resource_group(&config, &alter(vec![VcpuRange::single(7)])).unwrap();

        let err = validate_resource_group(&config, &alter(vec![VcpuRange { start: 5, end: 2 }]))
            .unwrap_err();
        assert_eq!(Some(ErrorCode::InvalidVcpuRange), err.code());
        assert_eq!(&["5-2"], err.args());

        let err = validate_resource_group(&config, &alter(vec![VcpuRange { start: 4, end: 9 }]))
            .unwrap_err();
        assert_eq!(Some(ErrorCode::InvalidVcpuId), err.code());
        assert_eq!(&["9"], err.args());
    }

    #[test]
    fn unsupported_and_long_names() {
        let config = ContextConfig {
            resource_groups_supported: false,
            ..Default::default()
        };
        let drop = ResourceGroupStatement::Drop {
            name: "rg1".to_string(),
            force: false,
        };
        let err = validate_resource_group(&config, &drop).unwrap_err();
        assert_eq!(Some(ErrorCode::FeatureUnsupported), err.code());

        let drop = ResourceGroupStatement::Drop {
            name: "r".repeat(NAME_CHAR_LEN + 1),
            force: false,
        };
        let err = validate_resource_group(&ContextConfig::default(), &drop).unwrap_err();
        assert_eq!(Some(ErrorCode::TooLongIdent), err.code());
    }
}
