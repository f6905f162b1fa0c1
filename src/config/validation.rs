//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, attempts >= 1)
//! - Keep each upstream call timeout inside the handler deadline
//! - Check that identifiers the pipeline needs are present
//! - Check that upstream URLs and the metrics address parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RelayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::RelayConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("report.segments must list at least one segment")]
    NoSegments,

    #[error("report.segments[{index}] needs a non-empty id and label")]
    IncompleteSegment { index: usize },

    #[error("{field} is not an absolute http(s) URL: {value}")]
    InvalidUrl { field: &'static str, value: String },

    #[error("{field} must be shorter than timeouts.write_secs")]
    ExceedsWriteDeadline { field: &'static str },

    #[error("observability.metrics_address is not a socket address: {0}")]
    InvalidMetricsAddress(String),
}

/// Validate a parsed configuration.
pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let required = [
        ("listener.host", &config.listener.host),
        ("secrets.project_id", &config.secrets.project_id),
        ("secrets.mailchimp_api_key", &config.secrets.mailchimp_api_key),
        ("secrets.chat_webhook_url", &config.secrets.chat_webhook_url),
        ("secrets.version", &config.secrets.version),
        ("mailchimp.list_id", &config.mailchimp.list_id),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            errors.push(ValidationError::Empty(field));
        }
    }

    let positive = [
        ("timeouts.read_secs", config.timeouts.read_secs),
        ("timeouts.write_secs", config.timeouts.write_secs),
        ("timeouts.idle_secs", config.timeouts.idle_secs),
        ("secrets.timeout_secs", config.secrets.timeout_secs),
        ("mailchimp.timeout_secs", config.mailchimp.timeout_secs),
        ("chat.timeout_secs", config.chat.timeout_secs),
        ("retries.max_attempts", u64::from(config.retries.max_attempts)),
        ("listener.max_connections", config.listener.max_connections as u64),
        ("listener.max_header_bytes", config.listener.max_header_bytes as u64),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::Zero(field));
        }
    }

    let upstream = [
        ("secrets.timeout_secs", config.secrets.timeout_secs),
        ("mailchimp.timeout_secs", config.mailchimp.timeout_secs),
        ("chat.timeout_secs", config.chat.timeout_secs),
    ];
    for (field, value) in upstream {
        if config.timeouts.write_secs > 0 && value >= config.timeouts.write_secs {
            errors.push(ValidationError::ExceedsWriteDeadline { field });
        }
    }

    if config.report.segments.is_empty() {
        errors.push(ValidationError::NoSegments);
    }
    for (index, segment) in config.report.segments.iter().enumerate() {
        if segment.id.trim().is_empty() || segment.label.trim().is_empty() {
            errors.push(ValidationError::IncompleteSegment { index });
        }
    }

    check_url(&mut errors, "secrets.api_base_url", &config.secrets.api_base_url);
    check_url(&mut errors, "secrets.metadata_url", &config.secrets.metadata_url);
    if let Some(base) = &config.mailchimp.api_base_url {
        check_url(&mut errors, "mailchimp.api_base_url", base);
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_url(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    let ok = url::Url::parse(value)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.has_host())
        .unwrap_or(false);
    if !ok {
        errors.push(ValidationError::InvalidUrl {
            field,
            value: value.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::SegmentConfig;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(validate_config(&RelayConfig::default()), Ok(()));
    }

    #[test]
    fn collects_every_problem() {
        let mut config = RelayConfig::default();
        config.mailchimp.list_id = " ".into();
        config.timeouts.write_secs = 0;
        config.retries.max_attempts = 0;
        config.report.segments.push(SegmentConfig {
            id: "".into(),
            label: "Orphans".into(),
        });
        config.mailchimp.api_base_url = Some("not a url".into());

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::Empty("mailchimp.list_id")));
        assert!(errors.contains(&ValidationError::Zero("timeouts.write_secs")));
        assert!(errors.contains(&ValidationError::Zero("retries.max_attempts")));
        assert!(errors.contains(&ValidationError::IncompleteSegment { index: 2 }));
        assert!(errors.iter().any(|e| matches!(
            e,
            ValidationError::InvalidUrl { field: "mailchimp.api_base_url", .. }
        )));
        assert_eq!(errors.len(), 5);
    }

    #[test]
    fn metrics_address_checked_only_when_enabled() {
        let mut config = RelayConfig::default();
        config.observability.metrics_address = "nowhere".into();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        assert_eq!(
            validate_config(&config),
            Err(vec![ValidationError::InvalidMetricsAddress("nowhere".into())])
        );
    }

    #[test]
    fn upstream_timeouts_must_fit_write_deadline() {
        let mut config = RelayConfig::default();
        config.timeouts.write_secs = 5;
        config.chat.timeout_secs = 2;

        assert_eq!(
            validate_config(&config),
            Err(vec![
                ValidationError::ExceedsWriteDeadline { field: "secrets.timeout_secs" },
                ValidationError::ExceedsWriteDeadline { field: "mailchimp.timeout_secs" },
            ])
        );
    }

    #[test]
    fn empty_segment_list_rejected() {
        let mut config = RelayConfig::default();
        config.report.segments.clear();
        assert_eq!(validate_config(&config), Err(vec![ValidationError::NoSegments]));
    }
}
