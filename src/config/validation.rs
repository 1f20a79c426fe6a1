//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Value ranges (timeouts and attempts > 0, addresses parse)
//! - Static registrations: paths, ids and patterns parse, endpoints point
//!   at declared contexts, ids are unique
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Pure function: `&EngineConfig → Result<(), Vec<ConfigIssue>>`
//! - Runs before a config (initial or reloaded) is accepted

use std::collections::HashSet;
use std::net::SocketAddr;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::change::UrlPattern;
use crate::config::schema::{EngineConfig, RegistrationsConfig};
use crate::model::{ContextPath, EndpointId};

/// One problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ConfigIssue {
    pub field: String,
    pub message: String,
}

impl ConfigIssue {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

pub fn validate_config(config: &EngineConfig) -> Result<(), Vec<ConfigIssue>> {
    let mut issues = Vec::new();

    check_addr(&mut issues, "server.bind_address", &config.server.bind_address);
    if config.server.request_timeout_secs == 0 {
        issues.push(ConfigIssue::new("server.request_timeout_secs", "must be greater than 0"));
    }

    if config.admin.enabled {
        check_addr(&mut issues, "admin.bind_address", &config.admin.bind_address);
        if config.admin.api_key.trim().is_empty() || config.admin.api_key == "CHANGE_ME_IN_PRODUCTION" {
            issues.push(ConfigIssue::new("admin.api_key", "must be set when the admin API is enabled"));
        }
    }

    let prov = &config.provisioning;
    if prov.max_attempts == 0 {
        issues.push(ConfigIssue::new("provisioning.max_attempts", "must be at least 1"));
    }
    if prov.attempt_timeout_secs == 0 {
        issues.push(ConfigIssue::new("provisioning.attempt_timeout_secs", "must be greater than 0"));
    }
    if prov.base_delay_ms > prov.max_delay_ms {
        issues.push(ConfigIssue::new(
            "provisioning.base_delay_ms",
            format!("{} exceeds max_delay_ms {}", prov.base_delay_ms, prov.max_delay_ms),
        ));
    }

    if EnvFilter::try_new(&config.observability.log_level).is_err() {
        issues.push(ConfigIssue::new(
            "observability.log_level",
            format!("'{}' is not a valid filter", config.observability.log_level),
        ));
    }
    if config.observability.metrics_enabled {
        check_addr(&mut issues, "observability.metrics_address", &config.observability.metrics_address);
    }

    check_registrations(&mut issues, &config.registrations);

    if issues.is_empty() {
        Ok(())
    } else {
        Err(issues)
    }
}

fn check_addr(issues: &mut Vec<ConfigIssue>, field: &str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        issues.push(ConfigIssue::new(field, format!("'{}' is not a socket address", value)));
    }
}

fn check_registrations(issues: &mut Vec<ConfigIssue>, regs: &RegistrationsConfig) {
    let mut contexts = HashSet::new();
    for (i, ctx) in regs.contexts.iter().enumerate() {
        let field = format!("registrations.contexts[{}].path", i);
        match ContextPath::parse(&ctx.path) {
            Ok(path) => {
                if !contexts.insert(path.clone()) {
                    issues.push(ConfigIssue::new(field, format!("context {} is declared twice", path)));
                }
            }
            Err(e) => issues.push(ConfigIssue::new(field, e.to_string())),
        }
    }

    let mut ids = HashSet::new();
    for (i, ep) in regs.endpoints.iter().enumerate() {
        let field = |name: &str| format!("registrations.endpoints[{}].{}", i, name);

        match EndpointId::new(ep.id.as_str()) {
            Ok(id) => {
                if !ids.insert(id) {
                    issues.push(ConfigIssue::new(field("id"), format!("'{}' is used twice", ep.id)));
                }
            }
            Err(e) => issues.push(ConfigIssue::new(field("id"), e.to_string())),
        }

        match ContextPath::parse(&ep.context) {
            Ok(path) if !contexts.contains(&path) => issues.push(ConfigIssue::new(
                field("context"),
                format!("context {} is not declared in registrations.contexts", path),
            )),
            Ok(_) => {}
            Err(e) => issues.push(ConfigIssue::new(field("context"), e.to_string())),
        }

        if ep.patterns.is_empty() {
            issues.push(ConfigIssue::new(field("patterns"), "at least one pattern is required"));
        }
        for pattern in &ep.patterns {
            if let Err(e) = UrlPattern::parse(pattern) {
                issues.push(ConfigIssue::new(field("patterns"), e.to_string()));
            }
        }
    }
}
