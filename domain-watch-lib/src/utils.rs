//! Utility functions for domain list handling and validation.
//!
//! This module contains helpers shared by the state store, the WHOIS
//! transport and the orchestrator.

use crate::error::WatchError;

/// Trim configured domains and drop blank entries, keeping order.
///
/// Duplicates are dropped too, so a domain listed twice is still processed
/// exactly once and never has two tasks writing its state file.
pub fn normalize_domains(domains: &[String]) -> Vec<String> {
    let mut results: Vec<String> = Vec::with_capacity(domains.len());

    for domain in domains {
        let trimmed = domain.trim();

        // Skip empty entries
        if trimmed.is_empty() {
            continue;
        }

        if !results.iter().any(|seen| seen == trimmed) {
            results.push(trimmed.to_string());
        }
    }

    results
}

/// Key under which a domain's state is stored: dots become underscores.
pub fn state_key(domain: &str) -> String {
    domain.trim().replace('.', "_")
}

/// Validate a domain name before handing it to an external program.
///
/// # Arguments
///
/// * `domain` - The domain name to validate
///
/// # Returns
///
/// `Ok(())` if valid, `Err(WatchError)` if invalid.
pub fn validate_domain(domain: &str) -> Result<(), WatchError> {
    let domain = domain.trim();

    if domain.is_empty() {
        return Err(WatchError::invalid_domain(
            domain,
            "Domain name cannot be empty",
        ));
    }

    // Anything starting with '-' would be read as a command-line option
    if domain.starts_with('-') {
        return Err(WatchError::invalid_domain(
            domain,
            "Domain name cannot start with a hyphen",
        ));
    }

    if !is_valid_fqdn(domain.trim_end_matches('.')) {
        return Err(WatchError::invalid_domain(
            domain,
            "Domain name is not a valid fully qualified name",
        ));
    }

    Ok(())
}

/// Validate that an FQDN has basic valid structure.
fn is_valid_fqdn(domain: &str) -> bool {
    // Basic checks
    if domain.len() < 3 || domain.len() > 253 {
        return false;
    }

    // Cannot start or end with dot or hyphen
    if domain.starts_with('.')
        || domain.ends_with('.')
        || domain.starts_with('-')
        || domain.ends_with('-')
    {
        return false;
    }

    // Check each part
    let parts: Vec<&str> = domain.split('.').collect();
    if parts.len() < 2 {
        return false;
    }

    // Each part must be valid
    for part in parts {
        if part.is_empty() || part.len() > 63 {
            return false;
        }

        // Cannot start or end with hyphen
        if part.starts_with('-') || part.ends_with('-') {
            return false;
        }

        // Only alphanumeric and hyphens
        if !part.chars().all(|c| c.is_alphanumeric() || c == '-') {
            return false;
        }
    }

    true
}
