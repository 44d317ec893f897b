//! Rate limit policies and the per-endpoint-class catalogue.
//!
//! Every endpoint class has one immutable policy. The defaults below can be
//! overridden per class from configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Longest accepted window: one year.
pub const MAX_WINDOW_MS: u64 = 365 * 24 * 60 * 60 * 1000;

/// Quota for one endpoint class: at most `max_requests` per `window_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitPolicy {
    /// Length of a window in milliseconds
    pub window_ms: u64,
    /// Requests admitted per window
    pub max_requests: u32,
}

impl RateLimitPolicy {
    /// Create a policy.
    pub const fn new(window_ms: u64, max_requests: u32) -> Self {
        Self {
            window_ms,
            max_requests,
        }
    }

    /// Length of a window.
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    /// Reject policies that could never admit anything.
    pub fn validate(&self) -> Result<(), String> {
        if self.window_ms == 0 {
            return Err("window_ms must be greater than 0".to_string());
        }
        if self.window_ms > MAX_WINDOW_MS {
            return Err(format!(
                "window_ms must not exceed one year ({} ms)",
                MAX_WINDOW_MS
            ));
        }
        if self.max_requests == 0 {
            return Err("max_requests must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Endpoint classes that carry their own quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyClass {
    /// Sign-in and token endpoints
    Auth,
    /// Account registration
    Register,
    /// General API traffic
    Api,
    /// Expensive report generation
    Report,
}

impl PolicyClass {
    /// All classes, in catalogue order.
    pub const ALL: [PolicyClass; 4] = [
        PolicyClass::Auth,
        PolicyClass::Register,
        PolicyClass::Api,
        PolicyClass::Report,
    ];

    /// Stable lowercase name, used to namespace counter keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyClass::Auth => "auth",
            PolicyClass::Register => "register",
            PolicyClass::Api => "api",
            PolicyClass::Report => "report",
        }
    }

    /// The built-in policy for this class.
    pub fn default_policy(&self) -> RateLimitPolicy {
        match self {
            PolicyClass::Auth => RateLimitPolicy::new(60_000, 5),
            PolicyClass::Register => RateLimitPolicy::new(3_600_000, 3),
            PolicyClass::Api => RateLimitPolicy::new(60_000, 60),
            PolicyClass::Report => RateLimitPolicy::new(60_000, 5),
        }
    }
}

impl fmt::Display for PolicyClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The policy in force for every endpoint class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyCatalogue {
    policies: HashMap<PolicyClass, RateLimitPolicy>,
}

impl PolicyCatalogue {
    /// Catalogue with the built-in policies.
    pub fn new() -> Self {
        let policies = PolicyClass::ALL
            .iter()
            .map(|class| (*class, class.default_policy()))
            .collect();
        Self { policies }
    }

    /// Catalogue with the built-in policies, replaced where `overrides` has an entry.
    pub fn with_overrides(overrides: &HashMap<PolicyClass, RateLimitPolicy>) -> Self {
        let mut catalogue = Self::new();
        for (class, policy) in overrides {
            catalogue.policies.insert(*class, *policy);
        }
        catalogue
    }

    /// The policy for a class.
    pub fn get(&self, class: PolicyClass) -> RateLimitPolicy {
        self.policies
            .get(&class)
            .copied()
            .unwrap_or_else(|| class.default_policy())
    }

    /// Check every policy, naming the first offending class.
    pub fn validate(&self) -> Result<(), String> {
        for class in PolicyClass::ALL {
            self.get(class)
                .validate()
                .map_err(|e| format!("{}: {}", class, e))?;
        }
        Ok(())
    }
}

impl Default for PolicyCatalogue {
    fn default() -> Self {
        Self::new()
    }
}
