//! Fault injector (spec.md §4.12): a seeded PRNG drives per-site
//! `should_fail()` checks so failure scenarios are reproducible in
//! tests. Grounded in the teacher's `fault_tolerance.rs` circuit-breaker
//! module in spirit (deterministic, per-node state) but far simpler:
//! the spec calls for sentinel-returning fault sites, not retries or
//! breaker state.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;

/// A fault injection site (spec.md §4.12).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultSite {
    ToolTimeout,
    ToolError,
    BadRetrieval,
    LlmError,
}

/// Per-site enable/probability configuration.
#[derive(Debug, Clone, Copy)]
pub struct FaultConfig {
    pub enabled: bool,
    pub probability: f64,
}

impl Default for FaultConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            probability: 0.0,
        }
    }
}

/// Seeded fault injector. Never silently alters inputs — callers consult
/// [`FaultInjector::should_fail`] and either raise or substitute a
/// sentinel value; the injector itself never mutates arguments.
pub struct FaultInjector {
    rng: Mutex<StdRng>,
    tool_timeout: FaultConfig,
    tool_error: FaultConfig,
    bad_retrieval: FaultConfig,
    llm_error: FaultConfig,
}

impl FaultInjector {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            tool_timeout: FaultConfig::default(),
            tool_error: FaultConfig::default(),
            bad_retrieval: FaultConfig::default(),
            llm_error: FaultConfig::default(),
        }
    }

    pub fn disabled() -> Self {
        Self::new(0)
    }

    pub fn with_site(mut self, site: FaultSite, config: FaultConfig) -> Self {
        match site {
            FaultSite::ToolTimeout => self.tool_timeout = config,
            FaultSite::ToolError => self.tool_error = config,
            FaultSite::BadRetrieval => self.bad_retrieval = config,
            FaultSite::LlmError => self.llm_error = config,
        }
        self
    }

    fn config(&self, site: FaultSite) -> FaultConfig {
        match site {
            FaultSite::ToolTimeout => self.tool_timeout,
            FaultSite::ToolError => self.tool_error,
            FaultSite::BadRetrieval => self.bad_retrieval,
            FaultSite::LlmError => self.llm_error,
        }
    }

    /// `should_fail() = enabled && rng.uniform(0,1) < probability`.
    pub fn should_fail(&self, site: FaultSite) -> bool {
        let config = self.config(site);
        if !config.enabled {
            return false;
        }
        let mut rng = self.rng.lock().unwrap();
        rng.gen_range(0.0..1.0) < config.probability
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_site_never_fails() {
        let injector = FaultInjector::disabled();
        for _ in 0..100 {
            assert!(!injector.should_fail(FaultSite::ToolError));
        }
    }

    #[test]
    fn fully_enabled_site_always_fails() {
        let injector = FaultInjector::new(7).with_site(
            FaultSite::ToolError,
            FaultConfig {
                enabled: true,
                probability: 1.0,
            },
        );
        for _ in 0..20 {
            assert!(injector.should_fail(FaultSite::ToolError));
        }
    }

    #[test]
    fn same_seed_is_deterministic() {
        let a = FaultInjector::new(42).with_site(
            FaultSite::LlmError,
            FaultConfig {
                enabled: true,
                probability: 0.5,
            },
        );
        let b = FaultInjector::new(42).with_site(
            FaultSite::LlmError,
            FaultConfig {
                enabled: true,
                probability: 0.5,
            },
        );
        let a_results: Vec<bool> = (0..20).map(|_| a.should_fail(FaultSite::LlmError)).collect();
        let b_results: Vec<bool> = (0..20).map(|_| b.should_fail(FaultSite::LlmError)).collect();
        assert_eq!(a_results, b_results);
    }
}
