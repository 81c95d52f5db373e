// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Name-to-handle registries for programs and procedures.
//!
//! Resolution distinguishes "never registered" from "registered but the
//! backing software is missing on this host"; the `info` listing surfaces
//! that distinction to operators. Registries are read-mostly and safe to
//! share across concurrent dispatcher calls behind an `Arc`.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::backends::{DescentStrategy, ExternalHarness, FailureInjectionHarness, LennardJonesHarness};
use crate::errors::RegistryError;
use crate::traits::{OptimizationStrategy, ProgramHarness};

/// Grid-scan procedure name; not an optimization strategy, so the procedure
/// registry special-cases it in its listings only.
pub const TORSION_SCAN: &str = "torsion-scan";

#[derive(Default, Clone)]
pub struct ProgramRegistry {
    programs: BTreeMap<String, Arc<dyn ProgramHarness>>,
}

impl ProgramRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the shipped harnesses plus wrappers for
    /// common external codes (supported, but only available if installed).
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(LennardJonesHarness));
        registry.register(Arc::new(FailureInjectionHarness::new()));
        registry.register(Arc::new(ExternalHarness::new("psi4", "psi4")));
        registry.register(Arc::new(ExternalHarness::new("nwchem", "nwchem")));
        registry.register(Arc::new(ExternalHarness::new("xtb", "xtb")));
        registry
    }

    pub fn register(&mut self, harness: Arc<dyn ProgramHarness>) {
        self.programs.insert(harness.name().to_string(), harness);
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<dyn ProgramHarness>, RegistryError> {
        let harness = self
            .programs
            .get(name)
            .ok_or_else(|| RegistryError::ProgramNotFound(name.to_string()))?;
        if !harness.is_available() {
            return Err(RegistryError::ProgramUnavailable(name.to_string()));
        }
        Ok(harness.clone())
    }

    pub fn list_all(&self) -> Vec<String> {
        self.programs.keys().cloned().collect()
    }

    pub fn list_available(&self) -> Vec<String> {
        self.programs
            .iter()
            .filter(|(_, harness)| harness.is_available())
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Look a harness up without the availability check, for version
    /// reporting on the `info` surface.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn ProgramHarness>> {
        self.programs.get(name)
    }
}

#[derive(Default, Clone)]
pub struct ProcedureRegistry {
    strategies: BTreeMap<String, Arc<dyn OptimizationStrategy>>,
}

impl ProcedureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(DescentStrategy));
        registry
    }

    pub fn register(&mut self, strategy: Arc<dyn OptimizationStrategy>) {
        self.strategies.insert(strategy.name().to_string(), strategy);
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<dyn OptimizationStrategy>, RegistryError> {
        let strategy = self
            .strategies
            .get(name)
            .ok_or_else(|| RegistryError::ProcedureNotFound(name.to_string()))?;
        if !strategy.is_available() {
            return Err(RegistryError::ProcedureUnavailable(name.to_string()));
        }
        Ok(strategy.clone())
    }

    pub fn list_all(&self) -> Vec<String> {
        let mut names: Vec<String> = self.strategies.keys().cloned().collect();
        names.push(TORSION_SCAN.to_string());
        names.sort();
        names
    }

    pub fn list_available(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .strategies
            .iter()
            .filter(|(_, s)| s.is_available())
            .map(|(name, _)| name.clone())
            .collect();
        names.push(TORSION_SCAN.to_string());
        names.sort();
        names
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn OptimizationStrategy>> {
        self.strategies.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_program_is_not_found() {
        let registry = ProgramRegistry::with_builtins();
        assert_eq!(
            registry.resolve("no-such-code").unwrap_err(),
            RegistryError::ProgramNotFound("no-such-code".into())
        );
    }

    #[test]
    fn test_registered_but_missing_binary_is_unavailable() {
        let mut registry = ProgramRegistry::new();
        registry.register(Arc::new(ExternalHarness::new(
            "ghost",
            "definitely-not-a-real-binary-qcd",
        )));
        assert_eq!(
            registry.resolve("ghost").unwrap_err(),
            RegistryError::ProgramUnavailable("ghost".into())
        );
        // Still listed as supported.
        assert!(registry.list_all().contains(&"ghost".to_string()));
        assert!(!registry.list_available().contains(&"ghost".to_string()));
    }

    #[test]
    fn test_builtin_harnesses_resolve() {
        let registry = ProgramRegistry::with_builtins();
        assert!(registry.resolve("lennard-jones").is_ok());
        assert!(registry.resolve("failure-injection").is_ok());
    }

    #[test]
    fn test_procedure_listing_includes_grid_scan() {
        let registry = ProcedureRegistry::with_builtins();
        assert!(registry.list_all().contains(&TORSION_SCAN.to_string()));
        assert!(registry.list_available().contains(&"descent".to_string()));
        assert!(registry.resolve("descent").is_ok());
        assert_eq!(
            registry.resolve("berny").unwrap_err(),
            RegistryError::ProcedureNotFound("berny".into())
        );
    }
}
