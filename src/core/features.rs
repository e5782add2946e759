//! Feature flag composer
//!
//! Builds the `--enable-*` flag set for the framework configure from the
//! resolution records. Components with a composition-time probe are checked
//! again against the installed state before their flag is emitted.

use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::core::component::ComponentTable;
use crate::core::fallback::Resolutions;
use crate::core::host::FeatureProbe;

/// An optional capability left out of the framework build
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DegradedFeature {
    /// Component that is missing
    pub component: String,
    /// Flag that was omitted
    pub flag: String,
    /// Why it is missing
    pub reason: String,
}

impl fmt::Display for DegradedFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} omitted ({})",
            self.component, self.flag, self.reason
        )
    }
}

/// Composition result
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ComposedFlags {
    /// Implied flags first, then enabling flags in table order
    pub flags: Vec<String>,
    /// One entry per omitted component
    pub warnings: Vec<DegradedFeature>,
}

/// Assembles framework configure flags
pub struct FeatureComposer<'a> {
    probe: &'a dyn FeatureProbe,
}

impl<'a> FeatureComposer<'a> {
    /// Create a composer using `probe` for composition-time checks
    pub fn new(probe: &'a dyn FeatureProbe) -> Self {
        Self { probe }
    }

    /// Compose the flag set for the framework build
    pub fn compose(&self, table: &ComponentTable, records: &Resolutions) -> ComposedFlags {
        let mut implied: Vec<String> = Vec::new();
        let mut enabled: Vec<String> = Vec::new();
        let mut warnings = Vec::new();

        for component in table.iter().filter(|c| c.is_optional()) {
            let Some(ref feature) = component.feature else {
                continue;
            };

            let omission = match records.get(&component.name) {
                None => Some("not resolved".to_string()),
                Some(record) if !record.is_available() => Some(
                    record
                        .reason()
                        .unwrap_or("no acquisition method")
                        .to_string(),
                ),
                Some(_) => feature
                    .probe
                    .as_deref()
                    .filter(|module| !self.probe.probe(module))
                    .map(|module| format!("pkg-config module '{module}' not found")),
            };

            if let Some(reason) = omission {
                let degraded = DegradedFeature {
                    component: component.name.clone(),
                    flag: feature.flag.clone(),
                    reason,
                };
                debug!("{degraded}");
                warnings.push(degraded);
                continue;
            }

            for flag in &feature.implies {
                if !implied.contains(flag) {
                    implied.push(flag.clone());
                }
            }
            enabled.push(feature.flag.clone());
        }

        implied.extend(enabled);
        ComposedFlags {
            flags: implied,
            warnings,
        }
    }
}
