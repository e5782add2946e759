//! Dependency fallback resolver
//!
//! For each component: try the package manager once, and if that does not
//! work, check whether a source build is feasible on this host. The outcome is
//! an immutable [`ResolutionRecord`]; the set of records is the only place the
//! decision is visible to later phases.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;
use tracing::{debug, info};

use crate::core::component::{Component, ComponentTable};
use crate::core::host::{PackageManager, Prerequisites};
use crate::error::ResolveError;

/// Which acquisition method a component resolved to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Acquisition {
    /// Installed by the package manager
    Primary,
    /// Will be built from source
    Secondary,
    /// Neither works on this host
    Unavailable,
}

impl fmt::Display for Acquisition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Primary => "package",
            Self::Secondary => "source",
            Self::Unavailable => "unavailable",
        };
        f.write_str(name)
    }
}

/// Outcome of resolving one component
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolutionRecord {
    component: String,
    acquisition: Acquisition,
    package: Option<String>,
    reason: Option<String>,
}

impl ResolutionRecord {
    /// Component installed from `package`
    pub fn primary(component: &str, package: &str) -> Self {
        Self {
            component: component.to_string(),
            acquisition: Acquisition::Primary,
            package: Some(package.to_string()),
            reason: None,
        }
    }

    /// Component scheduled for a source build
    pub fn secondary(component: &str, reason: Option<String>) -> Self {
        Self {
            component: component.to_string(),
            acquisition: Acquisition::Secondary,
            package: None,
            reason,
        }
    }

    /// Component that cannot be acquired
    pub fn unavailable(component: &str, reason: &str) -> Self {
        Self {
            component: component.to_string(),
            acquisition: Acquisition::Unavailable,
            package: None,
            reason: Some(reason.to_string()),
        }
    }

    /// Component name
    pub fn component(&self) -> &str {
        &self.component
    }

    /// Resolved method
    pub fn acquisition(&self) -> Acquisition {
        self.acquisition
    }

    /// Package that satisfied a primary resolution
    pub fn package(&self) -> Option<&str> {
        self.package.as_deref()
    }

    /// Why the primary method was not used, or why nothing was
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    /// Whether the component ends up present (by package or by build)
    pub fn is_available(&self) -> bool {
        self.acquisition != Acquisition::Unavailable
    }

    /// Whether the component needs a build stage
    pub fn needs_build(&self) -> bool {
        self.acquisition == Acquisition::Secondary
    }
}

/// Resolution records keyed by component name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Resolutions {
    records: BTreeMap<String, ResolutionRecord>,
}

impl Resolutions {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record, returning the one it replaces
    pub fn insert(&mut self, record: ResolutionRecord) -> Option<ResolutionRecord> {
        self.records.insert(record.component.clone(), record)
    }

    /// Record for `component`
    pub fn get(&self, component: &str) -> Option<&ResolutionRecord> {
        self.records.get(component)
    }

    /// All records, by component name
    pub fn iter(&self) -> impl Iterator<Item = &ResolutionRecord> {
        self.records.values()
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether there are no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Resolver options
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    /// Never try the package manager
    pub skip_package_manager: bool,
    /// Components disabled by the user
    pub disabled: BTreeSet<String>,
}

/// Tries primary acquisition, falls back to a source build
pub struct FallbackResolver<'a> {
    package_manager: &'a dyn PackageManager,
    prerequisites: &'a dyn Prerequisites,
    options: ResolveOptions,
}

impl<'a> FallbackResolver<'a> {
    /// Create a resolver over the given collaborators
    pub fn new(
        package_manager: &'a dyn PackageManager,
        prerequisites: &'a dyn Prerequisites,
        options: ResolveOptions,
    ) -> Self {
        Self {
            package_manager,
            prerequisites,
            options,
        }
    }

    /// Resolve one component
    pub fn resolve(&self, component: &Component) -> ResolutionRecord {
        let name = component.name.as_str();

        if self.options.disabled.contains(name) {
            info!("{name}: disabled by configuration");
            return ResolutionRecord::unavailable(name, "disabled by configuration");
        }

        let primary_failure = match self.try_primary(component) {
            Ok(package) => {
                info!("{name}: installed package {package}");
                return ResolutionRecord::primary(name, &package);
            }
            Err(reason) => reason,
        };
        debug!("{name}: primary acquisition not used ({primary_failure})");

        let missing = self.missing_prerequisites(component);
        if missing.is_empty() {
            info!("{name}: will build from source");
            ResolutionRecord::secondary(name, Some(primary_failure))
        } else {
            let reason = format!("missing build tools: {}", missing.join(", "));
            debug!("{name}: unavailable ({reason})");
            ResolutionRecord::unavailable(name, &reason)
        }
    }

    /// Resolve the whole table; an unavailable required component is fatal
    ///
    /// Required components are checked for a feasible method before any
    /// package is installed, and resolved before the optional ones.
    pub fn resolve_all(&self, table: &ComponentTable) -> Result<Resolutions, ResolveError> {
        self.check_required(table)?;

        let (required, optional): (Vec<&Component>, Vec<&Component>) =
            table.iter().partition(|c| c.required);

        let mut resolutions = Resolutions::new();
        for component in required.into_iter().chain(optional) {
            let record = self.resolve(component);
            if component.required && !record.is_available() {
                return Err(ResolveError::RequiredDependencyMissing {
                    component: component.name.clone(),
                    reason: record.reason().unwrap_or("no acquisition method").to_string(),
                });
            }
            resolutions.insert(record);
        }
        Ok(resolutions)
    }

    /// Fail if a required component is disabled, or has neither a package
    /// to try nor the tools for a source build
    pub fn check_required(&self, table: &ComponentTable) -> Result<(), ResolveError> {
        for component in table.iter().filter(|c| c.required) {
            let name = component.name.as_str();
            if self.options.disabled.contains(name) {
                return Err(ResolveError::RequiredDependencyMissing {
                    component: name.to_string(),
                    reason: "required components cannot be disabled".to_string(),
                });
            }

            let missing = self.missing_prerequisites(component);
            if missing.is_empty() {
                continue;
            }
            if let Err(no_package) = self.primary_package(component) {
                return Err(ResolveError::RequiredDependencyMissing {
                    component: name.to_string(),
                    reason: format!(
                        "missing build tools: {} ({no_package})",
                        missing.join(", ")
                    ),
                });
            }
        }
        Ok(())
    }

    /// Package the primary method would install, without installing it
    fn primary_package<'c>(&self, component: &'c Component) -> Result<&'c str, String> {
        if self.options.skip_package_manager {
            return Err("package manager disabled".to_string());
        }
        let Some(primary) = component.primary.as_ref() else {
            return Err("no package available".to_string());
        };
        let Some(kind) = self.package_manager.kind() else {
            return Err("no supported package manager found".to_string());
        };
        primary
            .package_for(kind)
            .ok_or_else(|| format!("no {kind} package"))
    }

    /// Single primary attempt; `Ok(package)` on success, `Err(reason)` otherwise
    fn try_primary(&self, component: &Component) -> Result<String, String> {
        let package = self.primary_package(component)?;
        self.package_manager
            .install(package)
            .map(|()| package.to_string())
            .map_err(|e| e.to_string())
    }

    /// Host tools the source build needs but cannot find
    pub fn missing_prerequisites(&self, component: &Component) -> Vec<String> {
        component
            .secondary
            .prerequisites
            .iter()
            .filter(|tool| !self.prerequisites.is_available(tool))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::fakes::{FakePackageManager, FakeTools};
    use crate::test_utils::logs::warnings_during;

    fn table() -> ComponentTable {
        ComponentTable::builtin()
    }

    #[test]
    fn test_primary_success_records_primary() {
        let pm = FakePackageManager::apt().providing(&["libopus-dev"]);
        let tools = FakeTools::all();
        let resolver = FallbackResolver::new(&pm, &tools, ResolveOptions::default());

        let record = resolver.resolve(table().get("opus").unwrap());
        assert_eq!(record.acquisition(), Acquisition::Primary);
        assert_eq!(record.package(), Some("libopus-dev"));
        assert!(!record.needs_build());
        assert_eq!(pm.attempts(), vec!["libopus-dev".to_string()]);
    }

    #[test]
    fn test_primary_failure_falls_back_to_source() {
        let pm = FakePackageManager::apt();
        let tools = FakeTools::all();
        let resolver = FallbackResolver::new(&pm, &tools, ResolveOptions::default());

        let record = resolver.resolve(table().get("opus").unwrap());
        assert_eq!(record.acquisition(), Acquisition::Secondary);
        assert!(record.needs_build());
        // single attempt, no retry
        assert_eq!(pm.attempts().len(), 1);
    }

    #[test]
    fn test_missing_prerequisites_make_optional_unavailable() {
        let pm = FakePackageManager::none();
        let tools = FakeTools::only(&["git", "make"]);
        let resolver = FallbackResolver::new(&pm, &tools, ResolveOptions::default());

        let record = resolver.resolve(table().get("dav1d").unwrap());
        assert_eq!(record.acquisition(), Acquisition::Unavailable);
        let reason = record.reason().unwrap();
        assert!(reason.contains("meson"));
        assert!(reason.contains("ninja"));
    }

    #[test]
    fn test_platform_without_package_name_uses_source() {
        let pm = FakePackageManager::apt().providing(&["*"]);
        let tools = FakeTools::all();
        let resolver = FallbackResolver::new(&pm, &tools, ResolveOptions::default());

        // ffmpeg has no primary method at all
        let record = resolver.resolve(table().get("ffmpeg").unwrap());
        assert_eq!(record.acquisition(), Acquisition::Secondary);
        assert!(pm.attempts().is_empty());
    }

    #[test]
    fn test_skip_package_manager_never_installs() {
        let pm = FakePackageManager::apt().providing(&["*"]);
        let tools = FakeTools::all();
        let options = ResolveOptions {
            skip_package_manager: true,
            ..ResolveOptions::default()
        };
        let resolver = FallbackResolver::new(&pm, &tools, options);

        let resolutions = resolver.resolve_all(&table()).unwrap();
        assert!(pm.attempts().is_empty());
        assert!(resolutions
            .iter()
            .all(|r| r.acquisition() == Acquisition::Secondary));
    }

    #[test]
    fn test_disabled_optional_component_is_unavailable() {
        let pm = FakePackageManager::apt().providing(&["*"]);
        let tools = FakeTools::all();
        let options = ResolveOptions {
            disabled: ["x265".to_string()].into_iter().collect(),
            ..ResolveOptions::default()
        };
        let resolver = FallbackResolver::new(&pm, &tools, options);

        let resolutions = resolver.resolve_all(&table()).unwrap();
        let record = resolutions.get("x265").unwrap();
        assert_eq!(record.acquisition(), Acquisition::Unavailable);
        assert_eq!(record.reason(), Some("disabled by configuration"));
    }

    #[test]
    fn test_disabling_required_component_is_fatal() {
        let pm = FakePackageManager::apt();
        let tools = FakeTools::all();
        let options = ResolveOptions {
            disabled: ["nasm".to_string()].into_iter().collect(),
            ..ResolveOptions::default()
        };
        let resolver = FallbackResolver::new(&pm, &tools, options);

        let result = resolver.resolve_all(&table());
        assert!(matches!(
            result,
            Err(ResolveError::RequiredDependencyMissing { ref component, .. }) if component == "nasm"
        ));
    }

    #[test]
    fn test_required_component_unavailable_is_fatal() {
        let pm = FakePackageManager::none();
        let tools = FakeTools::only(&[]);
        let resolver = FallbackResolver::new(&pm, &tools, ResolveOptions::default());

        let result = resolver.resolve_all(&table());
        assert!(matches!(
            result,
            Err(ResolveError::RequiredDependencyMissing { ref component, .. }) if component == "nasm"
        ));
    }

    #[test]
    fn test_infeasible_required_component_installs_nothing() {
        let pm = FakePackageManager::apt().providing(&["*"]);
        // every codec has a package, but ffmpeg can only be built and make is missing
        let tools = FakeTools::only(&["git", "autoreconf", "perl", "pkg-config"]);
        let resolver = FallbackResolver::new(&pm, &tools, ResolveOptions::default());

        let result = resolver.resolve_all(&table());

        assert!(matches!(
            result,
            Err(ResolveError::RequiredDependencyMissing { ref component, .. }) if component == "ffmpeg"
        ));
        assert!(pm.attempts().is_empty());
    }

    #[test]
    fn test_required_components_resolve_before_optional() {
        let pm = FakePackageManager::apt().providing(&["*"]);
        let tools = FakeTools::all();
        let resolver = FallbackResolver::new(&pm, &tools, ResolveOptions::default());

        resolver.resolve_all(&table()).unwrap();

        assert_eq!(pm.attempts().first().map(String::as_str), Some("nasm"));
    }

    #[test]
    fn test_unavailable_optional_component_logs_no_warning() {
        let pm = FakePackageManager::none();
        let tools = FakeTools::only(&["git", "make"]);
        let resolver = FallbackResolver::new(&pm, &tools, ResolveOptions::default());

        let (record, logged) = warnings_during(|| resolver.resolve(table().get("dav1d").unwrap()));

        assert_eq!(record.acquisition(), Acquisition::Unavailable);
        assert!(logged.is_empty(), "unexpected warnings: {logged:?}");
    }

    #[test]
    fn test_optional_unavailable_is_not_fatal() {
        let pm = FakePackageManager::none();
        let tools = FakeTools::only(&["git", "make", "autoreconf", "perl", "pkg-config"]);
        let resolver = FallbackResolver::new(&pm, &tools, ResolveOptions::default());

        let resolutions = resolver.resolve_all(&table()).unwrap();
        assert_eq!(resolutions.len(), table().len());
        assert_eq!(
            resolutions.get("srt").unwrap().acquisition(),
            Acquisition::Unavailable
        );
        assert_eq!(
            resolutions.get("ffmpeg").unwrap().acquisition(),
            Acquisition::Secondary
        );
    }

    #[test]
    fn test_replacing_a_record_returns_the_old_one() {
        let mut resolutions = Resolutions::new();
        assert!(resolutions
            .insert(ResolutionRecord::secondary("srt", None))
            .is_none());
        let old = resolutions.insert(ResolutionRecord::unavailable("srt", "gone"));
        assert_eq!(old.map(|r| r.acquisition()), Some(Acquisition::Secondary));
        assert_eq!(
            resolutions.get("srt").unwrap().acquisition(),
            Acquisition::Unavailable
        );
    }
}
