//! Pipeline driver
//!
//! Ties the phases of one run together: the remote tag list feeds version
//! resolution, the fallback resolver decides every component's acquisition
//! method, and the stage executor builds what needs building while the run
//! lock is held.

use std::fs;

use serde::Serialize;
use tracing::info;

use crate::core::build_env::BuildEnvironment;
use crate::core::component::{repo_url, ComponentTable, PackageManagerKind};
use crate::core::fallback::{Acquisition, FallbackResolver, ResolveOptions, Resolutions};
use crate::core::features::{DegradedFeature, FeatureComposer};
use crate::core::global_config::Settings;
use crate::core::host::{
    ArchiveSource, FeatureProbe, PackageManager, PackageManagerError, Prerequisites,
    SourceControl, Toolchain,
};
use crate::core::layout::WorkLayout;
use crate::core::stage::{Acquired, PipelineResult, StageCallback, StageExecutor, StageState};
use crate::core::version::{candidates_from_tags, VersionCandidate};
use crate::error::{FilesystemError, LockError, PipelineError, ResolveError, StageError};
use crate::infra::run_lock::RunLock;
use crate::infra::tags::TagClient;

/// The collaborators a run talks to
#[derive(Clone, Copy)]
pub struct Host<'a> {
    pub package_manager: &'a dyn PackageManager,
    pub prerequisites: &'a dyn Prerequisites,
    pub source_control: &'a dyn SourceControl,
    pub toolchain: &'a dyn Toolchain,
    pub probe: &'a dyn FeatureProbe,
    pub archives: &'a dyn ArchiveSource,
}

/// One component's line in the run summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentSummary {
    pub name: String,
    pub required: bool,
    pub acquisition: Acquisition,
    pub package: Option<String>,
    pub reason: Option<String>,
    pub state: StageState,
    pub acquired: Option<Acquired>,
    pub up_to_date: bool,
}

/// Everything a finished (or halted) run reports
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    /// Framework tag that was built
    pub ffmpeg_tag: String,
    /// Components in build order
    pub components: Vec<ComponentSummary>,
    /// Composed framework feature flags
    pub flags: Vec<String>,
    /// Degraded capabilities
    pub warnings: Vec<DegradedFeature>,
    /// Failure message, if the run halted
    pub failure: Option<String>,
    #[serde(skip)]
    error: Option<StageError>,
}

impl PipelineReport {
    fn new(
        ffmpeg_tag: &str,
        table: &ComponentTable,
        records: &Resolutions,
        result: PipelineResult,
    ) -> Self {
        let components = table
            .iter()
            .filter_map(|component| {
                let record = records.get(&component.name)?;
                let stage = result.stage(&component.name)?;
                Some(ComponentSummary {
                    name: component.name.clone(),
                    required: component.required,
                    acquisition: record.acquisition(),
                    package: record.package().map(String::from),
                    reason: record.reason().map(String::from),
                    state: stage.state(),
                    acquired: stage.acquired(),
                    up_to_date: stage.is_up_to_date(),
                })
            })
            .collect();
        let composed = result.composed.unwrap_or_default();

        Self {
            ffmpeg_tag: ffmpeg_tag.to_string(),
            components,
            flags: composed.flags,
            warnings: composed.warnings,
            failure: result.failure.as_ref().map(ToString::to_string),
            error: result.failure,
        }
    }

    /// Whether every stage finished
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// The failure that halted the run
    pub fn error(&self) -> Option<&StageError> {
        self.error.as_ref()
    }

    /// Summary line for `name`
    pub fn component(&self, name: &str) -> Option<&ComponentSummary> {
        self.components.iter().find(|c| c.name == name)
    }
}

/// One component's line in a dry-run plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedComponent {
    pub name: String,
    pub required: bool,
    pub acquisition: Acquisition,
    pub package: Option<String>,
    pub reason: Option<String>,
    /// Whether a build stage would run
    pub builds: bool,
}

/// What a build would do, computed without side effects
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    pub ffmpeg_tag: Option<String>,
    pub package_manager: Option<PackageManagerKind>,
    pub components: Vec<PlannedComponent>,
    pub flags: Vec<String>,
    pub extra_flags: Vec<String>,
    pub warnings: Vec<DegradedFeature>,
}

/// Package manager that reports every package as installable
struct PlanningPackageManager {
    kind: Option<PackageManagerKind>,
}

impl PackageManager for PlanningPackageManager {
    fn kind(&self) -> Option<PackageManagerKind> {
        self.kind
    }

    fn install(&self, _package: &str) -> Result<(), PackageManagerError> {
        Ok(())
    }
}

/// Probe assuming every scheduled build installs its library
struct AssumeInstalled;

impl FeatureProbe for AssumeInstalled {
    fn probe(&self, _module: &str) -> bool {
        true
    }
}

/// Fetch the tag list of `repo` and classify every tag
pub async fn fetch_candidates(
    tags: &TagClient,
    repo: &str,
) -> Result<Vec<VersionCandidate>, PipelineError> {
    let tags = tags.list_tags(repo).await?;
    Ok(candidates_from_tags(tags))
}

/// Release candidates for the repository named in `settings`
pub async fn release_candidates(settings: &Settings) -> Result<Vec<VersionCandidate>, PipelineError> {
    fetch_candidates(&TagClient::with_base_url(&settings.github_api), &settings.ffmpeg_repo).await
}

/// Drives one run
pub struct Pipeline<'a> {
    settings: Settings,
    table: ComponentTable,
    host: Host<'a>,
    tags: TagClient,
    force: bool,
}

impl<'a> Pipeline<'a> {
    /// Pipeline over the built-in table, with the framework repo from `settings`
    pub fn new(settings: Settings, host: Host<'a>) -> Self {
        let table = ComponentTable::builtin().with_framework_url(&repo_url(&settings.ffmpeg_repo));
        let tags = TagClient::with_base_url(&settings.github_api);
        Self {
            settings,
            table,
            host,
            tags,
            force: false,
        }
    }

    /// Replace the component table
    #[must_use]
    pub fn with_table(mut self, table: ComponentTable) -> Self {
        self.table = table;
        self
    }

    /// Rebuild even when install stamps are current
    #[must_use]
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Component table in use
    pub fn table(&self) -> &ComponentTable {
        &self.table
    }

    /// Effective settings
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Working-copy tree
    pub fn layout(&self) -> WorkLayout {
        WorkLayout::new(self.settings.work_dir.clone())
    }

    /// Environment handed to every toolchain command
    pub fn build_env(&self) -> BuildEnvironment {
        BuildEnvironment::new(self.settings.prefix.clone(), self.settings.bin_dir.clone())
            .with_jobs(self.settings.jobs)
    }

    /// Release candidates of the framework repository, fetched fresh
    pub async fn candidates(&self) -> Result<Vec<VersionCandidate>, PipelineError> {
        fetch_candidates(&self.tags, &self.settings.ffmpeg_repo).await
    }

    /// Run the fallback resolver over the table, installing packages
    pub fn resolve_dependencies(&self) -> Result<Resolutions, ResolveError> {
        FallbackResolver::new(
            self.host.package_manager,
            self.host.prerequisites,
            self.resolve_options(),
        )
        .resolve_all(&self.table)
    }

    /// Dry run: resolve without installing and compose the flags
    ///
    /// Never touches the working-copy tree.
    pub fn plan(&self, ffmpeg_tag: Option<&str>) -> Result<Plan, ResolveError> {
        let planner = PlanningPackageManager {
            kind: self.host.package_manager.kind(),
        };
        let records = FallbackResolver::new(&planner, self.host.prerequisites, self.resolve_options())
            .resolve_all(&self.table)?;
        let composed = FeatureComposer::new(&AssumeInstalled).compose(&self.table, &records);

        let components = self
            .table
            .iter()
            .filter_map(|component| {
                let record = records.get(&component.name)?;
                Some(PlannedComponent {
                    name: component.name.clone(),
                    required: component.required,
                    acquisition: record.acquisition(),
                    package: record.package().map(String::from),
                    reason: record.reason().map(String::from),
                    builds: record.needs_build(),
                })
            })
            .collect();

        Ok(Plan {
            ffmpeg_tag: ffmpeg_tag.map(String::from),
            package_manager: planner.kind,
            components,
            flags: composed.flags,
            extra_flags: self.settings.ffmpeg_extra_flags.clone(),
            warnings: composed.warnings,
        })
    }

    /// Resolve dependencies and run every stage for `ffmpeg_tag`
    ///
    /// A halted run still returns its report; the failure is inside it.
    pub async fn run(
        &self,
        ffmpeg_tag: &str,
        callback: Option<StageCallback>,
    ) -> Result<PipelineReport, PipelineError> {
        let layout = self.layout();
        if RunLock::is_held(&layout.lock_path()) {
            return Err(LockError::Held {
                path: layout.lock_path(),
            }
            .into());
        }

        // Nothing under the work dir, prefix or bin dir exists until resolution succeeds
        let records = self.resolve_dependencies()?;
        let _lock = RunLock::acquire(&layout.lock_path())?;
        for dir in [&self.settings.prefix, &self.settings.bin_dir] {
            fs::create_dir_all(dir).map_err(|e| FilesystemError::CreateDir {
                path: dir.clone(),
                error: e.to_string(),
            })?;
        }

        info!(
            "Building {} component(s), ffmpeg {ffmpeg_tag}",
            records.iter().filter(|r| r.needs_build()).count()
        );

        let mut executor = StageExecutor::new(
            layout,
            self.host.source_control,
            self.host.archives,
            self.host.toolchain,
            FeatureComposer::new(self.host.probe),
            self.build_env(),
        )
        .with_force(self.force)
        .with_extra_framework_flags(self.settings.ffmpeg_extra_flags.clone());
        if let Some(callback) = callback {
            executor = executor.with_callback(callback);
        }

        let result = executor.run(&self.table, &records, Some(ffmpeg_tag)).await;
        Ok(PipelineReport::new(ffmpeg_tag, &self.table, &records, result))
    }

    fn resolve_options(&self) -> ResolveOptions {
        ResolveOptions {
            skip_package_manager: self.settings.no_package_manager,
            disabled: self.settings.skip.clone(),
        }
    }
}
