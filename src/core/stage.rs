//! Stage executor
//!
//! Runs one build stage per component, strictly in table order. A stage walks
//! `pending → fetching → verifying → configuring → building → installing →
//! done`; any sub-step failure moves it to `failed` and halts the run, leaving
//! every later stage `pending`. Components resolved to a system package or
//! found unavailable get a `skipped` stage.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, info};

use crate::config::defaults::PIN_FILE_NAME;
use crate::core::build_env::BuildEnvironment;
use crate::core::component::{Component, ComponentKind, ComponentTable, SourceSpec, TagPin};
use crate::core::features::{ComposedFlags, FeatureComposer};
use crate::core::fallback::Resolutions;
use crate::core::host::{ArchiveSource, BuildContext, SourceControl, Toolchain, UpdateOutcome};
use crate::core::layout::WorkLayout;
use crate::core::stamp::InstallStamp;
use crate::error::StageError;

/// Lifecycle state of a build stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StageState {
    /// Not started
    Pending,
    /// Acquiring the source
    Fetching,
    /// Checking a pinned artifact
    Verifying,
    /// Running configure
    Configuring,
    /// Compiling
    Building,
    /// Installing into the prefix
    Installing,
    /// Finished
    Done,
    /// A sub-step failed
    Failed,
    /// No source build needed or possible
    Skipped,
}

impl StageState {
    /// Whether `self → next` is a legal transition
    ///
    /// `verifying → done` covers a working copy whose install stamp is current.
    pub fn can_transition_to(self, next: StageState) -> bool {
        use StageState::{
            Building, Configuring, Done, Failed, Fetching, Installing, Pending, Skipped, Verifying,
        };
        matches!(
            (self, next),
            (Pending, Fetching | Skipped)
                | (Fetching, Verifying | Failed)
                | (Verifying, Configuring | Done | Failed)
                | (Configuring, Building | Failed)
                | (Building, Installing | Failed)
                | (Installing, Done | Failed)
        )
    }

    /// Whether the stage can no longer change
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Skipped)
    }
}

impl fmt::Display for StageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Fetching => "fetching",
            Self::Verifying => "verifying",
            Self::Configuring => "configuring",
            Self::Building => "building",
            Self::Installing => "installing",
            Self::Done => "done",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        };
        f.write_str(name)
    }
}

/// Sub-step of a stage, named in failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Substep {
    /// Clone, update or download
    Acquire,
    /// Digest check and unpack
    Verify,
    /// Toolchain configure
    Configure,
    /// Toolchain build
    Build,
    /// Toolchain install
    Install,
}

impl fmt::Display for Substep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Acquire => "acquire",
            Self::Verify => "verify",
            Self::Configure => "configure",
            Self::Build => "build",
            Self::Install => "install",
        };
        f.write_str(name)
    }
}

/// How the source was acquired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Acquired {
    /// Cloned, downloaded or unpacked in this run
    Fresh,
    /// Existing working copy reused
    Updated,
}

impl fmt::Display for Acquired {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Fresh => "fresh",
            Self::Updated => "updated",
        })
    }
}

/// Per-run record of one component's stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildStage {
    component: String,
    state: StageState,
    acquired: Option<Acquired>,
    up_to_date: bool,
    failure: Option<StageError>,
}

impl BuildStage {
    /// New pending stage
    pub fn new(component: &str) -> Self {
        Self {
            component: component.to_string(),
            state: StageState::Pending,
            acquired: None,
            up_to_date: false,
            failure: None,
        }
    }

    /// Component name
    pub fn component(&self) -> &str {
        &self.component
    }

    /// Current state
    pub fn state(&self) -> StageState {
        self.state
    }

    /// Acquire outcome, once fetching finished
    pub fn acquired(&self) -> Option<Acquired> {
        self.acquired
    }

    /// Whether configure/build/install were skipped thanks to a current stamp
    pub fn is_up_to_date(&self) -> bool {
        self.up_to_date
    }

    /// Failure that ended the stage
    pub fn failure(&self) -> Option<&StageError> {
        self.failure.as_ref()
    }

    fn advance(&mut self, next: StageState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal stage transition {} -> {next} for {}",
            self.state,
            self.component
        );
        self.state = next;
    }
}

/// Outcome of one executor run
#[derive(Debug, Clone, Default)]
pub struct PipelineResult {
    /// One stage per component, in table order
    pub stages: Vec<BuildStage>,
    /// Framework feature flags and degraded-capability warnings, once composed
    pub composed: Option<ComposedFlags>,
    /// First failure; later stages were not attempted
    pub failure: Option<StageError>,
}

impl PipelineResult {
    /// Stage of `component`
    pub fn stage(&self, component: &str) -> Option<&BuildStage> {
        self.stages.iter().find(|s| s.component == component)
    }

    /// Whether every stage finished without failure
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

/// Observer notified of every stage transition
pub type StageCallback = Box<dyn Fn(&str, StageState) + Send + Sync>;

/// Runs build stages against the working-copy tree
pub struct StageExecutor<'a> {
    layout: WorkLayout,
    source_control: &'a dyn SourceControl,
    archives: &'a dyn ArchiveSource,
    toolchain: &'a dyn Toolchain,
    composer: FeatureComposer<'a>,
    env: BuildEnvironment,
    force: bool,
    extra_framework_flags: Vec<String>,
    on_transition: Option<StageCallback>,
}

impl<'a> StageExecutor<'a> {
    /// Create an executor over the given collaborators
    pub fn new(
        layout: WorkLayout,
        source_control: &'a dyn SourceControl,
        archives: &'a dyn ArchiveSource,
        toolchain: &'a dyn Toolchain,
        composer: FeatureComposer<'a>,
        env: BuildEnvironment,
    ) -> Self {
        Self {
            layout,
            source_control,
            archives,
            toolchain,
            composer,
            env,
            force: false,
            extra_framework_flags: Vec::new(),
            on_transition: None,
        }
    }

    /// Rebuild even when the install stamp is current
    #[must_use]
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Flags appended to the framework configure after the composed ones
    #[must_use]
    pub fn with_extra_framework_flags(mut self, flags: Vec<String>) -> Self {
        self.extra_framework_flags = flags;
        self
    }

    /// Observe stage transitions
    #[must_use]
    pub fn with_callback(mut self, callback: StageCallback) -> Self {
        self.on_transition = Some(callback);
        self
    }

    /// Run every stage in table order, halting at the first failure
    pub async fn run(
        &self,
        table: &ComponentTable,
        records: &Resolutions,
        framework_tag: Option<&str>,
    ) -> PipelineResult {
        let mut result = PipelineResult::default();

        for component in table.iter() {
            let mut stage = BuildStage::new(&component.name);

            if result.failure.is_some() {
                result.stages.push(stage);
                continue;
            }

            if component.kind == ComponentKind::Framework {
                result.composed = Some(self.composer.compose(table, records));
            }

            let needs_build = records
                .get(&component.name)
                .is_some_and(|r| r.needs_build());
            if !needs_build {
                self.set_state(&mut stage, StageState::Skipped);
                result.stages.push(stage);
                continue;
            }

            let flags = self.configure_flags(component, result.composed.as_ref());

            if let Err(error) = self
                .run_stage(component, &mut stage, framework_tag, &flags)
                .await
            {
                tracing::error!("{error}");
                self.set_state(&mut stage, StageState::Failed);
                stage.failure = Some(error.clone());
                result.failure = Some(error);
            }
            result.stages.push(stage);
        }

        result
    }

    async fn run_stage(
        &self,
        component: &Component,
        stage: &mut BuildStage,
        framework_tag: Option<&str>,
        flags: &[String],
    ) -> Result<(), StageError> {
        let name = component.name.as_str();

        self.set_state(stage, StageState::Fetching);
        let (acquired, identity) = match component.secondary.source {
            SourceSpec::Git { ref url, ref tag } => {
                let tag = match tag {
                    TagPin::Fixed(tag) => tag.as_str(),
                    TagPin::Resolved => framework_tag
                        .ok_or_else(|| failed(name, Substep::Acquire, "no version resolved"))?,
                };
                (self.acquire_git(name, url, tag)?, tag.to_string())
            }
            SourceSpec::Archive {
                ref url,
                ref file_name,
                ref sha256,
            } => (
                self.acquire_archive(name, url, file_name, sha256).await?,
                sha256.to_lowercase(),
            ),
        };
        stage.acquired = Some(acquired);
        info!("{name}: source {acquired}");

        self.set_state(stage, StageState::Verifying);
        if let SourceSpec::Archive {
            ref file_name,
            ref sha256,
            ..
        } = component.secondary.source
        {
            self.verify_archive(name, file_name, sha256, acquired)?;
        }

        let stamp_path = self.layout.stamp_path(name);
        if acquired == Acquired::Updated && !self.force {
            if let Some(stamp) = InstallStamp::load(&stamp_path) {
                if stamp.matches(&identity, flags) {
                    info!("{name}: up to date");
                    stage.up_to_date = true;
                    self.set_state(stage, StageState::Done);
                    return Ok(());
                }
            }
        }
        if stamp_path.exists() {
            fs::remove_file(&stamp_path)
                .map_err(|e| failed(name, Substep::Configure, &e.to_string()))?;
        }

        let ctx = self.build_context(component)?;

        self.set_state(stage, StageState::Configuring);
        self.toolchain
            .configure(&ctx, flags)
            .map_err(|e| failed(name, Substep::Configure, &e.to_string()))?;

        self.set_state(stage, StageState::Building);
        self.toolchain
            .build(&ctx, self.env.jobs)
            .map_err(|e| failed(name, Substep::Build, &e.to_string()))?;

        self.set_state(stage, StageState::Installing);
        self.toolchain
            .install(&ctx)
            .map_err(|e| failed(name, Substep::Install, &e.to_string()))?;

        InstallStamp::new(name, &identity, flags)
            .save(&stamp_path)
            .map_err(|e| failed(name, Substep::Install, &e.to_string()))?;

        self.set_state(stage, StageState::Done);
        Ok(())
    }

    /// Update the working copy in place, or clone it fresh
    fn acquire_git(&self, name: &str, url: &str, tag: &str) -> Result<Acquired, StageError> {
        let dest = self.layout.source_dir(name);

        if dest.exists() {
            match self.source_control.update(&dest, tag) {
                Ok(UpdateOutcome::Current) => return Ok(Acquired::Updated),
                Ok(UpdateOutcome::Moved) => {
                    info!("{name}: working copy moved to {tag}");
                    return Ok(Acquired::Updated);
                }
                Ok(UpdateOutcome::Unusable) => {
                    info!("{name}: working copy is not at {tag}, cloning again");
                }
                Err(e) => return Err(failed(name, Substep::Acquire, &e.to_string())),
            }
        }

        let commit = self
            .source_control
            .clone_at(url, tag, &dest)
            .map_err(|e| failed(name, Substep::Acquire, &e.to_string()))?;
        debug!("{name}: cloned {tag} at {commit}");
        Ok(Acquired::Fresh)
    }

    /// Reuse a downloaded and unpacked archive, or download it
    async fn acquire_archive(
        &self,
        name: &str,
        url: &str,
        file_name: &str,
        sha256: &str,
    ) -> Result<Acquired, StageError> {
        let archive_path = self.layout.archive_path(file_name);

        if archive_path.exists() {
            if unpacked_marker(&self.layout.source_dir(name)).as_deref()
                == Some(sha256.to_lowercase().as_str())
            {
                return Ok(Acquired::Updated);
            }
            return Ok(Acquired::Fresh);
        }

        info!("{name}: downloading {url}");
        let bytes = self
            .archives
            .fetch(url, &archive_path)
            .await
            .map_err(|e| failed(name, Substep::Acquire, &e.to_string()))?;
        debug!("{name}: downloaded {bytes} bytes");
        Ok(Acquired::Fresh)
    }

    /// Check the archive digest and unpack it when freshly acquired
    ///
    /// A mismatch leaves the archive in place for inspection.
    fn verify_archive(
        &self,
        name: &str,
        file_name: &str,
        sha256: &str,
        acquired: Acquired,
    ) -> Result<(), StageError> {
        let archive_path = self.layout.archive_path(file_name);
        let actual = self
            .archives
            .digest(&archive_path)
            .map_err(|e| failed(name, Substep::Verify, &e.to_string()))?;

        if !actual.eq_ignore_ascii_case(sha256) {
            return Err(StageError::IntegrityMismatch {
                component: name.to_string(),
                file: archive_path.display().to_string(),
                expected: sha256.to_lowercase(),
                actual,
            });
        }

        if acquired == Acquired::Fresh {
            let dest = self.layout.source_dir(name);
            if dest.exists() {
                fs::remove_dir_all(&dest)
                    .map_err(|e| failed(name, Substep::Verify, &e.to_string()))?;
            }
            self.archives
                .unpack(&archive_path, &dest)
                .map_err(|e| failed(name, Substep::Verify, &e.to_string()))?;
            fs::write(dest.join(PIN_FILE_NAME), format!("{}\n", sha256.to_lowercase()))
                .map_err(|e| failed(name, Substep::Verify, &e.to_string()))?;
        }
        Ok(())
    }

    fn build_context(&self, component: &Component) -> Result<BuildContext, StageError> {
        let name = component.name.as_str();
        let recipe = &component.secondary.recipe;

        let logs_dir = self.layout.logs_dir();
        fs::create_dir_all(&logs_dir)
            .map_err(|e| failed(name, Substep::Configure, &e.to_string()))?;

        let mut source_dir = self.layout.source_dir(name);
        if let Some(ref subdir) = recipe.subdir {
            source_dir = source_dir.join(subdir);
        }

        Ok(BuildContext {
            component: name.to_string(),
            system: recipe.system.clone(),
            source_dir,
            build_dir: self.layout.build_dir(name),
            log_file: self.layout.log_path(name),
            installs_binaries: recipe.installs_binaries,
            env: self.env.clone(),
        })
    }

    /// Flags passed to configure: recipe flags, then for the framework the
    /// prefix search flags, composed feature flags and user extras
    fn configure_flags(&self, component: &Component, composed: Option<&ComposedFlags>) -> Vec<String> {
        let mut flags = component.secondary.recipe.configure_flags.clone();
        if component.kind == ComponentKind::Framework {
            flags.push(format!("--extra-cflags=-I{}", self.env.include_dir().display()));
            flags.push(format!("--extra-ldflags=-L{}", self.env.lib_dir().display()));
            if let Some(composed) = composed {
                flags.extend(composed.flags.iter().cloned());
            }
            flags.extend(self.extra_framework_flags.iter().cloned());
        }
        flags
    }

    fn set_state(&self, stage: &mut BuildStage, next: StageState) {
        stage.advance(next);
        if let Some(ref callback) = self.on_transition {
            callback(&stage.component, next);
        }
    }
}

fn failed(component: &str, substep: Substep, reason: &str) -> StageError {
    StageError::StageFailed {
        component: component.to_string(),
        substep,
        reason: reason.to_string(),
    }
}

fn unpacked_marker(source_dir: &Path) -> Option<String> {
    fs::read_to_string(source_dir.join(PIN_FILE_NAME))
        .ok()
        .map(|s| s.trim().to_lowercase())
}
