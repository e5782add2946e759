//! Test utilities
//!
//! Proptest generators and in-memory fakes for the collaborator traits.

#[cfg(test)]
pub mod generators {
    use proptest::prelude::*;

    /// Stable ffmpeg-style release tag (`n6.1.2`, `n7.0`)
    pub fn release_tag() -> impl Strategy<Value = String> {
        (0u32..12, 0u32..12, proptest::option::of(0u32..12)).prop_map(
            |(major, minor, patch)| match patch {
                Some(patch) => format!("n{major}.{minor}.{patch}"),
                None => format!("n{major}.{minor}"),
            },
        )
    }

    /// Release tag with a prerelease marker
    pub fn prerelease_tag() -> impl Strategy<Value = String> {
        (
            0u32..12,
            0u32..12,
            prop_oneof![Just("dev"), Just("rc1"), Just("alpha"), Just("beta2")],
        )
            .prop_map(|(major, minor, marker)| format!("n{major}.{minor}-{marker}"))
    }
}

#[cfg(test)]
pub mod logs {
    use std::io;
    use std::sync::{Arc, Mutex};

    use tracing::Level;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Run `f` and collect the WARN and ERROR lines it logs on this thread
    pub fn warnings_during<T>(f: impl FnOnce() -> T) -> (T, Vec<String>) {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(Level::WARN)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let value = tracing::subscriber::with_default(subscriber, f);
        let text = String::from_utf8_lossy(&captured.0.lock().unwrap()).into_owned();
        (value, text.lines().map(String::from).collect())
    }
}

#[cfg(test)]
pub mod fakes {
    use std::collections::{BTreeMap, BTreeSet, HashSet};
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    use futures::future::BoxFuture;
    use sha2::{Digest, Sha256};

    use crate::core::component::PackageManagerKind;
    use crate::core::host::{
        ArchiveSource, BuildContext, FeatureProbe, PackageManager, PackageManagerError,
        Prerequisites, SourceControl, Toolchain, ToolchainError, UpdateOutcome,
    };
    use crate::core::stage::Substep;
    use crate::error::{ArchiveError, DownloadError, GitError};

    /// Package manager installing only the packages it was told about
    pub struct FakePackageManager {
        kind: Option<PackageManagerKind>,
        provides: HashSet<String>,
        attempts: Mutex<Vec<String>>,
    }

    impl FakePackageManager {
        /// An apt host where nothing installs yet
        pub fn apt() -> Self {
            Self {
                kind: Some(PackageManagerKind::Apt),
                provides: HashSet::new(),
                attempts: Mutex::new(Vec::new()),
            }
        }

        /// A host without any package manager
        pub fn none() -> Self {
            Self {
                kind: None,
                ..Self::apt()
            }
        }

        /// Packages that install successfully; `"*"` means all of them
        #[must_use]
        pub fn providing(mut self, packages: &[&str]) -> Self {
            self.provides
                .extend(packages.iter().map(|p| (*p).to_string()));
            self
        }

        /// Every install attempted, in order
        pub fn attempts(&self) -> Vec<String> {
            self.attempts.lock().unwrap().clone()
        }
    }

    impl PackageManager for FakePackageManager {
        fn kind(&self) -> Option<PackageManagerKind> {
            self.kind
        }

        fn install(&self, package: &str) -> Result<(), PackageManagerError> {
            self.attempts.lock().unwrap().push(package.to_string());
            if self.provides.contains("*") || self.provides.contains(package) {
                Ok(())
            } else {
                Err(PackageManagerError::InstallFailed {
                    package: package.to_string(),
                    reason: "Unable to locate package".to_string(),
                })
            }
        }
    }

    /// Host tool lookup over a fixed set
    pub struct FakeTools {
        available: Option<BTreeSet<String>>,
    }

    impl FakeTools {
        /// Every tool is present
        pub fn all() -> Self {
            Self { available: None }
        }

        /// Only `tools` are present
        pub fn only(tools: &[&str]) -> Self {
            Self {
                available: Some(tools.iter().map(|t| (*t).to_string()).collect()),
            }
        }
    }

    impl Prerequisites for FakeTools {
        fn is_available(&self, tool: &str) -> bool {
            self.available.as_ref().map_or(true, |set| set.contains(tool))
        }
    }

    /// Source control creating empty working copies on disk
    #[derive(Default)]
    pub struct FakeSourceControl {
        clones: Mutex<Vec<(String, String)>>,
        moves: Mutex<Vec<(PathBuf, String)>>,
        pinned: Mutex<BTreeMap<PathBuf, String>>,
        failing: Mutex<Vec<String>>,
        refuse_moves: bool,
    }

    impl FakeSourceControl {
        /// Source control where every clone succeeds
        pub fn new() -> Self {
            Self::default()
        }

        /// Make clones of URLs containing `pattern` fail
        pub fn fail_clone(&self, pattern: &str) {
            self.failing.lock().unwrap().push(pattern.to_string());
        }

        /// Working copies can only be re-cloned, never moved to another tag
        #[must_use]
        pub fn refusing_moves(mut self) -> Self {
            self.refuse_moves = true;
            self
        }

        /// Every `(url, tag)` cloned, in order
        pub fn clones(&self) -> Vec<(String, String)> {
            self.clones.lock().unwrap().clone()
        }

        /// Every `(working copy, tag)` moved in place, in order
        pub fn moves(&self) -> Vec<(PathBuf, String)> {
            self.moves.lock().unwrap().clone()
        }
    }

    impl SourceControl for FakeSourceControl {
        fn clone_at(&self, url: &str, tag: &str, dest: &Path) -> Result<String, GitError> {
            if self
                .failing
                .lock()
                .unwrap()
                .iter()
                .any(|p| url.contains(p.as_str()))
            {
                return Err(GitError::CloneFailed {
                    url: url.to_string(),
                    error: "connection refused".to_string(),
                });
            }
            if dest.exists() {
                fs::remove_dir_all(dest).unwrap();
            }
            fs::create_dir_all(dest).unwrap();
            fs::write(dest.join("README"), tag).unwrap();

            self.clones
                .lock()
                .unwrap()
                .push((url.to_string(), tag.to_string()));
            self.pinned
                .lock()
                .unwrap()
                .insert(dest.to_path_buf(), tag.to_string());
            Ok("0".repeat(40))
        }

        fn update(&self, dest: &Path, tag: &str) -> Result<UpdateOutcome, GitError> {
            let mut pinned = self.pinned.lock().unwrap();
            match pinned.get(dest) {
                Some(current) if current == tag => Ok(UpdateOutcome::Current),
                Some(_) if !self.refuse_moves => {
                    fs::write(dest.join("README"), tag).unwrap();
                    pinned.insert(dest.to_path_buf(), tag.to_string());
                    self.moves
                        .lock()
                        .unwrap()
                        .push((dest.to_path_buf(), tag.to_string()));
                    Ok(UpdateOutcome::Moved)
                }
                _ => Ok(UpdateOutcome::Unusable),
            }
        }
    }

    /// Archive source serving bodies from memory
    #[derive(Default)]
    pub struct FakeArchives {
        bodies: Mutex<BTreeMap<String, Vec<u8>>>,
        fetches: Mutex<Vec<String>>,
        unpacked: Mutex<Vec<PathBuf>>,
    }

    impl FakeArchives {
        pub fn new() -> Self {
            Self::default()
        }

        /// Answer `url` with `body`; other URLs answer 404
        #[must_use]
        pub fn serving(self, url: &str, body: &[u8]) -> Self {
            self.bodies
                .lock()
                .unwrap()
                .insert(url.to_string(), body.to_vec());
            self
        }

        /// URLs fetched, in order
        pub fn fetches(&self) -> Vec<String> {
            self.fetches.lock().unwrap().clone()
        }

        /// Directories unpacked into, in order
        pub fn unpacked(&self) -> Vec<PathBuf> {
            self.unpacked.lock().unwrap().clone()
        }
    }

    /// Lowercase hex SHA-256 of `data`
    pub fn sha256_of(data: &[u8]) -> String {
        hex::encode(Sha256::digest(data))
    }

    impl ArchiveSource for FakeArchives {
        fn fetch<'a>(
            &'a self,
            url: &'a str,
            dest: &'a Path,
        ) -> BoxFuture<'a, Result<u64, DownloadError>> {
            Box::pin(async move {
                self.fetches.lock().unwrap().push(url.to_string());
                let body = self.bodies.lock().unwrap().get(url).cloned();
                let Some(body) = body else {
                    return Err(DownloadError::HttpStatus {
                        url: url.to_string(),
                        status: 404,
                    });
                };
                fs::create_dir_all(dest.parent().unwrap()).unwrap();
                fs::write(dest, &body).unwrap();
                Ok(body.len() as u64)
            })
        }

        fn digest(&self, path: &Path) -> Result<String, DownloadError> {
            let data = fs::read(path).map_err(|e| DownloadError::IoError {
                path: path.to_path_buf(),
                error: e.to_string(),
            })?;
            Ok(sha256_of(&data))
        }

        fn unpack(&self, _archive: &Path, dest: &Path) -> Result<(), ArchiveError> {
            fs::create_dir_all(dest).unwrap();
            fs::write(dest.join("configure"), "#!/bin/sh\n").unwrap();
            self.unpacked.lock().unwrap().push(dest.to_path_buf());
            Ok(())
        }
    }

    /// Toolchain recording every invocation
    #[derive(Default)]
    pub struct FakeToolchain {
        calls: Mutex<Vec<(String, Substep)>>,
        flags: Mutex<BTreeMap<String, Vec<String>>>,
        contexts: Mutex<BTreeMap<String, BuildContext>>,
        jobs: Mutex<BTreeMap<String, usize>>,
        failures: Mutex<Vec<(String, Substep)>>,
    }

    impl FakeToolchain {
        /// Toolchain where every command succeeds
        pub fn new() -> Self {
            Self::default()
        }

        /// Make `substep` fail for `component`
        pub fn fail_at(&self, component: &str, substep: Substep) {
            self.failures
                .lock()
                .unwrap()
                .push((component.to_string(), substep));
        }

        /// Make every substep succeed again
        pub fn clear_failures(&self) {
            self.failures.lock().unwrap().clear();
        }

        /// Components configured, in order
        pub fn configured(&self) -> Vec<String> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|(_, s)| *s == Substep::Configure)
                .map(|(c, _)| c.clone())
                .collect()
        }

        /// Every `(component, substep)` invoked, in order
        pub fn calls(&self) -> Vec<(String, Substep)> {
            self.calls.lock().unwrap().clone()
        }

        /// Flags of the latest configure of `component`
        pub fn flags_for(&self, component: &str) -> Option<Vec<String>> {
            self.flags.lock().unwrap().get(component).cloned()
        }

        /// Context of the latest configure of `component`
        pub fn context_for(&self, component: &str) -> Option<BuildContext> {
            self.contexts.lock().unwrap().get(component).cloned()
        }

        /// Worker count of the latest build of `component`
        pub fn jobs_for(&self, component: &str) -> Option<usize> {
            self.jobs.lock().unwrap().get(component).copied()
        }

        fn record(&self, ctx: &BuildContext, substep: Substep) -> Result<(), ToolchainError> {
            self.calls
                .lock()
                .unwrap()
                .push((ctx.component.clone(), substep));
            let failing = self
                .failures
                .lock()
                .unwrap()
                .iter()
                .any(|(c, s)| *c == ctx.component && *s == substep);
            if failing {
                Err(ToolchainError::CommandFailed {
                    command: format!("{substep} {}", ctx.component),
                    status: "exit status: 2".to_string(),
                    log: ctx.log_file.display().to_string(),
                })
            } else {
                Ok(())
            }
        }
    }

    impl Toolchain for FakeToolchain {
        fn configure(&self, ctx: &BuildContext, flags: &[String]) -> Result<(), ToolchainError> {
            self.flags
                .lock()
                .unwrap()
                .insert(ctx.component.clone(), flags.to_vec());
            self.contexts
                .lock()
                .unwrap()
                .insert(ctx.component.clone(), ctx.clone());
            self.record(ctx, Substep::Configure)
        }

        fn build(&self, ctx: &BuildContext, jobs: usize) -> Result<(), ToolchainError> {
            self.jobs
                .lock()
                .unwrap()
                .insert(ctx.component.clone(), jobs);
            self.record(ctx, Substep::Build)
        }

        fn install(&self, ctx: &BuildContext) -> Result<(), ToolchainError> {
            self.record(ctx, Substep::Install)
        }
    }

    /// Composition-time probe over a fixed set of modules
    pub struct FakeProbe {
        available: BTreeSet<String>,
        probed: Mutex<Vec<String>>,
    }

    impl FakeProbe {
        /// Only `modules` are installed
        pub fn available(modules: &[&str]) -> Self {
            Self {
                available: modules.iter().map(|m| (*m).to_string()).collect(),
                probed: Mutex::new(Vec::new()),
            }
        }

        /// Modules probed, in order
        pub fn probed(&self) -> Vec<String> {
            self.probed.lock().unwrap().clone()
        }
    }

    impl FeatureProbe for FakeProbe {
        fn probe(&self, module: &str) -> bool {
            self.probed.lock().unwrap().push(module.to_string());
            self.available.contains(module)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::generators::*;
    use crate::core::version::VersionCandidate;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn test_release_tag_generator_is_stable(tag in release_tag()) {
            prop_assert!(VersionCandidate::from_tag(&tag).is_stable());
        }

        #[test]
        fn test_prerelease_tag_generator_is_prerelease(tag in prerelease_tag()) {
            prop_assert!(!VersionCandidate::from_tag(&tag).is_stable());
        }
    }
}
