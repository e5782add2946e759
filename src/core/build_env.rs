//! Build environment setup
//!
//! Every toolchain command runs with the install prefix on `PKG_CONFIG_PATH`
//! and the bin dir on `PATH`, so later stages link against libraries and use
//! the assembler installed by earlier stages.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Build environment shared by all stages of one run
#[derive(Debug, Clone, PartialEq)]
pub struct BuildEnvironment {
    /// Install prefix for libraries and headers
    pub prefix: PathBuf,
    /// Directory receiving executables
    pub bin_dir: PathBuf,
    /// Number of parallel jobs
    pub jobs: usize,
    /// `PATH` inherited from the caller
    pub inherited_path: Option<String>,
}

impl BuildEnvironment {
    /// Create an environment installing into `prefix` and `bin_dir`
    pub fn new(prefix: PathBuf, bin_dir: PathBuf) -> Self {
        Self {
            prefix,
            bin_dir,
            jobs: num_cpus::get(),
            inherited_path: std::env::var("PATH").ok(),
        }
    }

    /// Set the number of parallel jobs
    #[must_use]
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs;
        self
    }

    /// Replace the inherited `PATH`
    #[must_use]
    pub fn with_inherited_path(mut self, path: Option<String>) -> Self {
        self.inherited_path = path;
        self
    }

    /// pkg-config search path covering the prefix
    pub fn pkg_config_path(&self) -> String {
        join_paths(&[
            self.prefix.join("lib").join("pkgconfig"),
            self.prefix.join("lib64").join("pkgconfig"),
            self.prefix.join("share").join("pkgconfig"),
        ])
    }

    /// `PATH` with the bin dir and prefix bin dir in front
    pub fn search_path(&self) -> String {
        let mut path = join_paths(&[self.bin_dir.clone(), self.prefix.join("bin")]);
        if let Some(ref inherited) = self.inherited_path {
            if !inherited.is_empty() {
                path.push(':');
                path.push_str(inherited);
            }
        }
        path
    }

    /// Include dir under the prefix
    pub fn include_dir(&self) -> PathBuf {
        self.prefix.join("include")
    }

    /// Library dir under the prefix
    pub fn lib_dir(&self) -> PathBuf {
        self.prefix.join("lib")
    }

    /// Convert to environment variable map for process execution
    pub fn to_env_map(&self) -> HashMap<String, String> {
        let mut env = HashMap::new();

        env.insert("PKG_CONFIG_PATH".to_string(), self.pkg_config_path());
        env.insert("PATH".to_string(), self.search_path());
        env.insert("PREFIX".to_string(), display(&self.prefix));
        env.insert("JOBS".to_string(), self.jobs.to_string());
        env
    }
}

fn display(path: &Path) -> String {
    path.display().to_string()
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths.iter().map(|p| display(p)).collect::<Vec<_>>().join(":")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample() -> BuildEnvironment {
        BuildEnvironment::new(PathBuf::from("/opt/ff/build"), PathBuf::from("/home/u/bin"))
            .with_inherited_path(Some("/usr/bin:/bin".to_string()))
    }

    #[test]
    fn test_pkg_config_path_covers_prefix() {
        let env = sample();
        let path = env.pkg_config_path();
        assert!(path.starts_with("/opt/ff/build/lib/pkgconfig"));
        assert!(path.contains("/opt/ff/build/lib64/pkgconfig"));
    }

    #[test]
    fn test_search_path_puts_bin_dir_first() {
        let env = sample();
        assert_eq!(
            env.search_path(),
            "/home/u/bin:/opt/ff/build/bin:/usr/bin:/bin"
        );
    }

    #[test]
    fn test_search_path_without_inherited_path() {
        let env = sample().with_inherited_path(None);
        assert_eq!(env.search_path(), "/home/u/bin:/opt/ff/build/bin");
    }

    #[test]
    fn test_env_map_points_at_prefix() {
        let map = sample().with_jobs(3).to_env_map();
        assert_eq!(map.get("PREFIX").map(String::as_str), Some("/opt/ff/build"));
        assert_eq!(map.get("JOBS").map(String::as_str), Some("3"));
        assert!(map["PATH"].starts_with("/home/u/bin:"));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_env_map_contains_required_variables(
            prefix in "/[a-z]{1,10}(/[a-z]{1,10}){0,3}",
            jobs in 1usize..=64,
        ) {
            let env = BuildEnvironment::new(PathBuf::from(&prefix), PathBuf::from("/bin"))
                .with_jobs(jobs);
            let map = env.to_env_map();

            prop_assert!(map.contains_key("PKG_CONFIG_PATH"));
            prop_assert!(map.contains_key("PATH"));
            prop_assert_eq!(map.get("PREFIX").unwrap(), &prefix);
            prop_assert_eq!(map.get("JOBS").unwrap(), &jobs.to_string());
        }
    }
}
