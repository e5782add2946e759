//! Dependency spec table
//!
//! The fixed, ordered set of components making up the media stack. Each
//! component has an optional primary acquisition method (a system package)
//! and a secondary one (a source build). Components never depend on a later
//! component, so table order is build order.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::urls;
use crate::error::ResolveError;

/// System package managers ffstack knows how to drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageManagerKind {
    /// Debian, Ubuntu
    Apt,
    /// Fedora, RHEL
    Dnf,
    /// Arch Linux
    Pacman,
    /// Homebrew (macOS)
    Brew,
}

impl PackageManagerKind {
    /// All known kinds, in detection order
    pub fn all() -> &'static [PackageManagerKind] {
        &[Self::Apt, Self::Dnf, Self::Pacman, Self::Brew]
    }

    /// Executable that identifies this package manager on PATH
    pub fn program(self) -> &'static str {
        match self {
            Self::Apt => "apt-get",
            Self::Dnf => "dnf",
            Self::Pacman => "pacman",
            Self::Brew => "brew",
        }
    }
}

impl fmt::Display for PackageManagerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Apt => "apt",
            Self::Dnf => "dnf",
            Self::Pacman => "pacman",
            Self::Brew => "brew",
        };
        f.write_str(name)
    }
}

/// What role a component plays in the stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentKind {
    /// Assembler used by later codec builds
    Assembler,
    /// Audio or video codec library
    Codec,
    /// Network transport library
    Transport,
    /// The top-level media framework, built last
    Framework,
}

/// Primary acquisition: package names per package manager
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrimaryMethod {
    packages: BTreeMap<PackageManagerKind, String>,
}

impl PrimaryMethod {
    /// Create an empty primary method
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the package name used by `kind`
    #[must_use]
    pub fn with(mut self, kind: PackageManagerKind, package: &str) -> Self {
        self.packages.insert(kind, package.to_string());
        self
    }

    /// Package name for `kind`, if this platform ships one
    pub fn package_for(&self, kind: PackageManagerKind) -> Option<&str> {
        self.packages.get(&kind).map(String::as_str)
    }
}

/// Where the source for a secondary acquisition comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSpec {
    /// Git repository checked out at a tag
    Git { url: String, tag: TagPin },
    /// Release archive pinned by SHA-256
    Archive {
        url: String,
        file_name: String,
        sha256: String,
    },
}

/// Tag a git source is checked out at
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagPin {
    /// Fixed tag from the table
    Fixed(String),
    /// Chosen per run by the version resolver
    Resolved,
}

/// Build system driving configure/build/install
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildSystem {
    /// `./configure && make && make install`, optionally bootstrapped first
    Autotools { bootstrap: Option<String> },
    /// `cmake -S -B`, out of tree
    CMake,
    /// `meson setup` + ninja, out of tree
    Meson,
}

/// How a component is built from source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRecipe {
    /// Build system
    pub system: BuildSystem,
    /// Directory inside the working copy holding the build files
    pub subdir: Option<String>,
    /// Component-specific configure flags
    pub configure_flags: Vec<String>,
    /// Install executables into the configured bin dir
    pub installs_binaries: bool,
}

/// Secondary acquisition: a source build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecondaryMethod {
    /// Where the source comes from
    pub source: SourceSpec,
    /// How it is built
    pub recipe: BuildRecipe,
    /// Host tools the source build needs
    pub prerequisites: Vec<String>,
}

impl SecondaryMethod {
    /// Whether the source is a pinned artifact that must pass digest verification
    pub fn is_pinned_artifact(&self) -> bool {
        matches!(self.source, SourceSpec::Archive { .. })
    }
}

/// The configure flag an optional component contributes to the framework build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSpec {
    /// Enabling flag, e.g. `--enable-libopus`
    pub flag: String,
    /// Flags the enabling flag depends on, e.g. `--enable-gpl`
    pub implies: Vec<String>,
    /// pkg-config module re-probed at composition time
    pub probe: Option<String>,
}

/// One buildable unit of the stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    /// Unique name, also the working-copy directory name
    pub name: String,
    /// Role in the stack
    pub kind: ComponentKind,
    /// Position in build order
    pub position: usize,
    /// Whether the stack cannot be built without it
    pub required: bool,
    /// Package-manager acquisition
    pub primary: Option<PrimaryMethod>,
    /// Source-build acquisition
    pub secondary: SecondaryMethod,
    /// Flag contributed to the framework configure
    pub feature: Option<FeatureSpec>,
}

impl Component {
    /// Whether this component may be absent
    pub fn is_optional(&self) -> bool {
        !self.required
    }
}

/// Ordered component table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentTable {
    components: Vec<Component>,
}

impl ComponentTable {
    /// Build a table, checking ordering and naming invariants
    pub fn new(components: Vec<Component>) -> Result<Self, ResolveError> {
        let table = Self { components };
        table.validate()?;
        Ok(table)
    }

    /// The built-in media stack
    pub fn builtin() -> Self {
        Self {
            components: builtin_components(),
        }
    }

    /// Components in build order
    pub fn iter(&self) -> impl Iterator<Item = &Component> {
        self.components.iter()
    }

    /// Number of components
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Look up a component by name
    pub fn get(&self, name: &str) -> Option<&Component> {
        self.components.iter().find(|c| c.name == name)
    }

    /// The top-level framework component (always last)
    pub fn framework(&self) -> Option<&Component> {
        self.components
            .last()
            .filter(|c| c.kind == ComponentKind::Framework)
    }

    /// Point the framework's git source at `url`
    #[must_use]
    pub fn with_framework_url(mut self, url: &str) -> Self {
        if let Some(framework) = self
            .components
            .last_mut()
            .filter(|c| c.kind == ComponentKind::Framework)
        {
            if let SourceSpec::Git {
                url: ref mut current,
                ..
            } = framework.secondary.source
            {
                *current = url.to_string();
            }
        }
        self
    }

    fn validate(&self) -> Result<(), ResolveError> {
        let mut previous: Option<&Component> = None;
        for component in &self.components {
            if let Some(prev) = previous {
                if component.position <= prev.position {
                    return Err(ResolveError::InvalidTable {
                        message: format!(
                            "'{}' (position {}) must come after '{}' (position {})",
                            component.name, component.position, prev.name, prev.position
                        ),
                    });
                }
            }
            if self.components.iter().filter(|c| c.name == component.name).count() > 1 {
                return Err(ResolveError::InvalidTable {
                    message: format!("duplicate component '{}'", component.name),
                });
            }
            if component.kind == ComponentKind::Framework
                && !std::ptr::eq(component, self.components.last().unwrap_or(component))
            {
                return Err(ResolveError::InvalidTable {
                    message: format!("framework '{}' must be the last component", component.name),
                });
            }
            previous = Some(component);
        }
        Ok(())
    }
}

/// Clone URL of a GitHub repository given as `owner/name`
pub fn repo_url(repo: &str) -> String {
    format!("{}/{repo}.git", urls::GITHUB)
}

fn git(repo: &str, tag: &str) -> SourceSpec {
    SourceSpec::Git {
        url: repo_url(repo),
        tag: TagPin::Fixed(tag.to_string()),
    }
}

fn autotools(bootstrap: Option<&str>, flags: &[&str]) -> BuildRecipe {
    BuildRecipe {
        system: BuildSystem::Autotools {
            bootstrap: bootstrap.map(String::from),
        },
        subdir: None,
        configure_flags: flags.iter().map(|f| (*f).to_string()).collect(),
        installs_binaries: false,
    }
}

fn cmake(subdir: Option<&str>, flags: &[&str]) -> BuildRecipe {
    BuildRecipe {
        system: BuildSystem::CMake,
        subdir: subdir.map(String::from),
        configure_flags: flags.iter().map(|f| (*f).to_string()).collect(),
        installs_binaries: false,
    }
}

fn tools(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| (*n).to_string()).collect()
}

fn packages(apt: &str, dnf: &str, pacman: &str, brew: &str) -> Option<PrimaryMethod> {
    Some(
        PrimaryMethod::new()
            .with(PackageManagerKind::Apt, apt)
            .with(PackageManagerKind::Dnf, dnf)
            .with(PackageManagerKind::Pacman, pacman)
            .with(PackageManagerKind::Brew, brew),
    )
}

fn feature(flag: &str, implies: &[&str], probe: Option<&str>) -> Option<FeatureSpec> {
    Some(FeatureSpec {
        flag: flag.to_string(),
        implies: implies.iter().map(|f| (*f).to_string()).collect(),
        probe: probe.map(String::from),
    })
}

#[allow(clippy::too_many_lines)]
fn builtin_components() -> Vec<Component> {
    vec![
        Component {
            name: "nasm".to_string(),
            kind: ComponentKind::Assembler,
            position: 1,
            required: true,
            primary: packages("nasm", "nasm", "nasm", "nasm"),
            secondary: SecondaryMethod {
                source: git("netwide-assembler/nasm", "nasm-2.16.03"),
                recipe: BuildRecipe {
                    installs_binaries: true,
                    ..autotools(Some("./autogen.sh"), &[])
                },
                prerequisites: tools(&["git", "make", "autoreconf", "perl"]),
            },
            feature: None,
        },
        Component {
            name: "x265".to_string(),
            kind: ComponentKind::Codec,
            position: 2,
            required: false,
            primary: packages("libx265-dev", "x265-devel", "x265", "x265"),
            secondary: SecondaryMethod {
                source: git("videolan/x265", "4.1"),
                recipe: cmake(Some("source"), &["-DENABLE_SHARED=OFF"]),
                prerequisites: tools(&["git", "cmake", "make"]),
            },
            feature: feature("--enable-libx265", &["--enable-gpl"], None),
        },
        Component {
            name: "libvpx".to_string(),
            kind: ComponentKind::Codec,
            position: 3,
            required: false,
            primary: packages("libvpx-dev", "libvpx-devel", "libvpx", "libvpx"),
            secondary: SecondaryMethod {
                source: git("webmproject/libvpx", "v1.15.0"),
                recipe: autotools(
                    None,
                    &[
                        "--disable-examples",
                        "--disable-unit-tests",
                        "--enable-vp9-highbitdepth",
                        "--as=nasm",
                    ],
                ),
                prerequisites: tools(&["git", "make", "perl"]),
            },
            feature: feature("--enable-libvpx", &[], None),
        },
        Component {
            name: "fdk-aac".to_string(),
            kind: ComponentKind::Codec,
            position: 4,
            required: false,
            primary: packages("libfdk-aac-dev", "fdk-aac-devel", "libfdk-aac", "fdk-aac"),
            secondary: SecondaryMethod {
                source: git("mstorsjo/fdk-aac", "v2.0.3"),
                recipe: autotools(Some("autoreconf -fiv"), &["--disable-shared"]),
                prerequisites: tools(&["git", "make", "autoreconf", "libtoolize"]),
            },
            feature: feature("--enable-libfdk-aac", &["--enable-nonfree"], None),
        },
        Component {
            name: "lame".to_string(),
            kind: ComponentKind::Codec,
            position: 5,
            required: false,
            primary: packages("libmp3lame-dev", "lame-devel", "lame", "lame"),
            secondary: SecondaryMethod {
                source: SourceSpec::Archive {
                    url: urls::LAME_TARBALL.to_string(),
                    file_name: "lame-3.100.tar.gz".to_string(),
                    sha256: "ddfe36cab873794038ae2c1210557ad34857a4b6bdc515785d1da9e175b1da1e"
                        .to_string(),
                },
                recipe: autotools(None, &["--disable-shared", "--enable-nasm"]),
                prerequisites: tools(&["make"]),
            },
            feature: feature("--enable-libmp3lame", &[], None),
        },
        Component {
            name: "opus".to_string(),
            kind: ComponentKind::Codec,
            position: 6,
            required: false,
            primary: packages("libopus-dev", "opus-devel", "opus", "opus"),
            secondary: SecondaryMethod {
                source: git("xiph/opus", "v1.5.2"),
                recipe: autotools(Some("./autogen.sh"), &["--disable-shared"]),
                prerequisites: tools(&["git", "make", "autoreconf", "libtoolize"]),
            },
            feature: feature("--enable-libopus", &[], None),
        },
        Component {
            name: "dav1d".to_string(),
            kind: ComponentKind::Codec,
            position: 7,
            required: false,
            primary: packages("libdav1d-dev", "libdav1d-devel", "dav1d", "dav1d"),
            secondary: SecondaryMethod {
                source: git("videolan/dav1d", "1.5.1"),
                recipe: BuildRecipe {
                    system: BuildSystem::Meson,
                    subdir: None,
                    configure_flags: vec!["--default-library=static".to_string()],
                    installs_binaries: false,
                },
                prerequisites: tools(&["git", "meson", "ninja"]),
            },
            feature: feature("--enable-libdav1d", &[], None),
        },
        Component {
            name: "srt".to_string(),
            kind: ComponentKind::Transport,
            position: 8,
            required: false,
            primary: packages("libsrt-openssl-dev", "srt-devel", "srt", "srt"),
            secondary: SecondaryMethod {
                source: git("Haivision/srt", "v1.5.4"),
                recipe: cmake(None, &["-DENABLE_SHARED=OFF", "-DENABLE_APPS=OFF"]),
                prerequisites: tools(&["git", "cmake", "make"]),
            },
            feature: feature("--enable-libsrt", &[], Some("srt")),
        },
        Component {
            name: "ffmpeg".to_string(),
            kind: ComponentKind::Framework,
            position: 9,
            required: true,
            primary: None,
            secondary: SecondaryMethod {
                source: SourceSpec::Git {
                    url: repo_url(urls::FFMPEG_REPO),
                    tag: TagPin::Resolved,
                },
                recipe: BuildRecipe {
                    installs_binaries: true,
                    ..autotools(None, crate::config::defaults::FFMPEG_BASE_FLAGS)
                },
                prerequisites: tools(&["git", "make", "pkg-config"]),
            },
            feature: None,
        },
    ]
}
