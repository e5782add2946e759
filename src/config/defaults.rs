//! Default configuration values

/// Maximum number of download retry attempts
pub const MAX_DOWNLOAD_RETRIES: u32 = 3;

/// Base delay for download retry backoff (in milliseconds)
pub const DOWNLOAD_RETRY_DELAY_MS: u64 = 1000;

/// Tags requested per page from the tag listing API
pub const TAGS_PER_PAGE: usize = 100;

/// Upper bound on tag listing pages fetched in one run
pub const MAX_TAG_PAGES: usize = 20;

/// Tag markers that classify a release identifier as a prerelease
pub const PRERELEASE_MARKERS: &[&str] = &["dev", "rc", "alpha", "beta"];

/// Application directory name under the platform data/config dirs
pub const APP_NAME: &str = "ffstack";

/// Working copies live here, under the data directory
pub const SOURCES_SUBDIR: &str = "sources";

/// Install prefix for built libraries, under the data directory
pub const BUILD_SUBDIR: &str = "build";

/// Downloaded source archives, under the working-copy root
pub const ARCHIVES_SUBDIR: &str = "archives";

/// Install stamps, under the working-copy root
pub const STAMPS_SUBDIR: &str = "stamps";

/// Per-component toolchain logs, under the working-copy root
pub const LOGS_SUBDIR: &str = "logs";

/// Lock file serializing runs against one working-copy root
pub const LOCK_FILE_NAME: &str = ".ffstack.lock";

/// Marker written into a working copy recording what it was acquired at
pub const PIN_FILE_NAME: &str = ".ffstack-pin";

/// Configure flags every ffmpeg build receives
pub const FFMPEG_BASE_FLAGS: &[&str] = &["--pkg-config-flags=--static", "--extra-libs=-lpthread -lm"];
