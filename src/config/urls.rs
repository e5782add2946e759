//! Source hosts and API URLs

/// GitHub REST API base URL (tag listing)
pub const GITHUB_API: &str = "https://api.github.com";

/// GitHub base URL for clones
pub const GITHUB: &str = "https://github.com";

/// Repository whose tags drive ffmpeg version resolution
pub const FFMPEG_REPO: &str = "FFmpeg/FFmpeg";

/// LAME release tarball (pinned by digest in the component table)
pub const LAME_TARBALL: &str =
    "https://downloads.sourceforge.net/project/lame/lame/3.100/lame-3.100.tar.gz";
