/// Registry and numbering constants shared across the codebase.

// Technician registry (TIČR listing of certified electrical inspectors)
pub const DEFAULT_REGISTRY_URL: &str = "https://formulare.ticr.eu/rt.html";
pub const DEFAULT_REGISTRY_TIMEOUT_SECS: u64 = 8;

pub const REGISTRY_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119 Safari/537.36";
pub const REGISTRY_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
pub const REGISTRY_ACCEPT_LANGUAGE: &str = "cs-CZ,cs;q=0.9,en;q=0.8";

// Snapshot source labels recorded with every lookup
pub const LIVE_SOURCE: &str = "ticr-live";
pub const SNAPSHOT_SOURCE: &str = "ticr-snapshot";

/// Characters of context kept on each side of a certificate hit.
pub const MATCH_CONTEXT_CHARS: usize = 200;

/// Timestamp format for `checked_at` values.
pub const CHECKED_AT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

// Evidence numbers
pub const REVISION_PREFIX: &str = "RZ";
pub const PROTOCOL_PREFIX: &str = "VV";
pub const PROTOCOL_SEQUENCE_WIDTH: usize = 3;
pub const DEFAULT_MAX_NUMBER_ATTEMPTS: u32 = 5;

// Documents
pub const DEFAULT_REVISION_STATUS: &str = "Rozpracovaná";
pub const DEFAULT_DATABASE_PATH: &str = "data/revize.db";
pub const DEFAULT_LOG_DIR: &str = "logs";
pub const DEFAULT_PORT: u16 = 8080;
