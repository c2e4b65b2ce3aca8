//! Canonical default values shared across the wizard crates.

/// Quiet period after the last keystroke before a hint fetch is issued.
pub const DEFAULT_DEBOUNCE_MS: u64 = 300;
/// Maximum number of hints a catalog provider returns for one query.
pub const DEFAULT_HINT_LIMIT: usize = 10;
/// Hint category used by tag inputs.
pub const TAG_HINT_CATEGORY: &str = "tag";
/// Intention sent with every report-building request.
pub const DEFAULT_REPORT_INTENTION: &str = "reporting";
/// Capacity of the wizard session input and event channels.
pub const SESSION_CHANNEL_CAPACITY: usize = 256;

/// Colors assigned to tags by hashing the tag value.
pub const TAG_PALETTE: [&str; 8] = [
    "#5f6c72", "#3a87ad", "#468847", "#c09853", "#b94a48", "#7a43b6", "#2f96b4", "#d47500",
];
