//! CLI Exit Code Registry
//!
//! This is the single source of truth for all `vsxreport` exit codes.
//! Scripts that chain the report steps rely on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain    | Description                                  |
//! |---------|-----------|----------------------------------------------|
//! | 0       | Universal | Success                                      |
//! | 1       | Universal | General error (unspecified)                  |
//! | 2       | Universal | CLI usage error (bad args)                   |
//! | 3-9     | input     | Snapshot, config and report file problems    |
//! | 50-59   | fetch     | Registry and allow-list HTTP failures        |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Input (3-9)
// =============================================================================

/// A required input file is missing, or holds no usable records.
/// Nothing is written when this is returned.
pub const EXIT_INPUT_MISSING: u8 = 3;

/// An input file exists but is not the expected JSON shape.
pub const EXIT_INPUT_PARSE: u8 = 4;

/// The config file could not be read, parsed or validated.
pub const EXIT_CONFIG_INVALID: u8 = 5;

/// An output file (snapshot, report, index) could not be written.
pub const EXIT_OUTPUT_WRITE: u8 = 6;

// =============================================================================
// Fetch (50-59)
// =============================================================================

/// Auth rejected by the registry (401/403).
pub const EXIT_FETCH_AUTH: u8 = 50;

/// Request rejected by the registry (other 4xx).
pub const EXIT_FETCH_REJECTED: u8 = 51;

/// Rate limited after retries (429).
pub const EXIT_FETCH_RATE_LIMIT: u8 = 52;

/// Upstream error (5xx), network failure or unreadable body after retries.
pub const EXIT_FETCH_UPSTREAM: u8 = 53;

/// A listing produced no records at all; the previous snapshot is kept.
pub const EXIT_FETCH_EMPTY: u8 = 54;
