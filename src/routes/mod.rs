/// Router Module Index
///
/// Splits the API into groups that each get their own access control layer.

/// Routes open to anyone: health, login, API docs.
pub mod public;

/// Routes for badge-reader hardware, authenticated by the shared reader key.
pub mod reader;

/// Routes behind authentication and the enabled-user access gate.
pub mod authenticated;
