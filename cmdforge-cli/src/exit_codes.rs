//! Process exit codes

pub const EXIT_SUCCESS: i32 = 0;
/// Completed, but something needs attention
pub const EXIT_WARNING: i32 = 1;
pub const EXIT_ERROR: i32 = 2;
