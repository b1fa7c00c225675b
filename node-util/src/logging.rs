//! Minimal logging bootstrap for binaries and tests.
//!
//! Library code never calls `init`; it only ever logs through the `log`
//! crate's macros and leaves the choice of sink to the process embedding it.

use std::sync::Once;

static INIT: Once = Once::new();

/// Initialize the global `env_logger` sink. Safe to call more than once;
/// only the first call has an effect.
pub fn init() {
    INIT.call_once(|| {
        env_logger::try_init().ok();
    });
}
