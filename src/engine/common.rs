// src/engine/common.rs
//
// Panic containment for third-party codec calls.

use crate::error::{Result, StampcutError};
use std::panic::{catch_unwind, AssertUnwindSafe};

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Run `f`, turning a panic into [`StampcutError::InternalPanic`] tagged
/// with `stage` (e.g. `decode:png`).
pub fn run_with_panic_policy<T, F>(stage: &'static str, f: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(StampcutError::internal_panic(format!(
            "{stage}: {}",
            panic_message(payload.as_ref())
        ))),
    }
}
