// src/engine/common.rs
//
// Common utilities shared across engine modules.

use crate::error::ThumbkitError;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Run a codec call under the engine's panic policy.
///
/// The C-backed codecs (mozjpeg, libwebp) and hostile inputs can panic; a
/// panic inside `stage` is converted to `InternalPanic` so callers see a
/// normal error instead of unwinding through the pipeline. The validity
/// probe relies on this to keep its broad error-to-false collapse bounded
/// to the decode expression.
pub fn run_with_panic_policy<T, F>(stage: &str, f: F) -> Result<T, ThumbkitError>
where
    F: FnOnce() -> Result<T, ThumbkitError>,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let detail = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            tracing::debug!(stage, %detail, "codec panicked");
            Err(ThumbkitError::internal_panic(format!(
                "{stage} panicked: {detail}"
            )))
        }
    }
}
