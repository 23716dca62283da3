//! Registers the `sqlite-vec` extension with every SQLite connection opened
//! afterwards in this process.
//!
//! Registration is process-wide and happens at most once. Set
//! `DOCSIFT_SQLITE_VEC_AUTO=0` (or `false`/`off`) to keep the extension out
//! and force in-process cosine similarity.

use rusqlite::Connection;
use std::sync::OnceLock;

const AUTO_ENABLE_ENV: &str = "DOCSIFT_SQLITE_VEC_AUTO";

static REGISTRATION: OnceLock<Result<(), RegistrationError>> = OnceLock::new();

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistrationError {
    #[error("sqlite-vec auto-extension disabled by {AUTO_ENABLE_ENV}")]
    Disabled,
    #[error("sqlite3_auto_extension failed with rc={0}")]
    Sqlite(i32),
}

/// Register `sqlite-vec` as an auto-extension.
///
/// # Errors
///
/// Returns [`RegistrationError::Disabled`] when turned off through the
/// environment, or the SQLite return code when registration failed.
pub fn register_auto_extension() -> Result<(), RegistrationError> {
    if disabled_by_env(std::env::var(AUTO_ENABLE_ENV).ok().as_deref()) {
        return Err(RegistrationError::Disabled);
    }
    REGISTRATION.get_or_init(register_once).clone()
}

/// Whether `conn` can call `vec_*` functions.
#[must_use]
pub fn is_available(conn: &Connection) -> bool {
    conn.query_row("SELECT vec_version()", [], |row| row.get::<_, String>(0))
        .is_ok()
}

fn disabled_by_env(value: Option<&str>) -> bool {
    matches!(
        value.map(str::trim).map(str::to_ascii_lowercase).as_deref(),
        Some("0" | "false" | "off")
    )
}

fn register_once() -> Result<(), RegistrationError> {
    #[allow(clippy::transmute_ptr_to_ptr)]
    let entrypoint: unsafe extern "C" fn(
        *mut rusqlite::ffi::sqlite3,
        *mut *const std::os::raw::c_char,
        *const rusqlite::ffi::sqlite3_api_routines,
    ) -> std::os::raw::c_int =
        unsafe { std::mem::transmute(sqlite_vec::sqlite3_vec_init as *const ()) };

    let rc = unsafe { rusqlite::ffi::sqlite3_auto_extension(Some(entrypoint)) };
    if rc == rusqlite::ffi::SQLITE_OK {
        Ok(())
    } else {
        Err(RegistrationError::Sqlite(rc))
    }
}
