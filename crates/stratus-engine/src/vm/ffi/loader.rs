//! Symbol lookup in the running process

use std::ffi::{c_void, CString};
use thiserror::Error;

/// Errors raised while preparing foreign functions
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// No symbol with this name is visible to the process
    #[error("Native symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    /// The name cannot be passed to the dynamic linker
    #[error("Invalid native symbol name: {0:?}")]
    InvalidName(String),

    /// The signature uses a type the bridge cannot return
    #[error("Native function '{symbol}' returns {kind}, which cannot cross the native boundary")]
    UnsupportedReturn { symbol: String, kind: &'static str },

    /// Dynamic symbol lookup is not available on this platform
    #[error("Native calls are not supported on this platform")]
    Unsupported,
}

/// Address of `symbol` among the objects already loaded in this process
#[cfg(unix)]
pub fn resolve(symbol: &str) -> Result<*const c_void, LoadError> {
    let name = CString::new(symbol).map_err(|_| LoadError::InvalidName(symbol.to_string()))?;
    // SAFETY: `name` is a valid NUL-terminated string for the duration of the call
    let address = unsafe { libc::dlsym(libc::RTLD_DEFAULT, name.as_ptr()) };
    if address.is_null() {
        return Err(LoadError::SymbolNotFound {
            symbol: symbol.to_string(),
        });
    }
    Ok(address as *const c_void)
}

#[cfg(not(unix))]
pub fn resolve(symbol: &str) -> Result<*const c_void, LoadError> {
    let _ = CString::new(symbol).map_err(|_| LoadError::InvalidName(symbol.to_string()))?;
    Err(LoadError::Unsupported)
}
