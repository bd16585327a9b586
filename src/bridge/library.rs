use std::collections::HashMap;
use std::ffi::{CStr, c_char, c_void};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use cqlbridge_abi::symbols::{
    AbiLayoutFn, BRIDGE_ABI_LAYOUT, BRIDGE_STRING_FREE, BoolQueryFn, BytesQueryFn, CountQueryFn,
    FillColumnSpecsFn, PREPARED_STATEMENT_FILL_RESULT, PREPARED_STATEMENT_FILL_VARIABLES,
    PREPARED_STATEMENT_FREE, PREPARED_STATEMENT_GET_ID, PREPARED_STATEMENT_IS_LWT,
    PREPARED_STATEMENT_RESULT_COUNT, PREPARED_STATEMENT_VARIABLES_COUNT, REQUIRED_SYMBOLS,
    ReleaseFn, StringFreeFn,
};
use cqlbridge_abi::{AbiLayout, FfiResult, NativeErrorCode};
use libloading::Library;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tracing::{debug, info, trace};

use super::result::NativeCallResult;
use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};

/// Libraries opened through [`NativeLibrary::load`], keyed by canonical path.
/// Entries are weak so the library unloads once the last facade is gone.
static LOADED: Lazy<Mutex<HashMap<PathBuf, Weak<NativeLibrary>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Entry points of one native engine.
#[derive(Clone, Copy)]
pub struct NativeApi {
    pub abi_layout: AbiLayoutFn,
    pub string_free: StringFreeFn,
    pub prepared_statement_free: ReleaseFn,
    pub prepared_statement_is_lwt: BoolQueryFn,
    pub prepared_statement_variables_count: CountQueryFn,
    pub prepared_statement_result_count: CountQueryFn,
    pub prepared_statement_fill_variables: FillColumnSpecsFn,
    pub prepared_statement_fill_result: FillColumnSpecsFn,
    pub prepared_statement_get_id: BytesQueryFn,
}

impl NativeApi {
    /// The engine compiled into this binary.
    #[cfg(feature = "linked-native")]
    pub fn linked() -> Self {
        use cqlbridge_native as engine;

        Self {
            abi_layout: engine::bridge_abi_layout,
            string_free: engine::bridge_string_free,
            prepared_statement_free: engine::prepared_statement_free,
            prepared_statement_is_lwt: engine::prepared_statement_is_lwt,
            prepared_statement_variables_count:
                engine::prepared_statement_get_variables_column_specs_count,
            prepared_statement_result_count:
                engine::prepared_statement_get_result_column_specs_count,
            prepared_statement_fill_variables:
                engine::prepared_statement_fill_variables_column_specs,
            prepared_statement_fill_result: engine::prepared_statement_fill_result_column_specs,
            prepared_statement_get_id: engine::prepared_statement_get_id,
        }
    }

    /// Resolves every required symbol from an opened library.
    ///
    /// # Safety
    ///
    /// The library must export each symbol with the signature declared in
    /// [`cqlbridge_abi::symbols`].
    pub unsafe fn resolve(library: &Library) -> Result<Self> {
        // Report the first missing export in contract order before binding.
        for name in REQUIRED_SYMBOLS {
            unsafe { symbol::<*const c_void>(library, name)? };
        }
        unsafe {
            Ok(Self {
                abi_layout: symbol(library, BRIDGE_ABI_LAYOUT)?,
                string_free: symbol(library, BRIDGE_STRING_FREE)?,
                prepared_statement_free: symbol(library, PREPARED_STATEMENT_FREE)?,
                prepared_statement_is_lwt: symbol(library, PREPARED_STATEMENT_IS_LWT)?,
                prepared_statement_variables_count: symbol(
                    library,
                    PREPARED_STATEMENT_VARIABLES_COUNT,
                )?,
                prepared_statement_result_count: symbol(library, PREPARED_STATEMENT_RESULT_COUNT)?,
                prepared_statement_fill_variables: symbol(
                    library,
                    PREPARED_STATEMENT_FILL_VARIABLES,
                )?,
                prepared_statement_fill_result: symbol(library, PREPARED_STATEMENT_FILL_RESULT)?,
                prepared_statement_get_id: symbol(library, PREPARED_STATEMENT_GET_ID)?,
            })
        }
    }
}

impl fmt::Debug for NativeApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeApi").finish_non_exhaustive()
    }
}

unsafe fn symbol<T: Copy>(library: &Library, name: &'static str) -> Result<T> {
    let symbol = unsafe { library.get::<T>(name.as_bytes()) }
        .map_err(|source| BridgeError::SymbolNotFound { symbol: name, source })?;
    Ok(*symbol)
}

/// Where a [`NativeLibrary`] got its entry points from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineOrigin {
    Linked,
    Dynamic(PathBuf),
    Custom,
}

/// A bound native engine. Facades share it through an `Arc`, so a dynamically
/// loaded library outlives every handle it produced.
pub struct NativeLibrary {
    api: NativeApi,
    origin: EngineOrigin,
    // Dropped last; `api` points into it.
    _library: Option<Library>,
}

impl NativeLibrary {
    /// Binds a caller-supplied entry-point table after checking its layout.
    ///
    /// # Safety
    ///
    /// Every pointer in `api` must implement the contract documented on the
    /// matching type in `cqlbridge_abi::symbols`. The layout query runs here,
    /// and the rest run whenever a facade built on this library is used.
    pub unsafe fn from_api(api: NativeApi) -> Result<Arc<Self>> {
        Self::bind(api, EngineOrigin::Custom, None).map(Arc::new)
    }

    /// The engine linked into this binary. Every call returns the same instance.
    #[cfg(feature = "linked-native")]
    pub fn linked() -> Result<Arc<Self>> {
        static LINKED: Lazy<Mutex<Weak<NativeLibrary>>> = Lazy::new(|| Mutex::new(Weak::new()));

        let mut slot = LINKED.lock();
        if let Some(library) = slot.upgrade() {
            return Ok(library);
        }
        let library = Arc::new(Self::bind(NativeApi::linked(), EngineOrigin::Linked, None)?);
        *slot = Arc::downgrade(&library);
        Ok(library)
    }

    /// Opens an engine shared library. Loading the same file twice while the
    /// first instance is alive returns that instance.
    pub fn load(path: impl AsRef<Path>) -> Result<Arc<Self>> {
        let path = path.as_ref();
        let key = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());

        let mut loaded = LOADED.lock();
        if let Some(library) = loaded.get(&key).and_then(Weak::upgrade) {
            trace!(path = %key.display(), "reusing loaded native library");
            return Ok(library);
        }

        let library = unsafe { Library::new(&key) }.map_err(|source| BridgeError::LibraryLoad {
            path: key.clone(),
            source,
        })?;
        let api = unsafe { NativeApi::resolve(&library)? };
        let bound = Arc::new(Self::bind(
            api,
            EngineOrigin::Dynamic(key.clone()),
            Some(library),
        )?);

        info!(path = %key.display(), "loaded native engine");
        loaded.retain(|_, weak| weak.strong_count() > 0);
        loaded.insert(key, Arc::downgrade(&bound));
        Ok(bound)
    }

    /// Picks the engine named by the configuration, falling back to the
    /// linked one.
    pub fn from_config(config: &BridgeConfig) -> Result<Arc<Self>> {
        match &config.native_library {
            Some(path) => Self::load(path),
            None => Self::default_engine(),
        }
    }

    #[cfg(feature = "linked-native")]
    fn default_engine() -> Result<Arc<Self>> {
        Self::linked()
    }

    #[cfg(not(feature = "linked-native"))]
    fn default_engine() -> Result<Arc<Self>> {
        Err(BridgeError::NoEngine(format!(
            "no native library configured (set {}) and the linked engine is disabled",
            crate::config::NATIVE_LIB_ENV
        )))
    }

    fn bind(api: NativeApi, origin: EngineOrigin, library: Option<Library>) -> Result<Self> {
        let reported = unsafe { (api.abi_layout)() };
        if let Some(detail) = reported.mismatch(&AbiLayout::current()) {
            return Err(BridgeError::mismatch(BRIDGE_ABI_LAYOUT, detail));
        }
        debug!(?origin, version = reported.version, "bound native engine");
        Ok(Self {
            api,
            origin,
            _library: library,
        })
    }

    pub fn api(&self) -> &NativeApi {
        &self.api
    }

    pub fn origin(&self) -> &EngineOrigin {
        &self.origin
    }

    /// Decodes a raw call result, handing any message back to the engine.
    pub fn decode(&self, entry_point: &'static str, raw: FfiResult) -> Result<NativeCallResult> {
        let message = unsafe { self.take_message(raw.message) };
        if raw.code == NativeErrorCode::Ok.raw() {
            return Ok(NativeCallResult::Success);
        }

        let code = NativeErrorCode::from_raw(raw.code).ok_or_else(|| {
            BridgeError::mismatch(entry_point, format!("unknown native error code {}", raw.code))
        })?;
        trace!(entry_point, %code, "native call reported failure");
        Ok(NativeCallResult::Failure { code, message })
    }

    /// [`Self::decode`] followed by [`NativeCallResult::into_result`].
    pub fn check(&self, entry_point: &'static str, raw: FfiResult) -> Result<()> {
        self.decode(entry_point, raw)?.into_result(entry_point)
    }

    unsafe fn take_message(&self, message: *mut c_char) -> Option<String> {
        if message.is_null() {
            return None;
        }
        let text = unsafe { CStr::from_ptr(message) }
            .to_string_lossy()
            .into_owned();
        unsafe { (self.api.string_free)(message) };
        Some(text)
    }
}

impl fmt::Debug for NativeLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeLibrary")
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

#[cfg(all(test, feature = "linked-native"))]
mod tests {
    use super::*;

    unsafe extern "C" fn wide_bool_layout() -> AbiLayout {
        AbiLayout {
            bool_width: 4,
            ..AbiLayout::current()
        }
    }

    #[test]
    fn linked_engine_is_shared() {
        let first = NativeLibrary::linked().unwrap();
        let second = NativeLibrary::linked().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.origin(), &EngineOrigin::Linked);
    }

    #[test]
    fn layout_disagreement_is_rejected() {
        let api = NativeApi {
            abi_layout: wide_bool_layout,
            ..NativeApi::linked()
        };
        let err = unsafe { NativeLibrary::from_api(api) }.unwrap_err();
        assert!(matches!(
            err,
            BridgeError::MarshalingMismatch {
                entry_point: "bridge_abi_layout",
                ..
            }
        ));
    }

    #[test]
    fn decode_frees_failure_message() {
        let library = NativeLibrary::linked().unwrap();
        let raw = FfiResult::failure(NativeErrorCode::InvalidQuery, "unknown table t");
        let outcome = library.decode("prepared_statement_is_lwt", raw).unwrap();
        assert_eq!(
            outcome,
            NativeCallResult::Failure {
                code: NativeErrorCode::InvalidQuery,
                message: Some("unknown table t".into()),
            }
        );
    }

    #[test]
    fn unknown_code_is_a_mismatch() {
        let library = NativeLibrary::linked().unwrap();
        let raw = FfiResult {
            code: 4096,
            message: std::ptr::null_mut(),
        };
        let err = library.decode("prepared_statement_get_id", raw).unwrap_err();
        assert!(err.to_string().contains("unknown native error code 4096"));
    }

    #[test]
    fn missing_file_reports_the_path() {
        let err = NativeLibrary::load("/nonexistent/libcqlbridge_native.so").unwrap_err();
        match err {
            BridgeError::LibraryLoad { path, .. } => {
                assert_eq!(path, PathBuf::from("/nonexistent/libcqlbridge_native.so"));
            }
            other => panic!("expected load failure, got {other:?}"),
        }
    }
}
