//! A scriptable stand-in for the native engine.
//!
//! Each handle points at a leaked [`StubStatement`], so concurrently running
//! tests never share counters.

#![allow(dead_code)]

use std::ffi::{c_char, c_void};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use cqlbridge::{NativeApi, NativeHandle, NativeLibrary, PreparedStatement};
use cqlbridge_abi::symbols::ColumnSpecSetter;
use cqlbridge_abi::{
    AbiLayout, FfiBool, FfiByteSlice, FfiColumnSpec, FfiResult, FfiStr, NativeErrorCode,
};

#[derive(Default)]
pub struct StubStatement {
    pub lwt_byte: u8,
    pub columns: Vec<&'static str>,
    /// Index delivered for column `i` is `i + index_skew`.
    pub index_skew: usize,
    pub fail_with: Option<(i32, &'static str)>,
    /// Busy-work per call so calls overlap with disposal.
    pub spin: u32,
    /// Report the id as a null pointer with a non-zero length.
    pub dangling_id: bool,
    pub calls: AtomicUsize,
    pub releases: AtomicUsize,
    pub calls_after_release: AtomicUsize,
    pub released: AtomicBool,
}

impl StubStatement {
    pub fn leak(self) -> &'static Self {
        Box::leak(Box::new(self))
    }

    pub fn handle(&'static self) -> NativeHandle {
        NativeHandle::from_raw(std::ptr::from_ref(self) as *mut c_void)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    pub fn calls_after_release(&self) -> usize {
        self.calls_after_release.load(Ordering::SeqCst)
    }

    fn enter(&self) -> Option<FfiResult> {
        if self.released.load(Ordering::SeqCst) {
            self.calls_after_release.fetch_add(1, Ordering::SeqCst);
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        for _ in 0..self.spin {
            std::hint::spin_loop();
        }
        self.fail_with.map(|(code, message)| FfiResult {
            code,
            message: std::ffi::CString::new(message)
                .map(std::ffi::CString::into_raw)
                .unwrap_or(std::ptr::null_mut()),
        })
    }
}

fn stub<'a>(handle: NativeHandle) -> &'a StubStatement {
    unsafe { &*(handle.into_raw() as *const StubStatement) }
}

/// Messages handed back through `bridge_string_free`. Only read this from a
/// test binary with a single test touching failure messages.
pub static FREED_MESSAGES: AtomicUsize = AtomicUsize::new(0);

unsafe extern "C" fn stub_layout() -> AbiLayout {
    AbiLayout::current()
}

unsafe extern "C" fn stub_string_free(message: *mut c_char) {
    if !message.is_null() {
        drop(unsafe { std::ffi::CString::from_raw(message) });
        FREED_MESSAGES.fetch_add(1, Ordering::SeqCst);
    }
}

unsafe extern "C" fn stub_free(handle: NativeHandle) -> FfiResult {
    let statement = stub(handle);
    if statement.released.swap(true, Ordering::SeqCst) {
        statement.calls_after_release.fetch_add(1, Ordering::SeqCst);
    }
    statement.releases.fetch_add(1, Ordering::SeqCst);
    FfiResult::ok()
}

unsafe extern "C" fn stub_is_lwt(handle: NativeHandle, out: *mut FfiBool) -> FfiResult {
    let statement = stub(handle);
    if let Some(failure) = statement.enter() {
        return failure;
    }
    unsafe { out.write(FfiBool::from_raw(statement.lwt_byte)) };
    FfiResult::ok()
}

unsafe extern "C" fn stub_count(handle: NativeHandle, out: *mut usize) -> FfiResult {
    let statement = stub(handle);
    if let Some(failure) = statement.enter() {
        return failure;
    }
    unsafe { out.write(statement.columns.len()) };
    FfiResult::ok()
}

unsafe extern "C" fn stub_fill(
    handle: NativeHandle,
    target: *mut c_void,
    setter: Option<ColumnSpecSetter>,
) -> FfiResult {
    let statement = stub(handle);
    if let Some(failure) = statement.enter() {
        return failure;
    }
    let Some(setter) = setter else {
        return FfiResult::failure(NativeErrorCode::InvalidArgument, "null setter");
    };
    for (index, name) in statement.columns.iter().enumerate() {
        let spec = FfiColumnSpec {
            keyspace: FfiStr::new("stub_ks"),
            table: FfiStr::new("stub_table"),
            name: FfiStr::new(name),
            type_code: 0x000d,
        };
        unsafe { setter(target, index + statement.index_skew, spec) };
    }
    FfiResult::ok()
}

unsafe extern "C" fn stub_get_id(handle: NativeHandle, out: *mut FfiByteSlice<'_>) -> FfiResult {
    static ID: [u8; 4] = [0xca, 0xfe, 0xba, 0xbe];
    let statement = stub(handle);
    if let Some(failure) = statement.enter() {
        return failure;
    }
    let id = if statement.dangling_id {
        unsafe { FfiByteSlice::from_raw_parts(std::ptr::null(), ID.len()) }
    } else {
        FfiByteSlice::new(&ID)
    };
    unsafe { out.write(id) };
    FfiResult::ok()
}

pub fn stub_api() -> NativeApi {
    NativeApi {
        abi_layout: stub_layout,
        string_free: stub_string_free,
        prepared_statement_free: stub_free,
        prepared_statement_is_lwt: stub_is_lwt,
        prepared_statement_variables_count: stub_count,
        prepared_statement_result_count: stub_count,
        prepared_statement_fill_variables: stub_fill,
        prepared_statement_fill_result: stub_fill,
        prepared_statement_get_id: stub_get_id,
    }
}

pub fn stub_library() -> Arc<NativeLibrary> {
    // Every stub entry point honours the symbol contracts.
    unsafe { NativeLibrary::from_api(stub_api()) }.expect("stub layout matches")
}

pub fn stub_prepared(statement: StubStatement) -> (PreparedStatement, &'static StubStatement) {
    let statement = statement.leak();
    let prepared = unsafe { PreparedStatement::from_handle(stub_library(), statement.handle()) }
        .expect("stub handle is not null");
    (prepared, statement)
}
