use std::any::Any;
use std::ffi::c_void;
use std::panic::{AssertUnwindSafe, catch_unwind, resume_unwind};

use cqlbridge_abi::FfiColumnSpec;
use cqlbridge_abi::symbols::ColumnSpecSetter;

use crate::error::{BridgeError, Result};

/// Metadata of one bind variable or result column, borrowed from the engine
/// for the duration of a single visitor callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpec<'a> {
    pub index: usize,
    pub keyspace: &'a str,
    pub table: &'a str,
    pub name: &'a str,
    /// CQL type option id, e.g. `0x000d` for `varchar`.
    pub type_code: u16,
}

impl ColumnSpec<'_> {
    pub fn to_owned_spec(&self) -> OwnedColumnSpec {
        OwnedColumnSpec {
            keyspace: self.keyspace.to_string(),
            table: self.table.to_string(),
            name: self.name.to_string(),
            type_code: self.type_code,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OwnedColumnSpec {
    pub keyspace: String,
    pub table: String,
    pub name: String,
    pub type_code: u16,
}

/// State shared with [`visit_column_spec`] through the opaque `target` pointer.
pub(crate) struct ColumnVisit<'v, F> {
    entry_point: &'static str,
    visitor: &'v mut F,
    next_index: usize,
    error: Option<BridgeError>,
    panic: Option<Box<dyn Any + Send + 'static>>,
}

impl<'v, F> ColumnVisit<'v, F>
where
    F: FnMut(ColumnSpec<'_>),
{
    pub(crate) fn new(entry_point: &'static str, visitor: &'v mut F) -> Self {
        Self {
            entry_point,
            visitor,
            next_index: 0,
            error: None,
            panic: None,
        }
    }

    pub(crate) fn setter() -> ColumnSpecSetter {
        visit_column_spec::<F>
    }

    pub(crate) fn target(&mut self) -> *mut c_void {
        std::ptr::from_mut(self).cast()
    }

    /// Number of columns delivered, or the first problem seen while visiting.
    /// A panic raised by the visitor is resumed here, after the engine has
    /// returned.
    pub(crate) fn finish(self) -> Result<usize> {
        if let Some(payload) = self.panic {
            resume_unwind(payload);
        }
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.next_index),
        }
    }

    fn accept(&mut self, index: usize, spec: &FfiColumnSpec<'_>) {
        if self.error.is_some() || self.panic.is_some() {
            return;
        }
        if index != self.next_index {
            self.error = Some(BridgeError::mismatch(
                self.entry_point,
                format!("column index {index} delivered, expected {}", self.next_index),
            ));
            return;
        }

        let spec = match decode(index, spec) {
            Ok(spec) => spec,
            Err(detail) => {
                self.error = Some(BridgeError::mismatch(self.entry_point, detail));
                return;
            }
        };
        self.next_index += 1;

        let visitor = &mut *self.visitor;
        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| visitor(spec))) {
            self.panic = Some(payload);
        }
    }
}

fn decode<'a>(
    index: usize,
    spec: &FfiColumnSpec<'a>,
) -> std::result::Result<ColumnSpec<'a>, String> {
    let field = |what: &str, value: &cqlbridge_abi::FfiStr<'a>| {
        value
            .as_str()
            .map_err(|err| format!("column {index} {what} is not UTF-8: {err}"))
    };
    Ok(ColumnSpec {
        index,
        keyspace: field("keyspace", &spec.keyspace)?,
        table: field("table", &spec.table)?,
        name: field("name", &spec.name)?,
        type_code: spec.type_code,
    })
}

/// Setter handed to the engine. Unwinding out of it would cross the C
/// boundary, so visitor panics are parked in the context instead.
unsafe extern "C" fn visit_column_spec<F>(
    target: *mut c_void,
    index: usize,
    spec: FfiColumnSpec<'_>,
) where
    F: FnMut(ColumnSpec<'_>),
{
    if target.is_null() {
        return;
    }
    let visit = unsafe { &mut *target.cast::<ColumnVisit<'_, F>>() };
    visit.accept(index, &spec);
}
