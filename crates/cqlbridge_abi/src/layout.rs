use crate::handle::NativeHandle;
use crate::types::FfiBool;

/// Bumped whenever an entry point signature or a shared type changes.
pub const ABI_VERSION: u32 = 1;

/// Widths of the out-parameter types, as compiled into one side.
///
/// Both sides build their own value with [`AbiLayout::current`]; the managed
/// side refuses to bind an engine whose layout differs from its own.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbiLayout {
    pub version: u32,
    pub bool_width: u8,
    pub count_width: u8,
    pub handle_width: u8,
}

impl AbiLayout {
    pub const fn current() -> Self {
        Self {
            version: ABI_VERSION,
            bool_width: std::mem::size_of::<FfiBool>() as u8,
            count_width: std::mem::size_of::<usize>() as u8,
            handle_width: std::mem::size_of::<NativeHandle>() as u8,
        }
    }

    /// Describes the first field that differs from `expected`.
    pub fn mismatch(&self, expected: &Self) -> Option<String> {
        if self.version != expected.version {
            return Some(format!(
                "abi version {} (expected {})",
                self.version, expected.version
            ));
        }
        if self.bool_width != expected.bool_width {
            return Some(format!(
                "boolean width {} (expected {})",
                self.bool_width, expected.bool_width
            ));
        }
        if self.count_width != expected.count_width {
            return Some(format!(
                "count width {} (expected {})",
                self.count_width, expected.count_width
            ));
        }
        if self.handle_width != expected.handle_width {
            return Some(format!(
                "handle width {} (expected {})",
                self.handle_width, expected.handle_width
            ));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_layout_pins_single_byte_bool() {
        let layout = AbiLayout::current();
        assert_eq!(layout.bool_width, 1);
        assert_eq!(layout.mismatch(&AbiLayout::current()), None);
    }

    #[test]
    fn mismatch_names_the_field() {
        let mut foreign = AbiLayout::current();
        foreign.bool_width = 4;
        let detail = foreign.mismatch(&AbiLayout::current()).unwrap();
        assert!(detail.contains("boolean width 4"));
    }
}
