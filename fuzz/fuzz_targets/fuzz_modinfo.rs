//! Fuzz target for image validation and name extraction.

#![no_main]

use lazyinit::loader::{ImageLoader, ModinfoLoader};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(image) = ModinfoLoader.verify(data) {
        assert!(!image.name.is_empty());
        assert!(data.starts_with(b"\x7fELF"));
    }
});
