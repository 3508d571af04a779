//! Fuzz target for request argument splitting and translation.

#![no_main]

use lazyinit::params::{split_args, translate, ParamKind, ParamTable};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(raw) = std::str::from_utf8(data) else {
        return;
    };

    let (pairs, _) = split_args(raw);
    for pair in &pairs {
        assert!(!pair.param.is_empty());
        assert!(!pair.param.contains('-'));
    }

    let table = ParamTable::new()
        .with("fuzz", "flag", ParamKind::Bool)
        .with("fuzz", "level", ParamKind::Int)
        .with("fuzz", "name", ParamKind::Str);
    let _ = translate("fuzz", raw, &table);
});
