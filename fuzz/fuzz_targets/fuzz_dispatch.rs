//! Fuzz target for request sequences against a small registry.
//!
//! Checks that no sequence runs an initializer twice or fires the release
//! action more than once.

#![no_main]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use arbitrary::Arbitrary;
use lazyinit::dispatch::{ClassificationMode, LazyInit};
use lazyinit::policy::PolicyTables;
use lazyinit::registry::Registrar;
use libfuzzer_sys::fuzz_target;

const NAMES: [&str; 6] = ["a", "b", "c", "late", "skip", "ghost"];

#[derive(Debug, Arbitrary)]
struct Request {
    name: u8,
    args: Option<String>,
}

fuzz_target!(|requests: Vec<Request>| {
    let registrar = Registrar::new(
        PolicyTables::builder()
            .eligible(["a", "b", "c"])
            .deferred(["late"])
            .ignored(["skip"])
            .build(),
    );

    let calls: Vec<Arc<AtomicUsize>> = (0..4).map(|_| Arc::new(AtomicUsize::new(0))).collect();
    for (name, counter) in NAMES.iter().zip(&calls) {
        let counter = Arc::clone(counter);
        registrar.register(*name, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            0
        });
    }

    let released = Arc::new(AtomicUsize::new(0));
    let flag = Arc::clone(&released);
    let core = LazyInit::builder(registrar)
        .mode(ClassificationMode::Permissive)
        .reporter_enabled(false)
        .on_release(move || {
            flag.fetch_add(1, Ordering::SeqCst);
        })
        .build();

    for request in &requests {
        let name = NAMES[request.name as usize % NAMES.len()];
        core.dispatch(name, request.args.as_deref());
    }

    for counter in &calls {
        assert!(counter.load(Ordering::SeqCst) <= 1);
    }
    assert!(released.load(Ordering::SeqCst) <= 1);
    assert_eq!(core.is_completed(), released.load(Ordering::SeqCst) == 1);
});
