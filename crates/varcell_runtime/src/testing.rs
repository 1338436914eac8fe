//! A claim-counting object runtime for tests.
//!
//! Objects are plain ids; the ledger lives in a thread local so tests running
//! in parallel never see each other's objects. Releasing a freed object or
//! acquiring a claim on one panics, which turns double releases into test
//! failures instead of silent corruption.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use crate::object::{Claim, ObjectRuntime};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TestObject(u64);

impl TestObject {
    pub fn id(self) -> u64 {
        self.0
    }
}

#[derive(Default)]
struct Ledger {
    next_id: u64,
    claims: HashMap<u64, usize>,
    freed: HashSet<u64>,
    acquires: usize,
    releases: usize,
}

thread_local! {
    static LEDGER: RefCell<Ledger> = RefCell::new(Ledger::default());
}

/// Object runtime double that counts claims per object
pub struct CountingRuntime;

impl CountingRuntime {
    /// Allocate a new object and return the creator's claim on it
    pub fn allocate() -> Claim<Self> {
        Claim::from_owned(Self::allocate_raw())
    }

    /// Allocate a new object whose single claim the caller must release
    pub fn allocate_raw() -> TestObject {
        LEDGER.with(|ledger| {
            let mut ledger = ledger.borrow_mut();
            ledger.next_id += 1;
            let id = ledger.next_id;
            ledger.claims.insert(id, 1);
            TestObject(id)
        })
    }

    /// Allocation that fails on request, standing in for an out-of-memory
    /// condition in the object runtime
    pub fn try_allocate(fail: bool) -> anyhow::Result<Claim<Self>> {
        if fail {
            anyhow::bail!("allocation failed");
        }
        Ok(Self::allocate())
    }

    /// Claims currently held on `object`
    pub fn claims(object: TestObject) -> usize {
        LEDGER.with(|ledger| ledger.borrow().claims.get(&object.0).copied().unwrap_or(0))
    }

    pub fn is_freed(object: TestObject) -> bool {
        LEDGER.with(|ledger| ledger.borrow().freed.contains(&object.0))
    }

    /// Claims acquired through the runtime on this thread (allocations excluded)
    pub fn total_acquires() -> usize {
        LEDGER.with(|ledger| ledger.borrow().acquires)
    }

    /// Claims released through the runtime on this thread
    pub fn total_releases() -> usize {
        LEDGER.with(|ledger| ledger.borrow().releases)
    }

    /// Objects allocated on this thread that still have claims
    pub fn live_objects() -> usize {
        LEDGER.with(|ledger| ledger.borrow().claims.len())
    }
}

impl ObjectRuntime for CountingRuntime {
    type Object = TestObject;

    fn acquire_claim(object: TestObject) -> TestObject {
        LEDGER.with(|ledger| {
            let mut ledger = ledger.borrow_mut();
            assert!(
                !ledger.freed.contains(&object.0),
                "acquire on freed object {object:?}"
            );
            let Some(count) = ledger.claims.get_mut(&object.0) else {
                panic!("acquire on unknown object {object:?}");
            };
            *count += 1;
            ledger.acquires += 1;
        });
        object
    }

    fn release_claim(object: TestObject) {
        LEDGER.with(|ledger| {
            let mut ledger = ledger.borrow_mut();
            assert!(
                !ledger.freed.contains(&object.0),
                "double release of {object:?}"
            );
            let Some(count) = ledger.claims.get_mut(&object.0) else {
                panic!("release of unknown object {object:?}");
            };
            *count -= 1;
            let now_free = *count == 0;
            ledger.releases += 1;
            if now_free {
                ledger.claims.remove(&object.0);
                ledger.freed.insert(object.0);
            }
        });
    }
}
