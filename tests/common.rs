//! Common test utilities and helpers

#![allow(dead_code)]

use pfind_access::{Authorizer, StaticAllowlist};
use pfind_core::{ContainerId, RetryPolicy};
use pfind_finder::ParticipantFinder;
use pfind_store::InMemoryObjectStore;
use std::sync::Arc;

pub const USER: &str = "researcher@stonybrook.edu";
pub const EDITABLE: &str = "part4_nightsummary_sleep_cleaned.csv";
pub const ORIGINAL_CSV: &[u8] = b"ID,night,sleeponset,wakeup\nPID123,1,22.5,7.25\n";

pub struct Seeded {
    pub store: InMemoryObjectStore,
    pub root: ContainerId,
    pub results: ContainerId,
}

/// An in-memory tree with one ActiGraph participant and all three result files.
pub fn seeded_store() -> Seeded {
    let store = InMemoryObjectStore::new();
    let root = store.root();
    let results = store
        .add_path(&root, &["ActiGraph", "PID123", "output_PID123", "results"])
        .expect("seed path");
    store
        .add_artifact(&results, EDITABLE, ORIGINAL_CSV)
        .expect("seed csv");
    store
        .add_artifact(&results, "visualisation_sleep.pdf", "%PDF-1.4 sleep")
        .expect("seed pdf");
    store
        .add_artifact(&results, "visualisation_data.pdf", "%PDF-1.4 data")
        .expect("seed pdf");

    Seeded {
        store,
        root,
        results,
    }
}

pub fn finder_over(store: InMemoryObjectStore, anchor: ContainerId) -> ParticipantFinder {
    ParticipantFinder::builder()
        .store(Arc::new(store))
        .authorizer(Arc::new(Authorizer::new(Arc::new(StaticAllowlist::new([
            USER,
        ])))))
        .anchor(anchor)
        .retry(RetryPolicy::none())
        .build()
        .expect("finder")
}
