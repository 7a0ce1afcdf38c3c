//! Property tests for outbox collapsing.

use ebbtide_core::{Fields, LocalStore, MutationType, Row, StoreConfig, Timestamp};
use ebbtide_storage::InMemoryBlobStore;
use proptest::prelude::*;
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Clone)]
enum Op {
    Insert(i64),
    Update(i64),
    Delete,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0i64..100).prop_map(Op::Insert),
        (0i64..100).prop_map(Op::Update),
        Just(Op::Delete),
    ]
}

fn apply(store: &LocalStore, op: &Op) {
    match op {
        Op::Insert(qty) => {
            store
                .insert("items", Row::new("a").with("qty", *qty))
                .unwrap();
        }
        Op::Update(qty) => {
            let mut partial = Fields::new();
            partial.insert("qty".into(), json!(qty));
            store.update("items", "a", &partial).unwrap();
        }
        Op::Delete => {
            store.delete("items", "a").unwrap();
        }
    }
}

fn store() -> LocalStore {
    LocalStore::open(
        Arc::new(InMemoryBlobStore::new()),
        StoreConfig::new().with_tables(["items"]),
    )
    .unwrap()
}

proptest! {
    #[test]
    fn unsynced_record_nets_to_single_insert_or_nothing(ops in prop::collection::vec(op_strategy(), 0..12)) {
        let store = store();
        for op in &ops {
            apply(&store, op);
        }

        let entries = store.queue().all().unwrap();
        match store.get_by_id("items", "a").unwrap() {
            Some(row) => {
                prop_assert_eq!(entries.len(), 1);
                prop_assert_eq!(entries[0].mutation_type, MutationType::Insert);
                prop_assert_eq!(&entries[0].payload, &row.to_value());
            }
            None => prop_assert!(entries.is_empty()),
        }
    }

    #[test]
    fn synced_record_nets_to_at_most_one_entry(ops in prop::collection::vec(op_strategy(), 0..12)) {
        let store = store();
        store
            .bulk_upsert("items", vec![Row::new("a").with("qty", 0).updated_at(Timestamp::from_millis(1))])
            .unwrap();
        for op in &ops {
            apply(&store, op);
        }

        let entries = store.queue().pending().unwrap();
        prop_assert!(entries.len() <= 1);
        if let Some(entry) = entries.first() {
            match store.get_by_id("items", "a").unwrap() {
                Some(row) => {
                    prop_assert_ne!(entry.mutation_type, MutationType::Delete);
                    prop_assert_eq!(&entry.payload, &row.to_value());
                }
                None => prop_assert_eq!(entry.mutation_type, MutationType::Delete),
            }
        }
        if store.get_by_id("items", "a").unwrap().is_none() {
            prop_assert_eq!(entries.len(), 1);
        }
    }
}
