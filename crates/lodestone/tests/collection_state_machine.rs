//! Stateful property testing for bounded collections.
//!
//! Uses proptest-state-machine to drive a `Collection` through random
//! upserts, removals and clears, comparing it against a plain ordered model:
//!
//! - Retained keys are the most recently inserted ones, oldest first
//! - Merging an existing key never moves it in eviction order
//! - A zero capacity never retains anything
//! - Live handles keep their identity across merges

use std::collections::HashMap;
use std::sync::Arc;

use proptest::prelude::*;
use proptest_state_machine::{ReferenceStateMachine, StateMachineTest, prop_state_machine};
use serde_json::json;

use lodestone::{
    CalendarComment, Cached, Capacities, Capacity, Collection, RawCalendarComment, Scope,
};

/// Operations that can be performed on a collection.
#[derive(Debug, Clone)]
pub enum CollectionOperation {
    /// Add or merge a comment.
    Upsert { id: u64, content: String },
    /// Remove a comment by key.
    Remove { id: u64 },
    /// Drop everything.
    Clear,
}

/// Reference model: keys and contents in insertion order.
#[derive(Clone, Debug)]
pub struct CollectionModel {
    pub capacity: Capacity,
    pub entries: Vec<(u64, String)>,
}

impl CollectionModel {
    fn upsert(&mut self, id: u64, content: &str) {
        if let Some(entry) = self.entries.iter_mut().find(|(key, _)| *key == id) {
            entry.1 = content.to_string();
            return;
        }
        match self.capacity {
            Capacity::Limit(0) => {}
            Capacity::Limit(limit) => {
                while self.entries.len() >= limit {
                    self.entries.remove(0);
                }
                self.entries.push((id, content.to_string()));
            }
            Capacity::Unbounded => self.entries.push((id, content.to_string())),
        }
    }
}

fn capacity_strategy() -> impl Strategy<Value = Capacity> {
    prop_oneof![
        1 => Just(Capacity::Unbounded),
        4 => (0usize..5).prop_map(Capacity::Limit),
    ]
}

impl ReferenceStateMachine for CollectionModel {
    type State = Self;
    type Transition = CollectionOperation;

    fn init_state() -> BoxedStrategy<Self::State> {
        capacity_strategy()
            .prop_map(|capacity| CollectionModel {
                capacity,
                entries: Vec::new(),
            })
            .boxed()
    }

    fn transitions(_state: &Self::State) -> BoxedStrategy<Self::Transition> {
        prop_oneof![
            6 => (0u64..8, "[a-z]{1,6}")
                .prop_map(|(id, content)| CollectionOperation::Upsert { id, content }),
            2 => (0u64..8).prop_map(|id| CollectionOperation::Remove { id }),
            1 => Just(CollectionOperation::Clear),
        ]
        .boxed()
    }

    fn apply(mut state: Self::State, transition: &Self::Transition) -> Self::State {
        match transition {
            CollectionOperation::Upsert { id, content } => state.upsert(*id, content),
            CollectionOperation::Remove { id } => state.entries.retain(|(key, _)| key != id),
            CollectionOperation::Clear => state.entries.clear(),
        }
        state
    }
}

fn raw_comment(id: u64, content: &str) -> RawCalendarComment {
    serde_json::from_value(json!({
        "id": id,
        "content": content,
        "createdAt": "2024-01-01T00:00:00Z",
        "calendarEventId": 42,
        "channelId": "c1",
        "createdBy": "u1"
    }))
    .expect("valid comment payload")
}

/// Test harness wrapping a real collection plus the handles it has given out.
pub struct CollectionHarness {
    comments: Collection<CalendarComment>,
    handles: HashMap<u64, Cached<CalendarComment>>,
}

impl CollectionHarness {
    fn new(capacity: Capacity) -> Self {
        Self {
            comments: Collection::with_capacity(capacity, &Arc::new(Capacities::default())),
            handles: HashMap::new(),
        }
    }

    fn apply_operation(&mut self, op: &CollectionOperation) {
        match op {
            CollectionOperation::Upsert { id, content } => {
                let scope = Scope::guild("g1").with_channel("c1");
                let upserted = self
                    .comments
                    .upsert(raw_comment(*id, content), &scope)
                    .expect("upsert succeeds");

                // A retained record must keep the handle given out earlier
                if let Some(previous) = self.handles.get(id) {
                    if upserted.previous.is_some() {
                        assert!(
                            previous.ptr_eq(&upserted.entity),
                            "merge replaced live record {id}"
                        );
                    }
                }
                assert_eq!(upserted.entity.read().content, *content);

                if upserted.retained {
                    self.handles.insert(*id, upserted.entity);
                } else {
                    self.handles.remove(id);
                }
            }
            CollectionOperation::Remove { id } => {
                let removed = self.comments.remove(id);
                if let Some(removed) = removed {
                    assert_eq!(removed.read().id, *id);
                }
                self.handles.remove(id);
            }
            CollectionOperation::Clear => {
                self.comments.clear();
                self.handles.clear();
            }
        }
    }

    fn verify_invariants(&self, model: &CollectionModel) {
        // Invariant 1: same keys and contents, same order
        let actual: Vec<(u64, String)> = self
            .comments
            .snapshots()
            .into_iter()
            .map(|comment| (comment.id, comment.content))
            .collect();
        assert_eq!(actual, model.entries, "collection diverged from model");

        // Invariant 2: size bounded by capacity
        if let Some(limit) = model.capacity.limit() {
            assert!(
                self.comments.len() <= limit,
                "collection holds {} records, limit {}",
                self.comments.len(),
                limit
            );
        }

        // Invariant 3: evicted keys are really gone
        for (id, _) in &model.entries {
            assert!(self.comments.contains(id));
        }
    }
}

impl StateMachineTest for CollectionHarness {
    type SystemUnderTest = Self;
    type Reference = CollectionModel;

    fn init_test(
        ref_state: &<Self::Reference as ReferenceStateMachine>::State,
    ) -> Self::SystemUnderTest {
        Self::new(ref_state.capacity)
    }

    fn apply(
        mut state: Self::SystemUnderTest,
        ref_state: &<Self::Reference as ReferenceStateMachine>::State,
        transition: <Self::Reference as ReferenceStateMachine>::Transition,
    ) -> Self::SystemUnderTest {
        state.apply_operation(&transition);
        state.verify_invariants(ref_state);
        state
    }

    fn check_invariants(
        state: &Self::SystemUnderTest,
        ref_state: &<Self::Reference as ReferenceStateMachine>::State,
    ) {
        state.verify_invariants(ref_state);
    }
}

prop_state_machine! {
    #![proptest_config(ProptestConfig {
        cases: 100,
        max_shrink_iters: 10000,
        ..ProptestConfig::default()
    })]

    #[test]
    fn collection_state_machine_test(sequential 1..60 => CollectionHarness);
}

// Additional targeted tests

#[test]
fn test_capacity_two_keeps_last_two() {
    let comments: Collection<CalendarComment> =
        Collection::with_capacity(Capacity::Limit(2), &Arc::new(Capacities::default()));
    let scope = Scope::guild("g1").with_channel("c1");
    for id in 1..=3 {
        comments.upsert(raw_comment(id, "hi"), &scope).unwrap();
    }
    assert_eq!(comments.keys(), vec![2, 3]);
}

proptest! {
    #[test]
    fn test_bounded_never_exceeds_limit(
        limit in 1usize..6,
        ids in proptest::collection::vec(0u64..20, 0..80),
    ) {
        let comments: Collection<CalendarComment> =
            Collection::with_capacity(Capacity::Limit(limit), &Arc::new(Capacities::default()));
        let scope = Scope::guild("g1").with_channel("c1");
        for id in &ids {
            comments.upsert(raw_comment(*id, "x"), &scope).unwrap();
            prop_assert!(comments.len() <= limit);
        }
        if let Some(last) = ids.last() {
            prop_assert!(comments.contains(last));
        }
    }
}
