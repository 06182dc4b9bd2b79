//! Proptest strategies for shardkeeper domain types.
//!
//! Reusable generators for property-based testing across crates.
//!
//! # Usage
//!
//! ```no_run
//! use shardkeeper_test_utils::strategies;
//! use proptest::prelude::*;
//!
//! proptest! {
//!     #[test]
//!     fn my_property(slice in strategies::arb_slice()) {
//!         // test invariant with a randomly generated slice
//!     }
//! }
//! ```

use proptest::prelude::*;
use shardkeeper_types::{HashRange, Replica, Slice, SliceState};

/// Generates any [`SliceState`].
pub fn arb_slice_state() -> impl Strategy<Value = SliceState> {
    prop::sample::select(SliceState::ALL.to_vec())
}

/// Generates a hash range, or `None` (custom routing) about a third of the
/// time.
pub fn arb_range() -> impl Strategy<Value = Option<HashRange>> {
    prop_oneof![
        1 => Just(None),
        2 => (any::<i32>(), any::<i32>())
            .prop_map(|(a, b)| Some(HashRange::new(a.min(b), a.max(b)))),
    ]
}

/// Generates a node name from a small pool, so replicas share nodes.
pub fn arb_node_name() -> impl Strategy<Value = String> {
    (1u8..=4).prop_map(|n| format!("n{n}"))
}

/// Generates a slice named `s1` with 0-5 replicas named `r0..`.
pub fn arb_slice() -> impl Strategy<Value = Slice> {
    (arb_slice_state(), arb_range(), prop::collection::vec(arb_node_name(), 0..6)).prop_map(
        |(state, range, nodes)| {
            let replicas = nodes
                .into_iter()
                .enumerate()
                .map(|(idx, node)| {
                    Replica::builder()
                        .name(format!("r{idx}"))
                        .core_name(format!("c1_s1_r{idx}"))
                        .node_name(node)
                        .build()
                })
                .collect();
            Slice::builder().name("s1").state(state).maybe_range(range).replicas(replicas).build()
        },
    )
}
