//! Request validation for shard deletion.

use shardkeeper_state::{ClusterStateReader, ReaderError};
use shardkeeper_types::{ClusterState, CommandError, Result, Slice, SliceState};

/// Resolves the external collection name. Aliases are only followed when
/// `follow_aliases` is set; an unknown alias resolves to itself.
///
/// # Errors
///
/// Returns a bad request if the alias names several collections, or a server
/// error if the alias document cannot be read.
pub async fn resolve_collection_name(
    reader: &ClusterStateReader,
    name: &str,
    follow_aliases: bool,
) -> Result<String> {
    if !follow_aliases {
        return Ok(name.to_string());
    }
    reader.resolve_simple_alias(name).await.map_err(|e| match e {
        ReaderError::NotSimpleAlias { .. } => CommandError::bad_request(e.to_string()),
        e => CommandError::server_error(format!("Failed to resolve alias {name}"), e),
    })
}

/// Returns true if a slice in this state may be deleted.
///
/// Custom-routed slices may be deleted in any state except
/// `recovery_failed`; hash-routed slices only when inactive, recovering or
/// under construction.
#[must_use]
pub fn is_deletable(slice: &Slice) -> bool {
    if slice.state == SliceState::RecoveryFailed {
        return false;
    }
    slice.is_custom_routed()
        || matches!(
            slice.state,
            SliceState::Inactive | SliceState::Recovery | SliceState::Construction
        )
}

/// Looks up the slice and checks that it may be deleted.
///
/// # Errors
///
/// Returns a bad request if the collection or slice does not exist, or the
/// slice is not deletable in its current state.
pub fn validate_slice<'a>(
    cluster_state: &'a ClusterState,
    collection: &str,
    slice_id: &str,
) -> Result<&'a Slice> {
    let doc = cluster_state.collection(collection).ok_or_else(|| {
        CommandError::bad_request(format!("Could not find collection : {collection}"))
    })?;
    let slice = doc.slice(slice_id).ok_or_else(|| {
        CommandError::bad_request(format!(
            "No shard with name {slice_id} exists for collection {collection}"
        ))
    })?;
    if !is_deletable(slice) {
        return Err(CommandError::bad_request(format!(
            "The slice: {} is currently {}. Only non-active (or custom-hashed) slices can be \
             deleted.",
            slice.name, slice.state
        )));
    }
    Ok(slice)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::sync::Arc;

    use proptest::prelude::*;
    use shardkeeper_state::{CoordinationStore, CreateMode, MemoryCoordinationStore};
    use shardkeeper_test_utils::strategies::{arb_range, arb_slice_state};
    use shardkeeper_types::{DocCollection, ErrorCode, HashRange, paths};

    use super::*;

    fn state_with(slice: Slice) -> ClusterState {
        ClusterState::new([DocCollection::new("c1", [slice])], Vec::<String>::new())
    }

    #[test]
    fn test_missing_collection() {
        let err = validate_slice(&ClusterState::default(), "c1", "s1").unwrap_err();
        assert_eq!(err.code(), ErrorCode::BadRequest);
        assert_eq!(err.message(), "Could not find collection : c1");
    }

    #[test]
    fn test_missing_slice() {
        let state = state_with(Slice::builder().name("s1").build());
        let err = validate_slice(&state, "c1", "s9").unwrap_err();
        assert_eq!(err.message(), "No shard with name s9 exists for collection c1");
    }

    #[test]
    fn test_active_hashed_slice_rejected() {
        let slice = Slice::builder().name("s1").range(HashRange::new(0, 100)).build();
        let err = validate_slice(&state_with(slice), "c1", "s1").unwrap_err();
        assert_eq!(err.code(), ErrorCode::BadRequest);
        assert_eq!(
            err.message(),
            "The slice: s1 is currently active. Only non-active (or custom-hashed) slices can be \
             deleted."
        );
    }

    #[test]
    fn test_custom_routed_active_slice_allowed() {
        let state = state_with(Slice::builder().name("s1").build());
        assert_eq!(validate_slice(&state, "c1", "s1").unwrap().name, "s1");
    }

    #[test]
    fn test_recovery_failed_rejected_even_when_custom_routed() {
        let slice = Slice::builder().name("s1").state(SliceState::RecoveryFailed).build();
        let err = validate_slice(&state_with(slice), "c1", "s1").unwrap_err();
        assert!(err.message().contains("currently recovery_failed"));
    }

    proptest! {
        #[test]
        fn prop_admission_rule(state in arb_slice_state(), range in arb_range()) {
            let slice = Slice::builder().name("s1").state(state).maybe_range(range).build();
            let expected = state != SliceState::RecoveryFailed
                && (range.is_none()
                    || matches!(
                        state,
                        SliceState::Inactive | SliceState::Recovery | SliceState::Construction
                    ));
            prop_assert_eq!(is_deletable(&slice), expected);
            prop_assert_eq!(validate_slice(&state_with(slice), "c1", "s1").is_ok(), expected);
        }
    }

    #[tokio::test]
    async fn test_alias_only_followed_when_requested() {
        let store = Arc::new(MemoryCoordinationStore::new());
        let aliases = serde_json::json!({ "collection": { "books": "books_v2" } });
        store
            .create(paths::ALIASES, serde_json::to_vec(&aliases).unwrap(), CreateMode::Persistent)
            .await
            .unwrap();
        let reader = ClusterStateReader::new(store);

        assert_eq!(resolve_collection_name(&reader, "books", false).await.unwrap(), "books");
        assert_eq!(resolve_collection_name(&reader, "books", true).await.unwrap(), "books_v2");
        assert_eq!(resolve_collection_name(&reader, "films", true).await.unwrap(), "films");
    }

    #[tokio::test]
    async fn test_multi_collection_alias_is_bad_request() {
        let store = Arc::new(MemoryCoordinationStore::new());
        let aliases = serde_json::json!({ "collection": { "everything": "books,films" } });
        store
            .create(paths::ALIASES, serde_json::to_vec(&aliases).unwrap(), CreateMode::Persistent)
            .await
            .unwrap();
        let reader = ClusterStateReader::new(store);

        let err = resolve_collection_name(&reader, "everything", true).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::BadRequest);
        assert_eq!(
            err.message(),
            "Alias everything refers to more than one collection: books,films"
        );

        assert_eq!(
            resolve_collection_name(&reader, "everything", false).await.unwrap(),
            "everything"
        );
    }
}
