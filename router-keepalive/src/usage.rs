use router_store::{CoordinationStore, keys};

use crate::error::Result;

/// Records that `model` was just served from `host`, scheduling (or
/// cancelling) its next idle-warmup wakeup.
///
/// `keep_alive_secs == 0` means "don't keep this one warm": any previously
/// scheduled wakeup for the pair is cancelled rather than rescheduled for
/// `now`, matching the provider's own opt-out of the mechanism entirely.
pub async fn record_usage(
    store: &dyn CoordinationStore,
    model: &str,
    host: &str,
    keep_alive_secs: u64,
    now_epoch: u64,
) -> Result<()> {
    let provider_key = keys::keepalive_provider_key(model, host);
    store.hash_set(&provider_key, "model_name", model).await?;
    store.hash_set(&provider_key, "host", host).await?;
    store
        .hash_set(&provider_key, "keep_alive_seconds", &keep_alive_secs.to_string())
        .await?;

    let member = keys::keepalive_member(model, host);
    if keep_alive_secs == 0 {
        store.sorted_set_rem(keys::KEEPALIVE_WAKEUPS_KEY, &member).await?;
    } else {
        let wakeup = (now_epoch + keep_alive_secs) as f64;
        store
            .sorted_set_add(keys::KEEPALIVE_WAKEUPS_KEY, &member, wakeup)
            .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use router_store::InMemoryStore;

    #[tokio::test]
    async fn records_a_future_wakeup() {
        let store = InMemoryStore::new();
        record_usage(&store, "m1", "http://host-a", 120, 1_000).await.unwrap();

        let due = store
            .sorted_set_range_by_score(keys::KEEPALIVE_WAKEUPS_KEY, 1_119.0)
            .await
            .unwrap();
        assert!(due.is_empty());

        let due = store
            .sorted_set_range_by_score(keys::KEEPALIVE_WAKEUPS_KEY, 1_120.0)
            .await
            .unwrap();
        assert_eq!(due, vec![keys::keepalive_member("m1", "http://host-a")]);
    }

    #[tokio::test]
    async fn zero_keep_alive_cancels_any_scheduled_wakeup() {
        let store = InMemoryStore::new();
        record_usage(&store, "m1", "http://host-a", 120, 1_000).await.unwrap();
        record_usage(&store, "m1", "http://host-a", 0, 1_050).await.unwrap();

        let due = store
            .sorted_set_range_by_score(keys::KEEPALIVE_WAKEUPS_KEY, 2_000.0)
            .await
            .unwrap();
        assert!(due.is_empty());
    }
}
