use std::time::Duration;

use anyhow::{Context, Result};
use triage_ai::{AssistantsClient, VectorStore, VectorStoreStatus};

/// Polls a vector store until it leaves `in_progress`, returning the settled record.
pub async fn wait_for_vector_store(
    client: &dyn AssistantsClient,
    vector_store_id: &str,
    poll_interval: Duration,
) -> Result<VectorStore> {
    let mut polls = 0_u64;
    loop {
        let store = client
            .retrieve_vector_store(vector_store_id)
            .await
            .with_context(|| format!("failed to retrieve vector store {vector_store_id}"))?;
        polls = polls.saturating_add(1);
        if store.status != VectorStoreStatus::InProgress {
            tracing::debug!(
                vector_store_id,
                status = store.status.as_str(),
                polls,
                "vector store settled"
            );
            return Ok(store);
        }
        tracing::info!(vector_store_id, "waiting for vector store indexing");
        tokio::time::sleep(poll_interval).await;
    }
}
