use anyhow::{Context, Result};
use triage_ai::{AssistantsClient, AssistantsError, VectorStore, VectorStoreStatus};

pub const THREAD_ID_METADATA_KEY: &str = "thread_id";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub vector_stores_deleted: usize,
    pub files_deleted: usize,
    pub threads_deleted: usize,
    pub vector_stores_kept: usize,
}

fn bot_thread_id(store: &VectorStore) -> Option<&str> {
    store
        .metadata
        .get(THREAD_ID_METADATA_KEY)
        .map(String::as_str)
        .filter(|id| !id.trim().is_empty())
}

fn ignore_not_found(result: Result<(), AssistantsError>) -> Result<bool, AssistantsError> {
    match result {
        Ok(()) => Ok(true),
        Err(error) if error.is_not_found() => Ok(false),
        Err(error) => Err(error),
    }
}

async fn list_all_vector_stores(client: &dyn AssistantsClient) -> Result<Vec<VectorStore>> {
    let mut stores = Vec::new();
    let mut after: Option<String> = None;
    loop {
        let page = client
            .list_vector_stores(after.as_deref())
            .await
            .context("failed to list vector stores")?;
        let next = page.last_id.clone().or_else(|| page.data.last().map(|store| store.id.clone()));
        stores.extend(page.data);
        match next {
            Some(next) if page.has_more => after = Some(next),
            _ => break,
        }
    }
    Ok(stores)
}

async fn list_all_store_files(
    client: &dyn AssistantsClient,
    vector_store_id: &str,
) -> Result<Vec<String>> {
    let mut files = Vec::new();
    let mut after: Option<String> = None;
    loop {
        let page = client
            .list_vector_store_files(vector_store_id, after.as_deref())
            .await
            .with_context(|| format!("failed to list files of vector store {vector_store_id}"))?;
        let next = page.last_id.clone().or_else(|| page.data.last().map(|file| file.id.clone()));
        files.extend(page.data.into_iter().map(|file| file.id));
        match next {
            Some(next) if page.has_more => after = Some(next),
            _ => break,
        }
    }
    Ok(files)
}

/// Deletes bot-created vector stores with their files and threads.
///
/// Only stores tagged with a `thread_id` are considered; without `all` only expired ones.
pub async fn cleanup_vector_stores(
    client: &dyn AssistantsClient,
    all: bool,
) -> Result<CleanupReport> {
    let mut report = CleanupReport::default();
    for store in list_all_vector_stores(client).await? {
        let Some(thread_id) = bot_thread_id(&store) else {
            continue;
        };
        if !all && store.status != VectorStoreStatus::Expired {
            report.vector_stores_kept += 1;
            continue;
        }

        tracing::info!(vector_store_id = %store.id, status = store.status.as_str(), "deleting vector store");
        for file_id in list_all_store_files(client, &store.id).await? {
            let deleted = ignore_not_found(client.delete_file(&file_id).await)
                .with_context(|| format!("failed to delete file {file_id}"))?;
            if deleted {
                report.files_deleted += 1;
            }
            tracing::debug!(file_id = %file_id, deleted, "deleted file");
        }
        client
            .delete_vector_store(&store.id)
            .await
            .with_context(|| format!("failed to delete vector store {}", store.id))?;
        report.vector_stores_deleted += 1;

        tracing::info!(thread_id, "deleting thread");
        if ignore_not_found(client.delete_thread(thread_id).await)
            .with_context(|| format!("failed to delete thread {thread_id}"))?
        {
            report.threads_deleted += 1;
        }
    }

    tracing::info!(
        vector_stores_deleted = report.vector_stores_deleted,
        files_deleted = report.files_deleted,
        threads_deleted = report.threads_deleted,
        vector_stores_kept = report.vector_stores_kept,
        "cleanup finished"
    );
    Ok(report)
}
