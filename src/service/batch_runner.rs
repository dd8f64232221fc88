//! 批量执行
//!
//! 对集合逐项执行单项操作，按 `continue_on_error` 决定遇错继续还是立即中止。
//! 单项的错误和 panic 都在本地转成单项失败，不会传出 `run_all`。

use std::{any::Any, future::Future, panic::AssertUnwindSafe};

use futures::{stream, FutureExt, StreamExt};
use serde::Serialize;

use crate::{
    domain::ResultEnvelope,
    error::{ErrorKind, ProviderError, ProviderResult},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchItemError {
    pub item_id: String,
    pub kind: ErrorKind,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchOutcome<T> {
    /// 成功项，按输入顺序
    pub succeeded: Vec<T>,
    pub failed: Vec<BatchItemError>,
    pub message: String,
}

impl<T> Default for BatchOutcome<T> {
    fn default() -> Self {
        Self {
            succeeded: Vec::new(),
            failed: Vec::new(),
            message: String::new(),
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn flatten<T>(item_id: String, result: std::thread::Result<ProviderResult<T>>) -> Result<T, BatchItemError> {
    match result {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(BatchItemError {
            item_id,
            kind: err.kind,
            error: err.message,
        }),
        Err(payload) => Err(BatchItemError {
            item_id,
            kind: ErrorKind::Internal,
            error: format!("panicked: {}", panic_message(payload)),
        }),
    }
}

fn aborted<T>(failure: BatchItemError) -> ResultEnvelope<BatchOutcome<T>> {
    let message = format!("Batch aborted at item {}: {}", failure.item_id, failure.error);
    tracing::warn!(item_id = %failure.item_id, error = %failure.error, "Batch aborted");
    let err = ProviderError::new(failure.kind, message.clone());
    ResultEnvelope::failure_with(
        BatchOutcome {
            succeeded: Vec::new(),
            failed: vec![failure],
            message,
        },
        err,
    )
}

fn summarize<T>(succeeded: Vec<T>, failed: Vec<BatchItemError>) -> ResultEnvelope<BatchOutcome<T>> {
    if failed.is_empty() {
        let message = format!("Processed {} items", succeeded.len());
        tracing::debug!(count = succeeded.len(), "Batch completed");
        return ResultEnvelope::ok_with_message(
            BatchOutcome {
                succeeded,
                failed,
                message: message.clone(),
            },
            message,
        );
    }

    let details: Vec<String> = failed
        .iter()
        .map(|f| format!("item {}: {}", f.item_id, f.error))
        .collect();
    let message = format!(
        "{} of {} items failed: {}",
        failed.len(),
        failed.len() + succeeded.len(),
        details.join("; ")
    );
    tracing::warn!(
        succeeded = succeeded.len(),
        failed = failed.len(),
        "Batch completed with failures"
    );

    let err = ProviderError::new(failed[0].kind, message.clone());
    ResultEnvelope::failure_with(
        BatchOutcome {
            succeeded,
            failed,
            message,
        },
        err,
    )
}

/// 顺序执行，保持输入顺序
pub async fn run_all<I, T, K, F, Fut>(
    items: Vec<I>,
    id_of: K,
    mut op: F,
    continue_on_error: bool,
) -> ResultEnvelope<BatchOutcome<T>>
where
    K: Fn(&I) -> String,
    F: FnMut(I) -> Fut,
    Fut: Future<Output = ProviderResult<T>>,
{
    let mut succeeded = Vec::with_capacity(items.len());
    let mut failed = Vec::new();

    for item in items {
        let item_id = id_of(&item);
        let result = AssertUnwindSafe(async { op(item).await }).catch_unwind().await;

        match flatten(item_id, result) {
            Ok(value) => succeeded.push(value),
            Err(failure) if !continue_on_error => return aborted(failure),
            Err(failure) => failed.push(failure),
        }
    }

    summarize(succeeded, failed)
}

/// 并发执行，最多 `max_in_flight` 项同时进行；结果仍按输入顺序汇总
pub async fn run_all_concurrent<I, T, K, F, Fut>(
    items: Vec<I>,
    id_of: K,
    op: F,
    continue_on_error: bool,
    max_in_flight: usize,
) -> ResultEnvelope<BatchOutcome<T>>
where
    K: Fn(&I) -> String,
    F: Fn(I) -> Fut,
    Fut: Future<Output = ProviderResult<T>>,
{
    let op = &op;
    let mut results = stream::iter(items)
        .map(|item| {
            let item_id = id_of(&item);
            async move {
                let result = AssertUnwindSafe(async move { op(item).await })
                    .catch_unwind()
                    .await;
                flatten(item_id, result)
            }
        })
        .buffered(max_in_flight.max(1));

    let mut succeeded = Vec::new();
    let mut failed = Vec::new();

    while let Some(result) = results.next().await {
        match result {
            Ok(value) => succeeded.push(value),
            Err(failure) if !continue_on_error => return aborted(failure),
            Err(failure) => failed.push(failure),
        }
    }

    summarize(succeeded, failed)
}
