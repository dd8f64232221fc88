//! Provider 激活门
//!
//! 激活状态即会话句柄是否存在：`Some(session)` 表示已激活。
//! 激活/停用由异步互斥锁串行化，读取方只拿到 `Arc` 快照，
//! 因此并发操作在停用后仍可安全完成手头的调用。

use std::{
    future::Future,
    sync::{Arc, RwLock},
};

use tokio::sync::Mutex;

use crate::{
    domain::ResultEnvelope,
    error::{ProviderError, ProviderResult},
};

/// 未激活时的处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationPolicy {
    /// 直接返回 NotActivated
    FailFast,
    /// 透明地尝试激活一次
    AutoActivate,
}

pub struct ActivationGate<S> {
    provider: String,
    policy: ActivationPolicy,
    session: RwLock<Option<Arc<S>>>,
    transition: Mutex<()>,
}

impl<S> ActivationGate<S> {
    pub fn new(provider: impl Into<String>, policy: ActivationPolicy) -> Self {
        Self {
            provider: provider.into(),
            policy,
            session: RwLock::new(None),
            transition: Mutex::new(()),
        }
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn policy(&self) -> ActivationPolicy {
        self.policy
    }

    fn snapshot(&self) -> Option<Arc<S>> {
        match self.session.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn store(&self, value: Option<Arc<S>>) {
        match self.session.write() {
            Ok(mut guard) => *guard = value,
            Err(poisoned) => *poisoned.into_inner() = value,
        }
    }

    pub fn is_activated(&self) -> bool {
        self.snapshot().is_some()
    }

    /// 当前会话；未激活返回 NotActivated
    pub fn session(&self) -> ProviderResult<Arc<S>> {
        self.snapshot()
            .ok_or_else(|| ProviderError::not_activated(&self.provider))
    }

    /// 激活。`connect` 负责建立客户端并完成可达性检查，失败时保持未激活。
    pub async fn activate<F, Fut>(&self, connect: F) -> ResultEnvelope<bool>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ProviderResult<S>>,
    {
        let _transition = self.transition.lock().await;

        if self.is_activated() {
            tracing::debug!(provider = %self.provider, "Provider already activated");
            return ResultEnvelope::warning(
                true,
                format!("{} provider is already activated", self.provider),
            );
        }

        match connect().await {
            Ok(session) => {
                self.store(Some(Arc::new(session)));
                tracing::info!(provider = %self.provider, "Provider activated");
                ResultEnvelope::ok_with_message(
                    true,
                    format!("{} provider activated", self.provider),
                )
            }
            Err(err) => {
                tracing::warn!(
                    provider = %self.provider,
                    error = %err,
                    "Provider activation failed"
                );
                ResultEnvelope::failure_with(
                    false,
                    err.context(format!("Failed to activate {} provider", self.provider)),
                )
            }
        }
    }

    /// 停用：释放会话并无条件置为未激活，从不失败
    pub async fn deactivate(&self) -> ResultEnvelope<bool> {
        let _transition = self.transition.lock().await;
        let was_active = self.is_activated();
        self.store(None);
        tracing::info!(provider = %self.provider, was_active, "Provider deactivated");
        ResultEnvelope::ok_with_message(true, format!("{} provider deactivated", self.provider))
    }

    /// 按策略取得会话：FailFast 直接报错，AutoActivate 尝试激活一次
    pub async fn ensure<F, Fut>(&self, connect: F) -> ProviderResult<Arc<S>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ProviderResult<S>>,
    {
        if let Some(session) = self.snapshot() {
            return Ok(session);
        }

        match self.policy {
            ActivationPolicy::FailFast => Err(ProviderError::not_activated(&self.provider)),
            ActivationPolicy::AutoActivate => {
                tracing::debug!(provider = %self.provider, "Auto-activating provider");
                let result = self.activate(connect).await;
                if result.is_error {
                    return Err(result
                        .cause
                        .unwrap_or_else(|| ProviderError::not_activated(&self.provider)));
                }
                self.session()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::error::ErrorKind;

    #[tokio::test]
    async fn test_activate_is_idempotent() {
        let gate: ActivationGate<u32> = ActivationGate::new("test", ActivationPolicy::FailFast);
        let connects = AtomicUsize::new(0);

        let first = gate
            .activate(|| async {
                connects.fetch_add(1, Ordering::SeqCst);
                Ok(7)
            })
            .await;
        let second = gate
            .activate(|| async {
                connects.fetch_add(1, Ordering::SeqCst);
                Ok(8)
            })
            .await;

        assert!(!first.is_error);
        assert!(!second.is_error);
        assert!(second.is_warning);
        assert_eq!(connects.load(Ordering::SeqCst), 1);
        assert_eq!(*gate.session().unwrap(), 7);
    }

    #[tokio::test]
    async fn test_failed_activation_stays_inactive() {
        let gate: ActivationGate<u32> = ActivationGate::new("test", ActivationPolicy::FailFast);
        let result = gate
            .activate(|| async { Err(ProviderError::network("connection refused")) })
            .await;

        assert!(result.is_error);
        assert!(!result.value);
        assert_eq!(result.kind(), Some(ErrorKind::NetworkError));
        assert!(!gate.is_activated());
    }

    #[tokio::test]
    async fn test_deactivate_never_fails() {
        let gate: ActivationGate<u32> = ActivationGate::new("test", ActivationPolicy::FailFast);
        assert!(!gate.deactivate().await.is_error);

        gate.activate(|| async { Ok(1) }).await;
        assert!(gate.is_activated());
        assert!(!gate.deactivate().await.is_error);
        assert!(!gate.is_activated());
        assert_eq!(gate.session().unwrap_err().kind, ErrorKind::NotActivated);
    }

    #[tokio::test]
    async fn test_fail_fast_policy() {
        let gate: ActivationGate<u32> = ActivationGate::new("evm", ActivationPolicy::FailFast);
        let err = gate.ensure(|| async { Ok(1) }).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotActivated);
        assert!(!gate.is_activated());
    }

    #[tokio::test]
    async fn test_auto_activate_policy() {
        let gate: ActivationGate<u32> =
            ActivationGate::new("stacks", ActivationPolicy::AutoActivate);
        let session = gate.ensure(|| async { Ok(3) }).await.unwrap();
        assert_eq!(*session, 3);
        assert!(gate.is_activated());
    }
}
