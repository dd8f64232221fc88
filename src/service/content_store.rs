//! 键值内容存储接口（Gaia Hub 等）

use async_trait::async_trait;

use crate::error::ProviderResult;

#[async_trait]
pub trait ContentStore: Send + Sync {
    /// 读取；不存在返回 None
    async fn get(&self, path: &str) -> ProviderResult<Option<Vec<u8>>>;

    async fn put(&self, path: &str, content: Vec<u8>) -> ProviderResult<()>;

    /// 删除；不存在返回 false
    async fn delete(&self, path: &str) -> ProviderResult<bool>;

    /// 列出以 `prefix` 开头的路径
    async fn list(&self, prefix: &str) -> ProviderResult<Vec<String>>;
}
