//! 统一结果信封
//!
//! 每个对外操作都返回 `ResultEnvelope<T>`，不向调用方抛出错误。
//! - `is_error == true` 时 `value` 为 `T::default()` 或调用方提供的占位值
//! - `is_error == false` 时 `value` 有意义

use serde::Serialize;

use crate::error::{ErrorKind, ProviderError};

#[derive(Debug, Clone, Serialize)]
pub struct ResultEnvelope<T> {
    pub value: T,
    pub is_error: bool,
    /// 信息性提示（例如重复激活），不影响 `is_error`
    pub is_warning: bool,
    pub message: String,
    #[serde(skip)]
    pub cause: Option<ProviderError>,
}

impl<T> ResultEnvelope<T> {
    pub fn ok(value: T) -> Self {
        Self {
            value,
            is_error: false,
            is_warning: false,
            message: String::new(),
            cause: None,
        }
    }

    pub fn ok_with_message(value: T, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::ok(value)
        }
    }

    pub fn warning(value: T, message: impl Into<String>) -> Self {
        Self {
            is_warning: true,
            ..Self::ok_with_message(value, message)
        }
    }

    /// 带占位值的失败结果
    pub fn failure_with(value: T, err: ProviderError) -> Self {
        Self {
            value,
            is_error: true,
            is_warning: false,
            message: err.message.clone(),
            cause: Some(err),
        }
    }

    pub fn kind(&self) -> Option<ErrorKind> {
        self.cause.as_ref().map(|e| e.kind)
    }

    /// 拆回 `Result`，供组合操作向上传递子操作的错误
    pub fn into_result(self) -> Result<T, ProviderError> {
        match self.cause {
            Some(err) if self.is_error => Err(err),
            _ if self.is_error => Err(ProviderError::new(
                ErrorKind::InvalidRequest,
                self.message,
            )),
            _ => Ok(self.value),
        }
    }
}

impl<T: Default> ResultEnvelope<T> {
    pub fn failure(err: ProviderError) -> Self {
        Self::failure_with(T::default(), err)
    }

    pub fn from_result(result: Result<T, ProviderError>) -> Self {
        match result {
            Ok(value) => Self::ok(value),
            Err(err) => Self::failure(err),
        }
    }
}
