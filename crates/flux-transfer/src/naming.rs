//! 命名规则
//!
//! - 对象桶：`<namespace>_logs`
//! - 流：`<namespace>:logs:<key>`
//! - 发布 subject：`<namespace>.logs.<measurement>`

use crate::error::{Result, TransferError};

/// 名称中禁止出现的字符（subject 分隔符、通配符、路径分隔符）
const FORBIDDEN: [char; 5] = ['.', '*', '>', '/', '\\'];

/// 对象桶名
pub fn bucket_name(namespace: &str) -> String {
    format!("{}_logs", namespace)
}

/// 流名
pub fn stream_name(namespace: &str, key: &str) -> String {
    format!("{}:logs:{}", namespace, key)
}

/// 发布 subject
pub fn subject(namespace: &str, measurement: &str) -> String {
    format!("{}.logs.{}", namespace, measurement)
}

/// 校验命名空间或测量键能否作为单个名称片段使用
pub fn validate_token(kind: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(TransferError::InvalidInput(format!("{} must not be empty", kind)));
    }

    if let Some(c) = value
        .chars()
        .find(|c| c.is_whitespace() || FORBIDDEN.contains(c))
    {
        return Err(TransferError::InvalidInput(format!(
            "{} '{}' contains forbidden character {:?}",
            kind, value, c
        )));
    }

    Ok(())
}

/// 校验命名空间
///
/// 命名空间还不能包含 `:`，否则 `<namespace>:logs:<key>` 无法唯一拆分。
pub fn validate_namespace(namespace: &str) -> Result<()> {
    validate_token("namespace", namespace)?;

    if namespace.contains(':') {
        return Err(TransferError::InvalidInput(format!(
            "namespace '{}' contains forbidden character ':'",
            namespace
        )));
    }

    Ok(())
}
