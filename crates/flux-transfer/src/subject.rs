//! NATS subject 匹配
//!
//! 通配符规则：
//! - `*` 匹配单个层级
//! - `>` 匹配一个或多个剩余层级（只能在末尾）
//!
//! 示例：
//! - `flux.logs.*` 匹配 `flux.logs.cpu`
//! - `flux.>` 匹配 `flux.logs.cpu` 和 `flux.logs`，但不匹配 `flux`

/// subject 是否被 filter 捕获
pub fn matches(filter: &str, subject: &str) -> bool {
    // 快速路径：无通配符
    if !filter.contains('*') && !filter.contains('>') {
        return filter == subject;
    }

    let filter_parts: Vec<&str> = filter.split('.').collect();
    let subject_parts: Vec<&str> = subject.split('.').collect();

    matches_parts(&filter_parts, &subject_parts)
}

fn matches_parts(filter: &[&str], subject: &[&str]) -> bool {
    match (filter.first(), subject.first()) {
        (None, None) => true,

        // > 至少匹配一个层级
        (Some(&">"), Some(_)) => true,

        (Some(&"*"), Some(_)) => matches_parts(&filter[1..], &subject[1..]),

        (Some(f), Some(s)) if f == s => matches_parts(&filter[1..], &subject[1..]),

        _ => false,
    }
}

/// 两个 filter 是否存在同时被二者捕获的 subject
///
/// JetStream 不允许两个流的 subject 重叠。
pub fn overlaps(a: &str, b: &str) -> bool {
    let a_parts: Vec<&str> = a.split('.').collect();
    let b_parts: Vec<&str> = b.split('.').collect();

    overlaps_parts(&a_parts, &b_parts)
}

fn overlaps_parts(a: &[&str], b: &[&str]) -> bool {
    match (a.first(), b.first()) {
        (None, None) => true,
        (Some(&">"), Some(_)) | (Some(_), Some(&">")) => true,
        (Some(x), Some(y)) if *x == "*" || *y == "*" || x == y => {
            overlaps_parts(&a[1..], &b[1..])
        }
        _ => false,
    }
}
