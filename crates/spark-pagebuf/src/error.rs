use alloc::string::String;

use thiserror::Error;

/// 稳定错误码，命名遵循 `<域>.<语义>` 约定，供日志与指标按码聚合。
pub mod codes {
    /// 页池在用页数已达上限，无法再租借新页。
    pub const POOL_EXHAUSTED: &str = "buffer.pool_exhausted";
    /// 单次读取跨越了当前片段（页）边界。
    pub const READ_OUT_OF_BOUNDS: &str = "buffer.read_out_of_bounds";
    /// 追加后总长度超出 `usize` 表示范围。
    pub const SIZE_OVERFLOW: &str = "buffer.size_overflow";
    /// 页池配置未通过校验或解析失败。
    pub const INVALID_CONFIG: &str = "buffer.invalid_config";
}

/// `spark-pagebuf` 的统一错误类型。
///
/// # Why
/// - 页池耗尽是部署相关的资源问题，调用方需要据此决定丢弃消息、背压或终止进程，
///   因此以错误值而非进程中止的方式上抛；
/// - 读越界属于调用方违背前置条件，在 API 边界返回错误，避免在生产构建中直接 panic。
///
/// # What
/// - `PoolExhausted`：`live` 为当前在用页数，`limit` 为配置上限；
/// - `ReadOutOfBounds`：`requested` 为请求字节数，`available` 为当前片段剩余字节数；
/// - `SizeOverflow`：`current` 为已有字节数，`additional` 为本次追加长度；
/// - `InvalidConfig`：`reason` 为人类可读的校验失败原因。
///
/// # 契约说明
/// - 所有变体均可 `Clone`，便于在测试与重试逻辑中复用；
/// - [`BufferError::code`] 返回的字符串在版本间保持稳定。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BufferError {
    /// 页池无法再提供新页。
    #[error("页池已耗尽：在用页 {live} 已达上限 {limit}")]
    PoolExhausted { live: usize, limit: usize },
    /// 读取长度超出当前片段。
    #[error("读取越界：请求 {requested} 字节，当前片段仅剩 {available} 字节")]
    ReadOutOfBounds { requested: usize, available: usize },
    /// 总长度溢出。
    #[error("消息总长度溢出：已有 {current} 字节，追加 {additional} 字节")]
    SizeOverflow { current: usize, additional: usize },
    /// 配置无效。
    #[error("页池配置无效：{reason}")]
    InvalidConfig { reason: String },
}

impl BufferError {
    /// 返回稳定错误码。
    pub fn code(&self) -> &'static str {
        match self {
            BufferError::PoolExhausted { .. } => codes::POOL_EXHAUSTED,
            BufferError::ReadOutOfBounds { .. } => codes::READ_OUT_OF_BOUNDS,
            BufferError::SizeOverflow { .. } => codes::SIZE_OVERFLOW,
            BufferError::InvalidConfig { .. } => codes::INVALID_CONFIG,
        }
    }
}

/// crate 内统一使用的 `Result` 别名。
pub type Result<T, E = BufferError> = core::result::Result<T, E>;
