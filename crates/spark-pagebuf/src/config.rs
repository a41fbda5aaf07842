use alloc::{format, string::String};

use serde::{Deserialize, Serialize};

use crate::{
    error::{BufferError, Result},
    pool::DEFAULT_MAX_CACHED_PAGES,
};

/// `SlabPagePool` 的运行期配置。
///
/// # 设计动机（Why）
/// - 页大小与内联槽位数属于编译期几何参数，不可配置；
///   真正随部署变化的是“最多占用多少页”“缓存多少空闲页”“启动时预热多少页”；
/// - 以 TOML 片段承载，便于宿主将其嵌入自身配置文件的某个表中。
///
/// # 契约说明（What）
/// - `max_live_pages`：同时在用的页数上限，`None` 表示不限；不得为 `Some(0)`；
/// - `max_cached_pages`：自由链表最多缓存的空闲页数；
/// - `prefill_pages`：构造时预先分配进自由链表的页数，不得超过 `max_cached_pages`；
/// - 未出现的字段取默认值，未知字段视为错误，防止拼写错误被静默忽略。
///
/// ```toml
/// max_live_pages = 4096
/// max_cached_pages = 256
/// prefill_pages = 64
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PagePoolConfig {
    pub max_live_pages: Option<usize>,
    pub max_cached_pages: usize,
    pub prefill_pages: usize,
}

impl Default for PagePoolConfig {
    fn default() -> Self {
        Self {
            max_live_pages: None,
            max_cached_pages: DEFAULT_MAX_CACHED_PAGES,
            prefill_pages: 0,
        }
    }
}

impl PagePoolConfig {
    /// 从 TOML 文本解析并校验配置。
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|err| BufferError::InvalidConfig {
            reason: format!("TOML 解析失败：{err}"),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// 校验字段间约束。
    pub fn validate(&self) -> Result<()> {
        if self.max_live_pages == Some(0) {
            return Err(invalid("max_live_pages 必须大于 0"));
        }
        if self.prefill_pages > self.max_cached_pages {
            return Err(BufferError::InvalidConfig {
                reason: format!(
                    "prefill_pages ({}) 不得超过 max_cached_pages ({})",
                    self.prefill_pages, self.max_cached_pages
                ),
            });
        }
        Ok(())
    }
}

fn invalid(reason: &str) -> BufferError {
    BufferError::InvalidConfig {
        reason: String::from(reason),
    }
}
