use alloc::{string::String, sync::Arc, vec::Vec};
use core::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use spin::Mutex;

use crate::{
    error::{BufferError, Result},
    page::{PAGE_SIZE, Page},
};

/// `PagePool` 描述分页消息缓冲所依赖的外部页供给能力。
///
/// # 设计初衷（Why）
/// - 消息缓冲只关心“拿到一页、用完还回去”，页来自 malloc、slab 还是共享内存段
///   应由宿主决定，因此以 trait 形式注入；
/// - 归还入口与租借入口成对出现，`AppendBuffer` 在 `clear`/`Drop` 时统一调用
///   [`release`](Self::release)，避免调用方散落回收逻辑。
///
/// # 契约定义（What）
/// - `acquire`：返回恰好 `PAGE_SIZE` 字节的页，内容不保证清零；
///   无法供给时返回 [`BufferError::PoolExhausted`]，不得 panic；
/// - `release`：只接收由本池 `acquire` 租出且尚未归还的页，调用后该页所有权归池所有；
///   传入其它来源的页会破坏在用计数，进而让有界池的上限失效；
/// - 实现必须线程安全且不阻塞热路径：缓冲会被移交至其它线程后再归还页。
pub trait PagePool: Send + Sync + 'static {
    /// 租借一页。
    fn acquire(&self) -> Result<Page>;

    /// 归还一页。
    fn release(&self, page: Page);

    /// 返回统计快照。
    fn statistics(&self) -> PagePoolStats;
}

/// 页池统计快照。
///
/// - `acquired` / `released`：累计租借与归还次数；
/// - `live_pages`：当前租出未还的页数，与有界池上限检查使用同一计数；
/// - `cached_pages`：自由链表中等待复用的页数（`HeapPagePool` 恒为 0）；
/// - `fresh_allocations`：向全局分配器新申请的页数；
/// - `failed_acquisitions`：因达到上限而拒绝的租借次数。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PagePoolStats {
    pub acquired: usize,
    pub released: usize,
    pub live_pages: usize,
    pub cached_pages: usize,
    pub fresh_allocations: usize,
    pub failed_acquisitions: u64,
}

/// 每次租借都向全局分配器申请新页、归还即释放的最简页池。
///
/// 适用于测试或对复用没有要求的场景；统计计数与 [`SlabPagePool`] 一致，
/// 便于在两者之间切换时对账。
#[derive(Default)]
pub struct HeapPagePool {
    metrics: PoolMetrics,
}

impl HeapPagePool {
    /// 创建计数清零的池。
    pub fn new() -> Self {
        Self::default()
    }
}

impl PagePool for HeapPagePool {
    fn acquire(&self) -> Result<Page> {
        let _ = self.metrics.try_reserve(None);
        self.metrics.on_fresh_allocation();
        self.metrics.on_acquire();
        Ok(Page::new())
    }

    fn release(&self, page: Page) {
        self.metrics.on_release();
        drop(page);
    }

    fn statistics(&self) -> PagePoolStats {
        self.metrics.snapshot(0)
    }
}

/// `SlabPagePool` 基于自由链表复用页，并可限制同时在用的页数。
///
/// # 模块角色（Why）
/// - 作为默认的页来源，避免每条消息都向系统分配器申请 4 KiB 块；
/// - `max_live_pages` 为部署方提供明确的内存上限，超限时以
///   [`BufferError::PoolExhausted`] 告知调用方，而不是让进程被 OOM 终止。
///
/// # 核心机制（How）
/// - 内部维护 `spin::Mutex<Vec<Page>>` 作为自由链表，租借时优先弹出缓存页；
/// - 租借前先以 `fetch_update` 原子地占用一个在用名额，名额不足即失败；
///   上限检查与计数更新是同一次原子操作，并发租借不会越过 `max_live_pages`；
/// - `PoolMetrics` 以原子计数跟踪租借、归还、新分配与失败次数；
/// - 归还时若缓存已达 `max_cached_pages`，页被直接释放。
///
/// # 设计权衡（Trade-offs）
/// - 使用自旋锁而非阻塞锁：临界区只有一次 `Vec::push/pop`，且在 `no_std` 下同样可用。
#[derive(Clone)]
pub struct SlabPagePool {
    inner: Arc<SlabInner>,
}

impl Default for SlabPagePool {
    fn default() -> Self {
        Self {
            inner: Arc::new(SlabInner::new(None, DEFAULT_MAX_CACHED_PAGES)),
        }
    }
}

/// 自由链表默认缓存页数上限。
pub const DEFAULT_MAX_CACHED_PAGES: usize = 1024;

impl SlabPagePool {
    /// 创建不限在用页数的空池。
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建在用页数不超过 `max_live_pages` 的池。
    pub fn bounded(max_live_pages: usize) -> Result<Self> {
        if max_live_pages == 0 {
            return Err(BufferError::InvalidConfig {
                reason: String::from("max_live_pages 必须大于 0"),
            });
        }
        Ok(Self {
            inner: Arc::new(SlabInner::new(
                Some(max_live_pages),
                DEFAULT_MAX_CACHED_PAGES,
            )),
        })
    }

    /// 按配置构造，并预填充自由链表。
    #[cfg(feature = "std")]
    pub fn with_config(config: crate::config::PagePoolConfig) -> Result<Self> {
        config.validate()?;
        let inner = SlabInner::new(config.max_live_pages, config.max_cached_pages);
        inner.prefill(config.prefill_pages);
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// 清空自由链表，返回释放的字节数。
    pub fn shrink_to_fit(&self) -> usize {
        let drained = {
            let mut list = self.inner.free_list.lock();
            core::mem::take(&mut *list)
        };
        let freed = drained.len() * PAGE_SIZE;
        tracing::debug!(pages = drained.len(), "收缩页池自由链表");
        freed
    }
}

impl PagePool for SlabPagePool {
    fn acquire(&self) -> Result<Page> {
        self.inner.acquire_page()
    }

    fn release(&self, page: Page) {
        self.inner.release_page(page);
    }

    fn statistics(&self) -> PagePoolStats {
        let cached = self.inner.free_list.lock().len();
        self.inner.metrics.snapshot(cached)
    }
}

struct SlabInner {
    free_list: Mutex<Vec<Page>>,
    max_live_pages: Option<usize>,
    max_cached_pages: usize,
    metrics: PoolMetrics,
}

impl SlabInner {
    fn new(max_live_pages: Option<usize>, max_cached_pages: usize) -> Self {
        Self {
            free_list: Mutex::new(Vec::new()),
            max_live_pages,
            max_cached_pages,
            metrics: PoolMetrics::default(),
        }
    }

    fn prefill(&self, pages: usize) {
        if pages == 0 {
            return;
        }
        let mut list = self.free_list.lock();
        list.reserve(pages);
        for _ in 0..pages {
            list.push(Page::new());
            self.metrics.on_fresh_allocation();
        }
        tracing::debug!(pages, "页池预填充完成");
    }

    /// 从自由链表或堆上获取一页；达到在用上限时拒绝。
    fn acquire_page(&self) -> Result<Page> {
        if let Err(live) = self.metrics.try_reserve(self.max_live_pages) {
            let limit = self.max_live_pages.unwrap_or(live);
            self.metrics.on_failed_acquisition();
            tracing::warn!(live, limit, "页池已耗尽，拒绝租借");
            return Err(BufferError::PoolExhausted { live, limit });
        }

        // 名额已占用；`Page::new` 失败只会中止进程，无需回退。

        let reused = self.free_list.lock().pop();
        let page = match reused {
            Some(page) => page,
            None => {
                self.metrics.on_fresh_allocation();
                Page::new()
            }
        };
        self.metrics.on_acquire();
        Ok(page)
    }

    fn release_page(&self, page: Page) {
        self.metrics.on_release();
        let mut list = self.free_list.lock();
        if list.len() < self.max_cached_pages {
            list.push(page);
        }
    }
}

#[derive(Default)]
struct PoolMetrics {
    live: AtomicUsize,
    acquired: AtomicUsize,
    released: AtomicUsize,
    fresh_allocations: AtomicUsize,
    failed_acquisitions: AtomicU64,
}

impl PoolMetrics {
    fn on_acquire(&self) {
        self.acquired.fetch_add(1, Ordering::Relaxed);
    }

    /// 占用一个在用名额；已达 `limit` 时返回当前在用数。
    fn try_reserve(&self, limit: Option<usize>) -> core::result::Result<usize, usize> {
        self.live
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |live| match limit {
                Some(limit) if live >= limit => None,
                _ => Some(live + 1),
            })
    }

    fn on_release(&self) {
        let previous = self
            .live
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |live| {
                Some(live.saturating_sub(1))
            })
            .unwrap_or_else(|live| live);
        debug_assert!(previous > 0, "归还的页并非由本池租出");
        self.released.fetch_add(1, Ordering::Relaxed);
    }

    fn on_fresh_allocation(&self) {
        self.fresh_allocations.fetch_add(1, Ordering::Relaxed);
    }

    fn on_failed_acquisition(&self) {
        self.failed_acquisitions.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self, cached_pages: usize) -> PagePoolStats {
        PagePoolStats {
            acquired: self.acquired.load(Ordering::Relaxed),
            released: self.released.load(Ordering::Relaxed),
            live_pages: self.live.load(Ordering::Acquire),
            cached_pages,
            fresh_allocations: self.fresh_allocations.load(Ordering::Relaxed),
            failed_acquisitions: self.failed_acquisitions.load(Ordering::Relaxed),
        }
    }
}

/// 返回进程级共享的默认页池。
///
/// `AppendBuffer::new()` 与 `Default` 均绑定到此池；需要隔离统计或限制内存时，
/// 请改用 `AppendBuffer::with_pool` 显式注入。
#[cfg(feature = "std")]
pub fn global_pool() -> Arc<dyn PagePool> {
    static GLOBAL: std::sync::OnceLock<Arc<SlabPagePool>> = std::sync::OnceLock::new();
    let pool = GLOBAL.get_or_init(|| Arc::new(SlabPagePool::new()));
    Arc::clone(pool) as Arc<dyn PagePool>
}
