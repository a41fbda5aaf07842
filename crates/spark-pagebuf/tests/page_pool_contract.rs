//! `page_pool_contract` 集成测试：验证 `SlabPagePool` 的复用、上限、配置与统计。
//!
//! # 测试目标（Why）
//! - 归还的页必须回到自由链表并被下一次租借复用，否则每条消息都会触发系统分配；
//! - 有界池在达到上限时返回 `PoolExhausted`，并在统计中留下失败记录；
//! - TOML 配置与代码构造得到一致的池行为。

use std::sync::Arc;

use spark_pagebuf::{
    AppendBuffer, BufferError, PAGE_SIZE, PagePool, PagePoolConfig, SlabPagePool, global_pool,
};

/// 同一条消息清空后再次构建，全部页来自自由链表。
#[test]
fn rebuilt_message_reuses_cached_pages() {
    let pool = SlabPagePool::new();
    let mut buffer = AppendBuffer::with_pool(Arc::new(pool.clone()));
    buffer.append(&[1u8; 3 * PAGE_SIZE]).expect("首次构建失败");
    buffer.clear();

    let after_clear = pool.statistics();
    assert_eq!(after_clear.cached_pages, 3);
    assert_eq!(after_clear.live_pages, 0);

    buffer.append(&[2u8; 3 * PAGE_SIZE]).expect("再次构建失败");
    let rebuilt = pool.statistics();
    assert_eq!(rebuilt.fresh_allocations, 3, "第二次构建不应新分配页");
    assert_eq!(rebuilt.cached_pages, 0);
    assert_eq!(rebuilt.live_pages, 3);
}

/// 有界池限制单条消息的最大页数。
#[test]
fn bounded_pool_caps_message_size() {
    let pool = SlabPagePool::bounded(2).expect("构造有界池");
    let mut buffer = AppendBuffer::with_pool(Arc::new(pool.clone()));
    buffer.append(&[0u8; 2 * PAGE_SIZE]).expect("两页以内应成功");
    let err = buffer.append(&[0u8; 1]).expect_err("第三页应被拒绝");
    assert_eq!(err, BufferError::PoolExhausted { live: 2, limit: 2 });

    let stats = pool.statistics();
    assert_eq!(stats.failed_acquisitions, 1);
    assert_eq!(stats.live_pages, 2);
    assert_eq!(buffer.size(), 2 * PAGE_SIZE);
}

/// 零上限被视为配置错误。
#[test]
fn zero_live_limit_is_rejected() {
    let err = SlabPagePool::bounded(0).err().expect("零上限应报错");
    assert_eq!(err.code(), "buffer.invalid_config");
}

/// TOML 配置驱动预填充与上限。
#[test]
fn toml_config_prefills_and_bounds_the_pool() {
    let config = PagePoolConfig::from_toml_str(
        r#"
        max_live_pages = 4
        max_cached_pages = 8
        prefill_pages = 2
        "#,
    )
    .expect("解析配置失败");
    let pool = SlabPagePool::with_config(config).expect("按配置构造失败");

    let stats = pool.statistics();
    assert_eq!(stats.cached_pages, 2);
    assert_eq!(stats.fresh_allocations, 2);

    let mut buffer = AppendBuffer::with_pool(Arc::new(pool.clone()));
    buffer.append(&[0u8; 4 * PAGE_SIZE]).expect("四页以内应成功");
    assert_eq!(pool.statistics().fresh_allocations, 4, "前两页来自预填充");
    assert!(buffer.append(&[0u8; 1]).is_err());
}

/// 缓存上限之外归还的页被直接释放。
#[test]
fn cache_limit_bounds_free_list() {
    let config = PagePoolConfig {
        max_cached_pages: 1,
        ..PagePoolConfig::default()
    };
    let pool = SlabPagePool::with_config(config).expect("构造失败");
    let mut buffer = AppendBuffer::with_pool(Arc::new(pool.clone()));
    buffer.append(&[0u8; 3 * PAGE_SIZE]).expect("追加失败");
    drop(buffer);
    let stats = pool.statistics();
    assert_eq!(stats.cached_pages, 1);
    assert_eq!(stats.released, 3);
}

/// `shrink_to_fit` 清空自由链表并返回释放的字节数。
#[test]
fn shrink_to_fit_drops_cached_pages() {
    let pool = SlabPagePool::new();
    let page = pool.acquire().expect("租借失败");
    pool.release(page);
    assert_eq!(pool.shrink_to_fit(), PAGE_SIZE);
    assert_eq!(pool.statistics().cached_pages, 0);
    assert_eq!(pool.shrink_to_fit(), 0);
}

/// 默认构造的缓冲绑定到进程级共享池。
#[test]
fn default_buffer_uses_global_pool() {
    let mut buffer = AppendBuffer::default();
    assert!(Arc::ptr_eq(buffer.pool(), &global_pool()));
    buffer.append(b"global").expect("追加失败");
    assert_eq!(buffer.read_cursor().next(), Some(&b"global"[..]));
}

/// 多线程并发租借时，同时持有的页数从不超过上限。
#[test]
fn concurrent_acquires_never_exceed_live_limit() {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    const LIMIT: usize = 2;
    let pool = SlabPagePool::bounded(LIMIT).expect("构造有界池");
    let held = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let workers: Vec<_> = (0..8)
        .map(|_| {
            let pool = pool.clone();
            let held = Arc::clone(&held);
            let peak = Arc::clone(&peak);
            thread::spawn(move || {
                for _ in 0..5_000 {
                    if let Ok(page) = pool.acquire() {
                        let now = held.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        held.fetch_sub(1, Ordering::SeqCst);
                        pool.release(page);
                    }
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().expect("工作线程不应 panic");
    }

    assert!(peak.load(Ordering::SeqCst) <= LIMIT, "同时在用页超过上限");
    let stats = pool.statistics();
    assert_eq!(stats.live_pages, 0);
    assert_eq!(stats.acquired, stats.released);
}
