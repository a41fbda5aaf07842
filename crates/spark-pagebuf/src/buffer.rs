use alloc::{sync::Arc, vec::Vec};
use core::{fmt, mem};

use crate::{
    cursor::ReadCursor,
    error::{BufferError, Result},
    index::PageIndex,
    page::{PAGE_SIZE, Page},
    pool::PagePool,
};

/// `AppendBuffer` 是由固定大小页拼接而成的追加式消息缓冲。
///
/// # 设计动机（Why）
/// - 生产者逐段追加一条变长消息，缓冲按需向 [`PagePool`] 租借页，不做整体扩容与搬迁；
/// - 构建完成后整条消息连同全部页一起移动给消费者（跨线程或跨任务），移动只复制句柄，
///   不复制任何负载字节；消费者通过 [`ReadCursor`] 零拷贝地逐页读取后丢弃缓冲。
///
/// # 架构关系（How）
/// - `index`：页索引，前 4 页内联存放，其余页挂在扁平的索引页链上；
/// - `total_size`：自构造或上次 `clear` 以来追加的字节数，同时决定当前页内的写偏移；
/// - 页来源记录在索引中，它也是 `clear`/`Drop` 时页的归宿。
///
/// # 契约说明（What）
/// - 只支持单调追加与单调前向读取，不支持随机访问、覆盖写或并发写；
/// - 不实现 `Clone`：复制意味着深拷贝所有页或共享所有权，二者都与“单一所有者归还页”的约定冲突；
/// - 所有退出路径（正常返回、提前返回、panic 展开）上，`Drop` 都会把持有的页全部归还给池；
/// - 类型满足 `Send + Sync`，可以整体移交给其它线程。
pub struct AppendBuffer {
    index: PageIndex,
    total_size: usize,
}

impl AppendBuffer {
    /// 绑定到进程级默认页池的空缓冲。
    #[cfg(feature = "std")]
    pub fn new() -> Self {
        Self::with_pool(crate::pool::global_pool())
    }

    /// 绑定到指定页池的空缓冲，不触发任何分配。
    pub fn with_pool(pool: Arc<dyn PagePool>) -> Self {
        Self {
            index: PageIndex::new(pool),
            total_size: 0,
        }
    }

    /// 已追加的字节总数。
    pub fn size(&self) -> usize {
        self.total_size
    }

    /// 是否尚未追加任何字节。
    pub fn is_empty(&self) -> bool {
        self.total_size == 0
    }

    /// 持有的负载页数量（不含索引页）。
    pub fn page_count(&self) -> usize {
        self.index.page_count()
    }

    /// 已链接的索引页数量。
    pub fn index_page_count(&self) -> usize {
        self.index.index_page_count()
    }

    /// 最近租借的页是否仍有未写满的尾部空间。
    ///
    /// 页只在写入至少一个字节时才会被租借，因此“存在未满页”与
    /// “总长度不是页大小整数倍”等价；写满到边界的瞬间即视为关闭。
    pub fn has_open_page(&self) -> bool {
        self.offset_in_current_page() != 0
    }

    /// 缓冲所绑定的页池。
    pub fn pool(&self) -> &Arc<dyn PagePool> {
        self.index.pool()
    }

    fn offset_in_current_page(&self) -> usize {
        self.total_size & (PAGE_SIZE - 1)
    }

    fn remaining_in_current_page(&self) -> usize {
        if self.has_open_page() {
            PAGE_SIZE - self.offset_in_current_page()
        } else {
            0
        }
    }

    /// 在消息末尾追加 `src`。
    ///
    /// # 契约
    /// - **前置条件**：无；空切片是合法的空操作；
    /// - **后置条件**：成功时 `size()` 增加 `src.len()`，页边界对调用方不可见；
    /// - **失败语义**：本次追加所需的新页会在复制前一次性租齐；任何一页租借失败时，
    ///   已租到的页立即归还，缓冲保持调用前的状态并返回 [`BufferError::PoolExhausted`]。
    ///
    /// # 执行步骤（How）
    /// 1. 计算当前页尾部空间与还需的新页数量；
    /// 2. 向池租齐新页；
    /// 3. 先填满当前页的尾部，再逐页填充新页并登记到索引；
    ///    恰好写满的页不再视为“当前页”，下一次追加将从新页开始。
    pub fn append(&mut self, src: &[u8]) -> Result<()> {
        if src.is_empty() {
            return Ok(());
        }
        let new_total =
            self.total_size
                .checked_add(src.len())
                .ok_or(BufferError::SizeOverflow {
                    current: self.total_size,
                    additional: src.len(),
                })?;

        let tail_room = self.remaining_in_current_page();
        let fresh_needed = src.len().saturating_sub(tail_room).div_ceil(PAGE_SIZE);
        let fresh = self.acquire_pages(fresh_needed)?;

        let (head, mut rest) = src.split_at(tail_room.min(src.len()));
        if !head.is_empty() {
            let offset = self.offset_in_current_page();
            let page = self.index.last_page_mut();
            debug_assert!(page.is_some(), "存在未满页时索引不应为空");
            if let Some(page) = page {
                page.as_mut_slice()[offset..offset + head.len()].copy_from_slice(head);
            }
        }
        for mut page in fresh {
            let (chunk, tail) = rest.split_at(rest.len().min(PAGE_SIZE));
            page.as_mut_slice()[..chunk.len()].copy_from_slice(chunk);
            self.index.append_page(page);
            rest = tail;
        }
        debug_assert!(rest.is_empty());

        self.total_size = new_total;
        debug_assert_eq!(
            self.index.page_count(),
            self.total_size.div_ceil(PAGE_SIZE),
            "页数必须恰好覆盖总长度"
        );
        Ok(())
    }

    /// 一次性租借 `count` 页；中途失败时归还已租到的页。
    fn acquire_pages(&self, count: usize) -> Result<Vec<Page>> {
        let mut pages = Vec::with_capacity(count);
        for _ in 0..count {
            match self.pool().acquire() {
                Ok(page) => pages.push(page),
                Err(err) => {
                    for page in pages.drain(..) {
                        self.pool().release(page);
                    }
                    return Err(err);
                }
            }
        }
        Ok(pages)
    }

    /// 创建从头读取整条消息的游标。
    ///
    /// 游标借用缓冲：在游标存活期间，借用规则禁止 `append`/`clear`/`take`。
    pub fn read_cursor(&self) -> ReadCursor<'_> {
        ReadCursor::new(&self.index, self.total_size)
    }

    /// 归还全部页并重置为空；对空缓冲调用是无害的空操作。
    pub fn clear(&mut self) {
        let bytes = self.total_size;
        let pages = self.index.release_all();
        self.total_size = 0;
        if pages > 0 {
            tracing::trace!(pages, bytes, "消息缓冲归还全部页");
        }
    }

    /// 取走全部状态，原缓冲留为空且仍绑定同一页池。
    ///
    /// 等价于 C++ 风格的移动构造：只转移句柄，O(1)，不复制负载；
    /// 被取空的缓冲在 `Drop` 时不会归还任何页。
    pub fn take(&mut self) -> AppendBuffer {
        let empty = AppendBuffer::with_pool(Arc::clone(self.pool()));
        mem::replace(self, empty)
    }
}

#[cfg(feature = "std")]
impl Default for AppendBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for AppendBuffer {
    fn drop(&mut self) {
        self.clear();
    }
}

impl fmt::Debug for AppendBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppendBuffer")
            .field("size", &self.total_size)
            .field("pages", &self.index.page_count())
            .field("index_pages", &self.index.index_page_count())
            .field("open_page", &self.has_open_page())
            .finish()
    }
}

#[cfg(feature = "std")]
impl std::io::Write for AppendBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.append(buf).map_err(into_io_error)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(feature = "std")]
fn into_io_error(err: BufferError) -> std::io::Error {
    let kind = match err {
        BufferError::PoolExhausted { .. } => std::io::ErrorKind::OutOfMemory,
        _ => std::io::ErrorKind::Other,
    };
    std::io::Error::new(kind, err)
}
