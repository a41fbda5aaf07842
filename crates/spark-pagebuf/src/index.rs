//! 两级页索引：少量内联槽位 + 扁平的索引页链。
//!
//! # 模块定位（Why）
//! - 绝大多数消息不超过 4 页（16 KiB），此时页句柄直接存放在内联槽位中，无需任何额外分配；
//! - 超出内联容量后，句柄写入按“页大小”计量的索引页，每个索引页可容纳
//!   [`MAX_ADDRESSED_BY_PAGE`] 个句柄；索引页只会顺序追加，形成单向、扁平的链，
//!   从不分叉为多级树。
//!
//! # 结构说明（How）
//! - `inline`：前 [`LOCAL_STORAGE_SIZE`] 个逻辑槽位；
//! - `chain`：其余槽位，按顺序分布在各索引页中；除最后一页外每页都是满的；
//! - `page_count`：仅统计负载页，不含索引页。
//!
//! # 契约（What）
//! - 第 `i` 个追加的页一定位于逻辑槽位 `i`，[`PageIndex::pages`] 按槽位顺序产出；
//! - 索引绑定登记页的来源池；[`PageIndex::release_all`] 与 `Drop` 都会把所有负载页
//!   逐一归还给该池，页不会绕过池被直接释放。

use alloc::{sync::Arc, vec::Vec};
use core::{iter::FusedIterator, mem::size_of};

use crate::{
    page::{PAGE_SIZE, Page},
    pool::PagePool,
};

/// 内联槽位数。
pub const LOCAL_STORAGE_SIZE: usize = 4;
/// 索引页头部：链接字段 + 已用计数。
pub const INDEX_PAGE_HEADER_SIZE: usize = 2 * size_of::<usize>();
/// 单个页句柄占用的字节数。
pub const PAGE_HANDLE_SIZE: usize = size_of::<Page>();
/// 单个索引页可寻址的负载页数量。
pub const MAX_ADDRESSED_BY_PAGE: usize = (PAGE_SIZE - INDEX_PAGE_HEADER_SIZE) / PAGE_HANDLE_SIZE;

const _: () = assert!(MAX_ADDRESSED_BY_PAGE > 0);

/// 索引页：一页大小的句柄数组，`entries.len()` 即已用计数。
struct IndexPage {
    entries: Vec<Page>,
}

impl IndexPage {
    fn with_first(page: Page) -> Self {
        let mut entries = Vec::with_capacity(MAX_ADDRESSED_BY_PAGE);
        entries.push(page);
        Self { entries }
    }

    fn is_full(&self) -> bool {
        self.entries.len() == MAX_ADDRESSED_BY_PAGE
    }
}

/// 逻辑槽位到页句柄的映射。
///
/// 登记的页必须来自构造时绑定的 `pool`；索引被丢弃时未归还的页会自动交还给它。
pub struct PageIndex {
    inline: [Option<Page>; LOCAL_STORAGE_SIZE],
    chain: Vec<IndexPage>,
    page_count: usize,
    pool: Arc<dyn PagePool>,
}

impl PageIndex {
    /// 创建绑定到 `pool` 的空索引，不触发任何分配。
    pub fn new(pool: Arc<dyn PagePool>) -> Self {
        Self {
            inline: core::array::from_fn(|_| None),
            chain: Vec::new(),
            page_count: 0,
            pool,
        }
    }

    /// 登记页的来源池。
    pub fn pool(&self) -> &Arc<dyn PagePool> {
        &self.pool
    }

    /// 负载页数量。
    pub fn page_count(&self) -> usize {
        self.page_count
    }

    /// 已链接的索引页数量；内联阶段为 0。
    pub fn index_page_count(&self) -> usize {
        self.chain.len()
    }

    /// 是否未登记任何负载页。
    pub fn is_empty(&self) -> bool {
        self.page_count == 0
    }

    /// 将页登记到下一个逻辑槽位。
    ///
    /// 内联槽位未满时直接存放；否则写入最后一个索引页，
    /// 若尚无索引页或最后一页已满，则先链接一个新的索引页。
    pub fn append_page(&mut self, page: Page) {
        if self.page_count < LOCAL_STORAGE_SIZE {
            debug_assert!(self.chain.is_empty());
            debug_assert!(self.inline[self.page_count].is_none());
            self.inline[self.page_count] = Some(page);
        } else {
            match self.chain.last_mut() {
                Some(last) if !last.is_full() => last.entries.push(page),
                _ => {
                    self.chain.push(IndexPage::with_first(page));
                    tracing::debug!(
                        index_pages = self.chain.len(),
                        page_count = self.page_count + 1,
                        "链接新的索引页"
                    );
                }
            }
        }
        self.page_count += 1;
    }

    /// 最近登记的页。
    pub(crate) fn last_page_mut(&mut self) -> Option<&mut Page> {
        match self.page_count {
            0 => None,
            n if n <= LOCAL_STORAGE_SIZE => self.inline[n - 1].as_mut(),
            _ => self
                .chain
                .last_mut()
                .and_then(|index_page| index_page.entries.last_mut()),
        }
    }

    /// 按槽位顺序遍历所有负载页。
    pub fn pages(&self) -> Pages<'_> {
        Pages {
            index: self,
            slot: 0,
            chain_pos: 0,
            entry: 0,
        }
    }

    /// 将所有负载页归还给来源池，随后丢弃索引页并重置为空；返回归还的页数。
    pub fn release_all(&mut self) -> usize {
        let pool = self.pool.as_ref();
        let mut released = 0;
        for slot in self.inline.iter_mut() {
            if let Some(page) = slot.take() {
                pool.release(page);
                released += 1;
            }
        }
        for index_page in self.chain.drain(..) {
            for page in index_page.entries {
                pool.release(page);
                released += 1;
            }
        }
        debug_assert_eq!(released, self.page_count, "索引记录的页数与实际归还数不一致");
        self.page_count = 0;
        released
    }
}

impl Drop for PageIndex {
    fn drop(&mut self) {
        self.release_all();
    }
}

/// [`PageIndex::pages`] 返回的前向迭代器，不可重启；重新遍历需再次调用 `pages`。
pub struct Pages<'a> {
    index: &'a PageIndex,
    slot: usize,
    chain_pos: usize,
    entry: usize,
}

impl<'a> Iterator for Pages<'a> {
    type Item = &'a Page;

    fn next(&mut self) -> Option<&'a Page> {
        if self.slot >= self.index.page_count {
            return None;
        }
        let page = if self.slot < LOCAL_STORAGE_SIZE {
            self.index.inline[self.slot].as_ref()?
        } else {
            let index_page = self.index.chain.get(self.chain_pos)?;
            let page = index_page.entries.get(self.entry)?;
            self.entry += 1;
            if self.entry == index_page.entries.len() {
                self.chain_pos += 1;
                self.entry = 0;
            }
            page
        };
        self.slot += 1;
        Some(page)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.index.page_count.saturating_sub(self.slot);
        (left, Some(left))
    }
}

impl ExactSizeIterator for Pages<'_> {}

impl FusedIterator for Pages<'_> {}
