use bytes::Buf;

use crate::{
    error::{BufferError, Result},
    index::{PageIndex, Pages},
    page::PAGE_SIZE,
};

/// `ReadCursor` 按追加顺序、逐页产出消息字节的零拷贝只读游标。
///
/// # 设计动机（Why）
/// - 消息在页与页之间并不连续；为了不在页边界处拼接复制，游标以“片段”（span）为单位暴露数据，
///   每个片段恰好对应一页中的有效字节，片段边界与物理页边界一致；
/// - 单次 [`read`](Self::read) 不允许跨越片段边界，调用方按
///   [`available_size`](Self::available_size) 循环读取即可遍历整条消息。
///
/// # 结构说明（How）
/// - `pages`：索引的前向页迭代器，既负责内联槽位，也负责沿索引页链前进；
/// - `span`：当前片段中尚未读取的部分；
/// - `remaining`：整条消息尚未读取的字节数（含 `span`）。
///
/// # 契约说明（What）
/// - 只能通过 `AppendBuffer::read_cursor` 获得；游标借用缓冲，借用期间缓冲无法被追加或清空；
/// - 对同一个冻结的缓冲可同时持有任意多个游标，它们互不影响；
/// - 每个字节恰好被访问一次，片段数为 `ceil(size / PAGE_SIZE)`；
/// - 游标只能前进，不可回退或重启；需要再次遍历时重新获取游标。
pub struct ReadCursor<'a> {
    pages: Pages<'a>,
    span: &'a [u8],
    remaining: usize,
}

impl<'a> ReadCursor<'a> {
    pub(crate) fn new(index: &'a PageIndex, total_size: usize) -> Self {
        let mut cursor = Self {
            pages: index.pages(),
            span: &[],
            remaining: total_size,
        };
        if total_size > 0 {
            cursor.load_next_span();
        }
        cursor
    }

    /// 当前片段内可读、且不跨越页边界的字节数。
    pub fn available_size(&self) -> usize {
        self.span.len()
    }

    /// 整条消息剩余未读的字节数。
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    /// 是否已读完。
    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }

    /// 读取当前位置起的 `len` 个字节并前进。
    ///
    /// # 契约
    /// - **前置条件**：`len <= available_size()`，否则返回
    ///   [`BufferError::ReadOutOfBounds`] 且游标不移动；
    /// - **后置条件**：返回的切片直接指向页内存；若当前片段被读完且仍有剩余字节，
    ///   游标自动切换到下一页，新片段长度为 `min(remaining, PAGE_SIZE)`。
    pub fn read(&mut self, len: usize) -> Result<&'a [u8]> {
        if len > self.span.len() {
            return Err(BufferError::ReadOutOfBounds {
                requested: len,
                available: self.span.len(),
            });
        }
        Ok(self.consume(len))
    }

    fn consume(&mut self, len: usize) -> &'a [u8] {
        let (head, tail) = self.span.split_at(len);
        self.span = tail;
        self.remaining -= len;
        if self.span.is_empty() && self.remaining > 0 {
            self.load_next_span();
        }
        head
    }

    fn load_next_span(&mut self) {
        match self.pages.next() {
            Some(page) => {
                let len = self.remaining.min(PAGE_SIZE);
                self.span = &page.as_slice()[..len];
            }
            None => {
                debug_assert_eq!(self.remaining, 0, "索引中的页少于消息长度所需");
                self.remaining = 0;
                self.span = &[];
            }
        }
    }
}

/// 逐片段迭代：每次产出当前片段的全部剩余字节。
impl<'a> Iterator for ReadCursor<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<&'a [u8]> {
        if self.span.is_empty() {
            return None;
        }
        let len = self.span.len();
        Some(self.consume(len))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let spans = if self.remaining == 0 {
            0
        } else {
            1 + (self.remaining - self.span.len()).div_ceil(PAGE_SIZE)
        };
        (spans, Some(spans))
    }
}

/// 以 [`Buf`] 形式暴露游标，`chunk()` 即当前片段；`advance` 可跨页前进。
impl Buf for ReadCursor<'_> {
    fn remaining(&self) -> usize {
        self.remaining
    }

    fn chunk(&self) -> &[u8] {
        self.span
    }

    fn advance(&mut self, mut cnt: usize) {
        assert!(
            cnt <= self.remaining,
            "ReadCursor::advance 超出剩余字节：请求 {cnt}，剩余 {}",
            self.remaining
        );
        while cnt > 0 {
            let step = cnt.min(self.span.len());
            if step == 0 {
                break;
            }
            self.consume(step);
            cnt -= step;
        }
    }
}
