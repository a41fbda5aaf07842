use alloc::boxed::Box;
use core::fmt;

/// 单页字节数。
pub const PAGE_SIZE: usize = 0x1000;
/// `PAGE_SIZE == 1 << PAGE_SIZE_EXP`。
pub const PAGE_SIZE_EXP: u32 = 12;
const _: () = assert!(1usize << PAGE_SIZE_EXP == PAGE_SIZE);

/// `Page` 是页池租借与归还的最小单位，同时充当“页句柄”。
///
/// # 设计动机（Why）
/// - 句柄即所有权：`Page` 内部只有一个指向 `PAGE_SIZE` 字节堆块的指针，
///   移动 `Page` 只复制指针而不复制页内容，消息整体移交因此保持 O(1)；
/// - 由于 `Page` 不实现 `Clone`，同一页在任意时刻只能被一个结构持有，
///   “二次归还”在类型层面即不可表达。
///
/// # 契约说明（What）
/// - 新页内容不保证清零：池可能复用他人归还的页；
/// - 页被 `drop` 时直接释放内存，池实现若要复用必须通过 `PagePool::release` 取回。
pub struct Page {
    frame: Box<[u8; PAGE_SIZE]>,
}

impl Page {
    /// 从全局分配器申请一块新页（内容为零）。
    pub fn new() -> Self {
        Self {
            frame: Box::new([0u8; PAGE_SIZE]),
        }
    }

    /// 只读视图。
    pub fn as_slice(&self) -> &[u8] {
        &self.frame[..]
    }

    /// 可写视图。
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.frame[..]
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page")
            .field("addr", &self.frame.as_ptr())
            .finish()
    }
}
