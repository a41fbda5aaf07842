#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]

//! `spark-pagebuf` 提供由固定大小页拼接而成的追加式消息缓冲。
//!
//! # 模块定位（Why）
//! - 在流水线中，一条变长消息往往在一个执行上下文里逐段构建，再交给另一个上下文消费；
//!   以整页为单位向页池租借内存，可以让“构建 -> 移交 -> 读取 -> 归还”全程不复制负载字节；
//! - 消息所有权的移交只移动少量句柄，代价与消息长度无关。
//!
//! # 设计概要（How）
//! - `page`：4 KiB 页及其所有权句柄 [`Page`]；
//! - `pool`：[`PagePool`] 抽象与两种实现：逐页堆分配的 [`HeapPagePool`] 和带自由链表的 [`SlabPagePool`]；
//! - `index`：[`PageIndex`]，4 个内联槽位加扁平索引页链的两级页索引；
//! - `buffer`：[`AppendBuffer`]，负责追加、清空与整体移交；
//! - `cursor`：[`ReadCursor`]，逐页产出零拷贝片段的前向游标；
//! - `config`：`SlabPagePool` 的 TOML 配置（需 `std` Feature）。
//!
//! # 使用示例
//! ```rust
//! use std::sync::Arc;
//! use spark_pagebuf::{AppendBuffer, HeapPagePool};
//!
//! let mut buffer = AppendBuffer::with_pool(Arc::new(HeapPagePool::new()));
//! buffer.append(b"header|").unwrap();
//! buffer.append(&[0u8; 10_000]).unwrap();
//!
//! let handed_over = std::thread::spawn(move || {
//!     let mut cursor = buffer.read_cursor();
//!     let mut seen = 0;
//!     while cursor.available_size() > 0 {
//!         let len = cursor.available_size();
//!         seen += cursor.read(len).unwrap().len();
//!     }
//!     seen
//! })
//! .join()
//! .unwrap();
//! assert_eq!(handed_over, 7 + 10_000);
//! ```

extern crate alloc;

mod buffer;
#[cfg(feature = "std")]
mod config;
mod cursor;
pub mod error;
mod index;
mod page;
mod pool;

pub use buffer::AppendBuffer;
#[cfg(feature = "std")]
pub use config::PagePoolConfig;
pub use cursor::ReadCursor;
pub use error::{BufferError, Result};
pub use index::{
    INDEX_PAGE_HEADER_SIZE, LOCAL_STORAGE_SIZE, MAX_ADDRESSED_BY_PAGE, PAGE_HANDLE_SIZE,
    PageIndex, Pages,
};
pub use page::{PAGE_SIZE, PAGE_SIZE_EXP, Page};
#[cfg(feature = "std")]
pub use pool::global_pool;
pub use pool::{DEFAULT_MAX_CACHED_PAGES, HeapPagePool, PagePool, PagePoolStats, SlabPagePool};
