//! # tarfs
//!
//! 将以TAR格式组织的块设备解释为只读的文件系统。
//!
//! ## 分层（自上而下）
//!
//! 1. 句柄层：系统调用所见的已打开对象
//! 2. 文件系统层：挂载、路径解析、目录列表
//! 3. 树层：内存中的节点树，挂载时由扫描器一次建成
//! 4. 头部层：单个归档记录的解码
//! 5. 块设备驱动层

#![no_std]

extern crate alloc;

mod builder;
mod file;
mod fs;
pub mod header;
mod listing;
mod object;
mod tree;

pub use self::{
    builder::{BuildError, ScanWarning},
    file::TarFile,
    fs::TarFileSystem,
    header::{ArchiveHeader, DecodeError, EntryType, decode},
    listing::{DirectoryListing, ListFlag, NAME_COLUMN},
    object::ObjectTable,
    tree::{Extent, NodeId, NodeRef, Tree},
};
