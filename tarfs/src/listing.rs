//! 目录列表
//!
//! 每次请求都从目录的子节点拍一份快照，
//! 排序后渲染为逐行的文本，末尾以一个NUL结束。

use alloc::string::{String, ToString};
use alloc::vec::Vec;

use enumflags2::{BitFlags, bitflags};
use vfs::{DirEntry, DirEntryType};

use crate::tree::NodeRef;

/// 名称一栏的宽度，大小一栏从此处开始
pub const NAME_COLUMN: usize = 32;

/// 以此开头的名称是隐藏项
const HIDDEN_MARKER: u8 = b'.';

const SENTINEL: u8 = b'\0';

#[rustfmt::skip]
#[bitflags]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListFlag {
    /// 显示类型标签与文件大小
    Long     = 0b001,
    /// 显示隐藏项
    All      = 0b010,
    /// 保持插入顺序
    Unsorted = 0b100,
}

/// 一个目录的子节点快照
#[derive(Debug, Clone)]
pub struct DirectoryListing {
    names: Vec<String>,
    sizes: Vec<u64>,
    kinds: Vec<DirEntryType>,
    flags: BitFlags<ListFlag>,
    /// 按名称排序后的下标，排序前为`None`
    order: Option<Vec<usize>>,
}

impl DirectoryListing {
    pub fn new(entries: impl IntoIterator<Item = DirEntry>, flags: BitFlags<ListFlag>) -> Self {
        let entries = entries.into_iter();
        let (lower, _) = entries.size_hint();
        let mut listing = Self {
            names: Vec::with_capacity(lower),
            sizes: Vec::with_capacity(lower),
            kinds: Vec::with_capacity(lower),
            flags,
            order: None,
        };

        for DirEntry { ty, name, size, .. } in entries {
            listing.names.push(name);
            listing.sizes.push(size);
            listing.kinds.push(ty);
        }

        listing
    }

    /// 目录
    pub fn snapshot(dir: NodeRef<'_>, flags: BitFlags<ListFlag>) -> Self {
        debug_assert!(dir.is_dir());
        Self::new(dir.children().map(|child| child.dirent()), flags)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    #[inline]
    pub fn flags(&self) -> BitFlags<ListFlag> {
        self.flags
    }

    /// 排序得到的下标排列，尚未排序或不排序时为`None`
    pub fn order(&self) -> Option<&[usize]> {
        self.order.as_deref()
    }

    /// 按名称的字节序稳定排序，重复调用不改变结果
    pub fn sort(&mut self) {
        if self.flags.contains(ListFlag::Unsorted) || self.order.is_some() {
            return;
        }

        let mut order: Vec<usize> = (0..self.len()).collect();
        order.sort_by(|&a, &b| self.names[a].as_bytes().cmp(self.names[b].as_bytes()));
        self.order = Some(order);
    }

    /// 将列表写入`buf`，返回写入的字节数（包括结尾的NUL）
    ///
    /// 只写入完整的行，并总是为NUL留出一个字节；
    /// 返回值小于[`Self::required_len`]说明输出被截断。
    pub fn render(&mut self, buf: &mut [u8]) -> usize {
        self.sort();

        let Some(room) = buf.len().checked_sub(1) else {
            return 0;
        };

        let mut ptr = 0;
        let mut line = String::with_capacity(NAME_COLUMN * 2);
        for i in self.positions() {
            self.format_line(i, &mut line);
            let end = ptr + line.len();
            if end > room {
                log::debug!("listing truncated at entry {i}, capacity {}", buf.len());
                break;
            }
            buf[ptr..end].copy_from_slice(line.as_bytes());
            ptr = end;
        }

        buf[ptr] = SENTINEL;
        ptr + 1
    }

    /// 不截断时[`Self::render`]需要的缓冲区大小
    pub fn required_len(&self) -> usize {
        let mut line = String::new();
        self.positions()
            .map(|i| {
                self.format_line(i, &mut line);
                line.len()
            })
            .sum::<usize>()
            + 1
    }

    /// 依次给出需要显示的条目下标
    fn positions(&self) -> impl Iterator<Item = usize> + '_ {
        let order = self
            .order
            .as_deref()
            .filter(|_| !self.flags.contains(ListFlag::Unsorted));
        let all = self.flags.contains(ListFlag::All);

        (0..self.len())
            .map(move |i| order.map_or(i, |order| order[i]))
            .filter(move |&i| all || self.names[i].as_bytes().first() != Some(&HIDDEN_MARKER))
    }

    fn format_line(&self, i: usize, line: &mut String) {
        let long = self.flags.contains(ListFlag::Long);
        let kind = self.kinds[i];

        line.clear();
        if long {
            line.push_str(match kind {
                DirEntryType::Regular => "[F]  ",
                DirEntryType::Directory => "[D]  ",
            });
        }
        line.push_str(&self.names[i]);

        // 名称过长时不补齐
        for _ in line.len()..NAME_COLUMN {
            line.push(' ');
        }

        if long && kind == DirEntryType::Regular {
            line.push(' ');
            line.push_str(&self.sizes[i].to_string());
        }
        line.push('\n');
    }
}
