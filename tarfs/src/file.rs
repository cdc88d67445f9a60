//! 文件内容的随机读写
//!
//! 文件的内容在归档中是连续的，按文件内偏移加上内容起点换算出块号与块内偏移。

use alloc::sync::Arc;
use core::ops::Range;

use block_dev::{BLOCK_SIZE, BlockDevice};
use vfs::{DirEntryType, Error, Stat};

use crate::tree::Extent;

/// 已打开的文件
#[derive(Debug, Clone)]
pub struct TarFile {
    dev: Arc<dyn BlockDevice>,
    extent: Extent,
}

impl TarFile {
    pub(crate) fn new(dev: Arc<dyn BlockDevice>, extent: Extent) -> Self {
        Self { dev, extent }
    }

    #[inline]
    pub fn size(&self) -> u64 {
        self.extent.len
    }

    pub fn stat(&self) -> Stat {
        Stat {
            mode: DirEntryType::Regular,
            block_size: BLOCK_SIZE as u64,
            blocks: self.extent.len.div_ceil(BLOCK_SIZE as u64),
            size: self.extent.len,
        }
    }

    /// 从`offset`处读取至多`buf.len()`字节，返回实际读取的字节数
    ///
    /// 超出文件末尾的部分不读取，`offset`不小于文件大小时返回0。
    pub fn pread(&self, buf: &mut [u8], offset: u64) -> usize {
        let start = offset;
        let end = offset.saturating_add(buf.len() as u64).min(self.extent.len); // exclusive

        if start >= end {
            return 0;
        }

        let mut block = [0u8; BLOCK_SIZE];
        let mut read_size = 0;
        for (block_id, range) in self.spans(start..end) {
            log::trace!("read block {block_id} {range:?}");
            let block_read_size = range.len();
            self.dev.read_block(block_id, &mut block);
            buf[read_size..read_size + block_read_size].copy_from_slice(&block[range]);
            read_size += block_read_size;
        }

        read_size
    }

    /// 原地覆写`offset`处的内容
    ///
    /// 归档的布局是固定的，写入范围超出文件末尾时返回[`Error::Unsupported`]，
    /// 且不会写入任何块。
    pub fn pwrite(&self, buf: &[u8], offset: u64) -> Result<usize, Error> {
        let start = offset;
        let end = offset
            .checked_add(buf.len() as u64)
            .filter(|&end| end <= self.extent.len)
            .ok_or(Error::Unsupported)?;
        if start == end {
            return Ok(0);
        }

        let mut block = [0u8; BLOCK_SIZE];
        let mut wrote_size = 0;
        for (block_id, range) in self.spans(start..end) {
            log::trace!("write block {block_id} {range:?}");
            let block_write_size = range.len();
            // 部分覆盖的块需要保留其余的字节
            if block_write_size < BLOCK_SIZE {
                self.dev.read_block(block_id, &mut block);
            }
            block[range].copy_from_slice(&buf[wrote_size..wrote_size + block_write_size]);
            self.dev.write_block(block_id, &block);
            wrote_size += block_write_size;
        }

        Ok(wrote_size)
    }

    /// 将文件内的字节范围切分为`(块号, 块内范围)`
    fn spans(&self, range: Range<u64>) -> impl Iterator<Item = (usize, Range<usize>)> + use<> {
        let bs = BLOCK_SIZE as u64;
        let start = self.extent.start + range.start;
        let end = self.extent.start + range.end;

        (start / bs..end.div_ceil(bs)).map(move |block_id| {
            let base = block_id * bs;
            let lo = (start.max(base) - base) as usize;
            let hi = (end.min(base + bs) - base) as usize;
            (block_id as usize, lo..hi)
        })
    }
}
