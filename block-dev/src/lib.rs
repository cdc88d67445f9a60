//! # 块设备接口层
//!
//! 块设备是以**块**为单位存储数据的设备，例如磁盘、光盘、U盘等；
//! [`BlockDevice`] 就是对读写块设备的抽象，
//! 实现了此特质的类型称为**块设备驱动**。
//!
//! 文件系统只通过块设备驱动读写块设备，块的大小固定为[`BLOCK_SIZE`]。

#![no_std]

use core::any::Any;
use core::fmt::Debug;

/// 块的字节数
pub const BLOCK_SIZE: usize = 512;

/// 块设备驱动特质
///
/// 每次调用都是同步的，驱动自行保证物理操作的串行化。
pub trait BlockDevice: Debug + Send + Sync + Any {
    /// 读取第`block_id`块，`buf`的长度为[`BLOCK_SIZE`]
    fn read_block(&self, block_id: usize, buf: &mut [u8]);

    /// 写入第`block_id`块，`buf`的长度为[`BLOCK_SIZE`]
    fn write_block(&self, block_id: usize, buf: &[u8]);

    /// 设备可寻址的块数，块号的合法范围为`0..num_blocks()`
    fn num_blocks(&self) -> usize;
}
