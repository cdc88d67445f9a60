//! # 句柄表
//!
//! 系统调用层通过句柄访问已打开的文件与目录列表。
//! 句柄是槽位的下标，关闭后的槽位会被优先复用。

use alloc::vec::Vec;

use enumflags2::BitFlags;
use spin::Mutex;
use vfs::Error;

use crate::file::TarFile;
use crate::fs::TarFileSystem;
use crate::listing::{DirectoryListing, ListFlag};

#[derive(Debug)]
enum Object {
    File {
        file: TarFile,
        /// 顺序读取的位置
        offset: u64,
    },
    Directory {
        listing: DirectoryListing,
        /// 列表只被整体读取一次，之后的读取返回0
        consumed: bool,
    },
}

#[derive(Debug, Default)]
pub struct ObjectTable {
    slots: Mutex<Vec<Option<Object>>>,
}

impl ObjectTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// 打开文件，返回句柄
    pub fn open(&self, fs: &TarFileSystem, path: &str) -> Result<usize, Error> {
        let file = fs.open(path)?;
        Ok(self.insert(Object::File { file, offset: 0 }))
    }

    /// 拍下目录快照，返回句柄
    ///
    /// 首次读取句柄得到渲染后的整个列表（以NUL结尾，可能被截断），
    /// 此后的读取返回0。
    pub fn listdir(
        &self,
        fs: &TarFileSystem,
        path: &str,
        flags: BitFlags<ListFlag>,
    ) -> Result<usize, Error> {
        let listing = fs.list_dir(path, flags)?;
        Ok(self.insert(Object::Directory {
            listing,
            consumed: false,
        }))
    }

    pub fn read(&self, handle: usize, buf: &mut [u8]) -> Result<usize, Error> {
        self.with(handle, |object| match object {
            Object::File { file, offset } => {
                let read_size = file.pread(buf, *offset);
                *offset += read_size as u64;
                Ok(read_size)
            }
            Object::Directory { consumed: true, .. } => Ok(0),
            Object::Directory { listing, consumed } => {
                let read_size = listing.render(buf);
                *consumed = read_size > 0;
                Ok(read_size)
            }
        })
    }

    pub fn pread(&self, handle: usize, buf: &mut [u8], offset: u64) -> Result<usize, Error> {
        self.with(handle, |object| match object {
            Object::File { file, .. } => Ok(file.pread(buf, offset)),
            Object::Directory { .. } => Err(Error::Unsupported),
        })
    }

    pub fn pwrite(&self, handle: usize, buf: &[u8], offset: u64) -> Result<usize, Error> {
        self.with(handle, |object| match object {
            Object::File { file, .. } => file.pwrite(buf, offset),
            Object::Directory { .. } => Err(Error::Unsupported),
        })
    }

    /// 关闭句柄，释放其对应的对象
    pub fn close(&self, handle: usize) -> Result<(), Error> {
        self.slots
            .lock()
            .get_mut(handle)
            .and_then(Option::take)
            .map(drop)
            .ok_or(Error::BadHandle)
    }

    /// 插入新对象至空槽位，并返回槽位的索引
    fn insert(&self, object: Object) -> usize {
        let mut slots = self.slots.lock();
        let index = slots.iter().position(Option::is_none).unwrap_or_else(|| {
            slots.push(None);
            slots.len() - 1
        });
        slots[index] = Some(object);
        index
    }

    fn with<T>(
        &self,
        handle: usize,
        f: impl FnOnce(&mut Object) -> Result<T, Error>,
    ) -> Result<T, Error> {
        let mut slots = self.slots.lock();
        let object = slots
            .get_mut(handle)
            .and_then(Option::as_mut)
            .ok_or(Error::BadHandle)?;
        f(object)
    }
}
