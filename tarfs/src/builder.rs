//! 挂载时扫描归档，建立文件系统树
//!
//! 游标从第0块开始，每次读入一个头部块，
//! 跳过头部与其内容块后继续，直到遇到结束标志或设备末尾。

use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use block_dev::{BLOCK_SIZE, BlockDevice};
use derive_more::Display;

use crate::header::{self, ArchiveHeader, DecodeError, EntryType};
use crate::tree::{Extent, NodeBody, NodeId, Tree};

/// 结构错误：路径与已有节点的类型冲突，归档被视为损坏
#[derive(Debug, Display, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[display(fmt = "{}: a path component is not a directory", path)]
    NotADirectory { path: String },
    #[display(fmt = "{}: an existing directory has the same path", path)]
    IsADirectory { path: String },
}

impl core::error::Error for BuildError {}

/// 扫描提前停止的原因，已解析的部分仍然有效
#[derive(Debug, Display, Clone, PartialEq, Eq)]
pub enum ScanWarning {
    #[display(fmt = "stopped at block {}: {}", block, error)]
    Decode { block: usize, error: DecodeError },
    #[display(fmt = "stopped at block {}: entry runs past the end of the device", block)]
    Truncated { block: usize },
}

#[derive(Debug)]
pub(crate) struct Scan {
    pub tree: Tree,
    pub warning: Option<ScanWarning>,
}

pub(crate) fn build(dev: &dyn BlockDevice) -> Result<Scan, BuildError> {
    let mut builder = Builder {
        dev,
        tree: Tree::new(),
        cursor: 0,
        long_name: None,
    };
    let warning = builder.scan()?;

    Ok(Scan {
        tree: builder.tree,
        warning,
    })
}

struct Builder<'a> {
    dev: &'a dyn BlockDevice,
    tree: Tree,
    /// 下一个头部块的块号
    cursor: usize,
    /// GNU长路径或pax的`path`记录，作用于紧随其后的条目
    long_name: Option<String>,
}

impl Builder<'_> {
    fn scan(&mut self) -> Result<Option<ScanWarning>, BuildError> {
        let total = self.dev.num_blocks();
        let mut block = [0u8; BLOCK_SIZE];

        while self.cursor < total {
            let at = self.cursor;
            self.dev.read_block(at, &mut block);

            let header = match header::decode(&block) {
                Ok(Some(header)) => header,
                Ok(None) => {
                    log::debug!("end of archive at block {at}");
                    return Ok(None);
                }
                Err(error) => return Ok(Some(self.stop(ScanWarning::Decode { block: at, error }))),
            };

            // 内容不能越过设备末尾
            let Some(next) = usize::try_from(header.content_blocks())
                .ok()
                .and_then(|n| (at + 1).checked_add(n))
                .filter(|&next| next <= total)
            else {
                return Ok(Some(self.stop(ScanWarning::Truncated { block: at })));
            };

            match header.ty {
                EntryType::LongName | EntryType::PaxExtended => {
                    let content = self.read_content(at + 1, header.content_len);
                    let path = if header.ty == EntryType::LongName {
                        header::gnu_long_name(&content).map(Some)
                    } else {
                        header::pax_path(&content)
                    };
                    match path {
                        Ok(Some(path)) => self.long_name = Some(path),
                        Ok(None) => {}
                        Err(error) => {
                            return Ok(Some(self.stop(ScanWarning::Decode { block: at, error })));
                        }
                    }
                }
                EntryType::PaxGlobal => log::debug!("skip pax global header at block {at}"),
                _ => self.register(header, at + 1)?,
            }

            self.cursor = next;
        }

        Ok(None)
    }

    fn stop(&self, warning: ScanWarning) -> ScanWarning {
        log::warn!("{warning}, keeping {} nodes", self.tree.len());
        warning
    }

    /// 读出元数据条目的内容，调用者已确认其不越过设备末尾
    fn read_content(&self, start: usize, len: u64) -> Vec<u8> {
        let mut data = vec![0u8; len as usize];
        let mut block = [0u8; BLOCK_SIZE];
        for (i, chunk) in data.chunks_mut(BLOCK_SIZE).enumerate() {
            self.dev.read_block(start + i, &mut block);
            chunk.copy_from_slice(&block[..chunk.len()]);
        }
        data
    }

    /// 将一个条目插入树中，`data_block`为其首个内容块
    fn register(&mut self, header: ArchiveHeader, data_block: usize) -> Result<(), BuildError> {
        let ArchiveHeader {
            path,
            size,
            ty,
            link,
            ..
        } = header;
        let path = self.long_name.take().unwrap_or(path);
        let ty = if path.ends_with('/') {
            EntryType::Directory
        } else {
            ty
        };

        // 设备文件、管道等不进入树，也不创建其路径上的目录
        if !matches!(
            ty,
            EntryType::Regular | EntryType::Directory | EntryType::Link
        ) {
            log::debug!("skip entry {path:?} of type {ty:?}");
            return Ok(());
        }

        let mut cmps = path.split('/').filter(|cmp| !cmp.is_empty() && *cmp != ".");
        let Some(basename) = cmps.next_back() else {
            log::debug!("skip entry {path:?} naming the root");
            return Ok(());
        };

        let mut parent = NodeId::ROOT;
        for cmp in cmps {
            parent = self.directory(parent, cmp, &path)?;
        }

        match ty {
            EntryType::Directory => {
                self.directory(parent, basename, &path)?;
            }
            _ => match self.tree.child_of(parent, basename) {
                Some(id) if self.is_dir(id) => {
                    return Err(BuildError::IsADirectory { path });
                }
                Some(_) => log::warn!("duplicate entry {path:?}, keeping the first one"),
                None => {
                    let extent = Extent {
                        start: (data_block * BLOCK_SIZE) as u64,
                        len: size,
                    };
                    log::debug!("file {path:?} at {:#x}, {size} bytes", extent.start);
                    self.tree
                        .insert(parent, basename, NodeBody::File { extent, link });
                }
            },
        }

        Ok(())
    }

    /// 查找或创建目录，同一路径总是得到同一个节点
    fn directory(&mut self, parent: NodeId, name: &str, path: &str) -> Result<NodeId, BuildError> {
        match self.tree.child_of(parent, name) {
            Some(id) if self.is_dir(id) => Ok(id),
            Some(_) => Err(BuildError::NotADirectory {
                path: String::from(path),
            }),
            None => {
                log::debug!("directory {name:?} under {parent:?}");
                Ok(self.tree.insert(
                    parent,
                    name,
                    NodeBody::Directory {
                        children: Vec::new(),
                    },
                ))
            }
        }
    }

    fn is_dir(&self, id: NodeId) -> bool {
        self.tree.get(id).is_some_and(|node| node.is_dir())
    }
}
