use alloc::sync::Arc;

use block_dev::BlockDevice;
use enumflags2::BitFlags;
use vfs::Error;

use crate::builder::{self, BuildError, Scan, ScanWarning};
use crate::file::TarFile;
use crate::listing::{DirectoryListing, ListFlag};
use crate::tree::{NodeRef, Tree};

/// 挂载好的TAR文件系统
///
/// 树在[`TarFileSystem::mount`]中一次建成，此后只读，可被多个调用者同时访问。
#[derive(Debug)]
pub struct TarFileSystem {
    /// 底层块设备的引用
    dev: Arc<dyn BlockDevice>,
    tree: Tree,
    warning: Option<ScanWarning>,
}

impl TarFileSystem {
    /// 扫描整个设备并建立文件系统树
    ///
    /// 损坏的头部只会让扫描提前停止，结果见[`TarFileSystem::warning`]；
    /// 路径类型冲突则使挂载失败。
    pub fn mount(dev: &Arc<dyn BlockDevice>) -> Result<Self, BuildError> {
        let Scan { tree, warning } = builder::build(dev.as_ref())?;
        log::info!(
            "mounted tar archive: {} nodes over {} blocks",
            tree.len(),
            dev.num_blocks()
        );

        Ok(Self {
            dev: Arc::clone(dev),
            tree,
            warning,
        })
    }

    #[inline]
    pub fn root(&self) -> NodeRef<'_> {
        self.tree.root()
    }

    #[inline]
    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    /// 扫描提前停止的原因
    #[inline]
    pub fn warning(&self) -> Option<&ScanWarning> {
        self.warning.as_ref()
    }

    /// 从根目录开始解析路径，`/`即根目录
    pub fn lookup(&self, path: &str) -> Result<NodeRef<'_>, Error> {
        self.root().find(path)
    }

    pub fn open(&self, path: &str) -> Result<TarFile, Error> {
        self.lookup(path).and_then(|node| self.open_node(node))
    }

    pub fn open_node(&self, node: NodeRef<'_>) -> Result<TarFile, Error> {
        if node.is_dir() {
            return Err(Error::IsADirectory);
        }
        Ok(TarFile::new(Arc::clone(&self.dev), node.extent()))
    }

    /// 拍下目录的子节点快照
    pub fn list_dir(
        &self,
        path: &str,
        flags: BitFlags<ListFlag>,
    ) -> Result<DirectoryListing, Error> {
        let dir = self.lookup(path)?;
        if !dir.is_dir() {
            return Err(Error::NotADirectory);
        }
        Ok(DirectoryListing::snapshot(dir, flags))
    }

    /// 归档是只读的，创建目录总是失败，树保持不变
    pub fn mkdir(&self, path: &str) -> Result<(), Error> {
        let path = path.trim_end_matches('/');
        let (parent, name) = path.rsplit_once('/').unwrap_or(("", path));
        if name.is_empty() {
            return Err(Error::AlreadyExists);
        }

        match self.lookup(parent)?.resolve_child(name) {
            Ok(_) => Err(Error::AlreadyExists),
            Err(Error::NotFound) => {
                log::warn!("mkdir {path:?}: tar archives are read-only");
                Err(Error::Unsupported)
            }
            Err(err) => Err(err),
        }
    }
}
