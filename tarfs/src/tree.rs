//! 内存中的文件系统树
//!
//! 所有节点存放在一个数组中，子节点由父节点按插入顺序持有，
//! 父节点只以下标反向引用，不存在所有权的环。
//! 树在挂载时一次建成，此后不再改变。

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use block_dev::BLOCK_SIZE;
use derive_more::{From, Into};
use vfs::{DirEntry, DirEntryType, Error, Stat};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, From, Into)]
#[repr(transparent)]
pub struct NodeId(usize);

impl NodeId {
    /// 根目录总是第一个节点
    pub const ROOT: Self = Self(0);
}

/// 文件内容在块设备上的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Extent {
    /// 首个内容块的字节偏移
    pub start: u64,
    /// 内容的字节数
    pub len: u64,
}

#[derive(Debug)]
pub(crate) enum NodeBody {
    File {
        extent: Extent,
        link: Option<String>,
    },
    Directory {
        children: Vec<NodeId>,
    },
}

#[derive(Debug)]
struct Node {
    /// 路径的最后一段，根目录为空
    name: String,
    parent: Option<NodeId>,
    body: NodeBody,
}

#[derive(Debug)]
pub struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    pub(crate) fn new() -> Self {
        Self {
            nodes: alloc::vec![Node {
                name: String::new(),
                parent: None,
                body: NodeBody::Directory {
                    children: Vec::new(),
                },
            }],
        }
    }

    #[inline]
    pub fn root(&self) -> NodeRef<'_> {
        NodeRef {
            tree: self,
            id: NodeId::ROOT,
        }
    }

    pub fn get(&self, id: NodeId) -> Option<NodeRef<'_>> {
        (id.0 < self.nodes.len()).then_some(NodeRef { tree: self, id })
    }

    /// 节点总数，包括根目录
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.root().child_count() == 0
    }

    /// 在目录`parent`下追加节点
    ///
    /// 调用者保证`parent`是目录，且其中没有同名节点。
    pub(crate) fn insert(&mut self, parent: NodeId, name: &str, body: NodeBody) -> NodeId {
        debug_assert!(self.child_of(parent, name).is_none());

        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            name: String::from(name),
            parent: Some(parent),
            body,
        });

        match &mut self.nodes[parent.0].body {
            NodeBody::Directory { children } => children.push(id),
            NodeBody::File { .. } => unreachable!("parent {parent:?} is a file"),
        }

        id
    }

    pub(crate) fn child_of(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.get(parent)?
            .resolve_child(name)
            .ok()
            .map(|child| child.id)
    }
}

/// 树中节点的只读引用，所有权始终在[`Tree`]中
#[derive(Clone, Copy)]
pub struct NodeRef<'a> {
    tree: &'a Tree,
    id: NodeId,
}

impl fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRef")
            .field("id", &self.id)
            .field("name", &self.name())
            .field("kind", &self.kind())
            .finish()
    }
}

impl<'a> NodeRef<'a> {
    #[inline]
    fn node(&self) -> &'a Node {
        &self.tree.nodes[self.id.0]
    }

    #[inline]
    pub fn id(&self) -> NodeId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &'a str {
        &self.node().name
    }

    pub fn kind(&self) -> DirEntryType {
        match self.node().body {
            NodeBody::File { .. } => DirEntryType::Regular,
            NodeBody::Directory { .. } => DirEntryType::Directory,
        }
    }

    #[inline]
    pub fn is_dir(&self) -> bool {
        self.kind() == DirEntryType::Directory
    }

    pub fn parent(&self) -> Option<NodeRef<'a>> {
        self.node().parent.map(|id| NodeRef {
            tree: self.tree,
            id,
        })
    }

    fn child_ids(&self) -> &'a [NodeId] {
        match &self.node().body {
            NodeBody::Directory { children } => children,
            NodeBody::File { .. } => &[],
        }
    }

    /// 目录
    ///
    /// 按插入顺序遍历子节点，文件没有子节点。
    pub fn children(&self) -> impl Iterator<Item = NodeRef<'a>> + use<'a> {
        let tree = self.tree;
        self.child_ids()
            .iter()
            .map(move |&id| NodeRef { tree, id })
    }

    #[inline]
    pub fn child_count(&self) -> usize {
        self.child_ids().len()
    }

    pub fn child(&self, index: usize) -> Option<NodeRef<'a>> {
        self.child_ids().get(index).map(|&id| NodeRef {
            tree: self.tree,
            id,
        })
    }

    /// 目录
    ///
    /// 按字节逐一比较名称，区分大小写，不做任何规范化。
    pub fn resolve_child(&self, name: &str) -> Result<NodeRef<'a>, Error> {
        if !self.is_dir() {
            return Err(Error::NotADirectory);
        }

        self.children()
            .find(|child| child.name().as_bytes() == name.as_bytes())
            .ok_or(Error::NotFound)
    }

    /// 目录
    ///
    /// # 参数
    ///
    /// `relat_path`: 相对于此节点的路径，忽略空段与`.`，不支持`..`。
    pub fn find(&self, relat_path: &str) -> Result<NodeRef<'a>, Error> {
        relat_path
            .split('/')
            .filter(|cmp| !cmp.is_empty() && *cmp != ".")
            .try_fold(*self, |node, cmp| node.resolve_child(cmp))
    }

    /// 文件内容的位置，目录为`(0, 0)`
    pub fn extent(&self) -> Extent {
        match self.node().body {
            NodeBody::File { extent, .. } => extent,
            NodeBody::Directory { .. } => Extent::default(),
        }
    }

    #[inline]
    pub fn size(&self) -> u64 {
        self.extent().len
    }

    /// 链接条目记录的目标路径
    pub fn link_target(&self) -> Option<&'a str> {
        match &self.node().body {
            NodeBody::File { link, .. } => link.as_deref(),
            NodeBody::Directory { .. } => None,
        }
    }

    pub fn stat(&self) -> Stat {
        let size = self.size();
        Stat {
            mode: self.kind(),
            block_size: BLOCK_SIZE as u64,
            blocks: size.div_ceil(BLOCK_SIZE as u64),
            size,
        }
    }

    pub fn dirent(&self) -> DirEntry {
        DirEntry {
            inode: self.id.0 as u64,
            ty: self.kind(),
            name: String::from(self.name()),
            size: self.size(),
        }
    }
}
