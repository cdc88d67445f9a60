use derive_more::Display;

/// 文件系统操作的失败原因
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[display(fmt = "file exists")]
    AlreadyExists,
    #[display(fmt = "no such file or directory")]
    NotFound,
    #[display(fmt = "is a directory")]
    IsADirectory,
    #[display(fmt = "not a directory")]
    NotADirectory,
    /// 文件系统不支持此操作，例如扩大只读归档中的文件
    #[display(fmt = "operation not supported")]
    Unsupported,
    /// 句柄未打开或已关闭
    #[display(fmt = "bad handle")]
    BadHandle,
}

impl core::error::Error for Error {}
