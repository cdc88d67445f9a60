//! 归档头部的解码
//!
//! 归档由512字节的记录组成：每个条目是一个头部块，
//! 其后跟随`ceil(size / 512)`个内容块；全零的块标志着归档结束。
//!
//! 头部中的数字字段是以空格或NUL填充的八进制文本。

use alloc::format;
use alloc::string::String;
use core::{mem, str};

use block_dev::BLOCK_SIZE;
use derive_more::Display;

/// ustar 头部，恰好占据一个块
#[derive(Debug, Clone)]
#[repr(C)]
pub struct TarHeader {
    /// 路径，NUL结尾或空格填充
    name: [u8; 100],

    _mode: [u8; 8],

    _uid: [u8; 8],

    _gid: [u8; 8],

    /// 内容的字节数
    size: [u8; 12],

    _mtime: [u8; 12],

    /// 整个头部的字节和，计算时本字段视作8个空格
    chksum: [u8; 8],

    /// 条目类型标识
    typeflag: u8,

    /// 链接目标
    linkname: [u8; 100],

    /// POSIX为`"ustar\0"`，GNU为`"ustar "`
    magic: [u8; 6],

    /// POSIX为`"00"`，GNU为`" \0"`
    version: [u8; 2],

    _uname: [u8; 32],

    _gname: [u8; 32],

    _devmajor: [u8; 8],

    _devminor: [u8; 8],

    /// 路径前缀，只在POSIX ustar格式中有效；GNU格式在此存放访问时间等
    prefix: [u8; 155],

    _pad: [u8; 12],
}

const _: () = assert!(mem::size_of::<TarHeader>() == BLOCK_SIZE);

/// 校验和字段在头部中的位置
const CHKSUM_RANGE: core::ops::Range<usize> = 148..156;

impl TarHeader {
    pub fn from_block(raw: &[u8; BLOCK_SIZE]) -> &Self {
        // SAFETY: 头部全部由字节数组组成，对齐为1，大小与块相同
        unsafe { &*raw.as_ptr().cast::<Self>() }
    }

    fn is_ustar(&self) -> bool {
        self.magic == *b"ustar\0" && self.version == *b"00"
    }

    fn verify_checksum(&self, raw: &[u8; BLOCK_SIZE]) -> Result<(), DecodeError> {
        let stored = parse_octal(&self.chksum).ok_or(DecodeError::Octal(Field::Checksum))?;

        let (mut unsigned, mut signed) = (0u64, 0i64);
        for (i, &b) in raw.iter().enumerate() {
            let b = if CHKSUM_RANGE.contains(&i) { b' ' } else { b };
            unsigned += u64::from(b);
            signed += i64::from(b as i8);
        }

        // 早期的实现按有符号字节求和
        if stored == unsigned || i64::try_from(stored) == Ok(signed) {
            Ok(())
        } else {
            Err(DecodeError::Checksum {
                stored,
                computed: unsigned,
            })
        }
    }

    fn path(&self) -> Result<String, DecodeError> {
        let name = text(&self.name, Field::Path)?;
        let prefix = if self.is_ustar() {
            text(&self.prefix, Field::Path)?
        } else {
            ""
        };

        Ok(if prefix.is_empty() {
            String::from(name)
        } else {
            format!("{}/{name}", prefix.trim_end_matches('/'))
        })
    }
}

/// 解码后的头部
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveHeader {
    pub path: String,
    /// 内容的字节数，目录恒为0
    pub size: u64,
    pub ty: EntryType,
    pub link: Option<String>,
    /// 头部之后实际跟随的内容字节数，即头部中记录的原始大小
    ///
    /// 带内容的目录条目（如GNU的dumpdir）也要跳过这些块。
    pub content_len: u64,
}

impl ArchiveHeader {
    /// 内容占据的块数
    pub fn content_blocks(&self) -> u64 {
        self.content_len.div_ceil(BLOCK_SIZE as u64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryType {
    Regular,
    Directory,
    /// 硬链接或符号链接，只记录目标
    Link,
    /// GNU扩展：内容是下一个条目的完整路径
    LongName,
    /// pax扩展头部，其`path`记录作用于下一个条目
    PaxExtended,
    /// pax全局头部，作用于其后所有条目
    PaxGlobal,
    /// 设备文件、管道等
    Other(u8),
}

impl EntryType {
    /// 描述其他条目的元数据记录，本身不对应树中的节点
    pub fn is_metadata(self) -> bool {
        matches!(self, Self::LongName | Self::PaxExtended | Self::PaxGlobal)
    }
}

impl From<u8> for EntryType {
    fn from(flag: u8) -> Self {
        match flag {
            b'0' | b'\0' | b'7' => Self::Regular,
            b'5' | b'D' => Self::Directory,
            b'1' | b'2' => Self::Link,
            b'L' => Self::LongName,
            b'x' => Self::PaxExtended,
            b'g' => Self::PaxGlobal,
            other => Self::Other(other),
        }
    }
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    #[display(fmt = "path")]
    Path,
    #[display(fmt = "size")]
    Size,
    #[display(fmt = "checksum")]
    Checksum,
    #[display(fmt = "link")]
    Link,
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[display(fmt = "malformed octal number in {} field", _0)]
    Octal(Field),
    #[display(fmt = "checksum mismatch: stored {:#o}, computed {:#o}", stored, computed)]
    Checksum { stored: u64, computed: u64 },
    #[display(fmt = "{} field is not valid UTF-8", _0)]
    Utf8(Field),
    #[display(fmt = "empty path")]
    EmptyPath,
    #[display(fmt = "malformed pax extended header")]
    Pax,
}

impl core::error::Error for DecodeError {}

/// 解码一个头部块
///
/// 全零的块是归档结束的标志，返回`Ok(None)`。
pub fn decode(raw: &[u8; BLOCK_SIZE]) -> Result<Option<ArchiveHeader>, DecodeError> {
    if raw.iter().all(|&b| b == 0) {
        return Ok(None);
    }

    let header = TarHeader::from_block(raw);
    header.verify_checksum(raw)?;

    let size = parse_octal(&header.size).ok_or(DecodeError::Octal(Field::Size))?;
    let path = header.path()?;
    if path.is_empty() {
        return Err(DecodeError::EmptyPath);
    }

    // 归档工具对目录的标识并不统一，以`/`结尾的路径一律视为目录
    let ty = match EntryType::from(header.typeflag) {
        ty if ty.is_metadata() => ty,
        _ if path.ends_with('/') => EntryType::Directory,
        ty => ty,
    };

    let link = text(&header.linkname, Field::Link)?;
    let link = (!link.is_empty()).then(|| String::from(link));

    Ok(Some(ArchiveHeader {
        path,
        size: if ty == EntryType::Directory { 0 } else { size },
        ty,
        link,
        content_len: size,
    }))
}

/// 截断到首个NUL，并去掉末尾的空格填充
fn text(field: &[u8], which: Field) -> Result<&str, DecodeError> {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    let end = field[..end]
        .iter()
        .rposition(|&b| b != b' ')
        .map_or(0, |last| last + 1);
    str::from_utf8(&field[..end]).map_err(|_| DecodeError::Utf8(which))
}

/// GNU长路径条目的内容：以NUL结尾的路径
pub fn gnu_long_name(content: &[u8]) -> Result<String, DecodeError> {
    let end = content.iter().position(|&b| b == 0).unwrap_or(content.len());
    str::from_utf8(&content[..end])
        .map(String::from)
        .map_err(|_| DecodeError::Utf8(Field::Path))
}

/// 从pax扩展头部的内容中取出`path`记录
///
/// 每条记录形如`"<长度> <键>=<值>\n"`，长度为整条记录的字节数。
/// 其余的键被忽略。
pub fn pax_path(content: &[u8]) -> Result<Option<String>, DecodeError> {
    let mut path = None;
    let mut rest = content;

    while rest.first().is_some_and(|&b| b != 0) {
        let space = rest
            .iter()
            .position(|&b| b == b' ')
            .ok_or(DecodeError::Pax)?;
        let len = str::from_utf8(&rest[..space])
            .ok()
            .and_then(|len| len.parse::<usize>().ok())
            .filter(|&len| len > space + 1 && len <= rest.len())
            .ok_or(DecodeError::Pax)?;

        let record = rest[space + 1..len]
            .strip_suffix(b"\n")
            .ok_or(DecodeError::Pax)?;
        if let Some(value) = record.strip_prefix(b"path=") {
            let value = str::from_utf8(value).map_err(|_| DecodeError::Utf8(Field::Path))?;
            path = Some(String::from(value));
        }

        rest = &rest[len..];
    }

    Ok(path)
}

/// 解析八进制文本：可有前导空格，数字之后只允许空格或NUL
///
/// 全为填充的字段解析为0；非法字符或溢出返回`None`。
pub fn parse_octal(field: &[u8]) -> Option<u64> {
    let start = field
        .iter()
        .position(|&b| b != b' ')
        .unwrap_or(field.len());
    let field = &field[start..];
    let end = field
        .iter()
        .position(|b| !matches!(b, b'0'..=b'7'))
        .unwrap_or(field.len());
    let (digits, rest) = field.split_at(end);

    if !rest.iter().all(|&b| b == b' ' || b == 0) {
        return None;
    }

    digits.iter().try_fold(0u64, |acc, &d| {
        acc.checked_mul(8)?.checked_add(u64::from(d - b'0'))
    })
}

#[cfg(test)]
mod tests {
    use alloc::string::String;

    use super::*;

    fn seal(block: &mut [u8; BLOCK_SIZE]) {
        block[CHKSUM_RANGE].fill(b' ');
        let sum: u32 = block.iter().map(|&b| u32::from(b)).sum();
        let text = format!("{sum:06o}\0 ");
        block[CHKSUM_RANGE].copy_from_slice(text.as_bytes());
    }

    fn record(name: &[u8], size: &[u8], typeflag: u8) -> [u8; BLOCK_SIZE] {
        let mut block = [0u8; BLOCK_SIZE];
        block[..name.len()].copy_from_slice(name);
        block[124..124 + size.len()].copy_from_slice(size);
        block[156] = typeflag;
        block[257..263].copy_from_slice(b"ustar\0");
        block[263..265].copy_from_slice(b"00");
        seal(&mut block);
        block
    }

    #[test]
    fn octal_padding() {
        assert_eq!(Some(42), parse_octal(b"00000000052\0"));
        assert_eq!(Some(42), parse_octal(b"     52 \0\0\0\0"));
        assert_eq!(Some(7), parse_octal(b"7           "));
        assert_eq!(Some(0), parse_octal(b"\0\0\0\0\0\0\0\0"));
        assert_eq!(Some(0), parse_octal(b"        "));
    }

    #[test]
    fn octal_rejects_garbage() {
        assert_eq!(None, parse_octal(b"00000000058\0"));
        assert_eq!(None, parse_octal(b"0000000009\0\0"));
        assert_eq!(None, parse_octal(b"12 3"));
        assert_eq!(None, parse_octal(b"0x1f\0\0\0\0"));
        assert_eq!(None, parse_octal(b"7777777777777777777777777"));
    }

    #[test]
    fn zero_block_is_end() {
        assert_eq!(Ok(None), decode(&[0; BLOCK_SIZE]));
    }

    #[test]
    fn regular_file() {
        let block = record(b"docs/a.txt", b"00000000052\0", b'0');
        let header = decode(&block).unwrap().unwrap();
        assert_eq!("docs/a.txt", header.path);
        assert_eq!(42, header.size);
        assert_eq!(EntryType::Regular, header.ty);
        assert_eq!(None, header.link);
        assert_eq!(1, header.content_blocks());
    }

    #[test]
    fn space_padded_path() {
        let mut name = [b' '; 100];
        name[..6].copy_from_slice(b"readme");
        let block = record(&name, b"00000000001\0", b'\0');
        let header = decode(&block).unwrap().unwrap();
        assert_eq!("readme", header.path);
        assert_eq!(EntryType::Regular, header.ty);
    }

    #[test]
    fn trailing_slash_is_directory() {
        let block = record(b"dir1/", b"00000001000\0", b'0');
        let header = decode(&block).unwrap().unwrap();
        assert_eq!(EntryType::Directory, header.ty);
        assert_eq!(0, header.size);
        // 内容块仍然要被跳过
        assert_eq!(512, header.content_len);
        assert_eq!(1, header.content_blocks());
    }

    #[test]
    fn gnu_dumpdir_is_directory() {
        let block = record(b"odd", b"00000000014\0", b'D');
        let header = decode(&block).unwrap().unwrap();
        assert_eq!(EntryType::Directory, header.ty);
        assert_eq!(0, header.size);
        assert_eq!(1, header.content_blocks());
    }

    #[test]
    fn metadata_keeps_its_type() {
        let block = record(b"dir1/PaxHeaders/", b"00000000030\0", b'x');
        let header = decode(&block).unwrap().unwrap();
        assert_eq!(EntryType::PaxExtended, header.ty);
        assert_eq!(24, header.size);
        assert_eq!(EntryType::PaxGlobal, EntryType::from(b'g'));
    }

    #[test]
    fn bad_size_field() {
        let block = record(b"broken", b"0000000009x\0", b'0');
        assert_eq!(Err(DecodeError::Octal(Field::Size)), decode(&block));
    }

    #[test]
    fn bad_checksum() {
        let mut block = record(b"a.txt", b"00000000003\0", b'0');
        block[0] = b'b';
        assert!(matches!(decode(&block), Err(DecodeError::Checksum { .. })));
    }

    #[test]
    fn ustar_prefix() {
        let mut block = record(b"leaf.txt", b"00000000000\0", b'0');
        block[345..345 + 9].copy_from_slice(b"very/deep");
        seal(&mut block);
        let header = decode(&block).unwrap().unwrap();
        assert_eq!("very/deep/leaf.txt", header.path);
    }

    #[test]
    fn gnu_header_has_no_prefix() {
        let mut block = record(b"dir1/file1.txt", b"00000000007\0", b'0');
        block[257..265].copy_from_slice(b"ustar  \0");
        // GNU格式在前缀的位置存放atime与ctime
        block[345..357].copy_from_slice(b"15264767226\0");
        block[357..369].copy_from_slice(b"15264767226\0");
        seal(&mut block);
        let header = decode(&block).unwrap().unwrap();
        assert_eq!("dir1/file1.txt", header.path);
    }

    #[test]
    fn only_spaces_are_padding() {
        let block = record(b"tab\t  ", b"00000000000\0", b'0');
        assert_eq!("tab\t", decode(&block).unwrap().unwrap().path);

        let block = record(b"line\n", b"00000000000\0", b'0');
        assert_eq!("line\n", decode(&block).unwrap().unwrap().path);
    }

    #[test]
    fn long_name_content() {
        assert_eq!(Ok(String::from("a/b")), gnu_long_name(b"a/b\0\0\0"));
        assert_eq!(Ok(String::from("a/b")), gnu_long_name(b"a/b"));
        assert_eq!(Err(DecodeError::Utf8(Field::Path)), gnu_long_name(b"\xff\0"));
    }

    #[test]
    fn pax_records() {
        let content = b"30 mtime=1749546981.123456789\n19 path=dir1/file1\n";
        assert_eq!(Ok(Some(String::from("dir1/file1"))), pax_path(content));

        assert_eq!(Ok(None), pax_path(b"14 uname=root\n\0\0"));
        assert_eq!(Ok(None), pax_path(b""));
    }

    #[test]
    fn pax_rejects_bad_lengths() {
        assert_eq!(Err(DecodeError::Pax), pax_path(b"99 path=a\n"));
        assert_eq!(Err(DecodeError::Pax), pax_path(b"x path=a\n"));
        assert_eq!(Err(DecodeError::Pax), pax_path(b"9 path=ab\n"));
        assert_eq!(Err(DecodeError::Pax), pax_path(b"path=a"));
    }

    #[test]
    fn symlink_target() {
        let mut block = record(b"latest", b"00000000000\0", b'2');
        block[157..157 + 9].copy_from_slice(b"v1/a.bin\0");
        seal(&mut block);
        let header = decode(&block).unwrap().unwrap();
        assert_eq!(EntryType::Link, header.ty);
        assert_eq!(Some(String::from("v1/a.bin")), header.link);
    }

    #[test]
    fn non_utf8_path() {
        let block = record(b"bad\xff", b"00000000000\0", b'0');
        assert_eq!(Err(DecodeError::Utf8(Field::Path)), decode(&block));
    }
}
