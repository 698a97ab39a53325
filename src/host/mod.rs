//! ホストのファイルサービス
//!
//! バインディングはファイルを所有せず、ホストが管理するハンドルを参照するだけ。
//! 読み書きは `HostFiles` を通して行う。

pub mod fs;
pub mod memory;

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::HostResult;

pub use fs::FsHost;
pub use memory::MemoryHost;

/// ホストが管理するファイルへの参照
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BoundFile {
    path: PathBuf,
}

impl BoundFile {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// ファイル名（拡張子付き）
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string()
    }

    /// 拡張子を除いたファイル名
    pub fn basename(&self) -> String {
        self.path
            .file_stem()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string()
    }

    /// 小文字の拡張子
    pub fn extension(&self) -> String {
        self.path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .unwrap_or_default()
    }

    pub fn display_path(&self) -> String {
        self.path.display().to_string()
    }
}

impl fmt::Display for BoundFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

/// 発行済みで完了していない書き込み
///
/// 一度発行した書き込みは取り消さない。完了を待つだけ。
pub trait PendingWrite {
    /// 完了していれば結果を返す
    fn poll(&mut self) -> Option<HostResult<()>>;

    /// 完了まで待つ
    fn wait(self: Box<Self>) -> HostResult<()>;
}

/// 書き込み要求の結果
pub enum WriteTicket {
    /// 呼び出し中に完了した
    Settled(HostResult<()>),
    /// I/O が継続中
    Pending(Box<dyn PendingWrite>),
}

impl WriteTicket {
    pub fn ok() -> Self {
        WriteTicket::Settled(Ok(()))
    }

    /// 完了まで待って結果を返す
    pub fn wait(self) -> HostResult<()> {
        match self {
            WriteTicket::Settled(result) => result,
            WriteTicket::Pending(pending) => pending.wait(),
        }
    }
}

impl fmt::Debug for WriteTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteTicket::Settled(result) => f.debug_tuple("Settled").field(result).finish(),
            WriteTicket::Pending(_) => f.write_str("Pending"),
        }
    }
}

/// ホストのファイル／内容サービス
pub trait HostFiles {
    /// ファイル内容を読み込み。`Ok(None)` はホストが何も返さなかったことを表す
    fn read(&self, file: &BoundFile) -> HostResult<Option<String>>;

    /// 内容を書き込み。成功を返した時点で永続化済みとみなす
    fn write(&self, file: &BoundFile, text: &str) -> WriteTicket;
}

impl<H: HostFiles + ?Sized> HostFiles for std::rc::Rc<H> {
    fn read(&self, file: &BoundFile) -> HostResult<Option<String>> {
        (**self).read(file)
    }

    fn write(&self, file: &BoundFile, text: &str) -> WriteTicket {
        (**self).write(file, text)
    }
}
