//! ファイルシステム上のホスト実装
//!
//! 書き込みは一時ファイル経由のアトミック保存。改行コードの変換は行わず、
//! バッファの内容をそのままバイト列として保存する。

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::{BoundFile, HostFiles, WriteTicket};
use crate::error::{HostError, HostResult};

/// std::fs を使うホスト
#[derive(Debug, Clone)]
pub struct FsHost {
    root: Option<PathBuf>,
    atomic_save: bool,
}

impl FsHost {
    pub fn new() -> Self {
        Self {
            root: None,
            atomic_save: true,
        }
    }

    /// 相対パスを指定ディレクトリ基準で解決する
    pub fn with_root<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: Some(root.into()),
            atomic_save: true,
        }
    }

    /// 直接書き込みに切り替え
    pub fn without_atomic_save(mut self) -> Self {
        self.atomic_save = false;
        self
    }

    fn resolve(&self, file: &BoundFile) -> PathBuf {
        match &self.root {
            Some(root) if file.path().is_relative() => root.join(file.path()),
            _ => file.path().to_path_buf(),
        }
    }

    fn read_path(&self, path: &Path) -> HostResult<String> {
        if path.is_dir() {
            return Err(HostError::InvalidPath {
                path: format!("Not a regular file: {}", path.display()),
            });
        }

        std::fs::read_to_string(path).map_err(|err| map_io_error(err, path))
    }

    fn save(&self, path: &Path, content: &str) -> HostResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|err| map_io_error(err, parent))?;
            }
        }

        if self.atomic_save {
            self.atomic_save_impl(path, content)
        } else {
            std::fs::write(path, content.as_bytes()).map_err(|err| map_io_error(err, path))
        }
    }

    /// アトミック保存（一時ファイル経由）
    fn atomic_save_impl(&self, path: &Path, content: &str) -> HostResult<()> {
        let temp_path = generate_temp_path(path)?;

        std::fs::write(&temp_path, content.as_bytes()).map_err(|err| map_io_error(err, path))?;

        std::fs::rename(&temp_path, path).map_err(|err| {
            // 一時ファイル削除を試行
            let _ = std::fs::remove_file(&temp_path);
            map_io_error(err, path)
        })
    }
}

impl Default for FsHost {
    fn default() -> Self {
        Self::new()
    }
}

impl HostFiles for FsHost {
    fn read(&self, file: &BoundFile) -> HostResult<Option<String>> {
        let path = self.resolve(file);
        self.read_path(&path).map(Some)
    }

    fn write(&self, file: &BoundFile, text: &str) -> WriteTicket {
        let path = self.resolve(file);
        log::debug!(target: "iniview::host", "writing {} bytes to {}", text.len(), path.display());
        WriteTicket::Settled(self.save(&path, text))
    }
}

fn generate_temp_path(original: &Path) -> HostResult<PathBuf> {
    let filename = original.file_name().ok_or_else(|| HostError::InvalidPath {
        path: original.display().to_string(),
    })?;

    // 一意な一時ファイル名生成
    let temp_name = format!(".{}_{}", filename.to_string_lossy(), std::process::id());

    Ok(match original.parent() {
        Some(parent) => parent.join(temp_name),
        None => PathBuf::from(temp_name),
    })
}

fn map_io_error(err: std::io::Error, path: &Path) -> HostError {
    match err.kind() {
        ErrorKind::NotFound => HostError::NotFound {
            path: path.display().to_string(),
        },
        ErrorKind::PermissionDenied => HostError::PermissionDenied {
            path: path.display().to_string(),
        },
        _ => HostError::from(err),
    }
}
