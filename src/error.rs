//! エラーハンドリング
//!
//! バインディング全体で使用するエラー型と、ホストコラボレータが返すエラー型を定義

use thiserror::Error;

/// バインディングのエラー型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BindingError {
    /// ホストからの読み込み失敗
    #[error("Failed to load {path}: {message}")]
    Load { path: String, message: String },

    /// ホストへの書き込み失敗
    #[error("Failed to write {path}: {message}")]
    Write { path: String, message: String },

    /// エディタサーフェス生成前のアクセス（統合時のプログラミングエラー）
    #[error("Editor surface has not been created yet")]
    AdapterNotReady,

    /// エディタサーフェスの生成失敗（ビューにとって致命的）
    #[error("Editor surface creation failed: {0}")]
    AdapterCreation(String),

    /// 永続化できなかった未保存内容
    #[error("Unsaved content for {path} could not be persisted")]
    UnsavedContent { path: String, content: String },

    /// ファイル未接続での操作
    #[error("No file is attached to the view")]
    NoFileAttached,

    /// 破棄済みビューへの操作
    #[error("View has already been destroyed")]
    ViewDestroyed,

    /// 設定エラー
    #[error("Configuration error: {0}")]
    Config(String),
}

/// ホストのファイルサービスが返すエラー
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HostError {
    #[error("File not found: {path}")]
    NotFound { path: String },

    #[error("Permission denied: {path}")]
    PermissionDenied { path: String },

    #[error("Invalid path: {path}")]
    InvalidPath { path: String },

    #[error("IO error: {message}")]
    Io { message: String },
}

/// エラーレベル分類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorLevel {
    Info,
    Warning,
    Error,
    Fatal,
}

impl BindingError {
    /// エラーの重大度
    pub fn level(&self) -> ErrorLevel {
        match self {
            BindingError::Load { .. } => ErrorLevel::Warning,
            BindingError::Write { .. } => ErrorLevel::Error,
            BindingError::UnsavedContent { .. } => ErrorLevel::Error,
            BindingError::AdapterNotReady => ErrorLevel::Error,
            BindingError::ViewDestroyed => ErrorLevel::Error,
            BindingError::NoFileAttached => ErrorLevel::Info,
            BindingError::Config(_) => ErrorLevel::Error,
            BindingError::AdapterCreation(_) => ErrorLevel::Fatal,
        }
    }

    /// ログ出力に使うレベル
    pub fn log_level(&self) -> log::Level {
        self.level().into()
    }

    pub(crate) fn load(path: impl Into<String>, message: impl ToString) -> Self {
        BindingError::Load {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub(crate) fn write(path: impl Into<String>, message: impl ToString) -> Self {
        BindingError::Write {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

impl From<ErrorLevel> for log::Level {
    fn from(level: ErrorLevel) -> Self {
        match level {
            ErrorLevel::Info => log::Level::Info,
            ErrorLevel::Warning => log::Level::Warn,
            ErrorLevel::Error | ErrorLevel::Fatal => log::Level::Error,
        }
    }
}

impl From<std::io::Error> for HostError {
    fn from(err: std::io::Error) -> Self {
        HostError::Io {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for BindingError {
    fn from(err: serde_json::Error) -> Self {
        BindingError::Config(err.to_string())
    }
}

/// 統一された Result 型
pub type Result<T> = std::result::Result<T, BindingError>;

/// ホスト呼び出しの Result 型
pub type HostResult<T> = std::result::Result<T, HostError>;
