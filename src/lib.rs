//! iniview - 構造化テキスト用のファイル連動エディタビュー
//!
//! ホストが管理するファイルと埋め込みエディタサーフェスを結び付け、
//! 編集内容を遅延保存で永続化する。

// コアモジュール
pub mod error;
pub mod logging;
pub mod config;
pub mod clock;

// ホスト連携
pub mod host;

// 編集面
pub mod surface;

// 保存とバインディング
pub mod persister;
pub mod binding;

// ビュー
pub mod view;
pub mod registry;

// 公開API
pub use binding::{BindingState, DocumentBinding, PersistOutcome};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::ViewConfig;
pub use error::{BindingError, HostError, Result};
pub use host::{BoundFile, FsHost, HostFiles, MemoryHost, WriteTicket};
pub use persister::DebouncedPersister;
pub use registry::{ViewHandle, ViewRegistry};
pub use surface::{EditorAdapter, TextSurface};
pub use view::{EditorView, ViewLifecycle};
