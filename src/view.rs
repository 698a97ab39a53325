//! エディタビュー
//!
//! ホストのビューオブジェクトが所有し、ライフサイクル呼び出しを
//! `DocumentBinding` に転送する。

use std::rc::Rc;

use crate::binding::{BindingState, DocumentBinding};
use crate::clock::Clock;
use crate::config::ViewConfig;
use crate::error::{BindingError, Result};
use crate::host::{BoundFile, HostFiles};
use crate::registry::{icon_id, ViewHandle};
use crate::surface::{EditorAdapter, SurfaceFactory};

/// ホストから呼ばれるライフサイクルフック
pub trait ViewLifecycle {
    /// ビュー生成。サーフェス生成に失敗した場合はビューを表示できない
    fn on_create(&mut self) -> Result<()>;

    /// 表示サイズ変更
    fn on_resize(&mut self) -> Result<()>;

    /// ファイルの接続（切り替え）
    fn on_file_attach(&mut self, file: BoundFile) -> Result<()>;

    /// ファイルの切り離し
    fn on_file_detach(&mut self, file: &BoundFile) -> Result<()>;

    /// ビュー破棄
    fn on_destroy(&mut self) -> Result<()>;

    /// 現在のバッファ内容
    fn current_content(&self) -> Result<String>;
}

/// 構造化テキスト用のエディタビュー
pub struct EditorView<A, H> {
    handle: ViewHandle,
    config: Rc<ViewConfig>,
    binding: DocumentBinding<A, H>,
    destroyed: bool,
}

impl<A, H> EditorView<A, H>
where
    A: EditorAdapter + 'static,
    H: HostFiles + 'static,
{
    pub fn new(
        handle: ViewHandle,
        config: Rc<ViewConfig>,
        host: H,
        factory: SurfaceFactory<A>,
        clock: Rc<dyn Clock>,
    ) -> Self {
        let binding = DocumentBinding::new(Rc::clone(&config), host, factory, clock);
        Self {
            handle,
            config,
            binding,
            destroyed: false,
        }
    }

    pub fn handle(&self) -> ViewHandle {
        self.handle
    }

    pub fn binding(&self) -> &DocumentBinding<A, H> {
        &self.binding
    }

    pub fn state(&self) -> BindingState {
        self.binding.state()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// ビュー種別名
    pub fn view_type(&self) -> &str {
        &self.config.view_type
    }

    /// タイトル表示
    pub fn display_text(&self) -> String {
        match self.binding.file() {
            Some(file) => file.basename(),
            None => format!("{} (no file)", self.config.view_type),
        }
    }

    /// アイコン名
    pub fn icon(&self) -> String {
        icon_id(&self.config.view_type)
    }

    pub fn can_accept_extension(&self, extension: &str) -> bool {
        self.config.accepts_extension(extension)
    }

    /// ホストのイベントループから定期的に呼ぶ
    pub fn pump(&mut self) {
        if !self.destroyed {
            self.binding.pump();
        }
    }

    /// ホストの保存要求
    pub fn request_save(&mut self) -> Result<()> {
        self.ensure_alive()?;
        if self.binding.file().is_none() {
            return Err(BindingError::NoFileAttached);
        }
        self.binding.flush()
    }

    /// ホストが検知した外部での内容変更
    pub fn on_external_change(&mut self, file: &BoundFile, text: &str) {
        if !self.destroyed {
            self.binding.external_change(file, text);
        }
    }

    /// 破棄後のライフサイクル呼び出しはホスト側の誤用
    fn ensure_alive(&self) -> Result<()> {
        if self.destroyed {
            log::warn!(target: "iniview::view", "view {:?} used after destroy", self.handle);
            return Err(BindingError::ViewDestroyed);
        }
        Ok(())
    }
}

impl<A, H> ViewLifecycle for EditorView<A, H>
where
    A: EditorAdapter + 'static,
    H: HostFiles + 'static,
{
    fn on_create(&mut self) -> Result<()> {
        self.ensure_alive()?;
        if self.config.eager_adapter_creation {
            self.binding.create_adapter()?;
        }
        log::debug!(target: "iniview::view", "view {:?} created", self.handle);
        Ok(())
    }

    fn on_resize(&mut self) -> Result<()> {
        self.ensure_alive()?;
        self.binding.resize();
        Ok(())
    }

    fn on_file_attach(&mut self, file: BoundFile) -> Result<()> {
        self.ensure_alive()?;
        if !self.can_accept_extension(&file.extension()) {
            log::warn!(
                target: "iniview::view",
                "{} has an extension this view was not registered for",
                file
            );
        }
        self.binding.attach(file)
    }

    fn on_file_detach(&mut self, file: &BoundFile) -> Result<()> {
        self.ensure_alive()?;
        if self.binding.file() != Some(file) {
            return Ok(());
        }
        self.binding.detach()
    }

    fn on_destroy(&mut self) -> Result<()> {
        if self.destroyed {
            return Ok(());
        }
        self.destroyed = true;
        log::debug!(target: "iniview::view", "view {:?} destroyed", self.handle);
        self.binding.teardown()
    }

    fn current_content(&self) -> Result<String> {
        self.binding.current_content()
    }
}
