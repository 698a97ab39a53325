//! エディタサーフェス
//!
//! 外部の埋め込みテキストエディタに要求する機能の契約。
//! 描画やレイアウトの実体はサーフェス側の責務。

pub mod text;

use crate::error::Result;

pub use text::{SurfaceLayout, TextSurface};

/// 内容変更ハンドラ
pub type ChangeHandler = Box<dyn FnMut()>;

/// サーフェスの生成関数。失敗はビューにとって致命的
pub type SurfaceFactory<A> = Box<dyn FnMut() -> Result<A>>;

/// 埋め込みテキストエディタのラッパ
pub trait EditorAdapter {
    /// 現在のバッファ内容（副作用なし）
    fn content(&self) -> String;

    /// バッファ内容をその場で置き換える（アンドゥ履歴は保持）
    fn set_content(&mut self, text: &str);

    /// ドキュメント自体を差し替える（履歴とスクロール位置をリセット）
    fn replace_document(&mut self, text: &str, content_type: &str);

    /// 変更通知を登録。プログラムからの変更でも発火する
    fn on_change(&mut self, handler: ChangeHandler);

    /// 表示サイズ変更後の再計測
    fn refresh_layout(&mut self);

    /// リソース解放と変更ハンドラの解除。複数回呼んでもよい
    fn dispose(&mut self);
}
