//! ビュー登録
//!
//! 拡張子からビュー生成関数を引く対応表と、ビューのアイコン。

use std::collections::BTreeMap;
use std::rc::Rc;

use crate::clock::Clock;
use crate::config::{normalize_extension, ViewConfig};
use crate::error::{BindingError, Result};
use crate::host::HostFiles;
use crate::surface::TextSurface;
use crate::view::EditorView;

/// ホストが割り当てるビューの識別子
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewHandle(pub u64);

/// ビュー生成関数
pub type ViewFactory<V> = Box<dyn Fn(ViewHandle) -> Result<V>>;

/// ビュー種別の登録表
pub struct ViewRegistry<V> {
    views: BTreeMap<String, ViewFactory<V>>,
    extensions: BTreeMap<String, String>,
}

impl<V> ViewRegistry<V> {
    pub fn new() -> Self {
        Self {
            views: BTreeMap::new(),
            extensions: BTreeMap::new(),
        }
    }

    /// ビュー種別を登録。種別名や拡張子の重複はエラー
    pub fn register(
        &mut self,
        view_type: &str,
        extensions: &[String],
        factory: ViewFactory<V>,
    ) -> Result<()> {
        if self.views.contains_key(view_type) {
            return Err(BindingError::Config(format!(
                "view type {view_type} is already registered"
            )));
        }

        let extensions: Vec<String> = extensions.iter().map(|ext| normalize_extension(ext)).collect();
        if let Some(taken) = extensions.iter().find(|ext| self.extensions.contains_key(*ext)) {
            return Err(BindingError::Config(format!(
                "extension {taken} is already handled by {}",
                self.extensions[taken]
            )));
        }

        for ext in &extensions {
            self.extensions.insert(ext.clone(), view_type.to_string());
        }
        self.views.insert(view_type.to_string(), factory);
        Ok(())
    }

    pub fn can_handle(&self, extension: &str) -> bool {
        self.extensions.contains_key(&normalize_extension(extension))
    }

    /// 拡張子に対応するビュー種別
    pub fn view_type_for(&self, extension: &str) -> Option<&str> {
        self.extensions
            .get(&normalize_extension(extension))
            .map(String::as_str)
    }

    /// ビューを生成
    pub fn create(&self, view_type: &str, handle: ViewHandle) -> Result<V> {
        let factory = self.views.get(view_type).ok_or_else(|| {
            BindingError::Config(format!("no view registered for {view_type}"))
        })?;
        factory(handle)
    }

    /// 拡張子からビューを生成
    pub fn create_for_extension(&self, extension: &str, handle: ViewHandle) -> Result<V> {
        let view_type = self.view_type_for(extension).ok_or_else(|| {
            BindingError::Config(format!("no view handles .{}", normalize_extension(extension)))
        })?;
        self.create(view_type, handle)
    }
}

impl<V> Default for ViewRegistry<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// 設定に従ってテキストエディタビューを登録
pub fn register_text_views<H>(
    registry: &mut ViewRegistry<EditorView<TextSurface, H>>,
    config: ViewConfig,
    host: H,
    clock: Rc<dyn Clock>,
) -> Result<()>
where
    H: HostFiles + Clone + 'static,
{
    let config = Rc::new(config);
    let view_type = config.view_type.clone();
    let extensions = config.extensions.clone();

    registry.register(
        &view_type,
        &extensions,
        Box::new(move |handle| {
            Ok(EditorView::new(
                handle,
                Rc::clone(&config),
                host.clone(),
                Box::new(|| Ok(TextSurface::new())),
                Rc::clone(&clock),
            ))
        }),
    )
}

/// ビュー種別のアイコン名
pub fn icon_id(extension: &str) -> String {
    format!("document-{}", normalize_extension(extension))
}

/// 拡張子ラベル付きの文書アイコン（SVG 断片）
pub fn document_icon_svg(extension: &str) -> String {
    let label = escape_xml(&normalize_extension(extension));
    format!(
        concat!(
            r#"<path fill="currentColor" stroke="currentColor" d="M14,4v92h72V29.2l-0.6-0.6l-24-24L60.8,4L14,4z "#,
            r#"M18,8h40v24h24v60H18L18,8z M62,10.9L79.1,28H62V10.9z"></path>"#,
            "\n",
            r#"<text font-family="sans-serif" font-weight="bold" font-size="30" fill="currentColor" "#,
            r#"x="50%" y="60%" dominant-baseline="middle" text-anchor="middle">{}</text>"#
        ),
        label
    )
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
