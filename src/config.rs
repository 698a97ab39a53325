//! ビュー設定
//!
//! プラグインの設定データ（JSON）をビュー構築時に渡す明示的な設定オブジェクトとして扱う

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{BindingError, Result};

/// 保存遅延の既定値（ミリ秒）
pub const DEFAULT_DEBOUNCE_MS: u64 = 2000;

/// 未登録拡張子のコンテンツタイプ
pub const PLAIN_TEXT_MODE: &str = "text/plain";

/// ビュー設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ViewConfig {
    /// 扱う拡張子（小文字、先頭ドットなし）
    pub extensions: Vec<String>,
    /// 最後の編集から保存までの待ち時間
    pub debounce_ms: u64,
    /// ビュー生成時にエディタサーフェスを作るか、最初の読み込みまで遅らせるか
    pub eager_adapter_creation: bool,
    /// 拡張子ごとのコンテンツタイプ
    pub modes: BTreeMap<String, String>,
    /// ビュー種別名
    pub view_type: String,
}

impl Default for ViewConfig {
    fn default() -> Self {
        let mut modes = BTreeMap::new();
        modes.insert("ini".to_string(), "text/x-ini".to_string());
        Self {
            extensions: vec!["ini".to_string()],
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            eager_adapter_creation: true,
            modes,
            view_type: "ini".to_string(),
        }
    }
}

impl ViewConfig {
    /// 保存済み設定データから構築
    ///
    /// データが無い・空・`null` の場合は既定値を使う
    pub fn from_settings_blob(blob: Option<&str>) -> Result<Self> {
        let raw = match blob.map(str::trim) {
            None | Some("") | Some("null") => return Ok(Self::default()),
            Some(raw) => raw,
        };

        let config: ViewConfig = serde_json::from_str(raw)?;
        config.normalized()
    }

    /// 設定データとして書き出し
    pub fn to_settings_blob(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// 拡張子表記を揃えて検証
    pub fn normalized(mut self) -> Result<Self> {
        self.extensions = self
            .extensions
            .iter()
            .map(|ext| normalize_extension(ext))
            .filter(|ext| !ext.is_empty())
            .collect();
        let mut seen = BTreeSet::new();
        self.extensions.retain(|ext| seen.insert(ext.clone()));

        if self.extensions.is_empty() {
            return Err(BindingError::Config(
                "at least one extension must be configured".to_string(),
            ));
        }
        if self.view_type.trim().is_empty() {
            return Err(BindingError::Config("viewType must not be empty".to_string()));
        }

        self.modes = self
            .modes
            .into_iter()
            .map(|(ext, mode)| (normalize_extension(&ext), mode))
            .collect();

        Ok(self)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// 拡張子を受け付けるか
    pub fn accepts_extension(&self, extension: &str) -> bool {
        let ext = normalize_extension(extension);
        self.extensions.iter().any(|candidate| *candidate == ext)
    }

    /// 拡張子に対応するコンテンツタイプ
    pub fn mode_for(&self, extension: &str) -> &str {
        self.modes
            .get(&normalize_extension(extension))
            .map(String::as_str)
            .unwrap_or(PLAIN_TEXT_MODE)
    }
}

pub(crate) fn normalize_extension(extension: &str) -> String {
    extension.trim().trim_start_matches('.').to_lowercase()
}
