//! メモリ上のテキストサーフェス
//!
//! `EditorAdapter` の参照実装。ハンドルはクローンでき、ビューが所有する
//! サーフェスをホストの入力処理（やテスト）から操作できる。

use std::cell::RefCell;
use std::rc::Rc;

use unicode_width::UnicodeWidthStr;

use super::{ChangeHandler, EditorAdapter};

/// 計測済みのレイアウト
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SurfaceLayout {
    /// 計測時の表示幅（桁）
    pub width: u16,
    /// 計測時の表示高さ（行）
    pub height: u16,
    /// 内容の行数
    pub content_rows: usize,
    /// 最も長い行の表示幅
    pub content_columns: usize,
    /// 横スクロールが必要か
    pub needs_hscroll: bool,
}

/// 編集履歴スタック
#[derive(Debug, Clone, Default)]
struct HistoryStack {
    undo: Vec<String>,
    redo: Vec<String>,
}

impl HistoryStack {
    fn push(&mut self, previous: String) {
        self.undo.push(previous);
        self.redo.clear();
    }

    fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }
}

#[derive(Debug, Default)]
struct SurfaceState {
    text: String,
    content_type: String,
    history: HistoryStack,
    scroll_line: usize,
    viewport: (u16, u16),
    layout: SurfaceLayout,
    document_generation: u64,
    disposed: bool,
}

/// メモリ上のテキストサーフェス
#[derive(Clone, Default)]
pub struct TextSurface {
    state: Rc<RefCell<SurfaceState>>,
    handlers: Rc<RefCell<Vec<ChangeHandler>>>,
}

impl TextSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// 内容タイプ（モード）
    pub fn content_type(&self) -> String {
        self.state.borrow().content_type.clone()
    }

    pub fn can_undo(&self) -> bool {
        !self.state.borrow().history.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.state.borrow().history.redo.is_empty()
    }

    pub fn scroll_line(&self) -> usize {
        self.state.borrow().scroll_line
    }

    pub fn scroll_to(&self, line: usize) {
        let mut state = self.state.borrow_mut();
        let last = state.text.lines().count().saturating_sub(1);
        state.scroll_line = line.min(last);
    }

    /// ドキュメントが差し替えられた回数
    pub fn document_generation(&self) -> u64 {
        self.state.borrow().document_generation
    }

    pub fn is_disposed(&self) -> bool {
        self.state.borrow().disposed
    }

    /// 最後に計測したレイアウト
    pub fn layout(&self) -> SurfaceLayout {
        self.state.borrow().layout
    }

    /// ホストが割り当てた表示領域（再計測までは反映されない）
    pub fn set_viewport(&self, width: u16, height: u16) {
        self.state.borrow_mut().viewport = (width, height);
    }

    /// ユーザー入力：末尾に文字列を入力
    pub fn type_text(&self, text: &str) {
        self.mutate(|state| {
            let mut next = state.text.clone();
            next.push_str(text);
            next
        });
    }

    /// ユーザー入力：バッファ全体を書き換え（貼り付けなど）
    pub fn edit(&self, text: &str) {
        let text = text.to_string();
        self.mutate(move |_| text);
    }

    /// 直前の変更を取り消す
    pub fn undo(&self) -> bool {
        let changed = {
            let mut state = self.state.borrow_mut();
            match state.history.undo.pop() {
                Some(previous) => {
                    let current = std::mem::replace(&mut state.text, previous);
                    state.history.redo.push(current);
                    true
                }
                None => false,
            }
        };
        if changed {
            self.notify();
        }
        changed
    }

    /// 取り消した変更をやり直す
    pub fn redo(&self) -> bool {
        let changed = {
            let mut state = self.state.borrow_mut();
            match state.history.redo.pop() {
                Some(next) => {
                    let current = std::mem::replace(&mut state.text, next);
                    state.history.undo.push(current);
                    true
                }
                None => false,
            }
        };
        if changed {
            self.notify();
        }
        changed
    }

    fn mutate(&self, f: impl FnOnce(&SurfaceState) -> String) {
        {
            let mut state = self.state.borrow_mut();
            let next = f(&state);
            let previous = std::mem::replace(&mut state.text, next);
            state.history.push(previous);
        }
        self.notify();
    }

    fn notify(&self) {
        if self.state.borrow().disposed {
            return;
        }
        // ハンドラ内からのサーフェス参照を許すため、状態の借用は解放済み
        let mut handlers = self.handlers.borrow_mut();
        for handler in handlers.iter_mut() {
            handler();
        }
    }
}

impl EditorAdapter for TextSurface {
    fn content(&self) -> String {
        self.state.borrow().text.clone()
    }

    fn set_content(&mut self, text: &str) {
        let text = text.to_string();
        self.mutate(move |_| text);
    }

    fn replace_document(&mut self, text: &str, content_type: &str) {
        {
            let mut state = self.state.borrow_mut();
            state.text = text.to_string();
            state.content_type = content_type.to_string();
            state.history.clear();
            state.scroll_line = 0;
            state.document_generation += 1;
        }
        self.notify();
    }

    fn on_change(&mut self, handler: ChangeHandler) {
        if self.is_disposed() {
            return;
        }
        self.handlers.borrow_mut().push(handler);
    }

    fn refresh_layout(&mut self) {
        let mut state = self.state.borrow_mut();
        let (width, height) = state.viewport;
        let content_rows = state.text.lines().count().max(1);
        let content_columns = state
            .text
            .lines()
            .map(UnicodeWidthStr::width)
            .max()
            .unwrap_or(0);

        state.layout = SurfaceLayout {
            width,
            height,
            content_rows,
            content_columns,
            needs_hscroll: content_columns > width as usize,
        };
    }

    fn dispose(&mut self) {
        let already = std::mem::replace(&mut self.state.borrow_mut().disposed, true);
        if !already {
            self.handlers.borrow_mut().clear();
        }
    }
}

impl std::fmt::Debug for TextSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextSurface")
            .field("state", &self.state.borrow())
            .field("handlers", &self.handlers.borrow().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn counting(surface: &mut TextSurface) -> Rc<Cell<usize>> {
        let count = Rc::new(Cell::new(0));
        let seen = Rc::clone(&count);
        surface.on_change(Box::new(move || seen.set(seen.get() + 1)));
        count
    }

    #[test]
    fn test_set_content_keeps_history() {
        let mut surface = TextSurface::new();
        surface.replace_document("a", "text/x-ini");
        surface.set_content("b");

        assert!(surface.can_undo());
        assert!(surface.undo());
        assert_eq!(surface.content(), "a");
        assert!(surface.redo());
        assert_eq!(surface.content(), "b");
    }

    #[test]
    fn test_replace_document_resets_history_and_scroll() {
        let mut surface = TextSurface::new();
        surface.replace_document("1\n2\n3\n", "text/x-ini");
        surface.type_text("4\n");
        surface.scroll_to(2);
        assert_eq!(surface.scroll_line(), 2);

        surface.replace_document("x", "text/plain");
        assert!(!surface.can_undo());
        assert!(!surface.can_redo());
        assert_eq!(surface.scroll_line(), 0);
        assert_eq!(surface.content_type(), "text/plain");
        assert_eq!(surface.document_generation(), 2);
    }

    #[test]
    fn test_every_mutation_notifies() {
        let mut surface = TextSurface::new();
        let count = counting(&mut surface);

        surface.replace_document("a", "text/x-ini");
        surface.set_content("b");
        surface.type_text("c");
        surface.undo();
        assert_eq!(count.get(), 4);
    }

    #[test]
    fn test_layout_is_stale_until_refreshed() {
        let mut surface = TextSurface::new();
        surface.replace_document("[section]\nキー=値\n", "text/x-ini");
        surface.set_viewport(80, 24);
        assert_eq!(surface.layout(), SurfaceLayout::default());

        surface.refresh_layout();
        let layout = surface.layout();
        assert_eq!((layout.width, layout.height), (80, 24));
        assert_eq!(layout.content_rows, 2);
        assert_eq!(layout.content_columns, 9);
        assert!(!layout.needs_hscroll);

        surface.set_viewport(5, 24);
        surface.refresh_layout();
        assert!(surface.layout().needs_hscroll);
    }

    #[test]
    fn test_dispose_is_idempotent_and_detaches_handlers() {
        let mut surface = TextSurface::new();
        let count = counting(&mut surface);

        surface.dispose();
        surface.dispose();
        surface.type_text("ignored by handlers");

        assert!(surface.is_disposed());
        assert_eq!(count.get(), 0);
    }
}
