//! 変更通知のゲート
//!
//! サーフェスの変更イベントはユーザー入力でもプログラムからの読み込みでも
//! 発火する。読み込み中は抑止フラグを立て、ユーザー編集だけを記録する。

use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

use crate::clock::Clock;
use crate::surface::ChangeHandler;

pub(crate) struct ChangeGate {
    suppress: Cell<bool>,
    last_edit: Cell<Option<Instant>>,
    edits: Cell<u64>,
    clock: Rc<dyn Clock>,
}

impl ChangeGate {
    pub(crate) fn new(clock: Rc<dyn Clock>) -> Rc<Self> {
        Rc::new(Self {
            suppress: Cell::new(false),
            last_edit: Cell::new(None),
            edits: Cell::new(0),
            clock,
        })
    }

    /// サーフェスに登録するハンドラ
    pub(crate) fn handler(gate: &Rc<Self>) -> ChangeHandler {
        let gate = Rc::clone(gate);
        Box::new(move || gate.record())
    }

    fn record(&self) {
        if self.suppress.get() {
            return;
        }
        self.edits.set(self.edits.get() + 1);
        self.last_edit.set(Some(self.clock.now()));
    }

    /// 抑止フラグを立てたまま `f` を実行。戻る前に必ず解除する
    pub(crate) fn suppressed<T>(&self, f: impl FnOnce() -> T) -> T {
        let _guard = SuppressGuard::enter(&self.suppress);
        f()
    }

    /// 未処理のユーザー編集があれば、最後の編集時刻を取り出す
    pub(crate) fn take_edit(&self) -> Option<Instant> {
        self.last_edit.take()
    }

    /// これまでに記録したユーザー編集の数
    pub(crate) fn edit_count(&self) -> u64 {
        self.edits.get()
    }
}

struct SuppressGuard<'a> {
    flag: &'a Cell<bool>,
    previous: bool,
}

impl<'a> SuppressGuard<'a> {
    fn enter(flag: &'a Cell<bool>) -> Self {
        let previous = flag.replace(true);
        Self { flag, previous }
    }
}

impl Drop for SuppressGuard<'_> {
    fn drop(&mut self) {
        self.flag.set(self.previous);
    }
}
