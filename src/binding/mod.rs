//! ファイルとエディタサーフェスのバインディング
//!
//! ホストのファイル参照と一つのサーフェスを結び付ける状態機械。
//! 読み込み、ドキュメント差し替え、保存のタイミングを決め、
//! ファイル切り替え・破棄の際に編集内容を失わないことを保証する。
//!
//! 状態遷移:
//!
//! ```text
//! Unbound --attach--> Bound --edit--> Dirty --timer/flush--> Saving --ok--> Bound
//!                                       ^                       |
//!                                       +-------- failure ------+
//! ```
//!
//! すべての遷移はホストのイベントループ上で実行される。非同期になり得るのは
//! ホストへの書き込みだけで、書き込み中に届いた attach / detach は
//! その完了を待ってから処理する。

mod gate;

use std::fmt;
use std::rc::Rc;
use std::time::Instant;

use crate::clock::Clock;
use crate::config::{ViewConfig, PLAIN_TEXT_MODE};
use crate::error::{BindingError, HostResult, Result};
use crate::host::{BoundFile, HostFiles, PendingWrite, WriteTicket};
use crate::persister::DebouncedPersister;
use crate::surface::{EditorAdapter, SurfaceFactory};

use gate::ChangeGate;

const LOG_TARGET: &str = "iniview::binding";

/// バインディングの状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingState {
    /// ファイル未接続（サーフェスは空）
    Unbound,
    /// 保存済み内容を表示中
    Bound,
    /// 未保存の編集あり（保存予約済み）
    Dirty,
    /// 書き込み中
    Saving,
}

/// 保存処理の結果
#[derive(Debug, Clone, PartialEq)]
pub enum PersistOutcome {
    /// 書き込み完了
    Saved,
    /// 書き込みを発行し、完了待ち
    InFlight,
    /// 書き込み失敗（内容は保持）
    Failed(BindingError),
    /// 保存対象なし
    Skipped,
}

struct InFlightWrite {
    file: BoundFile,
    content: String,
    pending: Box<dyn PendingWrite>,
}

/// 保存処理から触れる部分
struct BindingCore<A, H> {
    host: H,
    config: Rc<ViewConfig>,
    factory: SurfaceFactory<A>,
    adapter: Option<A>,
    gate: Rc<ChangeGate>,
    file: Option<BoundFile>,
    snapshot: String,
    state: BindingState,
    in_flight: Option<InFlightWrite>,
    retry_used: bool,
    last_error: Option<BindingError>,
}

impl<A: EditorAdapter, H: HostFiles> BindingCore<A, H> {
    fn ensure_adapter(&mut self) -> Result<()> {
        if self.adapter.is_some() {
            return Ok(());
        }

        let mut adapter = (self.factory)().map_err(|err| match err {
            err @ BindingError::AdapterCreation(_) => err,
            other => BindingError::AdapterCreation(other.to_string()),
        })?;
        adapter.on_change(ChangeGate::handler(&self.gate));
        log::debug!(target: LOG_TARGET, "editor surface created");
        self.adapter = Some(adapter);
        Ok(())
    }

    fn adapter(&self) -> Result<&A> {
        self.adapter.as_ref().ok_or(BindingError::AdapterNotReady)
    }

    /// ドキュメントを差し替える（変更通知は抑止）
    fn load_document(&mut self, text: &str, content_type: &str) {
        if let Some(adapter) = self.adapter.as_mut() {
            self.gate
                .suppressed(|| adapter.replace_document(text, content_type));
        }
    }

    /// 現在のバッファ内容を書き込む
    fn persist(&mut self) -> PersistOutcome {
        // 先行する書き込みの完了を待ってから次を発行する
        if self.in_flight.is_some() {
            if let PersistOutcome::Failed(err) = self.settle_in_flight() {
                log::warn!(target: LOG_TARGET, "previous write failed before re-save: {}", err);
            }
        }

        let (file, content) = match (&self.file, &self.adapter) {
            (Some(file), Some(adapter)) => (file.clone(), adapter.content()),
            _ => return PersistOutcome::Skipped,
        };

        self.state = BindingState::Saving;
        match self.host.write(&file, &content) {
            WriteTicket::Settled(result) => self.apply_write_result(&file, content, result),
            WriteTicket::Pending(pending) => {
                log::debug!(target: LOG_TARGET, "write to {} in flight", file);
                self.in_flight = Some(InFlightWrite {
                    file,
                    content,
                    pending,
                });
                PersistOutcome::InFlight
            }
        }
    }

    /// 完了した書き込みがあれば反映（待たない）
    fn poll_in_flight(&mut self) -> Option<PersistOutcome> {
        let result = self.in_flight.as_mut()?.pending.poll()?;
        let write = self.in_flight.take()?;
        Some(self.apply_write_result(&write.file, write.content, result))
    }

    /// 書き込み中であれば完了まで待つ
    fn settle_in_flight(&mut self) -> PersistOutcome {
        match self.in_flight.take() {
            Some(write) => {
                let result = write.pending.wait();
                self.apply_write_result(&write.file, write.content, result)
            }
            None => PersistOutcome::Skipped,
        }
    }

    fn apply_write_result(
        &mut self,
        file: &BoundFile,
        content: String,
        result: HostResult<()>,
    ) -> PersistOutcome {
        match result {
            Ok(()) => {
                log::debug!(target: LOG_TARGET, "saved {} ({} bytes)", file, content.len());
                self.snapshot = content;
                self.retry_used = false;
                self.state = if self.buffer_matches_snapshot() {
                    BindingState::Bound
                } else {
                    // 書き込み中に入力があった
                    BindingState::Dirty
                };
                PersistOutcome::Saved
            }
            Err(err) => {
                let err = BindingError::write(file.display_path(), err);
                log::error!(target: LOG_TARGET, "{}", err);
                self.state = BindingState::Dirty;
                self.last_error = Some(err.clone());
                PersistOutcome::Failed(err)
            }
        }
    }

    fn buffer_matches_snapshot(&self) -> bool {
        self.adapter
            .as_ref()
            .map_or(true, |adapter| adapter.content() == self.snapshot)
    }
}

/// ファイルとエディタサーフェスのバインディング
pub struct DocumentBinding<A, H> {
    core: BindingCore<A, H>,
    persister: DebouncedPersister<BindingCore<A, H>, PersistOutcome>,
    clock: Rc<dyn Clock>,
}

impl<A, H> DocumentBinding<A, H>
where
    A: EditorAdapter + 'static,
    H: HostFiles + 'static,
{
    /// バインディングを作成（サーフェスはまだ作らない）
    pub fn new(
        config: Rc<ViewConfig>,
        host: H,
        factory: SurfaceFactory<A>,
        clock: Rc<dyn Clock>,
    ) -> Self {
        let persister = DebouncedPersister::new(config.debounce());
        Self {
            core: BindingCore {
                host,
                config,
                factory,
                adapter: None,
                gate: ChangeGate::new(Rc::clone(&clock)),
                file: None,
                snapshot: String::new(),
                state: BindingState::Unbound,
                in_flight: None,
                retry_used: false,
                last_error: None,
            },
            persister,
            clock,
        }
    }

    pub fn state(&self) -> BindingState {
        self.core.state
    }

    pub fn is_dirty(&self) -> bool {
        matches!(self.core.state, BindingState::Dirty)
    }

    pub fn file(&self) -> Option<&BoundFile> {
        self.core.file.as_ref()
    }

    /// 最後に永続化された（または読み込んだ）内容
    pub fn snapshot(&self) -> &str {
        &self.core.snapshot
    }

    pub fn has_adapter(&self) -> bool {
        self.core.adapter.is_some()
    }

    pub fn adapter(&self) -> Option<&A> {
        self.core.adapter.as_ref()
    }

    /// 直近の読み込み／書き込みエラー
    pub fn last_error(&self) -> Option<&BindingError> {
        self.core.last_error.as_ref()
    }

    /// 保存予定時刻
    pub fn save_due_at(&self) -> Option<Instant> {
        self.persister.due_at()
    }

    /// これまでに受け付けたユーザー編集の数
    pub fn user_edit_count(&self) -> u64 {
        self.core.gate.edit_count()
    }

    /// サーフェスを生成（生成済みなら何もしない）
    pub fn create_adapter(&mut self) -> Result<()> {
        self.core.ensure_adapter()
    }

    /// 現在のバッファ内容。サーフェス生成前の呼び出しはエラー
    pub fn current_content(&self) -> Result<String> {
        Ok(self.core.adapter()?.content())
    }

    /// ファイルを接続する
    ///
    /// 別ファイルの未保存編集は、切り替え前に同期的に書き込む。
    /// 書き込めなかった場合は切り替えずにエラーを返す。
    pub fn attach(&mut self, file: BoundFile) -> Result<()> {
        self.absorb_edits();

        if self.core.file.as_ref() == Some(&file) {
            log::debug!(target: LOG_TARGET, "{} is already attached", file);
            return Ok(());
        }

        if self.core.file.is_some() {
            self.release_current()?;
        }

        self.core.ensure_adapter()?;

        let text = match self.core.host.read(&file) {
            Ok(Some(text)) => {
                self.core.last_error = None;
                text
            }
            Ok(None) => {
                let err = BindingError::load(file.display_path(), "host returned no content");
                log::warn!(target: LOG_TARGET, "{}; showing an empty document", err);
                self.core.last_error = Some(err);
                String::new()
            }
            Err(err) => {
                let err = BindingError::load(file.display_path(), err);
                log::warn!(target: LOG_TARGET, "{}; showing an empty document", err);
                self.core.last_error = Some(err);
                String::new()
            }
        };

        let content_type = self.core.config.mode_for(&file.extension()).to_string();
        self.core.load_document(&text, &content_type);
        log::debug!(target: LOG_TARGET, "attached {} as {}", file, content_type);

        self.core.snapshot = text;
        self.core.file = Some(file);
        self.core.state = BindingState::Bound;
        self.core.retry_used = false;
        Ok(())
    }

    /// ファイルを切り離す。未保存の編集は書き込んでから切り離す
    pub fn detach(&mut self) -> Result<()> {
        self.absorb_edits();
        if self.core.file.is_none() {
            return Ok(());
        }

        self.release_current()?;

        self.core.load_document("", PLAIN_TEXT_MODE);
        self.core.snapshot.clear();
        self.core.file = None;
        self.core.state = BindingState::Unbound;
        Ok(())
    }

    /// サーフェスの編集をユーザー編集として扱う
    pub fn user_edit(&mut self, at: Instant) {
        match self.core.state {
            BindingState::Unbound => {
                log::debug!(target: LOG_TARGET, "edit without an attached file ignored");
                return;
            }
            BindingState::Saving => {}
            BindingState::Bound | BindingState::Dirty => {
                if self.core.buffer_matches_snapshot() {
                    // 編集が取り消されて保存済み内容に戻った
                    self.persister.cancel();
                    self.core.state = BindingState::Bound;
                    return;
                }
                self.core.state = BindingState::Dirty;
            }
        }

        self.core.retry_used = false;
        self.arm_save(at);
    }

    /// 即座に保存する（ホストの保存要求）
    pub fn flush(&mut self) -> Result<()> {
        self.absorb_edits();
        self.persister.cancel();

        if let PersistOutcome::Failed(err) = self.core.settle_in_flight() {
            log::warn!(target: LOG_TARGET, "in-flight write failed: {}", err);
        }

        match self.core.state {
            BindingState::Dirty => self.flush_blocking(),
            _ => Ok(()),
        }
    }

    /// 外部での内容変更を反映する
    ///
    /// 未保存の編集がある場合はそちらを優先し、外部の変更は適用しない。
    pub fn external_change(&mut self, file: &BoundFile, text: &str) {
        self.absorb_edits();
        if self.core.file.as_ref() != Some(file) {
            return;
        }

        match self.core.state {
            BindingState::Bound => {
                if self.core.snapshot == text {
                    return;
                }
                if let Some(adapter) = self.core.adapter.as_mut() {
                    self.core.gate.suppressed(|| adapter.set_content(text));
                }
                self.core.snapshot = text.to_string();
                log::debug!(target: LOG_TARGET, "reloaded {} after external change", file);
            }
            BindingState::Dirty | BindingState::Saving => {
                log::info!(
                    target: LOG_TARGET,
                    "external change to {} ignored: local edits are unsaved",
                    file
                );
            }
            BindingState::Unbound => {}
        }
    }

    /// 表示サイズ変更。状態に関係なくサーフェスへ転送する
    pub fn resize(&mut self) {
        match self.core.adapter.as_mut() {
            Some(adapter) => adapter.refresh_layout(),
            None => log::debug!(target: LOG_TARGET, "resize before surface creation"),
        }
    }

    /// イベントループから呼ばれる：完了した書き込み、編集、タイマーを処理
    pub fn pump(&mut self) {
        let now = self.clock.now();

        if let Some(outcome) = self.core.poll_in_flight() {
            self.after_persist(outcome, now);
        }

        self.absorb_edits();

        if let Some(outcome) = self.persister.fire_due(now, &mut self.core) {
            self.after_persist(outcome, now);
        }
    }

    /// ビュー破棄。未保存の編集を書き込み、サーフェスを解放する
    ///
    /// 書き込めなかった内容はエラーに含めて返す。
    pub fn teardown(&mut self) -> Result<()> {
        let result = self.detach();

        self.persister.cancel();
        if let Some(mut adapter) = self.core.adapter.take() {
            adapter.dispose();
            log::debug!(target: LOG_TARGET, "editor surface disposed");
        }
        self.core.file = None;
        self.core.state = BindingState::Unbound;
        result
    }

    fn absorb_edits(&mut self) {
        if let Some(at) = self.core.gate.take_edit() {
            self.user_edit(at);
        }
    }

    fn arm_save(&mut self, at: Instant) {
        self.persister
            .arm(|core: &mut BindingCore<A, H>| core.persist(), at);
    }

    /// 現在のファイルの書き込みをすべて終わらせる
    fn release_current(&mut self) -> Result<()> {
        self.persister.cancel();

        if let PersistOutcome::Failed(err) = self.core.settle_in_flight() {
            log::warn!(target: LOG_TARGET, "in-flight write failed: {}", err);
        }

        if self.core.state == BindingState::Dirty {
            if let Some(file) = &self.core.file {
                log::debug!(target: LOG_TARGET, "flushing {} before release", file);
            }
            self.flush_blocking()?;
        }
        Ok(())
    }

    /// 同期的に保存。失敗したら一度だけ再試行する
    fn flush_blocking(&mut self) -> Result<()> {
        let mut retried = false;
        loop {
            let outcome = self
                .persister
                .flush_now(|core: &mut BindingCore<A, H>| core.persist(), &mut self.core);
            let outcome = match outcome {
                PersistOutcome::InFlight => self.core.settle_in_flight(),
                other => other,
            };

            match outcome {
                PersistOutcome::Saved | PersistOutcome::Skipped | PersistOutcome::InFlight => {
                    return Ok(())
                }
                PersistOutcome::Failed(err) if !retried => {
                    log::warn!(target: LOG_TARGET, "flush failed, retrying once: {}", err);
                    retried = true;
                }
                PersistOutcome::Failed(_) => return Err(self.unsaved_content()),
            }
        }
    }

    fn after_persist(&mut self, outcome: PersistOutcome, now: Instant) {
        match outcome {
            PersistOutcome::Saved => match self.core.state {
                // 書き込み中の編集が取り消され、保存内容と一致した
                BindingState::Bound => {
                    self.persister.cancel();
                }
                BindingState::Dirty if !self.persister.is_armed() => self.arm_save(now),
                _ => {}
            },
            PersistOutcome::Failed(_) => {
                if self.persister.is_armed() {
                    return;
                }
                if self.core.retry_used {
                    log::error!(
                        target: LOG_TARGET,
                        "automatic retry exhausted; waiting for the next edit or flush"
                    );
                } else {
                    self.core.retry_used = true;
                    log::warn!(
                        target: LOG_TARGET,
                        "save failed, retrying in {:?}",
                        self.persister.delay()
                    );
                    self.arm_save(now);
                }
            }
            PersistOutcome::InFlight | PersistOutcome::Skipped => {}
        }
    }

    fn unsaved_content(&self) -> BindingError {
        BindingError::UnsavedContent {
            path: self
                .core
                .file
                .as_ref()
                .map(BoundFile::display_path)
                .unwrap_or_default(),
            content: self
                .core
                .adapter
                .as_ref()
                .map(EditorAdapter::content)
                .unwrap_or_default(),
        }
    }
}

impl<A, H> fmt::Debug for DocumentBinding<A, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentBinding")
            .field("state", &self.core.state)
            .field("file", &self.core.file)
            .field("has_adapter", &self.core.adapter.is_some())
            .field("persister", &self.persister)
            .finish()
    }
}
