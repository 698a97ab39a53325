//! メモリ上のホスト実装
//!
//! 組み込み先やテストで使う。読み書きの履歴を記録し、失敗や
//! 完了待ちの書き込みを再現できる。

use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use super::{BoundFile, HostFiles, PendingWrite, WriteTicket};
use crate::error::{HostError, HostResult};

/// ホストで発生した操作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    Read(PathBuf),
    Write(PathBuf, String),
    WriteFailed(PathBuf),
}

#[derive(Debug, Default)]
struct HostState {
    files: BTreeMap<PathBuf, String>,
    events: Vec<HostEvent>,
    read_failures: HashSet<PathBuf>,
    empty_reads: HashSet<PathBuf>,
    write_failures: usize,
    deferred: bool,
    in_flight: Vec<Rc<RefCell<WriteSlot>>>,
}

#[derive(Debug)]
struct WriteSlot {
    path: PathBuf,
    text: String,
    outcome: Option<HostResult<()>>,
}

impl HostState {
    fn commit(&mut self, path: &Path, text: &str) -> HostResult<()> {
        if self.write_failures > 0 {
            self.write_failures -= 1;
            self.events.push(HostEvent::WriteFailed(path.to_path_buf()));
            return Err(HostError::Io {
                message: format!("injected write failure for {}", path.display()),
            });
        }

        self.files.insert(path.to_path_buf(), text.to_string());
        self.events
            .push(HostEvent::Write(path.to_path_buf(), text.to_string()));
        Ok(())
    }

    fn settle(&mut self, slot: &Rc<RefCell<WriteSlot>>) -> HostResult<()> {
        let mut slot_ref = slot.borrow_mut();
        if let Some(outcome) = &slot_ref.outcome {
            return outcome.clone();
        }
        let outcome = self.commit(&slot_ref.path, &slot_ref.text);
        slot_ref.outcome = Some(outcome.clone());
        drop(slot_ref);
        self.in_flight.retain(|other| !Rc::ptr_eq(other, slot));
        outcome
    }
}

/// メモリ上のファイルサービス。クローンは同じ状態を共有する
#[derive(Debug, Clone, Default)]
pub struct MemoryHost {
    state: Rc<RefCell<HostState>>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// ファイルを追加
    pub fn with_file<P: Into<PathBuf>>(self, path: P, content: &str) -> Self {
        self.insert_file(path, content);
        self
    }

    pub fn insert_file<P: Into<PathBuf>>(&self, path: P, content: &str) {
        self.state
            .borrow_mut()
            .files
            .insert(path.into(), content.to_string());
    }

    /// 現在の保存内容
    pub fn content<P: AsRef<Path>>(&self, path: P) -> Option<String> {
        self.state.borrow().files.get(path.as_ref()).cloned()
    }

    /// 操作履歴
    pub fn events(&self) -> Vec<HostEvent> {
        self.state.borrow().events.clone()
    }

    /// 成功した書き込み（パス, 内容）
    pub fn writes(&self) -> Vec<(PathBuf, String)> {
        self.state
            .borrow()
            .events
            .iter()
            .filter_map(|event| match event {
                HostEvent::Write(path, text) => Some((path.clone(), text.clone())),
                _ => None,
            })
            .collect()
    }

    /// 指定ファイルへの成功した書き込み
    pub fn writes_to<P: AsRef<Path>>(&self, path: P) -> Vec<String> {
        self.writes()
            .into_iter()
            .filter(|(written, _)| written == path.as_ref())
            .map(|(_, text)| text)
            .collect()
    }

    pub fn clear_events(&self) {
        self.state.borrow_mut().events.clear();
    }

    /// 指定ファイルの読み込みを失敗させる
    pub fn fail_reads_for<P: Into<PathBuf>>(&self, path: P) {
        self.state.borrow_mut().read_failures.insert(path.into());
    }

    /// 指定ファイルの読み込みで何も返さない
    pub fn return_nothing_for<P: Into<PathBuf>>(&self, path: P) {
        self.state.borrow_mut().empty_reads.insert(path.into());
    }

    /// 次の `count` 回の書き込みを失敗させる
    pub fn fail_next_writes(&self, count: usize) {
        self.state.borrow_mut().write_failures = count;
    }

    /// 書き込みを保留状態で返すかどうか
    pub fn set_deferred_writes(&self, deferred: bool) {
        self.state.borrow_mut().deferred = deferred;
    }

    /// 完了していない書き込みの数
    pub fn in_flight_writes(&self) -> usize {
        self.state.borrow().in_flight.len()
    }

    /// 保留中の書き込みを発行順に完了させる
    pub fn complete_pending_writes(&self) -> usize {
        let slots: Vec<_> = self.state.borrow().in_flight.clone();
        let mut state = self.state.borrow_mut();
        for slot in &slots {
            let _ = state.settle(slot);
        }
        slots.len()
    }
}

impl HostFiles for MemoryHost {
    fn read(&self, file: &BoundFile) -> HostResult<Option<String>> {
        let mut state = self.state.borrow_mut();
        let path = file.path().to_path_buf();
        state.events.push(HostEvent::Read(path.clone()));

        if state.read_failures.contains(&path) {
            return Err(HostError::Io {
                message: format!("injected read failure for {}", path.display()),
            });
        }
        if state.empty_reads.contains(&path) {
            return Ok(None);
        }

        match state.files.get(&path) {
            Some(content) => Ok(Some(content.clone())),
            None => Err(HostError::NotFound {
                path: path.display().to_string(),
            }),
        }
    }

    fn write(&self, file: &BoundFile, text: &str) -> WriteTicket {
        let mut state = self.state.borrow_mut();
        if !state.deferred {
            return WriteTicket::Settled(state.commit(file.path(), text));
        }

        let slot = Rc::new(RefCell::new(WriteSlot {
            path: file.path().to_path_buf(),
            text: text.to_string(),
            outcome: None,
        }));
        state.in_flight.push(Rc::clone(&slot));
        WriteTicket::Pending(Box::new(MemoryPendingWrite {
            slot,
            state: Rc::clone(&self.state),
        }))
    }
}

struct MemoryPendingWrite {
    slot: Rc<RefCell<WriteSlot>>,
    state: Rc<RefCell<HostState>>,
}

impl PendingWrite for MemoryPendingWrite {
    fn poll(&mut self) -> Option<HostResult<()>> {
        self.slot.borrow().outcome.clone()
    }

    fn wait(self: Box<Self>) -> HostResult<()> {
        // 完了待ち：ホスト側の I/O をここで終わらせる
        let mut state = self.state.borrow_mut();
        state.settle(&self.slot)
    }
}
