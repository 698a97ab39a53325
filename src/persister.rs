//! 遅延保存
//!
//! 保留中の書き込みは常に一つだけ。再設定すると前の予定は取り消され、
//! 待ち時間は最後の設定から数え直す。

use std::fmt;
use std::time::{Duration, Instant};

use crate::config::DEFAULT_DEBOUNCE_MS;

type Writer<C, R> = Box<dyn FnOnce(&mut C) -> R>;

struct PendingSave<C, R> {
    due: Instant,
    writer: Writer<C, R>,
}

/// 書き込みをまとめる遅延タイマー
///
/// `C` は書き込み時に渡されるコンテキスト、`R` は書き込み結果。
pub struct DebouncedPersister<C, R = ()> {
    delay: Duration,
    pending: Option<PendingSave<C, R>>,
}

impl<C, R> DebouncedPersister<C, R> {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// 保留中の書き込みがあるか
    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }

    /// 書き込み予定時刻
    pub fn due_at(&self) -> Option<Instant> {
        self.pending.as_ref().map(|pending| pending.due)
    }

    /// 既定の待ち時間で書き込みを予約
    pub fn arm<F>(&mut self, writer: F, now: Instant)
    where
        F: FnOnce(&mut C) -> R + 'static,
    {
        self.arm_after(writer, self.delay, now);
    }

    /// 待ち時間を指定して予約。既存の予約は取り消す
    pub fn arm_after<F>(&mut self, writer: F, delay: Duration, now: Instant)
    where
        F: FnOnce(&mut C) -> R + 'static,
    {
        self.pending = Some(PendingSave {
            due: now + delay,
            writer: Box::new(writer),
        });
    }

    /// 予約を取り消す。予約が無ければ何もしない
    pub fn cancel(&mut self) -> bool {
        self.pending.take().is_some()
    }

    /// 予定時刻を過ぎていれば書き込みを一度だけ実行
    pub fn fire_due(&mut self, now: Instant, ctx: &mut C) -> Option<R> {
        match &self.pending {
            Some(pending) if pending.due <= now => {}
            _ => return None,
        }
        self.pending.take().map(|pending| (pending.writer)(ctx))
    }

    /// 予約を取り消して、指定の書き込みを即座に実行
    pub fn flush_now<F>(&mut self, writer: F, ctx: &mut C) -> R
    where
        F: FnOnce(&mut C) -> R,
    {
        self.cancel();
        writer(ctx)
    }
}

impl<C, R> Default for DebouncedPersister<C, R> {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_DEBOUNCE_MS))
    }
}

impl<C, R> fmt::Debug for DebouncedPersister<C, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DebouncedPersister")
            .field("delay", &self.delay)
            .field("due", &self.due_at())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push(label: &'static str) -> impl FnOnce(&mut Vec<&'static str>) {
        move |log: &mut Vec<&'static str>| log.push(label)
    }

    #[test]
    fn test_fires_once_after_quiet_period() {
        let start = Instant::now();
        let mut persister = DebouncedPersister::default();
        let mut log = Vec::new();

        persister.arm(push("save"), start);
        assert!(persister.fire_due(start + Duration::from_millis(1999), &mut log).is_none());
        assert!(persister.fire_due(start + Duration::from_millis(2000), &mut log).is_some());
        assert!(persister.fire_due(start + Duration::from_millis(9000), &mut log).is_none());
        assert_eq!(log, vec!["save"]);
    }

    #[test]
    fn test_rearming_resets_the_delay_and_replaces_the_writer() {
        let start = Instant::now();
        let mut persister = DebouncedPersister::default();
        let mut log = Vec::new();

        persister.arm(push("first"), start);
        persister.arm(push("second"), start + Duration::from_millis(1500));

        assert!(persister.fire_due(start + Duration::from_millis(2500), &mut log).is_none());
        persister.fire_due(start + Duration::from_millis(3500), &mut log);
        assert_eq!(log, vec!["second"]);
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let start = Instant::now();
        let mut persister = DebouncedPersister::default();
        let mut log = Vec::new();

        persister.arm(push("save"), start);
        assert!(persister.cancel());
        assert!(!persister.cancel());
        assert!(persister.fire_due(start + Duration::from_secs(10), &mut log).is_none());
        assert!(log.is_empty());
    }

    #[test]
    fn test_flush_now_runs_immediately_and_drops_pending() {
        let start = Instant::now();
        let mut persister: DebouncedPersister<Vec<&'static str>> =
            DebouncedPersister::new(Duration::from_millis(100));
        let mut log = Vec::new();

        persister.arm(push("timer"), start);
        persister.flush_now(push("flush"), &mut log);

        assert!(!persister.is_armed());
        persister.fire_due(start + Duration::from_secs(1), &mut log);
        assert_eq!(log, vec!["flush"]);
    }

    #[test]
    fn test_writer_result_is_returned() {
        let start = Instant::now();
        let mut persister: DebouncedPersister<u32, u32> = DebouncedPersister::new(Duration::ZERO);
        let mut calls = 0;

        persister.arm(
            |calls: &mut u32| {
                *calls += 1;
                *calls
            },
            start,
        );
        assert_eq!(persister.fire_due(start, &mut calls), Some(1));
    }
}
