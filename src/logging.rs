//! ロギングシステム
//!
//! `log` ファサードのバックエンド。stderr とファイルへの出力に対応

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use log::{Level, LevelFilter, Log, Metadata, Record};

use crate::error::{BindingError, Result};

/// ロガー
///
/// * 開発者向け詳細ログを stderr へ出力
/// * ホストの診断画面向けにファイルへ追記出力
#[derive(Debug)]
pub struct Logger {
    level: LevelFilter,
    output_stderr: bool,
    output_file: Option<PathBuf>,
    file_lock: Mutex<()>,
}

impl Logger {
    /// デフォルト構築
    pub fn new(level: LevelFilter) -> Self {
        Self {
            level,
            output_stderr: true,
            output_file: None,
            file_lock: Mutex::new(()),
        }
    }

    /// 開発者向けロガー
    pub fn for_development() -> Self {
        Self::new(LevelFilter::Debug)
    }

    /// ログレベルを取得
    pub fn level(&self) -> LevelFilter {
        self.level
    }

    /// ログレベルを変更
    pub fn with_level(mut self, level: LevelFilter) -> Self {
        self.level = level;
        self
    }

    /// ファイル出力を設定
    pub fn with_file_output<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.output_file = Some(path.into());
        self
    }

    /// 標準エラー出力を無効化（テスト向け）
    pub fn without_stderr(mut self) -> Self {
        self.output_stderr = false;
        self
    }

    fn should_log(&self, level: Level) -> bool {
        level <= self.level
    }

    fn format(record: &Record) -> String {
        format!(
            "{}: [{}] {}",
            tag(record.level()),
            record.target(),
            record.args()
        )
    }

    fn write_line(&self, line: &str) {
        if self.output_stderr {
            eprintln!("{}", line);
        }

        if let Some(path) = &self.output_file {
            let _guard = self.file_lock.lock();
            if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
                let _ = writeln!(file, "{}", line);
            }
        }
    }
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.should_log(metadata.level())
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            self.write_line(&Self::format(record));
        }
    }

    fn flush(&self) {}
}

fn tag(level: Level) -> &'static str {
    match level {
        Level::Trace => "TRACE",
        Level::Debug => "DEBUG",
        Level::Info => "INFO",
        Level::Warn => "WARNING",
        Level::Error => "ERROR",
    }
}

/// ロガーをグローバルに登録（一度だけ）
pub fn init(logger: Logger) -> Result<()> {
    let level = logger.level();
    log::set_logger(Box::leak(Box::new(logger)))
        .map_err(|err| BindingError::Config(format!("logger already installed: {err}")))?;
    log::set_max_level(level);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_logger_respects_log_level() {
        let logger = Logger::for_development().without_stderr();
        assert!(logger.should_log(Level::Debug));
        assert!(logger.should_log(Level::Error));
        assert!(!logger.should_log(Level::Trace));

        let info_logger = Logger::for_development()
            .with_level(LevelFilter::Info)
            .without_stderr();
        assert!(!info_logger.should_log(Level::Debug));
        assert!(info_logger.should_log(Level::Warn));
    }

    #[test]
    fn test_file_output_appends_formatted_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("view.log");
        let logger = Logger::new(LevelFilter::Info)
            .without_stderr()
            .with_file_output(&path);

        logger.log(
            &Record::builder()
                .level(Level::Warn)
                .target("iniview::binding")
                .args(format_args!("load failed for {}", "a.ini"))
                .build(),
        );
        logger.log(
            &Record::builder()
                .level(Level::Debug)
                .target("iniview::binding")
                .args(format_args!("dropped"))
                .build(),
        );

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, "WARNING: [iniview::binding] load failed for a.ini\n");
    }

    #[test]
    fn test_init_installs_logger_once() {
        init(Logger::new(LevelFilter::Warn).without_stderr()).unwrap();
        assert_eq!(log::max_level(), LevelFilter::Warn);

        let err = init(Logger::for_development()).unwrap_err();
        assert!(matches!(err, BindingError::Config(_)));
    }
}
