//! Day-partitioned rotating log file.
//!
//! The active file is `<name>-<YYYY-MM-DD>.log` with daily rotation enabled and
//! `<name>.log` otherwise. Size rotation, backup retention and compression of
//! the active file are delegated to `file_rotate`; rotated siblings follow its
//! timestamp suffix convention (`<active>.<YYYYMMDDTHHMMSS>[.gz]`).
//!
//! Day changes are detected lazily: the first write after midnight reopens at
//! the new date-stamped path before writing. The hourly watcher only flags the
//! pending rollover.

use chrono::{Datelike, Local, NaiveDate, NaiveDateTime};
use file_rotate::{
    ContentLimit, FileRotate,
    compression::Compression,
    suffix::{AppendTimestamp, FileLimit},
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::time::Duration;

const DAY_WATCH_INTERVAL: Duration = Duration::from_secs(60 * 60);
const MEGABYTE: u64 = 1024 * 1024;

/// Source of the current local time
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> NaiveDateTime;
}

/// Wall clock in the local timezone
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// File rotation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationConfig {
    /// Directory holding the log files
    pub directory: PathBuf,
    /// Base file name without extension
    pub file_name: String,
    /// Size limit of the active file in megabytes (0 disables size rotation)
    pub max_size_mb: u64,
    /// Number of rotated files to keep (0 keeps all)
    pub max_backups: usize,
    /// Days to keep rotated files (0 keeps them forever)
    pub max_age_days: u64,
    /// Gzip rotated files
    pub compress: bool,
    /// One file per calendar day
    pub daily: bool,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./storage/logs"),
            file_name: "app".to_string(),
            max_size_mb: 10,
            max_backups: 5,
            max_age_days: 28,
            compress: true,
            daily: true,
        }
    }
}

impl RotationConfig {
    /// Path of the active file for a given day
    pub fn active_path(&self, day: NaiveDate) -> PathBuf {
        let name = if self.daily {
            format!("{}-{}.log", self.file_name, day.format("%Y-%m-%d"))
        } else {
            format!("{}.log", self.file_name)
        };
        self.directory.join(name)
    }

    /// Rotate once the active file has grown past the size limit.
    ///
    /// Records are never split across files.
    fn content_limit(&self) -> ContentLimit {
        match usize::try_from(self.max_size_mb.saturating_mul(MEGABYTE)) {
            Ok(0) => ContentLimit::None,
            Ok(bytes) => ContentLimit::BytesSurpassed(bytes),
            Err(_) => ContentLimit::BytesSurpassed(usize::MAX),
        }
    }

    /// Backup retention. The count limit wins when both are set.
    fn file_limit(&self) -> FileLimit {
        if self.max_backups > 0 {
            return FileLimit::MaxFiles(self.max_backups);
        }
        i64::try_from(self.max_age_days)
            .ok()
            .filter(|days| *days > 0)
            .and_then(chrono::Duration::try_days)
            .map_or(FileLimit::Unlimited, FileLimit::Age)
    }

    fn compression(&self) -> Compression {
        if self.compress {
            Compression::OnRotate(0)
        } else {
            Compression::None
        }
    }

    fn open_rotating(&self, path: &Path) -> FileRotate<AppendTimestamp> {
        FileRotate::new(
            path,
            AppendTimestamp::default(self.file_limit()),
            self.content_limit(),
            self.compression(),
            #[cfg(unix)]
            None,
        )
    }
}

fn day_number(day: NaiveDate) -> i32 {
    day.num_days_from_ce()
}

struct DayState {
    clock: Arc<dyn Clock>,
    daily: bool,
    day: AtomicI32,
    rollover_pending: AtomicBool,
}

/// Handle on the writer's current day, shared with the background watcher
#[derive(Clone)]
pub struct DayWatch {
    state: Arc<DayState>,
}

impl std::fmt::Debug for DayWatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DayWatch")
            .field("daily", &self.state.daily)
            .field("rollover_pending", &self.rollover_pending())
            .finish()
    }
}

impl DayWatch {
    /// Flag a pending rollover if the day changed since the last write.
    ///
    /// The swap itself happens on the next write.
    pub fn check_day_boundary(&self) -> bool {
        if !self.state.daily {
            return false;
        }
        let today = day_number(self.state.clock.now().date());
        let changed = today != self.state.day.load(Ordering::Acquire);
        if changed {
            self.state.rollover_pending.store(true, Ordering::Release);
        }
        changed
    }

    /// Whether the watcher has flagged a rollover that no write has performed yet
    pub fn rollover_pending(&self) -> bool {
        self.state.rollover_pending.load(Ordering::Acquire)
    }

    /// Spawn the hourly day-boundary watcher on the current tokio runtime
    pub fn spawn(&self) -> tokio::task::JoinHandle<()> {
        let watch = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(DAY_WATCH_INTERVAL);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if watch.check_day_boundary() {
                    tracing::debug!("Log day boundary crossed, rollover pending");
                }
            }
        })
    }
}

/// Log file writer that starts a new file each calendar day
pub struct RotatingFileWriter {
    config: RotationConfig,
    state: Arc<DayState>,
    path: PathBuf,
    file: FileRotate<AppendTimestamp>,
}

impl std::fmt::Debug for RotatingFileWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RotatingFileWriter")
            .field("config", &self.config)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl RotatingFileWriter {
    /// Open the writer using the system clock
    pub fn open(config: RotationConfig) -> io::Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Open the writer with an explicit clock
    pub fn with_clock(config: RotationConfig, clock: Arc<dyn Clock>) -> io::Result<Self> {
        fs::create_dir_all(&config.directory)?;

        let day = clock.now().date();
        let path = config.active_path(day);
        let file = config.open_rotating(&path);

        Ok(Self {
            state: Arc::new(DayState {
                clock,
                daily: config.daily,
                day: AtomicI32::new(day_number(day)),
                rollover_pending: AtomicBool::new(false),
            }),
            config,
            path,
            file,
        })
    }

    /// Path of the file currently being written
    pub fn current_path(&self) -> &Path {
        &self.path
    }

    /// Handle for the background day-boundary watcher
    pub fn day_watch(&self) -> DayWatch {
        DayWatch {
            state: Arc::clone(&self.state),
        }
    }

    fn reopen_for_day(&mut self, day: NaiveDate) -> io::Result<()> {
        self.file.flush()?;
        let path = self.config.active_path(day);
        self.file = self.config.open_rotating(&path);
        self.path = path;
        self.state.day.store(day_number(day), Ordering::Release);
        Ok(())
    }
}

impl Write for RotatingFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.config.daily {
            self.state.rollover_pending.store(false, Ordering::Release);
            let today = self.state.clock.now().date();
            if day_number(today) != self.state.day.load(Ordering::Acquire) {
                self.reopen_for_day(today)?;
            }
        }

        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::fs::File;
    use std::io::Read;
    use std::sync::Mutex;

    /// Clock that only moves when told to
    struct ManualClock(Mutex<NaiveDateTime>);

    impl ManualClock {
        fn at(value: &str) -> Arc<Self> {
            Arc::new(Self(Mutex::new(
                NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S").unwrap(),
            )))
        }

        fn set(&self, value: &str) {
            *self.0.lock().unwrap() =
                NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S").unwrap();
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> NaiveDateTime {
            *self.0.lock().unwrap()
        }
    }

    fn config(dir: &Path) -> RotationConfig {
        RotationConfig {
            directory: dir.to_path_buf(),
            file_name: "app".to_string(),
            max_size_mb: 0,
            max_backups: 0,
            max_age_days: 0,
            compress: false,
            daily: true,
        }
    }

    fn log_files(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    fn backups(dir: &Path, active: &str) -> Vec<String> {
        let prefix = format!("{}.", active);
        log_files(dir)
            .into_iter()
            .filter(|name| name.starts_with(&prefix))
            .collect()
    }

    #[test]
    fn test_daily_file_is_date_stamped() {
        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::at("2024-03-01 10:00:00");
        let writer = RotatingFileWriter::with_clock(config(dir.path()), clock).unwrap();

        assert_eq!(writer.current_path(), dir.path().join("app-2024-03-01.log"));
    }

    #[test]
    fn test_fixed_file_without_daily_rotation() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path());
        cfg.daily = false;
        let clock = ManualClock::at("2024-03-01 10:00:00");
        let mut writer = RotatingFileWriter::with_clock(cfg, clock.clone()).unwrap();

        writer.write_all(b"first\n").unwrap();
        clock.set("2024-03-02 00:00:01");
        writer.write_all(b"second\n").unwrap();
        writer.flush().unwrap();

        assert_eq!(log_files(dir.path()), vec!["app.log"]);
        let content = fs::read_to_string(dir.path().join("app.log")).unwrap();
        assert_eq!(content, "first\nsecond\n");
    }

    #[test]
    fn test_day_change_rotates_before_write() {
        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::at("2024-03-01 23:59:59");
        let mut writer =
            RotatingFileWriter::with_clock(config(dir.path()), clock.clone()).unwrap();

        writer.write_all(b"before midnight\n").unwrap();
        clock.set("2024-03-02 00:00:01");
        writer.write_all(b"after midnight\n").unwrap();
        writer.write_all(b"still the same day\n").unwrap();
        writer.flush().unwrap();

        assert_eq!(
            log_files(dir.path()),
            vec!["app-2024-03-01.log", "app-2024-03-02.log"]
        );
        let old = fs::read_to_string(dir.path().join("app-2024-03-01.log")).unwrap();
        let new = fs::read_to_string(dir.path().join("app-2024-03-02.log")).unwrap();
        assert_eq!(old, "before midnight\n");
        assert_eq!(new, "after midnight\nstill the same day\n");
    }

    #[test]
    fn test_watcher_flags_but_does_not_swap() {
        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::at("2024-03-01 23:00:00");
        let mut writer =
            RotatingFileWriter::with_clock(config(dir.path()), clock.clone()).unwrap();
        let watch = writer.day_watch();

        assert!(!watch.check_day_boundary());
        clock.set("2024-03-02 00:30:00");
        assert!(watch.check_day_boundary());
        assert!(watch.rollover_pending());
        assert_eq!(writer.current_path(), dir.path().join("app-2024-03-01.log"));

        writer.write_all(b"new day\n").unwrap();
        assert!(!watch.rollover_pending());
        assert!(!watch.check_day_boundary());
        assert_eq!(writer.current_path(), dir.path().join("app-2024-03-02.log"));
    }

    #[test]
    fn test_watcher_ignores_fixed_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path());
        cfg.daily = false;
        let clock = ManualClock::at("2024-03-01 23:00:00");
        let writer = RotatingFileWriter::with_clock(cfg, clock.clone()).unwrap();

        clock.set("2024-03-05 00:00:00");
        assert!(!writer.day_watch().check_day_boundary());
    }

    #[test]
    fn test_size_rotation_with_compression() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path());
        cfg.max_size_mb = 1;
        cfg.compress = true;
        let clock = ManualClock::at("2024-03-01 10:00:00");
        let mut writer = RotatingFileWriter::with_clock(cfg, clock).unwrap();

        let chunk = vec![b'a'; 1100 * 1024];
        writer.write_all(&chunk).unwrap();
        writer.write_all(b"next\n").unwrap();
        writer.flush().unwrap();

        let active = fs::read_to_string(dir.path().join("app-2024-03-01.log")).unwrap();
        assert_eq!(active, "next\n");

        let rotated = backups(dir.path(), "app-2024-03-01.log");
        assert_eq!(rotated.len(), 1, "{:?}", rotated);
        assert!(rotated[0].ends_with(".gz"));

        let mut decoded = Vec::new();
        GzDecoder::new(File::open(dir.path().join(&rotated[0])).unwrap())
            .read_to_end(&mut decoded)
            .unwrap();
        assert_eq!(decoded, chunk);
    }

    #[test]
    fn test_backups_are_limited_by_count() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path());
        cfg.max_size_mb = 1;
        cfg.max_backups = 2;
        let clock = ManualClock::at("2024-03-01 10:00:00");
        let mut writer = RotatingFileWriter::with_clock(cfg, clock).unwrap();

        let chunk = vec![b'b'; 1100 * 1024];
        for _ in 0..5 {
            writer.write_all(&chunk).unwrap();
        }
        writer.flush().unwrap();

        let rotated = backups(dir.path(), "app-2024-03-01.log");
        assert!(!rotated.is_empty());
        assert!(rotated.len() <= 2, "{:?}", rotated);
    }

    #[test]
    fn test_retention_and_size_mapping() {
        let mut cfg = RotationConfig::default();
        assert!(matches!(cfg.file_limit(), FileLimit::MaxFiles(5)));
        assert!(matches!(
            cfg.content_limit(),
            ContentLimit::BytesSurpassed(bytes) if bytes == 10 * 1024 * 1024
        ));

        cfg.max_backups = 0;
        assert!(matches!(
            cfg.file_limit(),
            FileLimit::Age(age) if age == chrono::Duration::days(28)
        ));

        cfg.max_age_days = 0;
        cfg.max_size_mb = 0;
        assert!(matches!(cfg.file_limit(), FileLimit::Unlimited));
        assert!(matches!(cfg.content_limit(), ContentLimit::None));
    }
}
