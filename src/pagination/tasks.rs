//! pagination/tasks - супервизируемый набор фоновых записей страниц.
//!
//! Политика "fire-and-forget" сохраняется: вызывающий не ждёт, отмены нет,
//! handle задачи не возвращается. Но набор считает in-flight / completed / failed,
//! ловит панику внутри задачи (она логируется, а не теряется молча)
//! и позволяет дождаться опустошения при остановке (wait_idle).

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use crate::logging::Logger;
use crate::store::StoreError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TaskCounts {
    pub in_flight: u64,
    pub completed: u64,
    pub failed: u64,
}

struct TaskState {
    counts: Mutex<TaskCounts>,
    cv: Condvar,
}

impl TaskState {
    fn lock(&self) -> MutexGuard<'_, TaskCounts> {
        self.counts.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[derive(Clone)]
pub struct BackgroundTasks {
    state: Arc<TaskState>,
}

impl Default for BackgroundTasks {
    fn default() -> Self {
        Self::new()
    }
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self {
            state: Arc::new(TaskState {
                counts: Mutex::new(TaskCounts::default()),
                cv: Condvar::new(),
            }),
        }
    }

    /// Запустить задачу в отдельном потоке. Ошибка/паника задачи только логируется.
    pub fn spawn<F>(&self, label: String, log: Logger, job: F)
    where
        F: FnOnce() -> Result<(), StoreError> + Send + 'static,
    {
        self.state.lock().in_flight += 1;

        let state = self.state.clone();
        let thread_log = log.clone();
        let thread_label = label.clone();
        let spawned = thread::Builder::new()
            .name("dp-page-writer".into())
            .spawn(move || {
                let ok = match catch_unwind(AssertUnwindSafe(job)) {
                    Ok(Ok(())) => true,
                    Ok(Err(e)) => {
                        thread_log.error(format_args!("{}: background write failed - {}", thread_label, e));
                        false
                    }
                    Err(_) => {
                        thread_log.error(format_args!("{}: background write panicked", thread_label));
                        false
                    }
                };
                finish(&state, ok);
            });

        if let Err(e) = spawned {
            log.error(format_args!("{}: cannot spawn background writer - {}", label, e));
            finish(&self.state, false);
        }
    }

    pub fn counts(&self) -> TaskCounts {
        *self.state.lock()
    }

    pub fn in_flight(&self) -> u64 {
        self.counts().in_flight
    }

    /// Ждать, пока in_flight станет 0. None - без таймаута.
    /// Возвращает true, если набор опустел до истечения таймаута.
    pub fn wait_idle(&self, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut g = self.state.lock();
        while g.in_flight > 0 {
            match deadline {
                None => {
                    g = self.state.cv.wait(g).unwrap_or_else(|e| e.into_inner());
                }
                Some(d) => {
                    let now = Instant::now();
                    if now >= d {
                        return false;
                    }
                    g = self
                        .state
                        .cv
                        .wait_timeout(g, d - now)
                        .unwrap_or_else(|e| e.into_inner())
                        .0;
                }
            }
        }
        true
    }
}

fn finish(state: &TaskState, ok: bool) {
    let mut g = state.lock();
    g.in_flight = g.in_flight.saturating_sub(1);
    if ok {
        g.completed += 1;
    } else {
        g.failed += 1;
    }
    drop(g);
    state.cv.notify_all();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn counts_success_failure_and_panic() {
        let tasks = BackgroundTasks::new();
        let log = Logger::root();
        tasks.spawn("ok".into(), log.clone(), || Ok(()));
        tasks.spawn("err".into(), log.clone(), || Err(StoreError::InvalidPageReference));
        tasks.spawn("panic".into(), log, || panic!("boom"));
        assert!(tasks.wait_idle(Some(Duration::from_secs(10))));
        let c = tasks.counts();
        assert_eq!(c.in_flight, 0);
        assert_eq!(c.completed, 1);
        assert_eq!(c.failed, 2);
    }

    #[test]
    fn wait_idle_times_out_while_job_blocked() {
        let tasks = BackgroundTasks::new();
        let (tx, rx) = mpsc::channel::<()>();
        tasks.spawn("blocked".into(), Logger::root(), move || {
            let _ = rx.recv();
            Ok(())
        });
        assert!(!tasks.wait_idle(Some(Duration::from_millis(50))));
        assert_eq!(tasks.in_flight(), 1);
        tx.send(()).unwrap();
        assert!(tasks.wait_idle(Some(Duration::from_secs(10))));
    }
}
