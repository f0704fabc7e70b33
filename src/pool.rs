//! pool - ограниченный пул переиспользуемых воркеров (rendezvous allocator).
//!
//! Контракт:
//! - acquire() блокирует, пока нет свободного воркера и лимит исчерпан (back-pressure);
//! - Lease - RAII: воркер возвращается в пул в Drop на ЛЮБОМ пути выхода,
//!   включая ошибки и раскрутку паники;
//! - за всё время жизни пула создаётся не больше `max` воркеров (лениво, по требованию);
//! - перед возвратом вызывается Recycle::recycle - устаревшие данные (scratch)
//!   не видны следующему владельцу.

use std::ops::{Deref, DerefMut};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Сброс состояния воркера перед повторным использованием.
pub trait Recycle {
    fn recycle(&mut self);
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub max: usize,
    pub created: usize,
    pub idle: usize,
    pub leased: usize,
}

struct PoolState<W> {
    idle: Vec<W>,
    created: usize,
    leased: usize,
}

type Factory<W> = Box<dyn Fn(usize) -> W + Send + Sync>;

pub struct HandlerPool<W: Recycle> {
    state: Mutex<PoolState<W>>,
    cv: Condvar,
    max: usize,
    factory: Factory<W>,
}

impl<W: Recycle> HandlerPool<W> {
    /// `factory(id)` вызывается лениво, не более `max` раз. `max` < 1 трактуется как 1.
    pub fn new<F>(max: usize, factory: F) -> Self
    where
        F: Fn(usize) -> W + Send + Sync + 'static,
    {
        let max = max.max(1);
        Self {
            state: Mutex::new(PoolState {
                idle: Vec::with_capacity(max),
                created: 0,
                leased: 0,
            }),
            cv: Condvar::new(),
            max,
            factory: Box::new(factory),
        }
    }

    pub fn max(&self) -> usize {
        self.max
    }

    /// Взять воркер; блокирует, пока не освободится один из `max`.
    pub fn acquire(&self) -> Lease<'_, W> {
        let mut g = self.lock();
        loop {
            if let Some(w) = self.take(&mut g) {
                return self.lease(w);
            }
            g = self.cv.wait(g).unwrap_or_else(|e| e.into_inner());
        }
    }

    /// Как acquire, но не дольше `timeout`.
    pub fn acquire_timeout(&self, timeout: Duration) -> Option<Lease<'_, W>> {
        let deadline = Instant::now() + timeout;
        let mut g = self.lock();
        loop {
            if let Some(w) = self.take(&mut g) {
                return Some(self.lease(w));
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            g = self
                .cv
                .wait_timeout(g, deadline - now)
                .unwrap_or_else(|e| e.into_inner())
                .0;
        }
    }

    /// Неблокирующая попытка.
    pub fn try_acquire(&self) -> Option<Lease<'_, W>> {
        let mut g = self.lock();
        self.take(&mut g).map(|w| self.lease(w))
    }

    pub fn stats(&self) -> PoolStats {
        let g = self.lock();
        PoolStats {
            max: self.max,
            created: g.created,
            idle: g.idle.len(),
            leased: g.leased,
        }
    }

    // ----------------- внутренняя логика -----------------

    fn lock(&self) -> MutexGuard<'_, PoolState<W>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Свободный воркер или новый (если лимит не исчерпан). Учитывает leased.
    fn take(&self, g: &mut PoolState<W>) -> Option<W> {
        let w = match g.idle.pop() {
            Some(w) => w,
            None if g.created < self.max => {
                let id = g.created;
                g.created += 1;
                (self.factory)(id)
            }
            None => return None,
        };
        g.leased += 1;
        Some(w)
    }

    fn lease(&self, w: W) -> Lease<'_, W> {
        Lease {
            pool: self,
            worker: Some(w),
        }
    }

    fn release(&self, mut w: W) {
        w.recycle();
        let mut g = self.lock();
        g.leased = g.leased.saturating_sub(1);
        g.idle.push(w);
        drop(g);
        self.cv.notify_one();
    }
}

/// Эксклюзивное владение воркером на время одного запроса.
pub struct Lease<'a, W: Recycle> {
    pool: &'a HandlerPool<W>,
    worker: Option<W>,
}

impl<'a, W: Recycle> Deref for Lease<'a, W> {
    type Target = W;
    fn deref(&self) -> &W {
        // worker - None только внутри Drop
        self.worker.as_ref().expect("lease already released")
    }
}

impl<'a, W: Recycle> DerefMut for Lease<'a, W> {
    fn deref_mut(&mut self) -> &mut W {
        self.worker.as_mut().expect("lease already released")
    }
}

impl<'a, W: Recycle> Drop for Lease<'a, W> {
    fn drop(&mut self) {
        if let Some(w) = self.worker.take() {
            self.pool.release(w);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Scratch(Vec<u8>);

    impl Recycle for Scratch {
        fn recycle(&mut self) {
            self.0.clear();
        }
    }

    #[test]
    fn lazily_creates_up_to_max() {
        let pool = HandlerPool::new(3, |_| Scratch(Vec::new()));
        assert_eq!(pool.stats().created, 0);
        {
            let _a = pool.acquire();
            assert_eq!(pool.stats(), PoolStats { max: 3, created: 1, idle: 0, leased: 1 });
        }
        let _a = pool.acquire();
        assert_eq!(pool.stats().created, 1, "idle worker is reused, not re-created");
    }

    #[test]
    fn try_acquire_respects_bound() {
        let pool = HandlerPool::new(2, |_| Scratch(Vec::new()));
        let a = pool.try_acquire();
        let b = pool.try_acquire();
        assert!(a.is_some() && b.is_some());
        assert!(pool.try_acquire().is_none());
        drop(a);
        assert!(pool.try_acquire().is_some());
    }

    #[test]
    fn recycled_before_reuse() {
        let pool = HandlerPool::new(1, |_| Scratch(Vec::new()));
        {
            let mut l = pool.acquire();
            l.0.extend_from_slice(b"secret page of a previous request");
        }
        let l = pool.acquire();
        assert!(l.0.is_empty());
    }

    #[test]
    fn acquire_timeout_expires_when_exhausted() {
        let pool = HandlerPool::new(1, |_| Scratch(Vec::new()));
        let _held = pool.acquire();
        assert!(pool.acquire_timeout(Duration::from_millis(30)).is_none());
    }
}
