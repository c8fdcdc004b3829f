//! 有界工作池：每个工作线程从共享游标认领下一项，结果按线程局部累积。

use std::sync::{Mutex, PoisonError};

use crate::error::ConfigError;

/// `workers == 1` 时顺序执行，不建线程池
pub struct Dispatcher {
    workers: usize,
    pool: Option<rayon::ThreadPool>,
}

impl Dispatcher {
    pub fn new(workers: usize) -> Result<Self, ConfigError> {
        if workers < 1 {
            return Err(ConfigError::too_small("workers", 1, workers as i64));
        }
        let pool = if workers > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(workers)
                .build()
                .map_err(|e| ConfigError::Pool(e.to_string()))?;
            log::debug!("worker pool with {} threads", workers);
            Some(pool)
        } else {
            None
        };
        Ok(Self { workers, pool })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// 每个工作线程以 `init()` 开始，逐个认领 `items` 并调用 `step`，
    /// 返回所有线程的累积值（顺序与线程完成顺序有关）。
    pub fn fold_claimed<T, A, I, F>(&self, items: &[T], init: I, step: F) -> Vec<A>
    where
        T: Sync,
        A: Send,
        I: Fn() -> A + Sync,
        F: Fn(&mut A, usize, &T) + Sync,
    {
        let pool = match &self.pool {
            Some(pool) => pool,
            None => {
                let mut acc = init();
                for (i, item) in items.iter().enumerate() {
                    step(&mut acc, i, item);
                }
                return vec![acc];
            }
        };

        let cursor = Mutex::new(0usize);
        let done = Mutex::new(Vec::with_capacity(self.workers));
        pool.scope(|s| {
            for _ in 0..self.workers {
                s.spawn(|_| {
                    let mut acc = init();
                    loop {
                        let i = {
                            let mut c = cursor.lock().unwrap_or_else(PoisonError::into_inner);
                            let i = *c;
                            *c += 1;
                            i
                        };
                        if i >= items.len() {
                            break;
                        }
                        step(&mut acc, i, &items[i]);
                    }
                    done.lock().unwrap_or_else(PoisonError::into_inner).push(acc);
                });
            }
        });
        done.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    /// 对每一项调用 `f`，结果保持输入顺序
    pub fn map_claimed<T, R, F>(&self, items: &[T], f: F) -> Vec<R>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Sync,
    {
        let parts = self.fold_claimed(items, Vec::new, |acc: &mut Vec<(usize, R)>, i, item| acc.push((i, f(item))));
        let mut all: Vec<(usize, R)> = parts.into_iter().flatten().collect();
        all.sort_by_key(|(i, _)| *i);
        all.into_iter().map(|(_, r)| r).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_workers_rejected() {
        assert!(Dispatcher::new(0).is_err());
    }

    #[test]
    fn map_keeps_order() {
        let items: Vec<u64> = (0..100).collect();
        for workers in [1, 4] {
            let d = Dispatcher::new(workers).unwrap();
            let out = d.map_claimed(&items, |x| x * x);
            assert_eq!(out, items.iter().map(|x| x * x).collect::<Vec<_>>());
        }
    }

    #[test]
    fn fold_visits_every_item_once() {
        let items: Vec<u64> = (1..=1000).collect();
        let d = Dispatcher::new(3).unwrap();
        let parts = d.fold_claimed(&items, || 0u64, |acc, _, x| *acc += x);
        assert!(parts.len() <= 3);
        assert_eq!(parts.iter().sum::<u64>(), 500_500);
    }
}
