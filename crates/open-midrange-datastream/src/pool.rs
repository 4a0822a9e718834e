//! Reusable header buffers.
//!
//! Every received frame starts with a 20-byte header read before its length
//! is known. The pool lends out fixed header buffers so the dispatcher does
//! not allocate one per frame. A buffer is marked in use while its
//! [`HeaderBuffer`] guard is alive and goes back to the pool when the guard
//! drops, on error paths too.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::code_points::HEADER_LENGTH;

type Header = Box<[u8; HEADER_LENGTH]>;

/// Pool of header-sized buffers.
#[derive(Debug)]
pub struct HeaderPool {
    idle: Mutex<Vec<Header>>,
    in_use: AtomicUsize,
    max_idle: usize,
}

impl HeaderPool {
    /// Pool that keeps at most `max_idle` returned buffers.
    pub fn new(max_idle: usize) -> Self {
        Self {
            idle: Mutex::new(Vec::with_capacity(max_idle)),
            in_use: AtomicUsize::new(0),
            max_idle,
        }
    }

    /// Borrow a zeroed header buffer.
    pub fn checkout(&self) -> HeaderBuffer<'_> {
        let reused = self
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop();
        let buf = reused.unwrap_or_else(|| Box::new([0; HEADER_LENGTH]));
        self.in_use.fetch_add(1, Ordering::AcqRel);
        HeaderBuffer {
            pool: self,
            buf: Some(buf),
        }
    }

    /// Buffers currently lent out.
    pub fn in_use(&self) -> usize {
        self.in_use.load(Ordering::Acquire)
    }

    /// Buffers waiting for reuse.
    pub fn idle(&self) -> usize {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn give_back(&self, mut buf: Header) {
        self.in_use.fetch_sub(1, Ordering::AcqRel);
        buf.fill(0);
        let mut idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
        if idle.len() < self.max_idle {
            idle.push(buf);
        }
    }
}

/// Header buffer on loan from a [`HeaderPool`].
#[derive(Debug)]
pub struct HeaderBuffer<'a> {
    pool: &'a HeaderPool,
    buf: Option<Header>,
}

impl Deref for HeaderBuffer<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.buf.as_deref().map_or(&[][..], |b| &b[..])
    }
}

impl DerefMut for HeaderBuffer<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.buf.as_deref_mut().map_or(&mut [][..], |b| &mut b[..])
    }
}

impl Drop for HeaderBuffer<'_> {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            self.pool.give_back(buf);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkout_and_return() {
        let pool = HeaderPool::new(2);
        {
            let mut a = pool.checkout();
            a[6] = 0xE0;
            assert_eq!(a.len(), HEADER_LENGTH);
            assert_eq!(pool.in_use(), 1);
        }
        assert_eq!(pool.in_use(), 0);
        assert_eq!(pool.idle(), 1);

        // Returned buffers come back zeroed.
        let b = pool.checkout();
        assert!(b.iter().all(|&x| x == 0));
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn test_idle_limit() {
        let pool = HeaderPool::new(1);
        let a = pool.checkout();
        let b = pool.checkout();
        assert_eq!(pool.in_use(), 2);
        drop(a);
        drop(b);
        assert_eq!(pool.in_use(), 0);
        assert_eq!(pool.idle(), 1);
    }

    #[test]
    fn test_concurrent_checkout() {
        let pool = std::sync::Arc::new(HeaderPool::new(4));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let pool = std::sync::Arc::clone(&pool);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        let mut buf = pool.checkout();
                        buf[0] = 1;
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(pool.in_use(), 0);
        assert!(pool.idle() <= 4);
    }
}
