//! Status - プロセス内カウンタ
//!
//! バックグラウンド処理の結果は呼び出し側に返らないので、
//! ここで数えてログと `ServiceCounts` で観測できるようにします。

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

#[derive(Debug, Default)]
pub struct Counters {
    uploaded: AtomicU64,
    published: AtomicU64,
    deferred_recovered: AtomicU64,
    abandoned: AtomicU64,
    rotated: AtomicU64,
    deleted: AtomicU64,
    render_failures: AtomicU64,
    background_errors: AtomicU64,
}

impl Counters {
    pub fn uploaded(&self) {
        self.uploaded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn published(&self) {
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    /// A derivative promoted by the deferred re-check.
    pub fn deferred_recovered(&self, n: usize) {
        self.deferred_recovered.fetch_add(n as u64, Ordering::Relaxed);
    }

    /// A derivative still missing after the grace period.
    pub fn abandoned(&self, n: usize) {
        self.abandoned.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub fn rotated(&self) {
        self.rotated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn deleted(&self, n: usize) {
        self.deleted.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub fn render_failures(&self, n: usize) {
        self.render_failures.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub fn background_errors(&self, n: usize) {
        self.background_errors.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ServiceCounts {
        ServiceCounts {
            uploaded: self.uploaded.load(Ordering::Relaxed),
            published: self.published.load(Ordering::Relaxed),
            deferred_recovered: self.deferred_recovered.load(Ordering::Relaxed),
            abandoned: self.abandoned.load(Ordering::Relaxed),
            rotated: self.rotated.load(Ordering::Relaxed),
            deleted: self.deleted.load(Ordering::Relaxed),
            render_failures: self.render_failures.load(Ordering::Relaxed),
            background_errors: self.background_errors.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceCounts {
    pub uploaded: u64,
    pub published: u64,
    pub deferred_recovered: u64,
    pub abandoned: u64,
    pub rotated: u64,
    pub deleted: u64,
    pub render_failures: u64,
    pub background_errors: u64,
}
