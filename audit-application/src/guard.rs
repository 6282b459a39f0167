//! 实例执行守卫（InstanceExecutionGuard）
//!
//! 以流程实例为粒度的悲观互斥：同一 `process_instance_id` 同一时刻
//! 至多一个在途工作单元，互不相关的实例之间没有任何全局锁。
//!
//! - `acquire` 是本子系统里唯一会阻塞调用方的操作，且带超时：超时以
//!   `InstanceBusy` 上抛而不是死等，由调用方决定重试或报错；
//! - `InstanceLockToken` 的释放是幂等的，并在 `Drop` 时兜底执行，
//!   正常返回、`?` 提前退出与任务 panic 展开都会释放；
//! - 锁表条目在最后一个持有者释放后回收，表不随实例基数增长。
//!
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::AppError;
use audit_domain::error::AuditError;

type LockTable = DashMap<String, Arc<Mutex<()>>>;

/// 守卫配置
#[derive(Debug, Clone, Copy)]
pub struct GuardConfig {
    /// 获取实例锁的最长等待时间
    pub acquire_timeout: Duration,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

/// 实例执行守卫
pub struct InstanceExecutionGuard {
    locks: Arc<LockTable>,
    config: GuardConfig,
}

impl InstanceExecutionGuard {
    pub fn new(config: GuardConfig) -> Self {
        Self {
            locks: Arc::new(DashMap::new()),
            config,
        }
    }

    /// 获取实例锁令牌；超时返回 `InstanceBusy`，不做任何变更
    pub async fn acquire(&self, process_instance_id: &str) -> Result<InstanceLockToken, AppError> {
        let cell = self
            .locks
            .entry(process_instance_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        match tokio::time::timeout(self.config.acquire_timeout, cell.lock_owned()).await {
            Ok(slot) => Ok(InstanceLockToken {
                process_instance_id: process_instance_id.to_string(),
                slot: Some(slot),
                table: self.locks.clone(),
            }),
            Err(_) => {
                tracing::debug!(
                    process_instance_id,
                    timeout_ms = self.config.acquire_timeout.as_millis() as u64,
                    "instance lock acquisition timed out"
                );
                Err(AuditError::instance_busy(process_instance_id).into())
            }
        }
    }

    /// 诊断查询：实例当前是否有在途工作单元
    pub fn is_busy(&self, process_instance_id: &str) -> bool {
        self.locks
            .get(process_instance_id)
            .map(|cell| cell.try_lock().is_err())
            .unwrap_or(false)
    }

    #[cfg(test)]
    fn table_len(&self) -> usize {
        self.locks.len()
    }
}

impl Default for InstanceExecutionGuard {
    fn default() -> Self {
        Self::new(GuardConfig::default())
    }
}

/// 实例锁令牌：工作单元对某个流程实例的独占声明
#[derive(Debug)]
pub struct InstanceLockToken {
    process_instance_id: String,
    slot: Option<OwnedMutexGuard<()>>,
    table: Arc<LockTable>,
}

impl InstanceLockToken {
    pub fn process_instance_id(&self) -> &str {
        &self.process_instance_id
    }

    /// 释放令牌；幂等，可安全重复调用
    pub fn release(&mut self) {
        if let Some(slot) = self.slot.take() {
            drop(slot);
            // 无人等待（引用只剩表内一份）时回收条目；等待者持有 Arc
            // 克隆，strong_count > 1，条目保留
            self.table
                .remove_if(&self.process_instance_id, |_, cell| {
                    Arc::strong_count(cell) == 1
                });
        }
    }
}

impl Drop for InstanceLockToken {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    fn fast_guard() -> InstanceExecutionGuard {
        InstanceExecutionGuard::new(GuardConfig {
            acquire_timeout: Duration::from_millis(50),
        })
    }

    #[tokio::test]
    async fn second_acquire_times_out_with_instance_busy() {
        let guard = fast_guard();
        let token = guard.acquire("p-1").await.unwrap();
        assert!(guard.is_busy("p-1"));

        let err = guard.acquire("p-1").await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Audit(AuditError::InstanceBusy { .. })
        ));

        drop(token);
        assert!(!guard.is_busy("p-1"));
    }

    #[tokio::test]
    async fn unrelated_instances_do_not_contend() {
        let guard = fast_guard();
        let _first = guard.acquire("p-1").await.unwrap();
        // 不同实例立即可得
        let _second = guard.acquire("p-2").await.unwrap();
    }

    #[tokio::test]
    async fn release_is_idempotent_and_reclaims_table_entry() {
        let guard = fast_guard();
        let mut token = guard.acquire("p-1").await.unwrap();
        token.release();
        token.release();
        drop(token);

        assert_eq!(guard.table_len(), 0);
        // 释放后可再次获取
        let _again = guard.acquire("p-1").await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn mutual_exclusion_under_racing_tasks() {
        let guard = Arc::new(InstanceExecutionGuard::new(GuardConfig {
            acquire_timeout: Duration::from_secs(5),
        }));
        let in_flight = Arc::new(AtomicBool::new(false));
        let overlaps = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let guard = guard.clone();
            let in_flight = in_flight.clone();
            let overlaps = overlaps.clone();
            tasks.push(tokio::spawn(async move {
                let _token = guard.acquire("p-1").await.unwrap();
                if in_flight.swap(true, Ordering::SeqCst) {
                    overlaps.fetch_add(1, Ordering::SeqCst);
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_flight.store(false, Ordering::SeqCst);
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(overlaps.load(Ordering::SeqCst), 0);
        assert_eq!(guard.table_len(), 0);
    }
}
