//! 任务登记表
//!
//! 内存中保存所有任务及其状态，单把锁保护整张表

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tracing::{debug, info};

use crate::error::{AppError, Result};
use crate::models::{Job, JobCounts, JobId, JobStatus};

/// 创建任务的结果
#[derive(Debug, Clone)]
pub struct Admission {
    pub job: Job,
    /// 为腾出空间而被淘汰的任务
    pub evicted: Option<Job>,
}

struct Entry {
    /// 插入序号，创建时间相同时按插入顺序排序
    seq: u64,
    job: Job,
}

#[derive(Default)]
struct Inner {
    jobs: HashMap<JobId, Entry>,
    next_seq: u64,
}

impl Inner {
    fn sorted(&self) -> Vec<&Entry> {
        let mut entries: Vec<&Entry> = self.jobs.values().collect();
        entries.sort_by(|a, b| {
            a.job
                .created_at
                .cmp(&b.job.created_at)
                .then(a.seq.cmp(&b.seq))
        });
        entries
    }

    fn oldest_terminal(&self) -> Option<JobId> {
        self.sorted()
            .into_iter()
            .find(|e| e.job.status.is_terminal())
            .map(|e| e.job.job_id.clone())
    }
}

/// 任务登记表
pub struct JobRegistry {
    capacity: usize,
    inner: Mutex<Inner>,
}

impl JobRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(Inner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 创建新任务
    ///
    /// 表满时先淘汰最早创建的已结束任务；没有可淘汰的任务则拒绝创建
    pub fn create(&self, well_url: impl Into<String>) -> Result<Admission> {
        let mut inner = self.lock();

        let evicted = if inner.jobs.len() >= self.capacity {
            let victim = inner
                .oldest_terminal()
                .ok_or(AppError::CapacityExhausted {
                    capacity: self.capacity,
                })?;
            let entry = inner.jobs.remove(&victim);
            info!("♻️ 任务表已满，淘汰最早的已结束任务: {}", victim);
            entry.map(|e| e.job)
        } else {
            None
        };

        let job = Job::new(well_url);
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.jobs.insert(
            job.job_id.clone(),
            Entry {
                seq,
                job: job.clone(),
            },
        );
        debug!("任务已登记: {} ({})", job.job_id, job.well_url);

        Ok(Admission { job, evicted })
    }

    pub fn get(&self, id: &JobId) -> Option<Job> {
        self.lock().jobs.get(id).map(|e| e.job.clone())
    }

    pub fn len(&self) -> usize {
        self.lock().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 全部任务，按创建时间升序
    pub fn list(&self) -> Vec<Job> {
        self.lock()
            .sorted()
            .into_iter()
            .map(|e| e.job.clone())
            .collect()
    }

    /// 可被淘汰的已结束任务，按创建时间升序
    pub fn list_for_eviction(&self) -> Vec<Job> {
        self.lock()
            .sorted()
            .into_iter()
            .filter(|e| e.job.status.is_terminal())
            .map(|e| e.job.clone())
            .collect()
    }

    pub fn counts(&self) -> JobCounts {
        let inner = self.lock();
        let mut counts = JobCounts {
            total: inner.jobs.len(),
            ..Default::default()
        };
        for entry in inner.jobs.values() {
            match entry.job.status {
                JobStatus::Queued => counts.queued += 1,
                JobStatus::Downloading => counts.downloading += 1,
                JobStatus::Completed => counts.completed += 1,
                JobStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }

    pub fn mark_downloading(&self, id: &JobId) -> Result<Job> {
        self.transition(id, JobStatus::Downloading, |_| {})
    }

    pub fn mark_completed(&self, id: &JobId, filename: impl Into<String>) -> Result<Job> {
        let filename = filename.into();
        self.transition(id, JobStatus::Completed, move |job| {
            job.filename = Some(filename);
            job.completed_at = Some(Utc::now());
        })
    }

    pub fn mark_failed(&self, id: &JobId, message: impl Into<String>) -> Result<Job> {
        let message = message.into();
        self.transition(id, JobStatus::Failed, move |job| {
            job.error = Some(message);
            job.completed_at = Some(Utc::now());
        })
    }

    fn transition(
        &self,
        id: &JobId,
        next: JobStatus,
        apply: impl FnOnce(&mut Job),
    ) -> Result<Job> {
        let mut inner = self.lock();
        let entry = inner
            .jobs
            .get_mut(id)
            .ok_or_else(|| AppError::JobNotFound(id.clone()))?;

        let current = entry.job.status;
        if !current.can_transition_to(next) {
            return Err(AppError::InvalidTransition {
                job_id: id.clone(),
                from: current,
                to: next,
            });
        }

        entry.job.status = next;
        apply(&mut entry.job);
        Ok(entry.job.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    const URL: &str = "https://fracfocus.org/wells/12345";

    fn finish(registry: &JobRegistry, id: &JobId) {
        registry.mark_downloading(id).unwrap();
        registry.mark_completed(id, "well.pdf").unwrap();
    }

    #[test]
    fn test_create_then_get() {
        let registry = JobRegistry::new(10);
        let admission = registry.create(URL).unwrap();

        assert!(admission.evicted.is_none());
        let job = registry.get(&admission.job.job_id).unwrap();
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.well_url, URL);
        assert!(registry.get(&JobId::from("missing".to_string())).is_none());
    }

    #[test]
    fn test_lifecycle_is_forward_only() {
        let registry = JobRegistry::new(10);
        let id = registry.create(URL).unwrap().job.job_id;

        assert_err!(registry.mark_completed(&id, "x.pdf"));
        assert_ok!(registry.mark_downloading(&id));
        assert_err!(registry.mark_downloading(&id));

        let job = registry.mark_failed(&id, "no download control found").unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.completed_at.is_some());

        let err = registry.mark_downloading(&id).unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));
        assert_eq!(registry.get(&id).unwrap().status, JobStatus::Failed);
    }

    #[test]
    fn test_evicts_oldest_terminal_job_when_full() {
        let registry = JobRegistry::new(3);
        let first = registry.create(URL).unwrap().job.job_id;
        let second = registry.create(URL).unwrap().job.job_id;
        let running = registry.create(URL).unwrap().job.job_id;

        finish(&registry, &second);
        finish(&registry, &first);
        registry.mark_downloading(&running).unwrap();

        let admission = registry.create(URL).unwrap();
        assert_eq!(admission.evicted.map(|j| j.job_id), Some(first.clone()));
        assert_eq!(registry.len(), 3);
        assert!(registry.get(&first).is_none());
        assert!(registry.get(&second).is_some());
        assert!(registry.get(&running).is_some());
    }

    #[test]
    fn test_rejects_when_full_of_active_jobs() {
        let registry = JobRegistry::new(2);
        let a = registry.create(URL).unwrap().job.job_id;
        registry.create(URL).unwrap();
        registry.mark_downloading(&a).unwrap();

        let err = registry.create(URL).unwrap_err();
        assert!(matches!(err, AppError::CapacityExhausted { capacity: 2 }));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_list_for_eviction_only_terminal_in_creation_order() {
        let registry = JobRegistry::new(10);
        let a = registry.create(URL).unwrap().job.job_id;
        let b = registry.create(URL).unwrap().job.job_id;
        let c = registry.create(URL).unwrap().job.job_id;

        finish(&registry, &c);
        registry.mark_downloading(&b).unwrap();
        registry.mark_failed(&b, "boom").unwrap();

        let ids: Vec<JobId> = registry
            .list_for_eviction()
            .into_iter()
            .map(|j| j.job_id)
            .collect();
        assert_eq!(ids, vec![b, c]);
        assert_eq!(registry.list().first().map(|j| j.job_id.clone()), Some(a));
    }

    #[test]
    fn test_counts() {
        let registry = JobRegistry::new(10);
        let a = registry.create(URL).unwrap().job.job_id;
        let b = registry.create(URL).unwrap().job.job_id;
        registry.create(URL).unwrap();
        finish(&registry, &a);
        registry.mark_downloading(&b).unwrap();

        let counts = registry.counts();
        assert_eq!(counts.total, 3);
        assert_eq!(counts.queued, 1);
        assert_eq!(counts.downloading, 1);
        assert_eq!(counts.completed, 1);
        assert_eq!(counts.failed, 0);
    }
}
