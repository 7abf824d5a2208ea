use std::sync::Arc;
use std::time::{Duration, Instant};

use brightaid_client::{ApiClient, DonorStore, IdentityStorage, NgoStore, RefreshOutcome, SchoolStore};
use dashmap::DashMap;
use serde::Serialize;
use uuid::Uuid;

/// Finished jobs nobody polled are dropped after this long.
pub const FINISHED_JOB_TTL: Duration = Duration::from_secs(600);

/// Progress of a background refresh.
#[derive(Clone, Serialize, Debug, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Done { outcome: RefreshOutcome },
    Failed { error: String },
}

impl JobStatus {
    pub fn is_finished(&self) -> bool {
        !matches!(self, JobStatus::Pending)
    }
}

#[derive(Clone, Debug)]
pub struct JobRecord {
    pub status: JobStatus,
    pub updated_at: Instant,
}

/// Shared by every handler: the role stores and the job table.
///
/// There is one donor store for the stored identity. NGO and school stores
/// are created by their first refresh, one per id; reads never create one.
#[derive(Clone)]
pub struct AppState {
    pub api: ApiClient,
    pub donor: Arc<DonorStore>,
    pub ngos: Arc<DashMap<i64, Arc<NgoStore>>>,
    pub schools: Arc<DashMap<i64, Arc<SchoolStore>>>,
    pub jobs: Arc<DashMap<Uuid, JobRecord>>,
}

impl AppState {
    pub fn new(api: ApiClient, identity: IdentityStorage) -> Self {
        AppState {
            donor: Arc::new(DonorStore::new(api.clone(), identity)),
            api,
            ngos: Arc::new(DashMap::new()),
            schools: Arc::new(DashMap::new()),
            jobs: Arc::new(DashMap::new()),
        }
    }

    pub fn ngo_store(&self, ngo_id: i64) -> Arc<NgoStore> {
        self.ngos
            .entry(ngo_id)
            .or_insert_with(|| Arc::new(NgoStore::new(self.api.clone())))
            .value()
            .clone()
    }

    pub fn find_ngo(&self, ngo_id: i64) -> Option<Arc<NgoStore>> {
        self.ngos.get(&ngo_id).map(|s| s.value().clone())
    }

    pub fn school_store(&self, school_id: i64) -> Arc<SchoolStore> {
        self.schools
            .entry(school_id)
            .or_insert_with(|| Arc::new(SchoolStore::new(self.api.clone())))
            .value()
            .clone()
    }

    pub fn find_school(&self, school_id: i64) -> Option<Arc<SchoolStore>> {
        self.schools.get(&school_id).map(|s| s.value().clone())
    }

    /// Registers a pending job, first dropping stale finished ones.
    pub fn start_job(&self) -> Uuid {
        self.sweep_jobs(FINISHED_JOB_TTL);
        let job_id = Uuid::new_v4();
        self.set_job(job_id, JobStatus::Pending);
        job_id
    }

    pub fn set_job(&self, job_id: Uuid, status: JobStatus) {
        self.jobs.insert(
            job_id,
            JobRecord {
                status,
                updated_at: Instant::now(),
            },
        );
    }

    /// The job's status. A finished job is removed once it has been reported.
    pub fn take_job_status(&self, job_id: &Uuid) -> Option<JobStatus> {
        if let Some((_, record)) = self.jobs.remove_if(job_id, |_, r| r.status.is_finished()) {
            return Some(record.status);
        }
        self.jobs.get(job_id).map(|r| r.status.clone())
    }

    /// Drops finished jobs last updated at least `ttl` ago. Returns how many.
    pub fn sweep_jobs(&self, ttl: Duration) -> usize {
        let before = self.jobs.len();
        self.jobs
            .retain(|_, r| !(r.status.is_finished() && r.updated_at.elapsed() >= ttl));
        before.saturating_sub(self.jobs.len())
    }
}
