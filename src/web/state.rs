use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::batch::{Batch, run_batch};
use crate::error::{BatchBusy, ValidationError};
use crate::model::BatchResult;
use crate::progress::Reporter;
use crate::runner::Scrape;

/// Everything one operator session accumulates between clicks.
#[derive(Debug, Default)]
pub struct Session {
    pub batch: Batch,
    pub last: Option<BatchResult>,
}

pub struct AppState {
    scraper: Arc<dyn Scrape>,
    session: Mutex<Session>,
    running: Arc<AtomicBool>,
}

/// Held for the duration of one batch; clears the busy flag on drop.
pub struct RunGuard {
    running: Arc<AtomicBool>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error(transparent)]
    Busy(#[from] BatchBusy),
}

impl AppState {
    pub fn new(scraper: Arc<dyn Scrape>) -> Self {
        Self {
            scraper,
            session: Mutex::new(Session::default()),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn begin_run(&self) -> Result<RunGuard, BatchBusy> {
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| BatchBusy)?;
        Ok(RunGuard {
            running: Arc::clone(&self.running),
        })
    }

    /// Runs the current batch and stores the result. Checks happen before
    /// any browser is launched.
    pub async fn run(&self, _guard: &RunGuard, reporter: &Reporter) -> Result<BatchResult, RunError> {
        let configs = {
            let mut s = self.session();
            if s.batch.is_empty() {
                return Err(ValidationError::EmptyBatch.into());
            }
            s.last = None;
            s.batch.configs().to_vec()
        };
        let result = run_batch(self.scraper.as_ref(), &configs, reporter).await?;
        self.session().last = Some(result.clone());
        Ok(result)
    }
}
