//! The page event loop: one task per page owning its [`Window`].

use std::future;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Interval, MissedTickBehavior};
use tracing::{debug, warn};
use url::Url;

use crate::error::PageError;
use crate::reconcile::{reconcile, RECONCILE_INTERVAL};
use crate::window::Window;

const JOB_QUEUE: usize = 64;

type Job = Box<dyn FnOnce(&mut Window) + Send>;

/// Handle to a running page. Cloning shares the page; dropping every clone
/// stops its event loop.
#[derive(Debug, Clone)]
pub struct PageHandle {
    jobs: mpsc::Sender<Job>,
    url: Url,
}

impl PageHandle {
    /// Moves `window` onto its own event loop task.
    pub fn spawn(window: Window) -> Self {
        let url = window.location().clone();
        let (jobs, rx) = mpsc::channel(JOB_QUEUE);
        tokio::spawn(event_loop(window, rx));
        Self { jobs, url }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn is_closed(&self) -> bool {
        self.jobs.is_closed()
    }

    /// Runs `job` on the page between event loop turns and returns its
    /// result. Never interleaves with a reconciliation pass or another job.
    pub async fn evaluate<F, R>(&self, job: F) -> Result<R, PageError>
    where
        F: FnOnce(&mut Window) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (reply, result) = oneshot::channel();
        let job: Job = Box::new(move |window| {
            let _ = reply.send(job(window));
        });
        self.jobs.send(job).await.map_err(|_| self.closed())?;
        result.await.map_err(|_| self.closed())
    }

    fn closed(&self) -> PageError {
        PageError::Closed {
            url: self.url.to_string(),
        }
    }
}

async fn event_loop(mut window: Window, mut jobs: mpsc::Receiver<Job>) {
    let mut ticker: Option<Interval> = None;
    loop {
        if ticker.is_none() && window.reconciliation_due() {
            let mut interval = time::interval(RECONCILE_INTERVAL);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker = Some(interval);
            debug!(page = %window.location(), "document ready; reconciliation started");
        }

        tokio::select! {
            biased;
            _ = next_tick(&mut ticker) => {
                if let Err(err) = reconcile(&mut window) {
                    warn!(page = %window.location(), %err, "reconciliation pass failed");
                }
            }
            job = jobs.recv() => match job {
                Some(job) => job(&mut window),
                None => break,
            },
        }
    }
    debug!(page = %window.location(), "page closed");
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => future::pending::<()>().await,
    }
}
