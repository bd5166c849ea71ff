//! Background execution context for catalog work.
//!
//! # Responsibility
//! - Own the SQLite connection and `CatalogService` on one dedicated thread.
//! - Run submitted jobs in order and hand results back through `Completion`.
//!
//! # Invariants
//! - Exactly one thread touches the connection, so writes are serialized.
//! - Jobs are never cancelled; a dropped `Completion` only discards the result.
//! - Dropping the worker lets queued jobs finish, then joins the thread.

use crate::config::CatalogConfig;
use crate::db::open_db;
use crate::events::{CatalogChange, Subscription};
use crate::model::image::{Image, ImageId, ImageWithTags, TagWithImages};
use crate::repo::{RepoError, SqliteCatalogRepository};
use crate::service::catalog_service::{CatalogError, CatalogResult, CatalogService};
use crate::storage::{PhotoStore, StorageError};
use log::{error, info};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::JoinHandle;

const WORKER_THREAD_NAME: &str = "closet-catalog";

/// Service type living on the worker thread.
pub type WorkerService<'conn> = CatalogService<SqliteCatalogRepository<'conn>>;

type Job = Box<dyn for<'conn> FnOnce(&mut WorkerService<'conn>) + Send>;

/// Pending result of a submitted job.
#[derive(Debug)]
pub struct Completion<T> {
    receiver: Receiver<T>,
}

impl<T> Completion<T> {
    /// Blocks until the job has run.
    pub fn recv(self) -> CatalogResult<T> {
        self.receiver.recv().map_err(|_| CatalogError::WorkerStopped)
    }

    /// Returns the result if the job already finished.
    pub fn poll(&self) -> Option<T> {
        self.receiver.try_recv().ok()
    }
}

impl<T> Completion<CatalogResult<T>> {
    /// Blocks until the job has run and flattens its result.
    pub fn wait(self) -> CatalogResult<T> {
        self.recv()?
    }
}

/// Handle to the background catalog thread.
pub struct CatalogWorker {
    jobs: Option<Sender<Job>>,
    thread: Option<JoinHandle<()>>,
}

impl CatalogWorker {
    /// Opens the catalog described by `config` on a new worker thread.
    ///
    /// Returns once the database is migrated and the photo directory exists.
    pub fn start(config: &CatalogConfig) -> CatalogResult<Self> {
        config
            .ensure_dirs()
            .map_err(|err| CatalogError::Storage(StorageError::Io(err)))?;

        let db_path = config.db_path();
        let photos_dir = config.photos_dir();
        let (job_tx, job_rx) = mpsc::channel::<Job>();
        let (ready_tx, ready_rx) = mpsc::channel::<CatalogResult<()>>();

        let thread = std::thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || run_worker(db_path, photos_dir, job_rx, ready_tx))
            .map_err(|err| CatalogError::Storage(StorageError::Io(err)))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                info!("event=worker_start module=worker status=ok");
                Ok(Self {
                    jobs: Some(job_tx),
                    thread: Some(thread),
                })
            }
            Ok(Err(err)) => {
                let _ = thread.join();
                Err(err)
            }
            Err(_) => {
                let _ = thread.join();
                Err(CatalogError::WorkerStopped)
            }
        }
    }

    /// Runs `job` on the worker thread.
    pub fn execute<T, F>(&self, job: F) -> Completion<T>
    where
        T: Send + 'static,
        F: for<'conn> FnOnce(&mut WorkerService<'conn>) -> T + Send + 'static,
    {
        let (result_tx, result_rx) = mpsc::channel();
        let boxed = boxed_job(move |service| {
            let _ = result_tx.send(job(service));
        });

        if let Some(jobs) = self.jobs.as_ref() {
            if jobs.send(boxed).is_err() {
                error!("event=worker_submit module=worker status=error error_code=worker_stopped");
            }
        }

        Completion {
            receiver: result_rx,
        }
    }

    pub fn create_image(
        &self,
        bytes: Vec<u8>,
        raw_tags: String,
    ) -> Completion<CatalogResult<ImageWithTags>> {
        self.execute(move |service| service.create_image(&bytes, raw_tags.as_str()))
    }

    pub fn sync_tags(
        &self,
        image_id: ImageId,
        raw_tags: String,
    ) -> Completion<CatalogResult<ImageWithTags>> {
        self.execute(move |service| service.sync_tags(image_id, raw_tags.as_str()))
    }

    pub fn delete_image(&self, image: Image) -> Completion<CatalogResult<()>> {
        self.execute(move |service| service.delete_image(&image))
    }

    pub fn get_image(&self, image_id: ImageId) -> Completion<CatalogResult<Option<ImageWithTags>>> {
        self.execute(move |service| service.get_image(image_id))
    }

    pub fn watch_images(&self) -> Completion<CatalogResult<Subscription<Vec<ImageWithTags>>>> {
        self.execute(|service| service.watch_images())
    }

    pub fn watch_tags_in_use(
        &self,
    ) -> Completion<CatalogResult<Subscription<Vec<TagWithImages>>>> {
        self.execute(|service| service.watch_tags_in_use())
    }

    pub fn watch_changes(&self) -> Completion<Subscription<CatalogChange>> {
        self.execute(|service| service.watch_changes())
    }

    /// Stops accepting jobs, lets queued ones finish and joins the thread.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.jobs.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("event=worker_stop module=worker status=error error_code=worker_panicked");
            } else {
                info!("event=worker_stop module=worker status=ok");
            }
        }
    }
}

impl Drop for CatalogWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn boxed_job<F>(job: F) -> Job
where
    F: for<'conn> FnOnce(&mut WorkerService<'conn>) + Send + 'static,
{
    Box::new(job)
}

fn run_worker(
    db_path: PathBuf,
    photos_dir: PathBuf,
    jobs: Receiver<Job>,
    ready: Sender<CatalogResult<()>>,
) {
    let mut conn = match open_db(&db_path) {
        Ok(conn) => conn,
        Err(err) => {
            let _ = ready.send(Err(CatalogError::Repo(RepoError::Db(err))));
            return;
        }
    };
    let repo = match SqliteCatalogRepository::try_new(&mut conn) {
        Ok(repo) => repo,
        Err(err) => {
            let _ = ready.send(Err(err.into()));
            return;
        }
    };
    let store = match PhotoStore::open(&photos_dir) {
        Ok(store) => store,
        Err(err) => {
            let _ = ready.send(Err(err.into()));
            return;
        }
    };

    let mut service = CatalogService::new(repo, store);
    if ready.send(Ok(())).is_err() {
        return;
    }

    for job in jobs {
        job(&mut service);
    }
}
