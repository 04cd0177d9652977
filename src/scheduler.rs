//! Bounded product scheduling.
//!
//! The [`ProductScheduler`] runs one [`Pipeline`] per product, with at most
//! `workers` pipelines in flight. Each pipeline is its own task: a failure
//! or panic in one is recorded in its [`ProductOutcome`] and never cancels
//! the others. [`ProductScheduler::run`] returns only after every task has
//! finished.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, instrument, warn};

use crate::config::{MAX_WORKERS, MIN_WORKERS};
use crate::pipeline::{Pipeline, PipelineError, ProductReport};
use crate::product::Product;

/// Errors that stop a run before or while scheduling.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Worker count outside 1..=100.
    #[error("invalid worker count {value}: must be between {MIN_WORKERS} and {MAX_WORKERS}")]
    InvalidWorkers { value: usize },

    /// The output root could not be prepared.
    #[error("cannot create output directory {path}: {source}")]
    OutputRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Semaphore was closed unexpectedly.
    #[error("worker pool closed unexpectedly")]
    PoolClosed,
}

/// Where a product is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl ProductStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Final result for one product.
#[derive(Debug, Clone, Serialize)]
pub struct ProductOutcome {
    pub product: Product,
    pub status: ProductStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<ProductReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Per-product outcomes of a run, in scheduling order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub outcomes: Vec<ProductOutcome>,
    /// Distinct filenames committed during the run.
    pub downloaded_files: usize,
}

impl RunReport {
    #[must_use]
    pub fn completed(&self) -> usize {
        self.count(ProductStatus::Completed)
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.count(ProductStatus::Failed)
    }

    #[must_use]
    pub fn outcome(&self, product: &Product) -> Option<&ProductOutcome> {
        self.outcomes.iter().find(|o| &o.product == product)
    }

    fn count(&self, status: ProductStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }
}

type StatusMap = Arc<Mutex<HashMap<Product, ProductStatus>>>;

fn set_status(statuses: &StatusMap, product: &Product, status: ProductStatus) {
    statuses
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(product.clone(), status);
}

/// Runs product pipelines on a bounded worker pool.
pub struct ProductScheduler {
    pipeline: Arc<Pipeline>,
    semaphore: Arc<Semaphore>,
    workers: usize,
    statuses: StatusMap,
}

impl ProductScheduler {
    /// Creates a scheduler sized by the pipeline's configured worker count.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidWorkers`] if the width is outside
    /// 1..=100.
    pub fn new(pipeline: Pipeline) -> Result<Self, SchedulerError> {
        let workers = pipeline.config().workers;
        if !(MIN_WORKERS..=MAX_WORKERS).contains(&workers) {
            return Err(SchedulerError::InvalidWorkers { value: workers });
        }
        debug!(workers, "creating product scheduler");
        Ok(Self {
            pipeline: Arc::new(pipeline),
            semaphore: Arc::new(Semaphore::new(workers)),
            workers,
            statuses: Arc::default(),
        })
    }

    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Snapshot of every scheduled product's status.
    #[must_use]
    pub fn statuses(&self) -> BTreeMap<Product, ProductStatus> {
        self.statuses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(product, status)| (product.clone(), *status))
            .collect()
    }

    /// Runs every configured product and waits for all of them.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::OutputRoot`] if `<root>/products` cannot be
    /// created; no pipeline is started in that case. Pipeline failures are
    /// reported in the returned [`RunReport`], not as errors.
    #[instrument(skip(self), fields(workers = self.workers))]
    pub async fn run(&self) -> Result<RunReport, SchedulerError> {
        let products_dir = self.pipeline.layout().products_dir();
        tokio::fs::create_dir_all(&products_dir)
            .await
            .map_err(|source| SchedulerError::OutputRoot {
                path: products_dir.clone(),
                source,
            })?;

        let products = self.pipeline.config().products.clone();
        for product in &products {
            set_status(&self.statuses, product, ProductStatus::Pending);
        }
        info!(products = products.len(), "starting crawl");

        let mut handles = Vec::with_capacity(products.len());
        for product in products {
            let permit = Arc::clone(&self.semaphore)
                .acquire_owned()
                .await
                .map_err(|_| SchedulerError::PoolClosed)?;

            let pipeline = Arc::clone(&self.pipeline);
            let statuses = Arc::clone(&self.statuses);
            let task_product = product.clone();
            let handle = tokio::spawn(async move {
                let _permit = permit;
                set_status(&statuses, &task_product, ProductStatus::Running);
                let result = pipeline.run(&task_product).await;
                let status = if result.is_ok() {
                    ProductStatus::Completed
                } else {
                    ProductStatus::Failed
                };
                set_status(&statuses, &task_product, status);
                result
            });
            handles.push((product, handle));
        }

        debug!(task_count = handles.len(), "waiting for product pipelines");

        let mut report = RunReport::default();
        for (product, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => {
                    set_status(&self.statuses, &product, ProductStatus::Failed);
                    Err(PipelineError::Task {
                        message: e.to_string(),
                    })
                }
            };
            report.outcomes.push(match result {
                Ok(product_report) => ProductOutcome {
                    product,
                    status: ProductStatus::Completed,
                    report: Some(product_report),
                    error: None,
                },
                Err(e) => {
                    error!(product = %product, error = %e, "product pipeline failed");
                    ProductOutcome {
                        product,
                        status: ProductStatus::Failed,
                        report: None,
                        error: Some(e.to_string()),
                    }
                }
            });
        }

        report.downloaded_files = self.pipeline.registry().committed().len();
        if report.failed() > 0 {
            warn!(
                failed = report.failed(),
                completed = report.completed(),
                "crawl finished with failed products"
            );
        } else {
            info!(
                completed = report.completed(),
                downloaded = report.downloaded_files,
                "crawl finished"
            );
        }
        Ok(report)
    }
}
