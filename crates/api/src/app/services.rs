//! Service wiring for one registry instance behind the HTTP API.

use std::sync::{Arc, Mutex};

use serde_json::Value as JsonValue;
use tracing::info;

use invoicechain_core::Address;
use invoicechain_events::{EventEnvelope, InMemoryEventBus};
use invoicechain_fhe::{MockCoprocessor, Relayer};
use invoicechain_infra::{
    InvoiceRegistry, InvoiceRepository, RegistryConfig, RegistryError, open_repository,
    projections::{AccountActivity, AccountActivityProjection},
    read_model::InMemoryReadModelStore,
    workers::{ProjectionWorker, WorkerHandle},
};

pub type Bus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;
pub type Registry = InvoiceRegistry<Arc<dyn InvoiceRepository>, Bus>;
pub type ActivityProjection =
    AccountActivityProjection<Arc<InMemoryReadModelStore<Address, AccountActivity>>>;

pub struct AppServices {
    pub registry: Arc<Registry>,
    /// Client-side encryption/decryption, backed by the same coprocessor as
    /// the registry so handles resolve on both sides.
    pub relayer: Arc<dyn Relayer>,
    pub activity: Arc<ActivityProjection>,
    worker: Mutex<Option<WorkerHandle>>,
}

impl AppServices {
    /// Run a synchronous registry call on the blocking pool.
    ///
    /// Writes hold the registry lock and may flush the sled store, so they
    /// never run on an async worker thread.
    pub async fn blocking<T, F>(self: &Arc<Self>, f: F) -> Result<T, RegistryCallError>
    where
        F: FnOnce(&Registry) -> Result<T, RegistryError> + Send + 'static,
        T: Send + 'static,
    {
        let services = self.clone();
        tokio::task::spawn_blocking(move || f(&services.registry))
            .await
            .map_err(|e| RegistryCallError::Join(e.to_string()))?
            .map_err(RegistryCallError::Registry)
    }

    /// Stop the projection worker (idempotent).
    pub fn shutdown(&self) {
        let handle = match self.worker.lock() {
            Ok(mut w) => w.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(handle) = handle {
            handle.shutdown();
        }
    }
}

impl core::fmt::Debug for AppServices {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AppServices")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

/// Failure of a registry call made through [`AppServices::blocking`].
#[derive(Debug)]
pub enum RegistryCallError {
    Registry(RegistryError),
    /// The blocking task panicked or was cancelled.
    Join(String),
}

pub fn build_services(config: &RegistryConfig) -> anyhow::Result<AppServices> {
    let repository = open_repository(&config.storage)?;
    let bus: Bus = Arc::new(InMemoryEventBus::new());
    let coprocessor = Arc::new(MockCoprocessor::new());

    let activity: Arc<ActivityProjection> = Arc::new(
        AccountActivityProjection::new(Arc::new(InMemoryReadModelStore::new()))
            .for_registry(config.contract)
            .with_invoice_source(repository.clone()),
    );

    // Subscribe before the registry can publish anything.
    let sink = activity.clone();
    let worker = ProjectionWorker::spawn(
        "account-activity",
        &bus,
        Some(config.contract),
        move |env| sink.apply_envelope(&env),
    )?;

    let registry = InvoiceRegistry::new(
        config.contract,
        config.variant,
        repository,
        coprocessor.clone(),
        bus,
    )
    .with_max_page_size(config.max_page_size);

    info!(
        contract = %config.contract,
        variant = %config.variant,
        storage = ?config.storage,
        "registry services ready"
    );

    Ok(AppServices {
        registry: Arc::new(registry),
        relayer: coprocessor,
        activity,
        worker: Mutex::new(Some(worker)),
    })
}
