//! Infrastructure layer: persistence, the registry service, projections and
//! background workers.

pub mod config;
pub mod projections;
pub mod read_model;
pub mod registry;
pub mod repository;
pub mod workers;


pub use config::{ConfigError, RegistryConfig, StorageConfig};
pub use registry::{AmountInput, Clock, InvoiceRegistry, NewInvoice, RegistryError};
pub use repository::{
    ChangeSet, InMemoryInvoiceRepository, InvoiceRepository, Page, RepositoryError,
    SledInvoiceRepository, open_repository,
};
