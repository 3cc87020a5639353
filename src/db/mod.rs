pub mod diesel_pool;
pub mod memory_store;
pub mod postgres_store;
pub mod retry;
pub mod store;

pub use diesel_pool::{
    create_diesel_pool, mask_connection_string, DieselDatabaseConfig, DieselPool, MIGRATIONS,
};
pub use memory_store::MemoryStore;
pub use postgres_store::PostgresStore;
pub use retry::RetryPolicy;
pub use store::{
    AffiliateStore, ApplicationOutcome, PayoutReservation, ProductCatalog, StoreError,
    StoreResult, Transition,
};
