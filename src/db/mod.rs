pub mod connection;
pub mod errors;
pub mod memory;
pub mod postgres;
pub mod store;

pub use connection::{create_pool, run_migrations, with_retry, with_sslmode, Retryable};
pub use errors::*;
pub use memory::MemoryRegistrationStore;
pub use postgres::PgRegistrationStore;
pub use store::{NewBeneficiary, NewCard, RegistrationStore, RegistrationTx};
