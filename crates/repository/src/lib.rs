//! Repository bootstrap and content addressing.
//!
//! A [`Repository`] ties together one storage backend, the local cache
//! scoped to it, and the hashing provider selected by the repository's
//! [`Configuration`]. Encrypted repositories derive their key from a
//! passphrase and verify it against a stored canary before anything else is
//! read.
//!
//! ```no_run
//! use coffer_config::Settings;
//! use coffer_repository::{Configuration, Context, Repository};
//!
//! # async fn example() -> coffer_repository::error::Result<()> {
//! let backend = coffer_storage::backend::from_location("/var/backups/repo").unwrap();
//! Repository::create(&backend, &Configuration::new()).await?;
//! let ctx = Context::new(Settings::load(None).unwrap());
//! let repository = Repository::open(ctx, backend, None).await?;
//! let address = repository.put_object(b"hello world").await?;
//! assert_eq!(repository.get_object(&address).await?, b"hello world");
//! repository.close().await?;
//! # Ok(())
//! # }
//! ```

mod configuration;
mod context;
pub mod encryption;
pub mod error;
mod repository;

pub use crate::configuration::{Compression, Configuration};
pub use crate::context::Context;
pub use crate::repository::Repository;
