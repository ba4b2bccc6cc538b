//! Database drivers and user persistence for the Backoffice server
//!
//! A [`Driver`] owns one native sqlx pool and, in ORM mode, a sea-orm
//! connection layered over that same pool. The [`DriverFactory`] turns
//! configuration into unconnected drivers, and the [`DatabaseManager`]
//! keeps them by name ("primary" plus optional secondaries).

pub mod config;
pub mod connection;
pub mod driver;
pub mod entity;
pub mod error;
pub mod factory;
pub mod manager;
pub mod mysql;
pub mod postgres;
pub mod user_store;

pub use config::{
    DatabaseConnectionConfig, DriverConfig, DriverType, MySqlConfig, PoolSettings, PostgresConfig,
};
pub use connection::{AccessMode, DatabaseHandle, DatabasePool};
pub use driver::Driver;
pub use error::DatabaseError;
pub use factory::DriverFactory;
pub use manager::{DatabaseManager, PRIMARY};
pub use mysql::MySqlDriver;
pub use postgres::PostgresDriver;
pub use user_store::UserStore;
