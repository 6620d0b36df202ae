// Library for tests to access modules

pub mod admission;
pub mod analytics_api;
pub mod clock;
pub mod config;
pub mod datastore;
pub mod error;
pub mod models;
pub mod normalizer;
pub mod retention_worker;
pub mod scheduler;
pub mod version;
pub mod window;
