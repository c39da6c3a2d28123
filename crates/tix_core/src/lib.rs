pub mod db;
pub mod domain;
pub mod error;
pub mod fingerprint;
pub mod lifecycle;
pub mod notify;
pub mod repo;
pub mod report;
pub mod timestamps;
pub mod validate;
