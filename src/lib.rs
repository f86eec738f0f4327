pub mod config;
pub mod error;
pub mod extractor;
pub mod invoicing;
pub mod jobs;
pub mod ledger;
pub mod providers;
pub mod routes;
pub mod webhooks;

mod auth;
