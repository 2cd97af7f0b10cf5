//! Campaign Orchestration API Library
//!
//! Backend for multi-platform ad campaigns: campaign and business records,
//! wallet-funded campaign creation, per-platform launch queues and the
//! platform workers that build campaigns on external ad networks.
//!
//! # Modules
//!
//! - `api`: HTTP-facing components.
//! - `core`: Orchestration, planning rules and shared models.
//! - `integrations`: Outbound clients (wallet, Google Ads, Shopify, internal API).
//! - `ad_platforms`: Pause/resume/data capabilities per ad platform.
//! - `auth`: JWT, API-key and internal-token extractors.
//! - `circuit_breaker`: Circuit breaker for wallet calls.
//! - `config`: Configuration management.
//! - `country_codes`: ISO 3166 alpha-3 to alpha-2 table.
//! - `db`: Database connection and migrations.
//! - `db_storage`: Campaign, business and shadow-record persistence.
//! - `errors`: Error handling types.
//! - `google_ads_worker`: Google Ads launch steps.
//! - `platform_worker`: Launch queue consumer.
//! - `queue`: Launch queues.
//! - `store_profile_cache`: Bounded store profile cache.

pub mod api;
pub mod core;
pub mod integrations;

pub mod ad_platforms;
pub mod auth;
pub mod circuit_breaker;
pub mod config;
pub mod country_codes;
pub mod db;
pub mod db_storage;
pub mod errors;
pub mod google_ads_client;
pub mod google_ads_models;
pub mod google_ads_worker;
pub mod handlers;
pub mod internal_client;
pub mod internal_handlers;
pub mod models;
pub mod orchestrator;
pub mod planning;
pub mod platform_worker;
pub mod queue;
pub mod shopify_client;
pub mod store_profile_cache;
pub mod wallet_client;
