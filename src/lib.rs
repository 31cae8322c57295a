//! Sealbox: encrypted file storage core
//!
//! Files are encrypted at rest with AES-256-GCM under a fresh key and nonce
//! per stored payload. The crate covers chunked upload assembly, per-file
//! version chains with a single current version, and revocable share links
//! gated by expiry, download caps, and passwords.
//!
//! # Modules
//!
//! - `crypto`: authenticated encryption of file payloads
//! - `chunks`: chunked-upload working directories and assembly
//! - `naming`: storage-name generation and MIME inference
//! - `shares`: share link records and the validity state machine
//! - `vault`: the context object and every core operation
//! - `db`: SQLite persistence for users, files, folders, shares, activity
//! - `storage`: blob store backends for ciphertext

pub mod activity;
pub mod chunks;
pub mod config;
pub mod crypto;
pub mod db;
pub mod error;
pub mod naming;
pub mod notify;
pub mod password;
pub mod shares;
pub mod storage;
pub mod vault;

pub use config::Config;
pub use error::{Result, VaultError};
pub use vault::Vault;
