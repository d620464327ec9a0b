//! # Quantum Chain - Ubqhash Proof-of-Work Engine
//!
//! Proof-of-work consensus engine for Ubiq-style chains.
//!
//! ## Purpose
//!
//! - Difficulty adjustment: Frontier, Homestead and bomb-delayed calculators
//!   in fixed-width `U256` (with an arbitrary-precision reference), plus the
//!   DigishieldV3 and Flux median-time retargets
//! - Epoch verification caches and mining datasets, generated once, kept in
//!   an LRU with a pre-generated future epoch and persisted as memory-mapped
//!   dumps
//! - Seal verification, local nonce search and a remote sealer for external
//!   miners
//! - Block and uncle rewards from the monetary policy
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │  UbqhashEngine (engine)                              │
//! │  - cache_for / dataset_for, threads, hashrate        │
//! │  - verify_seal / seal, RemoteSealer, apis            │
//! └──────────────────────────────────────────────────────┘
//!            │                            │
//! ┌────────────────────────┐   ┌─────────────────────────┐
//! │  epoch                 │   │  difficulty / reward    │
//! │  - EpochLru<T>         │   │  - calc_difficulty      │
//! │  - EpochCache/Dataset  │   │  - block/uncle rewards  │
//! └────────────────────────┘   └─────────────────────────┘
//!            │
//! ┌────────────────────────┐
//! │  algorithm / dump      │
//! │  - hashimoto, sizes    │
//! │  - mmap dump files     │
//! └────────────────────────┘
//! ```
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! let engine = Arc::new(UbqhashEngine::new(UbqhashConfig::from_env()));
//! let header = SealHeader { /* ... */ };
//! engine.verify_seal(&header, false)?;
//! ```

#![warn(clippy::all)]

pub mod algorithm;
pub mod chain;
pub mod difficulty;
pub mod dump;
pub mod engine;
pub mod epoch;
pub mod reward;

mod config;
mod error;
mod metrics;

pub use chain::{ChainConfig, ChainHeaderReader, MonetaryPolicyStep, ParentHeader};
pub use config::{Mode, UbqhashConfig, DEFAULT_UIP1_EPOCH};
pub use difficulty::{calc_difficulty, DifficultyAlgorithm};
pub use engine::{
    pow_target, RemoteSealer, RpcApi, SealHeader, SealResult, SealWork, UbqhashApi,
    UbqhashEngine,
};
pub use epoch::{
    make_cache, make_dataset, EpochCache, EpochData, EpochDataset, EpochItem, EpochLru,
    GenerateOptions,
};
pub use error::{Result, UbqhashError};
pub use metrics::Meter;
pub use reward::{alternate_policy_reward, calc_base_block_reward, calc_uncle_block_reward};
