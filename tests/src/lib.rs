//! # Ubqhash Test Suite
//!
//! Cross-module flows of the ubqhash engine.
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── benches/          # Criterion benchmarks
//! │   └── ubqhash_benchmarks.rs
//! └── src/integration/  # Engine-level flows
//!     ├── difficulty_flows.rs
//!     ├── sealing_flows.rs
//!     └── storage_flows.rs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p qc-tests
//! cargo test -p qc-tests integration::sealing_flows
//!
//! # Benchmarks
//! cargo bench -p qc-tests
//! ```

pub mod integration;
