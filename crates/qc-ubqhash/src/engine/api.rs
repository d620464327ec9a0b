//! RPC service exposed by the engine

use super::UbqhashEngine;
use crate::error::{Result, UbqhashError};
use primitive_types::H256;
use std::sync::Arc;

/// RPC namespace registration
#[derive(Clone)]
pub struct RpcApi {
    pub namespace: &'static str,
    pub version: &'static str,
    pub service: Arc<UbqhashApi>,
    pub public: bool,
}

/// Remote mining endpoints backed by an engine
pub struct UbqhashApi {
    engine: Arc<UbqhashEngine>,
}

impl UbqhashApi {
    pub fn new(engine: Arc<UbqhashEngine>) -> Self {
        Self { engine }
    }

    /// Current work package: seal hash, seed hash, boundary, block number.
    pub fn get_work(&self) -> Result<[String; 4]> {
        match self.engine.remote_sealer() {
            Some(remote) => remote.fetch_work(),
            None => Err(UbqhashError::NotSupported),
        }
    }

    /// Report the hashrate of remote miner `id`.
    pub fn submit_hashrate(&self, rate: u64, id: H256) -> bool {
        self.engine
            .remote_sealer()
            .is_some_and(|remote| remote.submit_hashrate(id, rate))
    }

    /// Local plus remote hashrate, in hashes per second
    pub fn get_hashrate(&self) -> u64 {
        self.engine.hashrate() as u64
    }
}

impl UbqhashEngine {
    /// RPC services: `eth` and `ubqhash` share one service.
    pub fn apis(self: &Arc<Self>) -> Vec<RpcApi> {
        let service = Arc::new(UbqhashApi::new(self.clone()));
        ["eth", "ubqhash"]
            .into_iter()
            .map(|namespace| RpcApi {
                namespace,
                version: "1.0",
                service: service.clone(),
                public: true,
            })
            .collect()
    }
}
