//! Engine-level integration flows

pub mod difficulty_flows;
pub mod sealing_flows;
pub mod storage_flows;
