// AmongFriends: who responds to whom in a group chat
//
// This is the library root. Each module corresponds to a major subsystem
// of the interaction-network pipeline.

pub mod config;
pub mod error;
pub mod graph;
pub mod output;
pub mod pipeline;
pub mod signal;
pub mod status;
