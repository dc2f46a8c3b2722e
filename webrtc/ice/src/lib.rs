//! ICE Module - Interactive Connectivity Establishment
//!
//! Host and server-reflexive gathering, STUN connectivity checks with
//! USE-CANDIDATE nomination, keepalives on the selected pair, and the
//! [`IceConn`] packet connection that higher layers run over.

pub mod agent;
pub mod candidate;
pub mod candidate_pair;
pub mod candidate_type;
pub mod config;
pub mod conn;
pub mod connection_state;
pub mod errors;
mod gather;
pub mod url;

pub use agent::Agent;
pub use candidate::Candidate;
pub use candidate_pair::CandidatePair;
pub use candidate_type::CandidateType;
pub use config::AgentConfig;
pub use conn::IceConn;
pub use connection_state::{ConnectionState, GatheringState};
pub use errors::{IceError, Result, UrlErrorKind};
pub use url::{ProtoType, SchemeType, Url};
