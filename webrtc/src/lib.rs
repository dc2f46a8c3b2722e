//! # WebRTC transport spine
//!
//! The lower layers of a WebRTC peer connection, wired together:
//!
//! - **`ice`** - candidate gathering and connectivity checks; a connected
//!   agent yields an [`ice::IceConn`] carrying datagrams over the selected
//!   pair.
//! - **`network::mux`** - RFC 7983 demultiplexing of that connection into
//!   DTLS, SRTP and SRTCP endpoints.
//! - **`network::sctp`** - reliable, ordered message streams over the
//!   (secured) DTLS endpoint.
//!
//! [`TransportConfig`] configures every layer from one JSON file and
//! [`Spine`] assembles them over any [`network::Conn`].
//!
//! ## Example Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use webrtc::{Agent, LogTarget, Spine, TransportConfig};
//!
//! let config = TransportConfig::find_and_load().unwrap_or_default();
//! let factory = config.logger_factory(&LogTarget::Stderr).unwrap();
//!
//! let agent = Agent::new(config.ice.clone(), factory.new_logger("ice")).unwrap();
//! // exchange credentials and candidates over signaling, then:
//! let conn = agent.dial("remoteufrag", "remotepassword").unwrap();
//!
//! let spine = Spine::new(Arc::new(conn), &config, &factory).unwrap();
//! let association = spine.associate_client().unwrap();
//! let stream = association.open_stream(0, 51).unwrap();
//! stream.write(b"hello").unwrap();
//! ```

mod config;
mod spine;

pub use config::{CONFIG_FILE_NAME, TransportConfig};
pub use spine::Spine;

// ===== Layers =====
pub use ice;
pub use network;
pub use stun;

// ===== ICE =====
pub use ice::{
    Agent, AgentConfig, Candidate, CandidatePair, CandidateType, ConnectionState, IceConn,
    IceError, Url,
};

// ===== Mux / SCTP =====
pub use network::{
    Association, AssociationConfig, AssociationState, Conn, Endpoint, Mux, MuxConfig,
    NetworkError, Stream,
};

// ===== Logging =====
pub use logging::{LogLevel, LogTarget, Logger, LoggerFactory};
