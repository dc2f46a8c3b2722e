//! Transport spine: one shared connection split into DTLS, SRTP and SRTCP
//! endpoints, with an optional SCTP association over the DTLS endpoint.

use std::sync::Arc;

use logging::{Logger, LoggerFactory};
use network::mux::{match_dtls, match_srtcp, match_srtp};
use network::{Association, AssociationConfig, Conn, Endpoint, Mux, Result};

use crate::config::TransportConfig;

/// The demultiplexed transport over one connected path.
pub struct Spine {
    mux: Mux,
    dtls: Arc<Endpoint>,
    srtp: Arc<Endpoint>,
    srtcp: Arc<Endpoint>,
    sctp_config: AssociationConfig,
    sctp_logger: Logger,
    logger: Logger,
}

impl Spine {
    /// Starts a mux over `conn`, usually an [`ice::IceConn`], and registers
    /// the DTLS, SRTP and SRTCP endpoints.
    pub fn new(
        conn: Arc<dyn Conn>,
        config: &TransportConfig,
        factory: &LoggerFactory,
    ) -> Result<Self> {
        let logger = factory.new_logger("spine");
        let mux = Mux::new(conn, &config.mux, factory.new_logger("mux"))?;

        let dtls = mux.new_endpoint(match_dtls);
        let srtp = mux.new_endpoint(match_srtp);
        let srtcp = mux.new_endpoint(match_srtcp);
        logger.debug(&format!("Spine up with {} endpoints", mux.endpoint_count()));

        Ok(Self {
            mux,
            dtls,
            srtp,
            srtcp,
            sctp_config: config.sctp.clone(),
            sctp_logger: factory.new_logger("sctp"),
            logger,
        })
    }

    pub fn dtls_endpoint(&self) -> Arc<Endpoint> {
        Arc::clone(&self.dtls)
    }

    pub fn srtp_endpoint(&self) -> Arc<Endpoint> {
        Arc::clone(&self.srtp)
    }

    pub fn srtcp_endpoint(&self) -> Arc<Endpoint> {
        Arc::clone(&self.srtcp)
    }

    /// Registers an extra endpoint. The built-in endpoints are checked
    /// first, so `matcher` only sees datagrams they reject.
    pub fn endpoint<F>(&self, matcher: F) -> Arc<Endpoint>
    where
        F: Fn(&[u8]) -> bool + Send + Sync + 'static,
    {
        self.mux.new_endpoint(matcher)
    }

    /// Opens an SCTP association over the DTLS endpoint, blocking until
    /// the handshake completes.
    ///
    /// The SCTP ports must keep the first byte of every packet inside the
    /// DTLS range (20..=63), e.g. 5120.
    pub fn associate_client(&self) -> Result<Association> {
        self.logger.info("Opening SCTP association (client)");
        Association::client(
            self.dtls_endpoint(),
            self.sctp_config.clone(),
            self.sctp_logger.clone(),
        )
    }

    /// Waits on the DTLS endpoint for a peer association.
    pub fn associate_server(&self) -> Result<Association> {
        self.logger.info("Waiting for SCTP association (server)");
        Association::server(
            self.dtls_endpoint(),
            self.sctp_config.clone(),
            self.sctp_logger.clone(),
        )
    }

    /// Closes every endpoint and the shared connection.
    pub fn close(&self) -> Result<()> {
        self.logger.debug("Closing spine");
        self.mux.close()
    }
}

impl Drop for Spine {
    fn drop(&mut self) {
        let _ = self.mux.close();
    }
}
