use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use webrtc::network::sctp::ppid;
use webrtc::network::{PipeConn, pipe};
use webrtc::{Agent, AgentConfig, Conn, LoggerFactory, Spine, TransportConfig};

fn transport_config() -> TransportConfig {
    let mut config = TransportConfig::default();
    // 0x14xx keeps SCTP packets inside the DTLS first-byte range.
    config.sctp.local_port = 5120;
    config.sctp.remote_port = 5120;
    config.sctp.rto_initial_ms = 200;
    config.sctp.rto_min_ms = 100;
    config.sctp.rto_max_ms = 400;
    config.sctp.heartbeat_interval_ms = 0;
    config
}

fn spines() -> (Spine, Spine) {
    let (a, b): (PipeConn, PipeConn) = pipe();
    let config = transport_config();
    let factory = LoggerFactory::discard();
    (
        Spine::new(Arc::new(a), &config, &factory).unwrap(),
        Spine::new(Arc::new(b), &config, &factory).unwrap(),
    )
}

fn recv_within(conn: &dyn Conn, timeout: Duration) -> Vec<u8> {
    conn.set_read_deadline(Some(Instant::now() + timeout)).unwrap();
    let mut buf = [0u8; 1500];
    let n = conn.recv(&mut buf).expect("datagram before deadline");
    buf[..n].to_vec()
}

#[test]
fn test_media_routed_by_first_byte() {
    let (left, right) = spines();

    let rtp = [0x80, 96, 0, 1, 0, 0, 0, 0, 0, 0, 0, 1];
    let rtcp = [0x80, 200, 0, 6, 0, 0, 0, 1];
    left.srtp_endpoint().send(&rtp).unwrap();
    left.srtcp_endpoint().send(&rtcp).unwrap();

    let timeout = Duration::from_secs(2);
    assert_eq!(recv_within(right.srtp_endpoint().as_ref(), timeout), rtp);
    assert_eq!(recv_within(right.srtcp_endpoint().as_ref(), timeout), rtcp);
}

#[test]
fn test_extra_endpoint_sees_unclaimed_traffic() {
    let (left, right) = spines();
    let stun = right.endpoint(|data: &[u8]| data.first().is_some_and(|b| *b <= 3));

    left.dtls_endpoint().send(&[0x00, 0x01, 0x00, 0x00]).unwrap();
    assert_eq!(
        recv_within(stun.as_ref(), Duration::from_secs(2)),
        vec![0x00, 0x01, 0x00, 0x00]
    );
}

#[test]
fn test_sctp_over_dtls_endpoint() {
    let (left, right) = spines();
    let right = Arc::new(right);

    let server = {
        let right = Arc::clone(&right);
        thread::spawn(move || right.associate_server())
    };
    let client = left.associate_client().expect("client handshake");
    let server = server.join().unwrap().expect("server handshake");

    let outbound = client.open_stream(0, ppid::STRING).unwrap();
    outbound.write(b"over the spine").unwrap();

    let inbound = server.accept_stream().unwrap();
    let mut buf = [0u8; 64];
    let (n, ppi) = inbound.read_sctp(&mut buf).unwrap();
    assert_eq!(&buf[..n], b"over the spine");
    assert_eq!(ppi, ppid::STRING);

    // media keeps flowing beside the association
    left.srtp_endpoint().send(&[0x80, 0x60, 0, 2]).unwrap();
    assert_eq!(
        recv_within(right.srtp_endpoint().as_ref(), Duration::from_secs(2)),
        vec![0x80, 0x60, 0, 2]
    );

    client.close().unwrap();
    server.close().unwrap();
}

#[test]
fn test_close_releases_endpoints() {
    let (left, _right) = spines();
    let dtls = left.dtls_endpoint();

    let reader = thread::spawn(move || {
        let mut buf = [0u8; 64];
        dtls.recv(&mut buf)
    });
    thread::sleep(Duration::from_millis(50));
    left.close().unwrap();
    left.close().unwrap();

    let result = reader.join().unwrap();
    assert!(result.is_err_and(|e| e.is_closed()));
}

#[test]
fn test_spine_over_ice_connection() {
    let ice_config = AgentConfig {
        include_loopback: true,
        check_interval_ms: 200,
        connect_timeout_ms: 10000,
        ..AgentConfig::default()
    };
    let factory = LoggerFactory::discard();
    let a = Arc::new(Agent::new(ice_config.clone(), factory.new_logger("ice")).unwrap());
    let b = Arc::new(Agent::new(ice_config, factory.new_logger("ice")).unwrap());

    for candidate in a.get_local_candidates() {
        b.add_remote_candidate(candidate).unwrap();
    }
    for candidate in b.get_local_candidates() {
        a.add_remote_candidate(candidate).unwrap();
    }

    let (a_ufrag, a_pwd) = a.get_local_user_credentials();
    let (b_ufrag, b_pwd) = b.get_local_user_credentials();
    let acceptor = {
        let b = Arc::clone(&b);
        thread::spawn(move || b.accept(&a_ufrag, &a_pwd))
    };
    let a_conn = a.dial(&b_ufrag, &b_pwd).expect("dial");
    let b_conn = acceptor.join().unwrap().expect("accept");

    let config = transport_config();
    let left = Spine::new(Arc::new(a_conn), &config, &factory).unwrap();
    let right = Spine::new(Arc::new(b_conn), &config, &factory).unwrap();

    left.dtls_endpoint().send(&[0x16, 0xfe, 0xfd, 0x00]).unwrap();
    assert_eq!(
        recv_within(right.dtls_endpoint().as_ref(), Duration::from_secs(2)),
        vec![0x16, 0xfe, 0xfd, 0x00]
    );

    left.close().unwrap();
    right.close().unwrap();
    a.close().unwrap();
    b.close().unwrap();
}
