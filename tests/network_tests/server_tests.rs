//! Server Tests
//!
//! Tests for the listener, per-connection sessions and shutdown behavior
//! over real TCP connections.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use simbridge::network::SessionRegistry;
use simbridge::protocol::{encode_command, encode_float64, encode_int32, Command};
use simbridge::{
    BridgeClient, BridgeError, Config, FaultPolicy, Result, Server, ServerMode, ShutdownSignal,
};

// =============================================================================
// Helper Functions
// =============================================================================

struct Running {
    addr: SocketAddr,
    shutdown: ShutdownSignal,
    registry: Arc<SessionRegistry>,
    thread: JoinHandle<Result<()>>,
}

impl Running {
    fn connect(&self) -> BridgeClient {
        let client = BridgeClient::connect(self.addr).unwrap();
        client.set_timeout(Duration::from_secs(5)).unwrap();
        client
    }

    /// Stop the server and return what `run` returned
    fn stop(self) -> Result<()> {
        self.shutdown.trigger();
        self.join()
    }

    fn join(self) -> Result<()> {
        self.thread.join().unwrap()
    }
}

fn test_config() -> simbridge::config::ConfigBuilder {
    Config::builder()
        .listen_addr("127.0.0.1:0")
        .poll_interval_ms(50)
        .shutdown_grace_ms(2000)
}

fn start(config: Config) -> Running {
    let mut server = Server::bind(config).unwrap();
    let addr = server.local_addr();
    let shutdown = server.shutdown_signal();
    let registry = server.registry();

    let thread = thread::spawn(move || server.run());

    Running {
        addr,
        shutdown,
        registry,
        thread,
    }
}

fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {}", what);
        thread::sleep(Duration::from_millis(10));
    }
}

fn wait_for_exit(running: &Running) {
    wait_until("server to exit", || running.thread.is_finished());
}

/// True if the server closed this client's connection
fn is_closed(client: &mut BridgeClient) -> bool {
    match client.recv_raw() {
        Ok(bytes) => bytes.is_empty(),
        Err(BridgeError::Io(_)) => true,
        Err(_) => false,
    }
}

fn evaluate_message(values: &[f64]) -> Vec<u8> {
    let mut bytes = encode_int32(2).to_vec();
    for v in values {
        bytes.extend_from_slice(&encode_float64(*v));
    }
    bytes
}

// =============================================================================
// Bind Tests
// =============================================================================

#[test]
fn test_bind_ephemeral_port() {
    let server = Server::bind(test_config().build()).unwrap();
    assert_ne!(server.local_addr().port(), 0);
}

#[test]
fn test_bind_port_in_use() {
    let first = Server::bind(test_config().build()).unwrap();
    let taken = first.local_addr().to_string();

    match Server::bind(test_config().listen_addr(taken.clone()).build()) {
        Err(BridgeError::Bind { addr, .. }) => assert_eq!(addr, taken),
        Err(other) => panic!("Expected Bind error, got {:?}", other),
        Ok(_) => panic!("Expected Bind error, got a server"),
    }
}

#[test]
fn test_bind_rejects_invalid_config() {
    let result = Server::bind(test_config().buffer_size(2).build());
    assert!(matches!(result, Err(BridgeError::Config(_))));
}

// =============================================================================
// Multi-Session Tests
// =============================================================================

#[test]
fn test_sessions_are_isolated() {
    let running = start(test_config().build());

    let mut a = running.connect();
    let mut b = running.connect();
    a.set_gain(2).unwrap();
    b.set_gain(10).unwrap();

    assert_eq!(a.evaluate(0.0, 3.0, 1.0).unwrap(), 6.0);
    assert_eq!(b.evaluate(0.0, 3.0, 1.0).unwrap(), 30.0);
    assert_eq!(a.evaluate(1.0, 1.0, 0.0).unwrap(), 0.0);

    a.close_session().unwrap();
    b.close_session().unwrap();
    running.stop().unwrap();
}

#[test]
fn test_concurrent_sessions() {
    let running = start(test_config().build());
    let addr = running.addr;

    let workers: Vec<_> = (1..=8)
        .map(|gain| {
            thread::spawn(move || {
                let mut client = BridgeClient::connect(addr).unwrap();
                client.set_timeout(Duration::from_secs(5)).unwrap();
                client.set_gain(gain).unwrap();
                for i in 0..50 {
                    let out = client.evaluate(f64::from(i), f64::from(i), 1.0).unwrap();
                    assert_eq!(out, f64::from(i * gain));
                }
                client.close_session().unwrap();
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }
    running.stop().unwrap();
}

#[test]
fn test_registry_tracks_sessions() {
    let running = start(test_config().build());

    let a = running.connect();
    let b = running.connect();
    wait_until("two sessions", || running.registry.len() == 2);

    a.close_session().unwrap();
    wait_until("one session", || running.registry.len() == 1);

    drop(b);
    wait_until("no sessions", || running.registry.is_empty());

    running.stop().unwrap();
}

#[test]
fn test_close_session_leaves_others_running() {
    let running = start(test_config().build());

    let mut a = running.connect();
    let mut b = running.connect();
    a.set_gain(1).unwrap();
    b.set_gain(4).unwrap();

    a.send_raw(&encode_command(&Command::CloseSession)).unwrap();
    assert!(is_closed(&mut a));

    // Existing and new sessions keep working
    assert_eq!(b.evaluate(0.0, 2.0, 1.0).unwrap(), 8.0);
    let mut c = running.connect();
    c.set_gain(3).unwrap();
    assert_eq!(c.evaluate(0.0, 2.0, 1.0).unwrap(), 6.0);

    assert!(!running.shutdown.is_triggered());
    running.stop().unwrap();
}

#[test]
fn test_disconnect_without_close() {
    let running = start(test_config().build());

    let mut a = running.connect();
    a.set_gain(1).unwrap();
    drop(a);

    let mut b = running.connect();
    b.set_gain(5).unwrap();
    assert_eq!(b.evaluate(0.0, 1.0, 1.0).unwrap(), 5.0);

    running.stop().unwrap();
}

#[test]
fn test_get_port_number_is_peer_port() {
    let running = start(test_config().build());

    let mut stream = TcpStream::connect(running.addr).unwrap();
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    stream
        .write_all(&encode_command(&Command::GetPortNumber))
        .unwrap();

    let mut reply = [0u8; 4];
    stream.read_exact(&mut reply).unwrap();
    let port = i32::from_le_bytes(reply);

    assert_eq!(port, i32::from(stream.local_addr().unwrap().port()));
    running.stop().unwrap();
}

#[test]
fn test_lifecycle_without_log_name() {
    let running = start(test_config().build());

    let mut client = running.connect();
    client.set_instance_name("A").unwrap();
    client.set_step_number(1).unwrap();
    client.initialize().unwrap();
    client.destroy().unwrap();

    // Still served after the unlogged step
    client.set_gain(2).unwrap();
    assert_eq!(client.evaluate(0.0, 1.5, 1.0).unwrap(), 3.0);

    client.close_session().unwrap();
    running.stop().unwrap();
}

#[test]
fn test_empty_instance_name_is_accepted() {
    let running = start(test_config().build());

    let mut client = running.connect();
    client.set_instance_name("").unwrap();
    client.set_log_name("").unwrap();
    client.set_gain(1).unwrap();
    assert_eq!(client.evaluate(0.0, 4.0, 1.0).unwrap(), 4.0);

    client.close_session().unwrap();
    running.stop().unwrap();
}

#[test]
fn test_max_connections() {
    let running = start(test_config().max_connections(1).build());

    let mut a = running.connect();
    a.set_gain(2).unwrap();
    wait_until("first session", || running.registry.len() == 1);

    // Accepted then dropped
    let mut b = running.connect();
    assert!(is_closed(&mut b));

    assert_eq!(a.evaluate(0.0, 1.0, 1.0).unwrap(), 2.0);
    running.stop().unwrap();
}

// =============================================================================
// Fault Handling Tests
// =============================================================================

#[test]
fn test_malformed_message_closes_only_that_session() {
    let running = start(test_config().build());

    let mut bad = running.connect();
    let mut good = running.connect();
    good.set_gain(3).unwrap();

    bad.send_raw(&evaluate_message(&[0.0, 3.0])).unwrap();
    assert!(is_closed(&mut bad));

    assert_eq!(good.evaluate(0.0, 3.0, 1.0).unwrap(), 9.0);
    assert!(!running.shutdown.is_triggered());
    running.stop().unwrap();
}

#[test]
fn test_unknown_command_closes_session() {
    let running = start(test_config().build());

    let mut client = running.connect();
    client.send_raw(&encode_int32(77)).unwrap();
    assert!(is_closed(&mut client));

    running.stop().unwrap();
}

#[test]
fn test_short_message_closes_session() {
    let running = start(test_config().build());

    let mut client = running.connect();
    client.send_raw(&[0x02, 0x00]).unwrap();
    assert!(is_closed(&mut client));

    running.stop().unwrap();
}

#[test]
fn test_fault_policy_shutdown_server() {
    let running = start(
        test_config()
            .fault_policy(FaultPolicy::ShutdownServer)
            .build(),
    );

    let mut bystander = running.connect();
    bystander.set_gain(1).unwrap();

    let mut bad = running.connect();
    bad.send_raw(&evaluate_message(&[0.0])).unwrap();

    wait_for_exit(&running);
    assert!(is_closed(&mut bystander));

    match running.join() {
        Err(BridgeError::SessionFault(reason)) => assert!(reason.contains("Evaluate")),
        other => panic!("Expected SessionFault, got {:?}", other),
    }
}

#[test]
fn test_log_open_failure_is_a_fault() {
    let dir = tempfile::TempDir::new().unwrap();
    let missing = dir.path().join("missing").join("inst.log");
    let running = start(test_config().build());

    let mut client = running.connect();
    client
        .set_log_name(&missing.to_string_lossy())
        .unwrap();
    client.set_step_number(1).unwrap();

    client
        .send_raw(&encode_command(&Command::Initialize))
        .unwrap();
    assert!(is_closed(&mut client));

    running.stop().unwrap();
}

// =============================================================================
// Shutdown Tests
// =============================================================================

#[test]
fn test_shutdown_closes_idle_sessions() {
    let running = start(test_config().build());

    let mut client = running.connect();
    client.set_gain(1).unwrap();

    let began = Instant::now();
    running.shutdown.trigger();
    wait_for_exit(&running);

    assert!(is_closed(&mut client));
    assert!(began.elapsed() < Duration::from_secs(3));
    running.join().unwrap();
}

#[test]
fn test_no_connections_after_shutdown() {
    let running = start(test_config().build());
    let addr = running.addr;
    running.stop().unwrap();

    assert!(TcpStream::connect_timeout(&addr, Duration::from_secs(1)).is_err());
}

// =============================================================================
// Single-Session Mode Tests
// =============================================================================

#[test]
fn test_single_mode_close_session_stops_server() {
    let running = start(test_config().mode(ServerMode::Single).build());

    let mut client = running.connect();
    client.set_gain(2).unwrap();
    assert_eq!(client.evaluate(0.0, 4.0, 1.0).unwrap(), 8.0);
    client.close_session().unwrap();

    wait_for_exit(&running);
    running.join().unwrap();
}

#[test]
fn test_single_mode_stops_listening() {
    let running = start(test_config().mode(ServerMode::Single).build());

    let mut first = running.connect();
    first.set_gain(1).unwrap();

    let addr = running.addr;
    wait_until("listener to close", || {
        TcpStream::connect_timeout(&addr, Duration::from_millis(200)).is_err()
    });
    assert_eq!(first.evaluate(0.0, 2.0, 1.0).unwrap(), 2.0);

    first.close_session().unwrap();
    wait_for_exit(&running);
    running.join().unwrap();
}

#[test]
fn test_single_mode_get_port_number_unsupported() {
    let running = start(test_config().mode(ServerMode::Single).build());

    let mut client = running.connect();
    client
        .send_raw(&encode_command(&Command::GetPortNumber))
        .unwrap();
    assert!(is_closed(&mut client));

    // The fault ends the only session, which ends the server
    wait_for_exit(&running);
    running.join().unwrap();
}
