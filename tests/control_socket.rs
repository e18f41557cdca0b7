//! End-to-end tests over a real control socket.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use meshctl::config::Route;
use meshctl::control::{Response, MAX_REQUEST_LINE, SOCKET_MODE};
use meshctl::{
    ClientError, Connection, ControlClient, ControlService, ControlSocket, Identity, MeshState,
    MeshView, PeerIdentity, RerouteTable, RouteAction, SocketError, Topology,
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;

struct Daemon {
    path: PathBuf,
    mesh: Arc<MeshState>,
    peer_a: PeerIdentity,
    peer_b: PeerIdentity,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
    _dir: tempfile::TempDir,
}

impl Daemon {
    /// routes = [10.0.0.0/24 -> A], peers = [A, B]
    fn start() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run").join("control.sock");

        let peer_a = Identity::generate().peer_identity();
        let peer_b = Identity::generate().peer_identity();
        let topology = Topology::new(
            vec![peer_a, peer_b],
            vec![Route {
                network: "10.0.0.0/24".parse().unwrap(),
                target: peer_a,
            }],
        )
        .unwrap();
        let mesh = Arc::new(MeshState::new(Identity::generate().peer_identity()));
        let service = Arc::new(ControlService::new(
            Arc::clone(&mesh) as Arc<dyn MeshView>,
            Arc::new(topology),
            Arc::new(RerouteTable::new()),
        ));

        let socket = ControlSocket::bind_path(&path).unwrap();
        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(socket.run(service, shutdown_rx));

        Self {
            path,
            mesh,
            peer_a,
            peer_b,
            shutdown,
            task,
            _dir: dir,
        }
    }

    async fn client(&self) -> ControlClient {
        ControlClient::connect(&self.path).await.unwrap()
    }

    /// Signal shutdown and wait for the accept loop to finish.
    async fn stop(self) {
        self.shutdown.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), self.task)
            .await
            .expect("accept loop did not stop")
            .unwrap();
        assert!(!self.path.exists(), "socket file left behind");
        assert!(matches!(
            ControlClient::connect(&self.path).await,
            Err(ClientError::Connect { .. })
        ));
    }
}

fn remote_code(result: Result<impl std::fmt::Debug, ClientError>) -> String {
    match result {
        Err(ClientError::Remote { code, .. }) => code,
        other => panic!("expected remote error, got {:?}", other),
    }
}

fn mode(path: &Path) -> u32 {
    std::fs::metadata(path).unwrap().permissions().mode() & 0o777
}

#[tokio::test]
async fn test_socket_mode() {
    let daemon = Daemon::start();
    assert_eq!(mode(&daemon.path), SOCKET_MODE);
    daemon.stop().await;
}

#[tokio::test]
async fn test_relay_show_reset_over_socket() {
    let daemon = Daemon::start();
    let mut client = daemon.client().await;
    let peer_b = daemon.peer_b.npub();

    let reply = client
        .route(RouteAction::Relay, ["10.0.0.0/24", peer_b.as_str()])
        .await
        .unwrap();
    assert!(reply.routes.is_empty());

    let shown = client.route(RouteAction::Show, Vec::<String>::new()).await.unwrap();
    assert_eq!(shown.routes.len(), 1);
    let route = &shown.routes[0];
    assert_eq!(route.network.to_string(), "10.0.0.0/24");
    assert_eq!(route.target, daemon.peer_a);
    assert_eq!(route.relay, daemon.peer_b);
    assert!(route.is_relay);

    client.route(RouteAction::Reset, ["all"]).await.unwrap();

    let shown = client.route(RouteAction::Show, Vec::<String>::new()).await.unwrap();
    assert_eq!(shown.routes[0].relay, daemon.peer_a);
    assert!(!shown.routes[0].is_relay);

    daemon.stop().await;
}

#[tokio::test]
async fn test_route_errors_over_socket() {
    let daemon = Daemon::start();
    let mut client = daemon.client().await;
    let peer_b = daemon.peer_b.npub();

    let result = client
        .route(RouteAction::Relay, ["10.0.1.0/24", peer_b.as_str()])
        .await;
    assert_eq!(remote_code(result), "unknown_network");

    let result = client.route(RouteAction::Relay, ["x"]).await;
    match result {
        Err(ClientError::Remote { code, message }) => {
            assert_eq!(code, "argument_count");
            assert_eq!(message, "expected exactly 2 arguments, got 1");
        }
        other => panic!("expected argument count error, got {:?}", other),
    }

    let result = client.route(RouteAction::Unknown, Vec::<String>::new()).await;
    assert_eq!(remote_code(result), "unknown_action");

    // The session survives errors and nothing was changed.
    let shown = client.route(RouteAction::Show, Vec::<String>::new()).await.unwrap();
    assert!(!shown.routes[0].is_relay);

    daemon.stop().await;
}

#[tokio::test]
async fn test_status_and_peers_over_socket() {
    let daemon = Daemon::start();
    daemon
        .mesh
        .add_connection(Connection::new("udp/192.0.2.1:4000", daemon.peer_a));
    daemon.mesh.record_rtt(&daemon.peer_a, Duration::from_millis(20));
    daemon.mesh.set_listen_addrs(vec!["udp/0.0.0.0:4000".to_string()]);

    let mut client = daemon.client().await;

    let status = client.status().await.unwrap();
    assert_eq!(status.local_id, daemon.mesh.local_identity());
    assert_eq!(status.total_connections, 1);
    assert_eq!(status.connected_peers, 1);
    assert_eq!(status.configured_peers, 2);
    assert_eq!(status.peer_connections.len(), 1);
    assert_eq!(status.peer_connections[0].peer, daemon.peer_a);
    assert_eq!(status.peer_connections[0].latency, Duration::from_millis(20));
    assert_eq!(status.listen_addrs, vec!["udp/0.0.0.0:4000".to_string()]);

    let peers = client.peers().await.unwrap();
    assert_eq!(peers.connections.len(), 1);
    assert_eq!(peers.connections[0].address, "udp/192.0.2.1:4000");

    daemon.stop().await;
}

#[tokio::test]
async fn test_malformed_line_gets_bad_request() {
    let daemon = Daemon::start();
    let stream = UnixStream::connect(&daemon.path).await.unwrap();
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    writer.write_all(b"not json\n").await.unwrap();
    let line = lines.next_line().await.unwrap().unwrap();
    match serde_json::from_str::<Response>(&line).unwrap() {
        Response::Error { code, .. } => assert_eq!(code, "bad_request"),
        other => panic!("expected error response, got {:?}", other),
    }

    writer.write_all(b"{\"method\":\"peers\"}\n").await.unwrap();
    let line = lines.next_line().await.unwrap().unwrap();
    assert!(serde_json::from_str::<Response>(&line).unwrap().is_ok());

    daemon.stop().await;
}

#[tokio::test]
async fn test_oversized_line_gets_bad_request() {
    let daemon = Daemon::start();
    let stream = UnixStream::connect(&daemon.path).await.unwrap();
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    let mut oversized = vec![b' '; MAX_REQUEST_LINE * 4];
    oversized.push(b'\n');
    writer.write_all(&oversized).await.unwrap();
    let line = lines.next_line().await.unwrap().unwrap();
    match serde_json::from_str::<Response>(&line).unwrap() {
        Response::Error { code, message } => {
            assert_eq!(code, "bad_request");
            assert!(message.contains("exceeds"), "{message}");
        }
        other => panic!("expected error response, got {:?}", other),
    }

    // Exactly one response for the oversized line, then normal service.
    writer.write_all(b"{\"method\":\"status\"}\n").await.unwrap();
    let line = lines.next_line().await.unwrap().unwrap();
    assert!(serde_json::from_str::<Response>(&line).unwrap().is_ok());

    daemon.stop().await;
}

#[tokio::test]
async fn test_concurrent_sessions() {
    let daemon = Daemon::start();
    let mut first = daemon.client().await;
    let mut second = daemon.client().await;
    let peer_b = daemon.peer_b.npub();

    first
        .route(RouteAction::Relay, ["all", peer_b.as_str()])
        .await
        .unwrap();
    let shown = second.route(RouteAction::Show, Vec::<String>::new()).await.unwrap();
    assert_eq!(shown.routes[0].relay, daemon.peer_b);

    daemon.stop().await;
}

#[tokio::test]
async fn test_shutdown_with_open_session() {
    let daemon = Daemon::start();
    let mut client = daemon.client().await;
    client.status().await.unwrap();
    let path = daemon.path.clone();

    daemon.stop().await;
    assert!(!path.exists());
}

#[tokio::test]
async fn test_dropped_sender_stops_accept_loop() {
    let daemon = Daemon::start();
    let Daemon {
        path,
        shutdown,
        task,
        _dir,
        ..
    } = daemon;
    drop(shutdown);
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("accept loop did not stop")
        .unwrap();
    assert!(!path.exists());
}

#[tokio::test]
async fn test_live_socket_not_replaced() {
    let daemon = Daemon::start();
    let result = ControlSocket::bind_path(&daemon.path);
    assert!(matches!(result, Err(SocketError::AddrInUse(_))));

    // The running daemon still answers.
    let mut client = daemon.client().await;
    client.peers().await.unwrap();

    daemon.stop().await;
}

#[tokio::test]
async fn test_stale_socket_replaced() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("control.sock");
    drop(std::os::unix::net::UnixListener::bind(&path).unwrap());
    assert!(path.exists());

    let socket = ControlSocket::bind_path(&path).unwrap();
    assert_eq!(socket.path(), path.as_path());
    assert_eq!(mode(&path), SOCKET_MODE);

    drop(socket);
    assert!(!path.exists());
}
