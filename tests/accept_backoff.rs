//! Accept loop behavior when the process runs out of file descriptors.
//!
//! Lowers RLIMIT_NOFILE for the whole process, so it lives in its own test
//! binary.

use std::fs::File;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use meshctl::config::Route;
use meshctl::{ControlService, ControlSocket, Identity, MeshState, MeshView, RerouteTable, Topology};
use tokio::sync::watch;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

struct WarnCounter(Arc<AtomicUsize>);

impl<S: Subscriber> Layer<S> for WarnCounter {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() == Level::WARN {
            self.0.fetch_add(1, Ordering::Relaxed);
        }
    }
}

fn nofile_limit() -> libc::rlimit {
    let mut limit = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    assert_eq!(unsafe { libc::getrlimit(libc::RLIMIT_NOFILE, &mut limit) }, 0);
    limit
}

fn set_nofile_limit(limit: &libc::rlimit) {
    assert_eq!(unsafe { libc::setrlimit(libc::RLIMIT_NOFILE, limit) }, 0);
}

fn open_fds() -> usize {
    std::fs::read_dir("/proc/self/fd").unwrap().count()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_accept_errors_back_off() {
    let warnings = Arc::new(AtomicUsize::new(0));
    tracing::subscriber::set_global_default(
        tracing_subscriber::registry().with(WarnCounter(Arc::clone(&warnings))),
    )
    .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("control.sock");
    let peer = Identity::generate().peer_identity();
    let topology = Topology::new(
        vec![peer],
        vec![Route {
            network: "10.0.0.0/24".parse().unwrap(),
            target: peer,
        }],
    )
    .unwrap();
    let service = Arc::new(ControlService::new(
        Arc::new(MeshState::new(Identity::generate().peer_identity())) as Arc<dyn MeshView>,
        Arc::new(topology),
        Arc::new(RerouteTable::new()),
    ));
    let socket = ControlSocket::bind_path(&path).unwrap();
    let (shutdown, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(socket.run(service, shutdown_rx));

    let original = nofile_limit();
    let lowered = libc::rlimit {
        rlim_cur: (open_fds() + 32) as libc::rlim_t,
        rlim_max: original.rlim_max,
    };
    set_nofile_limit(&lowered);

    // Use up every descriptor, then free one for a client. The daemon has
    // none left to accept it with, so the connection stays queued.
    let mut filler = Vec::new();
    while let Ok(file) = File::open("/dev/null") {
        filler.push(file);
        assert!(filler.len() < 10_000, "descriptor limit not applied");
    }
    filler.pop();
    let _client = std::os::unix::net::UnixStream::connect(&path).unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    let before = warnings.load(Ordering::Relaxed);
    tokio::time::sleep(Duration::from_millis(500)).await;
    let during = warnings.load(Ordering::Relaxed) - before;
    assert!(before > 0, "accept never failed");
    assert!(during <= 10, "{during} accept warnings in 500ms");

    // Shutdown is not held up by the pause between attempts.
    shutdown.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .expect("accept loop did not stop")
        .unwrap();

    drop(filler);
    set_nofile_limit(&original);
    assert!(!path.exists());
}
