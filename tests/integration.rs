//! Integration tests for dmap-rs.
//!
//! Discovery and advertisement are replaced by in-process fakes; sessions run
//! either against scripted connectors or against a share served on loopback.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dmap_rs::client::Client;
use dmap_rs::constants::{ServiceType, ShareKind};
use dmap_rs::db::RecordCollection;
use dmap_rs::discovery::{ServiceAdvert, ServiceBrowser, ServiceDescriptor, ServicePublisher};
use dmap_rs::error::{DiscoveryError, SessionError, ShareError};
use dmap_rs::event_loop::{EventLoop, LoopEvent, LoopHandle};
use dmap_rs::message::RecordEntry;
use dmap_rs::record::factory_for;
use dmap_rs::session::{ConnectFuture, Connector, SessionId, SessionState, TcpConnector};
use dmap_rs::share::{ShareConfig, ShareHost, create_share};
use tokio::sync::oneshot;

type Outcome = Result<Vec<RecordEntry>, SessionError>;

/// Browser whose announcements are made by the test.
#[derive(Default)]
struct FakeBrowser {
    fail: bool,
    handle: Rc<RefCell<Option<LoopHandle>>>,
}

impl FakeBrowser {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    fn announcer(&self) -> Announcer {
        Announcer(Rc::clone(&self.handle))
    }
}

impl ServiceBrowser for FakeBrowser {
    fn start(
        &mut self,
        _service_type: ServiceType,
        events: LoopHandle,
    ) -> Result<(), DiscoveryError> {
        if self.fail {
            return Err(DiscoveryError::Other("multicast socket unavailable".to_string()));
        }
        *self.handle.borrow_mut() = Some(events);
        Ok(())
    }
}

struct Announcer(Rc<RefCell<Option<LoopHandle>>>);

impl Announcer {
    fn announce(&self, name: &str, host: &str, port: u16) {
        let handle = self.0.borrow();
        let handle = handle.as_ref().expect("browser not started");
        assert!(handle.post(LoopEvent::ServiceAdded(ServiceDescriptor::new(name, host, port))));
    }
}

/// Connector that hands out pre-scripted attempts in call order.
#[derive(Clone, Default)]
struct ScriptedConnector {
    scripts: Arc<Mutex<VecDeque<ConnectFuture>>>,
    calls: Arc<Mutex<Vec<ServiceDescriptor>>>,
}

impl ScriptedConnector {
    fn push_ready(&self, outcome: Outcome) {
        self.scripts
            .lock()
            .unwrap()
            .push_back(Box::pin(async move { outcome }));
    }

    fn push_gated(&self) -> oneshot::Sender<Outcome> {
        let (tx, rx) = oneshot::channel::<Outcome>();
        self.scripts.lock().unwrap().push_back(Box::pin(async move {
            rx.await
                .unwrap_or_else(|_| Err(SessionError::new("gate dropped")))
        }));
        tx
    }

    fn calls(&self) -> Vec<ServiceDescriptor> {
        self.calls.lock().unwrap().clone()
    }
}

impl Connector for ScriptedConnector {
    fn connect(&self, service: &ServiceDescriptor) -> ConnectFuture {
        self.calls.lock().unwrap().push(service.clone());
        self.scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Box::pin(std::future::pending()))
    }
}

/// Publisher that records adverts, or refuses them.
#[derive(Default)]
struct RecordingPublisher {
    adverts: Vec<ServiceAdvert>,
    refuse: Option<String>,
}

impl ServicePublisher for RecordingPublisher {
    fn publish(&mut self, advert: &ServiceAdvert) -> Result<(), DiscoveryError> {
        if let Some(reason) = &self.refuse {
            return Err(DiscoveryError::Other(reason.clone()));
        }
        self.adverts.push(advert.clone());
        Ok(())
    }
}

fn new_client(
    event_loop: &EventLoop,
    connector: impl Connector + 'static,
) -> (Client<Vec<u8>>, Announcer) {
    let browser = FakeBrowser::default();
    let announcer = browser.announcer();
    let client = Client::new(
        browser,
        ServiceType::Daap,
        connector,
        factory_for(ShareKind::Audio),
        Vec::new(),
        event_loop.handle(),
    )
    .unwrap();
    (client, announcer)
}

fn stdout_of(client: &Client<Vec<u8>>) -> String {
    String::from_utf8(client.output().clone()).unwrap()
}

fn loopback_config(name: &str, port: u16) -> ShareConfig {
    let mut config = ShareConfig::new(name);
    config.bind = IpAddr::V4(Ipv4Addr::LOCALHOST);
    config.port = Some(port);
    config.host = "test-host".to_string();
    config
}

mod client_sessions {
    use super::*;

    #[tokio::test]
    async fn test_successful_session_prints_catalog() {
        let mut event_loop = EventLoop::new();
        let connector = ScriptedConnector::default();
        connector.push_ready(Ok(vec![RecordEntry::new(1, "/music/song.mp3")]));
        let (mut client, announcer) = new_client(&event_loop, connector.clone());

        announcer.announce("Bob's Music", "192.0.2.5", 3689);
        event_loop.dispatch_next(&mut client).await.unwrap();
        assert_eq!(
            client.session().map(|s| s.state()),
            Some(SessionState::Connecting)
        );
        assert_eq!(
            connector.calls(),
            vec![ServiceDescriptor::new("Bob's Music", "192.0.2.5", 3689)]
        );

        event_loop.dispatch_next(&mut client).await.unwrap();
        assert_eq!(stdout_of(&client), "/music/song.mp3\n");
        assert_eq!(
            client.session().map(|s| s.state()),
            Some(SessionState::Connected)
        );
    }

    #[tokio::test]
    async fn test_new_service_supersedes_connecting_session() {
        let mut event_loop = EventLoop::new();
        let connector = ScriptedConnector::default();
        let mut first_gate = connector.push_gated();
        let second_gate = connector.push_gated();
        let (mut client, announcer) = new_client(&event_loop, connector.clone());

        announcer.announce("First", "192.0.2.10", 3689);
        event_loop.dispatch_next(&mut client).await.unwrap();
        announcer.announce("Second", "192.0.2.11", 3689);
        event_loop.dispatch_next(&mut client).await.unwrap();

        // The first attempt is abandoned, not left running.
        tokio::time::timeout(Duration::from_secs(5), first_gate.closed())
            .await
            .expect("first attempt was not dropped");
        assert_eq!(client.session().map(|s| s.id()), Some(SessionId(2)));

        // A completion for the superseded session must not enumerate.
        event_loop.handle().post(LoopEvent::SessionComplete {
            session: SessionId(1),
            outcome: Ok(vec![RecordEntry::new(1, "/stale.mp3")]),
        });
        event_loop.dispatch_next(&mut client).await.unwrap();
        assert_eq!(stdout_of(&client), "");

        second_gate
            .send(Ok(vec![RecordEntry::new(4, "/fresh.mp3")]))
            .unwrap();
        event_loop.dispatch_next(&mut client).await.unwrap();
        assert_eq!(stdout_of(&client), "/fresh.mp3\n");
        assert_eq!(client.sessions_opened(), 2);
    }

    #[tokio::test]
    async fn test_failed_session_prints_nothing_and_loop_continues() {
        let mut event_loop = EventLoop::new();
        let connector = ScriptedConnector::default();
        connector.push_ready(Err(SessionError::new("timeout")));
        connector.push_ready(Ok(vec![RecordEntry::new(1, "/music/song.mp3")]));
        let (mut client, announcer) = new_client(&event_loop, connector.clone());

        announcer.announce("Flaky", "192.0.2.5", 3689);
        event_loop.dispatch_next(&mut client).await.unwrap();
        event_loop.dispatch_next(&mut client).await.unwrap();
        assert_eq!(stdout_of(&client), "");
        assert_eq!(
            client.session().map(|s| s.state()),
            Some(SessionState::Failed)
        );

        // Rediscovery is the only retry path.
        announcer.announce("Flaky", "192.0.2.5", 3689);
        event_loop.dispatch_next(&mut client).await.unwrap();
        event_loop.dispatch_next(&mut client).await.unwrap();
        assert_eq!(stdout_of(&client), "/music/song.mp3\n");
    }

    #[tokio::test]
    async fn test_one_session_per_discovery() {
        let mut event_loop = EventLoop::new();
        let connector = ScriptedConnector::default();
        let (mut client, announcer) = new_client(&event_loop, connector.clone());

        for i in 0..5u16 {
            announcer.announce(&format!("Share {}", i), "192.0.2.5", 3689 + i);
        }
        for _ in 0..5 {
            event_loop.dispatch_next(&mut client).await.unwrap();
        }

        assert_eq!(connector.calls().len(), 5);
        assert_eq!(client.sessions_opened(), 5);
        assert_eq!(client.session().map(|s| s.id()), Some(SessionId(5)));
        assert_eq!(client.session().unwrap().service().name, "Share 4");
    }

    #[tokio::test]
    async fn test_enumeration_emits_count_lines_in_key_order() {
        let mut event_loop = EventLoop::new();
        let connector = ScriptedConnector::default();
        connector.push_ready(Ok(vec![
            RecordEntry::new(3, "/c.mp3"),
            RecordEntry::new(1, "/a.mp3"),
            RecordEntry::new(2, "/b.mp3"),
        ]));
        let (mut client, announcer) = new_client(&event_loop, connector);

        announcer.announce("Library", "192.0.2.5", 3689);
        event_loop.dispatch_next(&mut client).await.unwrap();
        event_loop.dispatch_next(&mut client).await.unwrap();

        let output = stdout_of(&client);
        assert_eq!(output.lines().count(), client.records().count());
        assert_eq!(output, "/a.mp3\n/b.mp3\n/c.mp3\n");
    }

    #[tokio::test]
    async fn test_shares_with_overlapping_keys_accumulate() {
        let mut event_loop = EventLoop::new();
        let connector = ScriptedConnector::default();
        connector.push_ready(Ok(vec![RecordEntry::new(1, "/a.mp3")]));
        connector.push_ready(Ok(vec![RecordEntry::new(1, "/b.mp3")]));
        let (mut client, announcer) = new_client(&event_loop, connector);

        announcer.announce("Alice's Music", "192.0.2.5", 3689);
        event_loop.dispatch_next(&mut client).await.unwrap();
        event_loop.dispatch_next(&mut client).await.unwrap();
        assert_eq!(stdout_of(&client), "/a.mp3\n");

        announcer.announce("Bob's Music", "192.0.2.6", 3689);
        event_loop.dispatch_next(&mut client).await.unwrap();
        event_loop.dispatch_next(&mut client).await.unwrap();

        // Each pass prints everything collected so far.
        assert_eq!(stdout_of(&client), "/a.mp3\n/a.mp3\n/b.mp3\n");
        assert_eq!(client.records().count(), 2);
    }

    #[test]
    fn test_discovery_failure_aborts_construction() {
        let event_loop = EventLoop::new();
        let result = Client::new(
            FakeBrowser::failing(),
            ServiceType::Dpap,
            ScriptedConnector::default(),
            factory_for(ShareKind::Image),
            Vec::new(),
            event_loop.handle(),
        );
        let err = result.err().expect("construction should fail");
        assert!(err.to_string().contains("multicast socket unavailable"));
    }
}

mod share_publishing {
    use super::*;

    #[tokio::test]
    async fn test_serve_failure_skips_publish() {
        let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = occupied.local_addr().unwrap().port();

        let event_loop = EventLoop::new();
        let mut publisher = RecordingPublisher::default();
        let result = create_share(
            ShareKind::Image,
            &loopback_config("Photos", port),
            &mut publisher,
            event_loop.handle(),
        )
        .await;

        match result {
            Err(ShareError::ServeFailed(message)) => {
                assert!(message.to_lowercase().contains("in use"), "{}", message);
            }
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("serve should have failed"),
        }
        assert!(publisher.adverts.is_empty());
    }

    #[tokio::test]
    async fn test_publish_failure_is_fatal() {
        let event_loop = EventLoop::new();
        let mut publisher = RecordingPublisher {
            refuse: Some("name conflict".to_string()),
            ..Default::default()
        };
        let result = create_share(
            ShareKind::Audio,
            &loopback_config("Music", 0),
            &mut publisher,
            event_loop.handle(),
        )
        .await;

        let err = result.err().expect("publish should have failed");
        assert!(matches!(err, ShareError::PublishFailed(_)));
        assert!(err.to_string().contains("name conflict"));
    }

    #[tokio::test]
    async fn test_published_advert_describes_share() {
        let event_loop = EventLoop::new();
        let mut publisher = RecordingPublisher::default();
        let share = create_share(
            ShareKind::Image,
            &loopback_config("Photos", 0),
            &mut publisher,
            event_loop.handle(),
        )
        .await
        .unwrap();

        assert!(share.is_published());
        assert!(share.has_error_subscriber());
        assert_eq!(share.catalog().records().count(), 1);
        assert_eq!(share.catalog().containers().count(), 1);

        let advert = &publisher.adverts[0];
        assert_eq!(advert.service_type, ServiceType::Dpap);
        assert_eq!(advert.name, "Photos");
        assert_eq!(advert.host, "test-host");
        assert_eq!(Some(advert.port), share.local_addr().map(|a| a.port()));
        assert!(advert
            .txt
            .contains(&("Password".to_string(), "false".to_string())));
    }
}

mod error_reporting {
    use super::*;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpStream;

    #[tokio::test]
    async fn test_error_event_stops_the_loop() {
        let event_loop = EventLoop::new();
        let mut publisher = RecordingPublisher::default();
        let share = create_share(
            ShareKind::Audio,
            &loopback_config("Music", 0),
            &mut publisher,
            event_loop.handle(),
        )
        .await
        .unwrap();
        let mut host = ShareHost::new(share);

        event_loop
            .handle()
            .post(LoopEvent::ShareError("connection reset".to_string()));
        let err = tokio::time::timeout(Duration::from_secs(5), event_loop.run(&mut host))
            .await
            .expect("loop should stop")
            .unwrap_err();
        assert!(err.to_string().contains("connection reset"));
    }

    #[tokio::test]
    async fn test_malformed_request_is_reported() {
        let mut event_loop = EventLoop::new();
        let mut publisher = RecordingPublisher::default();
        let share = create_share(
            ShareKind::Audio,
            &loopback_config("Music", 0),
            &mut publisher,
            event_loop.handle(),
        )
        .await
        .unwrap();
        let addr = share.local_addr().unwrap();
        let mut host = ShareHost::new(share);

        let mut stream = TcpStream::connect(addr).await.unwrap();
        let mut frame = Vec::new();
        frame.extend_from_slice(&4u32.to_le_bytes());
        frame.extend_from_slice(&42u32.to_le_bytes());
        stream.write_all(&frame).await.unwrap();

        let err = tokio::time::timeout(Duration::from_secs(5), event_loop.dispatch_next(&mut host))
            .await
            .expect("share should report the bad request")
            .unwrap_err();
        assert!(err.to_string().contains("Invalid message code: 42"));
    }
}

mod end_to_end {
    use super::*;

    #[tokio::test]
    async fn test_copy_client_lists_served_share() {
        let server_loop = EventLoop::new();
        let mut publisher = RecordingPublisher::default();
        let mut config = loopback_config("Photos", 0);
        config.item_location = Some("/photos/beach.jpg".to_string());
        let share = create_share(
            ShareKind::Image,
            &config,
            &mut publisher,
            server_loop.handle(),
        )
        .await
        .unwrap();
        let port = share.local_addr().unwrap().port();

        let mut client_loop = EventLoop::new();
        let browser = FakeBrowser::default();
        let announcer = browser.announcer();
        let mut client = Client::new(
            browser,
            ServiceType::Dpap,
            TcpConnector::new("integration", Duration::from_secs(5)),
            factory_for(ShareKind::Image),
            Vec::new(),
            client_loop.handle(),
        )
        .unwrap();

        announcer.announce("Photos", "127.0.0.1", port);
        client_loop.dispatch_next(&mut client).await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), client_loop.dispatch_next(&mut client))
            .await
            .expect("session should complete")
            .unwrap();

        assert_eq!(stdout_of(&client), "/photos/beach.jpg\n");
        assert_eq!(
            client.session().map(|s| s.state()),
            Some(SessionState::Connected)
        );
        drop(share);
    }

    #[test]
    fn test_connector_reports_refused_connection() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let connector = TcpConnector::new("integration", Duration::from_secs(5));
        let service = ServiceDescriptor::new("Gone", "127.0.0.1", port);

        let outcome = tokio_test::block_on(connector.connect(&service));
        assert!(outcome.is_err());
    }

    #[test]
    fn test_connector_times_out_on_silent_share() {
        // Accepted by the kernel backlog, never answered.
        let silent = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr: SocketAddr = silent.local_addr().unwrap();
        let connector = TcpConnector::new("integration", Duration::from_millis(200));
        let service = ServiceDescriptor::new("Silent", "127.0.0.1", addr.port());

        let outcome = tokio_test::block_on(connector.connect(&service));
        assert_eq!(outcome, Err(SessionError::new("timeout")));
    }
}
