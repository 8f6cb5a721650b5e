use std::{
    sync::mpsc,
    time::{Duration, Instant},
};

use log::LevelFilter;
use rand::rngs::StdRng;

use tile_cascade::{
    board_server::BoardServer,
    board_store::BoardStore,
    cascade::{engine::CascadeEngine, generation::GenerationConfiguration},
    config::Configuration,
    event_bus::EventBus,
    events::EventPublisher,
    monitoring::{AlertKind, Monitor, MonitorConfiguration, Severity, Signal},
    sync::{
        coordinator::{ResyncConfiguration, SyncState},
        observer::BoardObserver,
    },
    types::data_types::{BoardId, CellPosition, ConnectionId, SequenceNumber},
};

mod common;

use common::{
    logging::setup_logger,
    network::{mock_network, NetworkStub},
    rooms::MemRooms,
};

const AUTHORITY: ConnectionId = ConnectionId::new(0);
const VIEWER: ConnectionId = ConnectionId::new(1);
const BOARD: BoardId = BoardId::new(7);

/// Scenario: four checksum mismatches reported by one observer within the retention window raise
/// exactly one critical alert, and every mismatch is also delivered to user event handlers.
#[test]
fn repeated_mismatches_raise_one_critical_alert() {
    setup_logger(LevelFilter::Debug);

    let config = Configuration::builder().log_events(true).build();
    let (mismatch_sender, mismatches) = mpsc::channel();
    let event_bus = EventBus::start(config.event_handlers().on_checksum_mismatch(move |event| {
        let _ = mismatch_sender.send(event.sequence_number);
    }));
    let monitor = Monitor::new(MonitorConfiguration::default());
    let event_publisher = EventPublisher::new(Some(event_bus.publisher()), Some(monitor.handle()));

    let (mut stubs, control) = mock_network([AUTHORITY, VIEWER].into_iter());
    let viewer_network = stubs.pop().unwrap();
    let authority_network = stubs.pop().unwrap();

    let mut server = BoardServer::new(
        authority_network,
        MemRooms::with([(VIEWER, BOARD)]),
        event_publisher.clone(),
    );
    let mut engine = CascadeEngine::seeded(99);
    let board = engine.fill_board(6, 4).unwrap();
    server.add_board(BoardStore::new(BOARD, board, engine, event_publisher.clone()));

    let (_, resync): (GenerationConfiguration, ResyncConfiguration) = config.into();
    let mut observer = BoardObserver::join(
        VIEWER,
        AUTHORITY,
        viewer_network,
        resync,
        event_publisher,
        Instant::now(),
    );

    let settle = |server: &mut BoardServer<NetworkStub, StdRng, MemRooms>,
                  observer: &mut BoardObserver<NetworkStub>| {
        for _ in 0..4 {
            server.poll();
            observer.poll(Instant::now()).unwrap();
        }
    };
    settle(&mut server, &mut observer);

    for round in 0..4u32 {
        control.corrupt_next_diff(VIEWER);
        observer
            .request_clear(vec![CellPosition::new(round % 6, 3)])
            .unwrap();
        settle(&mut server, &mut observer);
        assert_eq!(observer.sync_state(), SyncState::Synced);
    }

    let received: Vec<SequenceNumber> = (0..4)
        .map(|_| mismatches.recv_timeout(Duration::from_secs(5)).unwrap())
        .collect();
    assert_eq!(
        received,
        (1..=4).map(SequenceNumber::new).collect::<Vec<_>>()
    );

    let report = monitor.export();
    assert_eq!(report.counters.checksum_mismatches, 4);
    let critical: Vec<AlertKind> = report
        .alerts
        .iter()
        .filter(|alert| alert.severity == Severity::Critical)
        .map(|alert| alert.kind)
        .collect();
    assert_eq!(critical, vec![AlertKind::MultipleMismatches]);
    assert_eq!(report.recent_events.len(), 4);
}

#[test]
fn report_carries_window_aggregates() {
    setup_logger(LevelFilter::Debug);

    let monitor = Monitor::new(
        MonitorConfiguration::builder()
            .window_capacity(10)
            .build(),
    );
    let handle = monitor.handle();
    for sample in 1..=15 {
        handle.record_sample(Signal::RenderTime, sample as f64);
    }

    let report = monitor.export();
    let render = report.windows[&Signal::RenderTime];
    assert_eq!(render.count, 10);
    assert_eq!(render.mean, 10.5);
    assert_eq!(render.max, 15.0);
    assert!(!report.windows.contains_key(&Signal::NetworkLatency));
    assert_eq!(monitor.export().windows, report.windows);
}
