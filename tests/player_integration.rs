//! Integration tests for the Mosaic attachment and lifecycle system.

use mosaic::Error;
use mosaic::element::{ElementState, Pad, SlotPlacement};
use mosaic::elements::{AvDecH264, StreamSpec};
use mosaic::pipeline::{
    AttachMode, AttachmentHandler, Bus, BusMessage, ElementFactory, Graph, NodeId, PadRef, Player,
    PlayerConfig, Properties, discovery_channel,
};
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn demuxer(streams: u32) -> Properties {
    Properties::new()
        .with("streams", streams)
        .with("interval-ms", 2u32)
}

fn config(streams: u32) -> PlayerConfig {
    PlayerConfig::pattern(0)
        .with_sink("fakesink")
        .with_demuxer("matroskademux", demuxer(streams))
}

async fn wait_for_attachments(player: &Player, count: u64) {
    let mut attached = player.attachments();
    tokio::time::timeout(Duration::from_secs(5), attached.wait_for(|n| *n >= count))
        .await
        .expect("timed out waiting for attachments")
        .expect("attachment task stopped");
}

/// Slots are stacked vertically in discovery order.
#[tokio::test]
async fn test_slots_follow_discovery_order() {
    let mut player = Player::new(config(4)).unwrap();
    player.start().unwrap();
    wait_for_attachments(&player, 4).await;

    let slots = player.slots();
    assert_eq!(slots.len(), 4);
    for (index, slot) in slots.iter().enumerate() {
        assert_eq!(slot.pad, format!("sink_{index}"));
        assert_eq!(
            slot.placement,
            SlotPlacement {
                xpos: 0,
                ypos: 200 * index as i32,
                zorder: index as u32,
            }
        );
    }

    let streams = player.streams();
    let indices: Vec<_> = streams.iter().map(|s| s.index).collect();
    assert_eq!(indices, vec![0, 1, 2, 3]);
    assert!(streams.iter().all(|s| s.outcome.is_linked()));

    assert_eq!(player.stop_and_teardown().attached, 4);
}

/// Attachments racing from several threads are serialized.
#[test]
fn test_concurrent_attachments_are_serialized() {
    const STREAMS: usize = 8;

    let factory = ElementFactory::new();
    let bus = Bus::new();
    let (discovery, _queue) = discovery_channel();
    let mut graph = Graph::new("race", bus.sender(), discovery);
    let demux = factory
        .create_with("matroskademux", "demuxer", &Properties::new().with("streams", STREAMS as u32))
        .unwrap();
    let demuxer = graph.add("demuxer", "matroskademux", demux).unwrap();
    let compositor = graph
        .add("compositor", "videomixer", factory.create("videomixer", "compositor").unwrap())
        .unwrap();
    graph.set_state(ElementState::Playing).unwrap();

    let graph = Arc::new(Mutex::new(graph));
    let handler = Arc::new(AttachmentHandler::new(
        graph.clone(),
        factory,
        PlayerConfig::pattern(0),
        Some(compositor),
    ));

    let workers: Vec<_> = (0..STREAMS)
        .map(|index| {
            let handler = handler.clone();
            std::thread::spawn(move || {
                handler
                    .attach(
                        demuxer,
                        Pad::sometimes(format!("video_{index}")),
                        StreamSpec::default().caps(),
                    )
                    .unwrap()
                    .unwrap()
            })
        })
        .collect();
    let records: Vec<_> = workers.into_iter().map(|w| w.join().unwrap()).collect();

    let graph = graph.lock().unwrap();
    assert_eq!(graph.attachment_count(), STREAMS as u64);

    let mut zorders: Vec<_> = (0..STREAMS)
        .map(|i| graph.placement(compositor, &format!("sink_{i}")).unwrap().zorder)
        .collect();
    zorders.sort_unstable();
    assert_eq!(zorders, (0..STREAMS as u32).collect::<Vec<_>>());

    let mut indices: Vec<_> = records.iter().map(|r| r.index).collect();
    indices.sort_unstable();
    assert_eq!(indices, (0..STREAMS as u64).collect::<Vec<_>>());
    for record in &records {
        let slot = record.slot.as_ref().unwrap();
        assert_eq!(slot.placement.zorder as u64, record.index);
        assert_eq!(slot.placement.ypos as u64, record.index * 200);
    }
}

/// With a limit of three, the fourth stream leaves no trace.
#[tokio::test]
async fn test_stream_limit_drops_fourth_stream() {
    let config = PlayerConfig::pattern(0)
        .with_sink("fakesink")
        .with_max_streams(3)
        .with_demuxer("matroskademux", demuxer(4).with("eos-after-ms", 100u32));
    let mut player = Player::new(config).unwrap();
    player.start().unwrap();
    wait_for_attachments(&player, 3).await;
    player.run().await.unwrap();

    assert_eq!(player.attached_count(), 3);
    assert_eq!(player.streams().len(), 3);
    assert_eq!(player.slots().len(), 3);
    player.with_graph(|graph| {
        assert!(graph.node_id("queue03").is_none());
        assert_eq!(graph.node_count(), 4 + 3 * 3);
    });
    player.stop_and_teardown();
}

/// The capped separate-sinks variant gives each stream its own sink.
#[tokio::test]
async fn test_separate_sinks_capped() {
    let config = PlayerConfig::pattern(0)
        .with_sink("fakesink")
        .with_mode(AttachMode::SeparateSinks)
        .with_max_streams(3)
        .with_demuxer("matroskademux", demuxer(5).with("eos-after-ms", 100u32));
    let mut player = Player::new(config).unwrap();
    player.start().unwrap();
    wait_for_attachments(&player, 3).await;
    player.run().await.unwrap();

    assert_eq!(player.attached_count(), 3);
    player.with_graph(|graph| {
        for index in 0..3 {
            let sink = graph.node_id(&format!("video-sink{index:02}")).unwrap();
            assert_eq!(graph.node(sink).unwrap().state(), ElementState::Playing);
            assert!(graph.is_linked(&PadRef::new(sink, "sink")));
        }
        assert!(graph.node_id("video-sink03").is_none());
        assert!(graph.node_id("compositor").is_none());
    });
    player.stop_and_teardown();
}

/// A construction failure does not consume a slot or a count.
#[tokio::test]
async fn test_construction_failure_then_success() {
    let failures = Arc::new(AtomicUsize::new(1));
    let mut factory = ElementFactory::new();
    let remaining = failures.clone();
    factory.register("avdec_h264", move |_| {
        if remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(Error::Config("decoder unavailable".to_string()));
        }
        Ok(Box::new(AvDecH264::new()))
    });

    let mut player = Player::with_factory(config(2), factory).unwrap();
    player.start().unwrap();
    wait_for_attachments(&player, 1).await;

    assert_eq!(failures.load(Ordering::SeqCst), 0);
    assert_eq!(player.attached_count(), 1);

    let streams = player.streams();
    assert_eq!(streams.len(), 1);
    assert_eq!(streams[0].index, 0);
    assert_eq!(streams[0].demux_pad.pad, "video_1");
    assert_eq!(
        streams[0].slot.as_ref().unwrap().placement,
        SlotPlacement {
            xpos: 0,
            ypos: 0,
            zorder: 0
        }
    );
    player.with_graph(|graph| {
        assert!(graph.node_id("h264-decoder00").is_some());
        assert!(graph.node_id("h264-decoder01").is_none());
    });
    player.stop_and_teardown();
}

/// `run()` keeps going through informational messages.
#[tokio::test]
async fn test_run_returns_only_on_terminal_message() {
    let mut player = Player::new(config(0)).unwrap();
    player.start().unwrap();

    let bus = player.bus();
    bus.post(BusMessage::Latency {
        element: "video-output".into(),
    });
    bus.post(BusMessage::DurationChanged {
        element: "demuxer".into(),
    });

    let sender = bus.clone();
    let eos = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        sender.post_eos(None)
    });

    let started = std::time::Instant::now();
    player.run().await.unwrap();
    assert!(started.elapsed() >= Duration::from_millis(100));
    assert!(eos.await.unwrap());
    player.stop_and_teardown();
}

/// Two streams from a file end up in two slots, then end-of-stream.
#[tokio::test]
async fn test_two_stream_file_end_to_end() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"\x1a\x45\xdf\xa3matroska").unwrap();

    let config = PlayerConfig::file(file.path())
        .with_sink("fakesink")
        .with_demuxer("matroskademux", demuxer(2).with("eos-after-ms", 50u32));
    let mut player = Player::new(config).unwrap();
    player.start().unwrap();
    wait_for_attachments(&player, 2).await;
    player.run().await.unwrap();

    let skeleton = player.skeleton().unwrap();
    let compositor = skeleton.compositor.unwrap();
    player.with_graph(|graph| {
        for index in 0..2 {
            let decoder = graph.node_id(&format!("h264-decoder{index:02}")).unwrap();
            assert_eq!(graph.node(decoder).unwrap().state(), ElementState::Playing);

            let link = graph.link_from(&PadRef::new(decoder, "src")).unwrap();
            assert!(link.filtered);
            assert_eq!(link.sink, PadRef::new(compositor, format!("sink_{index}")));
            assert_eq!(
                graph.placement(compositor, &link.sink.pad),
                Some(SlotPlacement {
                    xpos: 0,
                    ypos: 200 * index,
                    zorder: index as u32,
                })
            );
        }
    });

    let report = player.stop_and_teardown();
    assert_eq!(report.attached, 2);
    assert_eq!(report.released, 4 + 2 * 3);
}

/// An error mid-run ends `run()`; teardown then releases everything.
#[tokio::test]
async fn test_error_mid_run_then_teardown() {
    let dir = tempfile::tempdir().unwrap();
    let mut player = Player::new(config(2).with_dot_dir(dir.path())).unwrap();
    player.start().unwrap();
    wait_for_attachments(&player, 2).await;

    player.bus().post_error(
        Some("h264-decoder01".into()),
        Some("decode failed".into()),
        Some("frame 12".into()),
    );
    let err = player.run().await.unwrap_err();
    match err {
        Error::Stream { element, message, debug } => {
            assert_eq!(element.as_deref(), Some("h264-decoder01"));
            assert_eq!(message, "decode failed");
            assert_eq!(debug.as_deref(), Some("frame 12"));
        }
        other => panic!("unexpected error: {other}"),
    }

    let report = player.stop_and_teardown();
    assert_eq!(report.released, 10);
    assert_eq!(player.with_graph(Graph::node_count), 0);
    assert!(!player.bus().post_eos(None));

    assert!(dir.path().join("mosaic0.dot").exists());
    assert!(dir.path().join("mosaic1.dot").exists());
    let last = std::fs::read_to_string(dir.path().join("mosaic-final.dot")).unwrap();
    assert!(last.contains("h264-decoder01"));
}

/// A slow attachment does not hold up the bus: an error ends `run()` at once.
#[tokio::test]
async fn test_error_during_slow_attachment() {
    let mut factory = ElementFactory::new();
    factory.register("avdec_h264", |_| {
        std::thread::sleep(Duration::from_millis(400));
        Ok(Box::new(AvDecH264::new()))
    });

    let mut player = Player::with_factory(config(1), factory).unwrap();
    player.start().unwrap();

    let bus = player.bus();
    let poster = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(20));
        bus.post_error(Some("source".into()), Some("read failed".into()), None)
    });

    let started = std::time::Instant::now();
    let err = player.run().await.unwrap_err();
    assert!(started.elapsed() < Duration::from_millis(300));
    assert!(matches!(err, Error::Stream { .. }));
    assert!(poster.join().unwrap());

    player.stop_and_teardown();
}

/// Late nodes are raised to the running graph's state; stale ids stay dead.
#[tokio::test]
async fn test_attached_nodes_follow_graph_state() {
    let mut player = Player::new(config(1)).unwrap();
    player.start().unwrap();
    wait_for_attachments(&player, 1).await;

    let nodes: Vec<NodeId> = player.streams()[0].nodes.clone();
    player.with_graph(|graph| {
        assert_eq!(graph.target_state(), ElementState::Playing);
        for id in &nodes {
            assert_eq!(graph.node(*id).unwrap().state(), ElementState::Playing);
        }
    });

    player.stop_and_teardown();
    player.with_graph(|graph| {
        assert!(nodes.iter().all(|id| !graph.contains(*id)));
    });
}
