use anyhow::Result;
use crossbeam_channel::{bounded, Sender};
use handpose_engine::{
    Config, Engine, HandObservation, Handedness, Landmark, LandmarkFrame, RawConfig, RecordingSink, ScreenSize,
};

/// Demo wiring: a synthetic landmark source feeding the engine on a
/// bounded channel, with a `RecordingSink` standing in for the (external,
/// out-of-scope) OS input injector. A real deployment replaces the
/// producer side with a camera + detector and the sink with a platform
/// input backend.
fn spawn_synthetic_source(tx: Sender<LandmarkFrame>) {
    std::thread::spawn(move || {
        for i in 0..30u64 {
            let t_ms = i * 33;
            let y = 0.7 - (i as f64 / 30.0) * 0.4;
            let hand = HandObservation {
                handedness: Handedness::Right,
                landmarks: [Landmark::new(0.5, y, 0.0); handpose_engine::types::LANDMARK_COUNT],
            };
            let frame = LandmarkFrame::new(t_ms, vec![hand]);
            if tx.send(frame).is_err() {
                break;
            }
        }
    });
}

fn default_config(screen: ScreenSize) -> Result<Config> {
    let raw = RawConfig::default();
    raw.into_config(screen).map_err(Into::into)
}

fn main() -> Result<()> {
    env_logger::init();

    let screen = ScreenSize { width: 1920, height: 1080 };
    let config = default_config(screen)?;
    let mut engine = Engine::new(config, screen);
    let mut sink = RecordingSink::new();

    let (frame_tx, frame_rx) = bounded(4);
    spawn_synthetic_source(frame_tx);

    let mut last_t_ms = 0;
    for frame in frame_rx.iter() {
        last_t_ms = frame.t_ms;
        engine.tick(&frame, &mut sink);
    }

    engine.release_all(&mut sink, last_t_ms);
    log::info!("demo run complete: {} emissions", sink.log.len());

    Ok(())
}
