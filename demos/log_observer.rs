//! A log-only subscriber: demonstrates draining a `Subscription` without
//! building any UI on top of it. Run with `cargo run --example log_observer
//! -- <path-to-an-audio-file>`.

use std::env;

use roqtune_core::{PlaybackConfig, PlaybackService, Track};

#[tokio::main]
async fn main() {
    roqtune_core::init_logging();

    let path = match env::args().nth(1) {
        Some(path) => path,
        None => {
            eprintln!("usage: log_observer <path-to-an-audio-file>");
            return;
        }
    };

    let service = PlaybackService::new(PlaybackConfig::default());
    let mut subscription = service.subscribe().await;

    let observer = tokio::spawn(async move {
        loop {
            tokio::select! {
                Some(event) = subscription.state_changed.recv() => {
                    log::info!("state: {:?} -> {:?}", event.previous, event.current);
                }
                Some(event) = subscription.track_changed.recv() => {
                    log::info!(
                        "track: {:?} -> {:?}",
                        event.previous.map(|t| t.title),
                        event.current.map(|t| t.title),
                    );
                }
                Some(event) = subscription.position_changed.recv() => {
                    log::info!("position: {:?}", event.position);
                }
                Some(event) = subscription.queue_changed.recv() => {
                    log::info!("queue: {} tracks, current index {}", event.tracks.len(), event.index);
                }
                Some(event) = subscription.mode_changed.recv() => {
                    log::info!("mode: repeat={:?} shuffle={}", event.repeat, event.shuffle);
                }
                Some(event) = subscription.error_event.recv() => {
                    log::error!("{}: {} ({})", event.operation, event.err, event.path);
                }
                _ = subscription.wait_done() => {
                    log::info!("subscription closed");
                    break;
                }
            }
        }
    });

    service
        .add_tracks(vec![Track::from_path(&path)])
        .await;
    if let Err(err) = service.play().await {
        log::error!("play failed: {err}");
    }

    tokio::time::sleep(std::time::Duration::from_secs(5)).await;
    service.close().await;
    let _ = observer.await;
}
