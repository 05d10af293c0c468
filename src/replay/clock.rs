use crate::replay::engine::PlaybackEngine;
use crate::replay::store::TimeSeriesStore;
use crate::replay::types::{
    PlaybackClockStatus, PlaybackFrame, StepDirection, StepOutcome, MIN_SPEED,
};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

const MIN_CLOCK_TICK_MS: u64 = 10;

pub struct PlaybackClockHandle {
    pub cancellation_token: CancellationToken,
    pub join_handle: tauri::async_runtime::JoinHandle<()>,
}

pub fn now_unix_ms() -> i64 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(duration) => duration.as_millis().min(i64::MAX as u128) as i64,
        Err(_) => 0,
    }
}

fn tick_delay(interval_ms: u64, speed: f64) -> Duration {
    let scaled = (interval_ms as f64 / speed.max(MIN_SPEED)).round() as u64;
    Duration::from_millis(scaled.max(MIN_CLOCK_TICK_MS))
}

fn pause_with_reason(status: &Arc<RwLock<PlaybackClockStatus>>, reason: &str) {
    let mut writable = status.write();
    writable.is_playing = false;
    writable.reason = Some(reason.to_string());
}

/// Ticks the playback session forward while the run state says playing.
/// Speed is re-read every iteration, so a changed multiplier applies on the
/// next tick without rescheduling the in-flight one. Any tick that cannot
/// advance (end of series, superseded session, store failure) pauses the
/// clock; it never keeps ticking against a dead end.
pub async fn run_playback_clock<S: TimeSeriesStore>(
    engine: Arc<Mutex<PlaybackEngine<S>>>,
    status: Arc<RwLock<PlaybackClockStatus>>,
    frames: mpsc::Sender<PlaybackFrame>,
    cancel_token: CancellationToken,
) {
    loop {
        let (delay, window_size, symbol, expiry) = {
            let readable = status.read();
            if !readable.is_playing {
                break;
            }
            (
                tick_delay(readable.interval_ms, readable.speed),
                readable.window_size,
                readable.symbol.clone(),
                readable.expiry.clone(),
            )
        };

        tokio::select! {
            _ = cancel_token.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }

        let step_result = {
            let mut session = engine.lock().await;
            if !session.is_positioned_at(&symbol, &expiry) {
                pause_with_reason(&status, "playback session superseded");
                break;
            }
            session
                .step(StepDirection::Next, window_size, now_unix_ms())
                .await
        };

        match step_result {
            Ok(StepOutcome::Advanced { time, rows }) => {
                status.write().last_time = Some(time);
                let frame = PlaybackFrame {
                    symbol,
                    expiry,
                    time,
                    rows,
                };
                if frames.send(frame).await.is_err() {
                    pause_with_reason(&status, "frame consumer dropped");
                    break;
                }
            }
            Ok(outcome) => {
                let reason = outcome
                    .failure_kind()
                    .map(|kind| kind.as_str().to_string())
                    .unwrap_or_else(|| "step did not advance".to_string());
                pause_with_reason(&status, &reason);
                break;
            }
            Err(error) => {
                pause_with_reason(&status, &format!("step failed: {error}"));
                break;
            }
        }
    }

    status.write().is_playing = false;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replay::store::MemoryTimeSeriesStore;
    use crate::replay::types::{Observation, OptionSide};

    const SYMBOL: &str = "NIFTY";
    const EXPIRY: &str = "2025-05-29";

    fn sample_store() -> MemoryTimeSeriesStore {
        let mut observations = Vec::new();
        for time in [1_000, 2_000, 3_000] {
            observations.push(Observation {
                symbol: SYMBOL.to_string(),
                expiry_date: EXPIRY.to_string(),
                time,
                strike_price: 18_100.0,
                option_type: OptionSide::Ce,
                last_price: 5.0,
                open_interest: 1_000,
                oi_change: 25,
                underlying_value: 18_102.0,
            });
        }
        MemoryTimeSeriesStore::new(observations)
    }

    async fn seeded_engine() -> Arc<Mutex<PlaybackEngine<MemoryTimeSeriesStore>>> {
        let mut engine = PlaybackEngine::new(sample_store());
        engine
            .seed(SYMBOL, EXPIRY, 0, None)
            .await
            .expect("memory store should not fail");
        Arc::new(Mutex::new(engine))
    }

    fn playing_status(symbol: &str, interval_ms: u64, speed: f64) -> PlaybackClockStatus {
        PlaybackClockStatus {
            is_playing: true,
            symbol: symbol.to_string(),
            expiry: EXPIRY.to_string(),
            speed,
            interval_ms,
            window_size: None,
            last_time: Some(1_000),
            reason: None,
        }
    }

    #[test]
    fn tick_delay_scales_with_speed() {
        assert_eq!(tick_delay(1_000, 1.0), Duration::from_millis(1_000));
        assert_eq!(tick_delay(1_000, 4.0), Duration::from_millis(250));
        assert_eq!(tick_delay(100, 64.0), Duration::from_millis(MIN_CLOCK_TICK_MS));
    }

    #[tokio::test]
    async fn clock_advances_until_series_end_then_auto_pauses() {
        let engine = seeded_engine().await;
        let status = Arc::new(RwLock::new(playing_status(SYMBOL, 100, 4.0)));
        let (frames, mut received) = mpsc::channel(8);
        let cancel_token = CancellationToken::new();

        let clock = tokio::spawn(run_playback_clock(
            Arc::clone(&engine),
            Arc::clone(&status),
            frames,
            cancel_token,
        ));

        let mut times = Vec::new();
        while let Some(frame) = received.recv().await {
            assert_eq!(frame.symbol, SYMBOL);
            times.push(frame.time);
        }
        clock.await.expect("clock task should not panic");

        assert_eq!(times, vec![2_000, 3_000]);
        let readable = status.read();
        assert!(!readable.is_playing);
        assert_eq!(readable.reason.as_deref(), Some("NO_MORE_DATA"));
        assert_eq!(readable.last_time, Some(3_000));
    }

    #[tokio::test]
    async fn cancellation_stops_clock_without_further_frames() {
        let engine = seeded_engine().await;
        let status = Arc::new(RwLock::new(playing_status(SYMBOL, 60_000, 1.0)));
        let (frames, mut received) = mpsc::channel(8);
        let cancel_token = CancellationToken::new();

        let clock = tokio::spawn(run_playback_clock(
            Arc::clone(&engine),
            Arc::clone(&status),
            frames,
            cancel_token.clone(),
        ));

        cancel_token.cancel();
        clock.await.expect("clock task should not panic");

        assert!(received.recv().await.is_none());
        assert!(!status.read().is_playing);
    }

    #[tokio::test]
    async fn superseded_session_pauses_clock() {
        let engine = seeded_engine().await;
        let status = Arc::new(RwLock::new(playing_status("BANKNIFTY", 100, 8.0)));
        let (frames, mut received) = mpsc::channel(8);
        let cancel_token = CancellationToken::new();

        let clock = tokio::spawn(run_playback_clock(
            Arc::clone(&engine),
            Arc::clone(&status),
            frames,
            cancel_token,
        ));
        clock.await.expect("clock task should not panic");

        assert!(received.recv().await.is_none());
        let readable = status.read();
        assert!(!readable.is_playing);
        assert_eq!(
            readable.reason.as_deref(),
            Some("playback session superseded")
        );
    }
}
