use crate::error::AppError;
use crate::replay::clock::{now_unix_ms, run_playback_clock, PlaybackClockHandle};
use crate::replay::types::{
    validate_speed, PlaybackClockStatus, PlaybackFrame, PlaybackSession, PlaybackStepArgs,
    PlaybackStepResponse, PlaybackStopResult, SnapshotArgs, StartPlaybackArgs, StepOutcome,
};
use crate::replay::{PLAYBACK_FRAME_EVENT, PLAYBACK_STATUS_EVENT};
use crate::state::AppState;
use serde::Deserialize;
use std::sync::Arc;
use tauri::{AppHandle, Emitter, Manager, State};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const FRAME_CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetPlaybackSpeedArgs {
    pub speed: f64,
}

#[tauri::command]
pub async fn playback_step(
    state: State<'_, AppState>,
    args: PlaybackStepArgs,
) -> Result<PlaybackStepResponse, AppError> {
    let request = args.normalize()?;

    let mut engine = state.playback_engine.lock().await;
    engine.align(&request.symbol, &request.expiry, request.current_time);
    let outcome = engine
        .step(request.direction, request.window_size, now_unix_ms())
        .await?;

    Ok(PlaybackStepResponse::from_outcome(outcome))
}

#[tauri::command]
pub async fn playback_snapshot(
    state: State<'_, AppState>,
    args: SnapshotArgs,
) -> Result<PlaybackStepResponse, AppError> {
    let request = args.normalize()?;

    let mut engine = state.playback_engine.lock().await;
    let outcome = engine
        .seed(
            &request.symbol,
            &request.expiry,
            request.time,
            request.window_size,
        )
        .await?;

    Ok(PlaybackStepResponse::from_outcome(outcome))
}

#[tauri::command]
pub async fn start_playback(
    app: AppHandle,
    state: State<'_, AppState>,
    args: StartPlaybackArgs,
) -> Result<PlaybackSession, AppError> {
    let config = args.normalize()?;

    let window = app
        .get_webview_window("main")
        .ok_or_else(|| AppError::WindowNotFound("main".to_string()))?;

    let existing_handle = {
        let mut clock_slot = state.playback_clock.lock().await;
        clock_slot.take()
    };
    if let Some(handle) = existing_handle {
        handle.cancellation_token.cancel();
        let _ = handle.join_handle.await;
    }

    let reference = config.start_time.unwrap_or_else(now_unix_ms);
    let seeded = {
        let mut engine = state.playback_engine.lock().await;
        engine
            .seed(&config.symbol, &config.expiry, reference, config.window_size)
            .await?
    };

    let (time, rows) = match seeded {
        StepOutcome::Advanced { time, rows } => (time, rows),
        outcome => {
            let error = outcome.failure_kind();
            {
                let mut writable = state.clock_status.write();
                *writable = PlaybackClockStatus::stopped(
                    config.symbol.clone(),
                    config.expiry.clone(),
                    error.map(|kind| kind.as_str().to_string()),
                );
            }
            return Ok(PlaybackSession {
                running: false,
                symbol: config.symbol,
                expiry: config.expiry,
                interval_ms: config.interval_ms,
                speed: config.speed,
                window_size: config.window_size,
                start_time: None,
                error,
            });
        }
    };

    let seed_frame = PlaybackFrame {
        symbol: config.symbol.clone(),
        expiry: config.expiry.clone(),
        time,
        rows,
    };
    window.emit(PLAYBACK_FRAME_EVENT, &seed_frame)?;

    {
        let mut writable = state.clock_status.write();
        *writable = PlaybackClockStatus::playing(&config, time);
    }

    let cancellation_token = CancellationToken::new();
    let task_token = cancellation_token.clone();
    let task_engine = Arc::clone(&state.playback_engine);
    let task_status = Arc::clone(&state.clock_status);
    let (frames, mut received) = mpsc::channel::<PlaybackFrame>(FRAME_CHANNEL_CAPACITY);

    let join_handle = tauri::async_runtime::spawn(async move {
        let clock = run_playback_clock(task_engine, Arc::clone(&task_status), frames, task_token);
        let forward = async {
            while let Some(frame) = received.recv().await {
                if let Err(error) = window.emit(PLAYBACK_FRAME_EVENT, &frame) {
                    eprintln!("failed to emit playback_frame event: {error}");
                }
            }
        };
        tokio::join!(clock, forward);

        let snapshot = task_status.read().clone();
        if let Err(error) = window.emit(PLAYBACK_STATUS_EVENT, &snapshot) {
            eprintln!("failed to emit playback_status event: {error}");
        }
    });

    {
        let mut clock_slot = state.playback_clock.lock().await;
        *clock_slot = Some(PlaybackClockHandle {
            cancellation_token,
            join_handle,
        });
    }

    Ok(PlaybackSession {
        running: true,
        symbol: config.symbol,
        expiry: config.expiry,
        interval_ms: config.interval_ms,
        speed: config.speed,
        window_size: config.window_size,
        start_time: Some(time),
        error: None,
    })
}

#[tauri::command]
pub async fn stop_playback(state: State<'_, AppState>) -> Result<PlaybackStopResult, AppError> {
    let existing_handle = {
        let mut clock_slot = state.playback_clock.lock().await;
        clock_slot.take()
    };

    let stopped = if let Some(handle) = existing_handle {
        handle.cancellation_token.cancel();
        let _ = handle.join_handle.await;
        true
    } else {
        false
    };

    {
        let (current_symbol, current_expiry, current_last_time) = {
            let readable = state.clock_status.read();
            (
                readable.symbol.clone(),
                readable.expiry.clone(),
                readable.last_time,
            )
        };
        let mut writable = state.clock_status.write();
        *writable = PlaybackClockStatus {
            last_time: current_last_time,
            ..PlaybackClockStatus::stopped(
                current_symbol,
                current_expiry,
                Some("playback stopped by command".to_string()),
            )
        };
    }

    Ok(PlaybackStopResult { stopped })
}

#[tauri::command]
pub async fn set_playback_speed(
    state: State<'_, AppState>,
    args: SetPlaybackSpeedArgs,
) -> Result<PlaybackClockStatus, AppError> {
    let speed = validate_speed(args.speed)?;

    let mut writable = state.clock_status.write();
    writable.speed = speed;
    Ok(writable.clone())
}

#[tauri::command]
pub async fn playback_status(
    state: State<'_, AppState>,
) -> Result<PlaybackClockStatus, AppError> {
    let snapshot = state.clock_status.read().clone();
    Ok(snapshot)
}
