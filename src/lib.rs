mod commands;
mod db;
mod error;
mod replay;
mod state;

use commands::{
    app_info::app_info,
    catalog::{list_expiries, list_symbols, list_trade_dates},
    health::health,
    playback::{
        playback_snapshot, playback_status, playback_step, set_playback_speed, start_playback,
        stop_playback,
    },
};
use db::initialize_pool;
use state::AppState;
use tauri::Manager;

pub fn run() {
    tauri::Builder::default()
        .setup(|app| {
            let app_handle = app.handle().clone();
            let db_pool =
                tauri::async_runtime::block_on(async move { initialize_pool(&app_handle).await })?;
            app.manage(AppState::new(db_pool));
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            health,
            app_info,
            list_symbols,
            list_expiries,
            list_trade_dates,
            playback_step,
            playback_snapshot,
            start_playback,
            stop_playback,
            set_playback_speed,
            playback_status
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
