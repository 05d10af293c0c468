use crate::error::AppError;
use crate::replay::store::{available_expiries, available_symbols, available_trade_dates};
use crate::replay::types::{normalize_expiry, normalize_symbol};
use crate::state::AppState;
use serde::Deserialize;
use tauri::State;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListExpiriesArgs {
    pub symbol: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTradeDatesArgs {
    pub symbol: String,
    pub expiry: Option<String>,
}

#[tauri::command]
pub async fn list_symbols(state: State<'_, AppState>) -> Result<Vec<String>, AppError> {
    available_symbols(&state.db_pool).await
}

#[tauri::command]
pub async fn list_expiries(
    state: State<'_, AppState>,
    args: ListExpiriesArgs,
) -> Result<Vec<String>, AppError> {
    let symbol = normalize_symbol(&args.symbol)?;
    available_expiries(&state.db_pool, &symbol).await
}

#[tauri::command]
pub async fn list_trade_dates(
    state: State<'_, AppState>,
    args: ListTradeDatesArgs,
) -> Result<Vec<String>, AppError> {
    let symbol = normalize_symbol(&args.symbol)?;
    let expiry = args
        .expiry
        .as_deref()
        .map(normalize_expiry)
        .transpose()?;

    available_trade_dates(&state.db_pool, &symbol, expiry.as_deref()).await
}
