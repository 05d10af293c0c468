use crate::error::AppError;
use serde::{Deserialize, Serialize};

pub const DEFAULT_SYMBOL: &str = "NIFTY";
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1_000;
pub const DEFAULT_SPEED: f64 = 1.0;
pub const MIN_TICK_INTERVAL_MS: u64 = 100;
pub const MAX_TICK_INTERVAL_MS: u64 = 60_000;
pub const MIN_SPEED: f64 = 1.0;
pub const MAX_SPEED: f64 = 64.0;
pub const MAX_STRIKE_WINDOW: u32 = 50;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OptionSide {
    #[serde(rename = "CE")]
    Ce,
    #[serde(rename = "PE")]
    Pe,
}

impl OptionSide {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ce => "CE",
            Self::Pe => "PE",
        }
    }

    pub fn parse_str(value: &str) -> Result<Self, AppError> {
        match value {
            "CE" => Ok(Self::Ce),
            "PE" => Ok(Self::Pe),
            other => Err(AppError::InvalidArgument(format!(
                "unknown option side '{other}'"
            ))),
        }
    }
}

/// One observed option leg at one sampled instant. The store guarantees at
/// most one row per (symbol, expiry_date, time, strike_price, option_type).
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub symbol: String,
    pub expiry_date: String,
    pub time: i64,
    pub strike_price: f64,
    pub option_type: OptionSide,
    pub last_price: f64,
    pub open_interest: i64,
    pub oi_change: i64,
    pub underlying_value: f64,
}

/// One strike of an assembled chain. A side with no observed leg keeps its
/// fields at `None`, so absence stays distinguishable from a true zero.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChainRow {
    pub strike_price: f64,
    pub ce_ltp: Option<f64>,
    pub ce_oi: Option<i64>,
    pub ce_oi_change: Option<i64>,
    pub pe_ltp: Option<f64>,
    pub pe_oi: Option<i64>,
    pub pe_oi_change: Option<i64>,
    pub underlying_value: f64,
}

impl ChainRow {
    pub fn from_leg(observation: &Observation) -> Self {
        let mut row = Self {
            strike_price: observation.strike_price,
            ce_ltp: None,
            ce_oi: None,
            ce_oi_change: None,
            pe_ltp: None,
            pe_oi: None,
            pe_oi_change: None,
            underlying_value: observation.underlying_value,
        };
        row.apply_leg(observation);
        row
    }

    /// Folds one leg into the row. A repeated leg of the same side replaces
    /// the earlier one wholesale; values are never summed or averaged.
    pub fn apply_leg(&mut self, observation: &Observation) {
        match observation.option_type {
            OptionSide::Ce => {
                self.ce_ltp = Some(observation.last_price);
                self.ce_oi = Some(observation.open_interest);
                self.ce_oi_change = Some(observation.oi_change);
                // call leg wins when the two sides disagree on spot
                self.underlying_value = observation.underlying_value;
            }
            OptionSide::Pe => {
                self.pe_ltp = Some(observation.last_price);
                self.pe_oi = Some(observation.open_interest);
                self.pe_oi_change = Some(observation.oi_change);
                if self.ce_ltp.is_none() {
                    self.underlying_value = observation.underlying_value;
                }
            }
        }
    }

    pub fn has_call_leg(&self) -> bool {
        self.ce_ltp.is_some()
    }

    pub fn has_put_leg(&self) -> bool {
        self.pe_ltp.is_some()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepDirection {
    Next,
    Prev,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlaybackErrorKind {
    NoMoreData,
    NoData,
    NotPositioned,
}

impl PlaybackErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoMoreData => "NO_MORE_DATA",
            Self::NoData => "NO_DATA",
            Self::NotPositioned => "NOT_POSITIONED",
        }
    }
}

/// Result of one navigation operation. Traversal boundaries are ordinary
/// outcomes here, never `AppError`.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Advanced { time: i64, rows: Vec<ChainRow> },
    NoMoreData,
    NoData,
    NotPositioned,
}

impl StepOutcome {
    pub fn failure_kind(&self) -> Option<PlaybackErrorKind> {
        match self {
            Self::Advanced { .. } => None,
            Self::NoMoreData => Some(PlaybackErrorKind::NoMoreData),
            Self::NoData => Some(PlaybackErrorKind::NoData),
            Self::NotPositioned => Some(PlaybackErrorKind::NotPositioned),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackStepResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<Vec<ChainRow>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<PlaybackErrorKind>,
}

impl PlaybackStepResponse {
    pub fn from_outcome(outcome: StepOutcome) -> Self {
        let error = outcome.failure_kind();
        match outcome {
            StepOutcome::Advanced { time, rows } => Self {
                success: true,
                time: Some(time),
                rows: Some(rows),
                error: None,
            },
            _ => Self {
                success: false,
                time: None,
                rows: None,
                error,
            },
        }
    }
}

/// Current playback coordinate. `current_time = None` means the position has
/// not yet been resolved to an observed instant.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackPosition {
    pub symbol: String,
    pub expiry: String,
    pub current_time: Option<i64>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackFrame {
    pub symbol: String,
    pub expiry: String,
    pub time: i64,
    pub rows: Vec<ChainRow>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackStepArgs {
    pub symbol: String,
    pub expiry: String,
    pub current_time: Option<i64>,
    pub direction: StepDirection,
    pub window_size: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct StepRequest {
    pub symbol: String,
    pub expiry: String,
    pub current_time: Option<i64>,
    pub direction: StepDirection,
    pub window_size: Option<u32>,
}

impl PlaybackStepArgs {
    pub fn normalize(self) -> Result<StepRequest, AppError> {
        Ok(StepRequest {
            symbol: normalize_symbol(&self.symbol)?,
            expiry: normalize_expiry(&self.expiry)?,
            current_time: self.current_time,
            direction: self.direction,
            window_size: validate_window_size(self.window_size)?,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotArgs {
    pub symbol: String,
    pub expiry: String,
    pub time: i64,
    pub window_size: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct SnapshotRequest {
    pub symbol: String,
    pub expiry: String,
    pub time: i64,
    pub window_size: Option<u32>,
}

impl SnapshotArgs {
    pub fn normalize(self) -> Result<SnapshotRequest, AppError> {
        Ok(SnapshotRequest {
            symbol: normalize_symbol(&self.symbol)?,
            expiry: normalize_expiry(&self.expiry)?,
            time: self.time,
            window_size: validate_window_size(self.window_size)?,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartPlaybackArgs {
    pub symbol: String,
    pub expiry: String,
    pub start_time: Option<i64>,
    pub interval_ms: Option<u64>,
    pub speed: Option<f64>,
    pub window_size: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct PlaybackClockConfig {
    pub symbol: String,
    pub expiry: String,
    pub start_time: Option<i64>,
    pub interval_ms: u64,
    pub speed: f64,
    pub window_size: Option<u32>,
}

impl StartPlaybackArgs {
    pub fn normalize(self) -> Result<PlaybackClockConfig, AppError> {
        let symbol = normalize_symbol(&self.symbol)?;
        let expiry = normalize_expiry(&self.expiry)?;

        let interval_ms = self.interval_ms.unwrap_or(DEFAULT_TICK_INTERVAL_MS);
        if !(MIN_TICK_INTERVAL_MS..=MAX_TICK_INTERVAL_MS).contains(&interval_ms) {
            return Err(AppError::InvalidArgument(format!(
                "intervalMs must be between {MIN_TICK_INTERVAL_MS} and {MAX_TICK_INTERVAL_MS}"
            )));
        }

        let speed = validate_speed(self.speed.unwrap_or(DEFAULT_SPEED))?;
        let window_size = validate_window_size(self.window_size)?;

        Ok(PlaybackClockConfig {
            symbol,
            expiry,
            start_time: self.start_time,
            interval_ms,
            speed,
            window_size,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackSession {
    pub running: bool,
    pub symbol: String,
    pub expiry: String,
    pub interval_ms: u64,
    pub speed: f64,
    pub window_size: Option<u32>,
    pub start_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<PlaybackErrorKind>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackStopResult {
    pub stopped: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackClockStatus {
    pub is_playing: bool,
    pub symbol: String,
    pub expiry: String,
    pub speed: f64,
    pub interval_ms: u64,
    pub window_size: Option<u32>,
    pub last_time: Option<i64>,
    pub reason: Option<String>,
}

impl PlaybackClockStatus {
    pub fn stopped(symbol: String, expiry: String, reason: Option<String>) -> Self {
        Self {
            is_playing: false,
            symbol,
            expiry,
            speed: DEFAULT_SPEED,
            interval_ms: DEFAULT_TICK_INTERVAL_MS,
            window_size: None,
            last_time: None,
            reason,
        }
    }

    pub fn playing(config: &PlaybackClockConfig, last_time: i64) -> Self {
        Self {
            is_playing: true,
            symbol: config.symbol.clone(),
            expiry: config.expiry.clone(),
            speed: config.speed,
            interval_ms: config.interval_ms,
            window_size: config.window_size,
            last_time: Some(last_time),
            reason: None,
        }
    }
}

pub fn normalize_symbol(value: &str) -> Result<String, AppError> {
    let symbol = value.trim().to_ascii_uppercase();
    if symbol.is_empty()
        || !symbol
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '&' | '-' | '_'))
    {
        return Err(AppError::InvalidArgument(
            "symbol must be non-empty ASCII alphanumeric (plus '&', '-', '_')".to_string(),
        ));
    }
    Ok(symbol)
}

pub fn normalize_expiry(value: &str) -> Result<String, AppError> {
    let expiry = value.trim().to_string();
    let bytes = expiry.as_bytes();
    let well_formed = bytes.len() == 10
        && bytes.iter().enumerate().all(|(index, byte)| match index {
            4 | 7 => *byte == b'-',
            _ => byte.is_ascii_digit(),
        });
    if !well_formed {
        return Err(AppError::InvalidArgument(
            "expiry must be a YYYY-MM-DD date".to_string(),
        ));
    }
    Ok(expiry)
}

pub fn validate_window_size(window_size: Option<u32>) -> Result<Option<u32>, AppError> {
    if let Some(size) = window_size {
        if size > MAX_STRIKE_WINDOW {
            return Err(AppError::InvalidArgument(format!(
                "windowSize must be at most {MAX_STRIKE_WINDOW}"
            )));
        }
    }
    Ok(window_size)
}

pub fn validate_speed(speed: f64) -> Result<f64, AppError> {
    if !speed.is_finite() || !(MIN_SPEED..=MAX_SPEED).contains(&speed) {
        return Err(AppError::InvalidArgument(format!(
            "speed must be a finite multiplier between {MIN_SPEED} and {MAX_SPEED}"
        )));
    }
    Ok(speed)
}
