use crate::error::AppError;
use crate::replay::chain::{assemble, window_around_atm};
use crate::replay::store::TimeSeriesStore;
use crate::replay::types::{ChainRow, PlaybackPosition, StepDirection, StepOutcome};

/// Owns the playback coordinate and drives every navigation operation
/// through resolve -> fetch -> assemble -> window. The position is only
/// advanced after a successful fetch, so a failed step can be retried
/// against the same coordinate.
pub struct PlaybackEngine<S> {
    store: S,
    position: Option<PlaybackPosition>,
}

impl<S: TimeSeriesStore> PlaybackEngine<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            position: None,
        }
    }

    pub fn position(&self) -> Option<&PlaybackPosition> {
        self.position.as_ref()
    }

    pub fn is_positioned_at(&self, symbol: &str, expiry: &str) -> bool {
        self.position.as_ref().is_some_and(|position| {
            position.symbol == symbol
                && position.expiry == expiry
                && position.current_time.is_some()
        })
    }

    /// Synchronizes the session with the coordinate transmitted by the
    /// caller before a navigation call. Switching instruments discards the
    /// old position; the transmitted time (or its absence) is authoritative.
    pub fn align(&mut self, symbol: &str, expiry: &str, current_time: Option<i64>) {
        let same_instrument = self
            .position
            .as_ref()
            .is_some_and(|position| position.symbol == symbol && position.expiry == expiry);

        if !same_instrument {
            self.position = Some(PlaybackPosition {
                symbol: symbol.to_string(),
                expiry: expiry.to_string(),
                current_time: None,
            });
        }

        if let Some(position) = self.position.as_mut() {
            position.current_time = current_time;
        }
    }

    /// Positions the session on the first observed instant at or after
    /// `reference_ms`. Finding nothing leaves the session uninitialized.
    pub async fn seed(
        &mut self,
        symbol: &str,
        expiry: &str,
        reference_ms: i64,
        window_size: Option<u32>,
    ) -> Result<StepOutcome, AppError> {
        self.position = Some(PlaybackPosition {
            symbol: symbol.to_string(),
            expiry: expiry.to_string(),
            current_time: None,
        });

        let Some(time) = self
            .store
            .resolve_at_or_after(symbol, expiry, reference_ms)
            .await?
        else {
            return Ok(StepOutcome::NoData);
        };

        let rows = self.load_rows(symbol, expiry, time, window_size).await?;
        if let Some(position) = self.position.as_mut() {
            position.current_time = Some(time);
        }

        Ok(StepOutcome::Advanced { time, rows })
    }

    /// Re-seeds at an arbitrary reference instant, keeping the current
    /// instrument.
    pub async fn jump(
        &mut self,
        reference_ms: i64,
        window_size: Option<u32>,
    ) -> Result<StepOutcome, AppError> {
        let Some(position) = self.position.as_ref() else {
            return Ok(StepOutcome::NotPositioned);
        };

        let symbol = position.symbol.clone();
        let expiry = position.expiry.clone();
        self.seed(&symbol, &expiry, reference_ms, window_size).await
    }

    /// Advances to the adjacent observed instant. At the end of the series
    /// the position stays where it is and the outcome reports the exhausted
    /// direction.
    pub async fn step(
        &mut self,
        direction: StepDirection,
        window_size: Option<u32>,
        now_ms: i64,
    ) -> Result<StepOutcome, AppError> {
        let Some(position) = self.position.clone() else {
            return Ok(StepOutcome::NotPositioned);
        };

        let Some(current_time) = position.current_time else {
            return match direction {
                StepDirection::Next => {
                    self.seed(&position.symbol, &position.expiry, now_ms, window_size)
                        .await
                }
                StepDirection::Prev => Ok(StepOutcome::NotPositioned),
            };
        };

        let resolved = match direction {
            StepDirection::Next => {
                self.store
                    .resolve_after(&position.symbol, &position.expiry, current_time)
                    .await?
            }
            StepDirection::Prev => {
                self.store
                    .resolve_before(&position.symbol, &position.expiry, current_time)
                    .await?
            }
        };

        let Some(time) = resolved else {
            return Ok(StepOutcome::NoMoreData);
        };

        let rows = self
            .load_rows(&position.symbol, &position.expiry, time, window_size)
            .await?;
        if let Some(position) = self.position.as_mut() {
            position.current_time = Some(time);
        }

        Ok(StepOutcome::Advanced { time, rows })
    }

    async fn load_rows(
        &self,
        symbol: &str,
        expiry: &str,
        time: i64,
        window_size: Option<u32>,
    ) -> Result<Vec<ChainRow>, AppError> {
        let observations = self.store.fetch_observations(symbol, expiry, time).await?;
        let rows = assemble(observations);

        Ok(match window_size {
            Some(radius) => window_around_atm(&rows, radius as usize),
            None => rows,
        })
    }
}
