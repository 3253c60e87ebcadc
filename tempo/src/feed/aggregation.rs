use super::EventFeed;
use crate::{
    error::EngineError,
    listener::{Listener, ListenerRegistry},
};
use chrono::{DateTime, Duration, Utc};
use indexmap::IndexMap;
use rust_decimal::Decimal;
use tempo_instrument::{
    bar::{Bar, BarType, PeriodUnit},
    event::{Event, EventKind},
};

/// `period_value * period_unit` as a fixed wall-clock [`Duration`].
///
/// [`PeriodUnit::Tick`] and [`PeriodUnit::Volume`] have no fixed wall-clock length and are
/// therefore unsupported by the time-window aggregator (SPEC_FULL.md §4.K describes "time-window
/// bar aggregation" specifically); constructing a [`BarAggregationFeed`] with either returns an
/// error rather than silently misbehaving.
fn window_duration(period_value: u64, period_unit: PeriodUnit) -> Result<Duration, EngineError> {
    let value = period_value as i64;
    match period_unit {
        PeriodUnit::Second => Ok(Duration::seconds(value)),
        PeriodUnit::Minute => Ok(Duration::minutes(value)),
        PeriodUnit::Hour => Ok(Duration::hours(value)),
        PeriodUnit::Day => Ok(Duration::days(value)),
        PeriodUnit::Week => Ok(Duration::weeks(value)),
        PeriodUnit::Month | PeriodUnit::Tick | PeriodUnit::Volume => Err(EngineError::Validation(format!(
            "bar aggregation only supports fixed-duration periods (Second..Week), got {period_unit}"
        ))),
    }
}

/// Running accumulator for one not-yet-closed aggregation window.
#[derive(Debug, Clone)]
struct Window {
    source_bar_type: BarType,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    open: Decimal,
    high: Decimal,
    low: Decimal,
    close: Decimal,
    volume: Decimal,
    last_bar_end: DateTime<Utc>,
    last_dt_received: DateTime<Utc>,
}

impl Window {
    fn seed(start: DateTime<Utc>, end: DateTime<Utc>, bar: &Bar, dt_received: DateTime<Utc>) -> Self {
        Self {
            source_bar_type: bar.bar_type.clone(),
            start,
            end,
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
            last_bar_end: bar.end_dt,
            last_dt_received: dt_received,
        }
    }

    fn fold(&mut self, bar: &Bar, dt_received: DateTime<Utc>) {
        self.high = self.high.max(bar.high);
        self.low = self.low.min(bar.low);
        self.close = bar.close;
        self.volume += bar.volume;
        self.last_bar_end = bar.end_dt;
        self.last_dt_received = dt_received;
    }

    /// True once the last folded source bar's `end_dt` reaches the window boundary -- i.e. the
    /// window is fully covered by source bars even though no bar *starting* at or after `end` has
    /// arrived yet to trigger the normal close-on-next-bar path.
    fn fully_covered(&self) -> bool {
        self.last_bar_end >= self.end
    }

    fn into_bar(self, bar_type: BarType, is_partial: bool) -> Bar {
        Bar {
            bar_type,
            start_dt: self.start,
            end_dt: self.end,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
            is_partial,
        }
    }
}

/// Combines consecutive bar events from `source` into longer, boundary-aligned windows
/// (SPEC_FULL.md §4.K).
///
/// Window boundaries snap to multiples of the target duration since the Unix epoch. A leading
/// partial window -- the source's first bar not itself aligned to a boundary -- is dropped rather
/// than aggregated short. On source exhaustion, a window whose folded bars already cover it in
/// full (the last folded bar's `end_dt` reaches the window boundary, just with no later bar ever
/// arriving to trigger the normal close-on-next-bar path) is flushed as a complete bar; a window
/// that is genuinely short at that point is dropped unless `emit_partial_on_finish` is set, in
/// which case it is flushed once with `is_partial = true`.
#[derive(Debug)]
pub struct BarAggregationFeed {
    source: Box<dyn EventFeed>,
    target_value: u64,
    target_unit: PeriodUnit,
    window_len: Duration,
    emit_partial_on_finish: bool,
    accumulator: Option<Window>,
    pending: Option<Event>,
    flushed_on_finish: bool,
    listeners: ListenerRegistry,
}

impl BarAggregationFeed {
    pub fn new(
        source: Box<dyn EventFeed>,
        target_value: u64,
        target_unit: PeriodUnit,
        emit_partial_on_finish: bool,
    ) -> Result<Self, EngineError> {
        let window_len = window_duration(target_value, target_unit)?;
        Ok(Self {
            source,
            target_value,
            target_unit,
            window_len,
            emit_partial_on_finish,
            accumulator: None,
            pending: None,
            flushed_on_finish: false,
            listeners: ListenerRegistry::default(),
        })
    }

    fn aligned_window_start(&self, dt: DateTime<Utc>) -> DateTime<Utc> {
        let epoch = DateTime::<Utc>::UNIX_EPOCH;
        let since_epoch = dt - epoch;
        let len_ms = self.window_len.num_milliseconds();
        let whole_windows = since_epoch.num_milliseconds() / len_ms;
        epoch + Duration::milliseconds(len_ms * whole_windows)
    }

    fn bar_type_for(&self, source_bar_type: &BarType) -> BarType {
        BarType {
            instrument_name: source_bar_type.instrument_name.clone(),
            period_value: self.target_value,
            period_unit: self.target_unit,
            price_type: source_bar_type.price_type,
        }
    }

    /// Pulls bars from `source` until either a window closes (producing `self.pending`) or the
    /// source currently has nothing ready.
    fn advance(&mut self) {
        if self.pending.is_some() {
            return;
        }

        loop {
            let Some(next) = self.source.peek() else {
                if self.source.is_finished() {
                    self.flush_on_finish();
                }
                return;
            };
            let EventKind::Bar(_) = &next.kind else {
                // Non-bar events on the source feed are dropped by the aggregator: it is only
                // ever wired to a feed of bar events (SPEC_FULL.md §4.K).
                self.source.pop();
                continue;
            };

            let event = self.source.pop().expect("peeked Some implies pop Some");
            let EventKind::Bar(bar) = event.kind else {
                unreachable!("matched Bar above")
            };

            match &mut self.accumulator {
                None => {
                    let aligned_start = self.aligned_window_start(bar.start_dt);
                    if aligned_start != bar.start_dt {
                        // Leading partial window: drop and wait for an aligned boundary.
                        continue;
                    }
                    self.accumulator = Some(Window::seed(
                        aligned_start,
                        aligned_start + self.window_len,
                        &bar,
                        event.dt_received,
                    ));
                }
                Some(window) => {
                    if bar.start_dt >= window.end {
                        let finished = self.accumulator.take().unwrap();
                        let bar_type = self.bar_type_for(&finished.source_bar_type);
                        self.pending = Some(Event::bar(finished.into_bar(bar_type, false), event.dt_received));

                        let aligned_start = self.aligned_window_start(bar.start_dt);
                        if aligned_start == bar.start_dt {
                            self.accumulator = Some(Window::seed(
                                aligned_start,
                                aligned_start + self.window_len,
                                &bar,
                                event.dt_received,
                            ));
                        }
                        return;
                    }
                    window.fold(&bar, event.dt_received);
                }
            }

            if self.source.is_finished() && self.source.peek().is_none() {
                self.flush_on_finish();
                return;
            }
        }
    }

    fn flush_on_finish(&mut self) {
        if self.flushed_on_finish {
            return;
        }
        self.flushed_on_finish = true;

        let Some(window) = self.accumulator.take() else {
            return;
        };

        let is_complete = window.fully_covered();
        if !is_complete && !self.emit_partial_on_finish {
            return;
        }

        let bar_type = self.bar_type_for(&window.source_bar_type);
        let dt_received = window.last_dt_received;
        self.pending = Some(Event::bar(window.into_bar(bar_type, !is_complete), dt_received));
    }
}

impl EventFeed for BarAggregationFeed {
    fn peek(&mut self) -> Option<&Event> {
        self.advance();
        self.pending.as_ref()
    }

    fn pop(&mut self) -> Option<Event> {
        self.advance();
        let event = self.pending.take()?;
        self.listeners.notify(&event);
        Some(event)
    }

    fn is_finished(&self) -> bool {
        self.source.is_finished() && self.pending.is_none() && self.accumulator.is_none()
    }

    fn add_listener(&mut self, key: &str, listener: Listener) -> Result<(), EngineError> {
        self.listeners.add(key, listener)
    }

    fn remove_listener(&mut self, key: &str) -> Result<(), EngineError> {
        self.listeners.remove(key)
    }

    fn remove_events_before(&mut self, cutoff: DateTime<Utc>) {
        self.source.remove_events_before(cutoff);
        if matches!(&self.pending, Some(event) if event.dt_event < cutoff) {
            self.pending = None;
        }
    }

    fn close(&mut self) {
        self.source.close();
        self.pending = None;
        self.accumulator = None;
    }
}
