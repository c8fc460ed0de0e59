use chrono::{Local, NaiveDate, TimeZone};
use fitbit_api::endpoints::Period;
use tracing::{Instrument, Span};

use crate::error::{ErrorKind, RecorderError};
use crate::normalize::{normalize, TimeSeriesPoint};
use crate::refreshing_client::{CredentialRepository, RefreshingClient, TokenRefresher, WeightLogApi};
use crate::sink::MetricsSink;

/// Summary of one sync cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncReport {
    pub dry_run: bool,
    pub records: usize,
    pub points: usize,
    /// Records whose local time could not be placed on the timeline.
    pub skipped: usize,
    pub written: usize,
    pub refreshed: bool,
    pub failure: Option<SyncFailure>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyncFailure {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&RecorderError> for SyncFailure {
    fn from(err: &RecorderError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl SyncReport {
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

/// Runs fetch → normalize → write cycles.
///
/// `run` is the recovery boundary: every error below it is logged and
/// reported in the [`SyncReport`] instead of being returned.
pub struct SyncRunner<A, R, S, K, Tz = Local> {
    api: A,
    refresher: R,
    store: S,
    sink: K,
    timezone: Tz,
    window: Period,
    end_date: Option<NaiveDate>,
    span: Span,
}

impl<A, R, S, K> SyncRunner<A, R, S, K, Local> {
    pub fn new(api: A, refresher: R, store: S, sink: K) -> Self {
        Self {
            api,
            refresher,
            store,
            sink,
            timezone: Local,
            window: Period::default(),
            end_date: None,
            span: tracing::info_span!("sync"),
        }
    }
}

impl<A, R, S, K, Tz> SyncRunner<A, R, S, K, Tz> {
    pub fn window(mut self, window: Period) -> Self {
        self.window = window;
        self
    }

    /// Last day of the window; today (local) when unset.
    pub fn end_date(mut self, end_date: NaiveDate) -> Self {
        self.end_date = Some(end_date);
        self
    }

    /// Span every log line of a cycle is recorded under.
    pub fn span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Zone the records' local date and time are interpreted in.
    pub fn timezone<Tz2: TimeZone>(self, timezone: Tz2) -> SyncRunner<A, R, S, K, Tz2> {
        SyncRunner {
            api: self.api,
            refresher: self.refresher,
            store: self.store,
            sink: self.sink,
            timezone,
            window: self.window,
            end_date: self.end_date,
            span: self.span,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }
}

impl<A, R, S, K, Tz> SyncRunner<A, R, S, K, Tz>
where
    A: WeightLogApi,
    R: TokenRefresher,
    S: CredentialRepository,
    K: MetricsSink,
    Tz: TimeZone,
{
    /// One sync cycle. With `dry_run` the sink is never called; fetching and
    /// token refresh (including saving rotated tokens) still happen.
    pub async fn run(&self, dry_run: bool) -> SyncReport {
        let mut report = SyncReport {
            dry_run,
            ..SyncReport::default()
        };

        let span = self.span.clone();
        async {
            match self.cycle(dry_run, &mut report).await {
                Ok(()) => tracing::info!(
                    records = report.records,
                    points = report.points,
                    written = report.written,
                    refreshed = report.refreshed,
                    "sync cycle complete"
                ),
                Err(err) => {
                    tracing::error!(
                        kind = %err.kind(),
                        transient = err.is_transient(),
                        records = report.records,
                        written = report.written,
                        "sync cycle failed: {}",
                        err
                    );
                    if err.kind() == ErrorKind::AuthExchange {
                        tracing::error!("the stored refresh token may be invalid; run `authorize` again");
                    }
                    report.failure = Some(SyncFailure::from(&err));
                }
            }
        }
        .instrument(span)
        .await;

        report
    }

    async fn cycle(&self, dry_run: bool, report: &mut SyncReport) -> Result<(), RecorderError> {
        let _lock = self.store.lock()?;
        let mut credential = self.store.load()?;

        let end_date = self
            .end_date
            .unwrap_or_else(|| Local::now().date_naive());

        let client = RefreshingClient::new(&self.api, &self.refresher, &self.store);
        let outcome = client
            .fetch_weight_logs(&mut credential, end_date, self.window)
            .await?;
        report.records = outcome.records.len();
        report.refreshed = outcome.refreshed;

        let mut points: Vec<TimeSeriesPoint> = Vec::new();
        for record in &outcome.records {
            match normalize(record, &self.timezone) {
                Ok(record_points) => {
                    for point in &record_points {
                        tracing::info!(series = %point.series, value = point.value, timestamp = point.timestamp);
                    }
                    points.extend(record_points);
                }
                Err(err) => {
                    tracing::warn!(log_id = record.log_id, "skipping record: {}", err);
                    report.skipped += 1;
                }
            }
        }
        report.points = points.len();

        if dry_run {
            tracing::info!(points = points.len(), "dry run, not writing points");
            return Ok(());
        }

        for point in &points {
            self.sink.write_point(point).await?;
            report.written += 1;
        }

        Ok(())
    }
}
