mod error;
pub mod logging;
pub mod normalize;
pub mod refreshing_client;
pub mod settings;
pub mod sink;
pub mod sync;

pub use error::{ErrorKind, RecorderError};
pub use normalize::{normalize, Series, TimeSeriesPoint};
pub use refreshing_client::{
    CredentialRepository, FetchOutcome, FitbitWeightLogs, RefreshingClient, TokenRefresher,
    WeightLogApi,
};
pub use settings::{InfluxDbSettings, Settings};
pub use sink::{InfluxDbSink, MetricsSink};
pub use sync::{SyncFailure, SyncReport, SyncRunner};
