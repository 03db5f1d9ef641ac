//! ordersync daemon: interval scheduler, serialized pass processor and a
//! Unix-socket control surface.

mod error;
pub mod protocol;
mod runtime;
mod socket;

pub use error::DaemonError;
pub use protocol::{
    daemon_running, request_compare, request_ingest, request_status, request_stop, request_sync,
    DaemonClient, DaemonRequest, DaemonResponse,
};
pub use runtime::{
    run, serve, start_blocking, DaemonSettings, LastPass, Pass, PassKind, PassSource,
    LOG_FORMAT_ENV,
};
