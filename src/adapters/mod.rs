//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter        | Implements   | Connects to                 |
//! |----------------|--------------|-----------------------------|
//! | `clock`        | ClockPort    | System wall clock / manual  |
//! | `log_sink`     | EventSink    | `log` facade                |
//! | `policy_file`  | (loader)     | JSON policy bundle on disk  |

pub mod clock;
pub mod log_sink;
pub mod policy_file;
