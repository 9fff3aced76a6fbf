//! Logging and metrics shims.
//!
//! These expand to `tracing` / `metrics` calls when the matching feature is
//! enabled and to nothing otherwise, so call sites stay free of `cfg` noise.

macro_rules! log_debug {
    ($($arg:tt)*) => {{
        #[cfg(feature = "tracing")]
        {
            tracing::debug!($($arg)*);
        }
    }};
}

macro_rules! log_info {
    ($($arg:tt)*) => {{
        #[cfg(feature = "tracing")]
        {
            tracing::info!($($arg)*);
        }
    }};
}

macro_rules! log_warn {
    ($($arg:tt)*) => {{
        #[cfg(feature = "tracing")]
        {
            tracing::warn!($($arg)*);
        }
    }};
}

macro_rules! count_items {
    ($name:literal, $stage:expr) => {{
        #[cfg(feature = "metrics")]
        {
            metrics::counter!($name, "stage" => $stage.to_string()).increment(1);
        }
    }};
}
