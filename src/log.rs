use tracing_subscriber::{
    EnvFilter, fmt, prelude::__tracing_subscriber_SubscriberExt, util::SubscriberInitExt,
};

/// Logging stays off unless `-v` is passed or `RUST_LOG` overrides it, so
/// the rendered table is the only default output. Verbose mode enables this
/// crate's debug logs without dragging in hyper/reqwest chatter.
pub fn init_logging(verbose: bool) {
    let directives = if verbose { "info,portval=debug" } else { "off" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .compact()
                .without_time()
                .with_target(verbose),
        )
        .with(filter)
        .init();
}
