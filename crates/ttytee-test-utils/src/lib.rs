pub mod fixtures;
pub mod terminal;

pub use fixtures::TestFixtures;
pub use terminal::{read_for, read_until, Consumer, FakeTty};

use std::sync::Once;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// How long helpers wait for bytes that should arrive promptly
pub const IO_TIMEOUT: Duration = Duration::from_secs(2);

pub fn init_test_logging() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("ttytee=debug,ttytee_pty=debug")),
            )
            .with_test_writer()
            .init();
    });
}
