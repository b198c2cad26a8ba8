//! Diagnostic harness: one PTY, a heartbeat, and a log of what comes back.

fn main() -> anyhow::Result<()> {
    ttytee::cli::run_probe()
}
