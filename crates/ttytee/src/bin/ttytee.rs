fn main() -> anyhow::Result<()> {
    ttytee::cli::run()
}
