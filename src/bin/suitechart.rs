fn main() -> anyhow::Result<()> {
    suitechart::cli::run()
}
