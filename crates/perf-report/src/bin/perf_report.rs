fn main() -> anyhow::Result<()> {
    perf_report::cli::run()
}
