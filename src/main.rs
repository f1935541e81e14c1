fn main() -> anyhow::Result<()> {
    flipctl::cli::run()
}
