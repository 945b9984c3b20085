/// Entry point for the `genrepair` binary.
fn main() -> anyhow::Result<()> {
    genrepair::cli::run()
}
