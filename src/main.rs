use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = report_ledger::args::parse();
    report_ledger::cli::main(args).await
}
