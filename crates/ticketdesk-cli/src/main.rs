use clap::Parser;
use ticketdesk_cli::{CliConfig, TicketDeskCli, init_tracing, run};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = TicketDeskCli::parse();
    let config = CliConfig::load(cli.config.as_deref())?;
    init_tracing(&config.log_filter);
    run(cli, config).await
}
