use anyhow::{Result, anyhow};
use tracing::info;

use crate::cli::args::{Cli, Command};
use crate::cli::context::{build_services, init_tracing, load_configuration};
use crate::cli::trade::{run_fees, run_quote, run_status, run_trade};
use crate::cli::wallet::handle_wallet_command;

pub async fn run(cli: Cli) -> Result<()> {
    let config = load_configuration(cli.config.clone()).map_err(|err| anyhow!(err))?;
    init_tracing(&config.global.logging)?;

    if let Command::Wallet(cmd) = &cli.command {
        return handle_wallet_command(cmd);
    }

    if config.prometheus.enable {
        swapflow::monitoring::try_init_prometheus(&config.prometheus.listen)
            .map_err(|err| anyhow!(err))?;
        info!(
            target: "monitoring",
            listen = %config.prometheus.listen,
            "Prometheus 指标导出已启动"
        );
    }

    let services = build_services(&config)?;
    match cli.command {
        Command::Quote(cmd) => run_quote(&services, cmd).await,
        Command::Fees => run_fees(&services).await,
        Command::Trade(cmd) => run_trade(&services, cmd).await,
        Command::Status(cmd) => run_status(&services, cmd).await,
        Command::Wallet(_) => Ok(()),
    }
}
