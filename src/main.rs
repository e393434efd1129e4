use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;

use treasury_tap::{
    access::{AccessGateway, InMemoryPolicyStore},
    accounting::CollateralBalancePort,
    cli::config_path_from_args,
    clock::SystemClock,
    config::Config,
    curve::InMemoryCurve,
    custody::InMemoryCustody,
    facade::TreasuryFacade,
    logging::init_tracing,
    server::{ServerContext, TreasuryServer},
    tap::{TapLedger, TapPersistence},
};

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = config_path_from_args()?;
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    let logging_guard = init_tracing(&config.logging)?;

    let persistence = TapPersistence::new(config.treasury.state_path.clone());
    let ledger = match persistence.load()? {
        Some(snapshot) => {
            tracing::info!(
                target: "treasury",
                state_path = %persistence.path().display(),
                records = snapshot.records.len(),
                "tap_state_restored"
            );
            TapLedger::from_snapshot(snapshot)?
        }
        None => TapLedger::new(config.treasury.tap_policy(), config.treasury.beneficiary.clone()),
    };

    let curve = Arc::new(InMemoryCurve::new());
    let custody = Arc::new(InMemoryCustody::with_balances(
        config.custody.balances.clone(),
    ));
    let gateway = AccessGateway::new(Arc::new(InMemoryPolicyStore::from_grants(
        config.access.grants.clone(),
    )));
    let facade = Arc::new(
        TreasuryFacade::new(
            gateway.clone(),
            ledger,
            curve.clone(),
            custody.clone(),
            Arc::new(SystemClock),
        )
        .with_persistence(persistence),
    );
    let redemption_guard: Arc<dyn CollateralBalancePort> = facade.clone();
    curve.attach_redemption_guard(Arc::downgrade(&redemption_guard));
    drop(redemption_guard);
    facade.restore_curve_listings()?;

    let shutdown = CancellationToken::new();
    let server = TreasuryServer::new(config.server.socket_path.clone());
    let ctx = Arc::new(ServerContext {
        gateway,
        facade,
        custody,
    });
    let server_task = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { server.run(ctx, shutdown).await })
    };

    let mut sigint =
        signal(SignalKind::interrupt()).context("unable to listen for SIGINT (Ctrl+C)")?;
    let mut sigterm = signal(SignalKind::terminate()).context("unable to listen for SIGTERM")?;

    let reason = tokio::select! {
        _ = sigint.recv() => "SIGINT",
        _ = sigterm.recv() => "SIGTERM",
        _ = shutdown.cancelled() => "shutdown request",
    };
    shutdown.cancel();

    server_task.await.context("server task join failed")??;
    tracing::info!(
        target: "treasury",
        run_id = %logging_guard.run_id(),
        reason,
        "treasury_stopped"
    );
    Ok(())
}
