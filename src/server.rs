use std::{
    fs,
    io::ErrorKind,
    os::unix::fs::FileTypeExt,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{UnixListener, UnixStream},
};
use tokio_util::sync::CancellationToken;

use crate::{
    access::{AccessGateway, Operation},
    custody::InMemoryCustody,
    error::{TreasuryError, internal_error, invalid_request},
    facade::TreasuryFacade,
    protocol::{Request, Response, encode_response, parse_request},
    types::Amount,
};

/// What a connection handler can reach. Custody is the concrete in-memory
/// pool so a granted operator can fund it through `deposit`.
pub struct ServerContext {
    pub gateway: AccessGateway,
    pub facade: Arc<TreasuryFacade>,
    pub custody: Arc<InMemoryCustody>,
}

pub fn dispatch(ctx: &ServerContext, request: Request, shutdown: &CancellationToken) -> Response {
    let facade = ctx.facade.as_ref();
    match request {
        Request::AddCollateralAsset {
            caller,
            asset_id,
            curve,
            tap_rate,
            floor,
        } => respond(facade.add_collateral_asset(&caller, &asset_id, curve, tap_rate, floor)),
        Request::RemoveCollateralAsset { caller, asset_id } => {
            respond(facade.remove_collateral_asset(&caller, &asset_id))
        }
        Request::UpdateTapRate {
            caller,
            asset_id,
            tap_rate,
        } => respond(facade.update_tap_rate(&caller, &asset_id, tap_rate)),
        Request::UpdateTapFloor {
            caller,
            asset_id,
            floor,
        } => respond(facade.update_tap_floor(&caller, &asset_id, floor)),
        Request::UpdateMaxTapIncrease {
            caller,
            max_tap_change_pct,
        } => respond(facade.update_max_tap_increase(&caller, max_tap_change_pct)),
        Request::UpdateBeneficiary {
            caller,
            beneficiary,
        } => respond(facade.update_beneficiary(&caller, &beneficiary)),
        Request::UpdateReserveRatio {
            caller,
            asset_id,
            reserve_ratio,
        } => respond(facade.update_reserve_ratio(&caller, &asset_id, reserve_ratio)),
        Request::OpenBuyOrder {
            caller,
            asset_id,
            amount,
            payment,
        } => respond(facade.open_buy_order(&caller, &asset_id, amount, payment)),
        Request::OpenSellOrder {
            caller,
            asset_id,
            amount,
        } => respond(facade.open_sell_order(&caller, &asset_id, amount)),
        Request::Withdraw { caller, asset_id } => respond(facade.withdraw(&caller, &asset_id)),
        Request::AvailableBalance { asset_id } => respond(facade.available_balance(&asset_id)),
        Request::BalanceView { asset_id } => respond(facade.balance_view(&asset_id)),
        Request::TapRecord { asset_id } => respond(facade.tap_record(&asset_id)),
        Request::Deposit {
            caller,
            asset_id,
            amount,
        } => respond(deposit(ctx, &caller, &asset_id, amount)),
        Request::Shutdown {} => {
            shutdown.cancel();
            Response::Ok(serde_json::Value::Null)
        }
    }
}

fn deposit(
    ctx: &ServerContext,
    caller: &str,
    asset_id: &str,
    amount: Amount,
) -> Result<Amount, TreasuryError> {
    ctx.gateway.require(Operation::Deposit, caller)?;
    let balance = ctx.custody.deposit(asset_id, amount)?;
    tracing::info!(
        target: "treasury",
        caller = %caller,
        asset_id = %asset_id,
        amount = %amount,
        balance = %balance,
        "custody_deposited"
    );
    Ok(balance)
}

fn respond<T: Serialize>(result: Result<T, TreasuryError>) -> Response {
    match result.and_then(|value| {
        serde_json::to_value(value)
            .map_err(|err| internal_error(format!("failed to encode response: {err}")))
    }) {
        Ok(value) => Response::Ok(value),
        Err(err) => Response::Error(err),
    }
}

pub struct TreasuryServer {
    socket_path: PathBuf,
}

impl TreasuryServer {
    pub fn new(socket_path: PathBuf) -> Self {
        Self { socket_path }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    pub async fn run(&self, ctx: Arc<ServerContext>, shutdown: CancellationToken) -> Result<()> {
        prepare_socket_path(&self.socket_path)?;
        let listener = UnixListener::bind(&self.socket_path)
            .with_context(|| format!("unable to bind socket {}", self.socket_path.display()))?;
        tracing::info!(
            target: "server",
            socket_path = %self.socket_path.display(),
            "server_listening"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, _)) => {
                        let ctx = Arc::clone(&ctx);
                        let shutdown = shutdown.clone();
                        tokio::spawn(async move {
                            if let Err(err) = handle_connection(stream, ctx, shutdown).await {
                                tracing::warn!(
                                    target: "server",
                                    error = %format!("{err:#}"),
                                    "connection_failed"
                                );
                            }
                        });
                    }
                    Err(err) => {
                        tracing::warn!(target: "server", error = %err, "accept_failed");
                    }
                }
            }
        }

        cleanup_socket_path(&self.socket_path)?;
        tracing::info!(target: "server", "server_stopped");
        Ok(())
    }
}

async fn handle_connection(
    stream: UnixStream,
    ctx: Arc<ServerContext>,
    shutdown: CancellationToken,
) -> Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    loop {
        let line = tokio::select! {
            _ = shutdown.cancelled() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let response = match parse_request(line) {
            Ok(request) => dispatch(&ctx, request, &shutdown),
            Err(err) => {
                tracing::debug!(target: "server", error = %err, "invalid_request_line");
                Response::Error(invalid_request(format!("invalid request: {err}")))
            }
        };
        let encoded = encode_response(&response).context("failed to encode response")?;
        write_half.write_all(encoded.as_bytes()).await?;
        write_half.flush().await?;
    }

    Ok(())
}

fn prepare_socket_path(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("unable to create {}", parent.display()))?;
    }

    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(()),
        Err(err) => {
            return Err(err).with_context(|| format!("unable to inspect {}", path.display()));
        }
    };
    if !metadata.file_type().is_socket() {
        bail!("refusing to replace non-socket file at {}", path.display());
    }
    fs::remove_file(path)
        .with_context(|| format!("unable to remove stale socket {}", path.display()))
}

fn cleanup_socket_path(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Err(err) if err.kind() != ErrorKind::NotFound => {
            Err(err).with_context(|| format!("unable to remove {}", path.display()))
        }
        _ => Ok(()),
    }
}
