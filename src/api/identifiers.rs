/// Identifier helper endpoints used by the wallet UI
use crate::{
    caip10,
    chain::transfer::{counterparty_account_id, expected_transfer_amount, SHARED_CONTROL_PURPOSE},
    did::Did,
    error::AttestResult,
    AppContext,
};
use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

/// Build identifier routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/v1/normalize", get(normalize))
        .route("/api/v1/transfer-amount", get(transfer_amount))
}

#[derive(Debug, Deserialize)]
pub struct NormalizeParams {
    /// CAIP-10 identifier (e.g., "eip155:1:0xabc...")
    pub id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizeResponse {
    pub canonical: String,
    pub namespace: String,
}

/// GET /api/v1/normalize
pub async fn normalize(Query(params): Query<NormalizeParams>) -> AttestResult<Json<NormalizeResponse>> {
    let id = caip10::normalize(&params.id)?;
    Ok(Json(NormalizeResponse {
        canonical: id.to_string(),
        namespace: id.namespace().to_string(),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferAmountParams {
    pub did: String,
    /// Wallet that will receive the proof transfer
    pub claimant: String,
    /// Defaults to the active chain
    pub chain_id: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferAmountResponse {
    /// Decimal wei amount; a string since it may exceed JSON number precision
    pub amount_wei: String,
    pub purpose: &'static str,
    pub counterparty: String,
    pub chain_id: u64,
}

/// GET /api/v1/transfer-amount
///
/// The exact amount a controller must send to the claimant to prove control
pub async fn transfer_amount(
    State(ctx): State<AppContext>,
    Query(params): Query<TransferAmountParams>,
) -> AttestResult<Json<TransferAmountResponse>> {
    let did = Did::parse(&params.did)?;
    let claimant = caip10::to_checksum_address(&params.claimant)?;
    let chain_id = params
        .chain_id
        .unwrap_or(ctx.config.chain.active_chain_id);

    let counterparty = counterparty_account_id(chain_id, &claimant);
    let amount = expected_transfer_amount(
        &did.to_string(),
        &counterparty,
        chain_id,
        SHARED_CONTROL_PURPOSE,
    );

    Ok(Json(TransferAmountResponse {
        amount_wei: amount.to_string(),
        purpose: SHARED_CONTROL_PURPOSE,
        counterparty,
        chain_id,
    }))
}
