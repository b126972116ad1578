//! API Routes
//!
//! HTTP endpoint definitions.

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Account, OperationContext, Page, PageRequest, PublicAccount, TransactionRecord};
use crate::error::AppError;
use crate::gateway::is_valid_session_id;
use crate::handlers::{
    CheckoutResult, CreateAccountCommand, PurchaseFeatureCommand, PurchaseResult, TopUpCommand,
    TopUpResult, TransferCommand, TransferResult,
};
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyQuery {
    pub session_id: String,
}

/// Create the API router
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/accounts", post(create_account).get(list_accounts))
        .route("/accounts/iban/:iban", get(get_account_by_iban))
        .route("/accounts/:id", get(get_account).delete(delete_account))
        .route("/transfers/internal", post(transfer_internal))
        .route("/transfers/external", post(transfer_external))
        .route("/payments/topup", post(create_top_up))
        .route("/payments/verify", get(verify_top_up))
        .route("/billing/super-user", post(purchase_super_user))
        .route("/statement/my", get(my_statement))
        .route("/statement/account/:id", get(account_statement))
}

// =========================================================================
// Accounts
// =========================================================================

async fn create_account(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Json(command): Json<CreateAccountCommand>,
) -> Result<(StatusCode, Json<Account>), AppError> {
    let account = state.ledger.create_account(&context, command.currency).await?;
    Ok((StatusCode::CREATED, Json(account)))
}

async fn list_accounts(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
) -> Result<Json<Vec<Account>>, AppError> {
    Ok(Json(state.ledger.list_accounts(&context).await?))
}

async fn get_account(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Account>, AppError> {
    Ok(Json(state.ledger.get_owned_account(&context, id).await?))
}

async fn get_account_by_iban(
    State(state): State<AppState>,
    Path(iban): Path<String>,
) -> Result<Json<PublicAccount>, AppError> {
    Ok(Json(state.ledger.find_by_iban(&iban).await?))
}

async fn delete_account(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.ledger.delete_account(&context, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =========================================================================
// Transfers
// =========================================================================

async fn transfer_internal(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Json(command): Json<TransferCommand>,
) -> Result<Json<TransferResult>, AppError> {
    Ok(Json(state.transfers.internal(&context, command).await?))
}

async fn transfer_external(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Json(command): Json<TransferCommand>,
) -> Result<Json<TransferResult>, AppError> {
    Ok(Json(state.transfers.external(&context, command).await?))
}

// =========================================================================
// Payments
// =========================================================================

async fn create_top_up(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Json(command): Json<TopUpCommand>,
) -> Result<Json<CheckoutResult>, AppError> {
    Ok(Json(state.top_ups.create_checkout(&context, command).await?))
}

/// Called by the gateway redirect; needs no acting user
async fn verify_top_up(
    State(state): State<AppState>,
    Query(query): Query<VerifyQuery>,
) -> Result<Json<TopUpResult>, AppError> {
    if query.session_id.trim().is_empty() {
        return Err(AppError::InvalidRequest("session_id is required".to_string()));
    }
    if !is_valid_session_id(&query.session_id) {
        return Err(AppError::InvalidRequest("malformed session_id".to_string()));
    }
    Ok(Json(state.top_ups.verify(&query.session_id).await?))
}

// =========================================================================
// Billing
// =========================================================================

async fn purchase_super_user(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Json(command): Json<PurchaseFeatureCommand>,
) -> Result<Json<PurchaseResult>, AppError> {
    Ok(Json(state.billing.purchase_super_user(&context, command).await?))
}

// =========================================================================
// Statements
// =========================================================================

async fn my_statement(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Query(page): Query<PageRequest>,
) -> Result<Json<Page<TransactionRecord>>, AppError> {
    Ok(Json(state.statements.for_initiator(&context, page).await?))
}

async fn account_statement(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Path(id): Path<Uuid>,
    Query(page): Query<PageRequest>,
) -> Result<Json<Page<TransactionRecord>>, AppError> {
    Ok(Json(state.statements.for_account(&context, id, page).await?))
}
