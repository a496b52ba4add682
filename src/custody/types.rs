use rust_decimal::Decimal;

/// Body of `POST /transfers`. `pin` is computed by the client
/// implementation from key material it alone holds; the dispatcher never
/// sees it.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TransferRequest {
    pub asset_id: String,
    pub opponent_id: String,
    pub amount: Decimal,
    pub trace_id: String,
    pub memo: String,
}
