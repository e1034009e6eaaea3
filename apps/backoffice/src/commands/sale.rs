//! # Sale Command

use tracing::debug;

use aurum_core::{PaymentMode, SaleLineRequest};
use aurum_engine::{EngineError, SaleReceipt};

use super::SaleArgs;
use crate::context::Context;
use crate::error::ApiResult;

/// Records one sale.
pub async fn run(args: SaleArgs, ctx: &Context) -> ApiResult<SaleReceipt> {
    debug!(customer = %args.customer, lines = args.items.len(), "sale command");

    let payment_mode: PaymentMode = args
        .payment
        .parse()
        .map_err(|e| ctx.fail(EngineError::from(e)))?;
    let customer_id = ctx.resolve_customer(&args.customer).await?;

    ctx.sale_writer()
        .create_sale(&customer_id, &args.items, payment_mode)
        .await
        .map_err(|e| ctx.fail(e))
}

/// Parses `PRODUCT_ID[:QTY]`.
pub fn parse_item(raw: &str) -> Result<SaleLineRequest, String> {
    let raw = raw.trim();
    let (product_id, quantity) = match raw.rsplit_once(':') {
        Some((id, qty)) => {
            let qty = qty
                .trim()
                .parse::<i64>()
                .map_err(|_| format!("invalid quantity in '{raw}'"))?;
            (id.trim(), qty)
        }
        None => (raw, 1),
    };

    if product_id.is_empty() {
        return Err(format!("missing product id in '{raw}'"));
    }

    Ok(SaleLineRequest::new(product_id, quantity))
}
