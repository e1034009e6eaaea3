//! # Loyalty Commands

use serde::Serialize;
use tracing::debug;

use aurum_core::LoyaltyEntry;
use aurum_engine::Redemption;

use super::{CustomerArgs, EarnArgs, RedeemArgs};
use crate::context::Context;
use crate::error::ApiResult;

#[derive(Debug, Clone, Serialize)]
pub struct BalanceResponse {
    pub customer_id: String,
    pub points: i64,
}

pub async fn earn(args: EarnArgs, ctx: &Context) -> ApiResult<LoyaltyEntry> {
    debug!(customer = %args.customer, points = args.points, "earn command");
    let customer_id = ctx.resolve_customer(&args.customer).await?;

    ctx.ledger()
        .earn(&customer_id, args.points, args.transaction.as_deref())
        .await
        .map_err(|e| ctx.fail(e))
}

pub async fn redeem(args: RedeemArgs, ctx: &Context) -> ApiResult<Redemption> {
    debug!(customer = %args.customer, points = args.points, "redeem command");
    let customer_id = ctx.resolve_customer(&args.customer).await?;

    ctx.ledger()
        .redeem(&customer_id, args.points)
        .await
        .map_err(|e| ctx.fail(e))
}

pub async fn balance(args: CustomerArgs, ctx: &Context) -> ApiResult<BalanceResponse> {
    let customer_id = ctx.resolve_customer(&args.customer).await?;
    let points = ctx
        .ledger()
        .balance(&customer_id)
        .await
        .map_err(|e| ctx.fail(e))?;

    Ok(BalanceResponse {
        customer_id,
        points,
    })
}

pub async fn history(args: CustomerArgs, ctx: &Context) -> ApiResult<Vec<LoyaltyEntry>> {
    let customer_id = ctx.resolve_customer(&args.customer).await?;
    ctx.ledger()
        .history(&customer_id)
        .await
        .map_err(|e| ctx.fail(e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use aurum_db::{Database, DbConfig};
    use aurum_engine::EngineConfig;

    #[tokio::test]
    async fn test_earn_redeem_balance() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.customers().create("Asha", "9000000001").await.unwrap();
        let ctx = Context::new(EngineConfig::default(), db);

        earn(
            EarnArgs {
                customer: "9000000001".into(),
                points: 50,
                transaction: None,
            },
            &ctx,
        )
        .await
        .unwrap();

        let err = redeem(
            RedeemArgs {
                customer: "9000000001".into(),
                points: 60,
            },
            &ctx,
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::InsufficientPoints);

        let response = balance(
            CustomerArgs {
                customer: "9000000001".into(),
            },
            &ctx,
        )
        .await
        .unwrap();
        assert_eq!(response.points, 50);

        let entries = history(
            CustomerArgs {
                customer: response.customer_id,
            },
            &ctx,
        )
        .await
        .unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_customer() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let ctx = Context::new(EngineConfig::default(), db);

        let err = balance(
            CustomerArgs {
                customer: "nobody".into(),
            },
            &ctx,
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }
}
