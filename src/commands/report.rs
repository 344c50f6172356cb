use rust_decimal::Decimal;
use serde::Serialize;

use crate::{
    domain::{pricing, PaymentStatus, SpaceStatus},
    ports::database::DatabasePort,
};

use super::{DomainLogic, Error};

/// Headline figures for the front desk
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub total_members: usize,
    pub active_members: usize,
    pub confirmed_bookings: usize,
    pub total_spaces: usize,
    pub available_spaces: usize,
    /// Sum of all payments marked paid
    #[serde(with = "rust_decimal::serde::str")]
    pub total_revenue: Decimal,
}

impl<D, A> DomainLogic<D, A>
where
    D: DatabasePort + Send + Sync,
{
    pub async fn dashboard_summary(&self) -> Result<DashboardSummary, Error> {
        let members = self.database.list_members().await?;
        let spaces = self.database.list_spaces().await?;
        let bookings = self.database.list_bookings().await?;
        let payments = self.database.list_payments().await?;

        Ok(DashboardSummary {
            total_members: members.len(),
            active_members: members.iter().filter(|m| m.is_active).count(),
            confirmed_bookings: bookings.iter().filter(|b| b.is_confirmed()).count(),
            total_spaces: spaces.len(),
            available_spaces: spaces
                .iter()
                .filter(|s| s.status == SpaceStatus::Available)
                .count(),
            total_revenue: pricing::sum_money(
                payments
                    .iter()
                    .filter(|p| p.payment_status == PaymentStatus::Paid)
                    .map(|p| p.amount),
            )?,
        })
    }
}
