use tracing::debug;

use super::Indexer;
use crate::domain::{keys, Address, Amount, EventMeta, Service, ServiceOperator, ServiceStatus};
use crate::engine::points::{CUSTOMER_SERVICE, OPERATOR_SERVICE, SERVICE_HOURLY};
use crate::error::IndexerError;

const CUSTOMER_SERVICE_POINTS: u64 = 50;
const OPERATOR_SERVICE_POINTS: u64 = 20;

impl Indexer {
    pub(super) async fn on_service_activated(
        &self,
        meta: &EventMeta,
        service_id: u64,
        blueprint_id: u64,
        owner: &Address,
    ) -> Result<(), IndexerError> {
        let now = meta.timestamp;
        let id = service_id.to_string();
        let service = match self.repo.get::<Service>(&id).await? {
            Some(mut existing) => {
                existing.status = ServiceStatus::Active;
                existing.terminated_at = None;
                existing
            }
            None => Service {
                id: id.clone(),
                blueprint_id,
                owner: owner.clone(),
                status: ServiceStatus::Active,
                created_at: now,
                terminated_at: None,
            },
        };
        self.repo.set(&service).await?;
        self.activate(SERVICE_HOURLY, &id, now).await?;

        if !owner.is_zero() {
            self.award(
                meta,
                owner.as_str(),
                CUSTOMER_SERVICE,
                Amount::from_u64(CUSTOMER_SERVICE_POINTS),
                "service activated",
            )
            .await?;
        }
        Ok(())
    }

    pub(super) async fn on_service_terminated(&self, meta: &EventMeta, service_id: u64) -> Result<(), IndexerError> {
        let id = service_id.to_string();
        let Some(mut service) = self.repo.get::<Service>(&id).await? else {
            debug!(service = %id, "Termination for unknown service");
            return Ok(());
        };
        service.status = ServiceStatus::Terminated;
        service.terminated_at = Some(meta.timestamp);
        self.repo.set(&service).await?;
        self.deactivate(SERVICE_HOURLY, &id, meta.timestamp).await
    }

    pub(super) async fn on_operator_joined_service(
        &self,
        meta: &EventMeta,
        service_id: u64,
        operator: &Address,
        exposure_bps: u64,
    ) -> Result<(), IndexerError> {
        let id = service_id.to_string();
        if self.repo.get::<Service>(&id).await?.is_none() {
            debug!(service = %id, operator = %operator, "Join for unknown service");
            return Ok(());
        }
        self.repo
            .set(&ServiceOperator {
                id: keys::service_operator(&id, operator),
                service: id.clone(),
                operator: operator.clone(),
                exposure_bps,
                joined_at: meta.timestamp,
                left_at: None,
                active: true,
            })
            .await?;
        self.award(
            meta,
            operator.as_str(),
            OPERATOR_SERVICE,
            Amount::from_u64(OPERATOR_SERVICE_POINTS),
            "joined service",
        )
        .await
    }

    pub(super) async fn on_operator_left_service(
        &self,
        meta: &EventMeta,
        service_id: u64,
        operator: &Address,
    ) -> Result<(), IndexerError> {
        let id = keys::service_operator(&service_id.to_string(), operator);
        if let Some(mut member) = self.repo.get::<ServiceOperator>(&id).await? {
            member.active = false;
            member.left_at = Some(meta.timestamp);
            self.repo.set(&member).await?;
        }
        Ok(())
    }
}
