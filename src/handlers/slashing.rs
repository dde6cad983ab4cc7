//! Slash proposal lifecycle: proposed, then disputed, cancelled or executed.
//!
//! The stake effect of a slash arrives separately as `Slashed`; these
//! handlers only track the proposal record.

use tracing::debug;

use super::Indexer;
use crate::domain::{keys, Address, Amount, EventMeta, SlashProposal, SlashStatus};
use crate::engine::ledger;
use crate::error::IndexerError;
use crate::store::StoreError;

#[derive(Debug, Clone, Copy)]
pub(super) struct NewSlash<'a> {
    pub slash_id: u64,
    pub service_id: u64,
    pub operator: &'a Address,
    pub proposer: &'a Address,
    pub amount: Amount,
    pub effective_amount: Amount,
    pub evidence: &'a str,
    pub execute_after: u64,
}

fn reason(raw: &str) -> Option<String> {
    (!raw.is_empty()).then(|| raw.to_string())
}

impl Indexer {
    /// Proposal still open to a transition, or `None` when unknown or settled.
    async fn open_proposal(&self, slash_id: u64, transition: &str) -> Result<Option<SlashProposal>, StoreError> {
        match self.repo.get::<SlashProposal>(&keys::slash_proposal(slash_id)).await? {
            Some(proposal) if proposal.status.is_final() => {
                debug!(slash_id, status = ?proposal.status, transition, "Slash proposal already settled");
                Ok(None)
            }
            Some(proposal) => Ok(Some(proposal)),
            None => {
                debug!(slash_id, transition, "Unknown slash proposal");
                Ok(None)
            }
        }
    }

    pub(super) async fn on_slash_proposed(&self, meta: &EventMeta, slash: NewSlash<'_>) -> Result<(), IndexerError> {
        let op = ledger::ensure_operator(&self.repo, slash.operator, meta.timestamp).await?;
        self.repo.set(&op).await?;
        self.repo
            .set(&SlashProposal {
                id: keys::slash_proposal(slash.slash_id),
                slash_id: slash.slash_id,
                service_id: slash.service_id,
                operator: slash.operator.clone(),
                proposer: slash.proposer.clone(),
                amount: slash.amount,
                effective_amount: slash.effective_amount,
                evidence: slash.evidence.to_string(),
                execute_after: slash.execute_after,
                status: SlashStatus::Pending,
                created_at: meta.timestamp,
                disputer: None,
                dispute_reason: None,
                disputed_at: None,
                canceller: None,
                cancel_reason: None,
                cancelled_at: None,
                actual_slashed: None,
                executed_at: None,
            })
            .await?;
        Ok(())
    }

    pub(super) async fn on_slash_disputed(
        &self,
        meta: &EventMeta,
        slash_id: u64,
        disputer: &Address,
        raw_reason: &str,
    ) -> Result<(), IndexerError> {
        let Some(mut proposal) = self.open_proposal(slash_id, "dispute").await? else {
            return Ok(());
        };
        proposal.status = SlashStatus::Disputed;
        proposal.disputer = Some(disputer.clone());
        proposal.dispute_reason = reason(raw_reason);
        proposal.disputed_at = Some(meta.timestamp);
        self.repo.set(&proposal).await?;
        Ok(())
    }

    /// Cancels the proposal. An undisputed proposal takes the cancel reason as its dispute reason.
    pub(super) async fn on_slash_cancelled(
        &self,
        meta: &EventMeta,
        slash_id: u64,
        canceller: &Address,
        raw_reason: &str,
    ) -> Result<(), IndexerError> {
        let Some(mut proposal) = self.open_proposal(slash_id, "cancel").await? else {
            return Ok(());
        };
        proposal.status = SlashStatus::Cancelled;
        proposal.canceller = Some(canceller.clone());
        proposal.cancel_reason = reason(raw_reason);
        proposal.cancelled_at = Some(meta.timestamp);
        if proposal.dispute_reason.is_none() {
            proposal.dispute_reason = reason(raw_reason);
        }
        self.repo.set(&proposal).await?;
        Ok(())
    }

    pub(super) async fn on_slash_executed(
        &self,
        meta: &EventMeta,
        slash_id: u64,
        operator: &Address,
        service_id: u64,
        actual_slashed: Amount,
    ) -> Result<(), IndexerError> {
        let op = ledger::ensure_operator(&self.repo, operator, meta.timestamp).await?;
        self.repo.set(&op).await?;
        let Some(mut proposal) = self.open_proposal(slash_id, "execute").await? else {
            return Ok(());
        };
        proposal.status = SlashStatus::Executed;
        proposal.operator = operator.clone();
        proposal.service_id = service_id;
        proposal.actual_slashed = Some(actual_slashed);
        proposal.executed_at = Some(meta.timestamp);
        self.repo.set(&proposal).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::{
        keys, Address, Amount, ChainEvent, EventKind, Operator, SlashProposal, SlashStatus,
    };
    use crate::handlers::test_support::{addr, indexer, meta};
    use crate::handlers::Indexer;

    fn event(block: u64, kind: EventKind) -> ChainEvent {
        ChainEvent {
            meta: meta(block),
            kind,
        }
    }

    fn proposed(slash_id: u64) -> EventKind {
        EventKind::SlashProposed {
            slash_id,
            service_id: 4,
            operator: addr("0xop"),
            proposer: addr("0xproposer"),
            amount: Amount::from_u64(1_000),
            effective_amount: Amount::from_u64(800),
            evidence: "0xfeed".to_string(),
            execute_after: 500,
        }
    }

    async fn proposal(ix: &Indexer, slash_id: u64) -> SlashProposal {
        ix.repo()
            .get(&keys::slash_proposal(slash_id))
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn test_proposal_disputed_then_executed() {
        let ix = indexer();
        ix.handle(&event(1, proposed(9))).await.unwrap();

        let created = proposal(&ix, 9).await;
        assert_eq!(created.status, SlashStatus::Pending);
        assert_eq!(created.effective_amount, Amount::from_u64(800));
        assert_eq!(created.evidence, "0xfeed");
        assert!(ix.repo().get::<Operator>("0xop").await.unwrap().is_some());

        ix.handle(&event(
            2,
            EventKind::SlashDisputed {
                slash_id: 9,
                disputer: addr("0xop"),
                reason: "wrong epoch".to_string(),
            },
        ))
        .await
        .unwrap();
        let disputed = proposal(&ix, 9).await;
        assert_eq!(disputed.status, SlashStatus::Disputed);
        assert_eq!(disputed.dispute_reason.as_deref(), Some("wrong epoch"));
        assert_eq!(disputed.disputed_at, Some(meta(2).timestamp));

        ix.handle(&event(
            3,
            EventKind::SlashExecuted {
                slash_id: 9,
                operator: addr("0xop"),
                service_id: 4,
                actual_slashed: Amount::from_u64(750),
            },
        ))
        .await
        .unwrap();
        let executed = proposal(&ix, 9).await;
        assert_eq!(executed.status, SlashStatus::Executed);
        assert_eq!(executed.actual_slashed, Some(Amount::from_u64(750)));
        assert_eq!(executed.disputer, Some(Address::new("0xop")));
    }

    #[tokio::test]
    async fn test_cancel_carries_reason_and_settles() {
        let ix = indexer();
        ix.handle(&event(1, proposed(2))).await.unwrap();
        ix.handle(&event(
            2,
            EventKind::SlashCancelled {
                slash_id: 2,
                canceller: addr("0xgov"),
                reason: "duplicate".to_string(),
            },
        ))
        .await
        .unwrap();

        let cancelled = proposal(&ix, 2).await;
        assert_eq!(cancelled.status, SlashStatus::Cancelled);
        assert_eq!(cancelled.cancel_reason.as_deref(), Some("duplicate"));
        assert_eq!(cancelled.dispute_reason.as_deref(), Some("duplicate"));

        // Settled proposals ignore later transitions
        ix.handle(&event(
            3,
            EventKind::SlashExecuted {
                slash_id: 2,
                operator: addr("0xop"),
                service_id: 4,
                actual_slashed: Amount::from_u64(1),
            },
        ))
        .await
        .unwrap();
        assert_eq!(proposal(&ix, 2).await, cancelled);
    }

    #[tokio::test]
    async fn test_transition_on_unknown_proposal_is_noop() {
        let ix = indexer();
        ix.handle(&event(
            1,
            EventKind::SlashDisputed {
                slash_id: 77,
                disputer: addr("0xop"),
                reason: String::new(),
            },
        ))
        .await
        .unwrap();
        ix.handle(&event(
            2,
            EventKind::SlashExecuted {
                slash_id: 77,
                operator: addr("0xop"),
                service_id: 0,
                actual_slashed: Amount::from_u64(5),
            },
        ))
        .await
        .unwrap();

        assert_eq!(ix.repo().count::<SlashProposal>().await.unwrap(), 0);
        // The executing operator is still recorded
        assert!(ix.repo().get::<Operator>("0xop").await.unwrap().is_some());
    }
}
