//! Ledger mutation rules shared by the event handlers.

pub mod ledger;
pub mod participation;
pub mod points;
pub mod queue;
pub mod vault;

pub use participation::{SweepStats, Valuation};
pub use points::{to_points_value, Award, AwardContext, PointsManager};
pub use queue::{UnstakeTicket, WithdrawTicket};
