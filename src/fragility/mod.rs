//! Fragility assessment of candidate space reductions.
//!
//! - `schedule`: exponential pace schedules
//! - `risk`: windfall/regret aggregation and the `RiskModel` seam
//! - `pfm`: probability-based weights
//! - `history`: perception time history (bincode archive)
//! - `efm`: entropy-based weights from the history
//! - `decision`: fragility strategies and combination choice

pub mod decision;
pub mod efm;
pub mod history;
pub mod pfm;
pub mod risk;
pub mod schedule;

pub use decision::{new_combo, AdaptiveCheck, BasicCheck, ComboChoice, FragilityDecision, Progress};
pub use efm::EntropyModel;
pub use history::PerceptionHistory;
pub use pfm::PfmModel;
pub use risk::{assess, quant_risk, RiskModel, RiskRecord, RiskTable};
pub use schedule::{calc_exponential, ScheduleParams};
