//! Dashboard statistics, derived on read.

use serde::Serialize;

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    /// Missions not yet completed
    pub active_missions: i64,
    /// Sum of `peopleNeeded` over completed missions
    pub people_helped: i64,
    pub donations_received: i64,
    /// Distinct devices volunteering on missions not yet completed
    pub volunteers_active: i64,
}
