//! Early-holder concentration analysis

use crate::core::ledger::HolderLedger;
use crate::models::types::{ConcentrationReport, TransferEvent};

/// Share of all transferred value received by the top holders of the window ledger.
///
/// `total_transferred` covers every supplied event, not only the window.
/// Concentration saturates to 0 when nothing was transferred or the share
/// cannot be represented.
pub fn analyze_concentration(
    events: &[TransferEvent],
    ledger: &HolderLedger,
    top_n: usize,
) -> ConcentrationReport {
    let total_transferred: f64 = events.iter().map(|e| e.value).sum();
    let top_holders = ledger.top(top_n);
    let top_sum: f64 = top_holders.iter().map(|h| h.amount).sum();

    let share = top_sum / total_transferred;
    let concentration = if total_transferred > 0.0 && share.is_finite() {
        (100.0 * share).clamp(0.0, 100.0)
    } else {
        0.0
    };

    ConcentrationReport {
        total_transferred,
        concentration,
        top_holders,
    }
}
