use serde::Serialize;

use crate::store::fees::FeeStatus;

/// Raw per-subject counts as they come out of the store, before a
/// percentage is attached.
#[derive(Debug, Clone, PartialEq)]
pub struct SubjectCounts {
    pub subject_id: String,
    pub subject_code: Option<String>,
    pub subject_name: Option<String>,
    pub present: i64,
    pub total: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSummary {
    pub subject_id: String,
    pub subject_code: Option<String>,
    pub subject_name: Option<String>,
    pub present: i64,
    pub total: i64,
    pub percentage: i64,
}

/// `round(present / total * 100)`, with an empty record set reading as 0
/// rather than NaN.
pub fn attendance_percentage(present: i64, total: i64) -> i64 {
    if total <= 0 {
        return 0;
    }
    ((present as f64 / total as f64) * 100.0).round() as i64
}

pub fn summarize_subjects(counts: Vec<SubjectCounts>) -> Vec<AttendanceSummary> {
    counts
        .into_iter()
        .map(|c| AttendanceSummary {
            percentage: attendance_percentage(c.present, c.total),
            subject_id: c.subject_id,
            subject_code: c.subject_code,
            subject_name: c.subject_name,
            present: c.present,
            total: c.total,
        })
        .collect()
}

/// Sum of amounts still owed; paid records are excluded.
pub fn total_due<I>(items: I) -> f64
where
    I: IntoIterator<Item = (FeeStatus, f64)>,
{
    items
        .into_iter()
        .filter(|(status, _)| *status != FeeStatus::Paid)
        .map(|(_, amount)| amount)
        .sum()
}

/// Display progress for a fundraising campaign, capped at 100.
pub fn campaign_progress(raised: f64, goal: f64) -> i64 {
    if goal <= 0.0 {
        return 0;
    }
    let pct = ((raised / goal) * 100.0).round() as i64;
    pct.min(100)
}
