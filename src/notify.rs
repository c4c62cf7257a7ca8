//! Notification eligibility pass.
//!
//! A pure function over a snapshot of the signed-in user's records decides
//! which conditions merit an alert. Ids are deterministic
//! (`"{uid}-{type}-{relatedId}"`), so the same condition can never produce
//! two entries no matter how often the pass runs; persistence of the
//! drafts is the caller's job (`store::notifications::insert_new`).

use chrono::NaiveDate;
use rusqlite::Connection;

use crate::calc::AttendanceSummary;
use crate::db;
use crate::store::fees::{FeeRecord, FeeStatus};
use crate::store::notifications::NotificationPrefs;

pub const DEFAULT_ATTENDANCE_THRESHOLD: i64 = 75;
pub const DEFAULT_DUE_WINDOW_DAYS: i64 = 3;

pub const SETTING_ATTENDANCE_THRESHOLD: &str = "notify.attendance_threshold";
pub const SETTING_DUE_WINDOW_DAYS: &str = "notify.assignment_due_window_days";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationType {
    FeeDue,
    LowAttendance,
    AssignmentDue,
    ApprovalPending,
}

impl NotificationType {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationType::FeeDue => "fee_due",
            NotificationType::LowAttendance => "low_attendance",
            NotificationType::AssignmentDue => "assignment_due",
            NotificationType::ApprovalPending => "approval_pending",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NotificationDraft {
    pub id: String,
    pub user_uid: String,
    pub ntype: NotificationType,
    pub message: String,
    pub related_id: String,
}

pub struct AssignmentDue {
    pub id: String,
    pub title: String,
    pub due_date: String,
}

pub struct PendingSignup {
    pub uid: String,
    pub name: String,
}

/// Everything the pass is allowed to look at. The caller fills only the
/// slices that apply to the user's role; an empty slice simply yields no
/// notifications of that kind.
pub struct Snapshot {
    pub today: NaiveDate,
    pub attendance_threshold: i64,
    pub due_window_days: i64,
    pub prefs: NotificationPrefs,
    pub fees: Vec<FeeRecord>,
    pub attendance: Vec<AttendanceSummary>,
    pub assignments: Vec<AssignmentDue>,
    pub pending_signups: Vec<PendingSignup>,
}

pub fn deterministic_id(uid: &str, ntype: NotificationType, related_id: &str) -> String {
    format!("{}-{}-{}", uid, ntype.as_str(), related_id)
}

fn draft(
    uid: &str,
    ntype: NotificationType,
    related_id: &str,
    message: String,
) -> NotificationDraft {
    NotificationDraft {
        id: deterministic_id(uid, ntype, related_id),
        user_uid: uid.to_string(),
        ntype,
        message,
        related_id: related_id.to_string(),
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

pub fn eligible_notifications(uid: &str, snap: &Snapshot) -> Vec<NotificationDraft> {
    let mut out = Vec::new();

    if snap.prefs.fee_due {
        for fee in &snap.fees {
            if fee.status == FeeStatus::Paid {
                continue;
            }
            // An unparseable due date still counts as unpaid, just not overdue.
            let overdue = parse_date(&fee.due_date)
                .map(|due| due < snap.today)
                .unwrap_or(false);
            let message = if overdue {
                format!(
                    "Fee \"{}\" of {:.2} was due on {}",
                    fee.title, fee.amount, fee.due_date
                )
            } else {
                format!(
                    "Fee \"{}\" of {:.2} is due on {}",
                    fee.title, fee.amount, fee.due_date
                )
            };
            out.push(draft(uid, NotificationType::FeeDue, &fee.id, message));
        }
    }

    if snap.prefs.low_attendance {
        for summary in &snap.attendance {
            if summary.total > 0 && summary.percentage < snap.attendance_threshold {
                let subject = summary
                    .subject_name
                    .as_deref()
                    .unwrap_or(summary.subject_id.as_str());
                out.push(draft(
                    uid,
                    NotificationType::LowAttendance,
                    &summary.subject_id,
                    format!(
                        "Attendance in {} is {}%, below the required {}%",
                        subject, summary.percentage, snap.attendance_threshold
                    ),
                ));
            }
        }
    }

    if snap.prefs.assignment_due {
        for assignment in &snap.assignments {
            let Some(due) = parse_date(&assignment.due_date) else {
                continue;
            };
            let days_left = (due - snap.today).num_days();
            if (0..=snap.due_window_days).contains(&days_left) {
                out.push(draft(
                    uid,
                    NotificationType::AssignmentDue,
                    &assignment.id,
                    format!(
                        "Assignment \"{}\" is due on {}",
                        assignment.title, assignment.due_date
                    ),
                ));
            }
        }
    }

    if snap.prefs.approval_pending {
        for signup in &snap.pending_signups {
            out.push(draft(
                uid,
                NotificationType::ApprovalPending,
                &signup.uid,
                format!("{} ({}) is awaiting approval", signup.name, signup.uid),
            ));
        }
    }

    out
}

/// Workspace-tunable threshold and lookahead window, with silent fallback
/// to defaults when the stored values are missing or malformed.
pub fn tunables(conn: &Connection) -> (i64, i64) {
    let threshold = db::settings_get_json(conn, SETTING_ATTENDANCE_THRESHOLD)
        .and_then(|v| v.as_i64())
        .unwrap_or(DEFAULT_ATTENDANCE_THRESHOLD);
    let window = db::settings_get_json(conn, SETTING_DUE_WINDOW_DAYS)
        .and_then(|v| v.as_i64())
        .unwrap_or(DEFAULT_DUE_WINDOW_DAYS);
    (threshold, window)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("test date")
    }

    fn fee(id: &str, amount: f64, due: &str, status: FeeStatus) -> FeeRecord {
        FeeRecord {
            id: id.to_string(),
            student_uid: "1AP21CS001".to_string(),
            title: "Tuition".to_string(),
            amount,
            due_date: due.to_string(),
            status,
            paid_at: None,
            version: 1,
            created_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    fn summary(subject_id: &str, present: i64, total: i64, percentage: i64) -> AttendanceSummary {
        AttendanceSummary {
            subject_id: subject_id.to_string(),
            subject_code: Some("DS".to_string()),
            subject_name: Some("Data Structures".to_string()),
            present,
            total,
            percentage,
        }
    }

    fn base_snapshot() -> Snapshot {
        Snapshot {
            today: date("2026-03-10"),
            attendance_threshold: DEFAULT_ATTENDANCE_THRESHOLD,
            due_window_days: DEFAULT_DUE_WINDOW_DAYS,
            prefs: NotificationPrefs::default(),
            fees: Vec::new(),
            attendance: Vec::new(),
            assignments: Vec::new(),
            pending_signups: Vec::new(),
        }
    }

    #[test]
    fn unpaid_fee_notifies_and_paid_fee_does_not() {
        let mut snap = base_snapshot();
        snap.fees = vec![
            fee("f1", 5000.0, "2026-03-20", FeeStatus::Pending),
            fee("f2", 3000.0, "2026-03-01", FeeStatus::Paid),
        ];
        let drafts = eligible_notifications("1AP21CS001", &snap);
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].id, "1AP21CS001-fee_due-f1");
        assert!(drafts[0].message.contains("is due"));
    }

    #[test]
    fn overdue_fee_gets_past_tense_message() {
        let mut snap = base_snapshot();
        snap.fees = vec![fee("f1", 5000.0, "2026-03-01", FeeStatus::Pending)];
        let drafts = eligible_notifications("1AP21CS001", &snap);
        assert_eq!(drafts.len(), 1);
        assert!(drafts[0].message.contains("was due"));
    }

    #[test]
    fn low_attendance_respects_threshold_boundary() {
        let mut snap = base_snapshot();
        snap.attendance = vec![
            summary("s-low", 7, 10, 70),
            summary("s-exact", 3, 4, 75),
            summary("s-empty", 0, 0, 0),
        ];
        let drafts = eligible_notifications("1AP21CS001", &snap);
        // Exactly at threshold is fine; an empty subject has nothing to warn about.
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].related_id, "s-low");
        assert_eq!(drafts[0].ntype, NotificationType::LowAttendance);
    }

    #[test]
    fn assignment_window_includes_today_and_excludes_past_and_far_future() {
        let mut snap = base_snapshot();
        snap.assignments = vec![
            AssignmentDue {
                id: "a-today".to_string(),
                title: "Lab 1".to_string(),
                due_date: "2026-03-10".to_string(),
            },
            AssignmentDue {
                id: "a-edge".to_string(),
                title: "Lab 2".to_string(),
                due_date: "2026-03-13".to_string(),
            },
            AssignmentDue {
                id: "a-late".to_string(),
                title: "Lab 3".to_string(),
                due_date: "2026-03-09".to_string(),
            },
            AssignmentDue {
                id: "a-far".to_string(),
                title: "Lab 4".to_string(),
                due_date: "2026-03-14".to_string(),
            },
        ];
        let drafts = eligible_notifications("1AP21CS001", &snap);
        let ids: Vec<&str> = drafts.iter().map(|d| d.related_id.as_str()).collect();
        assert_eq!(ids, vec!["a-today", "a-edge"]);
    }

    #[test]
    fn generation_is_deterministic() {
        let mut snap = base_snapshot();
        snap.fees = vec![fee("f1", 5000.0, "2026-03-20", FeeStatus::Pending)];
        snap.attendance = vec![summary("s1", 1, 3, 33)];
        let first = eligible_notifications("1AP21CS001", &snap);
        let second = eligible_notifications("1AP21CS001", &snap);
        assert_eq!(first, second);
    }

    #[test]
    fn drafts_carry_only_the_requesting_uid() {
        let mut snap = base_snapshot();
        snap.fees = vec![fee("f1", 5000.0, "2026-03-20", FeeStatus::Pending)];
        snap.pending_signups = vec![PendingSignup {
            uid: "1AP21CS042".to_string(),
            name: "Someone Else".to_string(),
        }];
        for d in eligible_notifications("admin", &snap) {
            assert_eq!(d.user_uid, "admin");
        }
    }

    #[test]
    fn disabled_preference_suppresses_that_type_only() {
        let mut snap = base_snapshot();
        snap.prefs.fee_due = false;
        snap.fees = vec![fee("f1", 5000.0, "2026-03-20", FeeStatus::Pending)];
        snap.attendance = vec![summary("s1", 1, 3, 33)];
        let drafts = eligible_notifications("1AP21CS001", &snap);
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].ntype, NotificationType::LowAttendance);
    }

    #[test]
    fn malformed_assignment_date_is_skipped() {
        let mut snap = base_snapshot();
        snap.assignments = vec![AssignmentDue {
            id: "a-bad".to_string(),
            title: "Lab".to_string(),
            due_date: "soon".to_string(),
        }];
        assert!(eligible_notifications("1AP21CS001", &snap).is_empty());
    }
}
