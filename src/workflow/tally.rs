use std::collections::HashSet;

use super::model::{AttendanceRow, AttendanceStatus, AttendanceTally, MarksRow, MarksTally, RosterEntry};

/// 1-decimal rounding used for displayed averages: `floor(10*x + 0.5) / 10`.
pub fn round_off_1_decimal(x: f64) -> f64 {
    ((10.0 * x) + 0.5).floor() / 10.0
}

fn roster_ids(roster: &[RosterEntry]) -> HashSet<&str> {
    roster.iter().map(|e| e.student_id.as_str()).collect()
}

/// Counts statuses over the stored rows; roster members without a row are
/// `unmarked`. Rows for students no longer on the roster are not counted.
pub fn attendance_tally<'a, I>(rows: I, roster: &[RosterEntry]) -> AttendanceTally
where
    I: IntoIterator<Item = &'a AttendanceRow>,
{
    let mut out = AttendanceTally::default();
    let on_roster = roster_ids(roster);
    let mut seen: HashSet<&str> = HashSet::new();

    for row in rows.into_iter().filter(|r| on_roster.contains(r.student_id.as_str())) {
        seen.insert(row.student_id.as_str());
        match row.status {
            AttendanceStatus::Present => out.present += 1,
            AttendanceStatus::Absent => out.absent += 1,
            AttendanceStatus::Late => out.late += 1,
            AttendanceStatus::Excused => out.excused += 1,
        }
    }
    out.unmarked = roster
        .iter()
        .filter(|e| !seen.contains(e.student_id.as_str()))
        .count();
    out.total = out.present + out.absent + out.late + out.excused + out.unmarked;
    out
}

pub fn marks_tally<'a, I>(rows: I, roster: &[RosterEntry], max_marks: f64) -> MarksTally
where
    I: IntoIterator<Item = &'a MarksRow>,
{
    let mut graded: usize = 0;
    let mut blank_rows: usize = 0;
    let mut sum: f64 = 0.0;
    let mut highest: Option<f64> = None;
    let mut lowest: Option<f64> = None;
    let on_roster = roster_ids(roster);
    let mut seen: HashSet<&str> = HashSet::new();

    for row in rows.into_iter().filter(|r| on_roster.contains(r.student_id.as_str())) {
        seen.insert(row.student_id.as_str());
        match row.marks {
            Some(v) => {
                graded += 1;
                sum += v;
                highest = Some(highest.map_or(v, |h| h.max(v)));
                lowest = Some(lowest.map_or(v, |l| l.min(v)));
            }
            None => blank_rows += 1,
        }
    }
    let missing = roster
        .iter()
        .filter(|e| !seen.contains(e.student_id.as_str()))
        .count();

    let average = if graded > 0 {
        Some(sum / graded as f64)
    } else {
        None
    };
    let average_percent = average
        .filter(|_| max_marks > 0.0)
        .map(|a| round_off_1_decimal(a / max_marks * 100.0));

    MarksTally {
        graded,
        blank: blank_rows + missing,
        total: graded + blank_rows + missing,
        sum,
        average: average.map(round_off_1_decimal),
        highest,
        lowest,
        max_marks,
        average_percent,
    }
}
