use crate::models::{
    AppData, AttendanceStatus, DateStatus, Day, FuturePlan, Lecture, LectureId, OverallBand,
    ProjectionBand, RecordKey, SubjectTally, Totals,
};
use chrono::{Datelike, Duration, NaiveDate};
use std::collections::{BTreeMap, BTreeSet};

/// Percentages are reported to two decimal places everywhere.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn percentage(conducted: u64, attended: u64) -> f64 {
    if conducted == 0 {
        0.0
    } else {
        round2(attended as f64 / conducted as f64 * 100.0)
    }
}

/// Overall tally: initial per-subject counts seeded first, then every dated
/// record that is not `not-conducted`. A `not-conducted` record counts toward
/// neither the numerator nor the denominator.
pub fn overall_stats(data: &AppData) -> Totals {
    let mut conducted = 0u64;
    let mut attended = 0u64;

    for tally in data.initial_attendance.values() {
        conducted += tally.conducted;
        attended += tally.attended;
    }

    for status in data.attendance.values() {
        if *status != AttendanceStatus::NotConducted {
            conducted += 1;
            if *status == AttendanceStatus::Attended {
                attended += 1;
            }
        }
    }

    Totals {
        conducted,
        attended,
        percentage: percentage(conducted, attended),
    }
}

/// Additional attended lectures needed to reach 75 %, holding `conducted`
/// fixed. Attending a lecture also conducts one, so this is a deliberate
/// approximation rather than an exact bound; it is kept as-is for parity
/// with how the number has always been shown.
pub fn required_for_75(conducted: u64, attended: u64) -> u64 {
    (conducted * 3).div_ceil(4).saturating_sub(attended)
}

/// All lectures scheduled on `date`: the weekday's timetable column (empty
/// on Sundays) followed by the date's extra lectures.
pub fn lectures_on(data: &AppData, date: NaiveDate) -> Vec<&Lecture> {
    let mut lectures: Vec<&Lecture> = Vec::new();
    if let Some(day) = Day::from_date(date) {
        if let Some(column) = data.timetable.get(&day) {
            lectures.extend(column.iter());
        }
    }
    if let Some(extras) = data.extra_lectures.get(&date) {
        lectures.extend(extras.iter());
    }
    lectures
}

/// Aggregate status of one calendar date, `None` when nothing is scheduled.
/// The checks run in priority order: unmarked-only, attended-only,
/// absent-only, all-not-conducted, then mixed.
pub fn date_status(data: &AppData, date: NaiveDate) -> Option<DateStatus> {
    let lectures = lectures_on(data, date);
    if lectures.is_empty() {
        return None;
    }

    let mut attended = 0usize;
    let mut absent = 0usize;
    let mut nc = 0usize;
    let mut unmarked = 0usize;
    for lecture in &lectures {
        let key = RecordKey {
            date,
            lecture: lecture.id,
        };
        match data.attendance.get(&key) {
            Some(AttendanceStatus::Attended) => attended += 1,
            Some(AttendanceStatus::Absent) => absent += 1,
            Some(AttendanceStatus::NotConducted) => nc += 1,
            None => unmarked += 1,
        }
    }

    if unmarked > 0 && attended + absent + nc == 0 {
        return Some(DateStatus::Unmarked);
    }
    if attended > 0 && absent == 0 && unmarked == 0 {
        return Some(DateStatus::Attended);
    }
    if absent > 0 && attended == 0 && unmarked == 0 {
        return Some(DateStatus::Absent);
    }
    if nc == lectures.len() {
        return Some(DateStatus::NotConducted);
    }
    Some(DateStatus::Mixed)
}

/// Resolve a lecture by id, searching the timetable first and the extra
/// lectures second. Ids are unique across both.
pub fn find_lecture(data: &AppData, id: LectureId) -> Option<&Lecture> {
    data.timetable
        .values()
        .flatten()
        .find(|lecture| lecture.id == id)
        .or_else(|| {
            data.extra_lectures
                .values()
                .flatten()
                .find(|lecture| lecture.id == id)
        })
}

/// Per-subject totals keyed by display name. The result is the union of
/// initial-attendance subjects (seeded with their tallies), every subject in
/// the timetable (zero-seeded), and the accrual of every dated record whose
/// lecture still resolves.
pub fn subject_breakdown(data: &AppData) -> BTreeMap<String, Totals> {
    let mut tallies: BTreeMap<String, SubjectTally> = BTreeMap::new();

    for (name, tally) in &data.initial_attendance {
        let entry = tallies.entry(name.clone()).or_default();
        entry.conducted += tally.conducted;
        entry.attended += tally.attended;
    }

    for lecture in data.timetable.values().flatten() {
        tallies.entry(lecture.display_name()).or_default();
    }

    for (key, status) in &data.attendance {
        if *status == AttendanceStatus::NotConducted {
            continue;
        }
        // Records whose lecture was since deleted drop out of the breakdown
        // (they still count in the overall tally).
        let Some(lecture) = find_lecture(data, key.lecture) else {
            continue;
        };
        let entry = tallies.entry(lecture.display_name()).or_default();
        entry.conducted += 1;
        if *status == AttendanceStatus::Attended {
            entry.attended += 1;
        }
    }

    tallies
        .into_iter()
        .map(|(name, tally)| {
            let totals = Totals {
                conducted: tally.conducted,
                attended: tally.attended,
                percentage: percentage(tally.conducted, tally.attended),
            };
            (name, totals)
        })
        .collect()
}

/// Number of distinct subjects known to the tracker.
pub fn subject_count(data: &AppData) -> usize {
    let mut names: BTreeSet<String> = data.initial_attendance.keys().cloned().collect();
    for lecture in data.timetable.values().flatten() {
        names.insert(lecture.display_name());
    }
    names.len()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    pub current: Totals,
    pub planned_conducted: u64,
    pub planned_attended: u64,
    pub projected_percentage: f64,
}

/// Simulate the hypothetical planner marks on top of the current tally. Plan
/// entries accrue exactly like dated records; when nothing would have been
/// conducted at all, the projection falls back to the current percentage.
pub fn project_future(data: &AppData, plan: &FuturePlan) -> Projection {
    let current = overall_stats(data);

    let mut planned_conducted = 0u64;
    let mut planned_attended = 0u64;
    for status in plan.values() {
        if *status != AttendanceStatus::NotConducted {
            planned_conducted += 1;
            if *status == AttendanceStatus::Attended {
                planned_attended += 1;
            }
        }
    }

    let total = current.conducted + planned_conducted;
    let projected_percentage = if total == 0 {
        current.percentage
    } else {
        percentage(total, current.attended + planned_attended)
    };

    Projection {
        current,
        planned_conducted,
        planned_attended,
        projected_percentage,
    }
}

/// Dashboard alert cutoffs: 75 and 65.
pub fn overall_band(pct: f64) -> OverallBand {
    if pct >= 75.0 {
        OverallBand::Good
    } else if pct >= 65.0 {
        OverallBand::Warning
    } else {
        OverallBand::Critical
    }
}

/// Projection banner (and subject card) cutoffs: 80 and 75. Not the same
/// scheme as [`overall_band`]; the two surfaces have always differed.
pub fn projection_band(pct: f64) -> ProjectionBand {
    if pct >= 80.0 {
        ProjectionBand::Good
    } else if pct >= 75.0 {
        ProjectionBand::Caution
    } else {
        ProjectionBand::Risk
    }
}

/// Sunday that starts the week containing `date`, matching the calendar
/// strip's week layout.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_sunday() as i64)
}
