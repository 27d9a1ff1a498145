use chrono::{Datelike, NaiveDate, Utc, Weekday};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

/// Weekday column of the timetable. There is no Sunday column; lectures on a
/// Sunday can only come from `extra_lectures`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Day {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
}

impl Day {
    pub const ALL: [Day; 6] = [
        Day::Monday,
        Day::Tuesday,
        Day::Wednesday,
        Day::Thursday,
        Day::Friday,
        Day::Saturday,
    ];

    pub fn from_date(date: NaiveDate) -> Option<Day> {
        match date.weekday() {
            Weekday::Mon => Some(Day::Monday),
            Weekday::Tue => Some(Day::Tuesday),
            Weekday::Wed => Some(Day::Wednesday),
            Weekday::Thu => Some(Day::Thursday),
            Weekday::Fri => Some(Day::Friday),
            Weekday::Sat => Some(Day::Saturday),
            Weekday::Sun => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Day::Monday => "Monday",
            Day::Tuesday => "Tuesday",
            Day::Wednesday => "Wednesday",
            Day::Thursday => "Thursday",
            Day::Friday => "Friday",
            Day::Saturday => "Saturday",
        }
    }
}

impl fmt::Display for Day {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Day {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Day::ALL
            .into_iter()
            .find(|day| day.as_str() == s)
            .ok_or_else(|| format!("unknown day: {s}"))
    }
}

/// Unique lecture identifier, derived from the creation timestamp in
/// microseconds and bumped monotonically so two lectures created in the same
/// instant still get distinct ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LectureId(pub u64);

impl LectureId {
    pub fn generate() -> Self {
        static LAST: AtomicU64 = AtomicU64::new(0);
        let now = Utc::now().timestamp_micros().max(0) as u64;
        let mut prev = LAST.load(Ordering::Relaxed);
        loop {
            let next = now.max(prev + 1);
            match LAST.compare_exchange_weak(prev, next, Ordering::Relaxed, Ordering::Relaxed) {
                Ok(_) => return Self(next),
                Err(observed) => prev = observed,
            }
        }
    }
}

impl fmt::Display for LectureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for LectureId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u64>()
            .map(Self)
            .map_err(|err| format!("invalid lecture id {s:?}: {err}"))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LectureKind {
    #[default]
    Lecture,
    Lab,
}

impl fmt::Display for LectureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LectureKind::Lecture => f.write_str("Lecture"),
            LectureKind::Lab => f.write_str("Lab"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lecture {
    pub id: LectureId,
    pub subject: String,
    #[serde(rename = "type", default)]
    pub kind: LectureKind,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_extra: bool,
}

impl Lecture {
    /// Subject identity used in aggregate views: `"OS (Lecture)"` and
    /// `"OS (Lab)"` are distinct subjects.
    pub fn display_name(&self) -> String {
        format!("{} ({})", self.subject, self.kind)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttendanceStatus {
    Attended,
    Absent,
    NotConducted,
}

impl AttendanceStatus {
    /// Planner interaction state machine: `none -> attended -> absent ->
    /// not-conducted -> none`. Dated attendance marks are set directly and
    /// never cycle.
    pub fn cycle(current: Option<Self>) -> Option<Self> {
        match current {
            None => Some(Self::Attended),
            Some(Self::Attended) => Some(Self::Absent),
            Some(Self::Absent) => Some(Self::NotConducted),
            Some(Self::NotConducted) => None,
        }
    }
}

/// Composite key of one dated attendance record, serialized as the string
/// `"YYYY-MM-DD-<id>"` so attendance maps stay plain JSON objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RecordKey {
    pub date: NaiveDate,
    pub lecture: LectureId,
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.date.format("%Y-%m-%d"), self.lecture)
    }
}

impl FromStr for RecordKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (date_part, rest) = s
            .split_at_checked(10)
            .ok_or_else(|| format!("record key too short: {s:?}"))?;
        let date = NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
            .map_err(|err| format!("invalid date in record key {s:?}: {err}"))?;
        let id_part = rest
            .strip_prefix('-')
            .ok_or_else(|| format!("malformed record key: {s:?}"))?;
        Ok(RecordKey {
            date,
            lecture: id_part.parse()?,
        })
    }
}

impl Serialize for RecordKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RecordKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// Key of one hypothetical planner mark, serialized `"<Day>-<id>"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PlanKey {
    pub day: Day,
    pub lecture: LectureId,
}

impl fmt::Display for PlanKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.day, self.lecture)
    }
}

impl FromStr for PlanKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (day_part, id_part) = s
            .split_once('-')
            .ok_or_else(|| format!("malformed plan key: {s:?}"))?;
        Ok(PlanKey {
            day: day_part.parse()?,
            lecture: id_part.parse()?,
        })
    }
}

impl Serialize for PlanKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PlanKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// Historic per-subject tally recorded before date-level tracking started.
/// `attended <= conducted` is enforced when the tally is saved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectTally {
    pub conducted: u64,
    pub attended: u64,
}

pub type Timetable = BTreeMap<Day, Vec<Lecture>>;
pub type Attendance = BTreeMap<RecordKey, AttendanceStatus>;
pub type ExtraLectures = BTreeMap<NaiveDate, Vec<Lecture>>;
pub type InitialAttendance = BTreeMap<String, SubjectTally>;
pub type FuturePlan = BTreeMap<PlanKey, AttendanceStatus>;

/// The persisted unit: everything the tracker knows, as one structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppData {
    #[serde(default)]
    pub timetable: Timetable,
    #[serde(default)]
    pub attendance: Attendance,
    #[serde(default)]
    pub extra_lectures: ExtraLectures,
    #[serde(default)]
    pub initial_attendance: InitialAttendance,
}

// ---- request payloads ----

#[derive(Debug, Deserialize)]
pub struct AddLectureRequest {
    pub day: Day,
    pub subject: String,
    #[serde(rename = "type", default)]
    pub kind: LectureKind,
}

/// One row of the bulk day editor; ids are assigned server-side.
#[derive(Debug, Deserialize)]
pub struct LectureSpec {
    pub subject: String,
    #[serde(rename = "type", default)]
    pub kind: LectureKind,
}

#[derive(Debug, Deserialize)]
pub struct EditLectureRequest {
    pub day: Day,
    pub id: LectureId,
    pub subject: String,
    #[serde(rename = "type", default)]
    pub kind: LectureKind,
}

#[derive(Debug, Deserialize)]
pub struct DeleteLectureRequest {
    pub day: Day,
    pub id: LectureId,
}

#[derive(Debug, Deserialize)]
pub struct MoveLectureRequest {
    pub day: Day,
    pub index: usize,
    /// -1 moves the lecture up, +1 moves it down.
    pub direction: i8,
}

#[derive(Debug, Deserialize)]
pub struct ExtraLectureRequest {
    pub date: NaiveDate,
    pub subject: String,
    #[serde(rename = "type", default)]
    pub kind: LectureKind,
}

#[derive(Debug, Deserialize)]
pub struct MarkAttendanceRequest {
    pub date: NaiveDate,
    pub lecture_id: LectureId,
    /// Omitted status clears the mark back to unmarked.
    #[serde(default)]
    pub status: Option<AttendanceStatus>,
}

#[derive(Debug, Deserialize)]
pub struct PlanToggleRequest {
    pub day: Day,
    pub lecture_id: LectureId,
}

#[derive(Debug, Deserialize)]
pub struct PlanMarkAllRequest {
    pub status: AttendanceStatus,
}

// ---- response payloads ----

/// Aggregate outcome of one calendar date, in evaluation priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DateStatus {
    #[serde(rename = "unmarked")]
    Unmarked,
    #[serde(rename = "attended")]
    Attended,
    #[serde(rename = "absent")]
    Absent,
    #[serde(rename = "nc")]
    NotConducted,
    #[serde(rename = "mixed")]
    Mixed,
}

/// Dashboard alert banding. Deliberately different from [`ProjectionBand`];
/// the two views have always used different cutoffs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallBand {
    Good,
    Warning,
    Critical,
}

/// Future-projection (and per-subject card) banding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectionBand {
    Good,
    Caution,
    Risk,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    pub conducted: u64,
    pub attended: u64,
    pub percentage: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OverviewResponse {
    pub conducted: u64,
    pub attended: u64,
    pub percentage: f64,
    pub required_for_75: u64,
    pub band: OverallBand,
    pub subjects: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubjectStats {
    pub display_name: String,
    pub conducted: u64,
    pub attended: u64,
    pub percentage: f64,
    pub band: ProjectionBand,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubjectsResponse {
    pub subjects: Vec<SubjectStats>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DayLecture {
    pub id: LectureId,
    pub subject: String,
    #[serde(rename = "type")]
    pub kind: LectureKind,
    pub is_extra: bool,
    pub status: Option<AttendanceStatus>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DayResponse {
    pub date: NaiveDate,
    pub day: Option<Day>,
    pub status: Option<DateStatus>,
    pub lectures: Vec<DayLecture>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WeekDayStatus {
    pub date: NaiveDate,
    pub day: String,
    pub status: Option<DateStatus>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WeekResponse {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub days: Vec<WeekDayStatus>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProjectionResponse {
    pub current_percentage: f64,
    pub projected_percentage: f64,
    pub band: ProjectionBand,
    pub planned_conducted: u64,
    pub planned_attended: u64,
}
