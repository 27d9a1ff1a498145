use crate::errors::AppError;
use crate::models::{
    AddLectureRequest, AppData, AttendanceStatus, Day, DayLecture, DayResponse,
    DeleteLectureRequest, EditLectureRequest, ExtraLectureRequest, FuturePlan,
    InitialAttendance, Lecture, LectureId, LectureSpec, MarkAttendanceRequest,
    MoveLectureRequest, OverviewResponse,
    PlanKey, PlanMarkAllRequest, PlanToggleRequest, ProjectionResponse, RecordKey,
    SubjectStats, SubjectsResponse, Timetable, WeekDayStatus, WeekResponse,
};
use crate::state::AppState;
use crate::stats;
use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{Duration, NaiveDate};

// ---- timetable ----

pub async fn add_lecture(
    State(state): State<AppState>,
    Json(payload): Json<AddLectureRequest>,
) -> Result<Json<Lecture>, AppError> {
    let subject = payload.subject.trim();
    if subject.is_empty() {
        return Err(AppError::bad_request("subject name must not be empty"));
    }

    let lecture = Lecture {
        id: LectureId::generate(),
        subject: subject.to_string(),
        kind: payload.kind,
        is_extra: false,
    };

    let mut data = state.data.lock().await;
    data.timetable
        .entry(payload.day)
        .or_default()
        .push(lecture.clone());
    drop(data);

    state.schedule_save().await;
    Ok(Json(lecture))
}

/// Replace a day's column wholesale (the bulk editor). Rows without a
/// subject are dropped; at least one must survive.
pub async fn set_day(
    State(state): State<AppState>,
    Path(day): Path<Day>,
    Json(rows): Json<Vec<LectureSpec>>,
) -> Result<Json<Vec<Lecture>>, AppError> {
    let lectures: Vec<Lecture> = rows
        .into_iter()
        .filter(|row| !row.subject.trim().is_empty())
        .map(|row| Lecture {
            id: LectureId::generate(),
            subject: row.subject.trim().to_string(),
            kind: row.kind,
            is_extra: false,
        })
        .collect();

    if lectures.is_empty() {
        return Err(AppError::bad_request(
            "at least one lecture with a subject name is required",
        ));
    }

    let mut data = state.data.lock().await;
    data.timetable.insert(day, lectures.clone());
    drop(data);

    state.schedule_save().await;
    Ok(Json(lectures))
}

pub async fn edit_lecture(
    State(state): State<AppState>,
    Json(payload): Json<EditLectureRequest>,
) -> Result<Json<Lecture>, AppError> {
    let subject = payload.subject.trim();
    if subject.is_empty() {
        return Err(AppError::bad_request("subject name must not be empty"));
    }

    let mut data = state.data.lock().await;
    let lecture = data
        .timetable
        .get_mut(&payload.day)
        .and_then(|column| column.iter_mut().find(|lecture| lecture.id == payload.id))
        .ok_or_else(|| AppError::not_found("no such lecture on that day"))?;
    lecture.subject = subject.to_string();
    lecture.kind = payload.kind;
    let updated = lecture.clone();
    drop(data);

    state.schedule_save().await;
    Ok(Json(updated))
}

pub async fn delete_lecture(
    State(state): State<AppState>,
    Json(payload): Json<DeleteLectureRequest>,
) -> Result<Json<Vec<Lecture>>, AppError> {
    let mut data = state.data.lock().await;
    if let Some(column) = data.timetable.get_mut(&payload.day) {
        column.retain(|lecture| lecture.id != payload.id);
    }
    if data.timetable.get(&payload.day).is_some_and(Vec::is_empty) {
        data.timetable.remove(&payload.day);
    }
    let remaining = data
        .timetable
        .get(&payload.day)
        .cloned()
        .unwrap_or_default();
    drop(data);

    state.schedule_save().await;
    Ok(Json(remaining))
}

/// Swap a lecture with its neighbor within its day. Out-of-range moves are
/// no-ops.
pub async fn move_lecture(
    State(state): State<AppState>,
    Json(payload): Json<MoveLectureRequest>,
) -> Result<Json<Vec<Lecture>>, AppError> {
    let mut data = state.data.lock().await;
    if let Some(column) = data.timetable.get_mut(&payload.day) {
        if payload.index < column.len() {
            let target = payload.index as i64 + payload.direction as i64;
            if target >= 0 && (target as usize) < column.len() {
                column.swap(payload.index, target as usize);
            }
        }
    }
    let column = data
        .timetable
        .get(&payload.day)
        .cloned()
        .unwrap_or_default();
    drop(data);

    state.schedule_save().await;
    Ok(Json(column))
}

pub async fn export_timetable(State(state): State<AppState>) -> Json<Timetable> {
    let data = state.data.lock().await;
    Json(data.timetable.clone())
}

/// Wholesale timetable replacement. Anything that parses as a timetable
/// mapping is accepted; attendance records pointing at vanished lectures
/// simply stop contributing to subject breakdowns.
pub async fn import_timetable(
    State(state): State<AppState>,
    Json(timetable): Json<Timetable>,
) -> Result<Json<Timetable>, AppError> {
    let mut data = state.data.lock().await;
    data.timetable = timetable.clone();
    drop(data);

    state.schedule_save().await;
    Ok(Json(timetable))
}

// ---- extra lectures ----

pub async fn add_extra_lecture(
    State(state): State<AppState>,
    Json(payload): Json<ExtraLectureRequest>,
) -> Result<Json<Lecture>, AppError> {
    let subject = payload.subject.trim();
    if subject.is_empty() {
        return Err(AppError::bad_request("subject name must not be empty"));
    }

    let lecture = Lecture {
        id: LectureId::generate(),
        subject: subject.to_string(),
        kind: payload.kind,
        is_extra: true,
    };

    let mut data = state.data.lock().await;
    data.extra_lectures
        .entry(payload.date)
        .or_default()
        .push(lecture.clone());
    drop(data);

    state.schedule_save().await;
    Ok(Json(lecture))
}

// ---- attendance ----

pub async fn mark_attendance(
    State(state): State<AppState>,
    Json(payload): Json<MarkAttendanceRequest>,
) -> Result<Json<DayResponse>, AppError> {
    let mut data = state.data.lock().await;
    let scheduled = stats::lectures_on(&data, payload.date)
        .iter()
        .any(|lecture| lecture.id == payload.lecture_id);
    if !scheduled {
        return Err(AppError::not_found("no such lecture on that date"));
    }

    let key = RecordKey {
        date: payload.date,
        lecture: payload.lecture_id,
    };
    match payload.status {
        Some(status) => {
            data.attendance.insert(key, status);
        }
        None => {
            data.attendance.remove(&key);
        }
    }
    let response = day_response(&data, payload.date);
    drop(data);

    state.schedule_save().await;
    Ok(Json(response))
}

// ---- initial attendance ----

pub async fn put_initial_attendance(
    State(state): State<AppState>,
    Json(tallies): Json<InitialAttendance>,
) -> Result<Json<OverviewResponse>, AppError> {
    if tallies.is_empty() {
        return Err(AppError::bad_request("add at least one subject"));
    }
    for (display_name, tally) in &tallies {
        if display_name.trim().is_empty() {
            return Err(AppError::bad_request("subject name must not be empty"));
        }
        if tally.attended > tally.conducted {
            return Err(AppError::bad_request(format!(
                "attended cannot exceed conducted for {display_name}"
            )));
        }
    }

    let mut data = state.data.lock().await;
    data.initial_attendance = tallies;
    let response = overview_response(&data);
    drop(data);

    state.schedule_save().await;
    Ok(Json(response))
}

// ---- read surface ----

pub async fn get_overview(State(state): State<AppState>) -> Json<OverviewResponse> {
    let data = state.data.lock().await;
    Json(overview_response(&data))
}

pub async fn get_subjects(State(state): State<AppState>) -> Json<SubjectsResponse> {
    let data = state.data.lock().await;
    let subjects = stats::subject_breakdown(&data)
        .into_iter()
        .map(|(display_name, totals)| SubjectStats {
            display_name,
            conducted: totals.conducted,
            attended: totals.attended,
            percentage: totals.percentage,
            band: stats::projection_band(totals.percentage),
        })
        .collect();
    Json(SubjectsResponse { subjects })
}

pub async fn get_day(
    State(state): State<AppState>,
    Path(date): Path<NaiveDate>,
) -> Json<DayResponse> {
    let data = state.data.lock().await;
    Json(day_response(&data, date))
}

/// Status dots for the Sunday-start week containing the given date.
pub async fn get_week(
    State(state): State<AppState>,
    Path(date): Path<NaiveDate>,
) -> Json<WeekResponse> {
    let data = state.data.lock().await;
    let start = stats::week_start(date);
    let days = (0..7)
        .map(|offset| {
            let date = start + Duration::days(offset);
            WeekDayStatus {
                date,
                day: date.format("%A").to_string(),
                status: stats::date_status(&data, date),
            }
        })
        .collect();
    Json(WeekResponse {
        start,
        end: start + Duration::days(6),
        days,
    })
}

pub async fn get_data(State(state): State<AppState>) -> Json<AppData> {
    let data = state.data.lock().await;
    Json(data.clone())
}

/// Whole-state replacement, the write half of the load/save pair. Last
/// write wins; there is no merging.
pub async fn put_data(
    State(state): State<AppState>,
    Json(new_data): Json<AppData>,
) -> Result<Json<OverviewResponse>, AppError> {
    let mut data = state.data.lock().await;
    *data = new_data;
    let response = overview_response(&data);
    drop(data);

    state.schedule_save().await;
    Ok(Json(response))
}

// ---- future planner ----

pub async fn plan_toggle(
    State(state): State<AppState>,
    Json(payload): Json<PlanToggleRequest>,
) -> Result<Json<ProjectionResponse>, AppError> {
    let data = state.data.lock().await;
    let slot_exists = data
        .timetable
        .get(&payload.day)
        .is_some_and(|column| column.iter().any(|lecture| lecture.id == payload.lecture_id));
    if !slot_exists {
        return Err(AppError::not_found("no such lecture on that day"));
    }

    let key = PlanKey {
        day: payload.day,
        lecture: payload.lecture_id,
    };
    let mut plan = state.plan.lock().await;
    match AttendanceStatus::cycle(plan.get(&key).copied()) {
        Some(next) => {
            plan.insert(key, next);
        }
        None => {
            plan.remove(&key);
        }
    }

    Ok(Json(projection_response(&data, &plan)))
}

pub async fn plan_mark_all(
    State(state): State<AppState>,
    Json(payload): Json<PlanMarkAllRequest>,
) -> Result<Json<ProjectionResponse>, AppError> {
    if payload.status == AttendanceStatus::NotConducted {
        return Err(AppError::bad_request(
            "mark-all only supports attended or absent",
        ));
    }

    let data = state.data.lock().await;
    let mut plan = state.plan.lock().await;
    for (day, column) in &data.timetable {
        for lecture in column {
            plan.insert(
                PlanKey {
                    day: *day,
                    lecture: lecture.id,
                },
                payload.status,
            );
        }
    }

    Ok(Json(projection_response(&data, &plan)))
}

pub async fn plan_clear(State(state): State<AppState>) -> Json<ProjectionResponse> {
    let data = state.data.lock().await;
    let mut plan = state.plan.lock().await;
    plan.clear();
    Json(projection_response(&data, &plan))
}

pub async fn get_projection(State(state): State<AppState>) -> Json<ProjectionResponse> {
    let data = state.data.lock().await;
    let plan = state.plan.lock().await;
    Json(projection_response(&data, &plan))
}

// ---- response assembly ----

fn overview_response(data: &AppData) -> OverviewResponse {
    let totals = stats::overall_stats(data);
    OverviewResponse {
        conducted: totals.conducted,
        attended: totals.attended,
        percentage: totals.percentage,
        required_for_75: stats::required_for_75(totals.conducted, totals.attended),
        band: stats::overall_band(totals.percentage),
        subjects: stats::subject_count(data),
    }
}

fn day_response(data: &AppData, date: NaiveDate) -> DayResponse {
    let lectures = stats::lectures_on(data, date)
        .into_iter()
        .map(|lecture| DayLecture {
            id: lecture.id,
            subject: lecture.subject.clone(),
            kind: lecture.kind,
            is_extra: lecture.is_extra,
            status: data
                .attendance
                .get(&RecordKey {
                    date,
                    lecture: lecture.id,
                })
                .copied(),
        })
        .collect();

    DayResponse {
        date,
        day: Day::from_date(date),
        status: stats::date_status(data, date),
        lectures,
    }
}

fn projection_response(data: &AppData, plan: &FuturePlan) -> ProjectionResponse {
    let projection = stats::project_future(data, plan);
    ProjectionResponse {
        current_percentage: projection.current.percentage,
        projected_percentage: projection.projected_percentage,
        band: stats::projection_band(projection.projected_percentage),
        planned_conducted: projection.planned_conducted,
        planned_attended: projection.planned_attended,
    }
}
