use crate::handlers;
use crate::state::AppState;
use axum::{
    routing::{get, post, put},
    Router,
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/overview", get(handlers::get_overview))
        .route("/api/subjects", get(handlers::get_subjects))
        .route("/api/days/:date", get(handlers::get_day))
        .route("/api/weeks/:date", get(handlers::get_week))
        .route("/api/data", get(handlers::get_data).put(handlers::put_data))
        .route(
            "/api/timetable/lectures",
            post(handlers::add_lecture)
                .patch(handlers::edit_lecture)
                .delete(handlers::delete_lecture),
        )
        .route("/api/timetable/days/:day", put(handlers::set_day))
        .route("/api/timetable/move", post(handlers::move_lecture))
        .route("/api/timetable/export", get(handlers::export_timetable))
        .route("/api/timetable/import", post(handlers::import_timetable))
        .route("/api/extra-lectures", post(handlers::add_extra_lecture))
        .route("/api/attendance/mark", post(handlers::mark_attendance))
        .route(
            "/api/initial-attendance",
            put(handlers::put_initial_attendance),
        )
        .route("/api/plan/toggle", post(handlers::plan_toggle))
        .route("/api/plan/mark-all", post(handlers::plan_mark_all))
        .route("/api/plan/clear", post(handlers::plan_clear))
        .route("/api/plan/projection", get(handlers::get_projection))
        .with_state(state)
}
