use once_cell::sync::Lazy;
use reqwest::Client;
use serde::Deserialize;
use std::net::TcpListener;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;

#[derive(Debug, Deserialize)]
struct Overview {
    conducted: u64,
    attended: u64,
    percentage: f64,
    required_for_75: u64,
    band: String,
    subjects: usize,
}

#[derive(Debug, Deserialize)]
struct LectureDto {
    id: u64,
    subject: String,
}

#[derive(Debug, Deserialize)]
struct DayView {
    status: Option<String>,
    lectures: Vec<DayLectureDto>,
}

#[derive(Debug, Deserialize)]
struct DayLectureDto {
    id: u64,
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Projection {
    current_percentage: f64,
    projected_percentage: f64,
    band: String,
    planned_conducted: u64,
    planned_attended: u64,
}

struct TestServer {
    base_url: String,
    child: Child,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

static TEST_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));
static SERVER: Lazy<Mutex<Option<Arc<TestServer>>>> = Lazy::new(|| Mutex::new(None));

#[cfg(unix)]
mod cleanup {
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Once;

    static REGISTER: Once = Once::new();
    static PID: AtomicI32 = AtomicI32::new(0);

    pub fn register(pid: u32) {
        REGISTER.call_once(|| {
            PID.store(pid as i32, Ordering::SeqCst);
            unsafe {
                libc::atexit(on_exit);
            }
        });
    }

    extern "C" fn on_exit() {
        let pid = PID.load(Ordering::SeqCst);
        if pid > 0 {
            unsafe {
                libc::kill(pid, libc::SIGTERM);
            }
        }
    }
}

fn pick_free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind random port");
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

fn unique_data_path() -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let mut path = std::env::temp_dir();
    path.push(format!(
        "attendance_http_{}_{}.json",
        std::process::id(),
        nanos
    ));
    path.to_string_lossy().to_string()
}

async fn wait_until_ready(base_url: &str) {
    let client = Client::new();
    let deadline = Instant::now() + Duration::from_secs(3);
    loop {
        if let Ok(resp) = client.get(format!("{base_url}/api/overview")).send().await {
            if resp.status().is_success() {
                return;
            }
        }
        if Instant::now() > deadline {
            panic!("server did not become ready");
        }
        sleep(Duration::from_millis(100)).await;
    }
}

async fn spawn_server() -> TestServer {
    let port = pick_free_port();
    let data_path = unique_data_path();
    let child = Command::new(env!("CARGO_BIN_EXE_attendance_app"))
        .env("PORT", port.to_string())
        .env("APP_DATA_PATH", data_path)
        .env("RUST_LOG", "info")
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .expect("failed to spawn server");

    #[cfg(unix)]
    cleanup::register(child.id());

    let base_url = format!("http://127.0.0.1:{port}");
    wait_until_ready(&base_url).await;

    TestServer { base_url, child }
}

async fn shared_server() -> Arc<TestServer> {
    let mut guard = SERVER.lock().await;
    if let Some(server) = guard.as_ref() {
        return Arc::clone(server);
    }
    let server = Arc::new(spawn_server().await);
    *guard = Some(Arc::clone(&server));
    server
}

async fn get_overview(client: &Client, base_url: &str) -> Overview {
    client
        .get(format!("{base_url}/api/overview"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

async fn add_lecture(client: &Client, base_url: &str, day: &str, subject: &str) -> LectureDto {
    let response = client
        .post(format!("{base_url}/api/timetable/lectures"))
        .json(&serde_json::json!({ "day": day, "subject": subject }))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
    response.json().await.unwrap()
}

#[tokio::test]
async fn http_marking_attendance_moves_the_overview() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let lecture = add_lecture(&client, &server.base_url, "Monday", "OS").await;
    assert_eq!(lecture.subject, "OS");

    let before = get_overview(&client, &server.base_url).await;

    // 2026-03-02 is a Monday.
    let response = client
        .post(format!("{}/api/attendance/mark", server.base_url))
        .json(&serde_json::json!({
            "date": "2026-03-02",
            "lecture_id": lecture.id,
            "status": "attended"
        }))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());

    let after = get_overview(&client, &server.base_url).await;
    assert_eq!(after.conducted, before.conducted + 1);
    assert_eq!(after.attended, before.attended + 1);
    assert!(after.subjects >= 1);
    assert!(!after.band.is_empty());
    assert!(after.attended <= after.conducted);
}

#[tokio::test]
async fn http_not_conducted_marks_change_nothing() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let lecture = add_lecture(&client, &server.base_url, "Tuesday", "DBMS").await;
    let before = get_overview(&client, &server.base_url).await;

    // 2026-03-03 is a Tuesday.
    let response = client
        .post(format!("{}/api/attendance/mark", server.base_url))
        .json(&serde_json::json!({
            "date": "2026-03-03",
            "lecture_id": lecture.id,
            "status": "not-conducted"
        }))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());

    let after = get_overview(&client, &server.base_url).await;
    assert_eq!(after.conducted, before.conducted);
    assert_eq!(after.attended, before.attended);
    assert_eq!(after.percentage, before.percentage);
    assert_eq!(after.required_for_75, before.required_for_75);
}

#[tokio::test]
async fn http_marking_an_unscheduled_lecture_is_404() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let response = client
        .post(format!("{}/api/attendance/mark", server.base_url))
        .json(&serde_json::json!({
            "date": "2026-03-02",
            "lecture_id": 1,
            "status": "attended"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn http_timetable_export_import_round_trips() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    add_lecture(&client, &server.base_url, "Friday", "Networks").await;

    let exported: serde_json::Value = client
        .get(format!("{}/api/timetable/export", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let response = client
        .post(format!("{}/api/timetable/import", server.base_url))
        .json(&exported)
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());

    let re_exported: serde_json::Value = client
        .get(format!("{}/api/timetable/export", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(exported, re_exported);
}

#[tokio::test]
async fn http_initial_attendance_rejects_inverted_tallies() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let response = client
        .put(format!("{}/api/initial-attendance", server.base_url))
        .json(&serde_json::json!({
            "OS (Lecture)": { "conducted": 3, "attended": 5 }
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    let message = response.text().await.unwrap();
    assert!(message.contains("OS (Lecture)"));
}

#[tokio::test]
async fn http_day_view_reports_mixed_status() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    // Replace Wednesday wholesale with two fresh lectures.
    let response = client
        .put(format!("{}/api/timetable/days/Wednesday", server.base_url))
        .json(&serde_json::json!([
            { "subject": "Maths" },
            { "subject": "Maths", "type": "Lab" }
        ]))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
    let column: Vec<LectureDto> = response.json().await.unwrap();
    assert_eq!(column.len(), 2);

    // 2026-03-04 is a Wednesday; mark only the first lecture.
    let response = client
        .post(format!("{}/api/attendance/mark", server.base_url))
        .json(&serde_json::json!({
            "date": "2026-03-04",
            "lecture_id": column[0].id,
            "status": "attended"
        }))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());

    let day: DayView = client
        .get(format!("{}/api/days/2026-03-04", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(day.status.as_deref(), Some("mixed"));
    assert_eq!(day.lectures.len(), 2);
    let marked = day
        .lectures
        .iter()
        .find(|lecture| lecture.id == column[0].id)
        .unwrap();
    assert_eq!(marked.status.as_deref(), Some("attended"));
}

#[tokio::test]
async fn http_planner_cycles_and_projects() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let lecture = add_lecture(&client, &server.base_url, "Thursday", "Compilers").await;

    let cleared: Projection = client
        .post(format!("{}/api/plan/clear", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(cleared.planned_conducted, 0);
    assert_eq!(cleared.projected_percentage, cleared.current_percentage);

    // First toggle lands on "attended".
    let projection: Projection = client
        .post(format!("{}/api/plan/toggle", server.base_url))
        .json(&serde_json::json!({ "day": "Thursday", "lecture_id": lecture.id }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(projection.planned_conducted, 1);
    assert_eq!(projection.planned_attended, 1);
    assert!(!projection.band.is_empty());

    let fetched: Projection = client
        .get(format!("{}/api/plan/projection", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched.planned_conducted, projection.planned_conducted);
    assert_eq!(fetched.projected_percentage, projection.projected_percentage);

    // Three more toggles walk absent -> not-conducted -> cleared.
    for _ in 0..3 {
        client
            .post(format!("{}/api/plan/toggle", server.base_url))
            .json(&serde_json::json!({ "day": "Thursday", "lecture_id": lecture.id }))
            .send()
            .await
            .unwrap();
    }
    let back: Projection = client
        .get(format!("{}/api/plan/projection", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(back.planned_conducted, 0);
    assert_eq!(back.planned_attended, 0);
}
