use std::{sync::Arc, time::Duration};

use actix_web::{
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        StatusCode,
    },
    test, App,
};
use object_store::{memory::InMemory, ObjectStore as _};
use uuid::Uuid;

use crate::{
    auth::issue_token,
    config::test_configuration,
    configure_endpoints,
    media::FakeTools,
    repo::{sled::SledRepo, ArcRepo, CreateVideo, Video, VideoRepo},
    state::State,
    store::object_store::ObjectStore,
    tmp_file::TmpDir,
};

const SECRET: &str = "hunter2";
const BOUNDARY: &str = "tubely-test-boundary";

async fn test_state() -> State<ObjectStore> {
    test_state_with_store(Arc::new(InMemory::new())).await
}

async fn test_state_with_store(inner: Arc<InMemory>) -> State<ObjectStore> {
    State {
        config: test_configuration(SECRET, 1),
        tmp_dir: TmpDir::init(std::env::temp_dir()).await.expect("tmp dir"),
        repo: Arc::new(SledRepo::temporary().expect("repo")),
        store: ObjectStore::new(inner, "https://cdn.example.com/".parse().expect("valid url")),
        tools: Arc::new(FakeTools::default()),
    }
}

fn bearer(user_id: Uuid) -> String {
    let token = issue_token(user_id, SECRET, Duration::from_secs(60)).expect("signed");

    format!("Bearer {token}")
}

/// Builds a multipart body of `video` parts, each with an optional content type
fn multipart_parts(parts: &[(Option<&str>, &str)]) -> (String, String) {
    let mut payload = String::new();

    for (content_type, body) in parts {
        payload.push_str(&format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"video\"; filename=\"clip.mp4\"\r\n"
        ));

        if let Some(content_type) = content_type {
            payload.push_str(&format!("Content-Type: {content_type}\r\n"));
        }

        payload.push_str(&format!("\r\n{body}\r\n"));
    }

    payload.push_str(&format!("--{BOUNDARY}--\r\n"));

    (format!("multipart/form-data; boundary={BOUNDARY}"), payload)
}

fn multipart(content_type: &str, body: &str) -> (String, String) {
    multipart_parts(&[(Some(content_type), body)])
}

async fn tmp_dir_is_empty(tmp_dir: &TmpDir) -> bool {
    let mut entries = tokio::fs::read_dir(tmp_dir.path()).await.expect("readable");

    entries.next_entry().await.expect("readable").is_none()
}

async fn create_draft(repo: &ArcRepo, user_id: Uuid) -> Video {
    repo.create_video(
        user_id,
        CreateVideo {
            title: String::from("boots"),
            description: String::new(),
        },
    )
    .await
    .expect("created")
}

fn upload_request(
    video_id: &str,
    user_id: Uuid,
    content_type: &str,
    body: &str,
) -> test::TestRequest {
    let (header, payload) = multipart(content_type, body);

    post_upload(video_id, header, payload).insert_header((AUTHORIZATION, bearer(user_id)))
}

fn post_upload(video_id: &str, header: String, payload: String) -> test::TestRequest {
    test::TestRequest::post()
        .uri(&format!("/api/video_upload/{video_id}"))
        .insert_header((CONTENT_TYPE, header))
        .set_payload(payload)
}

#[actix_web::test]
async fn create_then_fetch() {
    let state = test_state().await;
    let app = test::init_service(App::new().configure(move |sc| configure_endpoints(sc, state))).await;

    let user_id = Uuid::new_v4();

    let req = test::TestRequest::post()
        .uri("/api/videos")
        .insert_header((AUTHORIZATION, bearer(user_id)))
        .set_json(serde_json::json!({ "title": "boots", "description": "a walk" }))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::CREATED);

    let created: Video = test::read_body_json(res).await;
    assert_eq!(created.user_id, user_id);
    assert_eq!(created.description, "a walk");
    assert!(created.video_url.is_none());

    let req = test::TestRequest::get()
        .uri(&format!("/api/videos/{}", created.id))
        .insert_header((AUTHORIZATION, bearer(user_id)))
        .to_request();
    let fetched: Video = test::call_and_read_body_json(&app, req).await;

    assert_eq!(fetched, created);
}

#[actix_web::test]
async fn upload_then_fetch() {
    let state = test_state().await;
    let repo = state.repo.clone();
    let app = test::init_service(App::new().configure(move |sc| configure_endpoints(sc, state))).await;

    let user_id = Uuid::new_v4();
    let draft = create_draft(&repo, user_id).await;

    let req = upload_request(&draft.id.to_string(), user_id, "video/mp4", "1920x1080").to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);

    let uploaded: Video = test::read_body_json(res).await;
    let url = uploaded.video_url.clone().expect("url recorded");
    assert!(url.starts_with("https://cdn.example.com/landscape/"));

    let req = test::TestRequest::get()
        .uri(&format!("/api/videos/{}", draft.id))
        .insert_header((AUTHORIZATION, bearer(user_id)))
        .to_request();
    let fetched: Video = test::call_and_read_body_json(&app, req).await;

    assert_eq!(fetched.video_url, Some(url));
}

#[actix_web::test]
async fn portrait_upload() {
    let state = test_state().await;
    let repo = state.repo.clone();
    let app = test::init_service(App::new().configure(move |sc| configure_endpoints(sc, state))).await;

    let user_id = Uuid::new_v4();
    let draft = create_draft(&repo, user_id).await;

    let req = upload_request(&draft.id.to_string(), user_id, "video/mp4", "1080x1920").to_request();
    let uploaded: Video = test::call_and_read_body_json(&app, req).await;

    assert!(uploaded
        .video_url
        .expect("url recorded")
        .starts_with("https://cdn.example.com/portrait/"));
}

#[actix_web::test]
async fn upload_without_token_is_unauthorized() {
    let state = test_state().await;
    let app = test::init_service(App::new().configure(move |sc| configure_endpoints(sc, state))).await;

    let (header, payload) = multipart("video/mp4", "1920x1080");
    let req = test::TestRequest::post()
        .uri(&format!("/api/video_upload/{}", Uuid::new_v4()))
        .insert_header((CONTENT_TYPE, header))
        .set_payload(payload)
        .to_request();

    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let body: serde_json::Value = test::read_body_json(res).await;
    assert_eq!(body["code"], "missing-token");
}

#[actix_web::test]
async fn token_signed_with_other_secret_is_unauthorized() {
    let state = test_state().await;
    let app = test::init_service(App::new().configure(move |sc| configure_endpoints(sc, state))).await;

    let token = issue_token(Uuid::new_v4(), "not the secret", Duration::from_secs(60)).expect("signed");
    let req = test::TestRequest::get()
        .uri("/api/videos")
        .insert_header((AUTHORIZATION, format!("Bearer {token}")))
        .to_request();

    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let body: serde_json::Value = test::read_body_json(res).await;
    assert_eq!(body["code"], "invalid-token");
}

#[actix_web::test]
async fn unsupported_content_type_is_bad_request() {
    let state = test_state().await;
    let repo = state.repo.clone();
    let app = test::init_service(App::new().configure(move |sc| configure_endpoints(sc, state))).await;

    let user_id = Uuid::new_v4();
    let draft = create_draft(&repo, user_id).await;

    let req = upload_request(&draft.id.to_string(), user_id, "video/quicktime", "1920x1080").to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let body: serde_json::Value = test::read_body_json(res).await;
    assert_eq!(body["code"], "validate-content-type");
}

#[actix_web::test]
async fn malformed_video_id_is_bad_request() {
    let state = test_state().await;
    let app = test::init_service(App::new().configure(move |sc| configure_endpoints(sc, state))).await;

    let req = upload_request("not-a-uuid", Uuid::new_v4(), "video/mp4", "1920x1080").to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let body: serde_json::Value = test::read_body_json(res).await;
    assert_eq!(body["code"], "invalid-video-id");
}

#[actix_web::test]
async fn unknown_video_is_not_found() {
    let state = test_state().await;
    let app = test::init_service(App::new().configure(move |sc| configure_endpoints(sc, state))).await;

    let req = upload_request(&Uuid::new_v4().to_string(), Uuid::new_v4(), "video/mp4", "1920x1080").to_request();
    let res = test::call_service(&app, req).await;

    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn other_users_video_is_forbidden() {
    let state = test_state().await;
    let repo = state.repo.clone();
    let tmp_dir = state.tmp_dir.clone();
    let app = test::init_service(App::new().configure(move |sc| configure_endpoints(sc, state))).await;

    let owner = Uuid::new_v4();
    let draft = create_draft(&repo, owner).await;

    let intruder = Uuid::new_v4();
    let req = upload_request(&draft.id.to_string(), intruder, "video/mp4", "1920x1080").to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert!(tmp_dir_is_empty(&tmp_dir).await);
    assert_eq!(repo.video(draft.id).await.expect("fetched"), draft);

    let req = test::TestRequest::get()
        .uri(&format!("/api/videos/{}", draft.id))
        .insert_header((AUTHORIZATION, bearer(intruder)))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn malformed_video_id_is_checked_before_token() {
    let state = test_state().await;
    let app = test::init_service(App::new().configure(move |sc| configure_endpoints(sc, state))).await;

    let (header, payload) = multipart("video/mp4", "1920x1080");
    let req = post_upload("not-a-uuid", header, payload).to_request();

    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let body: serde_json::Value = test::read_body_json(res).await;
    assert_eq!(body["code"], "invalid-video-id");
}

#[actix_web::test]
async fn part_without_content_type_is_bad_request() {
    let state = test_state().await;
    let repo = state.repo.clone();
    let tmp_dir = state.tmp_dir.clone();
    let app = test::init_service(App::new().configure(move |sc| configure_endpoints(sc, state))).await;

    let user_id = Uuid::new_v4();
    let draft = create_draft(&repo, user_id).await;

    let (header, payload) = multipart_parts(&[(None, "1920x1080")]);
    let req = post_upload(&draft.id.to_string(), header, payload)
        .insert_header((AUTHORIZATION, bearer(user_id)))
        .to_request();

    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let body: serde_json::Value = test::read_body_json(res).await;
    assert_eq!(body["code"], "validate-content-type");

    assert!(tmp_dir_is_empty(&tmp_dir).await);
    assert_eq!(repo.video(draft.id).await.expect("fetched"), draft);
}

#[actix_web::test]
async fn second_video_part_leaves_record_unchanged() {
    let inner = Arc::new(InMemory::new());
    let state = test_state_with_store(inner.clone()).await;
    let repo = state.repo.clone();
    let tmp_dir = state.tmp_dir.clone();
    let app = test::init_service(App::new().configure(move |sc| configure_endpoints(sc, state))).await;

    let user_id = Uuid::new_v4();
    let draft = create_draft(&repo, user_id).await;

    let (header, payload) = multipart_parts(&[
        (Some("video/mp4"), "1920x1080"),
        (Some("video/mp4"), "1080x1920"),
    ]);
    let req = post_upload(&draft.id.to_string(), header, payload)
        .insert_header((AUTHORIZATION, bearer(user_id)))
        .to_request();

    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // removal of the first part's object runs on a spawned task
    actix_web::rt::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(repo.video(draft.id).await.expect("fetched"), draft);
    assert!(inner
        .list_with_delimiter(None)
        .await
        .expect("listed")
        .common_prefixes
        .is_empty());
    assert!(tmp_dir_is_empty(&tmp_dir).await);
}

#[actix_web::test]
async fn unprobeable_upload_is_bad_request() {
    let state = test_state().await;
    let repo = state.repo.clone();
    let app = test::init_service(App::new().configure(move |sc| configure_endpoints(sc, state))).await;

    let user_id = Uuid::new_v4();
    let draft = create_draft(&repo, user_id).await;

    let req = upload_request(&draft.id.to_string(), user_id, "video/mp4", "audio only").to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let body: serde_json::Value = test::read_body_json(res).await;
    assert_eq!(body["code"], "no-video-stream");
}

#[actix_web::test]
async fn listing_is_scoped_to_caller() {
    let state = test_state().await;
    let repo = state.repo.clone();
    let app = test::init_service(App::new().configure(move |sc| configure_endpoints(sc, state))).await;

    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();

    let first = create_draft(&repo, alice).await;
    create_draft(&repo, bob).await;

    let req = test::TestRequest::get()
        .uri("/api/videos")
        .insert_header((AUTHORIZATION, bearer(alice)))
        .to_request();
    let listed: Vec<Video> = test::call_and_read_body_json(&app, req).await;

    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, first.id);
}

#[actix_web::test]
async fn health_check() {
    let state = test_state().await;
    let app = test::init_service(App::new().configure(move |sc| configure_endpoints(sc, state))).await;

    let req = test::TestRequest::get().uri("/healthz").to_request();
    let res = test::call_service(&app, req).await;

    assert_eq!(res.status(), StatusCode::OK);
}
