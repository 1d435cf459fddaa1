use axum::http::StatusCode;
use axum_test::TestServer;
use chrono::Utc;
use shot_ledger::api::create_router_with_security;
use shot_ledger::api::middleware::SecurityConfig;
use shot_ledger::db::Database;
use shot_ledger::models::*;

fn setup_with_db() -> (TestServer, Database) {
    let db = Database::open_memory().expect("Failed to create database");
    db.migrate().expect("Failed to migrate");
    let app = create_router_with_security(db.clone(), SecurityConfig::disabled());
    (TestServer::new(app).expect("Failed to create test server"), db)
}

fn setup() -> TestServer {
    setup_with_db().0
}

async fn create_test_shot(server: &TestServer) -> Record {
    server
        .post("/api/v1/records")
        .json(
            &NewRecord::new(SHOT_ENTITY, "shot042")
                .field("cut_in", 1001)
                .field("cut_out", 1100)
                .field("status", "ip"),
        )
        .await
        .json::<Record>()
}

mod health {
    use super::*;

    #[tokio::test]
    async fn reports_ok() {
        let server = setup();

        let response = server.get("/api/v1/health").await;

        response.assert_status_ok();
        response.assert_json(&serde_json::json!({ "status": "ok" }));
    }
}

mod records {
    use super::*;

    #[tokio::test]
    async fn creates_a_record() {
        let server = setup();

        let response = server
            .post("/api/v1/records")
            .json(&NewRecord::new(SHOT_ENTITY, "shot042").field("cut_in", 1001))
            .await;

        response.assert_status(StatusCode::CREATED);
        let record: Record = response.json();
        assert_eq!(record.code, "shot042");
        assert_eq!(record.get_i64("cut_in"), Some(1001));
    }

    #[tokio::test]
    async fn rejects_a_record_without_code() {
        let server = setup();

        let response = server
            .post("/api/v1/records")
            .json(&NewRecord::new(SHOT_ENTITY, ""))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn reads_only_requested_fields() {
        let server = setup();
        create_test_shot(&server).await;

        let response = server
            .get("/api/v1/records/Shot/shot042")
            .add_query_param("fields", "cut_in,cut_out")
            .await;

        response.assert_status_ok();
        let record: Record = response.json();
        assert_eq!(record.get_i64("cut_in"), Some(1001));
        assert_eq!(record.get_i64("cut_out"), Some(1100));
        assert!(record.get_str("status").is_none());
    }

    #[tokio::test]
    async fn returns_not_found_for_unknown_code() {
        let server = setup();

        let response = server.get("/api/v1/records/Shot/shot999").await;

        response.assert_status_not_found();
    }

    #[tokio::test]
    async fn lists_records_of_a_type() {
        let server = setup();
        create_test_shot(&server).await;
        server
            .post("/api/v1/records")
            .json(&NewRecord::new(PUBLISHED_FILE_ENTITY, "shotA_comp"))
            .await;

        let records: Vec<Record> = server.get("/api/v1/records/Shot").await.json();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].entity_type, SHOT_ENTITY);
    }

    #[tokio::test]
    async fn deletes_a_record() {
        let server = setup();
        let shot = create_test_shot(&server).await;

        let response = server
            .delete(&format!("/api/v1/records/Shot/{}", shot.id))
            .await;
        response.assert_status(StatusCode::NO_CONTENT);

        let again = server
            .delete(&format!("/api/v1/records/Shot/{}", shot.id))
            .await;
        again.assert_status_not_found();
    }
}

mod work_items {
    use super::*;

    fn create_test_item(db: &Database) -> WorkItem {
        db.create_work_item(CreateWorkItemInput {
            name: "shotA_comp".to_string(),
            location: "/proj/work/shotA_comp/shotA_comp.v001.nk".to_string(),
        })
        .expect("Failed to create work item")
    }

    #[tokio::test]
    async fn lists_work_items() {
        let (server, db) = setup_with_db();
        create_test_item(&db);

        let items: Vec<WorkItem> = server.get("/api/v1/work-items").await.json();

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].version, 1);
    }

    #[tokio::test]
    async fn returns_history_of_a_work_item() {
        let (server, db) = setup_with_db();
        let item = create_test_item(&db);
        db.create_snapshot(item.id, 1, "/proj/snapshots/a.nk", Utc::now())
            .unwrap();

        let response = server.get("/api/v1/work-items/shotA_comp").await;

        response.assert_status_ok();
        let history: WorkItemHistory = response.json();
        assert_eq!(history.work_item.name, "shotA_comp");
        assert_eq!(history.snapshots.len(), 1);
        assert!(history.publishes.is_empty());
    }

    #[tokio::test]
    async fn lists_snapshots_and_publishes() {
        let (server, db) = setup_with_db();
        let item = create_test_item(&db);
        db.create_snapshot(item.id, 1, "/proj/snapshots/a.nk", Utc::now())
            .unwrap();

        let snapshots: Vec<Snapshot> = server
            .get("/api/v1/work-items/shotA_comp/snapshots")
            .await
            .json();
        let publishes: Vec<Publish> = server
            .get("/api/v1/work-items/shotA_comp/publishes")
            .await
            .json();

        assert_eq!(snapshots.len(), 1);
        assert!(publishes.is_empty());
    }

    #[tokio::test]
    async fn returns_not_found_for_unknown_work_item() {
        let server = setup();

        server
            .get("/api/v1/work-items/missing")
            .await
            .assert_status_not_found();
        server
            .get("/api/v1/work-items/missing/publishes")
            .await
            .assert_status_not_found();
    }
}

mod authentication {
    use super::*;

    fn setup_secured() -> TestServer {
        let db = Database::open_memory().expect("Failed to create database");
        db.migrate().expect("Failed to migrate");
        let app = create_router_with_security(db, SecurityConfig::with_api_key("secret"));
        TestServer::new(app).expect("Failed to create test server")
    }

    #[tokio::test]
    async fn rejects_requests_without_key() {
        let server = setup_secured();

        server
            .get("/api/v1/work-items")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn rejects_wrong_key() {
        let server = setup_secured();

        server
            .get("/api/v1/work-items")
            .authorization_bearer("nope")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn accepts_the_configured_key() {
        let server = setup_secured();

        server
            .get("/api/v1/work-items")
            .authorization_bearer("secret")
            .await
            .assert_status_ok();
    }

    #[tokio::test]
    async fn leaves_health_open() {
        let server = setup_secured();

        server.get("/api/v1/health").await.assert_status_ok();
    }
}
