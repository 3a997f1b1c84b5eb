//! HTTP-level tests against a local mock RetailCRM.

use crate::{CrmSettings, RetailCrmClient};
use chrono::NaiveDate;
use followup_core::gateway::CrmGateway;
use followup_core::types::CreatedTask;
use followup_core::FollowupError;
use mockito::{Matcher, Server, ServerGuard};

fn client(server: &ServerGuard) -> RetailCrmClient {
    RetailCrmClient::new(CrmSettings::new(server.url(), "secret").with_site("shop")).unwrap()
}

fn auth() -> Vec<Matcher> {
    vec![
        Matcher::UrlEncoded("apiKey".into(), "secret".into()),
        Matcher::UrlEncoded("site".into(), "shop".into()),
    ]
}

const ORDER_JSON: &str = r#"{
    "id": 24420,
    "status": "ne-dozvonilis",
    "orderMethod": "missed-call",
    "managerId": 31,
    "managerComment": "21.08 - no answer\nwrite on whatsapp 6 sept",
    "createdAt": "2025-09-04 18:22:05",
    "delivery": {"code": "self-delivery", "date": "2025-09-05", "data": {"status": "new"}}
}"#;

#[test]
fn get_order_maps_wire_fields() {
    let mut server = Server::new();
    let mut query = auth();
    query.push(Matcher::UrlEncoded("filter[ids][]".into(), "24420".into()));
    let mock = server
        .mock("GET", "/api/v5/orders")
        .match_query(Matcher::AllOf(query))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(format!(r#"{{"success": true, "orders": [{ORDER_JSON}]}}"#))
        .create();

    let order = client(&server).get_order(24420).unwrap();

    mock.assert();
    assert_eq!(order.id, 24420);
    assert_eq!(order.fulfillment_method, "missed-call");
    assert_eq!(order.manager_id, Some(31));
    assert!(order.manager_comment.ends_with("6 sept"));
    assert_eq!(order.delivery_code.as_deref(), Some("self-delivery"));
    assert_eq!(order.delivery_status.as_deref(), Some("new"));
    assert_eq!(order.delivery_date, NaiveDate::from_ymd_opt(2025, 9, 5));
    assert!(order.created_at.is_some());
}

#[test]
fn missing_order_maps_to_order_not_found() {
    let mut server = Server::new();
    server
        .mock("GET", "/api/v5/orders")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"success": true, "orders": []}"#)
        .create();

    let err = client(&server).get_order(1).unwrap_err();
    assert!(matches!(err, FollowupError::OrderNotFound(1)));
}

#[test]
fn status_listing_follows_pagination() {
    let mut server = Server::new();
    let page = |n: &str| {
        Matcher::AllOf(vec![
            Matcher::UrlEncoded("filter[extendedStatus][]".into(), "ozhidaet-oplaty".into()),
            Matcher::UrlEncoded("page".into(), n.into()),
            Matcher::UrlEncoded("limit".into(), "100".into()),
        ])
    };
    let first = server
        .mock("GET", "/api/v5/orders")
        .match_query(page("1"))
        .with_status(200)
        .with_body(
            r#"{"success": true, "orders": [{"id": 1, "status": "ozhidaet-oplaty"}],
                "pagination": {"currentPage": 1, "totalPageCount": 2}}"#,
        )
        .create();
    let second = server
        .mock("GET", "/api/v5/orders")
        .match_query(page("2"))
        .with_status(200)
        .with_body(
            r#"{"success": true, "orders": [{"id": 2, "status": "ozhidaet-oplaty"}],
                "pagination": {"currentPage": 2, "totalPageCount": 2}}"#,
        )
        .create();

    let listing = client(&server)
        .list_orders_by_statuses(&["ozhidaet-oplaty".to_string()])
        .unwrap();

    first.assert();
    second.assert();
    let ids: Vec<u64> = listing.orders.iter().map(|o| o.id).collect();
    assert_eq!(ids, vec![1, 2]);
    assert!(!listing.truncated);
}

#[test]
fn status_listing_past_page_cap_is_flagged() {
    let mut server = Server::new();
    let mock = server
        .mock("GET", "/api/v5/orders")
        .match_query(Matcher::UrlEncoded("page".into(), "1".into()))
        .with_status(200)
        .with_body(
            r#"{"success": true, "orders": [{"id": 1, "status": "ozhidaet-oplaty"}],
                "pagination": {"currentPage": 1, "totalPageCount": 5}}"#,
        )
        .expect(1)
        .create();

    let mut settings = CrmSettings::new(server.url(), "secret");
    settings.max_pages = 1;
    let listing = RetailCrmClient::new(settings)
        .unwrap()
        .list_orders_by_statuses(&["ozhidaet-oplaty".to_string()])
        .unwrap();

    mock.assert();
    assert_eq!(listing.orders.len(), 1);
    assert!(listing.truncated);
}

#[test]
fn recent_orders_are_truncated_to_limit() {
    let mut server = Server::new();
    server
        .mock("GET", "/api/v5/orders")
        .match_query(Matcher::UrlEncoded("limit".into(), "20".into()))
        .with_status(200)
        .with_body(
            r#"{"success": true, "orders": [
                {"id": 3, "status": "new"}, {"id": 2, "status": "new"}, {"id": 1, "status": "new"}
            ]}"#,
        )
        .create();

    let orders = client(&server).list_recent_orders(2).unwrap();
    assert_eq!(orders.len(), 2);
    assert_eq!(orders[0].id, 3);
}

#[test]
fn create_task_posts_json_in_form_field() {
    let mut server = Server::new();
    let mock = server
        .mock("POST", "/api/v5/tasks/create")
        .match_query(Matcher::AllOf(auth()))
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex("task=".into()),
            Matcher::Regex("performerId%22%3A31".into()),
            Matcher::Regex("2025-09-06\\+10%3A00".into()),
        ]))
        .with_status(200)
        .with_body(r#"{"success": true, "id": 555}"#)
        .create();

    let task = CreatedTask {
        action_text: "WhatsApp".into(),
        note: "write about the sofa".into(),
        due: NaiveDate::from_ymd_opt(2025, 9, 6)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap(),
        performer_id: 31,
        order_id: 24420,
    };
    let id = client(&server).create_task(&task).unwrap();

    mock.assert();
    assert_eq!(id, 555);
}

#[test]
fn update_comment_edits_by_id() {
    let mut server = Server::new();
    let mock = server
        .mock("POST", "/api/v5/orders/24420/edit")
        .match_query(Matcher::AllOf(auth()))
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("by".into(), "id".into()),
            Matcher::Regex("managerComment".into()),
        ]))
        .with_status(200)
        .with_body(r#"{"success": true}"#)
        .create();

    client(&server)
        .update_order_comment(24420, "call back 📅")
        .unwrap();
    mock.assert();
}

#[test]
fn rejected_request_carries_crm_message() {
    let mut server = Server::new();
    server
        .mock("POST", "/api/v5/tasks/create")
        .match_query(Matcher::Any)
        .with_status(400)
        .with_body(r#"{"success": false, "errorMsg": "Task is not valid", "errors": {"performerId": "not found"}}"#)
        .create();

    let task = CreatedTask {
        action_text: "Call".into(),
        note: String::new(),
        due: NaiveDate::from_ymd_opt(2025, 9, 6)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap(),
        performer_id: 1,
        order_id: 1,
    };
    let err = client(&server).create_task(&task).unwrap_err().to_string();
    assert!(err.contains("Task is not valid"), "{err}");
    assert!(err.contains("performerId"), "{err}");
}

#[test]
fn server_error_is_reported_with_status() {
    let mut server = Server::new();
    server
        .mock("GET", "/api/v5/orders")
        .match_query(Matcher::Any)
        .with_status(503)
        .with_body("maintenance")
        .create();

    let err = client(&server).list_recent_orders(50).unwrap_err().to_string();
    assert!(err.contains("503"), "{err}");
}
