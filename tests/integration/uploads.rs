use axum::body::Body;
use axum::http::{header, Request};
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::common::{ONE_PIXEL_PNG, TestApp, multipart_body, routes, sales_workbook};

mod upload {
    use super::*;

    #[tokio::test]
    async fn three_row_sheet_is_parsed_into_columns() {
        let app = TestApp::spawn().await;
        let (token, _) = app.register("Alice", "alice@example.com", "secret").await;

        let res = app.upload_with_token("sales.xlsx", sales_workbook(), &token).await;

        assert_eq!(res.status, 201, "{}", res.text);
        assert_eq!(res.body["row_count"], 3);
        assert_eq!(res.body["original_filename"], "sales.xlsx");
        assert_eq!(res.body["columns"][0]["header"], "Month");
        assert_eq!(res.body["columns"][1]["header"], "Sales");
        assert_eq!(res.body["columns"][1]["values"].as_array().unwrap().len(), 3);
        assert_eq!(res.body["columns"][0]["values"][0], "Jan");
        assert_eq!(res.body["columns"][1]["values"][0], 100);
        assert_eq!(res.body["columns"][1]["values"][1], 150.5);
        assert_eq!(res.body["chart_configs"], json!([]));
        assert!(res.body["ai_summary"].is_null());
        assert_eq!(app.stored_files(), 1);
    }

    #[tokio::test]
    async fn oversized_file_is_rejected_before_storing() {
        let workbook = sales_workbook();
        let app = TestApp::spawn_with_upload_limit(workbook.len() - 1).await;
        let (token, _) = app.register("Alice", "alice@example.com", "secret").await;

        let res = app.upload_with_token("sales.xlsx", workbook, &token).await;

        assert_eq!(res.status, 400, "{}", res.text);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
        assert!(res.body["error"].as_str().unwrap().contains("size"));
        assert_eq!(app.stored_files(), 0);
    }

    #[tokio::test]
    async fn body_over_the_transport_limit_is_a_validation_error() {
        let app = TestApp::spawn_with_upload_limit(1024).await;
        let (token, _) = app.register("Alice", "alice@example.com", "secret").await;

        // exceeds the limit plus the 1 MiB multipart allowance
        let (content_type, body) = multipart_body("big.xlsx", &vec![0u8; 1024 * 1024 + 64 * 1024]);
        let request = Request::post(routes::UPLOADS)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(body))
            .unwrap();

        let res = app.router.clone().oneshot(request).await.unwrap();

        assert_eq!(res.status().as_u16(), 400);
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["code"], "VALIDATION_ERROR");
        assert!(body["error"].as_str().unwrap().contains("size"));
        assert_eq!(app.stored_files(), 0);
    }

    #[tokio::test]
    async fn file_at_the_limit_is_accepted() {
        let workbook = sales_workbook();
        let app = TestApp::spawn_with_upload_limit(workbook.len()).await;
        let (token, _) = app.register("Alice", "alice@example.com", "secret").await;

        let res = app.upload_with_token("sales.xlsx", workbook, &token).await;

        assert_eq!(res.status, 201, "{}", res.text);
        assert_eq!(app.stored_files(), 1);
    }

    #[tokio::test]
    async fn unsupported_extension_is_rejected_before_storing() {
        let app = TestApp::spawn().await;
        let (token, _) = app.register("Alice", "alice@example.com", "secret").await;

        let res = app.upload_with_token("sales.csv", sales_workbook(), &token).await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
        assert_eq!(app.stored_files(), 0);
    }

    #[tokio::test]
    async fn corrupt_workbook_is_a_parse_error_and_leaves_no_file() {
        let app = TestApp::spawn().await;
        let (token, _) = app.register("Alice", "alice@example.com", "secret").await;

        let res = app
            .upload_with_token("broken.xlsx", b"definitely not a zip".to_vec(), &token)
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "PARSE_ERROR");
        assert_eq!(app.stored_files(), 0);
    }

    #[tokio::test]
    async fn missing_file_field_is_rejected() {
        let app = TestApp::spawn().await;
        let (token, _) = app.register("Alice", "alice@example.com", "secret").await;

        let form = reqwest::multipart::Form::new().text("note", "no file here");
        let res = app
            .client
            .post(format!("http://{}{}", app.addr, routes::UPLOADS))
            .bearer_auth(&token)
            .multipart(form)
            .send()
            .await
            .unwrap();

        assert_eq!(res.status().as_u16(), 400);
    }

    #[tokio::test]
    async fn uploading_requires_a_token() {
        let app = TestApp::spawn().await;

        let res = app.upload_with_token("sales.xlsx", sales_workbook(), "").await;

        assert_eq!(res.status, 401);
    }
}

mod fetch {
    use super::*;

    #[tokio::test]
    async fn list_is_newest_first_and_scoped_to_the_owner() {
        let app = TestApp::spawn().await;
        let (alice, _) = app.register("Alice", "alice@example.com", "secret").await;
        let (bob, _) = app.register("Bob", "bob@example.com", "secret").await;

        let first = app.upload_sales(&alice).await;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = app.upload_sales(&alice).await;

        let res = app.get_with_token(routes::UPLOADS, &alice).await;
        assert_eq!(res.status, 200);
        let ids: Vec<&str> = res
            .body
            .as_array()
            .unwrap()
            .iter()
            .map(|u| u["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec![second.as_str(), first.as_str()]);

        let res = app.get_with_token(routes::UPLOADS, &bob).await;
        assert_eq!(res.body, json!([]));
    }

    #[tokio::test]
    async fn foreign_upload_is_indistinguishable_from_a_missing_one() {
        let app = TestApp::spawn().await;
        let (alice, _) = app.register("Alice", "alice@example.com", "secret").await;
        let (bob, _) = app.register("Bob", "bob@example.com", "secret").await;
        let id = app.upload_sales(&alice).await;

        let own = app.get_with_token(&routes::upload(&id), &alice).await;
        assert_eq!(own.status, 200);

        let foreign = app.get_with_token(&routes::upload(&id), &bob).await;
        let missing = app
            .get_with_token(&routes::upload(&uuid::Uuid::new_v4().to_string()), &bob)
            .await;
        let malformed = app.get_with_token(&routes::upload("nope"), &bob).await;

        for res in [&foreign, &missing, &malformed] {
            assert_eq!(res.status, 404);
            assert_eq!(res.body["code"], "NOT_FOUND");
        }
        assert_eq!(foreign.body, missing.body);
    }
}

mod chart_config {
    use super::*;

    #[tokio::test]
    async fn saved_config_defaults_its_title() {
        let app = TestApp::spawn().await;
        let (token, _) = app.register("Alice", "alice@example.com", "secret").await;
        let id = app.upload_sales(&token).await;

        let res = app
            .post_with_token(
                &routes::upload_config(&id),
                &json!({"x_axis": "Month", "y_axis": "Sales", "chart_type": "bar"}),
                &token,
            )
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["chart_config"]["title"], "Chart");
        assert!(res.body["ai_summary"].is_null());

        let upload = app.get_with_token(&routes::upload(&id), &token).await;
        let configs = upload.body["chart_configs"].as_array().unwrap();
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0]["x_axis"], "Month");
        assert_eq!(configs[0]["y_axis"], "Sales");
        assert_eq!(configs[0]["chart_type"], "bar");
        assert_eq!(configs[0]["title"], "Chart");
    }

    #[tokio::test]
    async fn unknown_column_or_chart_type_is_rejected() {
        let app = TestApp::spawn().await;
        let (token, _) = app.register("Alice", "alice@example.com", "secret").await;
        let id = app.upload_sales(&token).await;

        for body in [
            json!({"x_axis": "Month", "y_axis": "Profit", "chart_type": "bar"}),
            json!({"x_axis": "Month", "y_axis": "Sales", "chart_type": "donut"}),
        ] {
            let res = app.post_with_token(&routes::upload_config(&id), &body, &token).await;
            assert_eq!(res.status, 400, "{body} -> {}", res.text);
            assert_eq!(res.body["code"], "VALIDATION_ERROR");
        }

        let upload = app.get_with_token(&routes::upload(&id), &token).await;
        assert_eq!(upload.body["chart_configs"], json!([]));
    }

    #[tokio::test]
    async fn summary_without_a_key_reports_disabled_once() {
        let app = TestApp::spawn().await;
        let (token, _) = app.register("Alice", "alice@example.com", "secret").await;
        let id = app.upload_sales(&token).await;
        let body = json!({
            "x_axis": "Month",
            "y_axis": "Sales",
            "chart_type": "3d_column",
            "title": "Quarter",
            "generate_ai_summary": true
        });

        let first = app.post_with_token(&routes::upload_config(&id), &body, &token).await;
        let second = app.post_with_token(&routes::upload_config(&id), &body, &token).await;

        assert_eq!(first.status, 200, "{}", first.text);
        assert_eq!(
            first.body["ai_summary"],
            "AI summary generation is disabled. No OpenAI API key configured."
        );
        assert_eq!(second.body["ai_summary"], first.body["ai_summary"]);

        let upload = app.get_with_token(&routes::upload(&id), &token).await;
        assert_eq!(upload.body["chart_configs"].as_array().unwrap().len(), 2);
        assert_eq!(upload.body["chart_configs"][1]["title"], "Quarter");
    }

    #[tokio::test]
    async fn foreign_upload_cannot_be_configured() {
        let app = TestApp::spawn().await;
        let (alice, _) = app.register("Alice", "alice@example.com", "secret").await;
        let (bob, _) = app.register("Bob", "bob@example.com", "secret").await;
        let id = app.upload_sales(&alice).await;

        let res = app
            .post_with_token(
                &routes::upload_config(&id),
                &json!({"x_axis": "Month", "y_axis": "Sales", "chart_type": "line"}),
                &bob,
            )
            .await;

        assert_eq!(res.status, 404);
    }
}

mod pdf {
    use super::*;

    #[tokio::test]
    async fn chart_image_is_returned_as_a_pdf_attachment() {
        let app = TestApp::spawn().await;
        let (token, _) = app.register("Alice", "alice@example.com", "secret").await;
        let id = app.upload_sales(&token).await;

        let res = app
            .client
            .post(format!("http://{}{}", app.addr, routes::upload_pdf(&id)))
            .bearer_auth(&token)
            .json(&json!({
                "image": format!("data:image/png;base64,{ONE_PIXEL_PNG}"),
                "title": "Monthly Sales"
            }))
            .send()
            .await
            .unwrap();

        assert_eq!(res.status().as_u16(), 200);
        assert_eq!(res.headers()["content-type"], "application/pdf");
        assert_eq!(
            res.headers()["content-disposition"],
            "attachment; filename=\"Monthly_Sales.pdf\""
        );
        let bytes = res.bytes().await.unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn missing_or_invalid_image_is_rejected() {
        let app = TestApp::spawn().await;
        let (token, _) = app.register("Alice", "alice@example.com", "secret").await;
        let id = app.upload_sales(&token).await;

        for body in [json!({"title": "x"}), json!({"image": "@@@"})] {
            let res = app.post_with_token(&routes::upload_pdf(&id), &body, &token).await;
            assert_eq!(res.status, 400, "{body} -> {}", res.text);
            assert_eq!(res.body["code"], "VALIDATION_ERROR");
        }
    }
}
