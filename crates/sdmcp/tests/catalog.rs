//! Listing tools and checkpoint switching against a mocked WebUI.

mod common;

use std::time::Duration;

use common::{is_error, result_json, Harness};
use sdmcp::tools::catalog::SetModelArgs;
use serde_json::json;
use wiremock::matchers::{basic_auth, body_json, method, path};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn test_models_are_listed_by_title() {
    let h = Harness::start().await;
    Mock::given(method("GET"))
        .and(path("/sdapi/v1/sd-models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "title": "flux1-dev.safetensors [abc123]", "model_name": "flux1-dev" },
            { "title": "sdxl_base.safetensors", "model_name": "sdxl_base" },
            { "model_name": "untitled" }
        ])))
        .mount(&h.server)
        .await;

    let models = h.service.list_models().await.unwrap();
    assert_eq!(
        models,
        vec!["flux1-dev.safetensors [abc123]", "sdxl_base.safetensors"]
    );
}

#[tokio::test]
async fn test_samplers_and_upscalers_drop_blank_names() {
    let h = Harness::start().await;
    Mock::given(method("GET"))
        .and(path("/sdapi/v1/samplers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "name": "Euler a", "aliases": ["k_euler_a"] },
            { "name": "" },
            { "name": "DPM++ 2M" }
        ])))
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/sdapi/v1/upscalers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "name": "None" },
            { "name": "R-ESRGAN 4x+", "scale": 4 }
        ])))
        .mount(&h.server)
        .await;

    assert_eq!(
        h.service.list_samplers().await.unwrap(),
        vec!["Euler a", "DPM++ 2M"]
    );
    assert_eq!(
        h.service.list_upscalers().await.unwrap(),
        vec!["None", "R-ESRGAN 4x+"]
    );
}

#[tokio::test]
async fn test_loras_pass_through_or_become_empty() {
    let h = Harness::start().await;
    Mock::given(method("GET"))
        .and(path("/sdapi/v1/loras"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "name": "detail", "alias": "detail", "path": "/models/Lora/detail.safetensors" }
        ])))
        .up_to_n_times(1)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/sdapi/v1/loras"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "error": "not loaded" })))
        .mount(&h.server)
        .await;

    let first = h.service.list_loras().await.unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0]["path"], "/models/Lora/detail.safetensors");

    let second = h.service.list_loras().await.unwrap();
    assert!(second.is_empty());
}

#[tokio::test]
async fn test_set_model_posts_checkpoint() {
    let h = Harness::start().await;
    Mock::given(method("POST"))
        .and(path("/sdapi/v1/options"))
        .and(body_json(json!({ "sd_model_checkpoint": "sdxl_base.safetensors" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(null)))
        .expect(1)
        .mount(&h.server)
        .await;

    let result = h
        .dispatcher()
        .call(
            "set_sd_model",
            json!({ "model_name": "sdxl_base.safetensors" }).as_object().cloned(),
        )
        .await;

    assert!(!is_error(&result));
    assert_eq!(
        result_json(&result),
        json!({ "success": true, "model": "sdxl_base.safetensors" })
    );
}

#[tokio::test]
async fn test_set_model_timeout_reports_model_may_be_loading() {
    let h = Harness::start_with(|c| c.webui.model_switch_timeout_ms = 200).await;
    Mock::given(method("POST"))
        .and(path("/sdapi/v1/options"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&h.server)
        .await;

    let err = h
        .service
        .set_model(SetModelArgs {
            model_name: "huge.safetensors".to_string(),
        })
        .await
        .unwrap_err();

    let envelope = serde_json::to_value(err.envelope()).unwrap();
    assert_eq!(envelope["kind"], "remote_unreachable_error");
    assert_eq!(envelope["model_may_be_loading"], true);
    assert!(envelope["message"]
        .as_str()
        .unwrap()
        .contains("might still be loading"));
}

#[tokio::test]
async fn test_zero_switch_timeout_outlasts_request_timeout() {
    let h = Harness::start_with(|c| {
        c.webui.request_timeout_ms = 200;
        c.webui.model_switch_timeout_ms = 0;
    })
    .await;
    Mock::given(method("POST"))
        .and(path("/sdapi/v1/options"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(600)))
        .expect(1)
        .mount(&h.server)
        .await;

    let result = h
        .service
        .set_model(SetModelArgs {
            model_name: "slow.safetensors".to_string(),
        })
        .await
        .unwrap();
    assert!(result.success);
    assert_eq!(result.model, "slow.safetensors");
}

#[tokio::test]
async fn test_request_timeout_applies_to_listings() {
    let h = Harness::start_with(|c| c.webui.request_timeout_ms = 200).await;
    Mock::given(method("GET"))
        .and(path("/sdapi/v1/samplers"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{ "name": "Euler a" }]))
                .set_delay(Duration::from_millis(600)),
        )
        .mount(&h.server)
        .await;

    let err = h.service.list_samplers().await.unwrap_err();
    assert_eq!(err.kind(), "remote_unreachable_error");
}

#[tokio::test]
async fn test_basic_auth_is_sent_when_configured() {
    let h = Harness::start_with(|c| {
        c.webui.auth_user = Some("artist".to_string());
        c.webui.auth_pass = Some("hunter2".to_string());
    })
    .await;
    Mock::given(method("GET"))
        .and(path("/sdapi/v1/sd-models"))
        .and(basic_auth("artist", "hunter2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "title": "a" }])))
        .expect(1)
        .mount(&h.server)
        .await;

    assert_eq!(h.service.list_models().await.unwrap(), vec!["a"]);
}

#[tokio::test]
async fn test_unreachable_webui_is_classified() {
    // Nothing listens on the discard port
    let h = Harness::start_with(|c| c.webui.url = "http://127.0.0.1:9".to_string()).await;

    let err = h.service.list_samplers().await.unwrap_err();
    assert_eq!(err.kind(), "remote_unreachable_error");
    assert_eq!(err.envelope().model_may_be_loading, None);
}

#[tokio::test]
async fn test_malformed_listing_is_a_request_error() {
    let h = Harness::start().await;
    Mock::given(method("GET"))
        .and(path("/sdapi/v1/sd-models"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .mount(&h.server)
        .await;

    let err = h.service.list_models().await.unwrap_err();
    assert_eq!(err.kind(), "remote_request_error");
}
