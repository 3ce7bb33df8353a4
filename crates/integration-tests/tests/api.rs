//! JSON and SSE endpoints under `/api`.

use axum::http::{StatusCode, header};
use serde_json::json;
use wiremock::matchers::{body_string_contains, header as header_eq, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use lyceum_integration_tests::{
    TestContext, Upstreams, body_json, body_text, cart_item_json, get, post_json, post_raw_json,
};

fn with_openai() -> Upstreams {
    Upstreams {
        openai: true,
        ..Upstreams::default()
    }
}

fn with_thrads() -> Upstreams {
    Upstreams {
        thrads: true,
        ..Upstreams::default()
    }
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn health_reports_ok_with_security_headers() {
    let ctx = TestContext::new().await;

    let response = ctx.send(get("/health")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let headers = response.headers();
    assert!(headers.contains_key("x-request-id"));
    assert_eq!(headers.get("x-frame-options").map(|v| v.as_bytes()), Some(&b"DENY"[..]));
    let csp = headers
        .get(header::CONTENT_SECURITY_POLICY)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    assert!(csp.contains("'nonce-"), "csp: {csp}");

    assert_eq!(body_text(response).await, "ok");
}

#[tokio::test]
async fn readiness_fails_without_database() {
    if std::env::var("LYCEUM_TEST_DATABASE_URL").is_ok() {
        return;
    }
    let ctx = TestContext::new().await;

    let response = ctx.send(get("/health/ready")).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

// =============================================================================
// Checkout
// =============================================================================

#[tokio::test]
async fn checkout_session_rejects_empty_cart() {
    let ctx = TestContext::new().await;

    let response = ctx
        .send(post_json("/api/create-checkout-session", &json!({ "cartItems": [] })))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await, json!({ "error": "No items in cart" }));
}

#[tokio::test]
async fn checkout_session_returns_stripe_session() {
    let ctx = TestContext::new().await;
    Mock::given(method("POST"))
        .and(path("/v1/checkout/sessions"))
        .and(header_eq("authorization", "Bearer sk_test_integration"))
        .and(body_string_contains("mode=payment"))
        .and(body_string_contains("=2999"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "cs_test_123",
            "object": "checkout.session",
            "url": "https://checkout.stripe.com/c/pay/cs_test_123",
        })))
        .expect(1)
        .mount(&ctx.stripe)
        .await;

    let body = json!({
        "cartItems": [cart_item_json("lions-mane-focus", "Lion's Mane Focus", 29.99, 2)],
    });
    let response = ctx.send(post_json("/api/create-checkout-session", &body)).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({
            "sessionId": "cs_test_123",
            "url": "https://checkout.stripe.com/c/pay/cs_test_123",
        })
    );
}

#[tokio::test]
async fn checkout_session_hides_stripe_failure_details() {
    let ctx = TestContext::new().await;
    Mock::given(method("POST"))
        .and(path("/v1/checkout/sessions"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": { "type": "invalid_request_error", "message": "No such price" },
        })))
        .mount(&ctx.stripe)
        .await;

    let body = json!({ "cartItems": [cart_item_json("reishi-calm", "Reishi Calm", 34.99, 1)] });
    let response = ctx.send(post_json("/api/create-checkout-session", &body)).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_json(response).await,
        json!({ "error": "Failed to create checkout session" })
    );
}

#[tokio::test]
async fn checkout_session_rejects_unrepresentable_price() {
    let ctx = TestContext::new().await;
    Mock::given(method("POST"))
        .and(path("/v1/checkout/sessions"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&ctx.stripe)
        .await;

    let body = json!({ "cartItems": [cart_item_json("chaga-shield", "Chaga Shield", 1e27, 1)] });
    let response = ctx.send(post_json("/api/create-checkout-session", &body)).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await,
        json!({ "error": "Invalid price for Chaga Shield" })
    );
}

// =============================================================================
// Stripe catalog
// =============================================================================

#[tokio::test]
async fn stripe_products_flattens_default_price() {
    let ctx = TestContext::new().await;
    Mock::given(method("GET"))
        .and(path("/v1/products"))
        .and(query_param("active", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "object": "list",
            "has_more": false,
            "data": [{
                "id": "prod_reishi",
                "name": "Reishi Calm",
                "description": "Evening support",
                "images": ["https://files.stripe.com/reishi.png"],
                "metadata": { "mushroom_id": "reishi", "category": "Stress Relief" },
                "default_price": { "id": "price_reishi", "unit_amount": 3499, "currency": "usd" },
            }],
        })))
        .mount(&ctx.stripe)
        .await;

    let response = ctx.send(get("/api/stripe-products")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let product = &body[0];
    assert_eq!(product["id"], "prod_reishi");
    assert_eq!(product["priceId"], "price_reishi");
    assert_eq!(product["price"].as_f64(), Some(34.99));
    assert_eq!(product["image"], "https://files.stripe.com/reishi.png");
    assert_eq!(product["metadata"]["mushroom_id"], "reishi");
    assert_eq!(product["metadata"]["product_id"], "");
}

#[tokio::test]
async fn stripe_products_failure_is_reported() {
    let ctx = TestContext::new().await;
    Mock::given(method("GET"))
        .and(path("/v1/products"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
        .mount(&ctx.stripe)
        .await;

    let response = ctx.send(get("/api/stripe-products")).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_json(response).await,
        json!({ "error": "Failed to fetch Stripe products" })
    );
}

// =============================================================================
// Chat
// =============================================================================

#[tokio::test]
async fn chat_requires_openai() {
    let ctx = TestContext::new().await;

    let body = json!({ "messages": [{ "content": "hello", "sender": "user" }] });
    let response = ctx.send(post_json("/api/chat", &body)).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_json(response).await,
        json!({ "error": "Chat service not configured" })
    );
}

#[tokio::test]
async fn chat_rejects_malformed_messages() {
    let ctx = TestContext::with(with_openai()).await;

    let response = ctx
        .send(post_raw_json("/api/chat", r#"{"messages": "hello"}"#))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await,
        json!({ "error": "Invalid messages format" })
    );
}

#[tokio::test]
async fn chat_returns_completion_and_usage() {
    let ctx = TestContext::with(with_openai()).await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header_eq("authorization", "Bearer sk-integration"))
        .and(body_string_contains("Lion's Mane Focus"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "chatcmpl-1",
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": "Lion's Mane supports focus." },
                "finish_reason": "stop",
            }],
            "usage": { "prompt_tokens": 120, "completion_tokens": 8, "total_tokens": 128 },
        })))
        .expect(1)
        .mount(ctx.openai())
        .await;

    let body = json!({
        "messages": [
            { "content": "Hi! I'm your mushroom guide.", "sender": "bot" },
            { "content": "What helps me focus?", "sender": "user" },
        ],
        "currentProduct": { "name": "Lion's Mane Focus" },
    });
    let response = ctx.send(post_json("/api/chat", &body)).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Lion's Mane supports focus.");
    assert_eq!(body["usage"]["total_tokens"], 128);
}

#[tokio::test]
async fn chat_maps_rate_limit_to_429() {
    let ctx = TestContext::with(with_openai()).await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": {
                "message": "Rate limit reached",
                "type": "requests",
                "code": "rate_limit_exceeded",
            },
        })))
        .mount(ctx.openai())
        .await;

    let body = json!({ "messages": [{ "content": "hello", "sender": "user" }] });
    let response = ctx.send(post_json("/api/chat", &body)).await;

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(
        body_json(response).await,
        json!({ "error": "Rate limit exceeded. Please try again in a moment." })
    );
}

#[tokio::test]
async fn chat_stream_requires_message() {
    let ctx = TestContext::new().await;

    let response = ctx.send(get("/api/chat/stream?message=%20%20")).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await, json!({ "error": "Message is required" }));
}

#[tokio::test]
async fn chat_stream_falls_back_to_advisor() {
    let ctx = TestContext::new().await;

    let response = ctx.send(get("/api/chat/stream?message=hello")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("text/event-stream"));

    let body = body_text(response).await;
    assert!(body.contains("event: delta"), "body: {body}");
    assert!(body.contains("event: done"), "body: {body}");
    assert!(body.contains(r#""type":"done""#));
    assert!(body.contains("Could you tell me more"));
}

#[tokio::test]
async fn chat_stream_relays_openai_deltas() {
    let ctx = TestContext::with(with_openai()).await;
    let sse = concat!(
        "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"Try \"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"Reishi.\"}}]}\n\n",
        "data: [DONE]\n\n",
    );
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_string_contains(r#""stream":true"#))
        .respond_with(ResponseTemplate::new(200).set_body_raw(sse, "text/event-stream"))
        .mount(ctx.openai())
        .await;

    let response = ctx.send(get("/api/chat/stream?message=I%20can%27t%20sleep")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_text(response).await;
    assert!(body.contains(r#"{"type":"delta","text":"Try "}"#), "body: {body}");
    assert!(body.contains(r#"{"type":"done","message":"Try Reishi."}"#), "body: {body}");
}

// =============================================================================
// Thrads
// =============================================================================

#[tokio::test]
async fn thrads_ad_requires_api_key() {
    let ctx = TestContext::new().await;

    let body = json!({ "userId": "user_1", "chatId": "chat_1", "userMessage": "hi", "botResponse": "hello" });
    let response = ctx.send(post_json("/api/thrads-ad", &body)).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_json(response).await,
        json!({ "error": "Thrads API key not configured" })
    );
}

#[tokio::test]
async fn thrads_ad_passes_served_creative_through() {
    let ctx = TestContext::with(with_thrads()).await;
    Mock::given(method("POST"))
        .and(path("/api/v1/message/get-ad/"))
        .and(header_eq("thrads-api-key", "thrads-integration"))
        .and(body_string_contains(r#""chatId":"chat_1""#))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "requestId": "req_42",
            "data": {
                "creative": { "creative": "Sleep deeper with chamomile tea." },
                "prod_name": "Night Tea",
                "img_url": "",
                "prod_url": "https://tea.example/night",
            },
        })))
        .expect(1)
        .mount(ctx.thrads())
        .await;

    let body = json!({
        "userId": "user_1",
        "chatId": "chat_1",
        "userMessage": "I can't sleep",
        "botResponse": "Try Reishi.",
        "conversationTurn": 3,
    });
    let response = ctx.send(post_json("/api/thrads-ad", &body)).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "success");
    assert_eq!(body["data"]["impressionId"], "req_42");
    assert_eq!(body["data"]["ad"]["title"], "Night Tea");
    assert_eq!(body["data"]["ad"]["content"], "Sleep deeper with chamomile tea.");
    assert_eq!(body["data"]["ad"]["image"], "");
    assert_eq!(body["data"]["ad"]["url"], "https://tea.example/night");
    assert_eq!(body["data"]["ad"]["sponsored"], true);
}

#[tokio::test]
async fn thrads_ad_reports_no_fill() {
    let ctx = TestContext::with(with_thrads()).await;
    Mock::given(method("POST"))
        .and(path("/api/v1/message/get-ad/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "message": "No relevant ad",
            "data": {},
        })))
        .mount(ctx.thrads())
        .await;

    let body = json!({ "userId": "user_1", "chatId": "chat_1", "userMessage": "hi", "botResponse": "hello" });
    let response = ctx.send(post_json("/api/thrads-ad", &body)).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({ "status": "success", "message": "No relevant ad", "data": null })
    );
}

#[tokio::test]
async fn thrads_ad_passes_upstream_status_through() {
    let ctx = TestContext::with(with_thrads()).await;
    Mock::given(method("POST"))
        .and(path("/api/v1/message/get-ad/"))
        .respond_with(ResponseTemplate::new(403))
        .mount(ctx.thrads())
        .await;

    let body = json!({ "userId": "user_1", "chatId": "chat_1", "userMessage": "hi", "botResponse": "hello" });
    let response = ctx.send(post_json("/api/thrads-ad", &body)).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await, json!({ "error": "API error: 403" }));
}
