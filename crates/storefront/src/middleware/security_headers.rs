//! Security headers middleware for XSS, clickjacking, and isolation protection.
//!
//! The policy is locked down except where the storefront needs it: htmx from
//! unpkg, Stripe.js and Checkout, and remote product and ad imagery.

use axum::{
    extract::Request,
    http::{
        HeaderName, HeaderValue,
        header::{
            CACHE_CONTROL, CONTENT_SECURITY_POLICY, REFERRER_POLICY, X_CONTENT_TYPE_OPTIONS,
            X_FRAME_OPTIONS,
        },
    },
    middleware::Next,
    response::Response,
};

use super::csp::CspNonce;

/// Build the Content-Security-Policy for a request.
///
/// `img-src` allows any https origin: mushroom photos, Stripe product images
/// and Thrads creatives come from hosts we don't control.
#[must_use]
pub fn content_security_policy(nonce: Option<&str>) -> String {
    let nonce = nonce
        .filter(|n| !n.is_empty())
        .map(|n| format!(" 'nonce-{n}'"))
        .unwrap_or_default();
    format!(
        "default-src 'none'; \
         script-src 'self'{nonce} https://unpkg.com https://js.stripe.com; \
         style-src 'self'; \
         font-src 'self'; \
         img-src 'self' data: https://images.pexels.com https://files.stripe.com https:; \
         media-src 'self' https:; \
         connect-src 'self' https://api.stripe.com; \
         frame-src https://js.stripe.com https://checkout.stripe.com; \
         object-src 'none'; \
         base-uri 'self'; \
         form-action 'self' https://checkout.stripe.com; \
         frame-ancestors 'none'; \
         upgrade-insecure-requests"
    )
}

/// Add security headers to all responses.
///
/// Headers applied:
/// - `X-Frame-Options: DENY`
/// - `X-Content-Type-Options: nosniff`
/// - `Referrer-Policy: strict-origin-when-cross-origin` (Stripe Checkout reads the origin)
/// - `Content-Security-Policy` with the request's nonce
/// - `Permissions-Policy` denying everything but payment for Stripe
/// - `Cache-Control: no-store` unless the handler already set one
/// - `Cross-Origin-Opener-Policy: same-origin-allow-popups`
/// - `Cross-Origin-Embedder-Policy: credentialless` so remote images load
pub async fn security_headers_middleware(request: Request, next: Next) -> Response {
    let nonce = request.extensions().get::<CspNonce>().cloned();
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert(X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    headers.insert(
        REFERRER_POLICY,
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );

    let policy = content_security_policy(nonce.as_ref().map(CspNonce::value));
    match HeaderValue::from_str(&policy) {
        Ok(value) => {
            headers.insert(CONTENT_SECURITY_POLICY, value);
        }
        Err(e) => tracing::error!(error = %e, "Invalid Content-Security-Policy header"),
    }

    headers.insert(
        HeaderName::from_static("permissions-policy"),
        HeaderValue::from_static(
            "accelerometer=(), \
             autoplay=(), \
             browsing-topics=(), \
             camera=(), \
             display-capture=(), \
             geolocation=(), \
             gyroscope=(), \
             hid=(), \
             interest-cohort=(), \
             magnetometer=(), \
             microphone=(), \
             midi=(), \
             payment=(self \"https://js.stripe.com\" \"https://checkout.stripe.com\"), \
             publickey-credentials-get=(), \
             serial=(), \
             usb=(), \
             xr-spatial-tracking=()",
        ),
    );

    // Static assets set their own long-lived cache headers
    if !headers.contains_key(CACHE_CONTROL) {
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store, max-age=0"));
    }

    headers.insert(
        HeaderName::from_static("cross-origin-opener-policy"),
        HeaderValue::from_static("same-origin-allow-popups"),
    );
    headers.insert(
        HeaderName::from_static("cross-origin-resource-policy"),
        HeaderValue::from_static("same-origin"),
    );
    headers.insert(
        HeaderName::from_static("cross-origin-embedder-policy"),
        HeaderValue::from_static("credentialless"),
    );
    headers.insert(
        HeaderName::from_static("x-dns-prefetch-control"),
        HeaderValue::from_static("off"),
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_includes_nonce() {
        let policy = content_security_policy(Some("abc123"));
        assert!(policy.contains("script-src 'self' 'nonce-abc123' https://unpkg.com"));
    }

    #[test]
    fn test_policy_without_nonce() {
        let policy = content_security_policy(None);
        assert!(policy.contains("script-src 'self' https://unpkg.com"));
        assert!(!policy.contains("nonce-"));
        assert_eq!(content_security_policy(Some("")), policy);
    }

    #[test]
    fn test_policy_allows_stripe_and_product_images() {
        let policy = content_security_policy(None);
        assert!(policy.contains("https://images.pexels.com"));
        assert!(policy.contains("form-action 'self' https://checkout.stripe.com"));
        assert!(policy.contains("https://js.stripe.com"));
    }
}
