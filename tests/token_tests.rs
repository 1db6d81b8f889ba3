use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use filebox::config::{AuthConfig, SigningKey};
use filebox::tokens::{AuthError, TokenAuthority};
use ring::hmac;
use serde_json::json;

const NOW: i64 = 1_700_000_000;
const TTL: i64 = 3600;

fn key(id: &str, secret: &str) -> SigningKey {
    SigningKey {
        id: id.to_string(),
        secret: secret.as_bytes().to_vec(),
    }
}

fn auth_config(current: SigningKey, previous: Vec<SigningKey>) -> AuthConfig {
    AuthConfig {
        signing_key: current,
        previous_signing_keys: previous,
        token_ttl_secs: TTL,
        issuer: "filebox-test".to_string(),
        secure_cookies: true,
    }
}

fn authority() -> TokenAuthority {
    TokenAuthority::new(&auth_config(
        key("k1", "first-secret-first-secret-first-s"),
        vec![],
    ))
}

/// Sign arbitrary header and claims with `secret`.
fn sign(header: serde_json::Value, claims: serde_json::Value, secret: &str) -> String {
    let unsigned = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(header.to_string()),
        URL_SAFE_NO_PAD.encode(claims.to_string())
    );
    let key = hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes());
    let signature = hmac::sign(&key, unsigned.as_bytes());
    format!("{unsigned}.{}", URL_SAFE_NO_PAD.encode(signature.as_ref()))
}

#[test]
fn test_issue_then_verify() {
    let tokens = authority();
    let issued = tokens.issue_at(7, NOW);

    assert_eq!(issued.expires_at, NOW + TTL);
    assert_eq!(issued.token.split('.').count(), 3);
    assert_eq!(tokens.verify_at(&issued.token, NOW), Ok(7));
    assert_eq!(tokens.verify(&tokens.issue(7).token), Ok(7));
}

#[test]
fn test_claims_carry_user_id_as_string() {
    let tokens = authority();
    let issued = tokens.issue_at(42, NOW);

    let claims_b64 = issued.token.split('.').nth(1).unwrap();
    let claims: serde_json::Value =
        serde_json::from_slice(&URL_SAFE_NO_PAD.decode(claims_b64).unwrap()).unwrap();
    assert_eq!(claims["data"]["user_id"], "42");
    assert_eq!(claims["exp"], NOW + TTL);
    assert_eq!(claims["iss"], "filebox-test");
}

#[test]
fn test_token_expiry() {
    let tokens = authority();
    let issued = tokens.issue_at(7, NOW);

    // Valid up to and including `exp`.
    assert_eq!(tokens.verify_at(&issued.token, NOW + TTL), Ok(7));
    assert_eq!(
        tokens.verify_at(&issued.token, NOW + TTL + 1),
        Err(AuthError::Expired)
    );
}

#[test]
fn test_tampered_token_fails_signature() {
    let tokens = authority();
    let issued = tokens.issue_at(7, NOW);

    let forged_claims = URL_SAFE_NO_PAD.encode(
        json!({ "exp": NOW + TTL, "data": { "user_id": "1" } }).to_string(),
    );
    let mut parts: Vec<&str> = issued.token.split('.').collect();
    parts[1] = &forged_claims;
    let forged = parts.join(".");

    assert_eq!(
        tokens.verify_at(&forged, NOW),
        Err(AuthError::InvalidSignature)
    );
}

#[test]
fn test_foreign_secret_fails_signature() {
    let tokens = authority();
    let token = sign(
        json!({ "alg": "HS256", "typ": "JWT", "kid": "k1" }),
        json!({ "exp": NOW + TTL, "data": { "user_id": "7" } }),
        "some-other-secret-some-other-secret",
    );
    assert_eq!(
        tokens.verify_at(&token, NOW),
        Err(AuthError::InvalidSignature)
    );
}

#[test]
fn test_malformed_tokens() {
    let tokens = authority();
    let valid = tokens.issue_at(7, NOW).token;

    let cases = [
        String::new(),
        "abc".to_string(),
        "a.b".to_string(),
        format!("{valid}.extra"),
        "!!!.???.***".to_string(),
        format!(
            "{}.{}.{}",
            URL_SAFE_NO_PAD.encode("not json"),
            URL_SAFE_NO_PAD.encode("{}"),
            URL_SAFE_NO_PAD.encode("sig")
        ),
    ];
    for token in cases {
        assert_eq!(
            tokens.verify_at(&token, NOW),
            Err(AuthError::Malformed),
            "{token:?}"
        );
    }
}

#[test]
fn test_other_algorithms_are_rejected() {
    let tokens = authority();
    let token = sign(
        json!({ "alg": "none", "kid": "k1" }),
        json!({ "exp": NOW + TTL, "data": { "user_id": "7" } }),
        "first-secret-first-secret-first-s",
    );
    assert_eq!(tokens.verify_at(&token, NOW), Err(AuthError::Malformed));
}

#[test]
fn test_malformed_claims() {
    let tokens = authority();
    let secret = "first-secret-first-secret-first-s";
    let header = json!({ "alg": "HS256", "typ": "JWT", "kid": "k1" });

    let cases = [
        json!({ "data": { "user_id": "7" } }),
        json!({ "exp": NOW + TTL }),
        json!({ "exp": NOW + TTL, "data": {} }),
        json!({ "exp": NOW + TTL, "data": { "user_id": "seven" } }),
        json!({ "exp": NOW + TTL, "data": { "user_id": -7 } }),
        json!({ "exp": NOW + TTL, "data": { "user_id": true } }),
    ];
    for claims in cases {
        let token = sign(header.clone(), claims.clone(), secret);
        assert_eq!(
            tokens.verify_at(&token, NOW),
            Err(AuthError::MalformedClaims),
            "{claims}"
        );
    }
}

#[test]
fn test_numeric_user_id_is_accepted() {
    let tokens = authority();
    let token = sign(
        json!({ "alg": "HS256", "kid": "k1" }),
        json!({ "exp": NOW + TTL, "data": { "user_id": 12 } }),
        "first-secret-first-secret-first-s",
    );
    assert_eq!(tokens.verify_at(&token, NOW), Ok(12));
}

#[test]
fn test_key_rotation() {
    let old_key = key("k1", "first-secret-first-secret-first-s");
    let new_key = key("k2", "second-secret-second-secret-secon");

    let before = TokenAuthority::new(&auth_config(old_key.clone(), vec![]));
    let old_token = before.issue_at(7, NOW).token;

    let rotated = TokenAuthority::new(&auth_config(new_key.clone(), vec![old_key]));
    assert_eq!(rotated.verify_at(&old_token, NOW), Ok(7));

    let new_token = rotated.issue_at(8, NOW).token;
    assert_eq!(rotated.verify_at(&new_token, NOW), Ok(8));
    assert_eq!(
        before.verify_at(&new_token, NOW),
        Err(AuthError::InvalidSignature)
    );

    // Once the old key is dropped its tokens stop verifying.
    let finished = TokenAuthority::new(&auth_config(new_key, vec![]));
    assert_eq!(
        finished.verify_at(&old_token, NOW),
        Err(AuthError::InvalidSignature)
    );
}

#[test]
fn test_unknown_kid_fails() {
    let tokens = authority();
    let token = sign(
        json!({ "alg": "HS256", "kid": "retired" }),
        json!({ "exp": NOW + TTL, "data": { "user_id": "7" } }),
        "first-secret-first-secret-first-s",
    );
    assert_eq!(
        tokens.verify_at(&token, NOW),
        Err(AuthError::InvalidSignature)
    );
}
