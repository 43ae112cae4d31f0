use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use taskgate_core::{
    JwtTokenService, ManualClock, PrincipalId, Role, TokenError, TokenSecret, TokenService,
};

const SECRET: &[u8] = b"integration-secret-0123456789abcdef";
const NOW: i64 = 1_700_000_000;
const TTL: Duration = Duration::from_secs(72 * 3600);

fn service_with_clock() -> (JwtTokenService, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::starting_at(NOW));
    let secret = TokenSecret::new(SECRET.to_vec()).unwrap();
    let service = JwtTokenService::with_clock(&secret, TTL, clock.clone()).unwrap();
    (service, clock)
}

fn claims_json(exp: i64) -> serde_json::Value {
    json!({
        "user_id": PrincipalId::generate().to_hex(),
        "username": "alice",
        "role": "admin",
        "iat": NOW,
        "exp": exp,
    })
}

#[test]
fn default_lifetime_is_fixed_at_issuance() {
    let (service, clock) = service_with_clock();
    let issued = service
        .issue(PrincipalId::generate(), "alice", Role::User)
        .unwrap();
    assert_eq!(issued.expires_at, NOW + 72 * 3600);

    clock.advance(Duration::from_secs(72 * 3600 - 1));
    assert!(service.validate(&issued.token).is_ok());

    clock.advance(Duration::from_secs(1));
    assert!(matches!(
        service.validate(&issued.token),
        Err(TokenError::Expired { .. })
    ));
}

#[test]
fn every_single_character_mutation_is_rejected() {
    let (service, _clock) = service_with_clock();
    let issued = service
        .issue(PrincipalId::generate(), "alice", Role::Admin)
        .unwrap();
    let original = issued.token.as_bytes();

    for position in 0..original.len() {
        let mut mutated = original.to_vec();
        mutated[position] = if mutated[position] == b'A' { b'B' } else { b'A' };
        let mutated = String::from_utf8(mutated).unwrap();
        assert!(
            service.validate(&mutated).is_err(),
            "mutation at position {position} was accepted"
        );
    }
}

#[test]
fn token_signed_with_another_secret_is_rejected() {
    let (service, _clock) = service_with_clock();
    let forged = jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims_json(NOW + 3600),
        &EncodingKey::from_secret(b"some-other-secret-0123456789abcdef"),
    )
    .unwrap();

    assert_eq!(
        service.validate(&forged).unwrap_err(),
        TokenError::BadSignature
    );
}

#[test]
fn other_hmac_algorithms_are_rejected_even_with_the_right_secret() {
    let (service, _clock) = service_with_clock();
    for algorithm in [Algorithm::HS384, Algorithm::HS512] {
        let token = jsonwebtoken::encode(
            &Header::new(algorithm),
            &claims_json(NOW + 3600),
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();
        assert_eq!(
            service.validate(&token).unwrap_err(),
            TokenError::UnsupportedAlgorithm
        );
    }
}

#[test]
fn asymmetric_header_on_hmac_signature_is_rejected() {
    let (service, _clock) = service_with_clock();
    let honest = jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims_json(NOW + 3600),
        &EncodingKey::from_secret(SECRET),
    )
    .unwrap();
    let mut parts = honest.splitn(2, '.');
    let _header = parts.next().unwrap();
    let rest = parts.next().unwrap();

    let rs256_header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
    let confused = format!("{rs256_header}.{rest}");

    assert_eq!(
        service.validate(&confused).unwrap_err(),
        TokenError::UnsupportedAlgorithm
    );
}

#[test]
fn unsigned_none_token_is_rejected() {
    let (service, _clock) = service_with_clock();
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims_json(NOW + 3600).to_string());

    for token in [
        format!("{header}.{payload}."),
        format!("{header}.{payload}"),
    ] {
        assert!(service.validate(&token).is_err(), "accepted `{token}`");
    }
}

#[test]
fn token_without_expiry_is_malformed() {
    let (service, _clock) = service_with_clock();
    let mut claims = claims_json(0);
    claims.as_object_mut().unwrap().remove("exp");
    let token = jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(SECRET),
    )
    .unwrap();

    assert_eq!(service.validate(&token).unwrap_err(), TokenError::Malformed);
}

#[test]
fn token_already_past_expiry_is_expired() {
    let (service, _clock) = service_with_clock();
    let token = jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims_json(NOW - 1),
        &EncodingKey::from_secret(SECRET),
    )
    .unwrap();

    assert_eq!(
        service.validate(&token).unwrap_err(),
        TokenError::Expired {
            expired_at: NOW - 1,
            now: NOW
        }
    );
}
