use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;

pub const SIGNATURE_HEADER: &str = "x-line-signature";

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug)]
pub enum SigningError {
    MissingSignature(String),
    MalformedSignature(String),
    InvalidSignature(String),
    KeyError(String),
}

fn _new_mac(channel_secret: &str, body: &[u8]) -> Result<HmacSha256, SigningError> {
    let mut mac = HmacSha256::new_from_slice(channel_secret.as_bytes()).map_err(|e| {
        SigningError::KeyError(format!("Failed to key HMAC with channel secret.\n{:?}", e))
    })?;
    mac.update(body);
    Ok(mac)
}

/// Signature the platform attaches to a webhook body: base64(HMAC-SHA256(secret, body)).
pub fn sign_body(channel_secret: &str, body: &[u8]) -> Result<String, SigningError> {
    let mac = _new_mac(channel_secret, body)?;
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

pub fn verify_signature(
    channel_secret: &str,
    body: &[u8],
    signature: Option<&str>,
) -> Result<(), SigningError> {
    let signature = match signature {
        Some(s) if !s.is_empty() => s,
        _ => {
            return Err(SigningError::MissingSignature(
                "Request carries no signature header.".to_owned(),
            ))
        }
    };
    let decoded = STANDARD.decode(signature).map_err(|e| {
        SigningError::MalformedSignature(format!("Signature is not valid base64.\n{:?}", e))
    })?;
    // verify_slice compares in constant time
    _new_mac(channel_secret, body)?
        .verify_slice(&decoded)
        .map_err(|_| SigningError::InvalidSignature("Signature does not match body.".to_owned()))
}
