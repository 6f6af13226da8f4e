//! # viewgate 暗号処理
//!
//! Gatewayが署名ネットワークに対して自身を認証するための鍵操作と、
//! 署名対象メッセージのダイジェスト計算を提供する。
//!
//! ## 暗号アルゴリズム
//! | 用途 | アルゴリズム |
//! |------|------------|
//! | サーバー認証署名 | Ed25519 |
//! | メッセージダイジェスト | SHA-256（署名メッセージ接頭辞付き） |

use ed25519_dalek::{Signer, Verifier};
use sha2::{Digest, Sha256};

pub use ed25519_dalek::{
    Signature as Ed25519Signature, SigningKey as Ed25519SigningKey,
    VerifyingKey as Ed25519VerifyingKey,
};

/// 署名メッセージのダイジェストに付与する接頭辞。
/// 任意データの署名と区別するため、メッセージ長と共にハッシュ対象の先頭に置く。
pub const SIGNED_MESSAGE_PREFIX: &str = "\x19Signed Message:\n";

/// 暗号処理のエラー型
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// 秘密鍵の形式が不正
    #[error("invalid signing key: {0}")]
    InvalidKey(String),
    /// 署名の形式が不正
    #[error("invalid signature encoding: {0}")]
    InvalidSignature(String),
    /// Ed25519署名検証エラー
    #[error("Ed25519 signature verification failed")]
    SignatureVerifyError,
}

/// 32バイトの16進文字列（0x接頭辞可）からEd25519秘密鍵を復元する。
pub fn signing_key_from_hex(key_hex: &str) -> Result<Ed25519SigningKey, CryptoError> {
    let trimmed = key_hex.trim();
    let trimmed = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    let key_bytes = hex::decode(trimmed).map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
    let key_arr: [u8; 32] = key_bytes
        .try_into()
        .map_err(|_| CryptoError::InvalidKey("expected 32 bytes".to_string()))?;
    Ok(Ed25519SigningKey::from_bytes(&key_arr))
}

/// 公開鍵をhexで表したアドレス。署名ネットワークに提示する署名者識別子。
pub fn identity_address(verifying_key: &Ed25519VerifyingKey) -> String {
    hex::encode(verifying_key.to_bytes())
}

/// Ed25519による署名。
pub fn ed25519_sign(signing_key: &Ed25519SigningKey, message: &[u8]) -> Ed25519Signature {
    signing_key.sign(message)
}

/// Ed25519による署名検証。
pub fn ed25519_verify(
    verifying_key: &Ed25519VerifyingKey,
    message: &[u8],
    signature: &Ed25519Signature,
) -> Result<(), CryptoError> {
    verifying_key
        .verify(message, signature)
        .map_err(|_| CryptoError::SignatureVerifyError)
}

/// hexエンコードされた64バイトの署名をデコードする。
pub fn signature_from_hex(sig_hex: &str) -> Result<Ed25519Signature, CryptoError> {
    let bytes = hex::decode(sig_hex).map_err(|e| CryptoError::InvalidSignature(e.to_string()))?;
    let arr: [u8; 64] = bytes
        .try_into()
        .map_err(|_| CryptoError::InvalidSignature("expected 64 bytes".to_string()))?;
    Ok(Ed25519Signature::from_bytes(&arr))
}

/// SHA-256ハッシュ計算。
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// 接頭辞付き署名メッセージのダイジェスト。
///
/// `SHA-256(SIGNED_MESSAGE_PREFIX || len(message) || message)`
pub fn signed_message_digest(message: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(SIGNED_MESSAGE_PREFIX.as_bytes());
    hasher.update(message.len().to_string().as_bytes());
    hasher.update(message);
    hasher.finalize().into()
}

/// 署名ネットワークに渡す形式（0x付きhex）でメッセージハッシュを返す。
pub fn hash_message(message: &str) -> String {
    format!("0x{}", hex::encode(signed_message_digest(message.as_bytes())))
}
