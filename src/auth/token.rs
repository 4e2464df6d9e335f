use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::{rngs::OsRng, RngCore};

/// Token size in bytes (32 bytes = 256 bits of entropy).
pub const TOKEN_BYTES: usize = 32;

/// Generates an opaque session token string.
///
/// The token is `TOKEN_BYTES` of OS-provided randomness encoded as URL-safe base64 without
/// padding, so it can travel in an `Authorization` header unescaped.
pub fn generate_token() -> String {
    let mut buffer = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut buffer);
    URL_SAFE_NO_PAD.encode(buffer)
}
