//! Unsubscribe links.
//!
//! The receiving site recomputes the token from the user id and the shared
//! salt, so the derivation below must not change.

use md5::{Digest, Md5};

/// Path prefix of the unsubscribe endpoint
pub const UNSUBSCRIBE_PATH: &str = "/site/unsubscribe-news/";

const TOKEN_OFFSET: usize = 4;
const TOKEN_LEN: usize = 16;

/// Returns the 16 hex character token for `user_id`.
///
/// Characters 4 to 20 of the lowercase hex MD5 digest of `user_id`
/// followed by `salt`.
pub fn token(user_id: &str, salt: &str) -> String {
    let digest = Md5::new()
        .chain_update(user_id.as_bytes())
        .chain_update(salt.as_bytes())
        .finalize();
    let hex = format!("{:x}", digest);
    hex[TOKEN_OFFSET..TOKEN_OFFSET + TOKEN_LEN].to_string()
}

/// Returns the full unsubscribe URL for `user_id`
pub fn url(unsubscribe_host: &str, user_id: &str, salt: &str) -> String {
    format!(
        "{}{}{}/{}",
        unsubscribe_host,
        UNSUBSCRIBE_PATH,
        user_id,
        token(user_id, salt)
    )
}
