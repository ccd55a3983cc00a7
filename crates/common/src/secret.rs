//! Secret types for protecting sensitive values from accidental logging.
//!
//! Re-exports the [`secrecy`] types used across the gateway. Bearer tokens
//! are wrapped in [`SecretString`] as soon as they are pulled out of a
//! request, so a `{:?}` or a `tracing` field can never print one.
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct Presented {
//!     scheme: &'static str,
//!     token: SecretString,
//! }
//!
//! let presented = Presented {
//!     scheme: "Bearer",
//!     token: SecretString::from("eyJhbGciOi..."),
//! };
//!
//! assert!(!format!("{presented:?}").contains("eyJhbGciOi"));
//! assert_eq!(presented.token.expose_secret(), "eyJhbGciOi...");
//! ```

pub use secrecy::{ExposeSecret, SecretBox, SecretString};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_is_redacted() {
        let secret = SecretString::from("header.payload.signature");
        let debug_str = format!("{secret:?}");

        assert!(debug_str.contains("REDACTED"));
        assert!(!debug_str.contains("payload"));
    }

    #[test]
    fn test_struct_with_secret_is_safe() {
        #[allow(dead_code)]
        #[derive(Debug)]
        struct Credential {
            kid: String,
            token: SecretString,
        }

        let credential = Credential {
            kid: "idp-key-1".to_string(),
            token: SecretString::from("super-secret-token"),
        };

        let debug_str = format!("{credential:?}");
        assert!(debug_str.contains("idp-key-1"));
        assert!(!debug_str.contains("super-secret-token"));
    }

    #[test]
    fn test_expose_secret_and_clone() {
        let secret = SecretString::from("cloneable");
        let cloned = secret.clone();
        assert_eq!(cloned.expose_secret(), "cloneable");
    }
}
