// Field-level encryption for personal data at rest

pub mod kms;

use async_trait::async_trait;
use thiserror::Error;

pub use kms::KmsEncryptor;

#[derive(Error, Debug)]
pub enum EncryptionError {
    #[error("Encryption service call failed: {0}")]
    Service(String),

    #[error("Encryption service returned no ciphertext")]
    EmptyCiphertext,
}

#[async_trait]
pub trait FieldEncryptor: Send + Sync {
    /// Encrypt `plaintext`, returning base64 ciphertext safe to store as text
    async fn encrypt(&self, plaintext: &str) -> Result<String, EncryptionError>;

    /// Decrypt base64 ciphertext produced by `encrypt`. Any failure yields `None`.
    async fn decrypt(&self, ciphertext: &str) -> Option<String>;
}

#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use base64::{engine::general_purpose, Engine as _};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Reversible stand-in that counts calls and can be told to fail
    #[derive(Debug, Default)]
    pub struct RecordingEncryptor {
        pub calls: AtomicUsize,
        pub fail: AtomicBool,
    }

    impl RecordingEncryptor {
        pub fn failing() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: AtomicBool::new(true),
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl FieldEncryptor for RecordingEncryptor {
        async fn encrypt(&self, plaintext: &str) -> Result<String, EncryptionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(EncryptionError::Service("key disabled".to_string()));
            }
            Ok(general_purpose::STANDARD.encode(format!("enc:{}", plaintext)))
        }

        async fn decrypt(&self, ciphertext: &str) -> Option<String> {
            let bytes = general_purpose::STANDARD.decode(ciphertext).ok()?;
            String::from_utf8(bytes).ok()?.strip_prefix("enc:").map(str::to_string)
        }
    }
}
