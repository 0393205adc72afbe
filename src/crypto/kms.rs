use async_trait::async_trait;
use aws_sdk_kms::primitives::Blob;
use base64::{engine::general_purpose, Engine as _};
use tracing::{error, warn};

use super::{EncryptionError, FieldEncryptor};

/// AWS KMS envelope for personal fields, keyed by a single key id
#[derive(Debug, Clone)]
pub struct KmsEncryptor {
    client: aws_sdk_kms::Client,
    key_id: String,
}

impl KmsEncryptor {
    pub fn new(client: aws_sdk_kms::Client, key_id: impl Into<String>) -> Self {
        Self {
            client,
            key_id: key_id.into(),
        }
    }

    pub async fn from_env(key_id: impl Into<String>) -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::new(aws_sdk_kms::Client::new(&config), key_id)
    }
}

#[async_trait]
impl FieldEncryptor for KmsEncryptor {
    async fn encrypt(&self, plaintext: &str) -> Result<String, EncryptionError> {
        let response = self
            .client
            .encrypt()
            .key_id(&self.key_id)
            .plaintext(Blob::new(plaintext.as_bytes()))
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "KMS encryption failed");
                EncryptionError::Service(e.to_string())
            })?;

        let blob = response
            .ciphertext_blob()
            .ok_or(EncryptionError::EmptyCiphertext)?;

        Ok(general_purpose::STANDARD.encode(blob.as_ref()))
    }

    async fn decrypt(&self, ciphertext: &str) -> Option<String> {
        let bytes = general_purpose::STANDARD.decode(ciphertext).ok()?;

        let response = match self
            .client
            .decrypt()
            .ciphertext_blob(Blob::new(bytes))
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "KMS decryption failed");
                return None;
            }
        };

        let plaintext = response.plaintext()?;
        String::from_utf8(plaintext.as_ref().to_vec()).ok()
    }
}
