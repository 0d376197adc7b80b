use std::sync::Arc;

use sqlx::{Pool, Postgres};

use crate::{config::Config, cryptography::generate_secret, error::ApiError, image::MediaStore, jwt::TokenSigner};

#[derive(Clone)]
pub struct AppState {
    pub pool: Pool<Postgres>,
    pub tokens: Arc<TokenSigner>,
    pub media: Arc<MediaStore>,
}

impl AppState {
    pub fn new(pool: Pool<Postgres>, config: &Config) -> Result<Self, ApiError> {
        let secret = match &config.secret {
            Some(secret) => secret.to_owned(),
            None => {
                log::warn!("FOODGRAM_SECRET not set, tokens will not survive a restart");
                generate_secret()
            }
        };

        Ok(Self {
            pool,
            tokens: Arc::new(TokenSigner::new(&secret, config.token_ttl())?),
            media: Arc::new(MediaStore::new(&config.media_root, &config.media_url)),
        })
    }
}
