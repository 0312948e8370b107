use std::sync::Arc;

use async_trait::async_trait;

use crate::config::roles;
use crate::error::Result;
use crate::maker::Maker;
use crate::migrations::Migration;
use crate::models::currency::Currency;
use crate::services::token::{self, TokenService};

pub const MKR_REDEEMER: &str = "mkr-redeemer";

/// Flags accounts still holding the pre-upgrade MKR token.
pub struct MkrRedeemer {
    tokens: Arc<TokenService>,
}

impl MkrRedeemer {
    pub fn new(tokens: Arc<TokenService>) -> Self {
        Self { tokens }
    }

    pub fn from_maker(maker: &Maker) -> Result<Self> {
        Ok(Self::new(maker.service::<TokenService>(roles::TOKEN)?))
    }

    pub async fn old_mkr_balance(&self) -> Result<Currency> {
        self.tokens.get_token(token::OLD_MKR)?.balance().await
    }
}

#[async_trait]
impl Migration for MkrRedeemer {
    fn id(&self) -> &'static str {
        MKR_REDEEMER
    }

    async fn check(&self) -> Result<bool> {
        Ok(!self.old_mkr_balance().await?.is_zero())
    }
}
