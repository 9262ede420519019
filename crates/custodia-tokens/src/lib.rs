//! Custodia Tokens - registry of eligible settlement assets
//!
//! The registry decides which assets an escrow may be denominated in. The
//! native asset is always eligible; everything else must be registered here
//! and active. Deactivating a token only affects new escrows — holds created
//! while it was active keep settling in it.

use std::collections::HashMap;

use custodia_types::{CustodiaError, ParticipantId, Result, SettlementAsset, TokenId, TokenInfo};
use serde::{Deserialize, Serialize};

/// Admin-gated settlement-asset allow-list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRegistry {
    admin: ParticipantId,
    tokens: HashMap<TokenId, TokenInfo>,
}

impl TokenRegistry {
    pub fn new(admin: ParticipantId) -> Self {
        Self {
            admin,
            tokens: HashMap::new(),
        }
    }

    fn require_admin(&self, caller: &ParticipantId) -> Result<()> {
        if caller != &self.admin {
            return Err(CustodiaError::unauthorized(
                "token registry mutation requires the administrator",
            ));
        }
        Ok(())
    }

    /// Register a new settlement token.
    pub fn add_token(&mut self, caller: &ParticipantId, info: TokenInfo) -> Result<()> {
        self.require_admin(caller)?;
        if self.tokens.contains_key(&info.token) {
            return Err(CustodiaError::TokenExists {
                token: info.token.to_string(),
            });
        }
        self.tokens.insert(info.token.clone(), info);
        Ok(())
    }

    /// Flip a token's active flag.
    pub fn update_token_status(
        &mut self,
        caller: &ParticipantId,
        token: &TokenId,
        active: bool,
    ) -> Result<()> {
        self.require_admin(caller)?;
        let info = self
            .tokens
            .get_mut(token)
            .ok_or_else(|| CustodiaError::TokenNotFound {
                token: token.to_string(),
            })?;
        info.active = active;
        Ok(())
    }

    pub fn get_token_info(&self, token: &TokenId) -> Option<&TokenInfo> {
        self.tokens.get(token)
    }

    /// Whether an asset is eligible for a new escrow.
    pub fn is_asset_allowed(&self, asset: &SettlementAsset) -> bool {
        match asset {
            SettlementAsset::Native => true,
            SettlementAsset::Token(id) => {
                self.tokens.get(id).map(|t| t.active).unwrap_or(false)
            }
        }
    }

    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with_admin() -> (TokenRegistry, ParticipantId) {
        let admin = ParticipantId::new();
        (TokenRegistry::new(admin.clone()), admin)
    }

    #[test]
    fn test_native_always_allowed() {
        let (registry, _) = registry_with_admin();
        assert!(registry.is_asset_allowed(&SettlementAsset::Native));
    }

    #[test]
    fn test_add_token() {
        let (mut registry, admin) = registry_with_admin();
        let token = TokenId::new();
        registry
            .add_token(&admin, TokenInfo::new(token.clone(), 1, "USDC", 6))
            .unwrap();

        assert!(registry.is_asset_allowed(&SettlementAsset::Token(token.clone())));
        assert_eq!(registry.get_token_info(&token).unwrap().symbol, "USDC");
    }

    #[test]
    fn test_duplicate_token_rejected() {
        let (mut registry, admin) = registry_with_admin();
        let token = TokenId::new();
        registry
            .add_token(&admin, TokenInfo::new(token.clone(), 1, "USDC", 6))
            .unwrap();

        let result = registry.add_token(&admin, TokenInfo::new(token, 1, "USDC", 6));
        assert!(matches!(result, Err(CustodiaError::TokenExists { .. })));
    }

    #[test]
    fn test_non_admin_rejected() {
        let (mut registry, _) = registry_with_admin();
        let stranger = ParticipantId::new();
        let result = registry.add_token(&stranger, TokenInfo::new(TokenId::new(), 1, "DAI", 18));
        assert!(matches!(result, Err(CustodiaError::Unauthorized { .. })));
    }

    #[test]
    fn test_inactive_token_not_allowed() {
        let (mut registry, admin) = registry_with_admin();
        let token = TokenId::new();
        registry
            .add_token(&admin, TokenInfo::new(token.clone(), 1, "USDT", 6))
            .unwrap();
        registry.update_token_status(&admin, &token, false).unwrap();

        assert!(!registry.is_asset_allowed(&SettlementAsset::Token(token)));
    }

    #[test]
    fn test_unknown_token_status_update() {
        let (mut registry, admin) = registry_with_admin();
        let result = registry.update_token_status(&admin, &TokenId::new(), false);
        assert!(matches!(result, Err(CustodiaError::TokenNotFound { .. })));
    }
}
