//! Contract gateways for the Token, Collection, and Marketplace contracts
//!
//! Each gateway is a thin wrapper over an alloy contract instance. Gateways do
//! no business logic: they encode domain calls and decode provider errors into
//! [`RawFailure`].

use std::sync::Arc;

use alloy::{
    contract::Error as ContractError,
    network::EthereumWallet,
    primitives::{Address, TxHash, U256},
    providers::{PendingTransactionError, Provider, ProviderBuilder},
    signers::local::PrivateKeySigner,
    sol,
    transports::{http::Http, RpcError, TransportError},
};
use async_trait::async_trait;
use tracing::{debug, info};

use crate::config::CheckoutConfig;
use crate::error::{ConfigError, RawFailure};
use crate::types::{PurchaseRequest, WalletIdentity};

sol! {
    #[allow(missing_docs)]
    #[sol(rpc)]
    contract PaymentToken {
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);
    }
}

sol! {
    #[allow(missing_docs)]
    #[sol(rpc)]
    contract ProductCollection {
        function balanceOf(address account, uint256 id) external view returns (uint256);
    }
}

sol! {
    #[allow(missing_docs)]
    #[sol(rpc)]
    contract Marketplace {
        function buyProducts(
            uint256[] tokenIds,
            uint256[] tokenAmounts,
            uint256 totalPrice
        ) external;
    }
}

type HttpTransport = Http<reqwest::Client>;

/// Spending authorization on the payment token
#[async_trait]
pub trait TokenGateway: Send + Sync {
    /// Amount `spender` may currently move on behalf of `owner`
    async fn current_allowance(&self, owner: Address, spender: Address) -> Result<U256, RawFailure>;

    /// Approve `spender` for `amount` and wait until the approval is mined
    async fn approve(
        &self,
        wallet: &WalletIdentity,
        spender: Address,
        amount: U256,
    ) -> Result<TxHash, RawFailure>;
}

/// Product token balances
#[async_trait]
pub trait CollectionGateway: Send + Sync {
    async fn balance_of(&self, owner: Address, token_id: U256) -> Result<U256, RawFailure>;
}

/// Multi-item purchase on the marketplace
#[async_trait]
pub trait MarketplaceGateway: Send + Sync {
    /// Marketplace address, the spender the token must authorize
    fn address(&self) -> Address;

    /// Submit the purchase and return its transaction hash
    async fn purchase(
        &self,
        wallet: &WalletIdentity,
        request: &PurchaseRequest<'_>,
    ) -> Result<TxHash, RawFailure>;
}

/// ERC-20 style payment token
pub struct TokenContract<P> {
    contract: PaymentToken::PaymentTokenInstance<HttpTransport, P>,
}

impl<P: Provider<HttpTransport> + Clone> TokenContract<P> {
    pub fn new(address: Address, provider: P) -> Self {
        Self {
            contract: PaymentToken::new(address, provider),
        }
    }
}

#[async_trait]
impl<P: Provider<HttpTransport> + Clone + 'static> TokenGateway for TokenContract<P> {
    async fn current_allowance(
        &self,
        owner: Address,
        spender: Address,
    ) -> Result<U256, RawFailure> {
        let result = self
            .contract
            .allowance(owner, spender)
            .call()
            .await
            .map_err(decode_contract_error)?;
        Ok(result._0)
    }

    async fn approve(
        &self,
        wallet: &WalletIdentity,
        spender: Address,
        amount: U256,
    ) -> Result<TxHash, RawFailure> {
        debug!(
            owner = %wallet.address(),
            spender = %spender,
            amount = %amount,
            "Submitting approval"
        );

        let pending = self
            .contract
            .approve(spender, amount)
            .from(wallet.address())
            .send()
            .await
            .map_err(decode_contract_error)?;

        let tx_hash = *pending.tx_hash();
        let receipt = pending.get_receipt().await.map_err(decode_pending_error)?;

        if !receipt.status() {
            return Err(RawFailure::Reverted {
                reason: "approval transaction failed".to_string(),
            });
        }

        info!(
            tx_hash = %tx_hash,
            block_number = receipt.block_number.unwrap_or(0),
            "Approval confirmed"
        );

        Ok(tx_hash)
    }
}

/// ERC-1155 style product collection
pub struct CollectionContract<P> {
    contract: ProductCollection::ProductCollectionInstance<HttpTransport, P>,
}

impl<P: Provider<HttpTransport> + Clone> CollectionContract<P> {
    pub fn new(address: Address, provider: P) -> Self {
        Self {
            contract: ProductCollection::new(address, provider),
        }
    }
}

#[async_trait]
impl<P: Provider<HttpTransport> + Clone + 'static> CollectionGateway for CollectionContract<P> {
    async fn balance_of(&self, owner: Address, token_id: U256) -> Result<U256, RawFailure> {
        let result = self
            .contract
            .balanceOf(owner, token_id)
            .call()
            .await
            .map_err(decode_contract_error)?;
        Ok(result._0)
    }
}

/// Marketplace that settles a whole cart in one call
pub struct MarketplaceContract<P> {
    contract: Marketplace::MarketplaceInstance<HttpTransport, P>,
}

impl<P: Provider<HttpTransport> + Clone> MarketplaceContract<P> {
    pub fn new(address: Address, provider: P) -> Self {
        Self {
            contract: Marketplace::new(address, provider),
        }
    }
}

#[async_trait]
impl<P: Provider<HttpTransport> + Clone + 'static> MarketplaceGateway for MarketplaceContract<P> {
    fn address(&self) -> Address {
        *self.contract.address()
    }

    async fn purchase(
        &self,
        wallet: &WalletIdentity,
        request: &PurchaseRequest<'_>,
    ) -> Result<TxHash, RawFailure> {
        let token_ids: Vec<U256> = request.token_ids().iter().map(|id| U256::from(*id)).collect();
        let amounts: Vec<U256> = request.amounts().iter().map(|a| U256::from(*a)).collect();
        let total_price = U256::from(request.total_price());

        debug!(
            buyer = %wallet.address(),
            items = token_ids.len(),
            total_price = %total_price,
            "Submitting purchase"
        );

        let pending = self
            .contract
            .buyProducts(token_ids, amounts, total_price)
            .from(wallet.address())
            .send()
            .await
            .map_err(decode_contract_error)?;

        Ok(*pending.tx_hash())
    }
}

/// Gateways sharing one provider, plus the wallet they sign for
pub struct Gateways {
    pub token: Arc<dyn TokenGateway>,
    pub collection: Arc<dyn CollectionGateway>,
    pub marketplace: Arc<dyn MarketplaceGateway>,
    pub wallet: WalletIdentity,
}

impl Gateways {
    /// Build all gateways over `provider`
    pub fn from_provider<P>(
        provider: P,
        config: &CheckoutConfig,
        wallet: WalletIdentity,
    ) -> Result<Self, ConfigError>
    where
        P: Provider<HttpTransport> + Clone + 'static,
    {
        let token = parse_address("TOKEN_ADDRESS", &config.token_address)?;
        let collection = parse_address("COLLECTION_ADDRESS", &config.collection_address)?;
        let marketplace = parse_address("MARKETPLACE_ADDRESS", &config.marketplace_address)?;

        Ok(Self {
            token: Arc::new(TokenContract::new(token, provider.clone())),
            collection: Arc::new(CollectionContract::new(collection, provider.clone())),
            marketplace: Arc::new(MarketplaceContract::new(marketplace, provider)),
            wallet,
        })
    }
}

/// Connect to the chain and build gateways for the configured wallet.
///
/// A local private key gets a filling, signing provider. Without one, the
/// RPC endpoint is expected to be a wallet that signs `eth_sendTransaction`
/// itself and prompts the user.
pub async fn connect(config: &CheckoutConfig) -> anyhow::Result<Gateways> {
    let rpc_url: reqwest::Url = config
        .rpc_url
        .parse()
        .map_err(|_| ConfigError::InvalidUrl(config.rpc_url.clone()))?;

    match &config.wallet_private_key {
        Some(key) => {
            let signer: PrivateKeySigner = key.parse().map_err(|_| ConfigError::InvalidPrivateKey)?;
            let address = signer.address();

            let provider = ProviderBuilder::new()
                .with_recommended_fillers()
                .wallet(EthereumWallet::from(signer))
                .on_http(rpc_url);

            let chain_id = provider.get_chain_id().await?;
            check_chain_id(config, chain_id)?;
            info!(chain_id = chain_id, wallet = %address, "Connected with local signer");

            Ok(Gateways::from_provider(
                provider,
                config,
                WalletIdentity::new(address, chain_id),
            )?)
        }
        None => {
            let raw = config
                .wallet_address
                .as_deref()
                .ok_or_else(|| ConfigError::MissingEnvVar("WALLET_ADDRESS".to_string()))?;
            let address = parse_address("WALLET_ADDRESS", raw)?;

            let provider = ProviderBuilder::new().on_http(rpc_url);

            let chain_id = provider.get_chain_id().await?;
            check_chain_id(config, chain_id)?;
            info!(chain_id = chain_id, wallet = %address, "Connected to remote wallet");

            Ok(Gateways::from_provider(
                provider,
                config,
                WalletIdentity::new(address, chain_id),
            )?)
        }
    }
}

fn check_chain_id(config: &CheckoutConfig, actual: u64) -> Result<(), ConfigError> {
    if config.expected_chain_id != 0 && config.expected_chain_id != actual {
        return Err(ConfigError::InvalidValue {
            field: "EXPECTED_CHAIN_ID".to_string(),
            message: format!("expected {}, node reports {}", config.expected_chain_id, actual),
        });
    }
    Ok(())
}

pub(crate) fn parse_address(field: &str, value: &str) -> Result<Address, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidAddress {
        field: field.to_string(),
        value: value.to_string(),
    })
}

/// Decode an alloy contract error into a raw failure
pub fn decode_contract_error(err: ContractError) -> RawFailure {
    match err {
        ContractError::TransportError(e) => decode_transport_error(&e),
        other => RawFailure::Unrecognized(other.to_string()),
    }
}

fn decode_pending_error(err: PendingTransactionError) -> RawFailure {
    match err {
        PendingTransactionError::TransportError(e) => decode_transport_error(&e),
        other => RawFailure::Transport {
            message: other.to_string(),
        },
    }
}

fn decode_transport_error(err: &TransportError) -> RawFailure {
    if let Some(payload) = err.as_error_resp() {
        return RawFailure::from_rpc_payload(payload.code, &payload.message);
    }

    match err {
        RpcError::Transport(kind) => RawFailure::Transport {
            message: kind.to_string(),
        },
        other => RawFailure::Unrecognized(other.to_string()),
    }
}
