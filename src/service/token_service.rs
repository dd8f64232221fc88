//! ERC-20 代币操作
//! 金额按代币自身的 `decimals()` 换算，转出前校验 `balanceOf`

use ethers::{
    abi::{ParamType, Token},
    types::U256,
};
use rust_decimal::Decimal;

use crate::{
    domain::{units, ContractCallRequest, ContractFunction, TransactionReceipt},
    error::{ProviderError, ProviderResult},
    service::{
        chain_session::ChainSession, contract_invoker::ContractInvoker, evm_signer::parse_address,
        signer::TransactionSigner,
    },
};

fn erc20(name: &str, inputs: Vec<ParamType>, outputs: Vec<ParamType>) -> ContractFunction {
    ContractFunction::new(name, inputs, outputs)
}

fn first_uint(tokens: Vec<Token>, what: &str) -> ProviderResult<U256> {
    match tokens.into_iter().next() {
        Some(Token::Uint(value)) => Ok(value),
        Some(other) => Err(ProviderError::deserialization(format!(
            "Unexpected {} result: {:?}",
            what, other
        ))),
        None => Err(ProviderError::not_found(format!("{} returned no data", what))),
    }
}

/// 代币服务
pub struct TokenService<'a> {
    session: &'a ChainSession,
}

impl<'a> TokenService<'a> {
    pub fn new(session: &'a ChainSession) -> Self {
        Self { session }
    }

    fn invoker(&self) -> ContractInvoker<'a> {
        ContractInvoker::new(self.session)
    }

    pub async fn decimals(&self, token: &str) -> ProviderResult<u32> {
        let request = ContractCallRequest::new(
            token,
            erc20("decimals", vec![], vec![ParamType::Uint(8)]),
            vec![],
        );
        let value = first_uint(self.invoker().call_decoded(&request).await?, "decimals()")?;
        if value > U256::from(36u8) {
            return Err(ProviderError::deserialization(format!(
                "Token {} reports unreasonable decimals {}",
                token, value
            )));
        }
        Ok(value.as_u32())
    }

    async fn balance_base(&self, token: &str, owner: &str) -> ProviderResult<U256> {
        let request = ContractCallRequest::new(
            token,
            erc20("balanceOf", vec![ParamType::Address], vec![ParamType::Uint(256)]),
            vec![Token::Address(parse_address(owner)?)],
        );
        first_uint(self.invoker().call_decoded(&request).await?, "balanceOf()")
    }

    pub async fn balance_of(&self, token: &str, owner: &str) -> ProviderResult<Decimal> {
        let decimals = self.decimals(token).await?;
        let balance = self.balance_base(token, owner).await?;
        units::from_base_units(balance, decimals)
    }

    /// 换算金额并确认 `holder` 余额足够
    async fn checked_amount(&self, token: &str, holder: &str, amount: Decimal) -> ProviderResult<U256> {
        if amount <= Decimal::ZERO {
            return Err(ProviderError::invalid_request(format!(
                "Token amount must be greater than zero, got {}",
                amount
            )));
        }
        let decimals = self.decimals(token).await?;
        let amount_base = units::to_base_units(amount, decimals)?;
        let balance = self.balance_base(token, holder).await?;
        if balance < amount_base {
            return Err(ProviderError::insufficient_balance(
                units::from_base_units(balance, decimals)?,
                amount,
            ));
        }
        Ok(amount_base)
    }

    async fn transfer(
        &self,
        token: &str,
        signer: &dyn TransactionSigner,
        to: &str,
        amount: Decimal,
    ) -> ProviderResult<TransactionReceipt> {
        let amount_base = self.checked_amount(token, &signer.address(), amount).await?;
        let request = ContractCallRequest::new(
            token,
            erc20(
                "transfer",
                vec![ParamType::Address, ParamType::Uint(256)],
                vec![ParamType::Bool],
            ),
            vec![Token::Address(parse_address(to)?), Token::Uint(amount_base)],
        );
        let receipt = self.invoker().invoke(&request, signer).await?;
        tracing::info!(
            token = %token,
            from = %signer.address(),
            to = %to,
            amount = %amount,
            tx_hash = %receipt.tx_hash,
            "Token transfer confirmed"
        );
        Ok(receipt)
    }

    pub async fn send_token(
        &self,
        token: &str,
        signer: &dyn TransactionSigner,
        to: &str,
        amount: Decimal,
    ) -> ProviderResult<TransactionReceipt> {
        self.transfer(token, signer, to, amount).await
    }

    /// 需要调用方具有 minter 权限
    pub async fn mint_token(
        &self,
        token: &str,
        signer: &dyn TransactionSigner,
        to: &str,
        amount: Decimal,
    ) -> ProviderResult<TransactionReceipt> {
        let decimals = self.decimals(token).await?;
        let request = ContractCallRequest::new(
            token,
            erc20("mint", vec![ParamType::Address, ParamType::Uint(256)], vec![]),
            vec![
                Token::Address(parse_address(to)?),
                Token::Uint(units::to_base_units(amount, decimals)?),
            ],
        );
        self.invoker().invoke(&request, signer).await
    }

    pub async fn burn_token(
        &self,
        token: &str,
        signer: &dyn TransactionSigner,
        amount: Decimal,
    ) -> ProviderResult<TransactionReceipt> {
        let amount_base = self.checked_amount(token, &signer.address(), amount).await?;
        let request = ContractCallRequest::new(
            token,
            erc20("burn", vec![ParamType::Uint(256)], vec![]),
            vec![Token::Uint(amount_base)],
        );
        self.invoker().invoke(&request, signer).await
    }

    /// 锁定 = 转入桥池
    pub async fn lock_token(
        &self,
        token: &str,
        signer: &dyn TransactionSigner,
        amount: Decimal,
    ) -> ProviderResult<TransactionReceipt> {
        let pool = self.session.bridge_pool()?.to_string();
        self.transfer(token, signer, &pool, amount).await
    }

    /// 解锁 = 桥池转给接收方
    pub async fn unlock_token(
        &self,
        token: &str,
        recipient: &str,
        amount: Decimal,
    ) -> ProviderResult<TransactionReceipt> {
        let pool_signer = self.session.pool_signer()?;
        self.transfer(token, pool_signer, recipient, amount).await
    }
}
