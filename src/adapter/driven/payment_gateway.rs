use crate::domain::port::{GatewayCommit, GatewayError, GatewayTransaction, PaymentGateway};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::env;

/// 決済ゲートウェイ接続設定
/// 環境変数から一度だけ読み込み、アダプターへ明示的に渡す
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub commerce_code: String,
    pub api_key: String,
}

impl GatewayConfig {
    /// 環境変数から設定を読み取る
    /// 環境変数が設定されていない場合は統合環境のデフォルト値を使用
    pub fn from_env() -> Self {
        Self {
            base_url: env::var("GATEWAY_BASE_URL")
                .unwrap_or_else(|_| "https://webpay3gint.transbank.cl".to_string()),
            commerce_code: env::var("GATEWAY_COMMERCE_CODE")
                .unwrap_or_else(|_| "597055555532".to_string()),
            api_key: env::var("GATEWAY_API_KEY").unwrap_or_else(|_| {
                "579B532A7440BB0C9079DED94D31EA1615BACEB56610332264630D42D0A36B1C".to_string()
            }),
        }
    }
}

#[derive(Serialize)]
struct CreateTransactionRequest<'a> {
    buy_order: &'a str,
    session_id: &'a str,
    amount: i64,
    return_url: &'a str,
}

#[derive(Deserialize)]
struct CreateTransactionResponse {
    token: String,
    url: String,
}

#[derive(Deserialize)]
struct CommitTransactionResponse {
    status: String,
    response_code: i32,
    authorization_code: Option<String>,
    amount: i64,
    buy_order: String,
    installments_number: Option<u32>,
    payment_type_code: Option<String>,
}

/// HTTP決済ゲートウェイ
/// リダイレクト型のカード決済ゲートウェイとのREST APIハンドシェイクを実装する。
/// トークンの発行（create）とトランザクションの確定（commit）は
/// 別々のHTTP呼び出しであり、間にデータベーストランザクションを挟まない。
pub struct HttpPaymentGateway {
    client: reqwest::Client,
    config: GatewayConfig,
}

impl HttpPaymentGateway {
    /// 新しいHTTP決済ゲートウェイを作成
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn transactions_url(&self) -> String {
        format!(
            "{}/rswebpaytransaction/api/webpay/v1.2/transactions",
            self.config.base_url
        )
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn create(
        &self,
        buy_order: &str,
        session_id: &str,
        amount: i64,
        return_url: &str,
    ) -> Result<GatewayTransaction, GatewayError> {
        let request = CreateTransactionRequest {
            buy_order,
            session_id,
            amount,
            return_url,
        };

        let response = self
            .client
            .post(self.transactions_url())
            .header("Tbk-Api-Key-Id", &self.config.commerce_code)
            .header("Tbk-Api-Key-Secret", &self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| GatewayError::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::RequestFailed(format!(
                "create returned {}: {}",
                status, body
            )));
        }

        let body: CreateTransactionResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

        Ok(GatewayTransaction {
            token: body.token,
            redirect_url: body.url,
        })
    }

    async fn commit(&self, token: &str) -> Result<GatewayCommit, GatewayError> {
        let response = self
            .client
            .put(format!("{}/{}", self.transactions_url(), token))
            .header("Tbk-Api-Key-Id", &self.config.commerce_code)
            .header("Tbk-Api-Key-Secret", &self.config.api_key)
            .send()
            .await
            .map_err(|e| GatewayError::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::RequestFailed(format!(
                "commit returned {}: {}",
                status, body
            )));
        }

        let body: CommitTransactionResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

        Ok(GatewayCommit {
            status: body.status,
            response_code: body.response_code,
            authorization_code: body.authorization_code,
            amount: body.amount,
            buy_order: body.buy_order,
            installments_number: body.installments_number,
            payment_type_code: body.payment_type_code,
        })
    }
}
