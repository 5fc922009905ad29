//! HTTP 客户端 - 订单后端数据源
//!
//! 按 ID 批量拉取订单快照，供小票渲染。后端只返回实际存在的
//! 订单；部分 ID 缺失不是错误。

use async_trait::async_trait;
use reqwest::Client;

use crate::fulfillment::{OrderRecord, OrderSource, SourceError};

/// 订单后端客户端
///
/// # 示例
///
/// ```ignore
/// let client = BackendClient::new("https://backend:3000")
///     .with_token("jwt-token");
///
/// let orders = client.fetch_many(&["order-1".into()]).await?;
/// ```
#[derive(Debug, Clone)]
pub struct BackendClient {
    /// HTTP 客户端
    client: Client,
    /// 后端地址
    base_url: String,
    /// JWT 令牌
    token: Option<String>,
}

impl BackendClient {
    /// 创建客户端
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.into(),
            token: None,
        }
    }

    /// 设置认证令牌
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

#[async_trait]
impl OrderSource for BackendClient {
    async fn fetch_many(&self, order_ids: &[String]) -> Result<Vec<OrderRecord>, SourceError> {
        let url = format!("{}/api/orders", self.base_url);

        let mut request = self
            .client
            .get(&url)
            .query(&[("ids", order_ids.join(","))]);
        if let Some(ref token) = self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SourceError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SourceError::Backend(format!(
                "{} returned {}",
                url,
                response.status()
            )));
        }

        response
            .json::<Vec<OrderRecord>>()
            .await
            .map_err(|e| SourceError::Backend(format!("Invalid order payload: {}", e)))
    }
}
