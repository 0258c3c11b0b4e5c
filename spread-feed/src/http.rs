use crate::{
    config::FeedConfig,
    error::FeedError,
    graphql::{
        CHART_PAIRS_SPREADS_QUERY, ChartPairsSpreadsData, ChartPairsSpreadsVariables,
        GraphQlRequest, GraphQlResponse, SPREADS_QUERY, SpreadsData,
    },
};
use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use spread_engine::{HistoricalRequest, HistoricalSeries, ListingPage, ListingQuery};
use tracing::debug;
use url::Url;

/// Request/response access to the spread server.
#[async_trait]
pub trait SpreadApi: Send + Sync {
    /// Fetch one page of the latest spread per pair.
    async fn fetch_listing(&self, query: ListingQuery) -> Result<ListingPage, FeedError>;

    /// Fetch the historical series of every `(pair, side)` in the request, in request order.
    async fn fetch_historical(
        &self,
        request: &HistoricalRequest,
    ) -> Result<Vec<HistoricalSeries>, FeedError>;
}

/// [`SpreadApi`] over GraphQL HTTP POST requests.
#[derive(Debug, Clone)]
pub struct GraphQlHttpClient {
    http: reqwest::Client,
    endpoint: Url,
}

impl GraphQlHttpClient {
    pub fn new(config: &FeedConfig) -> Result<Self, FeedError> {
        let endpoint = Url::parse(&config.http_url).map_err(|error| FeedError::InvalidUrl {
            url: config.http_url.clone(),
            reason: error.to_string(),
        })?;

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self { http, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn execute<V, T>(
        &self,
        operation_name: &str,
        query: &str,
        variables: V,
    ) -> Result<T, FeedError>
    where
        V: Serialize + Send + Sync,
        T: DeserializeOwned + Send,
    {
        debug!(operation = operation_name, endpoint = %self.endpoint, "executing GraphQL query");

        let request = GraphQlRequest::new(operation_name, query, variables);
        let response = self
            .http
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await?
            .error_for_status()?;

        response.json::<GraphQlResponse<T>>().await?.into_data()
    }
}

#[async_trait]
impl SpreadApi for GraphQlHttpClient {
    async fn fetch_listing(&self, query: ListingQuery) -> Result<ListingPage, FeedError> {
        self.execute::<_, SpreadsData>("Spreads", SPREADS_QUERY, query)
            .await
            .map(ListingPage::from)
    }

    async fn fetch_historical(
        &self,
        request: &HistoricalRequest,
    ) -> Result<Vec<HistoricalSeries>, FeedError> {
        self.execute::<_, ChartPairsSpreadsData>(
            "ChartPairsSpreads",
            CHART_PAIRS_SPREADS_QUERY,
            ChartPairsSpreadsVariables::from(request),
        )
        .await
        .map(Vec::<HistoricalSeries>::from)
    }
}
