use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{Instrument, debug, info, warn};

use crate::fetch::{HttpClient, fetch_json};
use crate::infra::firestore::values::{self, Document, DocumentPage};
use crate::services::StationStore;
use crate::station::{DailyMetrics, MonthlyMetrics, StationSummary};
use crate::sync::{ChangePayload, ChangeSink, ResourceKind, Subscription};
use crate::users::UserStats;

const DEFAULT_BASE_URL: &str = "https://firestore.googleapis.com/v1";
const PAGE_SIZE: u32 = 300;

/// Firestore REST client for the station and user collections.
///
/// Live updates are delivered by polling each subscribed resource every
/// `poll_interval` and emitting a snapshot whenever it differs from the last
/// one sent.
pub struct FirestoreClient<C> {
    http: Arc<C>,
    documents_url: String,
    poll_interval: Duration,
}

impl<C> Clone for FirestoreClient<C> {
    fn clone(&self) -> Self {
        Self {
            http: self.http.clone(),
            documents_url: self.documents_url.clone(),
            poll_interval: self.poll_interval,
        }
    }
}

impl<C: HttpClient + 'static> FirestoreClient<C> {
    pub fn new(http: C, project_id: &str, database: &str, poll_interval: Duration) -> Self {
        Self::with_base_url(http, DEFAULT_BASE_URL, project_id, database, poll_interval)
    }

    /// Same as [`FirestoreClient::new`] against another endpoint, such as the
    /// local emulator (`http://localhost:8080/v1`).
    pub fn with_base_url(
        http: C,
        base_url: &str,
        project_id: &str,
        database: &str,
        poll_interval: Duration,
    ) -> Self {
        Self {
            http: Arc::new(http),
            documents_url: format!(
                "{}/projects/{}/databases/{}/documents",
                base_url.trim_end_matches('/'),
                project_id,
                database
            ),
            poll_interval,
        }
    }

    /// Lists every document of the collection at `path`, following page tokens.
    #[tracing::instrument(skip(self))]
    async fn list_documents(&self, path: &str) -> Result<Vec<Document>> {
        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut url = reqwest::Url::parse(&format!("{}/{}", self.documents_url, path))
                .with_context(|| format!("invalid collection path '{path}'"))?;
            url.query_pairs_mut()
                .append_pair("pageSize", &PAGE_SIZE.to_string());
            if let Some(token) = &page_token {
                url.query_pairs_mut().append_pair("pageToken", token);
            }

            let Some(body) = fetch_json(self.http.as_ref(), url.as_str()).await? else {
                break;
            };
            let page: DocumentPage = serde_json::from_value(body)
                .with_context(|| format!("unexpected list response for '{path}'"))?;

            documents.extend(page.documents);
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!(count = documents.len(), "Documents listed");
        Ok(documents)
    }

    async fn get_document(&self, path: &str) -> Result<Option<Document>> {
        let url = format!("{}/{}", self.documents_url, path);
        match fetch_json(self.http.as_ref(), &url).await? {
            Some(body) => Ok(Some(
                serde_json::from_value(body)
                    .with_context(|| format!("unexpected document response for '{path}'"))?,
            )),
            None => Ok(None),
        }
    }

    /// Current state of one subscribed resource; `None` when the station
    /// document does not exist.
    async fn snapshot(&self, station_id: &str, kind: ResourceKind) -> Result<Option<ChangePayload>> {
        Ok(match kind {
            ResourceKind::StationFields => self
                .get_document(&format!("stations/{station_id}"))
                .await?
                .map(|doc| {
                    let (capacity, current_cap) = values::station_fields(&doc);
                    ChangePayload::StationFields {
                        capacity,
                        current_cap,
                    }
                }),
            ResourceKind::MonthlyMetrics => Some(ChangePayload::MonthlyMetrics(
                self.monthly_metrics(station_id).await?,
            )),
            ResourceKind::DailyMetrics => Some(ChangePayload::DailyMetrics(
                self.daily_metrics(station_id).await?,
            )),
        })
    }

    fn spawn_poller(&self, station_id: &str, kind: ResourceKind, sink: ChangeSink) -> JoinHandle<()> {
        let client = self.clone();
        let station_id = station_id.to_string();
        let span = tracing::info_span!("poll", station_id = %station_id, resource = %kind);

        tokio::spawn(
            async move {
                let mut ticker = tokio::time::interval(client.poll_interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                let mut last: Option<ChangePayload> = None;

                loop {
                    ticker.tick().await;
                    if sink.is_closed() {
                        break;
                    }

                    match client.snapshot(&station_id, kind).await {
                        Ok(Some(payload)) => {
                            if last.as_ref() == Some(&payload) {
                                continue;
                            }
                            debug!("Change detected");
                            if !sink.emit(payload.clone()) {
                                break;
                            }
                            last = Some(payload);
                        }
                        Ok(None) => {}
                        Err(e) => warn!(error = %e, "Listener poll failed"),
                    }
                }
                debug!("Listener stopped");
            }
            .instrument(span),
        )
    }
}

struct PollSubscription(JoinHandle<()>);

impl Subscription for PollSubscription {
    fn cancel(self: Box<Self>) -> Result<()> {
        self.0.abort();
        Ok(())
    }
}

#[async_trait]
impl<C: HttpClient + 'static> StationStore for FirestoreClient<C> {
    async fn query_stations(&self, term: &str) -> Result<Vec<StationSummary>> {
        let all: Vec<StationSummary> = self
            .list_documents("stations")
            .await?
            .iter()
            .map(values::station_summary)
            .collect();
        let total = all.len();

        let matching: Vec<StationSummary> = all.into_iter().filter(|s| s.matches(term)).collect();
        info!(term, total, matched = matching.len(), "Stations fetched");
        Ok(matching)
    }

    async fn monthly_metrics(&self, station_id: &str) -> Result<MonthlyMetrics> {
        let docs = self
            .list_documents(&format!("stations/{station_id}/metrics"))
            .await?;
        Ok(values::monthly_metrics(&docs))
    }

    async fn daily_metrics(&self, station_id: &str) -> Result<DailyMetrics> {
        let docs = self
            .list_documents(&format!("stations/{station_id}/daily"))
            .await?;
        Ok(values::daily_metrics(&docs))
    }

    async fn user_aggregates(&self) -> Result<UserStats> {
        let records: Vec<_> = self
            .list_documents("users")
            .await?
            .iter()
            .map(values::user_record)
            .collect();
        let stats = UserStats::from_records(&records, Utc::now());
        info!(
            total = stats.total_users,
            active = stats.active_users,
            repeat = stats.repeat_users,
            "User aggregates fetched"
        );
        Ok(stats)
    }

    async fn subscribe(
        &self,
        station_id: &str,
        kind: ResourceKind,
        sink: ChangeSink,
    ) -> Result<Box<dyn Subscription>> {
        Ok(Box::new(PollSubscription(self.spawn_poller(station_id, kind, sink))))
    }
}
