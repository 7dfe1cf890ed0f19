use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::database::Database;
use crate::error::Error;
use crate::remote::{QueryResponse, RemoteApi};

use super::synthesize::synthesize_campaign;
use super::{db, Campaign, CampaignDraft, CampaignFilter, CampaignId, CampaignRequest};

/// The stored campaign together with the backend's step-by-step transcript.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct CreatedCampaign {
    pub campaign: Campaign,
    pub responses: Vec<QueryResponse>,
}

#[tracing::instrument(skip(db, remote))]
pub async fn create_campaign(
    db: &dyn Database,
    remote: &dyn RemoteApi,
    request: CampaignRequest,
) -> Result<CreatedCampaign, Error> {
    let draft = request.validate()?;

    create_campaign_from_draft(db, remote, &draft).await
}

#[tracing::instrument(skip(db, remote))]
pub async fn create_campaign_from_draft(
    db: &dyn Database,
    remote: &dyn RemoteApi,
    draft: &CampaignDraft,
) -> Result<CreatedCampaign, Error> {
    let response = remote.execute_queries(&draft.to_request()).await?;
    debug!(steps = response.responses.len(), "backend processed campaign");

    let campaign = synthesize_campaign(draft, &response, Utc::now(), &mut rand::thread_rng());
    let replaced = db::upsert_campaign(db, &campaign).await?;
    info!(campaign_id = %campaign.id, replaced, "campaign stored");

    Ok(CreatedCampaign {
        campaign,
        responses: response.responses,
    })
}

/// Stored campaigns matching `filter`, in stored order.
#[tracing::instrument(skip(db))]
pub async fn get_campaigns(
    db: &dyn Database,
    filter: &CampaignFilter,
) -> Result<Vec<Campaign>, Error> {
    let mut campaigns = db::fetch_campaigns(db).await?;
    campaigns.retain(|campaign| filter.matches(campaign));

    Ok(campaigns)
}

/// Reads the stored campaign. The backend is asked for live details as well,
/// but its answer is only logged; the stored record is what gets returned.
#[tracing::instrument(skip(db, remote))]
pub async fn get_campaign_by_id(
    db: &dyn Database,
    remote: &dyn RemoteApi,
    campaign_id: &CampaignId,
) -> Result<Campaign, Error> {
    let campaign = db::assert_campaign_exists(db, campaign_id).await?;

    match remote.fetch_campaign_detail(campaign_id).await {
        Ok(detail) => debug!(%campaign_id, %detail, "fetched live campaign detail"),
        Err(err) => warn!(%campaign_id, error = %err, "live campaign detail unavailable"),
    }

    Ok(campaign)
}

/// Only the local record is removed; the backend keeps its campaign.
#[tracing::instrument(skip(db))]
pub async fn delete_campaign(db: &dyn Database, campaign_id: &CampaignId) -> Result<(), Error> {
    let removed = db::delete_campaign(db, campaign_id).await?;
    info!(%campaign_id, removed, "campaign deleted");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::campaign::CampaignStatus;
    use crate::database::MemoryDatabase;
    use crate::remote::test::MockRemote;
    use crate::remote::ApiResponse;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::{Arc, Mutex};
    use tokio::sync::Mutex as AsyncMutex;

    /// Yields to the runtime around every storage call, like a networked
    /// store would.
    #[derive(Default)]
    struct YieldingDatabase {
        inner: MemoryDatabase,
    }

    #[async_trait]
    impl Database for YieldingDatabase {
        async fn get_item(&self, key: &str) -> Result<Option<String>, Error> {
            tokio::task::yield_now().await;
            self.inner.get_item(key).await
        }

        async fn set_item(&self, key: &str, value: String) -> Result<(), Error> {
            tokio::task::yield_now().await;
            self.inner.set_item(key, value).await
        }

        async fn remove_item(&self, key: &str) -> Result<(), Error> {
            tokio::task::yield_now().await;
            self.inner.remove_item(key).await
        }

        fn write_lock(&self) -> &AsyncMutex<()> {
            self.inner.write_lock()
        }
    }

    fn request(campaign_id: &str, budget: &str) -> CampaignRequest {
        CampaignRequest {
            budget: budget.into(),
            days: "10".into(),
            campaign_id: campaign_id.into(),
            url: "https://example.com".into(),
        }
    }

    fn working_remote() -> MockRemote {
        let mut remote = MockRemote::new();
        remote.on_execute_queries = Box::new(|_| {
            Ok(ApiResponse {
                responses: vec![QueryResponse {
                    state: "End".into(),
                    response: "Headlines: One, Two".into(),
                    duration: 0.5,
                    audience_criteria: None,
                }],
            })
        });
        remote
    }

    #[tokio::test]
    async fn can_create_campaign() {
        let db = MemoryDatabase::new();
        let mut remote = working_remote();
        let called_execute = Arc::new(Mutex::new(false));
        let called_execute_clone = Arc::clone(&called_execute);
        remote.on_execute_queries = Box::new(move |request| {
            *called_execute_clone.lock().unwrap() = true;
            assert_eq!(request.campaign_id, "spring");
            assert_eq!(request.budget, "250");
            Ok(ApiResponse::default())
        });

        let created = create_campaign(&db, &remote, request("spring", "250"))
            .await
            .unwrap();

        assert_eq!(created.campaign.id, CampaignId::from("spring"));
        assert_eq!(created.campaign.budget, 250.0);
        assert!(
            *called_execute.lock().unwrap(),
            "remote.execute_queries was not called"
        );
        assert_eq!(db::fetch_campaigns(&db).await.unwrap(), vec![created.campaign]);
    }

    #[tokio::test]
    async fn created_campaign_without_id_gets_generated_one() {
        let db = MemoryDatabase::new();
        let remote = working_remote();

        let created = create_campaign(&db, &remote, request("", "100"))
            .await
            .unwrap();

        assert_eq!(created.campaign.id.as_str().len(), 6);
        assert_eq!(created.responses.len(), 1);
    }

    #[tokio::test]
    async fn distinct_ids_accumulate_and_same_id_overwrites() {
        let db = MemoryDatabase::new();
        let remote = working_remote();

        for id in &["a", "b", "c"] {
            create_campaign(&db, &remote, request(id, "100"))
                .await
                .unwrap();
        }
        assert_eq!(db::fetch_campaigns(&db).await.unwrap().len(), 3);

        create_campaign(&db, &remote, request("b", "900"))
            .await
            .unwrap();
        let campaigns = db::fetch_campaigns(&db).await.unwrap();

        assert_eq!(campaigns.len(), 3);
        assert_eq!(campaigns[1].id, CampaignId::from("b"));
        assert_eq!(campaigns[1].budget, 900.0);
    }

    #[tokio::test]
    async fn concurrent_creates_keep_every_campaign() {
        let db = Arc::new(YieldingDatabase::default());
        let remote = Arc::new(working_remote());

        let tasks: Vec<_> = (0..10)
            .map(|i| {
                let db = Arc::clone(&db);
                let remote = Arc::clone(&remote);
                tokio::spawn(async move {
                    let campaign_request = request(&format!("id{}", i), "100");
                    create_campaign(db.as_ref(), remote.as_ref(), campaign_request).await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let campaigns = db::fetch_campaigns(db.as_ref()).await.unwrap();
        assert_eq!(campaigns.len(), 10);
    }

    #[tokio::test]
    async fn concurrent_deletes_and_creates_do_not_interfere() {
        let db = Arc::new(YieldingDatabase::default());
        let remote = Arc::new(working_remote());
        for id in &["old1", "old2"] {
            create_campaign(db.as_ref(), remote.as_ref(), request(id, "100"))
                .await
                .unwrap();
        }

        let delete = {
            let db = Arc::clone(&db);
            tokio::spawn(async move {
                delete_campaign(db.as_ref(), &CampaignId::from("old1")).await
            })
        };
        let create = {
            let db = Arc::clone(&db);
            let remote = Arc::clone(&remote);
            tokio::spawn(async move {
                create_campaign(db.as_ref(), remote.as_ref(), request("new", "100")).await
            })
        };
        delete.await.unwrap().unwrap();
        create.await.unwrap().unwrap();

        let mut ids: Vec<_> = db::fetch_campaigns(db.as_ref())
            .await
            .unwrap()
            .into_iter()
            .map(|campaign| campaign.id)
            .collect();
        ids.sort();
        assert_eq!(ids, vec![CampaignId::from("new"), CampaignId::from("old2")]);
    }

    #[tokio::test]
    async fn search_matches_name_or_url_and_status() {
        let db = MemoryDatabase::new();
        let remote = working_remote();
        let mut bakery = request("bakery", "100");
        bakery.url = "https://Corner-Bakery.example.com".into();
        for campaign_request in vec![request("shoes", "100"), bakery, request("hats", "100")] {
            create_campaign(&db, &remote, campaign_request)
                .await
                .unwrap();
        }
        let mut campaigns = db::fetch_campaigns(&db).await.unwrap();
        campaigns[2].status = CampaignStatus::Completed;
        campaigns[2].name = "Hats For Winter".into();
        db::upsert_campaign(&db, &campaigns[2]).await.unwrap();

        let everything = get_campaigns(&db, &CampaignFilter::default())
            .await
            .unwrap();
        assert_eq!(everything, db::fetch_campaigns(&db).await.unwrap());

        let by_url = CampaignFilter {
            search: Some("corner-BAKERY".into()),
            status: None,
        };
        let found = get_campaigns(&db, &by_url).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, CampaignId::from("bakery"));

        let by_name_and_status = CampaignFilter {
            search: Some("winter".into()),
            status: Some(CampaignStatus::Completed),
        };
        let found = get_campaigns(&db, &by_name_and_status).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, CampaignId::from("hats"));

        let wrong_status = CampaignFilter {
            search: Some("winter".into()),
            status: Some(CampaignStatus::Running),
        };
        assert!(get_campaigns(&db, &wrong_status).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn backend_failure_propagates_and_stores_nothing() {
        let db = MemoryDatabase::new();
        let remote = MockRemote::new();

        let result = create_campaign(&db, &remote, request("x", "100")).await;

        assert!(matches!(
            result.unwrap_err(),
            Error::RemoteCallFailed { .. }
        ));
        assert!(db::fetch_campaigns(&db).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_request_is_rejected_before_backend_call() {
        let db = MemoryDatabase::new();
        let mut remote = MockRemote::new();
        remote.on_execute_queries = Box::new(|_| panic!("remote should not be called"));
        let mut bad = request("x", "100");
        bad.url = "not a url".into();

        let result = create_campaign(&db, &remote, bad).await;

        assert_eq!(
            result.unwrap_err(),
            Error::InvalidUrl {
                url: "not a url".into()
            }
        );
    }

    #[tokio::test]
    async fn get_campaign_by_id_ignores_enrichment_result() {
        let db = MemoryDatabase::new();
        let mut remote = working_remote();
        let created = create_campaign(&db, &remote, request("live", "100"))
            .await
            .unwrap();
        let called_detail = Arc::new(Mutex::new(false));
        let called_detail_clone = Arc::clone(&called_detail);
        remote.on_fetch_campaign_detail = Box::new(move |campaign_id| {
            *called_detail_clone.lock().unwrap() = true;
            assert_eq!(campaign_id, CampaignId::from("live"));
            Ok(json!({ "name": "Something Else", "budget": 1 }))
        });

        let campaign = get_campaign_by_id(&db, &remote, &CampaignId::from("live"))
            .await
            .unwrap();

        assert_eq!(campaign, created.campaign);
        assert!(
            *called_detail.lock().unwrap(),
            "remote.fetch_campaign_detail was not called"
        );
    }

    #[tokio::test]
    async fn get_campaign_by_id_survives_backend_outage() {
        let db = MemoryDatabase::new();
        let mut remote = working_remote();
        create_campaign(&db, &remote, request("offline", "100"))
            .await
            .unwrap();
        remote.on_fetch_campaign_detail = Box::new(|_| {
            Err(Error::RemoteCallFailed {
                message: "timed out".into(),
            })
        });

        let campaign = get_campaign_by_id(&db, &remote, &CampaignId::from("offline")).await;

        assert!(campaign.is_ok());
    }

    #[tokio::test]
    async fn get_campaign_by_id_returns_error_if_doesnt_exist() {
        let db = MemoryDatabase::new();
        let remote = MockRemote::new();

        let result = get_campaign_by_id(&db, &remote, &CampaignId::from("nope")).await;

        assert_eq!(
            result.unwrap_err(),
            Error::CampaignNotFound {
                campaign_id: CampaignId::from("nope")
            }
        );
    }

    #[tokio::test]
    async fn delete_removes_only_the_given_campaign() {
        let db = MemoryDatabase::new();
        let remote = working_remote();
        for id in &["keep", "drop", "also-keep"] {
            create_campaign(&db, &remote, request(id, "100"))
                .await
                .unwrap();
        }

        delete_campaign(&db, &CampaignId::from("drop")).await.unwrap();
        delete_campaign(&db, &CampaignId::from("never-existed"))
            .await
            .unwrap();

        let ids: Vec<_> = db::fetch_campaigns(&db)
            .await
            .unwrap()
            .into_iter()
            .map(|campaign| campaign.id)
            .collect();
        assert_eq!(
            ids,
            vec![CampaignId::from("keep"), CampaignId::from("also-keep")]
        );
    }
}
