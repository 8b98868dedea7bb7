//! REST-backed camera directory.
//!
//! Talks to the camera CRUD service:
//! - `GET {base}/api/cameras/{id}` returns one camera, 404 when unknown
//! - `GET {base}/api/cameras?status=online` returns `{ total, data: [...] }`

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;

use super::{CameraDirectory, CameraRecord, DirectoryError, DirectoryResult};
use crate::utils::pick;

/// List response of the camera service.
#[derive(Debug, Deserialize)]
struct CameraListResponse {
    #[serde(default)]
    data: Vec<CameraRecord>,
}

/// Camera directory reached over HTTP.
pub struct HttpCameraDirectory {
    client: Client,
    base_url: Url,
}

impl HttpCameraDirectory {
    /// Creates a directory client with the given per-request timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> DirectoryResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DirectoryError::Unavailable(format!("http client: {e}")))?;
        Self::with_client(client, base_url)
    }

    /// Creates a directory client sharing an existing HTTP client.
    pub fn with_client(client: Client, base_url: impl Into<String>) -> DirectoryResult<Self> {
        let raw = base_url.into();
        let base_url = Url::parse(&raw)
            .map_err(|e| DirectoryError::Unavailable(format!("invalid base url {raw}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(DirectoryError::Unavailable(format!(
                "invalid base url {raw}: cannot carry a path"
            )));
        }
        Ok(Self { client, base_url })
    }

    /// Appends path segments to the base URL. Each segment is percent-encoded,
    /// so `/`, `?` and `#` inside an id stay part of that one segment.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn camera_url(&self, camera_id: &str) -> Url {
        self.endpoint(&["api", "cameras", camera_id])
    }

    fn online_url(&self) -> Url {
        let mut url = self.endpoint(&["api", "cameras"]);
        url.query_pairs_mut().append_pair("status", "online");
        url
    }
}

/// Ids that could never name a single camera path segment.
fn is_unaddressable(camera_id: &str) -> bool {
    matches!(camera_id, "" | "." | "..")
}

fn unavailable(err: reqwest::Error) -> DirectoryError {
    DirectoryError::Unavailable(err.to_string())
}

#[async_trait]
impl CameraDirectory for HttpCameraDirectory {
    async fn lookup(&self, camera_id: &str) -> DirectoryResult<CameraRecord> {
        if is_unaddressable(camera_id) {
            return Err(DirectoryError::NotFound(camera_id.to_string()));
        }
        let response = self
            .client
            .get(self.camera_url(camera_id))
            .send()
            .await
            .map_err(unavailable)?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(DirectoryError::NotFound(camera_id.to_string())),
            status if status.is_success() => {
                response.json::<CameraRecord>().await.map_err(unavailable)
            }
            status => Err(DirectoryError::Unavailable(format!(
                "camera lookup returned HTTP {}",
                status.as_u16()
            ))),
        }
    }

    async fn random_online(&self) -> DirectoryResult<Option<CameraRecord>> {
        let response = self
            .client
            .get(self.online_url())
            .send()
            .await
            .map_err(unavailable)?;

        if !response.status().is_success() {
            return Err(DirectoryError::Unavailable(format!(
                "camera list returned HTTP {}",
                response.status().as_u16()
            )));
        }

        let list: CameraListResponse = response.json().await.map_err(unavailable)?;
        // The service already filters by status; re-check in case it ignores the query.
        let online: Vec<&CameraRecord> = list.data.iter().filter(|c| c.is_online()).collect();
        Ok(pick(&online).map(|c| (*c).clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Path;
    use axum::http::StatusCode as AxumStatus;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::{json, Value};

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    async fn camera(Path(id): Path<String>) -> Result<Json<Value>, AxumStatus> {
        match id.as_str() {
            "CAM-0001" => Ok(Json(json!({
                "id": "CAM-0001",
                "name": "Dock Cam 1",
                "zone": "Loading Dock A",
                "industry": "warehouse",
                "status": "online",
                "streamUrl": "rtsp://10.0.0.1:554/stream1"
            }))),
            "CAM-0500" => Err(AxumStatus::INTERNAL_SERVER_ERROR),
            _ => Err(AxumStatus::NOT_FOUND),
        }
    }

    async fn online() -> Json<Value> {
        Json(json!({
            "total": 2,
            "data": [
                {"id": "CAM-0001", "name": "Dock Cam 1", "zone": "Loading Dock A",
                 "industry": "warehouse", "status": "online", "streamUrl": "rtsp://a"},
                {"id": "CAM-0002", "name": "Rig Cam 2", "zone": "Rig Platform A",
                 "industry": "oil_gas", "status": "offline", "streamUrl": "rtsp://b"}
            ]
        }))
    }

    fn router() -> Router {
        Router::new()
            .route("/api/cameras", get(online))
            .route("/api/cameras/{id}", get(camera))
    }

    #[test]
    fn urls_strip_trailing_slash() {
        let dir = HttpCameraDirectory::with_client(Client::new(), "http://cams:8080/").unwrap();
        assert_eq!(
            dir.camera_url("CAM-1").as_str(),
            "http://cams:8080/api/cameras/CAM-1"
        );
        assert_eq!(
            dir.online_url().as_str(),
            "http://cams:8080/api/cameras?status=online"
        );
    }

    #[test]
    fn base_path_prefix_is_kept() {
        let dir = HttpCameraDirectory::with_client(Client::new(), "http://cams/v1/").unwrap();
        assert_eq!(dir.camera_url("CAM-1").as_str(), "http://cams/v1/api/cameras/CAM-1");
    }

    #[test]
    fn camera_id_is_one_encoded_segment() {
        let dir = HttpCameraDirectory::with_client(Client::new(), "http://cams").unwrap();
        let url = dir.camera_url("../cameras/CAM-0001?x#frag");
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);
        assert_eq!(url.path_segments().map(|s| s.count()), Some(3));
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        assert!(HttpCameraDirectory::with_client(Client::new(), "not a url").is_err());
    }

    #[tokio::test]
    async fn ids_with_url_syntax_do_not_alias_other_cameras() {
        let base = serve(router()).await;
        let dir = HttpCameraDirectory::new(base, Duration::from_secs(5)).unwrap();

        for id in ["CAM-0001?x", "CAM-0001#frag", "../cameras/CAM-0001", "CAM-0001/", ".."] {
            assert_eq!(
                dir.lookup(id).await.unwrap_err(),
                DirectoryError::NotFound(id.to_string()),
                "id {id:?} must not resolve to CAM-0001"
            );
        }
        assert_eq!(dir.lookup("CAM-0001").await.unwrap().id, "CAM-0001");
    }

    #[tokio::test]
    async fn lookup_maps_status_codes() {
        let base = serve(router()).await;
        let dir = HttpCameraDirectory::new(base, Duration::from_secs(5)).unwrap();

        let record = dir.lookup("CAM-0001").await.unwrap();
        assert_eq!(record.stream_url, "rtsp://10.0.0.1:554/stream1");

        assert_eq!(
            dir.lookup("CAM-0404").await.unwrap_err(),
            DirectoryError::NotFound("CAM-0404".to_string())
        );
        assert!(matches!(
            dir.lookup("CAM-0500").await.unwrap_err(),
            DirectoryError::Unavailable(_)
        ));
    }

    #[tokio::test]
    async fn random_online_picks_from_list() {
        let base = serve(router()).await;
        let dir = HttpCameraDirectory::new(base, Duration::from_secs(5)).unwrap();
        let record = dir.random_online().await.unwrap().unwrap();
        assert_eq!(record.id, "CAM-0001");
    }

    #[tokio::test]
    async fn unreachable_directory_is_unavailable() {
        // Bind then drop to obtain a port nothing listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let dir = HttpCameraDirectory::new(format!("http://{addr}"), Duration::from_secs(2)).unwrap();
        assert!(matches!(
            dir.lookup("CAM-0001").await.unwrap_err(),
            DirectoryError::Unavailable(_)
        ));
    }
}
