//! [`OrgConnection`] over the REST client.

use forcesync_package::ArchiveStream;
use forcesync_protocol::constants::{SOBJECT_CONTAINER_ASYNC_REQUEST, SOBJECT_METADATA_CONTAINER};
use forcesync_protocol::{
    ContainerAsyncRequest, ContainerMember, DeployOptions, DeployResult, Environment,
    NewContainer, NewContainerDeploy, OAuthCredentials, RecordId,
};
use forcesync_rest::Client;

use crate::connection::{BoxFuture, OrgConnection};

impl OrgConnection for Client {
    fn query_record_ids<'a>(
        &'a self,
        creds: &'a OAuthCredentials,
        soql: &'a str,
    ) -> BoxFuture<'a, Vec<String>> {
        Box::pin(async move {
            let result = self.tooling_query::<RecordId>(creds, soql).await?;
            Ok(result.records.into_iter().map(|r| r.id).collect())
        })
    }

    fn create_container<'a>(
        &'a self,
        creds: &'a OAuthCredentials,
        name: &'a str,
    ) -> BoxFuture<'a, String> {
        Box::pin(async move {
            let body = NewContainer {
                name: name.to_string(),
            };
            Ok(self
                .tooling_create(creds, SOBJECT_METADATA_CONTAINER, &body)
                .await?)
        })
    }

    fn add_container_member<'a>(
        &'a self,
        creds: &'a OAuthCredentials,
        sobject: &'a str,
        member: &'a ContainerMember,
    ) -> BoxFuture<'a, String> {
        Box::pin(async move { Ok(self.tooling_create(creds, sobject, member).await?) })
    }

    fn deploy_container<'a>(
        &'a self,
        creds: &'a OAuthCredentials,
        container_id: &'a str,
        check_only: bool,
    ) -> BoxFuture<'a, String> {
        Box::pin(async move {
            let body = NewContainerDeploy {
                metadata_container_id: container_id.to_string(),
                is_check_only: check_only,
            };
            Ok(self
                .tooling_create(creds, SOBJECT_CONTAINER_ASYNC_REQUEST, &body)
                .await?)
        })
    }

    fn container_deploy_status<'a>(
        &'a self,
        creds: &'a OAuthCredentials,
        request_id: &'a str,
    ) -> BoxFuture<'a, ContainerAsyncRequest> {
        Box::pin(async move {
            Ok(self
                .tooling_get(creds, SOBJECT_CONTAINER_ASYNC_REQUEST, request_id)
                .await?)
        })
    }

    fn delete_container<'a>(
        &'a self,
        creds: &'a OAuthCredentials,
        container_id: &'a str,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            Ok(self
                .tooling_delete(creds, SOBJECT_METADATA_CONTAINER, container_id)
                .await?)
        })
    }

    fn update_record<'a>(
        &'a self,
        creds: &'a OAuthCredentials,
        sobject: &'a str,
        id: &'a str,
        fields: &'a serde_json::Value,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move { Ok(self.tooling_update(creds, sobject, id, fields).await?) })
    }

    fn submit_deploy<'a>(
        &'a self,
        creds: &'a OAuthCredentials,
        archive: ArchiveStream,
        options: &'a DeployOptions,
    ) -> BoxFuture<'a, String> {
        Box::pin(async move { Ok(self.deploy(creds, archive, options).await?.id) })
    }

    fn deploy_status<'a>(
        &'a self,
        creds: &'a OAuthCredentials,
        job_id: &'a str,
    ) -> BoxFuture<'a, DeployResult> {
        Box::pin(async move {
            let request = Client::deploy_status(self, creds, job_id).await?;
            // A request the service has not picked up yet carries no result.
            Ok(request.deploy_result.unwrap_or_else(|| DeployResult {
                id: request.id,
                ..DeployResult::default()
            }))
        })
    }

    fn refresh_access_token<'a>(
        &'a self,
        env: Environment,
        client_id: &'a str,
        refresh_token: &'a str,
    ) -> BoxFuture<'a, OAuthCredentials> {
        Box::pin(async move { Ok(self.refresh_token(env, client_id, refresh_token).await?) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forcesync_protocol::DeployStatus;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Answers one request with `body` and returns the request head.
    async fn one_shot(body: &str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let body = body.to_string();

        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];
            let head = loop {
                let n = stream.read(&mut chunk).await.unwrap();
                buf.extend_from_slice(&chunk[..n]);
                let text = String::from_utf8_lossy(&buf).to_string();
                if let Some((head, rest)) = text.split_once("\r\n\r\n") {
                    let length = head
                        .to_ascii_lowercase()
                        .lines()
                        .find_map(|l| l.strip_prefix("content-length:").map(str::to_string))
                        .and_then(|v| v.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if rest.len() >= length || n == 0 {
                        break head.to_string();
                    }
                }
                if n == 0 {
                    break text;
                }
            };

            let resp = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            let _ = stream.write_all(resp.as_bytes()).await;
            let _ = stream.shutdown().await;
            head
        });

        (url, handle)
    }

    fn creds(url: &str) -> OAuthCredentials {
        OAuthCredentials::new("tok", url)
    }

    #[tokio::test]
    async fn query_records_become_ids() {
        let (url, handle) = one_shot(
            r#"{"size":2,"totalSize":2,"done":true,"records":[
                {"attributes":{"type":"ApexClass"},"Id":"01p000000000001"},
                {"attributes":{"type":"ApexClass"},"Id":"01p000000000002"}]}"#,
        )
        .await;

        let client = Client::new().unwrap();
        let ids = OrgConnection::query_record_ids(
            &client,
            &creds(&url),
            "SELECT Id FROM ApexClass WHERE Name = 'Foo'",
        )
        .await
        .unwrap();
        assert_eq!(ids, vec!["01p000000000001", "01p000000000002"]);

        let head = handle.await.unwrap();
        assert!(head.starts_with("GET /services/data/v36.0/tooling/query/?q="));
    }

    #[tokio::test]
    async fn empty_query_is_no_ids() {
        let (url, handle) = one_shot(r#"{"size":0,"totalSize":0,"done":true,"records":[]}"#).await;

        let client = Client::new().unwrap();
        let ids = OrgConnection::query_record_ids(&client, &creds(&url), "SELECT Id FROM ApexPage")
            .await
            .unwrap();
        assert!(ids.is_empty());
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn deploy_without_result_is_pending() {
        let (url, handle) = one_shot(r#"{"id":"0Af000000000001","deployResult":null}"#).await;

        let client = Client::new().unwrap();
        let result = OrgConnection::deploy_status(&client, &creds(&url), "0Af000000000001")
            .await
            .unwrap();
        assert_eq!(result.id, "0Af000000000001");
        assert_eq!(result.status, DeployStatus::Pending);
        assert!(!result.done);

        let head = handle.await.unwrap();
        assert!(head.starts_with(
            "GET /services/data/v36.0/metadata/deployRequest/0Af000000000001?includeDetails=true"
        ));
    }

    #[tokio::test]
    async fn deploy_result_is_unwrapped() {
        let (url, handle) = one_shot(
            r#"{"id":"0Af000000000001","deployResult":{"id":"0Af000000000001",
                "status":"Succeeded","done":true,"success":true,"numberComponentsDeployed":2}}"#,
        )
        .await;

        let client = Client::new().unwrap();
        let result = OrgConnection::deploy_status(&client, &creds(&url), "0Af000000000001")
            .await
            .unwrap();
        assert_eq!(result.status, DeployStatus::Succeeded);
        assert!(result.done);
        assert_eq!(result.number_components_deployed, 2);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn create_container_returns_id() {
        let (url, handle) =
            one_shot(r#"{"id":"1dc000000000001","success":true,"errors":[]}"#).await;

        let client = Client::new().unwrap();
        let id = OrgConnection::create_container(&client, &creds(&url), "forcesync-0123456789abcdef")
            .await
            .unwrap();
        assert_eq!(id, "1dc000000000001");

        let head = handle.await.unwrap();
        assert!(head.starts_with("POST /services/data/v36.0/tooling/sobjects/MetadataContainer/"));
    }
}
