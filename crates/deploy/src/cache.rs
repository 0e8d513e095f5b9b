//! Remote record ids of local source files.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use forcesync_protocol::{OAuthCredentials, SourceName};
use tokio::sync::OnceCell;
use tracing::debug;

use crate::connection::OrgConnection;
use crate::error::DeployError;

/// Memoizes file name → remote record id for one session.
///
/// Each key is resolved by at most one successful query: concurrent
/// resolves of the same uncached name wait on the same in-flight lookup.
/// A failed lookup leaves the key unresolved so a later call retries.
///
/// Entries are never invalidated. A record renamed or deleted remotely
/// keeps its stale id until the session is dropped.
#[derive(Debug, Default)]
pub struct EntityIdentityCache {
    entries: Mutex<HashMap<String, Arc<OnceCell<String>>>>,
}

impl EntityIdentityCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached id for `file_name`, if resolved.
    pub fn get(&self, file_name: &str) -> Option<String> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.get(file_name).and_then(|cell| cell.get().cloned())
    }

    /// Number of resolved entries.
    pub fn len(&self) -> usize {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.values().filter(|cell| cell.initialized()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the record id of `name`, querying the org on first use.
    ///
    /// Zero matching records is [`DeployError::RecordNotFound`]; more than
    /// one is [`DeployError::AmbiguousRecord`].
    pub async fn resolve(
        &self,
        conn: &dyn OrgConnection,
        creds: &OAuthCredentials,
        name: &SourceName,
    ) -> Result<String, DeployError> {
        let cell = {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            entries.entry(name.file_name().to_string()).or_default().clone()
        };

        let id = cell
            .get_or_try_init(|| query_record_id(conn, creds, name))
            .await?;
        Ok(id.clone())
    }
}

async fn query_record_id(
    conn: &dyn OrgConnection,
    creds: &OAuthCredentials,
    name: &SourceName,
) -> Result<String, DeployError> {
    let soql = record_id_query(name);
    let mut ids = conn.query_record_ids(creds, &soql).await?;
    debug!(file = %name, matches = ids.len(), "resolved record id");

    match ids.len() {
        0 => Err(DeployError::RecordNotFound {
            kind: name.kind(),
            name: name.base().to_string(),
        }),
        1 => Ok(ids.remove(0)),
        count => Err(DeployError::AmbiguousRecord {
            kind: name.kind(),
            name: name.base().to_string(),
            count,
        }),
    }
}

/// Query selecting the id of the record backing `name`.
pub fn record_id_query(name: &SourceName) -> String {
    format!(
        "SELECT Id FROM {} WHERE Name = '{}'",
        name.kind().api_name(),
        escape_literal(name.base())
    )
}

/// Escapes a value for use inside a single-quoted query literal.
fn escape_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\'' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{Call, MockOrg};
    use std::time::Duration;

    fn creds() -> OAuthCredentials {
        OAuthCredentials::new("tok", "https://na1.salesforce.com")
    }

    #[test]
    fn query_text() {
        let name = SourceName::parse("Foo.trigger").unwrap();
        assert_eq!(
            record_id_query(&name),
            "SELECT Id FROM ApexTrigger WHERE Name = 'Foo'"
        );
    }

    #[test]
    fn literal_escaping() {
        assert_eq!(escape_literal("O'Brien"), "O\\'Brien");
        assert_eq!(escape_literal("a\\b"), "a\\\\b");
        assert_eq!(escape_literal("' OR Name != '"), "\\' OR Name != \\'");
    }

    #[tokio::test]
    async fn resolves_and_caches() {
        let org = MockOrg::new().with_record_ids(&["01p000000000001"]);
        let cache = EntityIdentityCache::new();
        let name = SourceName::parse("Foo.cls").unwrap();

        let first = cache.resolve(&org, &creds(), &name).await.unwrap();
        let second = cache.resolve(&org, &creds(), &name).await.unwrap();
        assert_eq!(first, "01p000000000001");
        assert_eq!(first, second);
        assert_eq!(org.count(|c| matches!(c, Call::Query(_))), 1);
        assert_eq!(cache.get("Foo.cls").as_deref(), Some("01p000000000001"));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_resolves_share_one_query() {
        let org = MockOrg::new()
            .with_record_ids(&["01p000000000001"])
            .with_query_delay(Duration::from_millis(50));
        let cache = EntityIdentityCache::new();
        let name = SourceName::parse("Foo.cls").unwrap();
        let creds = creds();

        let (a, b) = tokio::join!(
            cache.resolve(&org, &creds, &name),
            cache.resolve(&org, &creds, &name)
        );
        assert_eq!(a.unwrap(), "01p000000000001");
        assert_eq!(b.unwrap(), "01p000000000001");
        assert_eq!(org.count(|c| matches!(c, Call::Query(_))), 1);
    }

    #[tokio::test]
    async fn keys_are_file_names() {
        let org = MockOrg::new().with_record_ids(&["id"]);
        let cache = EntityIdentityCache::new();

        cache
            .resolve(&org, &creds(), &SourceName::parse("Foo.cls").unwrap())
            .await
            .unwrap();
        cache
            .resolve(&org, &creds(), &SourceName::parse("Foo.trigger").unwrap())
            .await
            .unwrap();
        assert_eq!(org.count(|c| matches!(c, Call::Query(_))), 2);
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn missing_record_is_not_cached() {
        let org = MockOrg::new();
        let cache = EntityIdentityCache::new();
        let name = SourceName::parse("Foo.cls").unwrap();

        let err = cache.resolve(&org, &creds(), &name).await.unwrap_err();
        assert!(
            matches!(err, DeployError::RecordNotFound { ref name, .. } if name == "Foo"),
            "{err}"
        );
        assert!(cache.is_empty());

        org.set_record_ids(&["01p000000000001"]);
        let id = cache.resolve(&org, &creds(), &name).await.unwrap();
        assert_eq!(id, "01p000000000001");
        assert_eq!(org.count(|c| matches!(c, Call::Query(_))), 2);
    }

    #[tokio::test]
    async fn ambiguous_match() {
        let org = MockOrg::new().with_record_ids(&["01p1", "01p2"]);
        let cache = EntityIdentityCache::new();
        let name = SourceName::parse("Foo.page").unwrap();

        let err = cache.resolve(&org, &creds(), &name).await.unwrap_err();
        assert!(matches!(err, DeployError::AmbiguousRecord { count: 2, .. }), "{err}");
        assert!(cache.get("Foo.page").is_none());
    }
}
