//! Revision diff service
//!
//! Tells a client which of its local revisions the server does not have,
//! i.e. what it still needs to push. The store keeps a single current
//! revision per document (no ancestry), so a client revision is missing iff
//! it differs from that one; for unknown ids every client revision is
//! missing.

use std::collections::HashMap;

use crate::db::DocumentStore;
use crate::error::Result;
use crate::models::MissingRevs;

/// Compute the missing-revisions map for a `_revs_diff` request.
///
/// Ids with nothing missing are omitted from the result.
pub async fn revs_diff<S: DocumentStore>(
    store: &S,
    request: &HashMap<String, Vec<String>>,
) -> Result<HashMap<String, MissingRevs>> {
    let ids: Vec<String> = request.keys().cloned().collect();
    let existing = store.get_many(&ids).await?;

    let mut response = HashMap::new();
    for (id, client_revs) in request {
        let server_rev = existing.get(id).and_then(|doc| doc.rev.clone());

        let missing: Vec<String> = client_revs
            .iter()
            .filter(|rev| server_rev.as_deref() != Some(rev.as_str()))
            .cloned()
            .collect();

        if !missing.is_empty() {
            response.insert(id.clone(), MissingRevs { missing });
        }
    }

    Ok(response)
}
