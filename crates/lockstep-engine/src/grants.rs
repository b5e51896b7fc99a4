use lockstep_remote::{
  invoke, ops, ClassifiedError, ErrorKind, GrantEntry, ListGrantsRequest, RemoteApi,
};
use tracing::instrument;

/// Look up a grant by id.
///
/// The control plane only exposes grants through a list API, so the lookup
/// pages through `list_grants` until the id matches or the cursor is
/// exhausted; exhaustion classifies as `NotFound`.
#[instrument(name = "grant_lookup", skip(api), fields(key_id = %key_id, grant_id = %grant_id))]
pub async fn find_grant<R: RemoteApi>(
  api: &R,
  key_id: &str,
  grant_id: &str,
  page_limit: Option<u32>,
) -> Result<GrantEntry, ClassifiedError> {
  let mut cursor: Option<String> = None;

  loop {
    let page = invoke(
      ops::LIST_GRANTS,
      api.list_grants(ListGrantsRequest {
        key_id: key_id.to_string(),
        cursor: cursor.take(),
        limit: page_limit,
      }),
    )
    .await?;

    if let Some(grant) = page.grants.into_iter().find(|g| g.grant_id == grant_id) {
      return Ok(grant);
    }

    match page.next_cursor {
      Some(next) => cursor = Some(next),
      None => {
        return Err(ClassifiedError::new(
          ErrorKind::NotFound,
          ops::LIST_GRANTS,
          format!("grant '{}' not found for key '{}'", grant_id, key_id),
        ));
      }
    }
  }
}
