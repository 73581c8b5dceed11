//! Media listing with cursor paging
//!
//! The remote pages collections with `paging.cursors.after` and a
//! ready-made `paging.next` URL. The `next` URL embeds the caller's access
//! token, so it is only ever handed out redacted; continuation uses the
//! opaque `after` cursor.

use instagraph_core::ports::{MediaPage, MediaSummary};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::client::{GraphClient, JsonObject};
use crate::GraphError;

/// Fields requested for each listed media object
pub const MEDIA_FIELDS: &str = "id,media_type,permalink,timestamp,caption,like_count,comments_count";

/// Query parameters whose values never leave this crate
const SECRET_PARAMS: &[&str] = &[
    "access_token",
    "client_secret",
    "appsecret_proof",
    "code",
    "code_verifier",
];

const REDACTED: &str = "REDACTED";

/// Fetches one page of the account's media, newest first
pub async fn list_media(
    client: &GraphClient,
    access_token: &str,
    ig_user_id: &str,
    limit: u32,
    after: Option<&str>,
) -> Result<MediaPage, GraphError> {
    if limit == 0 {
        return Err(GraphError::validation("limit must be at least 1"));
    }

    let mut params = vec![
        ("fields", MEDIA_FIELDS.to_string()),
        ("limit", limit.to_string()),
    ];
    if let Some(cursor) = after.filter(|c| !c.is_empty()) {
        params.push(("after", cursor.to_string()));
    }

    let body = client
        .get(&format!("/{ig_user_id}/media"), &params, Some(access_token))
        .await?;

    let page = parse_media_page(&body)?;
    debug!(
        ig_user_id,
        count = page.items.len(),
        has_more = page.after.is_some(),
        "Listed media page"
    );
    Ok(page)
}

/// Decodes `data[]` and the paging block of a media listing
pub fn parse_media_page(body: &JsonObject) -> Result<MediaPage, GraphError> {
    let items = match body.get("data") {
        None | Some(Value::Null) => Vec::new(),
        Some(data) => serde_json::from_value::<Vec<MediaSummary>>(data.clone())
            .map_err(|e| GraphError::InvalidResponse(format!("media listing: {e}")))?,
    };

    Ok(MediaPage {
        items,
        after: after_cursor(body),
        next: body
            .get("paging")
            .and_then(|p| p.get("next"))
            .and_then(Value::as_str)
            .map(redact_url),
    })
}

/// `paging.cursors.after`, present only when another page exists
pub fn after_cursor(body: &JsonObject) -> Option<String> {
    let paging = body.get("paging")?;
    // The remote keeps sending an `after` cursor on the last page; `next` is
    // the reliable marker.
    paging.get("next")?;
    paging
        .get("cursors")
        .and_then(|c| c.get("after"))
        .and_then(Value::as_str)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
}

/// Replaces credential-bearing query values with `REDACTED`
///
/// Unparsable input loses its whole query string.
pub fn redact_url(raw: &str) -> String {
    let Ok(mut url) = Url::parse(raw) else {
        return raw.split('?').next().unwrap_or_default().to_string();
    };

    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let value = if SECRET_PARAMS.contains(&k.as_ref()) {
                REDACTED.to_string()
            } else {
                v.into_owned()
            };
            (k.into_owned(), value)
        })
        .collect();

    if pairs.is_empty() {
        return url.to_string();
    }

    url.query_pairs_mut().clear().extend_pairs(pairs);
    url.to_string()
}
