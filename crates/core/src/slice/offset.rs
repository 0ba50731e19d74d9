//! Offset slicing.
//!
//! Cursors record where their row sat (`index,pk`). On the next request
//! the row is looked up at that position first, then in a bounded
//! neighbourhood, so small shifts caused by concurrent writes are
//! absorbed without a full scan.

use tracing::{debug, trace};

use super::{Bounds, ConnectionConfig, decode_bound, edges, stale_anchor, to_total};
use crate::cursor::{CursorCodec, DecodedCursor};
use crate::error::PaginationResult;
use crate::metrics;
use crate::models::Record;
use crate::order::OrderSpec;
use crate::ports::{Collection, Connection, PageArgs};

pub(super) async fn resolve(
    collection: &Collection,
    order: &OrderSpec,
    args: &PageArgs,
    bounds: Bounds,
    config: &ConnectionConfig,
) -> PaginationResult<Connection<Record>> {
    let codec = CursorCodec::INDEXED;
    let ordered = collection.order_by(order.clone());
    let len = ordered.count().await?;

    let before = match decode_bound(codec, args.before.as_ref(), "before", config)? {
        Some(cursor) => locate(&ordered, cursor, len, "before", config).await?,
        None => None,
    };
    let after = match decode_bound(codec, args.after.as_ref(), "after", config)? {
        Some(cursor) => locate(&ordered, cursor, len, "after", config).await?,
        None => None,
    };

    let mut start = after.map_or(0, |a| a + 1).min(len);
    let mut end = before.unwrap_or(len).min(len).max(start);
    let total_count = end - start;

    if let Some(first) = bounds.first {
        end = end.min(start.saturating_add(first));
    }
    if let Some(last) = bounds.last {
        start = start.max(end.saturating_sub(last));
    }

    trace!(start, end, len, "Fetching offset page");
    let records = ordered.slice(start, Some(end)).fetch().await?;

    let mut connection = Connection::new(edges(codec, records, Some(start)), start > 0, end < len);
    if config.include_total_count {
        connection.total_count = Some(to_total(total_count));
    }
    Ok(connection)
}

/// Current index of the cursor's record, probing around its old index.
///
/// Candidates are visited nearest first: `index`, `index - 1`,
/// `index + 1`, and so on up to `search_window` positions away.
async fn locate(
    ordered: &Collection,
    cursor: DecodedCursor,
    len: usize,
    argument: &'static str,
    config: &ConnectionConfig,
) -> PaginationResult<Option<usize>> {
    let index = cursor.index.unwrap_or_default();

    if index < len && ordered.pk_at(index).await? == Some(cursor.pk) {
        metrics::record_anchor_lookups(1);
        return Ok(Some(index));
    }

    // One read covers the whole neighbourhood
    let low = index.saturating_sub(config.search_window).min(len);
    let high = index
        .saturating_add(config.search_window)
        .saturating_add(1)
        .min(len)
        .max(low);
    let neighbourhood: Vec<u64> = ordered
        .slice(low, Some(high))
        .fetch()
        .await?
        .iter()
        .map(|r| r.pk)
        .collect();
    metrics::record_anchor_lookups(2);

    let found = (1..=config.search_window)
        .flat_map(|d| [index.checked_sub(d), index.checked_add(d)])
        .flatten()
        .find(|&candidate| {
            candidate
                .checked_sub(low)
                .and_then(|i| neighbourhood.get(i))
                .is_some_and(|&pk| pk == cursor.pk)
        });

    match found {
        Some(moved) => {
            debug!(argument, from = index, to = moved, "Cursor anchor relocated");
            Ok(Some(moved))
        }
        None => {
            stale_anchor(argument, cursor, config)?;
            Ok(None)
        }
    }
}
