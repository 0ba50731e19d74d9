//! Slicing of already materialized lists.

use super::{Bounds, ConnectionConfig, decode_bound, edges, to_total};
use crate::cursor::CursorCodec;
use crate::error::PaginationResult;
use crate::models::Record;
use crate::ports::{Connection, PageArgs};

/// Array-slice arithmetic over the whole list.
///
/// Cursor positions are trusted as-is. `has_previous_page` is only
/// reported for `last` and `has_next_page` only for `first`.
pub(super) fn resolve(
    mut records: Vec<Record>,
    args: &PageArgs,
    bounds: Bounds,
    config: &ConnectionConfig,
) -> PaginationResult<Connection<Record>> {
    let codec = CursorCodec::INDEXED;
    let len = records.len();

    let before = decode_bound(codec, args.before.as_ref(), "before", config)?.and_then(|c| c.index);
    let after = decode_bound(codec, args.after.as_ref(), "after", config)?.and_then(|c| c.index);

    let lower = after.map_or(0, |a| a.saturating_add(1));
    let upper = before.unwrap_or(len);

    let mut start = lower;
    let mut end = upper.min(len);
    let total_count = end.saturating_sub(start);

    if let Some(first) = bounds.first {
        end = end.min(start.saturating_add(first));
    }
    if let Some(last) = bounds.last {
        start = start.max(end.saturating_sub(last));
    }

    let page = if start < end {
        records.truncate(end);
        records.split_off(start)
    } else {
        Vec::new()
    };

    let has_previous_page = bounds.last.is_some() && start > lower;
    let has_next_page = bounds.first.is_some() && end < upper;

    let mut connection = Connection::new(edges(codec, page, Some(start)), has_previous_page, has_next_page);
    if config.include_total_count {
        connection.total_count = Some(to_total(total_count));
    }
    Ok(connection)
}

#[cfg(test)]
mod tests {
    use super::super::testing::{keys, pets};
    use super::super::resolve_connection;
    use super::*;
    use crate::order::OrderSpec;
    use crate::ports::{ConnectionSource, Cursor};

    async fn page(records: Vec<Record>, args: PageArgs) -> Connection<Record> {
        resolve_connection(
            "articles",
            &args,
            &OrderSpec::by_key(),
            ConnectionSource::List(records),
            &ConnectionConfig::default(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_list_first_and_after() {
        let conn = page(pets(5), PageArgs::first(2)).await;
        assert_eq!(keys(&conn), vec![1, 2]);
        assert_eq!(conn.page_info.end_cursor, Some(Cursor::new("0x1,0x2")));
        assert!(conn.page_info.has_next_page);
        // Sans `last`, pas de page précédente signalée
        assert!(!conn.page_info.has_previous_page);

        let conn = page(pets(5), PageArgs::first(2).after(Cursor::new("0x1,0x2"))).await;
        assert_eq!(keys(&conn), vec![3, 4]);
        assert!(!conn.page_info.has_previous_page);
        assert!(conn.page_info.has_next_page);
    }

    #[tokio::test]
    async fn test_list_last_and_before() {
        let conn = page(pets(5), PageArgs::last(2)).await;
        assert_eq!(keys(&conn), vec![4, 5]);
        assert!(conn.page_info.has_previous_page);
        assert!(!conn.page_info.has_next_page);

        let conn = page(pets(5), PageArgs::last(10).before(Cursor::new("0x2,0x3"))).await;
        assert_eq!(keys(&conn), vec![1, 2]);
        assert!(!conn.page_info.has_previous_page);
    }

    // Test critique: positions hors limites, jamais de panic
    #[tokio::test]
    async fn test_list_out_of_range_positions() {
        let conn = page(pets(3), PageArgs::first(2).after(Cursor::new("0x63,0x1"))).await;
        assert!(conn.edges.is_empty());

        let conn = page(Vec::new(), PageArgs::last(2)).await;
        assert!(conn.edges.is_empty());
        assert!(!conn.page_info.has_previous_page);
    }
}
