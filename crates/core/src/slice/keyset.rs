//! Keyset slicing.
//!
//! Each cursor bound is turned into a predicate relative to its anchor
//! record, so a page boundary stays put when rows are inserted or
//! removed elsewhere in the collection.

use tracing::{trace, warn};

use super::{Bounds, ConnectionConfig, decode_bound, edges, stale_anchor, to_total};
use crate::cursor::CursorCodec;
use crate::error::PaginationResult;
use crate::metrics;
use crate::models::Record;
use crate::order::OrderSpec;
use crate::ports::{Collection, Connection, PageArgs};
use crate::predicate::Predicate;

pub(super) async fn resolve(
    collection: &Collection,
    order: &OrderSpec,
    args: &PageArgs,
    bounds: Bounds,
    config: &ConnectionConfig,
) -> PaginationResult<Connection<Record>> {
    let codec = CursorCodec::KEY;
    let mut window = collection.order_by(order.clone());
    let mut has_previous_page = false;
    let mut has_next_page = false;

    if let Some(cursor) = decode_bound(codec, args.before.as_ref(), "before", config)? {
        match collection.get(cursor.pk).await? {
            Some(anchor) => {
                let before = Predicate::before(order, &anchor);
                has_next_page |= window.exclude(before.clone()).exists().await?;
                window = window.filter(before);
            }
            None => stale_anchor("before", cursor, config)?,
        }
    }

    if let Some(cursor) = decode_bound(codec, args.after.as_ref(), "after", config)? {
        match collection.get(cursor.pk).await? {
            Some(anchor) => {
                let after = Predicate::after(order, &anchor);
                has_previous_page |= window.exclude(after.clone()).exists().await?;
                window = window.filter(after);
            }
            None => stale_anchor("after", cursor, config)?,
        }
    }

    let total_count = if config.include_total_count {
        Some(window.count().await?)
    } else {
        None
    };

    if let Some(first) = bounds.first {
        has_next_page |= window.slice(first, None).exists().await?;
        window = window.slice(0, Some(first));
    }

    if let Some(last) = bounds.last {
        warn!(
            record_type = collection.record_type(),
            last,
            "⚠️  Paginating with `last` counts the collection"
        );
        metrics::record_tail_count();
        let count = window.count().await?;
        let start = count.saturating_sub(last);
        has_previous_page |= start > 0;
        window = window.slice(start, None);
    }

    trace!(query = ?window.query(), "Fetching keyset page");
    let records = window.fetch().await?;

    let mut connection = Connection::new(edges(codec, records, None), has_previous_page, has_next_page);
    connection.total_count = total_count.map(to_total);
    Ok(connection)
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::super::{StaleCursorPolicy, resolve_connection};
    use super::*;
    use crate::error::PaginationError;
    use crate::ports::Cursor;

    async fn page(
        source: &std::sync::Arc<VecSource>,
        args: PageArgs,
        order: &OrderSpec,
        config: &ConnectionConfig,
    ) -> Connection<Record> {
        resolve_connection("allPets", &args, order, collection(source).into(), config)
            .await
            .unwrap()
    }

    // Scénario 1: 5 enregistrements, first = 2
    #[tokio::test]
    async fn test_first_page_by_key() {
        let source = VecSource::new("pet", pets(5));
        let config = ConnectionConfig::default();

        let conn = page(&source, PageArgs::first(2), &OrderSpec::by_key(), &config).await;
        assert_eq!(keys(&conn), vec![1, 2]);
        assert_eq!(conn.edges[0].cursor.value, "0x1");
        assert_eq!(conn.edges[1].cursor.value, "0x2");
        assert!(conn.page_info.has_next_page);
        assert!(!conn.page_info.has_previous_page);
        assert_eq!(conn.page_info.end_cursor, Some(Cursor::new("0x2")));
    }

    // Scénario 2: first = 2, after = 0x2
    #[tokio::test]
    async fn test_after_cursor() {
        let source = VecSource::new("pet", pets(5));
        let config = ConnectionConfig::default();

        let conn = page(
            &source,
            PageArgs::first(2).after(Cursor::new("0x2")),
            &OrderSpec::by_key(),
            &config,
        )
        .await;
        assert_eq!(keys(&conn), vec![3, 4]);
        assert!(conn.page_info.has_previous_page);
        assert!(conn.page_info.has_next_page);
    }

    // last = 2 sans curseur -> [4, 5], has_previous_page
    #[tokio::test]
    async fn test_last_page() {
        let source = VecSource::new("pet", pets(5));
        let config = ConnectionConfig::default();

        let conn = page(&source, PageArgs::last(2), &OrderSpec::by_key(), &config).await;
        assert_eq!(keys(&conn), vec![4, 5]);
        assert!(conn.page_info.has_previous_page);
        assert!(!conn.page_info.has_next_page);
    }

    // Scénario 3: last = 2, before = 0x5 -> [3, 4]
    #[tokio::test]
    async fn test_last_before_cursor() {
        let source = VecSource::new("pet", pets(5));
        let config = ConnectionConfig::default();

        let conn = page(
            &source,
            PageArgs::last(2).before(Cursor::new("0x5")),
            &OrderSpec::by_key(),
            &config,
        )
        .await;
        assert_eq!(keys(&conn), vec![3, 4]);
        assert!(conn.page_info.has_previous_page);
        assert!(conn.page_info.has_next_page);
    }

    // Test critique: la borne du curseur n'est pas oubliée après `last`
    #[tokio::test]
    async fn test_before_and_last_keep_both_flags() {
        let source = VecSource::new("pet", pets(5));
        let config = ConnectionConfig::default();

        let conn = page(
            &source,
            PageArgs::last(2).before(Cursor::new("0x4")),
            &OrderSpec::by_key(),
            &config,
        )
        .await;
        assert_eq!(keys(&conn), vec![2, 3]);
        assert!(conn.page_info.has_next_page);
        assert!(conn.page_info.has_previous_page);
    }

    #[tokio::test]
    async fn test_first_zero_is_an_empty_page() {
        let source = VecSource::new("pet", pets(3));
        let config = ConnectionConfig::default();

        let conn = page(&source, PageArgs::first(0), &OrderSpec::by_key(), &config).await;
        assert!(conn.edges.is_empty());
        assert!(conn.page_info.has_next_page);
        assert_eq!(conn.page_info.start_cursor, None);
        assert_eq!(conn.page_info.end_cursor, None);
    }

    #[tokio::test]
    async fn test_descending_order_and_total_count() {
        let source = VecSource::new("pet", pets(5));
        let config = ConnectionConfig::default().with_total_count();
        let order = OrderSpec::parse("-age", &[]);

        let conn = page(
            &source,
            PageArgs::first(2).after(Cursor::new("0x4")),
            &order,
            &config,
        )
        .await;
        // Ordre: 5, 4, 3, 2, 1
        assert_eq!(keys(&conn), vec![3, 2]);
        // Total entre les bornes des curseurs, avant first
        assert_eq!(conn.total_count, Some(3));
    }

    // Test critique: même requête, même snapshot -> même page
    #[tokio::test]
    async fn test_idempotent_and_stable_under_insert() {
        let source = VecSource::new("pet", pets(5));
        let config = ConnectionConfig::default();
        let args = PageArgs::first(2).after(Cursor::new("0x2"));

        let a = page(&source, args.clone(), &OrderSpec::by_key(), &config).await;
        let b = page(&source, args.clone(), &OrderSpec::by_key(), &config).await;
        assert_eq!(a, b);

        // Une insertion avant l'ancre ne décale pas la page
        source.insert("pet", Record::new(0).with("age", 0i64));
        let c = page(&source, args, &OrderSpec::by_key(), &config).await;
        assert_eq!(keys(&c), vec![3, 4]);
    }

    #[tokio::test]
    async fn test_deleted_anchor_follows_stale_policy() {
        let source = VecSource::new("pet", pets(5));
        source.remove("pet", 2);
        let args = PageArgs::first(2).after(Cursor::new("0x2"));

        let conn = page(&source, args.clone(), &OrderSpec::by_key(), &ConnectionConfig::default()).await;
        assert_eq!(keys(&conn), vec![1, 3]);

        let strict = ConnectionConfig {
            stale_cursor: StaleCursorPolicy::Reject,
            ..Default::default()
        };
        let err = resolve_connection("allPets", &args, &OrderSpec::by_key(), collection(&source).into(), &strict)
            .await
            .unwrap_err();
        assert!(matches!(err, PaginationError::StaleCursor(_)));
    }

    // Le curseur d'un enregistrement filtré reste une ancre valide
    #[tokio::test]
    async fn test_anchor_outside_filter_still_bounds() {
        use crate::predicate::{Comparison, Condition};

        let source = VecSource::new("pet", pets(6));
        let older = Predicate {
            branches: vec![vec![Condition::new("age", Comparison::Gt, 25i64)]],
        };
        let filtered = collection(&source).filter(older);

        let conn = resolve_connection(
            "allPets",
            &PageArgs::first(10).after(Cursor::new("0x1")),
            &OrderSpec::by_key(),
            filtered.into(),
            &ConnectionConfig::default(),
        )
        .await
        .unwrap();
        assert_eq!(keys(&conn), vec![3, 4, 5, 6]);
        assert!(!conn.page_info.has_previous_page);
    }
}
