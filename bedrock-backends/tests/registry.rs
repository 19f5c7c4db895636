//! Read-after-write behaviour of the shared registry

use bedrock_backends::cache::create_pool as create_cache_pool;
use bedrock_backends::sql::create_lazy_pool;
use bedrock_backends::{Backends, BackendKind, CacheConnector, SearchClient, SqlConnector};
use bedrock_core::{CacheSettings, SearchSettings, SqlSettings};

fn lazily_connected() -> Backends {
    let sql_settings = SqlSettings::default();
    let sql = SqlConnector::from_pool(sql_settings.clone(), create_lazy_pool(&sql_settings));

    let search = SearchClient::new(SearchSettings::default()).unwrap();

    let cache_settings = CacheSettings::default();
    let cache = CacheConnector::from_pool(
        cache_settings.clone(),
        create_cache_pool(&cache_settings).unwrap(),
    );

    Backends::new(Some(sql), Some(search), Some(cache))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_readers_see_every_slot_populated() {
    let backends = lazily_connected();

    let readers: Vec<_> = (0..32)
        .map(|_| {
            let backends = backends.clone();
            tokio::spawn(async move {
                let sql = backends.sql().expect("sql slot empty");
                let search = backends.search().expect("search slot empty");
                let cache = backends.cache().expect("cache slot empty");

                assert_eq!(sql.settings().max_open_conns, 10);
                assert_eq!(search.hosts().len(), 1);
                assert_eq!(cache.pool().status().max_size, 10);
                assert!(backends.pool().is_ok());
            })
        })
        .collect();

    for reader in readers {
        reader.await.expect("reader panicked");
    }

    for kind in [BackendKind::Sql, BackendKind::Search, BackendKind::Cache] {
        assert!(backends.is_available(kind));
    }
}

#[tokio::test]
async fn close_stops_pooled_backends() {
    let backends = lazily_connected();
    backends.close().await;

    assert!(backends.pool().unwrap().is_closed());
    assert!(backends.cache_connector().unwrap().client().is_closed());
}
