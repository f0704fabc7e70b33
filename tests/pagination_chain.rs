// tests/pagination_chain.rs
//
// Сценарии:
// 1) 5 записей, по 2 на страницу -> 3 страницы: [1,2] -> [3,4] -> [5] -> "".
// 2) Целостность цепочки для набора (N, K): ceil(N/K) страниц, размеры страниц, сентинел.
// 3) Первая страница читаема сразу после возврата paginate (без ожидания фона).
// 4) records_per_page = 0 и ошибка источника -> InvalidInput; ошибка первой страницы -> ошибка запроса.
// 5) Ошибка фоновой записи не видна вызывающему: страница просто отсутствует.
// 6) Огромный records_per_page (до usize::MAX) на малом источнике -> одна терминальная страница.

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, Result};

use dataproxy::codec::Compression;
use dataproxy::page::Record;
use dataproxy::{
    walk_chain, BackgroundTasks, Column, Logger, Page, PageInfo, PageStore, Paginator, ProxyError,
    StoreConfig,
};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn unique_root(prefix: &str) -> PathBuf {
    let pid = std::process::id();
    let t = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("dptest-pages-{prefix}-{pid}-{t}-{id}"))
}

fn setup(prefix: &str) -> Result<(PageStore, BackgroundTasks, Paginator)> {
    let cfg = StoreConfig::new(unique_root(prefix))
        .with_salt("s")
        .with_compression(Compression::Gzip)
        .with_key(vec![0x5au8; 32])?;
    let store = PageStore::new(Arc::new(cfg), Logger::root());
    let tasks = BackgroundTasks::new();
    let pg = Paginator::new(store.clone(), tasks.clone(), Logger::root());
    Ok((store, tasks, pg))
}

fn ids(n: usize) -> impl Iterator<Item = anyhow::Result<Record>> {
    (1..=n).map(|i| Ok(vec![i.to_string()]))
}

fn cols() -> Vec<Column> {
    vec![Column::new("id", "int")]
}

fn cells(p: &Page) -> Vec<String> {
    p.data.records.iter().map(|r| r[0].clone()).collect()
}

#[test]
fn five_records_two_per_page() -> Result<()> {
    let (store, tasks, pg) = setup("five")?;
    let chain = pg.paginate(ids(5), &cols(), 2)?;
    assert_eq!(chain.tokens.len(), 3);

    // первая страница вернулась синхронно и содержит записи 1-2
    let first = Page::from_json(&chain.first_page)?;
    assert_eq!(cells(&first), ["1", "2"]);
    assert_eq!(first.meta.next, chain.tokens[1]);
    assert_eq!(first.data.header.columns[0].name, "id");
    assert_eq!(first.data.header.columns[0].kind, "int");
    assert_eq!(first.data.header.columns[0].position, 0);

    assert!(tasks.wait_idle(Some(Duration::from_secs(10))));
    let pages: Vec<Page> = walk_chain(&store, &chain.dataset_hash, chain.first_token())
        .collect::<Result<_, _>>()?;
    assert_eq!(pages.len(), 3);
    assert_eq!(cells(&pages[1]), ["3", "4"]);
    assert_eq!(pages[1].meta.next, chain.tokens[2]);
    assert_eq!(cells(&pages[2]), ["5"]);
    assert_eq!(pages[2].meta.next, "");
    Ok(())
}

#[test]
fn chain_integrity_for_many_shapes() -> Result<()> {
    let (store, tasks, pg) = setup("shapes")?;
    for (n, k) in [(1, 1), (1, 5), (4, 2), (7, 3), (9, 3), (10, 1), (100, 7), (64, 64)] {
        let chain = pg.paginate(ids(n), &cols(), k)?;
        let expected_pages = (n + k - 1) / k;
        assert_eq!(chain.tokens.len(), expected_pages, "n={n} k={k}");

        assert!(tasks.wait_idle(Some(Duration::from_secs(10))));
        let pages: Vec<Page> = walk_chain(&store, &chain.dataset_hash, chain.first_token())
            .collect::<Result<_, _>>()?;
        assert_eq!(pages.len(), expected_pages, "n={n} k={k}");

        let last_len = if n % k == 0 { k } else { n % k };
        for (i, p) in pages.iter().enumerate() {
            let want = if i + 1 == pages.len() { last_len } else { k };
            assert_eq!(p.data.records.len(), want, "n={n} k={k} page={i}");
            let want_next = chain.tokens.get(i + 1).map(String::as_str).unwrap_or("");
            assert_eq!(p.meta.next, want_next);
        }

        // записи идут подряд, без потерь и дублей
        let all: Vec<String> = pages.iter().flat_map(cells).collect();
        let want: Vec<String> = (1..=n).map(|i| i.to_string()).collect();
        assert_eq!(all, want);
    }
    Ok(())
}

#[test]
fn first_page_is_durable_on_return() -> Result<()> {
    let (store, _tasks, pg) = setup("durable")?;
    let chain = pg.paginate(ids(50), &cols(), 5)?;
    // без ожидания фоновых задач
    let bytes = store.read(&PageInfo::new(chain.dataset_hash.as_str(), chain.first_token()))?;
    assert_eq!(bytes, chain.first_page);
    Ok(())
}

#[test]
fn empty_source_makes_single_terminal_page() -> Result<()> {
    let (store, _tasks, pg) = setup("empty")?;
    let chain = pg.paginate(ids(0), &cols(), 3)?;
    assert_eq!(chain.tokens.len(), 1);
    let page = Page::from_json(&store.read(&PageInfo::new(chain.dataset_hash.as_str(), chain.first_token()))?)?;
    assert!(page.is_terminal());
    assert!(page.data.records.is_empty());
    Ok(())
}

#[test]
fn huge_page_size_gives_single_page() -> Result<()> {
    let (store, _tasks, pg) = setup("hugepage")?;
    for rpp in [1usize << 40, usize::MAX] {
        let chain = pg.paginate(ids(5), &cols(), rpp)?;
        assert_eq!(chain.tokens.len(), 1, "rpp={rpp}");

        let page = Page::from_json(&store.read(&PageInfo::new(chain.dataset_hash.as_str(), chain.first_token()))?)?;
        assert!(page.is_terminal());
        assert_eq!(cells(&page), ["1", "2", "3", "4", "5"]);
    }
    Ok(())
}

#[test]
fn invalid_inputs() -> Result<()> {
    let (_store, _tasks, pg) = setup("invalid")?;
    assert!(matches!(pg.paginate(ids(3), &cols(), 0), Err(ProxyError::InvalidInput(_))));

    let broken = vec![Ok(vec!["1".to_string()]), Err(anyhow!("bad row 2"))];
    match pg.paginate(broken, &cols(), 10) {
        Err(ProxyError::InvalidInput(msg)) => assert!(msg.contains("bad row 2")),
        other => panic!("unexpected {:?}", other.map(|c| c.tokens)),
    }
    Ok(())
}

#[test]
fn first_page_failure_aborts() -> Result<()> {
    let blocker = unique_root("blocker");
    fs::write(&blocker, b"not a dir")?;
    let store = PageStore::new(Arc::new(StoreConfig::new(&blocker)), Logger::root());
    let tasks = BackgroundTasks::new();
    let pg = Paginator::new(store, tasks.clone(), Logger::root());

    assert!(matches!(pg.paginate(ids(10), &cols(), 2), Err(ProxyError::StorageUnavailable)));
    // после отказа первой страницы фоновые задачи не запускались
    assert_eq!(tasks.counts().completed + tasks.counts().failed, 0);
    Ok(())
}

#[test]
fn background_failure_is_invisible_to_caller() -> Result<()> {
    let root = unique_root("bgfail");
    let store = PageStore::new(Arc::new(StoreConfig::new(&root)), Logger::root());
    let tasks = BackgroundTasks::new();

    // Первую страницу пишем синхронно через настоящий store, затем ломаем каталог датасета,
    // подменяя его файлом: фоновые записи падают, но paginate уже вернул Ok.
    struct Breaker<I> {
        inner: I,
        at: usize,
        seen: usize,
        root: PathBuf,
    }
    impl<I: Iterator<Item = anyhow::Result<Record>>> Iterator for Breaker<I> {
        type Item = anyhow::Result<Record>;
        fn next(&mut self) -> Option<Self::Item> {
            self.seen += 1;
            if self.seen == self.at {
                for e in fs::read_dir(&self.root).ok()?.flatten() {
                    let p = e.path();
                    let _ = fs::remove_dir_all(&p);
                    let _ = fs::write(&p, b"blocked");
                }
            }
            self.inner.next()
        }
    }

    let pg = Paginator::new(store.clone(), tasks.clone(), Logger::root());
    let src = Breaker {
        inner: ids(6),
        at: 4,
        seen: 0,
        root: root.clone(),
    };
    let chain = pg.paginate(src, &cols(), 2)?;
    assert_eq!(chain.tokens.len(), 3);

    assert!(tasks.wait_idle(Some(Duration::from_secs(10))));
    assert_eq!(tasks.counts().failed, 2);

    let second = PageInfo::new(chain.dataset_hash.as_str(), chain.tokens[1].as_str());
    assert!(store.read(&second).is_err());
    Ok(())
}
