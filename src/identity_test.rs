use futures::executor::LocalPool;
use futures::future::join_all;
use futures::task::LocalSpawnExt;

use super::*;
use crate::net::fake::{FakeAuthApi, user};

fn fetcher() -> (Rc<FakeAuthApi>, IdentityFetcher) {
    let api = Rc::new(FakeAuthApi::new());
    let fetcher = IdentityFetcher::new(api.clone());
    (api, fetcher)
}

#[test]
fn resolves_known_token_to_user() {
    let (api, fetcher) = fetcher();
    api.accept("t1", user("u1", "Ada"));

    let result = LocalPool::new().run_until(fetcher.fetch_user("t1"));

    assert_eq!(result, Some(user("u1", "Ada")));
    assert_eq!(fetcher.in_flight_token(), None);
}

#[test]
fn rejected_token_resolves_to_none() {
    let (api, fetcher) = fetcher();
    let result = LocalPool::new().run_until(fetcher.fetch_user("bad"));
    assert_eq!(result, None);
    assert_eq!(api.me_count(), 1);
}

#[test]
fn concurrent_callers_share_one_request() {
    let (api, fetcher) = fetcher();
    api.accept("t1", user("u1", "Ada"));
    let release = api.hold_next_me();

    let mut pool = LocalPool::new();
    let spawner = pool.spawner();
    let callers: Vec<_> = (0..5)
        .map(|_| spawner.spawn_local_with_handle(fetcher.fetch_user("t1")).unwrap())
        .collect();

    pool.run_until_stalled();
    assert_eq!(api.me_count(), 1);
    assert_eq!(fetcher.in_flight_token().as_deref(), Some("t1"));

    release.send(()).unwrap();
    let results = pool.run_until(join_all(callers));

    assert_eq!(api.me_count(), 1);
    assert!(results.iter().all(|r| r.as_ref() == Some(&user("u1", "Ada"))));
    assert_eq!(fetcher.in_flight_token(), None);
}

#[test]
fn settled_slot_allows_fresh_request() {
    let (api, fetcher) = fetcher();
    api.accept("t1", user("u1", "Ada"));
    let mut pool = LocalPool::new();

    pool.run_until(fetcher.fetch_user("t1"));
    pool.run_until(fetcher.fetch_user("t1"));

    assert_eq!(api.me_count(), 2);
}

#[test]
fn failed_request_does_not_wedge_slot() {
    let (api, fetcher) = fetcher();
    let mut pool = LocalPool::new();

    assert_eq!(pool.run_until(fetcher.fetch_user("bad")), None);

    api.accept("good", user("u2", "Bob"));
    assert_eq!(pool.run_until(fetcher.fetch_user("good")), Some(user("u2", "Bob")));
    assert_eq!(api.me_count(), 2);
}

#[test]
fn different_token_joins_outstanding_request() {
    let (api, fetcher) = fetcher();
    api.accept("old", user("u1", "Ada"));
    api.accept("new", user("u2", "Bob"));
    let release = api.hold_next_me();

    let mut pool = LocalPool::new();
    let first = fetcher.fetch_user("old");
    let second = fetcher.fetch_user("new");
    release.send(()).unwrap();
    let (a, b) = pool.run_until(futures::future::join(first, second));

    assert_eq!(api.me_calls.borrow().as_slice(), &["old".to_owned()]);
    assert_eq!(a, Some(user("u1", "Ada")));
    assert_eq!(b, Some(user("u1", "Ada")));
}
