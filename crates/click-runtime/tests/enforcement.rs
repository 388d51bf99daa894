//! End-to-end enforcement on a running page: injection, page scripts,
//! reconciliation and host mutations through the page channel.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use click_runtime::{
    find_ready_marker, inject, listener, ClickPolicy, EventType, Mode, NodeId, PageHandle,
    PointerEvents, Selector, Window, RECONCILE_INTERVAL,
};

struct Shop {
    page: PageHandle,
    buy: NodeId,
    ad: NodeId,
    wrapper: NodeId,
    clicks: Arc<AtomicUsize>,
}

/// Injects `policy`, then lets the page's own scripts build a small shop and
/// register click handlers.
async fn shop(policy: ClickPolicy) -> Shop {
    let mut window = Window::open_url("https://shop.example.com/cart").unwrap();
    inject(&mut window, &policy).unwrap();
    let page = PageHandle::spawn(window);

    let clicks = Arc::new(AtomicUsize::new(0));
    let counter = clicks.clone();
    let (buy, ad, wrapper) = page
        .evaluate(move |window| {
            let body = window.document().body();
            let doc = window.document_mut();
            let wrapper = doc.append_element(body, "div", [("id", "wrapper")]).unwrap();
            let buy = doc
                .append_element(wrapper, "button", [("id", "buy")])
                .unwrap();
            let ad = doc
                .append_element(wrapper, "a", [("class", "ad"), ("href", "https://ads.test/")])
                .unwrap();
            window.add_event_listener(
                wrapper,
                "click",
                listener(move |_, _| {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
                false,
            );
            window.load_complete();
            (buy, ad, wrapper)
        })
        .await
        .unwrap();

    Shop {
        page,
        buy,
        ad,
        wrapper,
        clicks,
    }
}

#[tokio::test(start_paused = true)]
async fn blacklist_level_one_keeps_ads_inert() {
    let policy = ClickPolicy::builder()
        .mode(Mode::Blacklist)
        .blacklist([".ad"])
        .enforcement_level(1)
        .activation_patterns(["example.com"])
        .build()
        .unwrap();
    let shop = shop(policy).await;
    let (buy, ad) = (shop.buy, shop.ad);

    let (ad_hit, buy_hit, ready) = shop
        .page
        .evaluate(move |window| {
            let doc = window.document();
            (
                doc.is_hit_testable(ad),
                doc.is_hit_testable(buy),
                find_ready_marker(doc).is_some(),
            )
        })
        .await
        .unwrap();
    assert!(!ad_hit);
    assert!(buy_hit);
    assert!(ready);

    shop.page
        .evaluate(move |window| {
            window.click(ad).unwrap();
            window.click(buy).unwrap();
        })
        .await
        .unwrap();
    assert_eq!(shop.clicks.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn registration_block_silences_page_click_handlers() {
    let policy = ClickPolicy::builder()
        .whitelist(["#buy"])
        .activation_patterns(["*"])
        .build()
        .unwrap();
    let shop = shop(policy).await;
    let (buy, wrapper) = (shop.buy, shop.wrapper);

    let (records, registered) = shop
        .page
        .evaluate(move |window| {
            (
                window.user_click(buy).unwrap(),
                window.listener_count(wrapper, &EventType::Click),
            )
        })
        .await
        .unwrap();
    assert_eq!(records.len(), 5);
    assert_eq!(registered, 0);
    assert_eq!(shop.clicks.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn host_whitelist_additions_take_effect_within_one_interval() {
    let policy = ClickPolicy::builder()
        .whitelist(["#buy"])
        .enforcement_level(0)
        .build()
        .unwrap();
    let shop = shop(policy).await;
    let ad = shop.ad;

    let before = shop
        .page
        .evaluate(move |window| window.document().computed_pointer_events(ad))
        .await
        .unwrap();
    assert_eq!(before, PointerEvents::None);

    shop.page
        .evaluate(|window| {
            if let Some(state) = window.policy_mut() {
                state.extend_whitelist(Selector::parse_all([".ad"]).unwrap());
            }
        })
        .await
        .unwrap();
    tokio::time::sleep(RECONCILE_INTERVAL).await;

    let (after, clicked) = shop
        .page
        .evaluate(move |window| {
            let after = window.document().computed_pointer_events(ad);
            window.user_click(ad).unwrap();
            (after, window.clicks_dispatched(ad))
        })
        .await
        .unwrap();
    assert_eq!(after, PointerEvents::Auto);
    assert_eq!(clicked, 1);
}

#[tokio::test(start_paused = true)]
async fn unmatched_pages_run_unrestricted() {
    let policy = ClickPolicy::builder()
        .activation_patterns(["bank.test"])
        .build()
        .unwrap();
    let shop = shop(policy).await;
    let ad = shop.ad;

    tokio::time::sleep(RECONCILE_INTERVAL * 2).await;
    let (hit, marker) = shop
        .page
        .evaluate(move |window| {
            window.user_click(ad).unwrap();
            (
                window.document().is_hit_testable(ad),
                find_ready_marker(window.document()),
            )
        })
        .await
        .unwrap();
    assert!(hit);
    assert!(marker.is_none());
    assert_eq!(shop.clicks.load(Ordering::SeqCst), 1);
}
