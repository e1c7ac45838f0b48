//! End-to-end pattern coverage: every one of the eight shapes returns
//! exactly the expected subset, from whichever index the selector picks.

use tristore_core::pattern::select_index;
use tristore_core::{IndexOrder, MemoryKv, Term, TermId, Triple, TriplePattern};
use tristore_store::Store;

struct Fixture {
    store: Store<MemoryKv>,
    knows_alice_bob: Triple,
    likes_alice_pizza: Triple,
}

async fn fixture() -> Fixture {
    let store = Store::open(MemoryKv::new()).await.unwrap();
    let alice = Term::iri("http://example.org/alice");
    let knows = Term::iri("http://example.org/knows");
    let bob = Term::iri("http://example.org/bob");
    let likes = Term::iri("http://example.org/likes");
    let pizza = Term::iri("http://example.org/pizza");

    let knows_alice_bob = store.insert(&alice, &knows, &bob).await.unwrap();
    let likes_alice_pizza = store.insert(&alice, &likes, &pizza).await.unwrap();
    Fixture {
        store,
        knows_alice_bob,
        likes_alice_pizza,
    }
}

async fn lookup(store: &Store<MemoryKv>, pattern: TriplePattern) -> Vec<Triple> {
    store.index().lookup_all(&pattern).await.unwrap()
}

fn some(id: TermId) -> Option<TermId> {
    Some(id)
}

#[tokio::test]
async fn all_eight_shapes_return_expected_subsets() {
    let fx = fixture().await;
    let t1 = fx.knows_alice_bob;
    let t2 = fx.likes_alice_pizza;

    // b b b
    let got = lookup(&fx.store, TriplePattern::new(some(t1.s), some(t1.p), some(t1.o))).await;
    assert_eq!(got, vec![t1]);

    // b b _
    let got = lookup(&fx.store, TriplePattern::new(some(t1.s), some(t1.p), None)).await;
    assert_eq!(got, vec![t1]);

    // b _ _  (both triples share the subject)
    let mut got = lookup(&fx.store, TriplePattern::new(some(t1.s), None, None)).await;
    got.sort();
    let mut want = vec![t1, t2];
    want.sort();
    assert_eq!(got, want);

    // _ b b
    let got = lookup(&fx.store, TriplePattern::new(None, some(t1.p), some(t1.o))).await;
    assert_eq!(got, vec![t1]);

    // _ b _
    let got = lookup(&fx.store, TriplePattern::new(None, some(t2.p), None)).await;
    assert_eq!(got, vec![t2]);

    // _ _ b
    let got = lookup(&fx.store, TriplePattern::new(None, None, some(t2.o))).await;
    assert_eq!(got, vec![t2]);

    // b _ b: the residual-filter shape must drop the other triple.
    let pattern = TriplePattern::new(some(t1.s), None, some(t2.o));
    let plan = select_index(&pattern);
    assert_eq!(plan.order, IndexOrder::Osp);
    assert!(plan.filter.is_some());
    let got = lookup(&fx.store, pattern).await;
    assert_eq!(got, vec![t2]);

    // _ _ _
    let mut got = lookup(&fx.store, TriplePattern::any()).await;
    got.sort();
    assert_eq!(got, want);
}

#[tokio::test]
async fn fully_bound_miss_returns_empty() {
    let fx = fixture().await;
    let got = lookup(
        &fx.store,
        TriplePattern::new(
            some(fx.knows_alice_bob.s),
            some(fx.knows_alice_bob.p),
            some(fx.likes_alice_pizza.o),
        ),
    )
    .await;
    assert!(got.is_empty());
}

#[tokio::test]
async fn count_agrees_with_lookup_all_for_every_shape() {
    let fx = fixture().await;
    let t1 = fx.knows_alice_bob;
    let t2 = fx.likes_alice_pizza;
    let patterns = [
        TriplePattern::new(some(t1.s), some(t1.p), some(t1.o)),
        TriplePattern::new(some(t1.s), some(t1.p), None),
        TriplePattern::new(some(t1.s), None, None),
        TriplePattern::new(None, some(t1.p), some(t1.o)),
        TriplePattern::new(None, some(t1.p), None),
        TriplePattern::new(None, None, some(t2.o)),
        TriplePattern::new(some(t1.s), None, some(t2.o)),
        TriplePattern::any(),
    ];
    for pattern in patterns {
        let all = fx.store.index().lookup_all(&pattern).await.unwrap();
        let count = fx.store.index().count(&pattern).await.unwrap();
        assert_eq!(count, all.len(), "pattern {}", pattern);
        for triple in &all {
            assert!(pattern.matches(triple), "pattern {} yielded {}", pattern, triple);
        }
    }
}
