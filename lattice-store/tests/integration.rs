//! Integration Tests for the Store
//!
//! These tests drive whole stores through their public API: modules,
//! mutations, actions, getters, subscribers, watchers and the module
//! lifecycle.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::{json, Value};

use lattice_store::host::{self, Host, HostConfig};
use lattice_store::plugins::{logger, LoggerOptions};
use lattice_store::{
    ActionError, ActionRecord, ActionSubscriber, CommitOptions, Inspector, InspectorEvent, Module,
    Path, RegisterOptions, StateTree, Store, StoreError, SubscribeOptions, Subscription, TimeTravel,
    WatchOptions,
};

fn host() -> &'static Host {
    host::installed().unwrap_or_else(|| host::install(HostConfig::default()))
}

fn bump(state: &mut Value, field: &str, by: i64) {
    let current = state[field].as_i64().unwrap_or(0);
    state[field] = json!(current + by);
}

fn counter() -> Module {
    Module::new()
        .state(json!({ "count": 0 }))
        .mutation("increment", |state, _| bump(state, "count", 1))
        .mutation("decrement", |state, _| bump(state, "count", -1))
        .action_sync("incrementIfOdd", |ctx, _| {
            if ctx.state().get("count").as_i64().unwrap_or(0) % 2 != 0 {
                ctx.commit("increment")?;
            }
            Ok(Value::Null)
        })
        .action("incrementAsync", |ctx, _| async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            ctx.commit("increment")?;
            Ok(Value::Null)
        })
        .getter("evenOrOdd", |args| {
            let count = args.state.get("count").as_i64().unwrap_or(0);
            json!(if count % 2 == 0 { "even" } else { "odd" })
        })
}

fn products() -> Module {
    Module::new()
        .namespaced(true)
        .state_fn(|| {
            json!({
                "all": [
                    { "id": 1, "title": "iPad 4 Mini", "price": 500, "inventory": 2 },
                    { "id": 2, "title": "H&M T-Shirt White", "price": 10, "inventory": 0 }
                ]
            })
        })
        .mutation("decrementProductInventory", |state, payload| {
            let id = payload["id"].as_i64();
            if let Some(all) = state["all"].as_array_mut() {
                for product in all.iter_mut().filter(|p| p["id"].as_i64() == id) {
                    bump(product, "inventory", -1);
                }
            }
        })
}

fn cart() -> Module {
    Module::new()
        .namespaced(true)
        .state_fn(|| json!({ "items": [], "checkoutStatus": null }))
        .mutation("pushProductToCart", |state, payload| {
            if let Some(items) = state["items"].as_array_mut() {
                items.push(json!({ "id": payload["id"], "quantity": 1 }));
            }
        })
        .mutation("incrementItemQuantity", |state, payload| {
            if let Some(items) = state["items"].as_array_mut() {
                for item in items.iter_mut().filter(|i| i["id"] == payload["id"]) {
                    bump(item, "quantity", 1);
                }
            }
        })
        .mutation("setCheckoutStatus", |state, payload| {
            state["checkoutStatus"] = payload.clone();
        })
        .mutation("setCartItems", |state, payload| {
            state["items"] = payload["items"].clone();
        })
        .action("checkout", |ctx, _| async move {
            let saved = ctx.state().get("items");
            ctx.commit(("setCheckoutStatus", Value::Null))?;
            ctx.commit(("setCartItems", json!({ "items": [] })))?;
            tokio::time::sleep(Duration::from_millis(5)).await;

            let all = ctx.root_state().at("products/all");
            let known = saved.as_array().into_iter().flatten().all(|item| {
                all.as_array().into_iter().flatten().any(|p| p["id"] == item["id"])
            });
            if known {
                ctx.commit(("setCheckoutStatus", json!("successful")))?;
                Ok(json!("successful"))
            } else {
                ctx.commit(("setCartItems", json!({ "items": saved })))?;
                ctx.commit(("setCheckoutStatus", json!("failed")))?;
                Err(ActionError::rejected("checkout failed"))
            }
        })
        .action_sync("addProductToCart", |ctx, product| {
            if product["inventory"].as_i64().unwrap_or(0) <= 0 {
                return Ok(Value::Null);
            }
            let in_cart = ctx
                .state()
                .get("items")
                .as_array()
                .map_or(false, |items| items.iter().any(|i| i["id"] == product["id"]));
            let id = json!({ "id": product["id"] });
            if in_cart {
                ctx.commit(("incrementItemQuantity", id.clone()))?;
            } else {
                ctx.commit(("pushProductToCart", id.clone()))?;
            }
            ctx.commit_with(
                ("products/decrementProductInventory", id),
                CommitOptions { root: true },
            )?;
            Ok(Value::Null)
        })
        .getter("cartProducts", |args| {
            let all = args.root_state.at("products/all");
            let items = args.state.get("items");
            let products: Vec<Value> = items
                .as_array()
                .into_iter()
                .flatten()
                .filter_map(|item| {
                    let product = all.as_array()?.iter().find(|p| p["id"] == item["id"])?;
                    Some(json!({
                        "title": product["title"],
                        "price": product["price"],
                        "quantity": item["quantity"],
                    }))
                })
                .collect();
            Value::Array(products)
        })
        .getter("cartTotalPrice", |args| {
            let products = args.getters.get("cartProducts").unwrap_or(Value::Null);
            let total: i64 = products
                .as_array()
                .into_iter()
                .flatten()
                .map(|p| p["price"].as_i64().unwrap_or(0) * p["quantity"].as_i64().unwrap_or(0))
                .sum();
            json!(total)
        })
}

fn shop() -> Store {
    Store::builder(Module::new().module("cart", cart()).module("products", products())).build(host())
}

/// The counter example: sync and async paths both end in a commit.
#[tokio::test]
async fn counter_mutations_and_actions() {
    let store = Store::builder(counter()).build(host());

    store.commit("increment").unwrap();
    assert_eq!(store.snapshot(), json!({ "count": 1 }));
    assert_eq!(store.getter("evenOrOdd"), Some(json!("odd")));

    store.dispatch("incrementIfOdd").await.unwrap();
    assert_eq!(store.snapshot(), json!({ "count": 2 }));

    // Even now, so this is a no-op.
    store.dispatch("incrementIfOdd").await.unwrap();
    assert_eq!(store.snapshot(), json!({ "count": 2 }));

    store.dispatch("incrementAsync").await.unwrap();
    assert_eq!(store.snapshot(), json!({ "count": 3 }));

    store.commit("decrement").unwrap();
    assert_eq!(store.getter("evenOrOdd"), Some(json!("even")));
}

/// An envelope commit hands the whole object to the handler.
#[test]
fn envelope_commit_passes_whole_object() {
    let seen = Arc::new(Mutex::new(Value::Null));
    let sink = seen.clone();
    let store = Store::builder(
        Module::new()
            .state(json!({ "total": 0 }))
            .mutation("add", move |state, payload| {
                *sink.lock() = payload.clone();
                bump(state, "total", payload["amount"].as_i64().unwrap_or(0));
            }),
    )
    .build(host());

    store.commit(json!({ "type": "add", "amount": 4 })).unwrap();

    assert_eq!(*seen.lock(), json!({ "type": "add", "amount": 4 }));
    assert_eq!(store.snapshot(), json!({ "total": 4 }));
}

/// A namespaced action commits locally and, with `root`, into another
/// namespace.
#[tokio::test]
async fn cart_commits_across_namespaces() {
    let store = shop();
    let ipad = store.state().get(&Path::from("products/all/0")).unwrap();

    store.dispatch(("cart/addProductToCart", ipad)).await.unwrap();

    assert_eq!(
        store.state().get(&Path::from("cart/items")),
        Some(json!([{ "id": 1, "quantity": 1 }]))
    );
    assert_eq!(
        store.state().get(&Path::from("products/all/0/inventory")),
        Some(json!(1))
    );

    let ipad = store.state().get(&Path::from("products/all/0")).unwrap();
    store.dispatch(("cart/addProductToCart", ipad)).await.unwrap();
    assert_eq!(store.getter("cart/cartTotalPrice"), Some(json!(1000)));

    // Out of stock: nothing happens.
    let shirt = store.state().get(&Path::from("products/all/1")).unwrap();
    store.dispatch(("cart/addProductToCart", shirt)).await.unwrap();
    assert_eq!(store.getter("cart/cartTotalPrice"), Some(json!(1000)));
}

/// Checkout reads the products slice through root state and commits
/// locally; a failed checkout restores the cart.
#[tokio::test]
async fn cart_checkout_uses_root_state() {
    let store = shop();
    let ipad = store.state().get(&Path::from("products/all/0")).unwrap();
    store.dispatch(("cart/addProductToCart", ipad)).await.unwrap();

    assert_eq!(store.dispatch("cart/checkout").await, Ok(json!("successful")));
    assert_eq!(
        store.state().get(&Path::from("cart")),
        Some(json!({ "items": [], "checkoutStatus": "successful" }))
    );

    store.commit(("cart/pushProductToCart", json!({ "id": 99 }))).unwrap();
    assert_eq!(
        store.dispatch("cart/checkout").await,
        Err(ActionError::rejected("checkout failed"))
    );
    assert_eq!(
        store.state().get(&Path::from("cart")),
        Some(json!({ "items": [{ "id": 99, "quantity": 1 }], "checkoutStatus": "failed" }))
    );
}

/// Getters answer to short names inside their namespace.
#[test]
fn namespaced_getters_resolve_local_names() {
    let store = shop();
    let cart = store.module_context("cart/").unwrap();

    assert_eq!(cart.getters().get("cartTotalPrice"), Some(json!(0)));
    assert_eq!(cart.getters().get("cart/cartTotalPrice"), None);
    assert!(cart.getters().contains("cartProducts"));
    assert_eq!(
        store.getters().keys(),
        vec!["cart/cartProducts".to_owned(), "cart/cartTotalPrice".to_owned()]
    );
    assert!(store.module_context("missing/").is_none());
}

/// A getter is computed once and again only after a state path it read
/// changes.
#[test]
fn getters_are_cached_until_their_state_changes() {
    let evaluations = Arc::new(AtomicUsize::new(0));
    let counted = evaluations.clone();
    let store = Store::builder(
        Module::new()
            .state(json!({ "count": 1, "other": 0 }))
            .mutation("increment", |state, _| bump(state, "count", 1))
            .mutation("touchOther", |state, _| bump(state, "other", 1))
            .getter("doubled", move |args| {
                counted.fetch_add(1, Ordering::SeqCst);
                json!(args.state.get("count").as_i64().unwrap_or(0) * 2)
            }),
    )
    .build(host());

    assert_eq!(store.getter("doubled"), Some(json!(2)));
    assert_eq!(store.getter("doubled"), Some(json!(2)));
    assert_eq!(evaluations.load(Ordering::SeqCst), 1);

    store.commit("touchOther").unwrap();
    assert_eq!(store.getter("doubled"), Some(json!(2)));
    assert_eq!(evaluations.load(Ordering::SeqCst), 1);

    store.commit("increment").unwrap();
    assert_eq!(store.getter("doubled"), Some(json!(4)));
    assert_eq!(evaluations.load(Ordering::SeqCst), 2);
}

/// Unknown types run nothing, notify no one and leave state alone.
#[tokio::test]
async fn unknown_types_are_noops() {
    let store = Store::builder(counter()).build(host());
    let notified = Arc::new(AtomicUsize::new(0));
    let count = notified.clone();
    store.subscribe(move |_, _| {
        count.fetch_add(1, Ordering::SeqCst);
    });
    let count = notified.clone();
    store.subscribe_action(move |_: &ActionRecord, _: &StateTree| {
        count.fetch_add(1, Ordering::SeqCst);
    });

    let err = store.commit("nope").unwrap_err();
    assert_eq!(err, StoreError::UnknownMutation { kind: "nope".to_owned() });
    assert_eq!(store.dispatch("nope").await, Ok(Value::Null));

    assert_eq!(store.snapshot(), json!({ "count": 0 }));
    assert_eq!(notified.load(Ordering::SeqCst), 0);
}

/// An unknown local type is not forwarded to a global of the same name.
#[tokio::test]
async fn unknown_local_types_are_reported() {
    let store = Store::builder(
        Module::new()
            .mutation("reset", |state, _| *state = json!({}))
            .action_sync("reset", |_, _| Ok(json!("root")))
            .module("cart", cart()),
    )
    .build(host());
    let cart = store.module_context("cart/").unwrap();

    let err = cart.commit("reset").unwrap_err();
    assert_eq!(
        err,
        StoreError::UnknownLocalMutation {
            local: "reset".to_owned(),
            global: "cart/reset".to_owned(),
        }
    );
    assert_eq!(cart.dispatch("reset").await, Ok(Value::Null));
    assert_eq!(
        cart.dispatch_with("reset", lattice_store::DispatchOptions { root: true }).await,
        Ok(json!("root"))
    );
}

/// Several handlers under one type resolve together, in registration order.
#[tokio::test]
async fn multiple_handlers_join_in_order() {
    let store = Store::builder(
        Module::new()
            .module("a", Module::new().action("load", |_, _| async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok(json!("a"))
            }))
            .module("b", Module::new().action_sync("load", |_, _| Ok(json!("b")))),
    )
    .build(host());

    assert_eq!(store.dispatch("load").await, Ok(json!(["a", "b"])));
}

/// One rejecting handler rejects the whole dispatch and reaches `error`
/// hooks instead of `after` hooks.
#[tokio::test]
async fn rejection_reaches_error_subscribers() {
    let store = Store::builder(
        Module::new()
            .module("ok", Module::new().action_sync("save", |_, _| Ok(json!(1))))
            .module("bad", Module::new().action_sync("save", |_, _| Err(ActionError::rejected("disk full")))),
    )
    .build(host());

    let log = Arc::new(Mutex::new(Vec::new()));
    let (before, after, failed) = (log.clone(), log.clone(), log.clone());
    store.subscribe_action(
        ActionSubscriber::new()
            .before(move |action, _| before.lock().push(format!("before {}", action.kind)))
            .after(move |action, _| after.lock().push(format!("after {}", action.kind)))
            .error(move |action, _, error| failed.lock().push(format!("error {}: {error}", action.kind))),
    );

    let result = store.dispatch("save").await;

    assert_eq!(result, Err(ActionError::rejected("disk full")));
    assert_eq!(*log.lock(), vec!["before save", "error save: action rejected: disk full"]);
}

/// A rejection does not cut sibling handlers short: the dispatch settles
/// only once every handler has, and a slow sibling's commit still lands.
#[tokio::test]
async fn rejection_waits_for_sibling_handlers() {
    let store = Store::builder(
        counter()
            .module("slow", Module::new().action("go", |ctx, _| async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                ctx.commit("increment")?;
                Ok(Value::Null)
            }))
            .module("bad", Module::new().action_sync("go", |_, _| Err(ActionError::rejected("boom")))),
    )
    .build(host());

    assert_eq!(store.dispatch("go").await, Err(ActionError::rejected("boom")));
    assert_eq!(store.snapshot()["count"], json!(1));
}

/// With several rejections, the first in registration order wins.
#[tokio::test]
async fn first_registered_rejection_wins() {
    let store = Store::builder(
        Module::new()
            .module("late", Module::new().action("go", |_, _| async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Err(ActionError::rejected("late"))
            }))
            .module("early", Module::new().action_sync("go", |_, _| Err(ActionError::rejected("early")))),
    )
    .build(host());

    assert_eq!(store.dispatch("go").await, Err(ActionError::rejected("late")));
}

/// A dispatch that is never awaited still runs to completion.
#[tokio::test]
async fn unawaited_dispatch_runs_to_completion() {
    let store = Store::builder(counter()).build(host());

    let _ = store.dispatch("incrementAsync");
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(store.snapshot(), json!({ "count": 1 }));
}

/// A panicking subscriber hook is contained; the dispatch still resolves.
#[tokio::test]
async fn panicking_action_subscriber_is_isolated() {
    let store = Store::builder(counter()).build(host());
    store.subscribe_action(|_: &ActionRecord, _: &StateTree| panic!("subscriber bug"));

    store.dispatch("incrementAsync").await.unwrap();
    assert_eq!(store.snapshot(), json!({ "count": 1 }));
}

/// Subscribers run in order, `prepend` jumps the queue, and unsubscribing
/// mid-emission only affects later emissions.
#[test]
fn subscriber_order_and_unsubscribe() {
    let store = Store::builder(counter()).build(host());
    let log = Arc::new(Mutex::new(Vec::new()));
    let victim: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

    let (sink, target) = (log.clone(), victim.clone());
    store.subscribe(move |_, _| {
        sink.lock().push("first");
        if let Some(subscription) = target.lock().as_ref() {
            subscription.unsubscribe();
        }
    });
    let sink = log.clone();
    let second = store.subscribe(move |_, _| sink.lock().push("second"));
    *victim.lock() = Some(second.clone());
    let sink = log.clone();
    store.subscribe_with(
        move |mutation, _| {
            assert_eq!(mutation.kind, "increment");
            sink.lock().push("prepended");
        },
        SubscribeOptions { prepend: true },
    );

    store.commit("increment").unwrap();
    assert_eq!(*log.lock(), vec!["prepended", "first", "second"]);

    log.lock().clear();
    store.commit("increment").unwrap();
    assert_eq!(*log.lock(), vec!["prepended", "first"]);
    assert!(!second.unsubscribe());
}

/// Mutation subscribers see the state after the mutation.
#[test]
fn subscribers_receive_post_mutation_state() {
    let store = Store::builder(counter()).build(host());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    store.subscribe(move |mutation, state| {
        sink.lock().push((mutation.kind.clone(), state.get_untracked(&Path::from("count"))));
    });

    store.commit(("increment", json!({ "by": 1 }))).unwrap();

    assert_eq!(*seen.lock(), vec![("increment".to_owned(), Some(json!(1)))]);
}

/// In strict mode, a write outside a mutation panics.
#[test]
#[should_panic(expected = "do not mutate store state outside mutation handlers")]
fn strict_mode_rejects_direct_writes() {
    let store = Store::builder(counter()).strict(true).build(host());
    let _ = store.state().set(&Path::from("count"), json!(10));
}

/// In strict mode, commits, registration and `replace_state` are all fine.
#[test]
fn strict_mode_allows_sanctioned_writes() {
    let store = Store::builder(counter()).strict(true).build(host());
    assert!(store.is_strict());

    store.commit("increment").unwrap();
    store
        .register_module("extra", Module::new().state(json!({ "n": 0 })))
        .unwrap();
    store.replace_state(json!({ "count": 7 }));

    assert_eq!(store.snapshot(), json!({ "count": 7 }));
}

/// In strict mode, a watcher callback runs outside the mutation that woke
/// it, so a direct write from it panics.
#[test]
#[should_panic(expected = "do not mutate store state outside mutation handlers")]
fn strict_mode_rejects_writes_from_watchers() {
    let store = Store::builder(counter()).strict(true).build(host());
    let tree = store.state().clone();
    store.watch(
        |state, _| state.get("count"),
        move |new, _| {
            let _ = tree.set(&Path::from("shadow"), new.clone());
        },
    );

    let _ = store.commit("increment");
}

/// A runtime module brings state, handlers and getters, and takes them away
/// again when unregistered.
#[test]
fn register_and_unregister_module() {
    let store = Store::builder(counter()).build(host());
    let extra = Module::new()
        .namespaced(true)
        .state(json!({ "value": 1 }))
        .mutation("setValue", |state, payload| state["value"] = payload.clone())
        .getter("value", |args| args.state.get("value"));

    store.register_module("extra", extra).unwrap();
    assert!(store.has_module("extra"));
    assert_eq!(store.getter("extra/value"), Some(json!(1)));

    store.commit(("extra/setValue", json!(5))).unwrap();
    assert_eq!(store.state().get(&Path::from("extra/value")), Some(json!(5)));
    assert_eq!(store.getter("extra/value"), Some(json!(5)));

    store.unregister_module("extra").unwrap();
    assert!(!store.has_module("extra"));
    assert_eq!(store.snapshot(), json!({ "count": 0 }));
    assert_eq!(store.getter("extra/value"), None);
    assert!(matches!(
        store.commit(("extra/setValue", json!(1))),
        Err(StoreError::UnknownMutation { .. })
    ));
    // Root handlers survive the rebuild.
    store.commit("increment").unwrap();
    assert_eq!(store.snapshot(), json!({ "count": 1 }));
}

/// Nested registration needs the parent, and the root cannot be replaced.
#[test]
fn register_module_path_rules() {
    let store = shop();

    store.register_module(["cart", "promo"], Module::new()).unwrap();
    assert!(store.has_module("cart/promo"));
    assert_eq!(store.state().get(&Path::from("cart/promo")), Some(json!({})));

    assert_eq!(
        store.register_module("missing/child", Module::new()),
        Err(StoreError::InvalidModulePath { path: Path::from("missing/child") })
    );
    assert_eq!(store.register_module(Path::root(), Module::new()), Err(StoreError::RootRegistration));
    assert_eq!(
        store.unregister_module("cart"),
        Err(StoreError::StaticModule { path: Path::from("cart") })
    );
    assert!(store.has_module("cart"));
}

/// `preserve_state` keeps a slice that already exists, e.g. after hydration.
#[test]
fn register_module_preserving_state() {
    let store = Store::builder(counter()).build(host());
    store.replace_state(json!({ "count": 0, "session": { "user": "ada" } }));

    store
        .register_module_with(
            "session",
            Module::new()
                .namespaced(true)
                .state(json!({ "user": null }))
                .getter("user", |args| args.state.get("user")),
            RegisterOptions { preserve_state: true },
        )
        .unwrap();

    assert_eq!(store.getter("session/user"), Some(json!("ada")));
}

/// A state factory gives each registration its own slice.
#[test]
fn state_factory_isolates_registrations() {
    let store = Store::builder(Module::new()).build(host());
    let tally = Module::new()
        .namespaced(true)
        .state_fn(|| json!({ "n": 0 }))
        .mutation("inc", |state, _| bump(state, "n", 1));

    store.register_module("left", tally.clone()).unwrap();
    store.register_module("right", tally).unwrap();
    store.commit("left/inc").unwrap();

    assert_eq!(store.snapshot(), json!({ "left": { "n": 1 }, "right": { "n": 0 } }));
}

/// A getter registered twice under one name keeps the first.
#[test]
fn duplicate_getters_keep_first() {
    let store = Store::builder(
        Module::new()
            .module("a", Module::new().getter("name", |_| json!("a")))
            .module("b", Module::new().getter("name", |_| json!("b"))),
    )
    .build(host());

    assert_eq!(store.getter("name"), Some(json!("a")));
}

/// Hot update swaps handlers and getters but keeps state.
#[test]
fn hot_update_swaps_definitions_in_place() {
    let store = Store::builder(
        counter().getter("doubled", |args| json!(args.state.get("count").as_i64().unwrap_or(0) * 2)),
    )
    .build(host());
    store.commit("increment").unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    store.watch(
        |_, getters| getters.get("doubled").unwrap_or(Value::Null),
        move |new, _| sink.lock().push(new.clone()),
    );

    store
        .hot_update(
            Module::new()
                .mutation("increment", |state, _| bump(state, "count", 10))
                .getter("doubled", |args| json!(args.state.get("count").as_i64().unwrap_or(0) * 3)),
        )
        .unwrap();

    // State kept, new getter visible without any commit.
    assert_eq!(store.snapshot(), json!({ "count": 1 }));
    assert_eq!(store.getter("doubled"), Some(json!(3)));
    assert_eq!(*seen.lock(), vec![json!(3)]);

    store.commit("increment").unwrap();
    assert_eq!(store.snapshot(), json!({ "count": 11 }));
}

/// Hot update cannot add modules; it applies what matches and reports the
/// rest.
#[test]
fn hot_update_reports_unknown_modules() {
    let store = shop();

    let err = store
        .hot_update(Module::new().module("wishlist", Module::new()))
        .unwrap_err();

    assert_eq!(err, StoreError::HotUpdateMismatch { path: Path::from("wishlist") });
    assert!(!store.has_module("wishlist"));
}

/// A watcher fires on change with new and old values, and stops after
/// `unwatch`.
#[test]
fn watch_and_unwatch() {
    let store = Store::builder(counter()).build(host());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();

    let handle = store.watch(
        |state, _| state.get("count"),
        move |new, old| sink.lock().push((new.clone(), old.clone())),
    );

    store.commit("increment").unwrap();
    store.commit("increment").unwrap();
    assert_eq!(
        *seen.lock(),
        vec![(json!(1), json!(0)), (json!(2), json!(1))]
    );

    handle.unwatch();
    handle.unwatch();
    store.commit("increment").unwrap();
    assert_eq!(seen.lock().len(), 2);
}

/// `immediate` fires once at creation; unrelated writes never fire.
#[test]
fn watch_immediate_ignores_unrelated_writes() {
    let store = Store::builder(
        counter()
            .state(json!({ "count": 0, "label": "x" }))
            .mutation("relabel", |state, payload| state["label"] = payload.clone()),
    )
    .build(host());
    let calls = Arc::new(AtomicUsize::new(0));
    let count = calls.clone();

    store.watch_with(
        |state, _| state.get("count"),
        move |_, _| {
            count.fetch_add(1, Ordering::SeqCst);
        },
        WatchOptions { immediate: true },
    );
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    store.commit(("relabel", json!("y"))).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

/// `replace_state` swaps everything and wakes watchers.
#[test]
fn replace_state_notifies_watchers() {
    let store = Store::builder(counter()).build(host());
    let seen = Arc::new(Mutex::new(Value::Null));
    let sink = seen.clone();
    store.watch(|state, _| state.get("count"), move |new, _| *sink.lock() = new.clone());

    store.replace_state(json!({ "count": 42 }));

    assert_eq!(*seen.lock(), json!(42));
    assert_eq!(store.getter("evenOrOdd"), Some(json!("even")));
}

/// Plugins run once at construction, in order, and can subscribe.
#[test]
fn plugins_run_at_construction() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let commits = Arc::new(AtomicUsize::new(0));

    let (first, second, counted) = (order.clone(), order.clone(), commits.clone());
    let store = Store::builder(counter())
        .plugin(move |_| first.lock().push("first"))
        .plugin(move |store| {
            second.lock().push("second");
            let counted = counted.clone();
            store.subscribe(move |_, _| {
                counted.fetch_add(1, Ordering::SeqCst);
            });
        })
        .plugin(logger(LoggerOptions::default()))
        .build(host());

    store.commit("increment").unwrap();

    assert_eq!(*order.lock(), vec!["first", "second"]);
    assert_eq!(commits.load(Ordering::SeqCst), 1);
}

#[derive(Default)]
struct RecordingInspector {
    events: Mutex<Vec<(String, Value)>>,
    travel: Mutex<Option<TimeTravel>>,
}

impl Inspector for RecordingInspector {
    fn emit(&self, event: InspectorEvent<'_>, state: &Value) {
        let label = match event {
            InspectorEvent::Mutation(m) => format!("{} {}", event.name(), m.kind),
            InspectorEvent::Action(a) => format!("{} {}", event.name(), a.kind),
            InspectorEvent::Error(e) => format!("{} {e}", event.name()),
            InspectorEvent::Init => event.name().to_owned(),
        };
        self.events.lock().push((label, state.clone()));
    }

    fn attached(&self, travel: TimeTravel) {
        *self.travel.lock() = Some(travel);
    }
}

/// The inspector sees init, mutations, actions and errors, ahead of other
/// subscribers, and can travel back in time.
#[tokio::test]
async fn inspector_records_and_travels() {
    let inspector = Arc::new(RecordingInspector::default());
    let store = Store::builder(
        counter().action_sync("fail", |_, _| Err(ActionError::Value(json!({ "code": 7 })))),
    )
    .devtools(true)
    .inspector(inspector.clone())
    .build(host());

    store.commit("increment").unwrap();
    let _ = store.dispatch("fail").await;

    let events: Vec<String> = inspector.events.lock().iter().map(|(e, _)| e.clone()).collect();
    assert_eq!(
        events,
        vec![
            "store:init".to_owned(),
            "store:mutation increment".to_owned(),
            "store:action fail".to_owned(),
            "store:error action rejected with {\"code\":7}".to_owned(),
        ]
    );
    assert_eq!(inspector.events.lock()[1].1, json!({ "count": 1 }));

    let travel = inspector.travel.lock().clone().unwrap();
    assert!(travel.travel_to_state(json!({ "count": 0 })));
    assert_eq!(store.snapshot(), json!({ "count": 0 }));
}

/// Without devtools the inspector is never contacted.
#[test]
fn inspector_requires_devtools() {
    let inspector = Arc::new(RecordingInspector::default());
    let store = Store::builder(counter())
        .devtools(false)
        .inspector(inspector.clone())
        .build(host());

    store.commit("increment").unwrap();
    assert!(inspector.events.lock().is_empty());
}
