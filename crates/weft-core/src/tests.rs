#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use insta::assert_snapshot;
    use serde_json::{Value, json};

    use crate::*;

    fn setup() -> (Runtime, NodeId) {
        let _ = env_logger::builder().is_test(true).try_init();
        let rt = Runtime::new(MemoryHost::new());
        let root = rt.host().root();
        (rt, root)
    }

    fn counter() -> Rc<Cell<usize>> {
        Rc::new(Cell::new(0))
    }

    fn bump(c: &Cell<usize>) {
        c.set(c.get() + 1);
    }

    fn field(state: &State, key: &str) -> Dependency {
        Dependency::new(state.id(), PropKey::field(key))
    }

    fn node_of(rt: &Runtime, id: DescriptorId) -> NodeId {
        rt.descriptor(id).and_then(|d| d.node).unwrap()
    }

    fn children_of(rt: &Runtime, id: DescriptorId) -> Vec<DescriptorId> {
        rt.descriptor(id).unwrap().children
    }

    fn fixed(value: &str) -> Dyn<AttrValue> {
        Dyn::Static(value.into())
    }

    #[test]
    fn test_text_leaf_updates_in_place() {
        let (rt, root) = setup();
        let state = rt.state(json!({ "count": 0 })).unwrap();
        let runs = counter();

        let leaf = rt
            .render(
                dynamic_text({
                    let state = state.clone();
                    let runs = runs.clone();
                    move || {
                        bump(&runs);
                        value_text(&state.get("count").unwrap_or_default())
                    }
                }),
                root,
            )
            .unwrap();
        assert_eq!(rt.host().markup(root), "0");
        let node = node_of(&rt, leaf);

        state.set("count", 1).unwrap();
        assert_eq!(rt.host().markup(root), "1");
        assert_eq!(runs.get(), 2);
        assert_eq!(node_of(&rt, leaf), node);

        // equal writes are no-ops, numbers compared numerically
        state.set("count", 1).unwrap();
        state.set("count", 1.0).unwrap();
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn test_dependencies_are_precise() {
        let (rt, root) = setup();
        let state = rt.state(json!({ "a": 1, "b": 1 })).unwrap();
        let other = rt.state(json!({ "a": 1 })).unwrap();
        let a_runs = counter();
        let b_runs = counter();

        for (key, runs) in [("a", a_runs.clone()), ("b", b_runs.clone())] {
            let state = state.clone();
            rt.render(
                dynamic_text(move || {
                    bump(&runs);
                    value_text(&state.get(key).unwrap_or_default())
                }),
                root,
            )
            .unwrap();
        }
        assert_eq!((a_runs.get(), b_runs.get()), (1, 1));

        state.set("a", 2).unwrap();
        assert_eq!((a_runs.get(), b_runs.get()), (2, 1));

        // same key on another object, and a key nobody read
        other.set("a", 5).unwrap();
        state.set("c", true).unwrap();
        assert_eq!((a_runs.get(), b_runs.get()), (2, 1));
        assert_eq!(rt.host().markup(root), "21");
    }

    #[test]
    fn test_rebinding_is_idempotent() {
        let (rt, root) = setup();
        let state = rt.state(json!({ "count": 0 })).unwrap();
        let leaf = rt
            .render(
                dynamic_text({
                    let state = state.clone();
                    move || value_text(&state.get("count").unwrap_or_default())
                }),
                root,
            )
            .unwrap();

        for n in 1..=5 {
            state.set("count", n).unwrap();
        }
        assert_eq!(rt.bindings_owned_by(leaf), 1);
        assert_eq!(rt.bindings_at(&field(&state, "count")), 1);
        assert_eq!(rt.descriptor(leaf).unwrap().bindings, 1);
    }

    #[test]
    fn test_wrap_and_unwrap() {
        let (rt, _) = setup();
        let value = json!({ "a": [1, { "b": null }], "c": "x", "d": { "e": [] } });
        assert_eq!(unwrap(&rt.wrap(value.clone()).unwrap()), value);

        let value = json!([1, [2, 3], { "k": true }]);
        assert_eq!(unwrap(&rt.wrap(value.clone()).unwrap()), value);

        assert!(matches!(
            rt.wrap(json!(1)),
            Err(Error::NotStructured { found: "number" })
        ));
        assert!(matches!(
            rt.state(json!([])),
            Err(Error::UnexpectedShape { .. })
        ));
    }

    fn keyed_list(rt: &Runtime, root: NodeId, items: &List) -> DescriptorId {
        let items = items.clone();
        rt.render(
            element("ul").children_fn(move || {
                items
                    .values()
                    .iter()
                    .map(|v| element("li").key(value_text(v)).child(value_text(v)))
                    .collect::<Vec<_>>()
            }),
            root,
        )
        .unwrap()
    }

    #[test]
    fn test_keyed_reorder_reuses_nodes() {
        let (rt, root) = setup();
        let items = rt.list(json!(["a", "b", "c"])).unwrap();
        let ul = keyed_list(&rt, root, &items);
        assert_eq!(rt.host().markup(root), "<ul><li>a</li><li>b</li><li>c</li></ul>");

        let before = children_of(&rt, ul);
        let nodes: Vec<NodeId> = before.iter().map(|c| node_of(&rt, *c)).collect();
        let created = rt.host().node_count();

        items
            .splice(0, 3, [json!("c"), json!("a"), json!("b")])
            .unwrap();
        assert_eq!(rt.host().markup(root), "<ul><li>c</li><li>a</li><li>b</li></ul>");

        let after = children_of(&rt, ul);
        assert_eq!(after, vec![before[2], before[0], before[1]]);
        let moved: Vec<NodeId> = after.iter().map(|c| node_of(&rt, *c)).collect();
        assert_eq!(moved, vec![nodes[2], nodes[0], nodes[1]]);
        assert_eq!(rt.host().node_count(), created);
    }

    #[test]
    fn test_unkeyed_children_match_by_position() {
        let (rt, root) = setup();
        let items = rt.list(json!(["a", "b"])).unwrap();
        let ul = rt
            .render(
                element("ul").children_fn({
                    let items = items.clone();
                    move || {
                        items
                            .values()
                            .iter()
                            .map(|v| element("li").child(value_text(v)))
                            .collect::<Vec<_>>()
                    }
                }),
                root,
            )
            .unwrap();
        let before = children_of(&rt, ul);

        // Index keys survive the reorder, so static content is left as is.
        items.reverse().unwrap();
        assert_eq!(children_of(&rt, ul), before);
        assert_eq!(rt.host().markup(root), "<ul><li>a</li><li>b</li></ul>");
    }

    #[test]
    fn test_list_mutations_add_and_release_children() {
        let (rt, root) = setup();
        let theme = rt.state(json!({ "class": "row" })).unwrap();
        let items = rt.list(json!([])).unwrap();
        let ul = rt
            .render(
                element("ul").children_fn({
                    let items = items.clone();
                    let theme = theme.clone();
                    move || {
                        items
                            .values()
                            .into_iter()
                            .map(|v| {
                                let theme = theme.clone();
                                element("li")
                                    .key(v.clone())
                                    .attr_fn("class", move || theme.get("class"))
                                    .child(value_text(&v))
                            })
                            .collect::<Vec<_>>()
                    }
                }),
                root,
            )
            .unwrap();
        assert_eq!(rt.host().markup(root), "<ul></ul>");

        items.push(1).unwrap();
        items.push(2).unwrap();
        assert_eq!(
            rt.host().markup(root),
            r#"<ul><li class="row">1</li><li class="row">2</li></ul>"#
        );
        let children = children_of(&rt, ul);
        assert_eq!(rt.bindings_at(&field(&theme, "class")), 2);

        assert_eq!(items.pop().unwrap(), Some(json!(2)));
        assert_eq!(rt.host().markup(root), r#"<ul><li class="row">1</li></ul>"#);
        assert!(rt.descriptor(children[1]).is_none());
        assert_eq!(rt.bindings_owned_by(children[1]), 0);
        assert_eq!(rt.bindings_at(&field(&theme, "class")), 1);

        theme.set("class", "done").unwrap();
        assert_eq!(rt.host().markup(root), r#"<ul><li class="done">1</li></ul>"#);
    }

    #[test]
    fn test_replaced_nested_list_keeps_its_address() {
        let (rt, root) = setup();
        let app = rt.state(json!({ "title": "todo", "todos": ["a"] })).unwrap();
        let runs = counter();
        rt.render(
            element("ul").children_fn({
                let app = app.clone();
                let runs = runs.clone();
                move || {
                    bump(&runs);
                    app.list("todos")
                        .map(|todos| todos.values())
                        .unwrap_or_default()
                        .iter()
                        .map(|v| element("li").key(value_text(v)).child(value_text(v)))
                        .collect::<Vec<_>>()
                }
            }),
            root,
        )
        .unwrap();

        // reaches the binding through the list and through its address, runs once
        app.list("todos").unwrap().push("b").unwrap();
        assert_eq!(runs.get(), 2);
        assert_eq!(rt.host().markup(root), "<ul><li>a</li><li>b</li></ul>");

        app.set("todos", json!(["x"])).unwrap();
        assert_eq!(rt.host().markup(root), "<ul><li>x</li></ul>");

        app.list("todos").unwrap().push("y").unwrap();
        app.set("title", "done").unwrap();
        assert_eq!(runs.get(), 4);
        assert_snapshot!(rt.host().markup(root), @"<ul><li>x</li><li>y</li></ul>");
    }

    #[test]
    fn test_presence_mounts_at_marker() {
        let (rt, root) = setup();
        let flags = rt.state(json!({ "show": false })).unwrap();
        let mounted = counter();
        let unmounted = counter();

        let part = dynamic({
            let flags = flags.clone();
            let mounted = mounted.clone();
            let unmounted = unmounted.clone();
            move || {
                let mounted = mounted.clone();
                let unmounted = unmounted.clone();
                (flags.get("show") == Some(Value::Bool(true))).then(|| {
                    element("b")
                        .child("x")
                        .on_mount(move |_| bump(&mounted))
                        .on_unmount(move |_| bump(&unmounted))
                })
            }
        });
        rt.render(element("div").child("a").child(part).child("c"), root)
            .unwrap();
        assert_eq!(rt.host().markup(root), "<div>ac</div>");

        flags.set("show", true).unwrap();
        assert_eq!(rt.host().markup(root), "<div>a<b>x</b>c</div>");
        flags.set("show", false).unwrap();
        assert_eq!(rt.host().markup(root), "<div>ac</div>");
        flags.set("show", true).unwrap();
        assert_eq!(rt.host().markup(root), "<div>a<b>x</b>c</div>");

        assert_eq!((mounted.get(), unmounted.get()), (2, 1));
    }

    #[test]
    fn test_presence_switches_between_text_and_element() {
        let (rt, root) = setup();
        let state = rt.state(json!({ "mode": "text", "label": "t" })).unwrap();
        let part = rt
            .render(
                dynamic({
                    let state = state.clone();
                    move || {
                        let label = value_text(&state.get("label").unwrap_or_default());
                        match state.get("mode") {
                            Some(Value::String(mode)) if mode == "text" => Some(text(label)),
                            Some(Value::String(_)) => Some(
                                element("em")
                                    .attr_fn("title", {
                                        let state = state.clone();
                                        move || state.get("label")
                                    })
                                    .child(label)
                                    .build(),
                            ),
                            _ => None,
                        }
                    }
                }),
                root,
            )
            .unwrap();
        let text_node = node_of(&rt, part);

        state.set("label", "u").unwrap();
        assert_eq!(rt.host().markup(root), "u");
        assert_eq!(node_of(&rt, part), text_node);

        state.set("mode", "element").unwrap();
        assert_eq!(rt.host().markup(root), r#"<em title="u">u</em>"#);
        assert!(!rt.host().contains(text_node));
        let owned = rt.bindings_owned_by(part);

        state.set("mode", Value::Null).unwrap();
        assert_eq!(rt.host().markup(root), "");
        // the title binding went with the element
        assert_eq!(rt.bindings_owned_by(part), owned - 1);
        assert!(!rt.descriptor(part).unwrap().is_rendered());
    }

    #[test]
    fn test_type_swap_moves_children() {
        let (rt, root) = setup();
        let state = rt.state(json!({ "tag": "h1", "title": "t" })).unwrap();
        let heading = rt
            .render(
                element_fn({
                    let state = state.clone();
                    move || value_text(&state.get("tag").unwrap_or_default())
                })
                .attr("class", "x")
                .child("hello ")
                .child(dynamic({
                    let state = state.clone();
                    move || state.get("title").map(|t| value_text(&t))
                })),
                root,
            )
            .unwrap();
        assert_eq!(rt.host().markup(root), r#"<h1 class="x">hello t</h1>"#);
        let old = node_of(&rt, heading);

        state.set("tag", "h2").unwrap();
        assert_eq!(rt.host().markup(root), r#"<h2 class="x">hello t</h2>"#);
        let new = node_of(&rt, heading);
        assert_ne!(new, old);
        assert!(!rt.host().contains(old));
        for child in children_of(&rt, heading) {
            assert_eq!(rt.descriptor(child).unwrap().parent, new);
        }

        // presence under the new node still finds its marker
        state.remove("title").unwrap();
        assert_eq!(rt.host().markup(root), r#"<h2 class="x">hello </h2>"#);
        state.set("title", "back").unwrap();
        assert_eq!(rt.host().markup(root), r#"<h2 class="x">hello back</h2>"#);
    }

    #[test]
    fn test_type_unchanged_leaves_host_alone() {
        let (rt, root) = setup();
        let state = rt.state(json!({ "level": 2 })).unwrap();
        let heading = rt
            .render(
                element_fn({
                    let state = state.clone();
                    move || match state.get("level").and_then(|l| l.as_i64()) {
                        Some(level) if level <= 1 => "h1",
                        _ => "h2",
                    }
                })
                .attr("id", "top"),
                root,
            )
            .unwrap();
        let node = node_of(&rt, heading);
        let writes = rt.host().attribute_writes();
        let nodes = rt.host().node_count();

        state.set("level", 3).unwrap();
        assert_eq!(node_of(&rt, heading), node);
        assert_eq!(rt.host().attribute_writes(), writes);
        assert_eq!(rt.host().node_count(), nodes);
    }

    #[test]
    fn test_bulk_attributes_write_only_changes() {
        let (rt, root) = setup();
        let state = rt.state(json!({ "mode": "a", "n": 1 })).unwrap();
        let div = rt
            .render(
                element("div").attrs_fn({
                    let state = state.clone();
                    move || {
                        let mut map = AttrMap::new();
                        map.insert("class".into(), fixed("fixed"));
                        if state.get("mode") == Some(json!("a")) {
                            map.insert("title".into(), fixed("A"));
                            map.insert("data-a".into(), fixed("1"));
                        } else {
                            map.insert("title".into(), fixed("B"));
                        }
                        let n = state.clone();
                        map.insert(
                            "data-n".into(),
                            Dyn::Dynamic(Rc::new(move || AttrValue::from(n.get("n")))),
                        );
                        map
                    }
                }),
                root,
            )
            .unwrap();
        assert_eq!(
            rt.host().markup(root),
            r#"<div class="fixed" data-a="1" data-n="1" title="A"></div>"#
        );
        assert_eq!(rt.host().attribute_writes(), 4);

        // data-a is cleared, title rewritten, class and data-n untouched
        state.set("mode", "b").unwrap();
        assert_eq!(
            rt.host().markup(root),
            r#"<div class="fixed" data-n="1" title="B"></div>"#
        );
        assert_eq!(rt.host().attribute_writes(), 6);
        assert!(!rt.descriptor(div).unwrap().attributes.contains_key("data-a"));

        // nested per-key computation runs alone
        state.set("n", 2).unwrap();
        assert_eq!(rt.host().attribute_writes(), 7);
        assert_snapshot!(
            rt.host().markup(root),
            @r#"<div class="fixed" data-n="2" title="B"></div>"#
        );
    }

    #[test]
    fn test_single_attribute() {
        let (rt, root) = setup();
        let state = rt.state(json!({ "cls": "a", "other": 1 })).unwrap();
        rt.render(
            element("p")
                .attr_fn("class", {
                    let state = state.clone();
                    move || state.get("cls")
                })
                .attr("id", "x")
                .attr("key", "ignored"),
            root,
        )
        .unwrap();
        assert_eq!(rt.host().markup(root), r#"<p class="a" id="x"></p>"#);
        assert_eq!(rt.host().attribute_writes(), 2);

        state.set("cls", "b").unwrap();
        state.set("other", 2).unwrap();
        assert_eq!(rt.host().markup(root), r#"<p class="b" id="x"></p>"#);
        assert_eq!(rt.host().attribute_writes(), 3);

        state.set("cls", Value::Null).unwrap();
        assert_eq!(rt.host().markup(root), r#"<p id="x"></p>"#);
    }

    #[test]
    fn test_dispatch_runs_handler() {
        let (rt, root) = setup();
        let state = rt.state(json!({ "count": 0 })).unwrap();
        let button = rt
            .render(
                element("button")
                    .on("click", {
                        let state = state.clone();
                        move |_| {
                            let n = state.get("count").and_then(|v| v.as_i64()).unwrap_or(0);
                            state.set("count", n + 1)
                        }
                    })
                    .child(dynamic_text({
                        let state = state.clone();
                        move || value_text(&state.get("count").unwrap_or_default())
                    })),
                root,
            )
            .unwrap();
        let node = node_of(&rt, button);

        assert!(rt.dispatch(node, &Event::new("click")).unwrap());
        assert!(rt.dispatch(node, &Event::new("click")).unwrap());
        assert!(!rt.dispatch(node, &Event::new("keydown")).unwrap());
        assert_eq!(rt.host().markup(root), "<button>2</button>");
    }

    #[test]
    fn test_listener_values_are_not_tracked() {
        let (rt, root) = setup();
        let state = rt.state(json!({ "label": "go" })).unwrap();
        let clicks = counter();
        let button = rt
            .render(
                element("button").attr_fn("onclick", {
                    let state = state.clone();
                    let clicks = clicks.clone();
                    move || {
                        let _ = state.get("label");
                        let clicks = clicks.clone();
                        Handler::new(move |_| {
                            bump(&clicks);
                            Ok(())
                        })
                    }
                }),
                root,
            )
            .unwrap();
        assert_eq!(rt.bindings_owned_by(button), 0);

        rt.dispatch(node_of(&rt, button), &Event::new("click"))
            .unwrap();
        assert_eq!(clicks.get(), 1);
    }

    #[test]
    fn test_self_triggering_binding_terminates() {
        let (rt, root) = setup();
        let state = rt.state(json!({ "n": 0 })).unwrap();
        let runs = counter();
        rt.render(
            dynamic_text({
                let state = state.clone();
                let runs = runs.clone();
                move || {
                    bump(&runs);
                    let n = state.get("n").and_then(|v| v.as_i64()).unwrap_or(0);
                    if n < 100 {
                        let _ = state.set("n", n + 1);
                    }
                    n.to_string()
                }
            }),
            root,
        )
        .unwrap();

        state.set("n", 5).unwrap();
        assert_eq!(runs.get(), 2);
        assert_eq!(state.get("n"), Some(json!(6)));
        assert_eq!(rt.host().markup(root), "5");
    }

    #[test]
    fn test_update_depth_limit() {
        let rt = Runtime::with_config(MemoryHost::new(), Config::default().max_update_depth(1));
        let root = rt.host().root();
        let state = rt.state(json!({ "a": 0, "b": 0 })).unwrap();
        let failure: Rc<RefCell<Option<Error>>> = Rc::default();

        rt.render(
            dynamic_text({
                let state = state.clone();
                move || value_text(&state.get("b").unwrap_or_default())
            }),
            root,
        )
        .unwrap();
        rt.render(
            dynamic_text({
                let state = state.clone();
                let failure = failure.clone();
                move || {
                    let a = state.get("a").and_then(|v| v.as_i64()).unwrap_or(0);
                    if let Err(err) = state.set("b", a + 1) {
                        *failure.borrow_mut() = Some(err);
                    }
                    a.to_string()
                }
            }),
            root,
        )
        .unwrap();
        assert!(failure.borrow().is_none());
        assert_eq!(rt.host().markup(root), "10");

        state.set("a", 5).unwrap();
        assert!(matches!(
            *failure.borrow(),
            Some(Error::UpdateDepthExceeded { limit: 1 })
        ));
        // the write itself landed; the chained update did not run
        assert_eq!(state.get("b"), Some(json!(6)));
        assert_eq!(rt.host().markup(root), "15");
    }

    fn broken_runtime(policy: ErrorPolicy) -> (Runtime, State) {
        let rt = Runtime::with_config(MemoryHost::new(), Config::default().error_policy(policy));
        let root = rt.host().root();
        let state = rt.state(json!({ "x": 0 })).unwrap();
        // a presence binding on a static descriptor fails when it runs
        let paragraph = rt.render(element("p"), root).unwrap();
        rt.inner()
            .registry
            .borrow_mut()
            .bind(field(&state, "x"), paragraph, BindingKind::Component);
        rt.render(
            dynamic_text({
                let state = state.clone();
                move || value_text(&state.get("x").unwrap_or_default())
            }),
            root,
        )
        .unwrap();
        (rt, state)
    }

    #[test]
    fn test_abort_policy_stops_the_pass() {
        let (rt, state) = broken_runtime(ErrorPolicy::Abort);
        let root = rt.host().root();
        assert!(matches!(
            state.set("x", 1),
            Err(Error::StaticDescriptor { .. })
        ));
        assert_eq!(rt.host().markup(root), "<p></p>0");
    }

    #[test]
    fn test_log_policy_keeps_going() {
        let (rt, state) = broken_runtime(ErrorPolicy::LogAndContinue);
        let root = rt.host().root();
        state.set("x", 1).unwrap();
        assert_eq!(rt.host().markup(root), "<p></p>1");
    }

    #[test]
    fn test_update_preconditions() {
        let (rt, root) = setup();
        let leaf = rt.render(text("hi"), root).unwrap();
        assert!(matches!(
            rt.inner().run_update(leaf, &BindingKind::Attributes),
            Err(Error::NotRendered { operation: "attributes", .. })
        ));
        assert!(matches!(
            rt.inner().run_update(leaf, &BindingKind::Component),
            Err(Error::StaticDescriptor { .. })
        ));

        rt.unmount(leaf).unwrap();
        assert!(matches!(rt.unmount(leaf), Err(Error::UnknownDescriptor(_))));
    }

    #[test]
    fn test_unmount_releases_everything() {
        let (rt, root) = setup();
        let state = rt.state(json!({ "n": 1, "cls": "a", "items": [1, 2] })).unwrap();
        let tree = rt
            .render(
                element("div")
                    .child(dynamic_text({
                        let state = state.clone();
                        move || value_text(&state.get("n").unwrap_or_default())
                    }))
                    .child(element("span").attr_fn("class", {
                        let state = state.clone();
                        move || state.get("cls")
                    }))
                    .child(element("ol").children_fn({
                        let state = state.clone();
                        move || {
                            state
                                .list("items")
                                .map(|l| l.values())
                                .unwrap_or_default()
                                .iter()
                                .map(|v| element("li").key(v.clone()).child(value_text(v)))
                                .collect::<Vec<_>>()
                        }
                    })),
                root,
            )
            .unwrap();
        assert!(rt.binding_count() > 0);

        rt.unmount(tree).unwrap();
        assert_eq!(rt.binding_count(), 0);
        assert_eq!(rt.descriptor_count(), 0);
        assert_eq!(rt.host().markup(root), "");
        assert_eq!(rt.host().node_count(), 1);

        // later writes reach nothing
        state.set("n", 2).unwrap();
        state.list("items").unwrap().push(3).unwrap();
        assert_eq!(rt.host().node_count(), 1);
    }

    #[test]
    fn test_runtimes_are_independent() {
        let (first, first_root) = setup();
        let (second, _) = setup();
        let state = first.state(json!({ "v": "a" })).unwrap();
        first
            .render(
                dynamic_text({
                    let state = state.clone();
                    move || value_text(&state.get("v").unwrap_or_default())
                }),
                first_root,
            )
            .unwrap();

        state.set("v", "b").unwrap();
        assert_eq!(first.host().markup(first_root), "b");
        assert_eq!(second.binding_count(), 0);
    }

    #[test]
    fn test_presence_writing_its_own_dependency_mounts_once() {
        let (rt, root) = setup();
        let state = rt.state(json!({ "a": false, "b": 0 })).unwrap();
        let part = rt
            .render(
                dynamic({
                    let state = state.clone();
                    move || {
                        let a = state.get("a") == Some(Value::Bool(true));
                        let b = state.get("b").and_then(|v| v.as_i64()).unwrap_or(0);
                        if a && b < 1 {
                            let _ = state.set("b", b + 1);
                        }
                        a.then(|| element("b").child("x"))
                    }
                }),
                root,
            )
            .unwrap();

        state.set("a", true).unwrap();
        assert_eq!(rt.host().markup(root), "<b>x</b>");
        assert_eq!(state.get("b"), Some(json!(1)));

        state.set("a", false).unwrap();
        assert_eq!(rt.host().markup(root), "");
        assert!(!rt.descriptor(part).unwrap().is_rendered());
        // root, marker
        assert_eq!(rt.host().node_count(), 2);
    }

    #[test]
    fn test_unmount_child_then_parent() {
        let (rt, root) = setup();
        let div = rt
            .render(element("div").child(element("span").child("s")), root)
            .unwrap();
        let span = children_of(&rt, div)[0];

        rt.unmount(span).unwrap();
        assert_eq!(rt.host().markup(root), "<div></div>");
        assert!(children_of(&rt, div).is_empty());

        rt.unmount(div).unwrap();
        assert_eq!(rt.host().markup(root), "");
        assert_eq!(rt.descriptor_count(), 0);
        assert_eq!(rt.host().node_count(), 1);
    }

    #[test]
    fn test_unmounted_child_leaves_reconciliation_intact() {
        let (rt, root) = setup();
        let items = rt.list(json!(["a", "b"])).unwrap();
        let ul = keyed_list(&rt, root, &items);
        let first = children_of(&rt, ul)[0];

        rt.unmount(first).unwrap();
        assert_eq!(rt.host().markup(root), "<ul><li>b</li></ul>");

        items.push("c").unwrap();
        assert_eq!(rt.host().markup(root), "<ul><li>a</li><li>b</li><li>c</li></ul>");
    }

    #[test]
    fn test_dynamic_keys() {
        let (rt, root) = setup();
        let rows = rt
            .list(json!([{ "id": 1, "label": "one" }, { "id": 2, "label": "two" }]))
            .unwrap();
        let ul = rt
            .render(
                element("ul").children_fn({
                    let rows = rows.clone();
                    move || {
                        (0..rows.len())
                            .filter_map(|i| rows.object(i))
                            .map(|row| {
                                let label = value_text(&row.get("label").unwrap_or_default());
                                element("li")
                                    .key_fn(move || row.get("id"))
                                    .child(label)
                            })
                            .collect::<Vec<_>>()
                    }
                }),
                root,
            )
            .unwrap();
        let before = children_of(&rt, ul);

        rows.reverse().unwrap();
        assert_eq!(children_of(&rt, ul), vec![before[1], before[0]]);
        assert_eq!(rt.host().markup(root), "<ul><li>two</li><li>one</li></ul>");
    }

    #[test]
    fn test_children_results_are_normalized() {
        let (rt, root) = setup();
        let state = rt.state(json!({ "label": "hi", "badge": false })).unwrap();
        rt.render(
            element("p").children_fn({
                let state = state.clone();
                move || value_text(&state.get("label").unwrap_or_default())
            }),
            root,
        )
        .unwrap();
        rt.render(
            element("div").children_fn({
                let state = state.clone();
                move || {
                    (state.get("badge") == Some(Value::Bool(true)))
                        .then(|| element("i").child("new"))
                }
            }),
            root,
        )
        .unwrap();
        assert_eq!(rt.host().markup(root), "<p>hi</p><div></div>");

        state.set("label", "bye").unwrap();
        state.set("badge", true).unwrap();
        assert_eq!(rt.host().markup(root), "<p>bye</p><div><i>new</i></div>");

        state.set("badge", false).unwrap();
        assert_eq!(rt.host().markup(root), "<p>bye</p><div></div>");
    }

    #[test]
    fn test_bulk_update_releases_dropped_computations() {
        let (rt, root) = setup();
        let state = rt.state(json!({ "mode": "a", "n": 1 })).unwrap();
        let div = rt
            .render(
                element("div").attrs_fn({
                    let state = state.clone();
                    move || {
                        let mut map = AttrMap::new();
                        if state.get("mode") == Some(json!("a")) {
                            let n = state.clone();
                            map.insert(
                                "data-n".into(),
                                Dyn::Dynamic(Rc::new(move || AttrValue::from(n.get("n")))),
                            );
                        } else {
                            map.insert("data-n".into(), fixed("fixed"));
                        }
                        map
                    }
                }),
                root,
            )
            .unwrap();
        assert_eq!(rt.bindings_at(&field(&state, "n")), 1);
        let owned = rt.bindings_owned_by(div);

        state.set("mode", "b").unwrap();
        assert_eq!(rt.bindings_at(&field(&state, "n")), 0);
        assert_eq!(rt.bindings_owned_by(div), owned - 1);
        assert_eq!(rt.descriptor(div).unwrap().bindings, owned - 1);

        let writes = rt.host().attribute_writes();
        state.set("n", 2).unwrap();
        assert_eq!(rt.host().attribute_writes(), writes);
        assert_eq!(rt.host().markup(root), r#"<div data-n="fixed"></div>"#);
    }
}
