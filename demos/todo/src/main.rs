use serde_json::json;
use weft_core::prelude::*;

fn counter(count: &State) -> Element {
    element("section")
        .attr("class", "counter")
        .child(
            element("button")
                .on("click", {
                    let count = count.clone();
                    move |_| {
                        let n = count.get("n").and_then(|v| v.as_i64()).unwrap_or(0);
                        count.set("n", n + 1)
                    }
                })
                .child("+1"),
        )
        .child(dynamic_text({
            let count = count.clone();
            move || format!(" clicked {} times", value_text(&count.get("n").unwrap_or_default()))
        }))
        .child(dynamic({
            let count = count.clone();
            move || {
                let n = count.get("n").and_then(|v| v.as_i64()).unwrap_or(0);
                (n >= 3).then(|| element("em").child(" (that's plenty)"))
            }
        }))
}

fn todos(app: &State) -> Element {
    element("ul")
        .attr_fn("class", {
            let app = app.clone();
            move || {
                let empty = app.list("todos").is_none_or(|todos| todos.is_empty());
                if empty { "todos empty" } else { "todos" }
            }
        })
        .children_fn({
            let app = app.clone();
            move || {
                app.list("todos")
                    .map(|todos| todos.values())
                    .unwrap_or_default()
                    .iter()
                    .map(|todo| {
                        let label = value_text(todo);
                        element("li").key(label.clone()).child(label)
                    })
                    .collect::<Vec<_>>()
            }
        })
}

fn config() -> anyhow::Result<Config> {
    match std::env::var("WEFT_CONFIG") {
        Ok(raw) => Ok(serde_json::from_str(&raw)?),
        Err(_) => Ok(Config::default()),
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let rt = Runtime::with_config(MemoryHost::new(), config()?);
    let root = rt.host().root();
    let count = rt.state(json!({ "n": 0 }))?;
    let app = rt.state(json!({ "todos": ["write docs", "fix tests"] }))?;

    let counter_id = rt.render(counter(&count), root)?;
    rt.render(todos(&app), root)?;
    let show = |step: &str| println!("{step:>10}: {}", rt.host().markup(root));
    show("initial");

    let button = rt
        .descriptor(counter_id)
        .and_then(|section| section.children.first().copied())
        .and_then(|button| rt.descriptor(button))
        .and_then(|button| button.node)
        .ok_or_else(|| anyhow::anyhow!("counter button was not rendered"))?;
    for _ in 0..3 {
        rt.dispatch(button, &Event::new("click"))?;
    }
    show("clicked");

    let list = app
        .list("todos")
        .ok_or_else(|| anyhow::anyhow!("todos is not a list"))?;
    list.push("ship it")?;
    show("push");
    list.reverse()?;
    show("reverse");
    list.shift()?;
    show("shift");
    app.set("todos", json!([]))?;
    show("clear");

    log::info!(
        "{} descriptors, {} bindings",
        rt.descriptor_count(),
        rt.binding_count()
    );
    Ok(())
}
